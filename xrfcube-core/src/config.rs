//! Service configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

fn default_generated_folder_name() -> String {
    "generated".to_string()
}

/// Configuration shared by every cube operation.
///
/// Keys use kebab-case on disk:
///
/// ```json
/// { "uploads-folder": "data", "generated-folder-name": "generated", "max-spectrum-points": 100000 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CubeConfig {
    /// Root folder holding one directory per data source.
    pub uploads_folder: PathBuf,
    /// Per data-source folder for derived files such as mip levels.
    #[serde(default = "default_generated_folder_name")]
    pub generated_folder_name: String,
    /// Most pixels a selection average may read at full cost.
    pub max_spectrum_points: u64,
}

impl CubeConfig {
    /// Creates a configuration with the default generated folder name.
    ///
    /// # Errors
    /// Returns an error if `max_spectrum_points` is zero.
    pub fn new(uploads_folder: impl Into<PathBuf>, max_spectrum_points: u64) -> Result<Self> {
        let config = Self {
            uploads_folder: uploads_folder.into(),
            generated_folder_name: default_generated_folder_name(),
            max_spectrum_points,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    ///
    /// # Errors
    /// Returns [`Error::ConfigUnavailable`] if the file cannot be read or parsed,
    /// and [`Error::InvalidParameter`] if a value is out of range.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::ConfigUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::ConfigUnavailable(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON configuration string.
    ///
    /// # Errors
    /// See [`Self::from_file`].
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigUnavailable(format!("cannot parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for a zero point ceiling or an empty
    /// or nested generated folder name.
    pub fn validate(&self) -> Result<()> {
        if self.max_spectrum_points == 0 {
            return Err(Error::InvalidParameter(
                "max-spectrum-points must be at least 1".to_string(),
            ));
        }
        if self.generated_folder_name.is_empty()
            || self.generated_folder_name.contains(['/', '\\'])
        {
            return Err(Error::InvalidParameter(format!(
                "generated-folder-name '{}' must be a single path component",
                self.generated_folder_name
            )));
        }
        Ok(())
    }

    /// Directory of data source `data_source`.
    #[must_use]
    pub fn data_source_dir(&self, data_source: &str) -> PathBuf {
        self.uploads_folder.join(data_source)
    }

    /// Generated-files directory of `data_source`.
    #[must_use]
    pub fn generated_dir(&self, data_source: &str) -> PathBuf {
        self.data_source_dir(data_source).join(&self.generated_folder_name)
    }
}
