//! JSON-backed data source store.
//!
//! Each data source folder under the uploads root holds a `workspace.json`
//! describing its files. Keys this crate does not model are kept as-is when
//! the file is rewritten.

use crate::writer::write_atomic;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use xrfcube_core::{CubeConfig, CubePaths, DataSourceStore, ImageSize, SpectralParams};

/// File name of the per data source workspace record.
pub const WORKSPACE_FILE_NAME: &str = "workspace.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseImageEntry {
    #[serde(default)]
    pub name: String,
    pub image_location: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementalCubeEntry {
    #[serde(default)]
    pub name: String,
    pub data_location: String,
    #[serde(default)]
    pub recipe_location: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralCubeEntry {
    #[serde(default)]
    pub name: String,
    pub raw_location: String,
    pub rpl_location: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Contents of `workspace.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<BaseImageEntry>,
    #[serde(default)]
    pub elemental_cubes: Vec<ElementalCubeEntry>,
    #[serde(default)]
    pub spectral_cubes: Vec<SpectralCubeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_params: Option<SpectralParams>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// [`DataSourceStore`] over `<uploads>/<data source>/workspace.json`.
#[derive(Debug, Clone)]
pub struct JsonWorkspace {
    config: CubeConfig,
}

impl JsonWorkspace {
    #[must_use]
    pub fn new(config: CubeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CubeConfig {
        &self.config
    }

    /// Folder of `data_source`, rejecting names that escape the uploads root.
    ///
    /// # Errors
    /// Returns an invalid-parameter error for names that are not a single path component.
    pub fn data_source_dir(&self, data_source: &str) -> Result<PathBuf> {
        let mut components = Path::new(data_source).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.config.data_source_dir(data_source)),
            _ => Err(xrfcube_core::Error::InvalidParameter(format!(
                "'{data_source}' is not a data source name"
            ))
            .into()),
        }
    }

    /// Path of the workspace record of `data_source`.
    ///
    /// # Errors
    /// See [`JsonWorkspace::data_source_dir`].
    pub fn workspace_path(&self, data_source: &str) -> Result<PathBuf> {
        Ok(self.data_source_dir(data_source)?.join(WORKSPACE_FILE_NAME))
    }

    /// Reads the workspace record of `data_source`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the record is missing and [`Error::Json`] if it is malformed.
    pub fn load(&self, data_source: &str) -> Result<WorkspaceFile> {
        let path = self.workspace_path(data_source)?;
        let text = fs::read_to_string(&path).map_err(|e| {
            tracing::error!(data_source, error = %e, "cannot read workspace");
            Error::from_io_at(e, &path)
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Atomically replaces the workspace record of `data_source`.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized or written.
    pub fn save(&self, data_source: &str, workspace: &WorkspaceFile) -> Result<()> {
        let path = self.workspace_path(data_source)?;
        let json = serde_json::to_vec_pretty(workspace)?;
        write_atomic(path, &json)?;
        Ok(())
    }

    fn elemental_entry<'a>(
        workspace: &'a WorkspaceFile,
        data_source: &str,
        cube_name: Option<&str>,
    ) -> xrfcube_core::Result<&'a ElementalCubeEntry> {
        let found = match cube_name {
            Some(name) => workspace.elemental_cubes.iter().find(|c| c.name == name),
            None => workspace.elemental_cubes.first(),
        };
        found.ok_or_else(|| {
            xrfcube_core::Error::NotFound(format!(
                "elemental cube {} of {data_source}",
                cube_name.unwrap_or("(first)")
            ))
        })
    }
}

impl From<Error> for xrfcube_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::CoreError(inner) => inner,
            Error::NotFound(path) => Self::NotFound(path.display().to_string()),
            Error::DimensionMismatch(msg) => Self::DimensionMismatch(msg),
            Error::FormatUnsupported(msg) => Self::FormatUnsupported(msg),
            other => Self::Workspace(other.to_string()),
        }
    }
}

impl DataSourceStore for JsonWorkspace {
    fn cube_paths(&self, data_source: &str) -> xrfcube_core::Result<CubePaths> {
        let workspace = self.load(data_source)?;
        let entry = workspace.spectral_cubes.first().ok_or_else(|| {
            xrfcube_core::Error::NotFound(format!("spectral cube of {data_source}"))
        })?;
        let dir = self.data_source_dir(data_source)?;
        Ok(CubePaths {
            raw_path: dir.join(&entry.raw_location),
            metadata_path: dir.join(&entry.rpl_location),
        })
    }

    fn spectral_params(&self, data_source: &str) -> xrfcube_core::Result<SpectralParams> {
        self.load(data_source)?.spectral_params.ok_or_else(|| {
            xrfcube_core::Error::NotFound(format!("spectral params of {data_source}"))
        })
    }

    fn persist_spectral_params(
        &self,
        data_source: &str,
        params: &SpectralParams,
    ) -> xrfcube_core::Result<()> {
        let mut workspace = self.load(data_source)?;
        workspace.spectral_params = Some(*params);
        self.save(data_source, &workspace)?;
        tracing::debug!(data_source, ?params, "persisted spectral params");
        Ok(())
    }

    fn base_image_size(&self, data_source: &str) -> xrfcube_core::Result<ImageSize> {
        let workspace = self.load(data_source)?;
        let entry = workspace.base_image.ok_or_else(|| {
            xrfcube_core::Error::NotFound(format!("base image of {data_source}"))
        })?;
        let path = self.data_source_dir(data_source)?.join(&entry.image_location);
        if !path.is_file() {
            return Err(xrfcube_core::Error::NotFound(path.display().to_string()));
        }
        let (width, height) = image::image_dimensions(&path).map_err(Error::from)?;
        Ok(ImageSize::new(width, height))
    }

    fn elemental_cube_path(
        &self,
        data_source: &str,
        cube_name: Option<&str>,
    ) -> xrfcube_core::Result<PathBuf> {
        let workspace = self.load(data_source)?;
        let entry = Self::elemental_entry(&workspace, data_source, cube_name)?;
        Ok(self.data_source_dir(data_source)?.join(&entry.data_location))
    }

    fn relocate_elemental_cube(
        &self,
        data_source: &str,
        cube_name: &str,
        file_name: &str,
    ) -> xrfcube_core::Result<()> {
        let mut workspace = self.load(data_source)?;
        let entry = workspace
            .elemental_cubes
            .iter_mut()
            .find(|c| c.name == cube_name)
            .ok_or_else(|| {
                xrfcube_core::Error::NotFound(format!("elemental cube {cube_name} of {data_source}"))
            })?;
        entry.data_location = file_name.to_string();
        self.save(data_source, &workspace)?;
        Ok(())
    }
}
