//! Legacy `;`-delimited elemental cube reader.
//!
//! The header row is `row;column;<name>;...`, every following row holds one
//! pixel. Rows may come in any order; the grid is rebuilt from the distinct
//! row and column indices.

use crate::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::Array3;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use xrfcube_core::ElementalCube;

const DELIMITER: u8 = b';';

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| Error::from_io_at(e, path))?;
    Ok(ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file))
}

fn header_names(reader: &mut csv::Reader<File>, path: &Path) -> Result<Vec<String>> {
    let header = reader.headers()?;
    if header.is_empty() {
        return Err(Error::InvalidFormat(format!(
            "{}: missing header row",
            path.display()
        )));
    }
    Ok(header.iter().skip(2).map(str::to_string).collect())
}

/// Reads the channel names from the header row.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if the file has no header row.
pub fn read_csv_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    header_names(&mut reader, path)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_index(field: &str, line_no: u64) -> Result<i64> {
    let value: f64 = field.parse().map_err(|_| {
        Error::InvalidFormat(format!("line {line_no}: index '{field}' is not a number"))
    })?;
    if value.fract() != 0.0 {
        return Err(Error::InvalidFormat(format!(
            "line {line_no}: index '{field}' is not whole"
        )));
    }
    Ok(value as i64)
}

fn parse_record(record: &StringRecord, channels: usize) -> Result<(i64, i64, Vec<f32>)> {
    let line_no = record.position().map_or(0, csv::Position::line);
    if record.len() != channels + 2 {
        return Err(Error::InvalidFormat(format!(
            "line {line_no}: expected {} fields, found {}",
            channels + 2,
            record.len()
        )));
    }
    let row = parse_index(&record[0], line_no)?;
    let col = parse_index(&record[1], line_no)?;
    let values = record
        .iter()
        .skip(2)
        .map(|f| {
            f.parse::<f32>().map_err(|_| {
                Error::InvalidFormat(format!("line {line_no}: value '{f}' is not a number"))
            })
        })
        .collect::<Result<Vec<f32>>>()?;
    Ok((row, col, values))
}

/// Reads a CSV cube into channel-major layout.
///
/// Fields may be quoted.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] for malformed rows and
/// [`Error::DimensionMismatch`] if the rows do not form a rectangular grid.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<ElementalCube> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let names = header_names(&mut reader, path)?;
    let channels = names.len();

    let records = reader
        .records()
        .map(|record| parse_record(&record?, channels))
        .collect::<Result<Vec<_>>>()?;

    // distinct indices in ascending order
    let mut rows: BTreeMap<i64, usize> = records.iter().map(|r| (r.0, 0)).collect();
    let mut cols: BTreeMap<i64, usize> = records.iter().map(|r| (r.1, 0)).collect();
    for (i, slot) in rows.values_mut().enumerate() {
        *slot = i;
    }
    for (i, slot) in cols.values_mut().enumerate() {
        *slot = i;
    }

    let (height, width) = (rows.len(), cols.len());
    if height * width != records.len() {
        return Err(Error::DimensionMismatch(format!(
            "{}: {} records do not form a {height}x{width} grid",
            path.display(),
            records.len()
        )));
    }

    let mut data = Array3::<f32>::zeros((channels, height, width));
    let mut seen = vec![false; height * width];
    for (row, col, values) in records {
        let (r, c) = (rows[&row], cols[&col]);
        if std::mem::replace(&mut seen[r * width + c], true) {
            return Err(Error::DimensionMismatch(format!(
                "{}: duplicate pixel ({row}, {col})",
                path.display()
            )));
        }
        for (channel, value) in values.into_iter().enumerate() {
            data[[channel, r, c]] = value;
        }
    }

    tracing::info!(path = %path.display(), channels, height, width, "read CSV cube");
    Ok(ElementalCube::new(data, names)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("cube.csv");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_unsorted_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "row;column;Fe;Ca\n1;1;4;40\n0;0;1;10\n1;0;3;30\n0;1;2;20\n",
        );

        let cube = read_csv(&path).unwrap();
        assert_eq!(cube.names(), ["Fe", "Ca"]);
        assert_eq!(cube.data().dim(), (2, 2, 2));
        assert_eq!(cube.data()[[0, 0, 1]], 2.0);
        assert_eq!(cube.data()[[1, 1, 0]], 30.0);
    }

    #[test]
    fn test_non_contiguous_indices() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "row;column;Fe\n10;5;1\n10;7;2\n20;5;3\n20;7;4\n");
        let cube = read_csv(&path).unwrap();
        assert_eq!(cube.data()[[0, 1, 1]], 4.0);
    }

    #[test]
    fn test_non_rectangular() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "row;column;Fe\n0;0;1\n0;1;2\n1;0;3\n");
        assert!(matches!(read_csv(&path).unwrap_err(), Error::DimensionMismatch(_)));
    }

    #[test]
    fn test_duplicate_pixel() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "row;column;Fe\n0;0;1\n0;0;2\n1;1;3\n1;1;4\n");
        assert!(matches!(read_csv(&path).unwrap_err(), Error::DimensionMismatch(_)));
    }

    #[test]
    fn test_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "\"row\";\"column\";\"Fe K\";\"Pb; L\"\n\"0\";0;1.5;\"2\"\n0;1;3;4\n",
        );

        assert_eq!(read_csv_names(&path).unwrap(), ["Fe K", "Pb; L"]);
        let cube = read_csv(&path).unwrap();
        assert_eq!(cube.names(), ["Fe K", "Pb; L"]);
        assert_eq!(cube.data().dim(), (2, 1, 2));
        assert_eq!(cube.data()[[0, 0, 0]], 1.5);
        assert_eq!(cube.data()[[1, 0, 1]], 4.0);
    }

    #[test]
    fn test_short_row_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "row;column;Fe;Ca\n0;0;1\n");
        assert!(matches!(read_csv(&path).unwrap_err(), Error::InvalidFormat(_)));

        let missing = dir.path().join("missing.csv");
        assert!(matches!(read_csv(&missing).unwrap_err(), Error::NotFound(_)));
    }

    #[test]
    fn test_names_only() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "row;column;Fe K;Continuum\n");
        assert_eq!(read_csv_names(&path).unwrap(), ["Fe K", "Continuum"]);
    }
}
