#![allow(clippy::cast_precision_loss)]
use approx::assert_relative_eq;
use ndarray::Array3;
use std::fs;
use tempfile::TempDir;
use xrfcube_core::{ByteOrder, CubeFormat, CubeGeometry, ElementalCube, RecordOrder};
use xrfcube_io::{
    encode_samples, read_element_names, read_elemental_cube, read_layout, write_dms, DmsReader,
    Error, RawCube,
};

fn elemental_cube(channels: usize, height: usize, width: usize) -> ElementalCube {
    let data = Array3::from_shape_fn((channels, height, width), |(c, r, col)| {
        c as f32 * 0.5 + r as f32 * 1.25 - col as f32 * 0.1
    });
    let names = (0..channels).map(|c| format!("El {c}")).collect();
    ElementalCube::new(data, names).unwrap()
}

#[test]
fn test_dms_round_trip() {
    let dir = TempDir::new().unwrap();
    let cube = elemental_cube(5, 7, 3);
    let path = write_dms(dir.path(), "cube", &cube).unwrap();
    assert_eq!(CubeFormat::from_path(&path).unwrap(), CubeFormat::Dms);

    let back = read_elemental_cube(&path, CubeFormat::Dms).unwrap();
    assert_eq!(back.names(), cube.names());
    assert_eq!(back.data().dim(), (5, 7, 3));
    for (a, b) in back.data().iter().zip(cube.data().iter()) {
        assert_relative_eq!(*a, *b);
    }

    let header = *DmsReader::open(&path).unwrap().header();
    assert_eq!((header.width, header.height, header.channels), (3, 7, 5));
}

#[test]
fn test_truncated_dms() {
    let dir = TempDir::new().unwrap();
    let path = write_dms(dir.path(), "cube", &elemental_cube(2, 4, 4)).unwrap();
    let bytes = fs::read(&path).unwrap();
    // cut into the payload
    fs::write(&path, &bytes[..40]).unwrap();

    match DmsReader::open(&path) {
        Err(Error::Truncated {
            expected, actual, ..
        }) => {
            assert_eq!(actual, 40);
            assert!(expected > actual);
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("truncated file was accepted"),
    }
}

#[test]
fn test_csv_to_dms_preserves_contents() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("legacy.csv");
    fs::write(&csv, "row;column;Fe K;Ca K\n0;1;2.5;3\n0;0;1;2\n1;1;8;9\n1;0;4.5;5\n").unwrap();

    let cube = read_elemental_cube(&csv, CubeFormat::Csv).unwrap();
    let dms = write_dms(dir.path(), "legacy", &cube).unwrap();

    let back = read_elemental_cube(&dms, CubeFormat::Dms).unwrap();
    assert_eq!(read_element_names(&dms, CubeFormat::Dms).unwrap(), ["Fe K", "Ca K"]);
    assert_eq!(back.data(), cube.data());
    assert_relative_eq!(back.data()[[0, 0, 1]], 2.5);
}

#[test]
fn test_raw_cube_is_not_elemental() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube.raw");
    fs::write(&path, [0u8; 4]).unwrap();
    assert!(matches!(
        read_elemental_cube(&path, CubeFormat::Raw),
        Err(Error::FormatUnsupported(_))
    ));
}

#[test]
fn test_raw_size_must_match_metadata() {
    let dir = TempDir::new().unwrap();
    let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
    let mut bytes = Vec::new();
    encode_samples(&geometry, &vec![4; 3 * 3 * 6], &mut bytes);

    let path = dir.path().join("cube.raw");
    fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
    assert!(matches!(
        RawCube::open(&path, geometry),
        Err(Error::DimensionMismatch(_))
    ));

    fs::write(&path, &bytes).unwrap();
    let cube = RawCube::open(&path, geometry).unwrap();
    assert_eq!(cube.read_channels(2, 2, 0, 6).unwrap(), vec![4; 6]);
}

#[test]
fn test_oversized_sidecar_is_rejected() {
    let dir = TempDir::new().unwrap();
    let rpl = dir.path().join("cube.rpl");
    fs::write(
        &rpl,
        "width 4294967295\nheight 4294967295\ndepth 4294967295\ndata-length 4\nrecord-by vector\n",
    )
    .unwrap();
    assert!(matches!(
        read_layout(&rpl),
        Err(Error::CoreError(xrfcube_core::Error::GeometryUnavailable(_)))
    ));

    let raw = dir.path().join("cube.raw");
    fs::write(&raw, [0u8; 16]).unwrap();
    let geometry = CubeGeometry {
        width: u32::MAX,
        height: u32::MAX,
        channel_depth: u32::MAX,
        header_byte_size: 0,
        sample_byte_width: 4,
        byte_order: ByteOrder::LittleEndian,
        record_order: RecordOrder::Vector,
    };
    assert!(matches!(
        RawCube::open(&raw, geometry),
        Err(Error::CoreError(xrfcube_core::Error::GeometryUnavailable(_)))
    ));
}
