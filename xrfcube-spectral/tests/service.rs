#![allow(clippy::cast_precision_loss)]
use approx::assert_relative_eq;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xrfcube_core::{
    ChannelRange, CubeConfig, CubeGeometry, CubePaths, DataSourceStore, ImageSize, PixelRect,
    SelectionMask, SpectralParams,
};
use xrfcube_io::{encode_samples, read_layout, JsonWorkspace, RawCube};
use xrfcube_spectral::{
    bin_cube, BinOutcome, ConversionOutcome, CubeService, SelectionTarget,
};

const DS: &str = "painting";

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    service: CubeService<JsonWorkspace>,
}

impl Fixture {
    fn ds_dir(&self) -> PathBuf {
        self.root.join(DS)
    }
}

fn write_raw(path: &Path, geometry: &CubeGeometry, f: impl Fn(u32, u32, u32) -> u32) {
    let mut bytes = Vec::new();
    for row in 0..geometry.height {
        for col in 0..geometry.width {
            let v: Vec<u32> = (0..geometry.channel_depth).map(|c| f(row, col, c)).collect();
            encode_samples(geometry, &v, &mut bytes);
        }
    }
    fs::write(path, bytes).unwrap();
}

fn sidecar(geometry: &CubeGeometry) -> String {
    format!(
        "key\tvalue\nwidth\t{}\nheight\t{}\ndepth\t{}\noffset\t0\ndata-length\t{}\n\
         data-type\tunsigned\nbyte-order\tlittle-endian\nrecord-by\tvector\n",
        geometry.width, geometry.height, geometry.channel_depth, geometry.sample_byte_width
    )
}

fn fixture(
    geometry: CubeGeometry,
    params: serde_json::Value,
    max_points: u64,
    f: impl Fn(u32, u32, u32) -> u32,
) -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("uploads");
    let ds = root.join(DS);
    fs::create_dir_all(&ds).unwrap();

    write_raw(&ds.join("cube.raw"), &geometry, f);
    fs::write(ds.join("cube.rpl"), sidecar(&geometry)).unwrap();
    fs::write(
        ds.join("elements.csv"),
        "row;column;Fe K;Ca K\n0;0;0;1\n0;1;2;1\n1;0;4;1\n1;1;8;1\n",
    )
    .unwrap();
    image::RgbImage::new(geometry.width * 10, geometry.height * 10)
        .save(ds.join("rgb.png"))
        .unwrap();

    let workspace = json!({
        "name": DS,
        "baseImage": {"name": "rgb", "imageLocation": "rgb.png"},
        "contextualImages": [],
        "elementalCubes": [{"name": "elements", "dataLocation": "elements.csv", "recipeLocation": ""}],
        "spectralCubes": [{"name": "cube", "rawLocation": "cube.raw", "rplLocation": "cube.rpl"}],
        "spectralParams": params,
    });
    fs::write(ds.join("workspace.json"), workspace.to_string()).unwrap();

    let config = CubeConfig::new(&root, max_points).unwrap();
    let service = CubeService::new(config.clone(), JsonWorkspace::new(config)).unwrap();
    Fixture {
        _dir: dir,
        root,
        service,
    }
}

#[test]
fn test_constant_cube_binning_scenario() {
    let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
    // 0 to 0.015 keV in steps of 0.01 keV is channels [0, 2) one by one
    let fx = fixture(
        geometry,
        json!({"low": 0, "high": 0.015, "binSize": 0.01, "binned": false}),
        100,
        |_, _, _| 4,
    );

    let outcome = fx.service.bin_raw_data(DS).unwrap();
    let BinOutcome::Binned(report) = outcome else {
        panic!("expected a binned outcome, got {outcome:?}");
    };
    assert_eq!(report.output_depth, 2);
    assert!(report.rewritten);

    let layout = read_layout(fx.ds_dir().join("cube.rpl")).unwrap();
    assert_eq!(layout.geometry.channel_depth, 2);
    let cube = RawCube::open(fx.ds_dir().join("cube.raw"), layout.geometry).unwrap();
    for row in 0..3 {
        for col in 0..3 {
            assert_eq!(cube.read_channels(row, col, 0, 2).unwrap(), vec![4, 4]);
        }
    }

    let params = fx.service.spectral_params(DS).unwrap();
    assert!(params.binned);
    assert_relative_eq!(params.low, 0.0);
    assert_relative_eq!(params.high, 2.0);
    assert_relative_eq!(params.bin_size, 1.0);

    assert!(matches!(fx.service.bin_raw_data(DS).unwrap(), BinOutcome::AlreadyBinned));
}

#[test]
fn test_binning_averages_channel_groups() {
    let dir = TempDir::new().unwrap();
    let geometry = CubeGeometry::new(2, 2, 10, 4).unwrap();
    let raw = dir.path().join("cube.raw");
    let rpl = dir.path().join("cube.rpl");
    write_raw(&raw, &geometry, |r, c, ch| r * 1000 + c * 100 + ch);
    fs::write(&rpl, sidecar(&geometry)).unwrap();

    let range = ChannelRange::new(1, 8, 3).unwrap();
    let report = bin_cube(&raw, &rpl, geometry, range).unwrap();
    assert_eq!(report.output_depth, 3);

    let cube = RawCube::open(&raw, geometry.with_channel_depth(3)).unwrap();
    // groups [1,4) [4,7) [7,8)
    assert_eq!(cube.read_channels(1, 1, 0, 3).unwrap(), vec![1102, 1105, 1107]);
}

#[test]
fn test_failed_binning_restores_params() {
    let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
    let fx = fixture(
        geometry,
        json!({"low": 0, "high": 0.015, "binSize": 0.01, "binned": false}),
        100,
        |_, _, _| 4,
    );
    // one sample short of what the sidecar promises
    let raw = fx.ds_dir().join("cube.raw");
    let bytes = fs::read(&raw).unwrap();
    fs::write(&raw, &bytes[..bytes.len() - 2]).unwrap();

    assert!(fx.service.bin_raw_data(DS).is_err());
    let params = fx.service.spectral_params(DS).unwrap();
    assert!(!params.binned);
    assert_relative_eq!(params.high, 0.015);
    assert_eq!(fs::read(&raw).unwrap().len(), bytes.len() - 2);
    assert_eq!(read_layout(fx.ds_dir().join("cube.rpl")).unwrap().geometry.channel_depth, 6);
}

/// Writes the 3x3x6 cube of constant 4 with its sidecar into `dir`.
fn constant_cube(dir: &TempDir) -> (PathBuf, PathBuf, CubeGeometry) {
    let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
    let raw = dir.path().join("cube.raw");
    let rpl = dir.path().join("cube.rpl");
    write_raw(&raw, &geometry, |_, _, _| 4);
    fs::write(&rpl, sidecar(&geometry)).unwrap();
    (raw, rpl, geometry)
}

fn assert_constant(raw: &Path, rpl: &Path, depth: u32, value: u32) {
    let layout = read_layout(rpl).unwrap();
    assert_eq!(layout.geometry.channel_depth, depth);
    let cube = RawCube::open(raw, layout.geometry).unwrap();
    for row in 0..layout.geometry.height {
        for col in 0..layout.geometry.width {
            assert_eq!(cube.read_channels(row, col, 0, depth).unwrap(), vec![value; depth as usize]);
        }
    }
}

#[test]
fn test_constant_cube_crop_in_channels() {
    let dir = TempDir::new().unwrap();
    let (raw, rpl, geometry) = constant_cube(&dir);

    let report = bin_cube(&raw, &rpl, geometry, ChannelRange::new(0, 2, 1).unwrap()).unwrap();
    assert_eq!((report.source_depth, report.output_depth), (6, 2));
    assert_constant(&raw, &rpl, 2, 4);
}

#[test]
fn test_constant_cube_with_short_last_group() {
    let dir = TempDir::new().unwrap();
    let (raw, rpl, geometry) = constant_cube(&dir);

    // groups [0,4) and [4,6)
    let report = bin_cube(&raw, &rpl, geometry, ChannelRange::new(0, 6, 4).unwrap()).unwrap();
    assert_eq!(report.output_depth, 2);
    assert!(report.rewritten);
    assert_constant(&raw, &rpl, 2, 4);
}

#[test]
fn test_bin_cube_missing_sidecar_keeps_cube() {
    let dir = TempDir::new().unwrap();
    let (raw, _, geometry) = constant_cube(&dir);
    let before = fs::read(&raw).unwrap();

    let err = bin_cube(
        &raw,
        &dir.path().join("absent.rpl"),
        geometry,
        ChannelRange::new(0, 2, 1).unwrap(),
    )
    .unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.cube_committed());
    assert_eq!(fs::read(&raw).unwrap(), before);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

/// Workspace that moves the sidecar away once binned params are stored,
/// so the sidecar rewrite fails after the layout was read.
struct SidecarLosingStore {
    inner: JsonWorkspace,
    sidecar: PathBuf,
    parked: PathBuf,
}

impl DataSourceStore for SidecarLosingStore {
    fn cube_paths(&self, data_source: &str) -> xrfcube_core::Result<CubePaths> {
        self.inner.cube_paths(data_source)
    }

    fn spectral_params(&self, data_source: &str) -> xrfcube_core::Result<SpectralParams> {
        self.inner.spectral_params(data_source)
    }

    fn persist_spectral_params(
        &self,
        data_source: &str,
        params: &SpectralParams,
    ) -> xrfcube_core::Result<()> {
        if params.binned && self.sidecar.exists() {
            fs::rename(&self.sidecar, &self.parked).unwrap();
        }
        self.inner.persist_spectral_params(data_source, params)
    }

    fn base_image_size(&self, data_source: &str) -> xrfcube_core::Result<ImageSize> {
        self.inner.base_image_size(data_source)
    }

    fn elemental_cube_path(
        &self,
        data_source: &str,
        cube_name: Option<&str>,
    ) -> xrfcube_core::Result<PathBuf> {
        self.inner.elemental_cube_path(data_source, cube_name)
    }

    fn relocate_elemental_cube(
        &self,
        data_source: &str,
        cube_name: &str,
        file_name: &str,
    ) -> xrfcube_core::Result<()> {
        self.inner.relocate_elemental_cube(data_source, cube_name, file_name)
    }
}

#[test]
fn test_failed_sidecar_rewrite_leaves_state_consistent() {
    let geometry = CubeGeometry::new(3, 3, 6, 2).unwrap();
    let fx = fixture(
        geometry,
        json!({"low": 0, "high": 0.015, "binSize": 0.01, "binned": false}),
        100,
        |_, _, _| 4,
    );
    let raw = fx.ds_dir().join("cube.raw");
    let rpl = fx.ds_dir().join("cube.rpl");
    let parked = fx.ds_dir().join("cube.rpl.parked");
    let before = fs::read(&raw).unwrap();

    let config = fx.service.config().clone();
    let store = SidecarLosingStore {
        inner: JsonWorkspace::new(config.clone()),
        sidecar: rpl.clone(),
        parked: parked.clone(),
    };
    let service = CubeService::new(config, store).unwrap();

    let err = service.bin_raw_data(DS).unwrap_err();
    assert!(!err.cube_committed());
    assert_eq!(fs::read(&raw).unwrap(), before);
    let params = service.spectral_params(DS).unwrap();
    assert!(!params.binned);
    assert_relative_eq!(params.high, 0.015);

    // with the sidecar back the data source is usable and bins normally
    fs::rename(&parked, &rpl).unwrap();
    assert_constant(&raw, &rpl, 6, 4);
    assert!(matches!(fx.service.bin_raw_data(DS).unwrap(), BinOutcome::Binned(_)));
    assert_constant(&raw, &rpl, 2, 4);
}

#[test]
fn test_zero_selection_returns_zero_spectrum() {
    let geometry = CubeGeometry::new(4, 3, 5, 2).unwrap();
    let fx = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 2, |_, _, _| 9);

    let spectrum = fx
        .service
        .average_spectrum_for_selection(DS, &SelectionMask::new(4, 3))
        .unwrap();
    assert_eq!(spectrum, vec![0.0; 5]);
}

#[test]
fn test_mip_levels_agree_with_full_resolution() {
    let geometry = CubeGeometry::new(16, 16, 4, 2).unwrap();
    let value = |r: u32, c: u32, ch: u32| 100 + ch * 10 + (r + c) % 3;
    let exact = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 1 << 20, value);
    let coarse = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 4, value);

    let mask = SelectionMask::full(16, 16);
    let a = exact.service.average_spectrum_for_selection(DS, &mask).unwrap();
    let b = coarse.service.average_spectrum_for_selection(DS, &mask).unwrap();
    let global = exact.service.average_spectrum_global(DS).unwrap();

    assert!(coarse.service.mip_root(DS).join("3").is_dir());
    for ((x, y), g) in a.iter().zip(&b).zip(&global) {
        assert_relative_eq!(*x, *g, epsilon = 1e-9);
        assert_relative_eq!(*x, *y, epsilon = 1.5);
    }
}

#[test]
fn test_binning_invalidates_mip_levels() {
    let geometry = CubeGeometry::new(4, 4, 6, 2).unwrap();
    let fx = fixture(
        geometry,
        json!({"low": 0, "high": 0.015, "binSize": 0.01}),
        1,
        |_, _, ch| ch,
    );
    fx.service
        .average_spectrum_for_selection(DS, &SelectionMask::full(4, 4))
        .unwrap();
    assert!(fx.service.mip_root(DS).exists());

    fx.service.bin_raw_data(DS).unwrap();
    assert!(!fx.service.mip_root(DS).exists());

    let spectrum = fx
        .service
        .average_spectrum_for_selection(DS, &SelectionMask::full(4, 4))
        .unwrap();
    assert_eq!(spectrum, vec![0.0, 1.0]);
}

#[test]
fn test_image_rectangle_selection() {
    let geometry = CubeGeometry::new(4, 4, 2, 2).unwrap();
    let fx = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 100, |r, _, _| r);

    // base image is 40x40, drawn corner to corner in reverse
    let rect = PixelRect::new(24, 24, 0, 0);
    let mask = fx
        .service
        .mask_for_image_rectangle(DS, &rect, SelectionTarget::Spectral)
        .unwrap();
    assert_eq!(mask.count_selected(), 9);

    let spectrum = fx.service.average_spectrum_for_selection(DS, &mask).unwrap();
    assert_relative_eq!(spectrum[0], 1.0);

    let elemental = fx
        .service
        .mask_for_image_rectangle(DS, &PixelRect::new(0, 0, 5, 39), SelectionTarget::Elemental)
        .unwrap();
    assert_eq!((elemental.width(), elemental.height()), (2, 2));
    assert_eq!(elemental.count_selected(), 2);
}

#[test]
fn test_elemental_operations_and_conversion() {
    let geometry = CubeGeometry::new(2, 2, 2, 2).unwrap();
    let fx = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 100, |_, _, _| 0);

    assert_eq!(fx.service.element_names(DS).unwrap(), ["Fe K", "Ca K"]);
    let dims = fx.service.cube_dimensions(DS).unwrap();
    assert_eq!((dims.width, dims.height, dims.channels, dims.header_size), (2, 2, 2, 0));

    let averages = fx.service.element_averages(DS).unwrap();
    assert_eq!(averages[0].name, "FeK");
    assert_relative_eq!(averages[0].average, (0.0 + 64.0 + 128.0 + 255.0) / 4.0);
    assert_relative_eq!(averages[1].average, 0.0);

    let outcome = fx.service.convert_cube_to_native_format(DS, "elements").unwrap();
    let ConversionOutcome::Converted { path } = outcome else {
        panic!("expected a conversion");
    };
    assert_eq!(path, fx.ds_dir().join("elements.dms"));
    assert!(!fx.ds_dir().join("elements.csv").exists());
    assert_eq!(
        fx.service.store().elemental_cube_path(DS, None).unwrap(),
        fx.ds_dir().join("elements.dms")
    );

    let dims = fx.service.cube_dimensions(DS).unwrap();
    assert_eq!(dims.header_size, "2\n2 2 2\n".len() as u64);
    let map = fx.service.element_map(DS, 0).unwrap();
    assert_relative_eq!(map[[1, 1]], 8.0);
    assert!(fx.service.element_map(DS, 2).is_err());

    let mask = SelectionMask::from_rect(2, 2, &PixelRect::new(1, 0, 1, 1));
    let selected = fx.service.element_averages_for_selection(DS, &mask).unwrap();
    assert_relative_eq!(selected[0].average, (64.0 + 255.0) / 2.0);

    assert_eq!(
        fx.service.convert_cube_to_native_format(DS, "elements").unwrap(),
        ConversionOutcome::AlreadyNative
    );
}

#[test]
fn test_energy_offset_and_missing_data_source() {
    let geometry = CubeGeometry::new(2, 2, 2, 2).unwrap();
    let fx = fixture(geometry, json!({"low": 0, "high": 40, "binSize": 1}), 100, |_, _, _| 0);
    assert_relative_eq!(fx.service.energy_offset(DS).unwrap(), 0.0);

    let rpl = fx.ds_dir().join("cube.rpl");
    let text = fs::read_to_string(&rpl).unwrap() + "depthscaleorigin\t-0.5\n";
    fs::write(&rpl, text).unwrap();
    assert_relative_eq!(fx.service.energy_offset(DS).unwrap(), -0.5);

    let err = fx.service.spectral_params("unknown").unwrap_err();
    assert!(err.is_not_found());
}
