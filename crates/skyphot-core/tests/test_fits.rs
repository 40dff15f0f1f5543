mod common;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2, Ix2};
use tempfile::tempdir;

use common::write_fits_frame;
use skyphot_core::background::BackgroundSetting;
use skyphot_core::error::PhotometryError;
use skyphot_core::frame::{FrameIdentifiers, RegistrationOffset};
use skyphot_core::grid::{FrameRecord, MeasurementGrid, SettingMeasurement};
use skyphot_core::io::field_chart::{save_field_chart, LABEL_COLOUR, RING_COLOUR, RING_RADIUS};
use skyphot_core::io::fits::{
    f64_extension, header_f64, header_text, hdu_shape, i32_extension, image_hdu, read_image, write_fits, FitsFile, Hdu,
    HeaderValue,
};
use skyphot_core::io::header::{check_frame_header, load_frame, read_frame_header, HeaderKeys};
use skyphot_core::io::output::{read_photometry, write_photometry, OBJ_FLUX};
use skyphot_core::io::sort::{sort_frames, SortConfig};

// ---------------------------------------------------------------------------
// Reader / writer
// ---------------------------------------------------------------------------

#[test]
fn test_image_and_header_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.fits");
    let data = Array2::from_shape_fn((3, 4), |(r, c)| (r * 10 + c) as f32);

    let mut hdu = image_hdu(&data);
    hdu.insert("EXPOSURE", 30.0);
    hdu.insert("VBIN", 2);
    hdu.insert("OBJECT", "Kepler field");
    write_fits(&path, hdu, Vec::new()).unwrap();

    let file = FitsFile::open(&path).unwrap();
    let primary = file.primary().unwrap();
    assert_eq!(hdu_shape(&primary).unwrap(), vec![3, 4]);
    assert_eq!(header_f64(&primary, "BITPIX"), Some(-32.0));
    assert_eq!(header_f64(&primary, "EXPOSURE"), Some(30.0));
    assert_eq!(primary.value("VBIN"), Some(&HeaderValue::IntegerNumber(2)));
    assert_eq!(header_text(&primary, "OBJECT").as_deref(), Some("Kepler field"));
    assert_eq!(header_f64(&primary, "HJD"), None);

    let back = read_image(&primary).unwrap();
    assert_eq!(back, data);
}

#[test]
fn test_named_extensions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi.fits");

    write_fits(
        &path,
        Hdu::empty(),
        vec![
            f64_extension("RADII", &array![2.0f64, 2.5, 3.0]),
            i32_extension("PARAMS", &array![[16i32, 16, 3, 3], [32, 32, 1, 1]]),
            i32_extension("FLAGS", &array![[0i32, 0x200], [0x10, 0]]),
        ],
    )
    .unwrap();

    let file = FitsFile::open(&path).unwrap();
    assert!(file.extension("PARAMS").is_ok());
    assert!(matches!(file.extension("MISSING"), Err(PhotometryError::InvalidFits(_))));

    let radii = file.read_extension("RADII").unwrap();
    assert_eq!(radii.as_slice().unwrap(), &[2.0, 2.5, 3.0]);
    let params = file.read_extension("PARAMS").unwrap().into_dimensionality::<Ix2>().unwrap();
    assert_eq!(params.dim(), (2, 4));
    assert_eq!(params[[1, 0]], 32.0);
    let flags = file.read_extension("FLAGS").unwrap().into_dimensionality::<Ix2>().unwrap();
    assert_eq!(flags[[0, 1]], 512.0);
}

#[test]
fn test_non_fits_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.fits");
    std::fs::write(&path, vec![b'x'; 4000]).unwrap();
    assert!(matches!(FitsFile::open(&path), Err(PhotometryError::InvalidFits(_))));

    let short = dir.path().join("short.fits");
    std::fs::write(&short, b"SIMP").unwrap();
    assert!(matches!(FitsFile::open(&short), Err(PhotometryError::InvalidFits(_))));
}

// ---------------------------------------------------------------------------
// Frame headers
// ---------------------------------------------------------------------------

#[test]
fn test_load_frame_reads_required_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.fits");
    let data = Array2::<f32>::from_elem((8, 6), 5.0);
    write_fits_frame(&path, &data, 45.0, 2460000.25, "WASP-12");

    let frame = load_frame(&path, &HeaderKeys::default()).unwrap();
    assert_eq!(frame.data.dim(), (8, 6));
    assert_eq!(frame.header.exposure, 45.0);
    assert_eq!(frame.header.gain, 2.0);
    assert_eq!(frame.header.bin_factor, 1.0);
    assert_abs_diff_eq!(frame.header.jd, 2460000.25, epsilon = 1e-9);
    // HJD and BJD are absent.
    assert!(frame.header.hjd.is_nan());
    assert!(frame.header.bjd.is_nan());
    assert_eq!(frame.header.identifiers.object.as_deref(), Some("WASP-12"));
    assert_eq!(frame.header.identifiers.filter_name(), "V");
    assert_eq!(frame.metadata.path.as_deref(), Some(path.as_path()));
    assert!(check_frame_header(&path, &HeaderKeys::default()).is_ok());
}

fn base_header() -> Hdu {
    let mut hdu = Hdu::empty();
    hdu.insert("PREAMP", 1.0);
    hdu.insert("VBIN", 1);
    hdu.insert("AIRMASS", 1.1);
    hdu
}

#[test]
fn test_missing_exposure_is_fatal() {
    let err = read_frame_header(&base_header(), &HeaderKeys::default()).unwrap_err();
    assert!(matches!(err, PhotometryError::MissingHeader(ref k) if k == "EXPOSURE"));
}

#[test]
fn test_unusable_header_values_are_fatal() {
    let mut header = base_header();
    header.insert("EXPOSURE", "long");
    let err = read_frame_header(&header, &HeaderKeys::default()).unwrap_err();
    assert!(matches!(err, PhotometryError::InvalidHeader { .. }));

    let mut header = base_header();
    header.insert("EXPOSURE", 0.0);
    let err = read_frame_header(&header, &HeaderKeys::default()).unwrap_err();
    assert!(matches!(err, PhotometryError::InvalidHeader { .. }));
}

#[test]
fn test_missing_airmass_is_fatal() {
    let mut header = Hdu::empty();
    header.insert("EXPOSURE", 30.0);
    header.insert("PREAMP", 1.0);
    header.insert("VBIN", 1);
    let err = read_frame_header(&header, &HeaderKeys::default()).unwrap_err();
    assert!(matches!(err, PhotometryError::MissingHeader(ref k) if k == "AIRMASS"));
}

#[test]
fn test_check_frame_header_reports_missing_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no_exposure.fits");
    write_fits(&path, common::frame_hdu(&Array2::zeros((4, 4)), None, 2460000.0, "X"), Vec::new()).unwrap();
    let err = check_frame_header(&path, &HeaderKeys::default()).unwrap_err();
    assert!(matches!(err, PhotometryError::MissingHeader(ref k) if k == "EXPOSURE"));
}

#[test]
fn test_custom_header_keys() {
    let mut header = Hdu::empty();
    header.insert("EXPTIME", 10.0);
    header.insert("GAIN", 1.5);
    header.insert("XBINNING", 2);
    header.insert("AIRMASS", 1.3);
    header.insert("JD", 2459999.5);
    let keys = HeaderKeys {
        exposure: "EXPTIME".into(),
        gain: "GAIN".into(),
        bin_factor: "XBINNING".into(),
        ..Default::default()
    };
    let h = read_frame_header(&header, &keys).unwrap();
    assert_eq!((h.exposure, h.gain, h.bin_factor), (10.0, 1.5, 2.0));
}

// ---------------------------------------------------------------------------
// Photometry file
// ---------------------------------------------------------------------------

fn small_grid() -> MeasurementGrid {
    let mut grid = MeasurementGrid::new(
        vec![2.0, 3.0],
        vec![BackgroundSetting::square(16, 1), BackgroundSetting::square(32, 3)],
        vec![10.0, 20.0],
        vec![11.0, 21.0],
        3,
        2,
    )
    .unwrap();

    for frame in 0..2 {
        for setting in 0..2 {
            let base = (frame * 10 + setting) as f64;
            let m = SettingMeasurement {
                flux: Array2::from_elem((2, 2), 100.0 + base),
                flux_err: Array2::from_elem((2, 2), 2.0),
                flags: Array2::from_elem((2, 2), 0x10),
                bkg_flux: Array2::from_elem((2, 2), 5.0),
                bkg_flux_err: Array2::from_elem((2, 2), 0.5),
                residual_bkg: vec![1.0, -1.0, f64::NAN],
                mean_fwhm: 1.1,
            };
            grid.store_setting(frame, setting, 10.0, &m).unwrap();
        }
        grid.store_frame(
            frame,
            &FrameRecord {
                jd: 2460000.0 + frame as f64,
                hjd: f64::NAN,
                bjd: f64::NAN,
                exposure: 10.0,
                airmass: 1.2,
                offset: RegistrationOffset { dx: 0.5, dy: -0.25 },
                x: vec![10.1, 20.1],
                y: vec![11.1, 21.1],
                x_registered: vec![9.5, 19.5],
                y_registered: vec![11.25, 21.25],
            },
        )
        .unwrap();
    }
    grid
}

#[test]
fn test_photometry_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("phot.fits");
    let grid = small_grid();
    let ids = FrameIdentifiers {
        object: Some("WASP-12".into()),
        filter_a: Some("R".into()),
        ..Default::default()
    };

    write_photometry(&path, &grid, &ids).unwrap();
    let file = read_photometry(&path).unwrap();
    let back = file.grid;

    assert_eq!(back.shape(), grid.shape());
    assert_eq!(back.radii, grid.radii);
    assert_eq!(back.settings, grid.settings);
    assert_eq!(back.catalog_x, grid.catalog_x);
    assert_eq!(back.flux, grid.flux);
    assert_eq!(back.flags, grid.flags);
    assert_eq!(back.x_unrefined, grid.x_unrefined);
    assert_eq!(back.jd, grid.jd);
    assert!(back.hjd.iter().all(|v| v.is_nan()));
    assert!(back.residual_bkg[[0, 2, 0]].is_nan());
    assert_eq!(back.residual_bkg[[1, 1, 1]], -0.1);
    assert_eq!(back.shift_x, Array1::from(vec![0.5, 0.5]));

    assert_eq!(file.identifiers.object.as_deref(), Some("WASP-12"));
    assert_eq!(file.identifiers.filter_name(), "R");

    let file = FitsFile::open(&path).unwrap();
    assert_eq!(header_f64(&file.primary().unwrap(), "NFRAMES"), Some(2.0));
    assert_eq!(file.read_extension(OBJ_FLUX).unwrap().shape(), &[2, 2, 2, 2]);
}

#[test]
fn test_incomplete_photometry_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("phot.fits");
    write_fits(&path, Hdu::empty(), vec![f64_extension(OBJ_FLUX, &Array2::<f64>::zeros((2, 2)))]).unwrap();

    assert!(read_photometry(&path).is_err());
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

fn write_typed(path: &std::path::Path, obstype: &str, object: &str, filter: &str) {
    let mut hdu = image_hdu(&Array2::<f32>::zeros((2, 2)));
    hdu.insert("OBSTYPE", obstype);
    hdu.insert("OBJECT", object);
    hdu.insert("FILTERA", filter);
    write_fits(path, hdu, Vec::new()).unwrap();
}

#[test]
fn test_sort_frames_by_obstype() {
    let dir = tempdir().unwrap();
    let night = dir.path().join("night");
    std::fs::create_dir_all(night.join("cal")).unwrap();

    write_typed(&night.join("cal/b1.fits"), "BIAS", "bias", "");
    write_typed(&night.join("cal/f1.fits"), "FLAT", "dome", "V");
    write_typed(&night.join("s1.fits"), "OBJECT", "WASP-12", "V");
    write_typed(&night.join("s2.fits"), "OBJECT", "WASP-12", "V");
    write_typed(&night.join("s3.fits"), "OBJECT", "HAT-P-7", "R");
    std::fs::write(night.join("broken.fits"), b"not a fits file").unwrap();
    std::fs::write(night.join("readme.txt"), b"skip").unwrap();

    let sorted = sort_frames(&night, &SortConfig::default(), &HeaderKeys::default()).unwrap();
    assert_eq!(sorted.bias.len(), 1);
    assert_eq!(sorted.flats.len(), 1);
    assert_eq!(sorted.flats[0].1, "V");
    assert_eq!(sorted.science.len(), 3);

    let targets = sorted.targets();
    let labels: Vec<&String> = targets.keys().collect();
    assert_eq!(labels, vec!["HAT-P-7 (R)", "WASP-12 (V)"]);
    assert_eq!(targets["WASP-12 (V)"].len(), 2);
}

// ---------------------------------------------------------------------------
// Field chart
// ---------------------------------------------------------------------------

#[test]
fn test_field_chart_rings_and_labels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chart.png");
    let data = Array2::<f32>::zeros((64, 80));
    save_field_chart(&data, &[32.0, 10.0, f64::NAN], &[32.0, 50.0, 5.0], &path).unwrap();

    let img = image::open(&path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (80, 64));
    let r = RING_RADIUS as u32;
    assert_eq!(*img.get_pixel(32 + r, 32), RING_COLOUR);
    assert_eq!(*img.get_pixel(32, 32 - r), RING_COLOUR);
    assert_eq!(*img.get_pixel(10, 50 + r), RING_COLOUR);
    // Centres stay untouched.
    assert_eq!(*img.get_pixel(32, 32), image::Rgb([0, 0, 0]));

    // "0" beside the first ring: the top row of the glyph is .XXX.
    let (lx, ly) = (32 + r + 2, 32 - r);
    assert_eq!(*img.get_pixel(lx, ly), image::Rgb([0, 0, 0]));
    assert_eq!(*img.get_pixel(lx + 1, ly), LABEL_COLOUR);
    let labelled = img.pixels().filter(|&&p| p == LABEL_COLOUR).count();
    // Glyph "0" lights 19 pixels and "1" lights 10.
    assert_eq!(labelled, 29);
}
