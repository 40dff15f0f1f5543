//! FITS access through `fitrs`: header lookups, array decoding and
//! multi-extension writing.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use fitrs::{Fits, FitsData, FitsDataArray};
use ndarray::{Array, Array2, ArrayD, Dimension, IxDyn};

use crate::error::{PhotometryError, Result};

pub use fitrs::{Hdu, HeaderValue};

const SIGNATURE: &[u8] = b"SIMPLE  =";

/// Numeric value of a card; quoted numbers are accepted.
pub fn header_f64(hdu: &Hdu, key: &str) -> Option<f64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(*n as f64),
        HeaderValue::RealFloatingNumber(f) => Some(*f),
        HeaderValue::CharacterString(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text of a card, trimmed; numbers and logicals are formatted.
pub fn header_text(hdu: &Hdu, key: &str) -> Option<String> {
    hdu.value(key).map(value_text)
}

pub fn value_text(value: &HeaderValue) -> String {
    match value {
        HeaderValue::CharacterString(s) => s.trim().to_string(),
        HeaderValue::Logical(b) => if *b { "T" } else { "F" }.to_string(),
        HeaderValue::IntegerNumber(n) => n.to_string(),
        HeaderValue::RealFloatingNumber(f) => f.to_string(),
        other => format!("{other:?}"),
    }
}

fn header_int(hdu: &Hdu, key: &str) -> Result<i64> {
    match hdu.value(key) {
        Some(HeaderValue::IntegerNumber(n)) => Ok(*n as i64),
        Some(other) => Err(PhotometryError::InvalidFits(format!(
            "{key} is not an integer: {}",
            value_text(other)
        ))),
        None => Err(PhotometryError::InvalidFits(format!("missing {key}"))),
    }
}

/// Array shape in ndarray order (NAXISn first).
pub fn hdu_shape(hdu: &Hdu) -> Result<Vec<usize>> {
    let naxis = header_int(hdu, "NAXIS")?;
    let mut shape = (1..=naxis)
        .map(|i| header_int(hdu, &format!("NAXIS{i}")).map(|n| n.max(0) as usize))
        .collect::<Result<Vec<_>>>()?;
    shape.reverse();
    Ok(shape)
}

/// Decode an HDU's data to f64, applying BSCALE/BZERO to integer data.
/// Blank integer pixels become NaN.
pub fn read_array(hdu: &Hdu) -> Result<ArrayD<f64>> {
    let shape = hdu_shape(hdu)?;
    let bscale = header_f64(hdu, "BSCALE").unwrap_or(1.0);
    let bzero = header_f64(hdu, "BZERO").unwrap_or(0.0);
    let scaled = |raw: f64| raw * bscale + bzero;

    let values: Vec<f64> = match hdu.read_data() {
        FitsData::Characters(_) => {
            return Err(PhotometryError::InvalidFits("HDU holds character data".into()));
        }
        FitsData::IntegersI32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|&v| v.map_or(f64::NAN, |raw| scaled(raw as f64)))
            .collect(),
        FitsData::IntegersU32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|&v| v.map_or(f64::NAN, |raw| scaled(raw as f64)))
            .collect(),
        FitsData::FloatingPoint32(FitsDataArray { data, .. }) => data.iter().map(|&v| v as f64).collect(),
        FitsData::FloatingPoint64(FitsDataArray { data, .. }) => data.iter().copied().collect(),
    };

    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(PhotometryError::InvalidFits(format!(
            "data holds {} values, header shape {shape:?} needs {expected}",
            values.len()
        )));
    }
    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| PhotometryError::InvalidFits(e.to_string()))
}

/// Two-dimensional image of an HDU as f32, shape (height, width).
pub fn read_image(hdu: &Hdu) -> Result<Array2<f32>> {
    let data = read_array(hdu)?;
    let shape = data.shape().to_vec();
    data.mapv(|v| v as f32)
        .into_dimensionality()
        .map_err(|_| PhotometryError::InvalidFits(format!("not a 2-D image: {shape:?}")))
}

/// An opened FITS file.
pub struct FitsFile {
    fits: Fits,
    path: PathBuf,
}

impl FitsFile {
    /// Open a FITS file; anything not starting with a SIMPLE card is rejected
    /// before parsing.
    pub fn open(path: &Path) -> Result<Self> {
        let mut signature = [0u8; 9];
        File::open(path)?.read_exact(&mut signature).map_err(|_| not_fits(path))?;
        if &signature[..] != SIGNATURE {
            return Err(not_fits(path));
        }
        let fits = Fits::open(path)?;
        Ok(Self {
            fits,
            path: path.to_path_buf(),
        })
    }

    pub fn primary(&self) -> Result<Hdu> {
        self.fits
            .get(0)
            .ok_or_else(|| PhotometryError::InvalidFits(format!("{} has no primary HDU", self.path.display())))
    }

    /// Extension with the given EXTNAME.
    pub fn extension(&self, extname: &str) -> Result<Hdu> {
        self.fits
            .get_by_name(extname)
            .ok_or_else(|| PhotometryError::InvalidFits(format!("no extension named {extname}")))
    }

    pub fn read_extension(&self, extname: &str) -> Result<ArrayD<f64>> {
        read_array(&self.extension(extname)?)
    }
}

fn not_fits(path: &Path) -> PhotometryError {
    PhotometryError::InvalidFits(format!("{} does not start with a SIMPLE card", path.display()))
}

/// NAXIS1 is the last ndarray axis.
fn naxes(shape: &[usize]) -> Vec<usize> {
    shape.iter().rev().copied().collect()
}

/// Named f64 extension.
pub fn f64_extension<D: Dimension>(extname: &str, array: &Array<f64, D>) -> Hdu {
    let mut hdu = Hdu::new(&naxes(array.shape()), array.iter().copied().collect::<Vec<f64>>());
    hdu.insert("EXTNAME", extname);
    hdu
}

/// Named i32 extension.
pub fn i32_extension<D: Dimension>(extname: &str, array: &Array<i32, D>) -> Hdu {
    let mut hdu = Hdu::new(&naxes(array.shape()), array.iter().copied().collect::<Vec<i32>>());
    hdu.insert("EXTNAME", extname);
    hdu
}

/// Primary HDU holding a 32-bit float image.
pub fn image_hdu(image: &Array2<f32>) -> Hdu {
    Hdu::new(&naxes(image.shape()), image.iter().copied().collect::<Vec<f32>>())
}

/// Insert a real card unless the value is not finite.
pub fn insert_finite(hdu: &mut Hdu, key: &str, value: f64) {
    if value.is_finite() {
        hdu.insert(key, value);
    }
}

/// Create `path` with a primary HDU followed by the extensions in order.
pub fn write_fits(path: &Path, primary: Hdu, extensions: Vec<Hdu>) -> Result<()> {
    let mut fits = Fits::create(path, primary)?;
    for hdu in extensions {
        fits.push(hdu)?;
    }
    Ok(())
}
