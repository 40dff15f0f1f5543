use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PhotometryError, Result};
use crate::frame::{Frame, FrameHeader, FrameIdentifiers, FrameMetadata};
use crate::io::fits::{header_f64, header_text, read_image, value_text, FitsFile, Hdu};

/// Header keyword names; instruments disagree on these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderKeys {
    pub exposure: String,
    pub gain: String,
    pub bin_factor: String,
    pub airmass: String,
    pub jd: String,
    pub hjd: String,
    pub bjd: String,
    pub ra: String,
    pub dec: String,
    pub filter_a: String,
    pub filter_b: String,
    pub telescope: String,
    pub instrument: String,
    pub object: String,
    pub observer: String,
    pub date_obs: String,
}

impl Default for HeaderKeys {
    fn default() -> Self {
        Self {
            exposure: "EXPOSURE".into(),
            gain: "PREAMP".into(),
            bin_factor: "VBIN".into(),
            airmass: "AIRMASS".into(),
            jd: "JD".into(),
            hjd: "HJD".into(),
            bjd: "BJD".into(),
            ra: "OBJRA".into(),
            dec: "OBJDEC".into(),
            filter_a: "FILTERA".into(),
            filter_b: "FILTERB".into(),
            telescope: "TELESCOP".into(),
            instrument: "CAMERA".into(),
            object: "OBJECT".into(),
            observer: "OBSERVER".into(),
            date_obs: "DATE-OBS".into(),
        }
    }
}

fn required(header: &Hdu, key: &str) -> Result<f64> {
    let value = header
        .value(key)
        .ok_or_else(|| PhotometryError::MissingHeader(key.to_string()))?;
    header_f64(header, key)
        .filter(|v| v.is_finite())
        .ok_or_else(|| PhotometryError::InvalidHeader {
            key: key.to_string(),
            value: value_text(value),
        })
}

fn time_standard(header: &Hdu, key: &str) -> f64 {
    match header_f64(header, key) {
        Some(v) => v,
        None => {
            warn!(key, "Time standard missing from header, storing NaN");
            f64::NAN
        }
    }
}

/// Extract the reduction scalars from a FITS header.
///
/// Exposure, gain, bin factor and airmass are required; a missing or
/// non-numeric value is fatal. The time standards degrade to NaN.
pub fn read_frame_header(header: &Hdu, keys: &HeaderKeys) -> Result<FrameHeader> {
    let exposure = required(header, &keys.exposure)?;
    if exposure <= 0.0 {
        return Err(PhotometryError::InvalidHeader {
            key: keys.exposure.clone(),
            value: exposure.to_string(),
        });
    }

    Ok(FrameHeader {
        exposure,
        gain: required(header, &keys.gain)?,
        bin_factor: required(header, &keys.bin_factor)?,
        airmass: required(header, &keys.airmass)?,
        jd: time_standard(header, &keys.jd),
        hjd: time_standard(header, &keys.hjd),
        bjd: time_standard(header, &keys.bjd),
        identifiers: read_identifiers(header, keys),
    })
}

/// Descriptive fields; each is optional.
pub fn read_identifiers(header: &Hdu, keys: &HeaderKeys) -> FrameIdentifiers {
    let text = |key: &str| header_text(header, key).filter(|s| !s.is_empty());
    FrameIdentifiers {
        object: text(&keys.object),
        ra: text(&keys.ra),
        dec: text(&keys.dec),
        filter_a: text(&keys.filter_a),
        filter_b: text(&keys.filter_b),
        telescope: text(&keys.telescope),
        instrument: text(&keys.instrument),
        observer: text(&keys.observer),
        date_obs: text(&keys.date_obs),
    }
}

/// Read the primary image and header of a FITS frame.
pub fn load_frame(path: &Path, keys: &HeaderKeys) -> Result<Frame> {
    let file = FitsFile::open(path)?;
    let primary = file.primary()?;
    let header = read_frame_header(&primary, keys)?;
    let data = read_image(&primary)?;
    Ok(Frame {
        data,
        header,
        metadata: FrameMetadata {
            frame_index: 0,
            path: Some(path.to_path_buf()),
        },
    })
}

/// Check that a frame's required header values are present and valid
/// without decoding its pixels.
pub fn check_frame_header(path: &Path, keys: &HeaderKeys) -> Result<()> {
    let primary = FitsFile::open(path)?.primary()?;
    read_frame_header(&primary, keys).map(|_| ())
}
