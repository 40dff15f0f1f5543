use std::path::PathBuf;

use ndarray::Array2;

/// A single exposure: pixel data plus the header scalars the reduction needs.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data in ADU, row-major, shape = (height, width)
    pub data: Array2<f32>,
    pub header: FrameHeader,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>, header: FrameHeader) -> Self {
        Self {
            data,
            header,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub frame_index: usize,
    pub path: Option<PathBuf>,
}

/// Header values consumed by the reduction.
///
/// Exposure time, gain, bin factor and airmass are required; the three time
/// standards are NaN when the header does not carry them.
#[derive(Clone, Debug)]
pub struct FrameHeader {
    pub exposure: f64,
    pub gain: f64,
    pub bin_factor: f64,
    pub airmass: f64,
    pub jd: f64,
    pub hjd: f64,
    pub bjd: f64,
    pub identifiers: FrameIdentifiers,
}

impl FrameHeader {
    /// Header for synthetic data: unit exposure/gain/binning, no times.
    pub fn with_exposure(exposure: f64) -> Self {
        Self {
            exposure,
            gain: 1.0,
            bin_factor: 1.0,
            airmass: 1.0,
            jd: f64::NAN,
            hjd: f64::NAN,
            bjd: f64::NAN,
            identifiers: FrameIdentifiers::default(),
        }
    }
}

/// Descriptive header fields carried through to the output file.
#[derive(Clone, Debug, Default)]
pub struct FrameIdentifiers {
    pub object: Option<String>,
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub filter_a: Option<String>,
    pub filter_b: Option<String>,
    pub telescope: Option<String>,
    pub instrument: Option<String>,
    pub observer: Option<String>,
    pub date_obs: Option<String>,
}

impl FrameIdentifiers {
    /// Combined filter name: both filter wheels, "Empty" slots dropped,
    /// "WHITE" when nothing remains.
    pub fn filter_name(&self) -> String {
        let clean = |f: &Option<String>| -> String {
            match f {
                Some(s) if !s.contains("Empty") => s.trim().to_string(),
                _ => String::new(),
            }
        };
        let combined = clean(&self.filter_a) + &clean(&self.filter_b);
        if combined.is_empty() {
            "WHITE".to_string()
        } else {
            combined
        }
    }
}

/// Sub-pixel drift of a frame relative to the reference frame.
///
/// Star positions in the drifted frame are `reference - offset`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegistrationOffset {
    pub dx: f64,
    pub dy: f64,
}
