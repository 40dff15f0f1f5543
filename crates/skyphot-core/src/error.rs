use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotometryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input directory does not exist: {0}")]
    MissingInputDir(PathBuf),

    #[error("No frames found in {0}")]
    EmptyFrameList(PathBuf),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Missing required header keyword '{0}'")]
    MissingHeader(String),

    #[error("Header keyword '{key}' has an unusable value: {value}")]
    InvalidHeader { key: String, value: String },

    #[error("Invalid background setting: box {box_size}, filter {filter_width} (both must be positive)")]
    InvalidBackgroundSetting {
        box_size: usize,
        filter_width: usize,
    },

    #[error("Grid shape mismatch in {array}: expected {expected:?}, got {actual:?}")]
    GridShapeMismatch {
        array: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Aperture input shape mismatch: {0}")]
    ApertureShape(String),

    #[error("Invalid object selection: {0}")]
    InvalidSelection(String),

    #[error("No objects detected in the reference frame")]
    EmptyCatalog,

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, PhotometryError>;
