pub mod components;
pub mod extract;

pub use extract::{DetectedObject, Extraction, SourceExtractor, ThresholdExtractor};
