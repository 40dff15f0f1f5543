pub mod catalog;
pub mod config;
mod orchestrator;
mod processor;
mod types;

pub use catalog::{build_catalog, empty_apertures, Catalog};
pub use orchestrator::{reduce_frames, run_photometry, run_photometry_reported, PhotometryRun};
pub use processor::FrameProcessor;
pub use types::{FrameState, PipelineStage, ProgressReporter};
