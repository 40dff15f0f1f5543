use std::sync::Arc;

use tracing::info;

use crate::align::{PhaseCorrelation, Registration};
use crate::detection::{SourceExtractor, ThresholdExtractor};
use crate::error::{PhotometryError, Result};
use crate::frame::FrameIdentifiers;
use crate::grid::MeasurementGrid;
use crate::io::output::write_photometry;
use crate::io::source::{FitsDirectory, FrameSource};

use super::catalog::Catalog;
use super::config::PhotometryConfig;
use super::processor::FrameProcessor;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Completed reduction.
#[derive(Clone, Debug)]
pub struct PhotometryRun {
    pub grid: MeasurementGrid,
    pub catalog: Catalog,
    /// Identifiers of the reference frame.
    pub identifiers: FrameIdentifiers,
}

/// Reduce every frame of `source` in order, reporting one advance per frame.
/// Frame metadata is validated for the whole source before the reference
/// frame is processed.
pub fn reduce_frames(
    config: &PhotometryConfig,
    source: &dyn FrameSource,
    registration: &dyn Registration,
    extractor: &dyn SourceExtractor,
    reporter: &dyn ProgressReporter,
) -> Result<PhotometryRun> {
    let total = source.len();
    if total == 0 {
        return Err(PhotometryError::EmptyFrameList(config.input_dir.clone()));
    }
    source.validate()?;
    let mut processor = FrameProcessor::new(config, total, registration, extractor)?;

    reporter.begin_stage(PipelineStage::Cataloging, None);
    let reference = source.load(0)?;
    processor.process(0, &reference)?;
    reporter.finish_stage();
    if let Some(catalog) = processor.catalog() {
        info!(stars = catalog.len(), frames = total, "Starting photometry");
    }

    reporter.begin_stage(PipelineStage::Photometry, Some(total));
    reporter.advance(1);
    for index in 1..total {
        let frame = source.load(index)?;
        processor.process(index, &frame)?;
        reporter.advance(index + 1);
    }
    reporter.finish_stage();

    let (grid, catalog, identifiers) = processor.finish()?;
    info!(frames = total, stars = catalog.len(), settings = grid.settings.len(), "Photometry complete");
    Ok(PhotometryRun {
        grid,
        catalog,
        identifiers,
    })
}

/// Run the full reduction with a thread-safe progress reporter: list the
/// input directory, reduce every frame, write the photometry file.
pub fn run_photometry_reported(config: &PhotometryConfig, reporter: Arc<dyn ProgressReporter>) -> Result<PhotometryRun> {
    config.validate()?;
    reporter.begin_stage(PipelineStage::Listing, None);
    let source = FitsDirectory::open(&config.input_dir, &config.file_extension, config.header_keys.clone())?;
    reporter.finish_stage();

    let run = reduce_frames(
        config,
        &source,
        &PhaseCorrelation,
        &ThresholdExtractor {
            min_area: config.catalog.min_area,
        },
        reporter.as_ref(),
    )?;

    reporter.begin_stage(PipelineStage::Writing, None);
    write_photometry(&config.output, &run.grid, &run.identifiers)?;
    reporter.finish_stage();
    Ok(run)
}

/// Run the full reduction without progress reporting.
pub fn run_photometry(config: &PhotometryConfig) -> Result<PhotometryRun> {
    run_photometry_reported(config, Arc::new(NoOpReporter))
}
