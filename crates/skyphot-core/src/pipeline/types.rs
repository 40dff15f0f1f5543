/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Listing,
    Cataloging,
    Photometry,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listing => write!(f, "Listing frames"),
            Self::Cataloging => write!(f, "Building catalog"),
            Self::Photometry => write!(f, "Measuring frames"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Where a frame is in its reduction.
///
/// `AwaitingReference` is only entered for frame 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    AwaitingReference,
    Registering,
    BackgroundSweep,
    Refining,
    Summing,
    Stored,
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingReference => "awaiting reference",
            Self::Registering => "registering",
            Self::BackgroundSweep => "background sweep",
            Self::Refining => "refining",
            Self::Summing => "summing",
            Self::Stored => "stored",
        };
        f.write_str(name)
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g. frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_photometry` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
