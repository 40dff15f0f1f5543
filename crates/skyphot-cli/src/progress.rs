use indicatif::{ProgressBar, ProgressStyle};
use skyphot_core::pipeline::{PipelineStage, ProgressReporter};

/// Drives one terminal progress bar from pipeline events.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        let style = match total_items {
            Some(_) => ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len} ({eta})")
                .map(|s| s.progress_chars("=> ")),
            None => ProgressStyle::default_spinner().template("{msg:20} {spinner}"),
        };
        if let Ok(style) = style {
            self.bar.set_style(style);
        }
        self.bar.reset();
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        self.bar.tick();
    }
}
