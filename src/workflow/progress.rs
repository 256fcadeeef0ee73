//! Progress reporting for long-running workflow steps.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Host-supplied sink for `(status, percent)` events.
pub type ProgressCallback = Arc<dyn Fn(&str, u8) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Generate,
    Verify,
    Validate,
    Execute,
    Format,
}

impl ProgressStage {
    pub fn percent(self) -> u8 {
        match self {
            ProgressStage::Generate => 20,
            ProgressStage::Verify => 40,
            ProgressStage::Validate => 60,
            ProgressStage::Execute => 80,
            ProgressStage::Format => 100,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            ProgressStage::Generate => "Generating SQL query...",
            ProgressStage::Verify => "Verifying query intent...",
            ProgressStage::Validate => "Validating SQL syntax...",
            ProgressStage::Execute => "Executing query...",
            ProgressStage::Format => "Formatting results...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    #[default]
    Standalone,
    /// Embedded in a larger pipeline; reported values are halved.
    SubWorkflow,
}

impl ProgressMode {
    pub fn scale(self, base: u8) -> u8 {
        match self {
            ProgressMode::Standalone => base,
            ProgressMode::SubWorkflow => base / 2,
        }
    }
}

#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    mode: ProgressMode,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>, mode: ProgressMode) -> Self {
        Self { callback, mode }
    }

    /// Test helper: no callback, `Standalone` mode.
    #[cfg(test)]
    pub(crate) fn silent() -> Self {
        Self::default()
    }

    /// Forward a raw percentage after mode scaling. Returns the reported value.
    pub fn report(&self, status: &str, base: u8) -> u8 {
        let percent = self.mode.scale(base.min(100));
        debug!(percent, status, "Workflow progress");
        if let Some(callback) = &self.callback {
            // A panicking sink must not take the workflow down with it.
            if catch_unwind(AssertUnwindSafe(|| callback(status, percent))).is_err() {
                warn!(percent, "Progress callback panicked; ignoring");
            }
        }
        percent
    }

    pub fn report_stage(&self, stage: ProgressStage) -> u8 {
        self.report(stage.status(), stage.percent())
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("mode", &self.mode)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
