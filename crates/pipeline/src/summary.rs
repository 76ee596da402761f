//! Per-layer and per-run outcome reporting.

use std::time::Duration;

use tiles_common::ErrorKind;

/// Terminal state of one layer after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerState {
    /// All five stages completed or were legitimately skipped.
    Published,
    /// The run was cancelled before this layer finished.
    Cancelled,
    /// A stage failed; later stages were not attempted.
    Failed {
        stage: crate::Stage,
        kind: ErrorKind,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct LayerReport {
    pub slug: String,
    pub state: LayerState,
    /// Stages that actually executed (not skipped).
    pub stages_run: Vec<crate::Stage>,
    /// Stages bypassed because their artifact already existed.
    pub stages_skipped: Vec<crate::Stage>,
    pub tiles_uploaded: usize,
    pub tiles_skipped: usize,
    pub elapsed: Duration,
}

impl LayerReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, LayerState::Published)
    }
}

/// Aggregated outcome of a whole run across all layers.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub layers: Vec<LayerReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: LayerReport) {
        self.layers.push(report);
    }

    pub fn published(&self) -> usize {
        self.layers.iter().filter(|l| l.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l.state, LayerState::Failed { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.state == LayerState::Cancelled)
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.layers.iter().all(|l| l.succeeded())
    }
}
