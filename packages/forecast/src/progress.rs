//! Progress reporting for batch training.
//!
//! The trainer reports once when the batch starts, once per region as it
//! finishes (from rayon worker threads), and once at the end. The CLI
//! renders these events with `indicatif`; library callers and tests pass
//! [`NullProgress`].

/// How a region's training ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOutcome {
    /// A model was fit and evaluated.
    Trained,
    /// The region was screened out before fitting.
    Skipped,
    /// Fitting or evaluation failed.
    Failed,
}

/// Receives training progress. Must be `Send + Sync` since regions finish
/// on worker threads.
pub trait TrainingProgress: Send + Sync {
    /// Training is starting over `regions` regions.
    fn started(&self, regions: u64);

    /// `region` finished with `outcome`.
    fn region_finished(&self, region: &str, outcome: RegionOutcome);

    /// Every region has finished.
    fn finished(&self, summary: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl TrainingProgress for NullProgress {
    fn started(&self, _regions: u64) {}
    fn region_finished(&self, _region: &str, _outcome: RegionOutcome) {}
    fn finished(&self, _summary: String) {}
}
