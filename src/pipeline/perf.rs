//! Pipeline performance tracking and bottleneck detection.
//!
//! Grounded in `original_source/include/TinaXlsx/TXBatchPipelineStages.hpp`'s
//! per-stage statistics and the batch processor's `getPerformanceStats`, generalized
//! from its single-stage form to the four concrete [`super::stage::StageKind`]s.

use std::sync::Mutex;
use std::time::Duration;

use super::stage::StageKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct StageStats {
    pub batches_processed: u64,
    pub failed: u64,
    pub total_time: Duration,
}

impl StageStats {
    pub fn avg_batch_time(&self) -> Duration {
        if self.batches_processed == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.batches_processed as u32
        }
    }

    pub fn throughput_batches_per_sec(&self) -> f64 {
        let secs = self.total_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.batches_processed as f64 / secs
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceReport {
    pub preprocess: StageStats,
    pub xmlgen: StageStats,
    pub compress: StageStats,
    pub output: StageStats,
}

impl PerformanceReport {
    pub fn stats_for(&self, kind: StageKind) -> StageStats {
        match kind {
            StageKind::Preprocess => self.preprocess,
            StageKind::XmlGen => self.xmlgen,
            StageKind::Compress => self.compress,
            StageKind::Output => self.output,
        }
    }

    pub fn total_batches_processed(&self, kind: StageKind) -> u64 {
        self.stats_for(kind).batches_processed
    }

    pub fn total_failed(&self, kind: StageKind) -> u64 {
        self.stats_for(kind).failed
    }

    /// Identifies the slowest stage by average per-batch time — the stage most
    /// likely to be gating overall throughput, since the pipeline's queues mean a
    /// faster downstream stage just ends up idle waiting on a slower upstream one.
    pub fn detect_bottleneck(&self) -> Option<StageKind> {
        StageKind::ALL
            .iter()
            .copied()
            .filter(|k| self.stats_for(*k).batches_processed > 0)
            .max_by_key(|k| self.stats_for(*k).avg_batch_time())
    }
}

#[derive(Default)]
pub struct PipelineTracker {
    inner: Mutex<PerformanceReport>,
}

impl PipelineTracker {
    pub fn record(&self, kind: StageKind, elapsed: Duration, batches: u64) {
        let mut report = self.inner.lock().expect("perf tracker mutex poisoned");
        let stats = match kind {
            StageKind::Preprocess => &mut report.preprocess,
            StageKind::XmlGen => &mut report.xmlgen,
            StageKind::Compress => &mut report.compress,
            StageKind::Output => &mut report.output,
        };
        stats.batches_processed += batches;
        stats.total_time += elapsed;
    }

    /// Records a batch that failed to process, so throughput and bottleneck
    /// detection aren't the only visible signal when a stage is actually erroring.
    pub fn record_failure(&self, kind: StageKind) {
        let mut report = self.inner.lock().expect("perf tracker mutex poisoned");
        let stats = match kind {
            StageKind::Preprocess => &mut report.preprocess,
            StageKind::XmlGen => &mut report.xmlgen,
            StageKind::Compress => &mut report.compress,
            StageKind::Output => &mut report.output,
        };
        stats.failed += 1;
    }

    pub fn report(&self) -> PerformanceReport {
        *self.inner.lock().expect("perf tracker mutex poisoned")
    }
}
