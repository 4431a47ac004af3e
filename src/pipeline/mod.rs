//! C7: the four-stage batch processing pipeline (preprocess, xmlgen, compress,
//! output) that turns submitted cell buffers into ZIP-packaged worksheet parts.

pub mod batch;
pub mod perf;
pub mod queue;
pub mod stage;
pub mod stages;
pub mod worker;

pub use batch::Batch;
pub use perf::{PerformanceReport, StageStats};
pub use queue::BoundedQueue;
pub use stage::{Stage, StageKind};
pub use worker::{Pipeline, PipelineConfig, PipelineState};
