//! Tiered memory management: C1 (slab) + C2 (chunk) behind the C3 unified façade,
//! with a background C3 monitor for threshold events and trend prediction.

pub mod chunk;
pub mod monitor;
pub mod slab;
pub mod unified;

pub use chunk::{ChunkAllocator, ChunkConfig, ChunkStats};
pub use monitor::{
    CleanupStrategy, CompactCleanupStrategy, FullCleanupStrategy, MemoryEvent, MemoryEventType,
    MemoryTrend, Monitor, MonitorConfig, MonitoringStats,
};
pub use slab::{SlabAllocator, SlabConfig, SlabStats};
pub use unified::{UnifiedAllocator, UnifiedConfig, UnifiedStats};
