//! C4/C5: the structure-of-arrays cell buffer and its batch operations.

pub mod cell_buffer;
pub mod simd;
pub mod types;

pub use cell_buffer::CompactCellBuffer;
pub use simd::{BatchPerformanceStats, CellStats};
pub use types::{CellType, CellValue};
