//! Core engine for high-performance SpreadsheetML writing: a tiered memory
//! allocator (C1-C3), a structure-of-arrays cell buffer with batch operations
//! (C4-C5), a zero-copy XML serializer (C6), and a four-stage worker pipeline that
//! assembles the result into a ZIP/XLSX package (C7).

pub mod alloc;
pub mod buffer;
pub mod coord;
pub mod error;
pub mod pipeline;
pub mod serialize;
pub mod string_pool;
pub mod zip_sink;

pub use error::{CoreError, Result};
