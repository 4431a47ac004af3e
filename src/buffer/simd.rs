//! C5: batch operations over a [`CompactCellBuffer`].
//!
//! This crate carries no SIMD intrinsics dependency, so every operation here is a
//! scalar implementation, written in a loop shape (flat slices, no branching inside the
//! hot loop) that the compiler can auto-vectorize on its own.

use std::sync::Mutex;
use std::time::Instant;

use crate::coord;
use crate::error::{CoreError, Result};

use super::cell_buffer::CompactCellBuffer;
use super::types::{CellType, CellValue};

#[derive(Debug, Default, Clone, Copy)]
pub struct CellStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub std_dev: f64,
    pub number_cells: usize,
    pub string_cells: usize,
    pub empty_cells: usize,
}

/// Fills every cell in `range` with `value`, overwriting any existing cells at those
/// coordinates.
pub fn fill_range(buffer: &mut CompactCellBuffer, range: &coord::Range, value: f64, style: u16) -> Result<()> {
    buffer.mark_range_empty(range);
    buffer.compress_sparse();
    buffer.reserve(range.cell_count() as usize);
    for (row, col) in range.iter_cells() {
        buffer.append_number(row, col, value, style)?;
    }
    Ok(())
}

/// Appends a run of mixed-type values starting at `(row, start_col)` moving across
/// columns, via [`CompactCellBuffer::append_mixed`].
pub fn batch_create_mixed(
    buffer: &mut CompactCellBuffer,
    pool: &crate::string_pool::StringPool,
    row: u32,
    start_col: u32,
    values: &[CellValue],
) -> Result<()> {
    buffer.reserve(values.len());
    for (i, value) in values.iter().enumerate() {
        buffer.append_mixed(row, start_col + i as u32, value.clone(), pool, 0)?;
    }
    Ok(())
}

/// Copies every cell in `src_range` to the same shape anchored at `dst_start`,
/// preserving each cell's type, value, style, and (for string/formula cells) its
/// existing string-table or pool reference.
pub fn copy_range(buffer: &mut CompactCellBuffer, src_range: &coord::Range, dst_start: (u32, u32)) -> Result<()> {
    let row_shift = dst_start.0 as i64 - src_range.start_row as i64;
    let col_shift = dst_start.1 as i64 - src_range.start_col as i64;
    let dst_end_row = src_range.end_row as i64 + row_shift;
    let dst_end_col = src_range.end_col as i64 + col_shift;
    if dst_start.0 == 0
        || dst_start.1 == 0
        || dst_end_row > coord::MAX_ROW as i64
        || dst_end_col > coord::MAX_COL as i64
    {
        return Err(CoreError::InvalidRange(
            "copy_range destination falls outside the addressable sheet".into(),
        ));
    }

    let to_copy: Vec<usize> = buffer
        .coordinates()
        .iter()
        .enumerate()
        .filter_map(|(i, &packed)| {
            let (row, col) = coord::unpack(packed);
            src_range.contains(row, col).then_some(i)
        })
        .collect();

    for i in to_copy {
        let (row, col) = coord::unpack(buffer.coordinates()[i]);
        let new_row = (row as i64 + row_shift) as u32;
        let new_col = (col as i64 + col_shift) as u32;
        let cell_type = buffer.cell_types()[i];
        let number = buffer.number_values()[i];
        let style = buffer.style_indices()[i];
        let string_index = buffer.string_indices()[i];
        buffer.push_cell_raw(new_row, new_col, number, string_index, style, cell_type)?;
    }
    Ok(())
}

/// Resets every cell in `range` to empty, in place.
pub fn clear_range(buffer: &mut CompactCellBuffer, range: &coord::Range) {
    buffer.mark_range_empty(range);
}

/// Classifies each input string as it would be stored if appended as a cell: a
/// number if it parses as one, a boolean if it is (case-insensitively) `"true"` or
/// `"false"`, otherwise a generic string.
pub fn batch_detect_types(strings: &[&str]) -> Vec<CellType> {
    strings
        .iter()
        .map(|&s| {
            if s.parse::<f64>().is_ok() {
                CellType::Number
            } else if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
                CellType::Boolean
            } else {
                CellType::InlineString
            }
        })
        .collect()
}

/// Appends a run of `count` numbers starting at `(row, col)` moving across columns.
pub fn batch_create_numbers(buffer: &mut CompactCellBuffer, row: u32, start_col: u32, values: &[f64]) -> Result<()> {
    buffer.reserve(values.len());
    for (i, &v) in values.iter().enumerate() {
        buffer.append_number(row, start_col + i as u32, v, 0)?;
    }
    Ok(())
}

/// Appends a run of strings, interning long ones as shared strings via `pool`.
pub fn batch_create_strings(
    buffer: &mut CompactCellBuffer,
    pool: &crate::string_pool::StringPool,
    row: u32,
    start_col: u32,
    values: &[&str],
) -> Result<()> {
    buffer.reserve(values.len());
    for (i, &v) in values.iter().enumerate() {
        buffer.append_string(row, start_col + i as u32, v, pool, 0)?;
    }
    Ok(())
}

/// Sums every numeric cell's value, skipping non-numeric cells.
pub fn batch_sum(buffer: &CompactCellBuffer) -> f64 {
    let mut total = 0.0;
    for (i, &tag) in buffer.cell_types().iter().enumerate() {
        if tag == CellType::Number as u8 {
            total += buffer.number_values()[i];
        }
    }
    total
}

/// Computes descriptive statistics over the numeric cells in `buffer`.
pub fn batch_calculate_stats(buffer: &CompactCellBuffer) -> CellStats {
    let mut stats = CellStats {
        min_value: f64::INFINITY,
        max_value: f64::NEG_INFINITY,
        ..CellStats::default()
    };

    let mut numbers = Vec::new();
    for (i, &tag) in buffer.cell_types().iter().enumerate() {
        match CellType::from_tag(tag) {
            Some(CellType::Number) => {
                let v = buffer.number_values()[i];
                numbers.push(v);
                stats.number_cells += 1;
            }
            Some(CellType::InlineString) | Some(CellType::SharedString) => stats.string_cells += 1,
            Some(CellType::Empty) => stats.empty_cells += 1,
            _ => {}
        }
    }

    stats.count = numbers.len();
    if numbers.is_empty() {
        stats.min_value = 0.0;
        stats.max_value = 0.0;
        return stats;
    }

    stats.sum = numbers.iter().sum();
    stats.mean = stats.sum / numbers.len() as f64;
    stats.min_value = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
    stats.max_value = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let variance = numbers.iter().map(|v| (v - stats.mean).powi(2)).sum::<f64>() / numbers.len() as f64;
    stats.std_dev = variance.sqrt();
    stats
}

/// Appends the `(row, col)` of every numeric cell within `1e-10` of `target` to
/// `results`, in buffer order.
pub fn batch_find_value(buffer: &CompactCellBuffer, target: f64, results: &mut Vec<(u32, u32)>) {
    const TOLERANCE: f64 = 1e-10;
    for (i, &tag) in buffer.cell_types().iter().enumerate() {
        if tag == CellType::Number as u8 && (buffer.number_values()[i] - target).abs() <= TOLERANCE {
            results.push(coord::unpack(buffer.coordinates()[i]));
        }
    }
}

/// Converts a batch of A1-notation strings into packed coordinates, appending each
/// success to `out`. Unparseable references are skipped rather than aborting the
/// whole batch. Returns the number of references successfully converted.
pub fn batch_convert_a1_to_packed(refs: &[&str], out: &mut Vec<u32>) -> usize {
    let mut successes = 0;
    for &r in refs {
        if let Ok((row, col)) = coord::parse_a1(r) {
            out.push(coord::pack(row, col));
            successes += 1;
        }
    }
    successes
}

/// No-op warm-up hook: this crate has no SIMD dispatch table to prime, so calling it
/// costs nothing and changes nothing.
pub fn warmup_simd(_hint_size: usize) {}

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchPerformanceStats {
    pub total_operations: u64,
    pub total_cells_processed: u64,
    pub total_time_micros: u64,
}

impl BatchPerformanceStats {
    pub fn avg_throughput_cells_per_sec(&self) -> f64 {
        if self.total_time_micros == 0 {
            0.0
        } else {
            self.total_cells_processed as f64 / (self.total_time_micros as f64 / 1_000_000.0)
        }
    }
}

static PERFORMANCE_STATS: Mutex<BatchPerformanceStats> = Mutex::new(BatchPerformanceStats {
    total_operations: 0,
    total_cells_processed: 0,
    total_time_micros: 0,
});

/// Runs `f`, recording its duration and `cells_processed` into the process-global
/// batch performance counters.
pub fn timed_batch_operation<T>(cells_processed: u64, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    let mut stats = PERFORMANCE_STATS.lock().expect("batch perf mutex poisoned");
    stats.total_operations += 1;
    stats.total_cells_processed += cells_processed;
    stats.total_time_micros += elapsed.as_micros() as u64;
    result
}

pub fn batch_performance_stats() -> BatchPerformanceStats {
    *PERFORMANCE_STATS.lock().expect("batch perf mutex poisoned")
}

pub fn reset_batch_performance_stats() {
    *PERFORMANCE_STATS.lock().expect("batch perf mutex poisoned") = BatchPerformanceStats::default();
}
