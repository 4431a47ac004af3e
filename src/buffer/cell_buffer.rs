//! C4: structure-of-arrays cell buffer.
//!
//! Grounded in `original_source/include/TinaXlsx/TXBatchSIMDProcessor.hpp`'s
//! `TXCompactCellBuffer`: parallel arrays instead of an array of cell structs, so a
//! batch operation that only touches numbers (say) streams through one contiguous
//! `Vec<f64>` instead of skipping over string/style fields it doesn't need.

use crate::coord;
use crate::error::{CoreError, Result};
use crate::string_pool::StringPool;

use super::types::{CellType, CellValue};

/// Column-oriented cell storage. The five per-cell arrays (`coordinates`,
/// `number_values`, `string_indices`, `style_indices`, `cell_types`) are always the
/// same length; that length is `size`, distinct from `capacity` (the reserved backing
/// storage). `inline_strings` and `formulas` are separate, buffer-local tables:
/// `string_indices[i]` indexes into `inline_strings` when `cell_types[i] ==
/// InlineString`, into `formulas` when `cell_types[i] == Formula`, and into the owning
/// [`StringPool`] when `cell_types[i] == SharedString`.
#[derive(Debug, Default)]
pub struct CompactCellBuffer {
    coordinates: Vec<u32>,
    number_values: Vec<f64>,
    string_indices: Vec<u32>,
    style_indices: Vec<u16>,
    cell_types: Vec<u8>,
    inline_strings: Vec<String>,
    formulas: Vec<String>,
    is_sorted: bool,
}

const NO_STRING: u32 = u32::MAX;
const NO_STYLE: u16 = 0;

impl CompactCellBuffer {
    pub fn new() -> Self {
        CompactCellBuffer {
            is_sorted: true,
            ..Default::default()
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CompactCellBuffer {
            coordinates: Vec::with_capacity(capacity),
            number_values: Vec::with_capacity(capacity),
            string_indices: Vec::with_capacity(capacity),
            style_indices: Vec::with_capacity(capacity),
            cell_types: Vec::with_capacity(capacity),
            inline_strings: Vec::new(),
            formulas: Vec::new(),
            is_sorted: true,
        }
    }

    /// Grows or truncates the buffer to exactly `n` slots. Slots added by growing are
    /// empty cells at packed coordinate `0`; shrinking preserves the relative order (and
    /// thus `is_sorted`) of the slots that remain.
    pub fn resize(&mut self, n: usize) {
        let growing = n > self.coordinates.len();
        self.coordinates.resize(n, 0);
        self.number_values.resize(n, 0.0);
        self.string_indices.resize(n, NO_STRING);
        self.style_indices.resize(n, NO_STYLE);
        self.cell_types.resize(n, CellType::Empty as u8);
        if growing {
            self.is_sorted = false;
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.coordinates.reserve(additional);
        self.number_values.reserve(additional);
        self.string_indices.reserve(additional);
        self.style_indices.reserve(additional);
        self.cell_types.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.coordinates.capacity()
    }

    pub fn is_sorted(&self) -> bool {
        self.is_sorted
    }

    pub fn clear(&mut self) {
        self.coordinates.clear();
        self.number_values.clear();
        self.string_indices.clear();
        self.style_indices.clear();
        self.cell_types.clear();
        self.inline_strings.clear();
        self.formulas.clear();
        self.is_sorted = true;
    }

    pub fn shrink_to_fit(&mut self) {
        self.coordinates.shrink_to_fit();
        self.number_values.shrink_to_fit();
        self.string_indices.shrink_to_fit();
        self.style_indices.shrink_to_fit();
        self.cell_types.shrink_to_fit();
        self.inline_strings.shrink_to_fit();
        self.formulas.shrink_to_fit();
    }

    fn push_raw(&mut self, packed: u32, number: f64, string_index: u32, style: u16, cell_type: CellType) {
        if let Some(last) = self.coordinates.last() {
            if packed < *last {
                self.is_sorted = false;
            }
        }
        self.coordinates.push(packed);
        self.number_values.push(number);
        self.string_indices.push(string_index);
        self.style_indices.push(style);
        self.cell_types.push(cell_type as u8);
    }

    /// Appends a numeric cell at `(row, col)`, with optional style index.
    pub fn append_number(&mut self, row: u32, col: u32, value: f64, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        self.push_raw(packed, value, NO_STRING, style, CellType::Number);
        Ok(())
    }

    /// Appends a string cell, classifying it inline vs. shared via
    /// [`CellValue::should_share`]: short strings are copied into this buffer's local
    /// `inline_strings` table, long ones are interned into `pool` and referenced by
    /// index.
    pub fn append_string(&mut self, row: u32, col: u32, text: &str, pool: &StringPool, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        if CellValue::should_share(text) {
            let idx = pool.intern(text);
            self.push_raw(packed, 0.0, idx, style, CellType::SharedString);
        } else {
            let idx = self.inline_strings.len() as u32;
            self.inline_strings.push(text.to_string());
            self.push_raw(packed, 0.0, idx, style, CellType::InlineString);
        }
        Ok(())
    }

    pub fn append_boolean(&mut self, row: u32, col: u32, value: bool, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        self.push_raw(packed, if value { 1.0 } else { 0.0 }, NO_STRING, style, CellType::Boolean);
        Ok(())
    }

    pub fn append_empty(&mut self, row: u32, col: u32, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        self.push_raw(packed, 0.0, NO_STRING, style, CellType::Empty);
        Ok(())
    }

    pub fn append_formula(&mut self, row: u32, col: u32, expression: &str, cached_result: f64, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        let idx = self.formulas.len() as u32;
        self.formulas.push(expression.to_string());
        self.push_raw(packed, cached_result, idx, style, CellType::Formula);
        Ok(())
    }

    /// Appends a cell of whatever type `value` carries, dispatching to the matching
    /// `append_*` method.
    pub fn append_mixed(&mut self, row: u32, col: u32, value: CellValue, pool: &StringPool, style: u16) -> Result<()> {
        match value {
            CellValue::Empty => self.append_empty(row, col, style),
            CellValue::Number(v) => self.append_number(row, col, v, style),
            CellValue::Boolean(b) => self.append_boolean(row, col, b, style),
            CellValue::InlineString(text) => {
                coord::validate(row, col)?;
                let packed = coord::pack(row, col);
                let idx = self.inline_strings.len() as u32;
                self.inline_strings.push(text);
                self.push_raw(packed, 0.0, idx, style, CellType::InlineString);
                Ok(())
            }
            CellValue::SharedString(text) => {
                coord::validate(row, col)?;
                let packed = coord::pack(row, col);
                let idx = pool.intern(&text);
                self.push_raw(packed, 0.0, idx, style, CellType::SharedString);
                Ok(())
            }
            CellValue::Formula { expression, cached_result } => {
                self.append_formula(row, col, &expression, cached_result, style)
            }
        }
    }

    fn find_slot(&self, packed: u32) -> Option<usize> {
        self.coordinates.iter().position(|&c| c == packed)
    }

    /// Overwrites the cell at `(row, col)` in place if a slot for it already exists,
    /// appending a new slot otherwise. `O(n)` in the number of existing cells: unlike
    /// the per-sheet `coord_to_slot` index maintained by the external sheet façade this
    /// crate doesn't implement, this buffer has no persistent index of its own to keep
    /// in sync through sort/compress/clear, so lookups scan `coordinates` directly.
    pub fn set(&mut self, row: u32, col: u32, value: CellValue, pool: &StringPool, style: u16) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        match self.find_slot(packed) {
            Some(i) => self.overwrite_slot(i, value, pool, style),
            None => self.append_mixed(row, col, value, pool, style),
        }
    }

    fn overwrite_slot(&mut self, i: usize, value: CellValue, pool: &StringPool, style: u16) -> Result<()> {
        self.style_indices[i] = style;
        match value {
            CellValue::Empty => {
                self.number_values[i] = 0.0;
                self.string_indices[i] = NO_STRING;
                self.cell_types[i] = CellType::Empty as u8;
            }
            CellValue::Number(v) => {
                self.number_values[i] = v;
                self.string_indices[i] = NO_STRING;
                self.cell_types[i] = CellType::Number as u8;
            }
            CellValue::Boolean(b) => {
                self.number_values[i] = if b { 1.0 } else { 0.0 };
                self.string_indices[i] = NO_STRING;
                self.cell_types[i] = CellType::Boolean as u8;
            }
            CellValue::InlineString(text) => {
                let idx = self.inline_strings.len() as u32;
                self.inline_strings.push(text);
                self.string_indices[i] = idx;
                self.cell_types[i] = CellType::InlineString as u8;
            }
            CellValue::SharedString(text) => {
                let idx = pool.intern(&text);
                self.string_indices[i] = idx;
                self.cell_types[i] = CellType::SharedString as u8;
            }
            CellValue::Formula { expression, cached_result } => {
                let idx = self.formulas.len() as u32;
                self.formulas.push(expression);
                self.number_values[i] = cached_result;
                self.string_indices[i] = idx;
                self.cell_types[i] = CellType::Formula as u8;
            }
        }
        Ok(())
    }

    /// Appends a cell built from already-decoded raw fields, used by callers (like
    /// [`super::simd::copy_range`]) that are duplicating an existing slot's contents
    /// verbatim and so already have a valid `string_index` into this buffer's own
    /// tables or the owning string pool.
    pub(crate) fn push_cell_raw(&mut self, row: u32, col: u32, number: f64, string_index: u32, style: u16, cell_type: u8) -> Result<()> {
        coord::validate(row, col)?;
        let packed = coord::pack(row, col);
        let ct = CellType::from_tag(cell_type)
            .ok_or_else(|| CoreError::InvalidOperation(format!("unknown cell type tag {cell_type}")))?;
        self.push_raw(packed, number, string_index, style, ct);
        Ok(())
    }

    /// Resets every slot whose coordinate falls within `range` to an empty cell,
    /// in place, without removing the slot.
    pub(crate) fn mark_range_empty(&mut self, range: &coord::Range) {
        for i in 0..self.coordinates.len() {
            let (row, col) = coord::unpack(self.coordinates[i]);
            if range.contains(row, col) {
                self.cell_types[i] = CellType::Empty as u8;
                self.number_values[i] = 0.0;
                self.string_indices[i] = NO_STRING;
            }
        }
    }

    /// Reads back a decoded cell at buffer index `i`. Shared-string cells carry their
    /// pool index but not the resolved text — callers needing the literal string
    /// should resolve `string_indices()[i]` against the owning
    /// [`crate::string_pool::StringPool`] themselves (see [`Self::inline_string_at`]
    /// for the inline case, which this buffer can resolve on its own).
    pub fn cell_at(&self, i: usize) -> Option<(u32, u32, CellValue)> {
        let packed = *self.coordinates.get(i)?;
        let (row, col) = coord::unpack(packed);
        let cell_type = CellType::from_tag(self.cell_types[i])?;
        let value = match cell_type {
            CellType::Empty => CellValue::Empty,
            CellType::Number => CellValue::Number(self.number_values[i]),
            CellType::Boolean => CellValue::Boolean(self.number_values[i] != 0.0),
            CellType::InlineString => CellValue::InlineString(self.inline_string_at(i).unwrap_or_default().to_string()),
            CellType::SharedString => CellValue::SharedString(String::new()),
            CellType::Formula => CellValue::Formula {
                expression: self.formula_at(i).unwrap_or_default().to_string(),
                cached_result: self.number_values[i],
            },
        };
        Some((row, col, value))
    }

    /// Resolves the inline string text stored for cell index `i`, if that cell is an
    /// [`CellType::InlineString`].
    pub fn inline_string_at(&self, i: usize) -> Option<&str> {
        if self.cell_types.get(i).copied()? != CellType::InlineString as u8 {
            return None;
        }
        let idx = *self.string_indices.get(i)? as usize;
        self.inline_strings.get(idx).map(String::as_str)
    }

    /// Resolves the formula expression text stored for cell index `i`, if that cell is
    /// a [`CellType::Formula`].
    pub fn formula_at(&self, i: usize) -> Option<&str> {
        if self.cell_types.get(i).copied()? != CellType::Formula as u8 {
            return None;
        }
        let idx = *self.string_indices.get(i)? as usize;
        self.formulas.get(idx).map(String::as_str)
    }

    pub fn coordinates(&self) -> &[u32] {
        &self.coordinates
    }

    pub fn number_values(&self) -> &[f64] {
        &self.number_values
    }

    pub fn number_values_mut(&mut self) -> &mut [f64] {
        &mut self.number_values
    }

    pub fn string_indices(&self) -> &[u32] {
        &self.string_indices
    }

    pub fn style_indices(&self) -> &[u16] {
        &self.style_indices
    }

    pub fn cell_types(&self) -> &[u8] {
        &self.cell_types
    }

    /// Sorts all five arrays in lockstep by packed coordinate. Cells sharing a
    /// coordinate (a later write overwriting an earlier one) keep insertion order
    /// among themselves, since the sort is stable.
    pub fn sort_by_coordinates(&mut self) {
        if self.is_sorted {
            return;
        }
        let mut order: Vec<usize> = (0..self.coordinates.len()).collect();
        order.sort_by_key(|&i| self.coordinates[i]);

        self.coordinates = order.iter().map(|&i| self.coordinates[i]).collect();
        self.number_values = order.iter().map(|&i| self.number_values[i]).collect();
        self.string_indices = order.iter().map(|&i| self.string_indices[i]).collect();
        self.style_indices = order.iter().map(|&i| self.style_indices[i]).collect();
        self.cell_types = order.iter().map(|&i| self.cell_types[i]).collect();
        self.is_sorted = true;
    }

    /// Groups cell indices by row, in row order. Requires the buffer to be sorted by
    /// coordinate first (callers should call [`Self::sort_by_coordinates`]).
    pub fn row_groups(&self) -> Vec<(u32, std::ops::Range<usize>)> {
        let mut groups = Vec::new();
        let mut start = 0usize;
        let mut current_row = None;
        for (i, &packed) in self.coordinates.iter().enumerate() {
            let (row, _) = coord::unpack(packed);
            match current_row {
                None => current_row = Some(row),
                Some(r) if r != row => {
                    groups.push((r, start..i));
                    start = i;
                    current_row = Some(row);
                }
                _ => {}
            }
        }
        if let Some(r) = current_row {
            groups.push((r, start..self.coordinates.len()));
        }
        groups
    }

    /// Removes every slot whose cell type is [`CellType::Empty`], compacting the
    /// remaining slots in place. Returns the number of slots removed.
    pub fn compress_sparse(&mut self) -> usize {
        let keep: Vec<usize> = (0..self.coordinates.len())
            .filter(|&i| self.cell_types[i] != CellType::Empty as u8)
            .collect();
        let removed = self.coordinates.len() - keep.len();
        if removed == 0 {
            return 0;
        }
        self.coordinates = keep.iter().map(|&i| self.coordinates[i]).collect();
        self.number_values = keep.iter().map(|&i| self.number_values[i]).collect();
        self.string_indices = keep.iter().map(|&i| self.string_indices[i]).collect();
        self.style_indices = keep.iter().map(|&i| self.style_indices[i]).collect();
        self.cell_types = keep.iter().map(|&i| self.cell_types[i]).collect();
        removed
    }

    pub fn check_invariants(&self) -> Result<()> {
        let n = self.coordinates.len();
        if self.number_values.len() != n
            || self.string_indices.len() != n
            || self.style_indices.len() != n
            || self.cell_types.len() != n
        {
            return Err(CoreError::InvalidOperation(
                "cell buffer column length mismatch".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_tracks_sorted_flag() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 1.0, 0).unwrap();
        assert!(buf.is_sorted());
        buf.append_number(1, 2, 2.0, 0).unwrap();
        assert!(buf.is_sorted());
        buf.append_number(1, 1, 3.0, 0).unwrap();
        assert!(!buf.is_sorted());
    }

    #[test]
    fn sort_by_coordinates_orders_all_columns_together() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(2, 1, 20.0, 0).unwrap();
        buf.append_number(1, 1, 10.0, 0).unwrap();
        buf.sort_by_coordinates();
        assert_eq!(buf.number_values(), &[10.0, 20.0]);
        assert!(buf.is_sorted());
    }

    #[test]
    fn row_groups_partitions_by_row() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 1.0, 0).unwrap();
        buf.append_number(1, 2, 2.0, 0).unwrap();
        buf.append_number(2, 1, 3.0, 0).unwrap();
        buf.sort_by_coordinates();
        let groups = buf.row_groups();
        assert_eq!(groups, vec![(1, 0..2), (2, 2..3)]);
    }

    #[test]
    fn compress_sparse_removes_empty_cells_and_reports_count() {
        let mut buf = CompactCellBuffer::new();
        buf.append_empty(1, 1, 0).unwrap();
        buf.append_number(1, 2, 0.0, 7).unwrap();
        buf.append_number(1, 3, 5.0, 0).unwrap();
        let removed = buf.compress_sparse();
        assert_eq!(removed, 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn invariants_hold_after_normal_use() {
        let mut buf = CompactCellBuffer::with_capacity(4);
        buf.append_number(1, 1, 1.0, 0).unwrap();
        buf.append_boolean(1, 2, true, 0).unwrap();
        buf.check_invariants().unwrap();
    }

    #[test]
    fn append_rejects_out_of_range_coordinates() {
        let mut buf = CompactCellBuffer::new();
        assert!(buf.append_number(0, 1, 1.0, 0).is_err());
    }

    #[test]
    fn plain_strings_resolve_shared_special_strings_stay_inline() {
        let mut buf = CompactCellBuffer::new();
        let pool = StringPool::empty();
        let xml_like = "<tag>";
        buf.append_string(1, 1, "short", &pool, 0).unwrap();
        buf.append_string(1, 2, xml_like, &pool, 0).unwrap();

        assert_eq!(buf.cell_types()[0], CellType::SharedString as u8);
        assert_eq!(pool.get(buf.string_indices()[0]).as_deref(), Some("short"));
        assert_eq!(buf.cell_types()[1], CellType::InlineString as u8);
        assert_eq!(buf.inline_string_at(1), Some(xml_like));
    }

    #[test]
    fn set_overwrites_existing_slot_in_place() {
        let mut buf = CompactCellBuffer::new();
        let pool = StringPool::empty();
        buf.append_number(1, 1, 1.0, 0).unwrap();
        buf.append_number(1, 2, 2.0, 0).unwrap();
        buf.set(1, 1, CellValue::Number(99.0), &pool, 0).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.number_values()[0], 99.0);
    }

    #[test]
    fn set_appends_when_no_existing_slot() {
        let mut buf = CompactCellBuffer::new();
        let pool = StringPool::empty();
        buf.set(3, 3, CellValue::Number(5.0), &pool, 0).unwrap();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn formula_round_trips_expression_text() {
        let mut buf = CompactCellBuffer::new();
        buf.append_formula(1, 1, "SUM(A1:A2)", 42.0, 0).unwrap();
        assert_eq!(buf.formula_at(0), Some("SUM(A1:A2)"));
        let (_, _, value) = buf.cell_at(0).unwrap();
        assert_eq!(
            value,
            CellValue::Formula { expression: "SUM(A1:A2)".to_string(), cached_result: 42.0 }
        );
    }

    #[test]
    fn resize_grows_with_empty_slots_and_shrinks_in_place() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 1.0, 0).unwrap();
        buf.resize(3);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.cell_types()[1], CellType::Empty as u8);
        buf.resize(1);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.number_values()[0], 1.0);
    }
}
