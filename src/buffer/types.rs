//! Cell value model: the tagged union a [`super::cell_buffer::CompactCellBuffer`] row
//! decodes into, and the raw type tags stored in its `cell_types` column. Strings carry
//! an explicit inline-vs-shared distinction rather than storing text directly, since
//! that distinction drives whether a cell's text lives in the buffer's local table or
//! the workbook-wide string pool.

/// Discriminant stored per-cell in `CompactCellBuffer::cell_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellType {
    Empty = 0,
    Number = 1,
    InlineString = 2,
    SharedString = 3,
    Boolean = 4,
    Formula = 5,
}

impl CellType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CellType::Empty),
            1 => Some(CellType::Number),
            2 => Some(CellType::InlineString),
            3 => Some(CellType::SharedString),
            4 => Some(CellType::Boolean),
            5 => Some(CellType::Formula),
            _ => None,
        }
    }
}

/// A decoded cell value, independent of how it is packed into the SoA buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    InlineString(String),
    SharedString(String),
    Boolean(bool),
    /// A formula and its last-known cached result.
    Formula { expression: String, cached_result: f64 },
}

impl CellValue {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellValue::Empty => CellType::Empty,
            CellValue::Number(_) => CellType::Number,
            CellValue::InlineString(_) => CellType::InlineString,
            CellValue::SharedString(_) => CellType::SharedString,
            CellValue::Boolean(_) => CellType::Boolean,
            CellValue::Formula { .. } => CellType::Formula,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Decides whether `value` should be interned into the shared string table or
    /// stored inline. A string stays inline when sharing it would cost more than it
    /// saves or would need escaping work redone per reference: empty, a single
    /// character, containing an XML-reserved character, containing a newline/tab, or
    /// longer than [`crate::serialize::templates::SHARED_STRING_MIN_LEN`] UTF-16 code
    /// units. Everything else is shared.
    pub fn should_share(value: &str) -> bool {
        use crate::serialize::templates::SHARED_STRING_MIN_LEN;
        let inline = value.is_empty()
            || value.chars().count() == 1
            || value.contains(['<', '>', '&', '"', '\''])
            || value.contains(['\n', '\r', '\t'])
            || value.encode_utf16().count() > SHARED_STRING_MIN_LEN;
        !inline
    }
}
