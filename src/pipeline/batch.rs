//! The unit of work flowing through the four-stage pipeline.

use chrono::{DateTime, Utc};

use crate::buffer::cell_buffer::CompactCellBuffer;

/// One worksheet range's worth of cells, carried through preprocess -> xmlgen ->
/// compress -> output. Each stage consumes and replaces the fields it owns, leaving
/// the rest untouched, so a `Batch` can be inspected mid-pipeline without knowing
/// which stage produced it.
pub struct Batch {
    pub batch_id: u64,
    pub sheet_name: String,
    pub cells: CompactCellBuffer,
    /// Populated by the xmlgen stage.
    pub xml_payload: Option<Vec<u8>>,
    /// Populated by the compress stage.
    pub binary_payload: Option<Vec<u8>>,
    pub estimated_size: usize,
    pub submitted_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(batch_id: u64, sheet_name: impl Into<String>, cells: CompactCellBuffer) -> Self {
        let estimated_size = crate::serialize::estimate_worksheet_size(&cells, cells.row_groups().len());
        Batch {
            batch_id,
            sheet_name: sheet_name.into(),
            cells,
            xml_payload: None,
            binary_payload: None,
            estimated_size,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_batch_estimates_size_from_cell_count() {
        let mut cells = CompactCellBuffer::new();
        cells.append_number(1, 1, 1.0, 0).unwrap();
        let batch = Batch::new(1, "Sheet1", cells);
        assert!(batch.estimated_size > 0);
        assert!(batch.xml_payload.is_none());
    }
}
