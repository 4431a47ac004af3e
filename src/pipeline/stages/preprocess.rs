//! Stage 1: sort the batch's cell buffer and drop dead zero cells before anything
//! downstream touches it.

use crate::error::Result;
use crate::pipeline::batch::Batch;
use crate::pipeline::stage::{Stage, StageKind};

#[derive(Debug, Default)]
pub struct PreprocessStage;

impl Stage for PreprocessStage {
    fn kind(&self) -> StageKind {
        StageKind::Preprocess
    }

    fn process(&self, mut batch: Batch) -> Result<Batch> {
        batch.cells.sort_by_coordinates();
        batch.cells.compress_sparse();
        batch.cells.check_invariants()?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::cell_buffer::CompactCellBuffer;

    #[test]
    fn preprocess_sorts_and_compresses() {
        let mut cells = CompactCellBuffer::new();
        cells.append_number(2, 1, 1.0, 0).unwrap();
        cells.append_number(1, 1, 0.0, 0).unwrap();
        let batch = Batch::new(1, "Sheet1", cells);

        let stage = PreprocessStage;
        let out = stage.process(batch).unwrap();
        assert!(out.cells.is_sorted());
        assert_eq!(out.cells.len(), 1);
    }
}
