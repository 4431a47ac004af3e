//! Stage 4: hand a batch's compressed payload to the ZIP sink.
//!
//! Runs with exactly one worker by default (see
//! [`crate::pipeline::stage::StageKind::default_worker_count`]) since
//! [`crate::zip_sink::ZipSink`] writes to a single underlying file sequentially — the
//! mutex here exists for the worker-count-1 contract to be enforceable even if a
//! caller raises it, not because concurrent writers are expected in practice.

use std::io::{Seek, Write};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::pipeline::batch::Batch;
use crate::pipeline::stage::{Stage, StageKind};
use crate::zip_sink::ZipSink;

pub struct OutputStage<W: Write + Seek + Send> {
    sink: Arc<Mutex<ZipSink<W>>>,
}

impl<W: Write + Seek + Send> OutputStage<W> {
    pub fn new(sink: Arc<Mutex<ZipSink<W>>>) -> Self {
        OutputStage { sink }
    }
}

impl<W: Write + Seek + Send> Stage for OutputStage<W> {
    fn kind(&self) -> StageKind {
        StageKind::Output
    }

    fn process(&self, mut batch: Batch) -> Result<Batch> {
        let payload = batch
            .binary_payload
            .take()
            .ok_or_else(|| crate::error::CoreError::InvalidOperation("output stage ran before compress".into()))?;
        let mut sink = self.sink.lock().expect("zip sink mutex poisoned");
        sink.write_worksheet(&batch.sheet_name, &payload)?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::cell_buffer::CompactCellBuffer;
    use std::io::Cursor;

    #[test]
    fn output_stage_writes_into_the_zip_sink() {
        let sink = Arc::new(Mutex::new(ZipSink::new(Cursor::new(Vec::new())).unwrap()));
        let stage = OutputStage::new(Arc::clone(&sink));

        let cells = CompactCellBuffer::new();
        let mut batch = Batch::new(1, "Sheet1", cells);
        batch.binary_payload = Some(b"<sheetData></sheetData>".to_vec());

        stage.process(batch).unwrap();
        assert_eq!(Arc::strong_count(&sink), 2);
    }
}
