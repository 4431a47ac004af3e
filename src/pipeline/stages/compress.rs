//! Stage 3: stage the rendered XML for the output stage.
//!
//! The actual DEFLATE pass happens in [`crate::zip_sink`] when a part is written into
//! the archive — `zip::write::ZipWriter` owns the only compressor in this crate's
//! dependency stack, and running a second, separate compression pass here would mean
//! compressing twice. This stage exists as a named pipeline step that hands the XML
//! bytes off as the batch's binary payload and records the pre-compression size.

use crate::error::Result;
use crate::pipeline::batch::Batch;
use crate::pipeline::stage::{Stage, StageKind};

#[derive(Debug, Default)]
pub struct CompressStage;

impl Stage for CompressStage {
    fn kind(&self) -> StageKind {
        StageKind::Compress
    }

    fn process(&self, mut batch: Batch) -> Result<Batch> {
        let payload = batch
            .xml_payload
            .take()
            .ok_or_else(|| crate::error::CoreError::InvalidOperation("compress stage ran before xmlgen".into()))?;
        batch.estimated_size = payload.len();
        batch.binary_payload = Some(payload);
        Ok(batch)
    }
}
