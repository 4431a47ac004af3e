//! Stage 2: render a batch's cell buffer into its `sheetData` XML fragment.

use crate::error::Result;
use crate::pipeline::batch::Batch;
use crate::pipeline::stage::{Stage, StageKind};
use crate::serialize::{write_sheet_data, SerializerOptions, XmlWriter};
use crate::string_pool::StringPool;

pub struct XmlGenStage {
    options: SerializerOptions,
}

impl XmlGenStage {
    pub fn new(options: SerializerOptions) -> Self {
        XmlGenStage { options }
    }
}

impl Default for XmlGenStage {
    fn default() -> Self {
        XmlGenStage::new(SerializerOptions::default())
    }
}

impl Stage for XmlGenStage {
    fn kind(&self) -> StageKind {
        StageKind::XmlGen
    }

    fn process(&self, mut batch: Batch) -> Result<Batch> {
        let estimate = batch.estimated_size;
        let mut out = Vec::with_capacity(estimate);
        {
            let mut writer = XmlWriter::with_capacity(&mut out, self.options.writer_buffer_capacity);
            write_sheet_data(&mut writer, &batch.cells, &self.options)?;
            writer.flush()?;
        }
        batch.xml_payload = Some(out);
        Ok(batch)
    }
}

/// Unused by [`XmlGenStage`] directly (shared strings are emitted once per workbook,
/// not per batch) but kept alongside so the worksheet-level and workbook-level
/// serialization entry points live next to each other.
pub fn render_shared_strings(pool: &StringPool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer = XmlWriter::new(&mut out);
        crate::serialize::write_shared_strings(&mut writer, pool)?;
        writer.flush()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::cell_buffer::CompactCellBuffer;

    #[test]
    fn xmlgen_produces_sheet_data_fragment() {
        let mut cells = CompactCellBuffer::new();
        cells.append_number(1, 1, 1.0, 0).unwrap();
        cells.sort_by_coordinates();
        let batch = Batch::new(1, "Sheet1", cells);

        let stage = XmlGenStage::default();
        let out = stage.process(batch).unwrap();
        let xml = String::from_utf8(out.xml_payload.unwrap()).unwrap();
        assert!(xml.starts_with("<sheetData>"));
        assert!(xml.ends_with("</sheetData>"));
    }
}
