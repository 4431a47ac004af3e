//! C6: worksheet and shared-strings XML emission.
//!
//! Follows the usual surrounding XML part shapes (`[Content_Types].xml`, `_rels/.rels`,
//! `docProps/*.xml`, `xl/workbook.xml`, `xl/styles.xml`) and streams the `sheetData`/
//! `row`/`cell` body itself the way a zero-copy serializer would: byte-slice templates,
//! no intermediate DOM.

use std::io::Write;

use crate::buffer::cell_buffer::CompactCellBuffer;
use crate::buffer::types::CellType;
use crate::coord;
use crate::error::Result;
use crate::string_pool::{StringPool, WORKSHEET_NAMESPACE, XML_DECLARATION};

use super::templates::*;
use super::xml_writer::XmlWriter;

/// Per-call tuning knobs for worksheet serialization.
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    /// Emit each row group on a worker thread via `rayon`, concatenating results in
    /// row order. Requires the `parallel` feature; ignored otherwise.
    pub parallel_rows: bool,
    pub writer_buffer_capacity: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        SerializerOptions {
            parallel_rows: false,
            writer_buffer_capacity: 64 * 1024,
        }
    }
}

/// Estimates the serialized byte size of `buffer`'s worksheet body, used to
/// pre-size output buffers before writing. Empirical constants: ~50 bytes per cell,
/// ~20 bytes per row, plus a fixed 1024-byte overhead for the surrounding document
/// structure.
pub fn estimate_worksheet_size(buffer: &CompactCellBuffer, row_count: usize) -> usize {
    buffer.len() * 50 + row_count * 20 + 1024
}

/// Writes a complete `xl/worksheets/sheetN.xml` body (`sheetData` only — the caller
/// wraps it in the worksheet root element and conditional formatting/column
/// definitions, which belong to workbook-level state this function doesn't see) to
/// `writer`. `buffer` must already be sorted by coordinate.
pub fn write_sheet_data<W: Write>(
    writer: &mut XmlWriter<W>,
    buffer: &CompactCellBuffer,
    options: &SerializerOptions,
) -> Result<()> {
    debug_assert!(buffer.is_sorted(), "write_sheet_data requires a coordinate-sorted buffer");

    writer.write_raw(SHEET_DATA_OPEN)?;

    #[cfg(feature = "parallel")]
    if options.parallel_rows {
        write_rows_parallel(writer, buffer)?;
        writer.write_raw(SHEET_DATA_CLOSE)?;
        return Ok(());
    }
    let _ = options;

    for (row, range) in buffer.row_groups() {
        write_row(writer, buffer, row, range)?;
    }

    writer.write_raw(SHEET_DATA_CLOSE)?;
    Ok(())
}

#[cfg(feature = "parallel")]
fn write_rows_parallel<W: Write>(writer: &mut XmlWriter<W>, buffer: &CompactCellBuffer) -> Result<()> {
    use rayon::prelude::*;

    let groups = buffer.row_groups();
    let rendered: Vec<Result<Vec<u8>>> = groups
        .par_iter()
        .map(|(row, range)| {
            let mut scratch = Vec::new();
            let mut scratch_writer = XmlWriter::new(&mut scratch);
            write_row(&mut scratch_writer, buffer, *row, range.clone())?;
            scratch_writer.flush()?;
            Ok(scratch)
        })
        .collect();

    // rayon preserves input order in `map`, so concatenation below reproduces the
    // deterministic row order the non-parallel path emits.
    for chunk in rendered {
        writer.write_raw(&chunk?)?;
    }
    Ok(())
}

fn write_row<W: Write>(
    writer: &mut XmlWriter<W>,
    buffer: &CompactCellBuffer,
    row: u32,
    range: std::ops::Range<usize>,
) -> Result<()> {
    writer.write_raw(ROW_OPEN)?;
    let mut row_num = itoa::Buffer::new();
    writer.write_str(row_num.format(row))?;
    writer.close_start_tag()?;

    for i in range {
        write_cell(writer, buffer, i)?;
    }

    writer.write_raw(ROW_CLOSE)?;
    Ok(())
}

fn write_cell<W: Write>(writer: &mut XmlWriter<W>, buffer: &CompactCellBuffer, i: usize) -> Result<()> {
    let (row, col) = coord::unpack(buffer.coordinates()[i]);
    let a1 = coord::to_a1(row, col);
    let cell_type = CellType::from_tag(buffer.cell_types()[i]);
    let style = buffer.style_indices()[i];

    writer.write_raw(CELL_OPEN)?;
    writer.write_str(&a1)?;
    writer.write_raw(ATTR_QUOTE_CLOSE)?;
    if style != 0 {
        writer.write_raw(STYLE_ATTR_OPEN)?;
        let mut style_buf = itoa::Buffer::new();
        writer.write_str(style_buf.format(style))?;
        writer.write_raw(STYLE_ATTR_CLOSE)?;
    }

    match cell_type {
        Some(CellType::Empty) | None => {
            writer.write_raw(CELL_SELF_CLOSE)?;
        }
        Some(CellType::Number) => {
            writer.write_raw(VALUE_OPEN)?;
            writer.write_str(&format_number(buffer.number_values()[i]))?;
            writer.write_raw(VALUE_CLOSE)?;
        }
        Some(CellType::Boolean) => {
            writer.write_raw(BOOLEAN_OPEN)?;
            writer.write_str(if buffer.number_values()[i] != 0.0 { "1" } else { "0" })?;
            writer.write_raw(VALUE_CLOSE)?;
        }
        Some(CellType::InlineString) => {
            writer.write_raw(INLINE_STRING_OPEN)?;
            writer.write_escaped(buffer.inline_string_at(i).unwrap_or_default())?;
            writer.write_raw(INLINE_STRING_CLOSE)?;
        }
        Some(CellType::SharedString) => {
            writer.write_raw(SHARED_STRING_OPEN)?;
            let mut idx_buf = itoa::Buffer::new();
            writer.write_str(idx_buf.format(buffer.string_indices()[i]))?;
            writer.write_raw(VALUE_CLOSE)?;
        }
        Some(CellType::Formula) => {
            writer.write_raw(FORMULA_OPEN)?;
            writer.write_escaped(buffer.formula_at(i).unwrap_or_default())?;
            writer.write_raw(FORMULA_VALUE)?;
            writer.write_str(&format_number(buffer.number_values()[i]))?;
            writer.write_raw(VALUE_CLOSE)?;
        }
    }
    Ok(())
}

/// Writes `xl/sharedStrings.xml` from the pool's interned strings, in insertion order.
pub fn write_shared_strings<W: Write>(writer: &mut XmlWriter<W>, pool: &StringPool) -> Result<()> {
    writer.write_str(XML_DECLARATION)?;
    writer.start_element("sst")?;
    writer.attribute("xmlns", WORKSHEET_NAMESPACE)?;
    let strings = pool.all_strings();
    writer.attribute_int("count", strings.len() as i64)?;
    writer.attribute_int("uniqueCount", strings.len() as i64)?;
    writer.close_start_tag()?;

    for s in &strings {
        writer.start_element("si")?;
        writer.close_start_tag()?;
        writer.start_element("t")?;
        writer.close_start_tag()?;
        writer.write_escaped(s)?;
        writer.end_element("t")?;
        writer.end_element("si")?;
    }

    writer.end_element("sst")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_sheet(buffer: &CompactCellBuffer) -> String {
        let mut out = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut out);
            write_sheet_data(&mut writer, buffer, &SerializerOptions::default()).unwrap();
            writer.flush().unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn tiny_write_scenario_produces_expected_xml_shape() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 42.0, 0).unwrap();
        buf.sort_by_coordinates();
        let xml = render_sheet(&buf);
        assert_eq!(xml, "<sheetData><row r=\"1\"><c r=\"A1\"><v>42</v></c></row></sheetData>");
    }

    #[test]
    fn inline_vs_shared_scenario_emits_distinct_shapes() {
        let mut buf = CompactCellBuffer::new();
        let pool = StringPool::empty();
        buf.append_string(1, 1, "hi", &pool, 0).unwrap();
        let long_text = "w".repeat(150);
        buf.append_string(1, 2, &long_text, &pool, 0).unwrap();
        buf.sort_by_coordinates();
        let xml = render_sheet(&buf);
        assert!(xml.contains("t=\"s\"><v>0</v>"));
        assert!(xml.contains(&format!("t=\"inlineStr\"><is><t>{long_text}</t></is>")));
    }

    #[test]
    fn styled_cell_emits_style_attribute() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 1.0, 3).unwrap();
        buf.sort_by_coordinates();
        let xml = render_sheet(&buf);
        assert_eq!(xml, "<sheetData><row r=\"1\"><c r=\"A1\" s=\"3\"><v>1</v></c></row></sheetData>");
    }

    #[test]
    fn formula_cell_emits_expression_and_cached_value() {
        let mut buf = CompactCellBuffer::new();
        buf.append_formula(1, 1, "SUM(A2:A3)", 7.0, 0).unwrap();
        buf.sort_by_coordinates();
        let xml = render_sheet(&buf);
        assert_eq!(
            xml,
            "<sheetData><row r=\"1\"><c r=\"A1\"><f>SUM(A2:A3)</f><v>7</v></c></row></sheetData>"
        );
    }

    #[test]
    fn multi_row_scenario_groups_cells_under_their_row() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(2, 1, 1.0, 0).unwrap();
        buf.append_number(1, 1, 2.0, 0).unwrap();
        buf.append_number(1, 2, 3.0, 0).unwrap();
        buf.sort_by_coordinates();
        let xml = render_sheet(&buf);
        assert_eq!(
            xml,
            "<sheetData><row r=\"1\"><c r=\"A1\"><v>2</v></c><c r=\"B1\"><v>3</v></c></row>\
<row r=\"2\"><c r=\"A2\"><v>1</v></c></row></sheetData>"
        );
    }

    #[test]
    fn shared_strings_part_lists_pool_in_insertion_order() {
        let pool = StringPool::empty();
        pool.intern("first");
        pool.intern("second");
        let mut out = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut out);
            write_shared_strings(&mut writer, &pool).unwrap();
            writer.flush().unwrap();
        }
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<si><t>first</t></si><si><t>second</t></si>"));
        assert!(xml.contains("count=\"2\""));
    }

    #[test]
    fn estimate_matches_documented_formula() {
        let mut buf = CompactCellBuffer::new();
        buf.append_number(1, 1, 1.0, 0).unwrap();
        assert_eq!(estimate_worksheet_size(&buf, 1), 1 * 50 + 1 * 20 + 1024);
    }
}
