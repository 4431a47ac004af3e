//! ZIP/SpreadsheetML package assembly — the external collaborator the pipeline's
//! output stage writes into.
//!
//! Builds the standard boilerplate parts (`[Content_Types].xml`, `_rels/.rels`,
//! `docProps/core.xml`, `docProps/app.xml`, `xl/workbook.xml`,
//! `xl/_rels/workbook.xml.rels`, `xl/styles.xml`) with the usual `FileOptions`
//! convention (`Deflated`, level 6, `large_file(true)` for ZIP64). Worksheet bodies are
//! streamed in one batch at a time rather than built up as a whole worksheet's XML in
//! memory first — the pipeline already hands this sink complete per-sheet fragments.

use std::io::{Seek, Write};

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::Result;
use crate::serialize::XmlWriter;
use crate::string_pool::{RELATIONSHIPS_NAMESPACE, WORKSHEET_NAMESPACE, XML_DECLARATION};

fn file_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6))
        .large_file(true)
}

/// Assembles the `.xlsx` ZIP package part by part. Worksheet and shared-strings parts
/// are written incrementally; the fixed workbook-level parts are written once, at
/// construction and at [`ZipSink::finish`] respectively.
pub struct ZipSink<W: Write + Seek> {
    zip: ZipWriter<W>,
    sheet_names: Vec<String>,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(writer: W) -> Result<Self> {
        let mut zip = ZipWriter::new(writer);
        let options = file_options();

        zip.start_file("[Content_Types].xml", options)?;
        write_content_types(&mut zip)?;

        zip.start_file("_rels/.rels", options)?;
        write_root_rels(&mut zip)?;

        zip.start_file("docProps/core.xml", options)?;
        write_core_props(&mut zip)?;

        zip.start_file("docProps/app.xml", options)?;
        write_app_props(&mut zip)?;

        Ok(ZipSink {
            zip,
            sheet_names: Vec::new(),
        })
    }

    /// Writes `xl/worksheets/sheetN.xml`, wrapping `sheet_data_xml` (a complete
    /// `<sheetData>...</sheetData>` fragment, as produced by
    /// [`crate::serialize::write_sheet_data`]) in the worksheet root element.
    pub fn write_worksheet(&mut self, name: &str, sheet_data_xml: &[u8]) -> Result<()> {
        let index = self.sheet_names.len() as u32 + 1;
        self.sheet_names.push(name.to_string());

        self.zip.start_file(format!("xl/worksheets/sheet{index}.xml"), file_options())?;
        let mut writer = XmlWriter::new(&mut self.zip);
        writer.write_str(XML_DECLARATION)?;
        writer.start_element("worksheet")?;
        writer.attribute("xmlns", WORKSHEET_NAMESPACE)?;
        writer.attribute("xmlns:r", RELATIONSHIPS_NAMESPACE)?;
        writer.close_start_tag()?;
        writer.flush()?;
        self.zip.write_all(sheet_data_xml)?;
        let mut writer = XmlWriter::new(&mut self.zip);
        writer.end_element("worksheet")?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_shared_strings(&mut self, shared_strings_xml: &[u8]) -> Result<()> {
        self.zip.start_file("xl/sharedStrings.xml", file_options())?;
        self.zip.write_all(shared_strings_xml)?;
        Ok(())
    }

    /// Writes the remaining workbook-level parts and finalizes the archive.
    pub fn finish(mut self) -> Result<W> {
        let options = file_options();

        self.zip.start_file("xl/workbook.xml", options)?;
        write_workbook_xml(&mut self.zip, &self.sheet_names)?;

        self.zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        write_workbook_rels(&mut self.zip, self.sheet_names.len() as u32)?;

        self.zip.start_file("xl/styles.xml", options)?;
        write_styles(&mut self.zip)?;

        Ok(self.zip.finish()?)
    }
}

fn write_content_types<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_root_rels<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_core_props<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>xlsxcore</dc:creator>
<cp:lastModifiedBy>xlsxcore</cp:lastModifiedBy>
</cp:coreProperties>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_app_props<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>xlsxcore</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<LinksUpToDate>false</LinksUpToDate>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
</Properties>"#;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

fn write_workbook_xml<W: Write>(writer: &mut W, sheet_names: &[String]) -> Result<()> {
    let mut xml_writer = XmlWriter::new(writer);
    xml_writer.write_str(XML_DECLARATION)?;
    xml_writer.start_element("workbook")?;
    xml_writer.attribute("xmlns", WORKSHEET_NAMESPACE)?;
    xml_writer.attribute("xmlns:r", RELATIONSHIPS_NAMESPACE)?;
    xml_writer.close_start_tag()?;

    xml_writer.start_element("sheets")?;
    xml_writer.close_start_tag()?;
    for (i, name) in sheet_names.iter().enumerate() {
        let sheet_id = i + 1;
        xml_writer.start_element("sheet")?;
        xml_writer.attribute("name", name)?;
        xml_writer.attribute_int("sheetId", sheet_id as i64)?;
        xml_writer.attribute("r:id", &format!("rId{sheet_id}"))?;
        xml_writer.write_raw(b"/>")?;
    }
    xml_writer.end_element("sheets")?;
    xml_writer.end_element("workbook")?;
    xml_writer.flush()?;
    Ok(())
}

fn write_workbook_rels<W: Write>(writer: &mut W, sheet_count: u32) -> Result<()> {
    let mut xml_writer = XmlWriter::new(writer);
    xml_writer.write_str(XML_DECLARATION)?;
    xml_writer.start_element("Relationships")?;
    xml_writer.attribute("xmlns", "http://schemas.openxmlformats.org/package/2006/relationships")?;
    xml_writer.close_start_tag()?;

    for i in 0..sheet_count {
        let rid = i + 1;
        xml_writer.start_element("Relationship")?;
        xml_writer.attribute("Id", &format!("rId{rid}"))?;
        xml_writer.attribute("Type", "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet")?;
        xml_writer.attribute("Target", &format!("worksheets/sheet{rid}.xml"))?;
        xml_writer.write_raw(b"/>")?;
    }

    let styles_rid = sheet_count + 1;
    xml_writer.start_element("Relationship")?;
    xml_writer.attribute("Id", &format!("rId{styles_rid}"))?;
    xml_writer.attribute("Type", "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles")?;
    xml_writer.attribute("Target", "styles.xml")?;
    xml_writer.write_raw(b"/>")?;

    let ss_rid = sheet_count + 2;
    xml_writer.start_element("Relationship")?;
    xml_writer.attribute("Id", &format!("rId{ss_rid}"))?;
    xml_writer.attribute(
        "Type",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings",
    )?;
    xml_writer.attribute("Target", "sharedStrings.xml")?;
    xml_writer.write_raw(b"/>")?;

    xml_writer.end_element("Relationships")?;
    xml_writer.flush()?;
    Ok(())
}

fn write_styles<W: Write>(writer: &mut W) -> Result<()> {
    let xml = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
</styleSheet>"##;
    writer.write_all(xml.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sink_produces_a_valid_zip_with_expected_parts() {
        let buf = Cursor::new(Vec::new());
        let mut sink = ZipSink::new(buf).unwrap();
        sink.write_worksheet("Sheet1", b"<sheetData><row r=\"1\"><c r=\"A1\"><v>1</v></c></row></sheetData>")
            .unwrap();
        sink.write_shared_strings(b"<?xml version=\"1.0\"?><sst/>").unwrap();
        let cursor = sink.finish().unwrap();
        let bytes = cursor.into_inner();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"xl/worksheets/sheet1.xml".to_string()));
        assert!(names.contains(&"xl/workbook.xml".to_string()));
        assert!(names.contains(&"xl/sharedStrings.xml".to_string()));
        assert!(names.contains(&"[Content_Types].xml".to_string()));
    }
}
