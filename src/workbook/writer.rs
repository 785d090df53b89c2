// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Minimal xlsx (SpreadsheetML) package writer

use quick_xml::escape::escape;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{column_letters, Cell, LinkStyle, Sheet};
use crate::Result;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_HYPERLINK: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const REL_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Write `sheets` to an xlsx file at `path`, replacing any existing file
pub fn write_workbook(path: &Path, sheets: &[Sheet], style: LinkStyle) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types(sheets.len()).as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(root_rels().as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(sheets).as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels(sheets.len()).as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(styles_xml().as_bytes())?;

    for (i, sheet) in sheets.iter().enumerate() {
        let part = render_sheet(sheet, style);
        debug!("Sheet '{}': {} rows, {} native links", sheet.name, sheet.rows.len(), part.links.len());

        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(part.xml.as_bytes())?;

        if !part.links.is_empty() {
            zip.start_file(format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1), options)?;
            zip.write_all(hyperlink_rels(&part.links).as_bytes())?;
        }
    }

    zip.finish()?;
    info!("Workbook written: {:?}", path);
    Ok(())
}

struct SheetPart {
    xml: String,
    /// (cell reference, relationship target) for native links
    links: Vec<(String, String)>,
}

fn render_sheet(sheet: &Sheet, style: LinkStyle) -> SheetPart {
    let mut xml = String::new();
    let mut links = Vec::new();

    xml.push_str(XML_DECL);
    xml.push_str(&format!(r#"<worksheet xmlns="{}" xmlns:r="{}"><sheetData>"#, NS_MAIN, NS_REL));

    let header = sheet.header.iter().map(|h| Cell::Text(h.clone()));
    let header_row: Vec<Cell> = header.collect();

    for (i, row) in std::iter::once(&header_row).chain(sheet.rows.iter()).enumerate() {
        let row_number = i + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(col), row_number);
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => push_inline_string(&mut xml, &reference, text),
                Cell::Number(value) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
                }
                Cell::Link(link) => match style {
                    LinkStyle::Formula => {
                        xml.push_str(&format!(
                            r#"<c r="{}" t="str"><f>{}</f><v>{}</v></c>"#,
                            reference,
                            escape(&link.to_formula()),
                            escape(&link.label)
                        ));
                    }
                    LinkStyle::Native => {
                        push_inline_string(&mut xml, &reference, &link.label);
                        links.push((reference, link.target.to_string_lossy().into_owned()));
                    }
                },
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !links.is_empty() {
        xml.push_str("<hyperlinks>");
        for (i, (reference, _)) in links.iter().enumerate() {
            xml.push_str(&format!(r#"<hyperlink ref="{}" r:id="rId{}"/>"#, reference, i + 1));
        }
        xml.push_str("</hyperlinks>");
    }
    xml.push_str("</worksheet>");

    SheetPart { xml, links }
}

fn push_inline_string(xml: &mut String, reference: &str, text: &str) {
    xml.push_str(&format!(
        r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        escape(text)
    ));
}

fn hyperlink_rels(links: &[(String, String)]) -> String {
    let mut xml = format!(r#"{}<Relationships xmlns="{}">"#, XML_DECL, NS_PKG_REL);
    for (i, (_, target)) in links.iter().enumerate() {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="{}" TargetMode="External"/>"#,
            i + 1,
            REL_HYPERLINK,
            escape(target)
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = format!(
        r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        XML_DECL
    );
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels() -> String {
    format!(
        r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="xl/workbook.xml"/></Relationships>"#,
        XML_DECL, NS_PKG_REL, REL_DOCUMENT
    )
}

fn workbook_xml(sheets: &[Sheet]) -> String {
    let mut xml = format!(r#"{}<workbook xmlns="{}" xmlns:r="{}"><sheets>"#, XML_DECL, NS_MAIN, NS_REL);
    for (i, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(&sheet.name),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = format!(r#"{}<Relationships xmlns="{}">"#, XML_DECL, NS_PKG_REL);
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="worksheets/sheet{}.xml"/>"#,
            i, REL_WORKSHEET, i
        ));
    }
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="{}" Target="styles.xml"/>"#,
        sheet_count + 1,
        REL_STYLES
    ));
    xml.push_str("</Relationships>");
    xml
}

fn styles_xml() -> String {
    format!(
        r#"{}<styleSheet xmlns="{}"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#,
        XML_DECL, NS_MAIN
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::LocationReference;

    fn sample_sheet() -> Sheet {
        Sheet {
            name: "AuditSheet".to_string(),
            header: vec!["Name".to_string(), "Size (MB)".to_string()],
            rows: vec![vec![
                Cell::Link(LocationReference::new(Path::new("/srv/a&b.txt"), "  a&b.txt")),
                Cell::Number(1.5),
            ]],
        }
    }

    #[test]
    fn test_formula_cells_are_escaped() {
        let part = render_sheet(&sample_sheet(), LinkStyle::Formula);
        assert!(part.links.is_empty());
        assert!(part.xml.contains(r#"<c r="A2" t="str"><f>HYPERLINK(&quot;/srv/a&amp;b.txt&quot;,&quot;  a&amp;b.txt&quot;)</f>"#));
        assert!(part.xml.contains(r#"<c r="B2"><v>1.5</v></c>"#));
        assert!(!part.xml.contains("<hyperlinks>"));
    }

    #[test]
    fn test_native_links_get_relationships() {
        let part = render_sheet(&sample_sheet(), LinkStyle::Native);
        assert_eq!(part.links, vec![("A2".to_string(), "/srv/a&b.txt".to_string())]);
        assert!(part.xml.contains(r#"<hyperlink ref="A2" r:id="rId1"/>"#));

        let rels = hyperlink_rels(&part.links);
        assert!(rels.contains(r#"Target="/srv/a&amp;b.txt" TargetMode="External""#));
    }

    #[test]
    fn test_write_creates_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_workbook(&path, &[sample_sheet()], LinkStyle::Native).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert!(archive.by_name("xl/workbook.xml").is_ok());
        assert!(archive.by_name("xl/worksheets/sheet1.xml").is_ok());
        assert!(archive.by_name("xl/worksheets/_rels/sheet1.xml.rels").is_ok());
    }
}
