use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::info;
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SheetError;
use crate::screening::ScreeningResult;
use crate::sheet::reader::{NAME_HEADER, STATUS_HEADER};

pub const OUTPUT_PREFIX: &str = "adverse_screening";
pub const KEYWORD_HEADER: &str = "Keyword";
pub const RESULTS_HEADER: &str = "Results";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Results" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// A worksheet cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

/// `adverse_screening_<YYYYmmdd_HHMMSS>.xlsx`
pub fn output_file_name(now: NaiveDateTime) -> String {
    format!("{}_{}.xlsx", OUTPUT_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

/// Writes screening results as `<id_header>, Name, Status, Keyword, Results`.
pub fn write_results(
    path: &Path,
    id_header: &str,
    results: &[ScreeningResult],
) -> Result<(), SheetError> {
    let headers = [
        id_header,
        NAME_HEADER,
        STATUS_HEADER,
        KEYWORD_HEADER,
        RESULTS_HEADER,
    ];

    let rows: Vec<Vec<CellValue>> = results
        .iter()
        .map(|r| {
            vec![
                r.entity_id.as_str().into(),
                r.name.as_str().into(),
                r.status.label().into(),
                r.keyword_column().into(),
                r.result_count.into(),
            ]
        })
        .collect();

    write_table(path, &headers, &rows)?;
    info!("Wrote {} result rows to {}", results.len(), path.display());
    Ok(())
}

/// Writes a single-sheet workbook. The file appears at `path` only once it
/// is complete.
pub fn write_table(
    path: &Path,
    headers: &[&str],
    rows: &[Vec<CellValue>],
) -> Result<(), SheetError> {
    let partial = partial_path(path);
    let write_err = |reason: String| SheetError::Write {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::create(&partial).map_err(|e| write_err(e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let sheet = sheet_xml(headers, rows);
    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/worksheets/sheet1.xml", &sheet),
    ];

    let result = parts
        .iter()
        .try_for_each(|(name, body)| {
            zip.start_file(*name, options)
                .map_err(|e| e.to_string())?;
            zip.write_all(body.as_bytes()).map_err(|e| e.to_string())
        })
        .and_then(|_| zip.finish().map(|_| ()).map_err(|e| e.to_string()))
        .and_then(|_| std::fs::rename(&partial, path).map_err(|e| e.to_string()));

    if let Err(reason) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(write_err(reason));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn sheet_xml(headers: &[&str], rows: &[Vec<CellValue>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header_row: Vec<CellValue> = headers.iter().map(|h| CellValue::from(*h)).collect();
    for (index, row) in std::iter::once(&header_row).chain(rows.iter()).enumerate() {
        let number = index + 1;
        let _ = write!(xml, r#"<row r="{}">"#, number);
        for (column, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(column), number);
            match value {
                CellValue::Text(text) => {
                    let _ = write!(
                        xml,
                        r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        reference,
                        escape(xml_safe(text).as_str())
                    );
                }
                CellValue::Number(n) => {
                    let _ = write!(xml, r#"<c r="{}"><v>{}</v></c>"#, reference, n);
                }
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Spreadsheet column letters for a zero-based index (`0 -> A`, `26 -> AA`).
fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Drops control characters XML 1.0 cannot carry.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(c, '\t' | '\n' | '\r') || *c >= ' ')
        .collect()
}
