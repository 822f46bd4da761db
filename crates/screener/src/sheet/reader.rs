use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, info};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::SheetError;
use crate::screening::EntityRecord;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Excel's column limit (`XFD`).
const MAX_COLUMNS: usize = 16_384;

/// Identifier column headers, in order of preference.
pub const ID_HEADERS: [&str; 2] = ["ID", "CIF"];
pub const NAME_HEADER: &str = "Name";
pub const STATUS_HEADER: &str = "Status";

/// Entities read from an input workbook.
#[derive(Debug, Clone)]
pub struct SheetData {
    /// The identifier header found in the input (`ID` or `CIF`).
    pub id_header: String,
    pub headers: Vec<String>,
    pub records: Vec<EntityRecord>,
}

/// Reads the first worksheet of an `.xlsx` file into entity records.
///
/// Row 1 is the header. It must contain `Name`, `Status` and an identifier
/// column (`ID` or `CIF`). Completely empty rows are skipped.
pub fn read_entities(path: &Path) -> Result<SheetData, SheetError> {
    let file = File::open(path).map_err(|e| SheetError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut archive =
        ZipArchive::new(file).map_err(|e| SheetError::Archive(e.to_string()))?;

    let rows = read_first_sheet(&mut archive)?;
    let data = entities_from_rows(rows)?;

    info!(
        "Read {} entities (identifier column '{}')",
        data.records.len(),
        data.id_header
    );
    Ok(data)
}

/// Returns the cell text of every row of the first worksheet. Rows are
/// dense: a missing cell is an empty string.
pub fn read_first_sheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<Vec<String>>, SheetError> {
    let shared = match read_part(archive, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_path = locate_first_sheet(archive)?;
    debug!("Reading worksheet {}", sheet_path);

    let sheet_xml = read_part(archive, &sheet_path)?
        .ok_or_else(|| SheetError::MissingWorksheet(sheet_path.clone()))?;

    parse_rows(&sheet_xml, &shared, &sheet_path)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, SheetError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(SheetError::Archive(format!("{}: {}", name, e))),
    };

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| SheetError::Archive(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(xml))
}

/// Resolves the first `<sheet>` of the workbook through its relationship.
fn locate_first_sheet<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, SheetError> {
    let rel_id = match read_part(archive, WORKBOOK)? {
        Some(xml) => first_sheet_rel_id(&xml)?,
        None => None,
    };
    let rels = read_part(archive, WORKBOOK_RELS)?;

    let target = match (rel_id, rels) {
        (Some(id), Some(rels)) => relationship_target(&rels, &id)?,
        _ => None,
    };

    Ok(match target {
        Some(target) if target.starts_with('/') => target.trim_start_matches('/').to_string(),
        Some(target) => format!("xl/{}", target),
        None => DEFAULT_SHEET.to_string(),
    })
}

fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, SheetError> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"sheet" => {
                return Ok(attribute(e, b"id"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(WORKBOOK, e)),
            _ => {}
        }
    }
}

fn relationship_target(xml: &str, rel_id: &str) -> Result<Option<String>, SheetError> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(e, b"Id").as_deref() == Some(rel_id) {
                    return Ok(attribute(e, b"Target"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(WORKBOOK_RELS, e)),
            _ => {}
        }
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, SheetError> {
    let mut reader = Reader::from_str(xml);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some(ref mut s) = current {
                    s.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let Some(ref mut s) = current {
                    s.push_str(&resolve_reference(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(SHARED_STRINGS, e)),
            _ => {}
        }
    }

    Ok(strings)
}

#[derive(Default)]
struct Cell {
    column: usize,
    kind: Option<String>,
    value: String,
}

fn parse_rows(xml: &str, shared: &[String], part: &str) -> Result<Vec<Vec<String>>, SheetError> {
    let mut reader = Reader::from_str(xml);

    let mut rows = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<Cell> = None;
    let mut next_column = 0;
    let mut in_inline = false;
    let mut capture = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => cell = Some(start_cell(e, next_column, part)?),
                b"v" => capture = cell.is_some(),
                b"is" => in_inline = true,
                b"t" if in_inline => capture = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" => next_column = start_cell(e, next_column, part)?.column + 1,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                b"c" => {
                    if let Some(done) = cell.take() {
                        next_column = done.column + 1;
                        let text = cell_text(done.kind.as_deref(), done.value, shared, part)?;
                        if let Some(ref mut current) = row {
                            if current.len() <= done.column {
                                current.resize(done.column + 1, String::new());
                            }
                            current[done.column] = text;
                        }
                    }
                }
                b"v" | b"t" => capture = false,
                b"is" => in_inline = false,
                _ => {}
            },
            Ok(Event::Text(e)) if capture => {
                if let Some(ref mut current) = cell {
                    current.value.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) if capture => {
                if let Some(ref mut current) = cell {
                    current.value.push_str(&resolve_reference(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok(rows)
}

fn start_cell(e: &BytesStart<'_>, next_column: usize, part: &str) -> Result<Cell, SheetError> {
    let reference = attribute(e, b"r");
    let column = match reference.as_deref().map(column_index) {
        Some(Ok(Some(column))) => column,
        Some(Ok(None)) | None => next_column,
        Some(Err(reason)) => {
            return Err(SheetError::Xml {
                part: part.to_string(),
                reason,
            })
        }
    };
    if column >= MAX_COLUMNS {
        return Err(SheetError::Xml {
            part: part.to_string(),
            reason: format!("row has more than {} columns", MAX_COLUMNS),
        });
    }

    Ok(Cell {
        column,
        kind: attribute(e, b"t"),
        value: String::new(),
    })
}

fn cell_text(
    kind: Option<&str>,
    value: String,
    shared: &[String],
    part: &str,
) -> Result<String, SheetError> {
    match kind {
        Some("s") => {
            let index: usize = value.trim().parse().map_err(|_| SheetError::Xml {
                part: part.to_string(),
                reason: format!("invalid shared string index '{}'", value),
            })?;
            shared.get(index).cloned().ok_or_else(|| SheetError::Xml {
                part: part.to_string(),
                reason: format!("shared string index {} out of range", index),
            })
        }
        Some("b") => Ok(if value.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        _ => Ok(value),
    }
}

/// Zero-based column of a cell reference such as `C7` or `AB12`.
///
/// `Ok(None)` when the reference has no column letters. References past
/// column `XFD` are rejected before they can size a row.
fn column_index(reference: &str) -> Result<Option<usize>, String> {
    let mut number = 0usize;
    let mut letters = 0;
    for b in reference.bytes().take_while(|b| b.is_ascii_alphabetic()) {
        letters += 1;
        number = number
            .checked_mul(26)
            .and_then(|n| n.checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize))
            .filter(|n| *n <= MAX_COLUMNS)
            .ok_or_else(|| format!("cell reference '{}' is beyond column XFD", reference))?;
    }
    if letters == 0 {
        return Ok(None);
    }
    Ok(Some(number - 1))
}

fn attribute(e: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn resolve_reference(e: &BytesRef<'_>) -> String {
    if let Ok(Some(ch)) = e.resolve_char_ref() {
        return ch.to_string();
    }
    let name = String::from_utf8_lossy(e);
    match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{};", name),
    }
}

fn xml_error(part: &str, e: quick_xml::Error) -> SheetError {
    SheetError::Xml {
        part: part.to_string(),
        reason: e.to_string(),
    }
}

fn entities_from_rows(rows: Vec<Vec<String>>) -> Result<SheetData, SheetError> {
    let mut rows = rows.into_iter();
    let headers: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |name: &str| headers.iter().position(|h| h == name);

    let id_column = ID_HEADERS
        .iter()
        .find_map(|header| position(header).map(|index| (index, *header)));

    let (id_index, id_header, name_index) =
        match (id_column, position(NAME_HEADER), position(STATUS_HEADER)) {
            (Some((id_index, id_header)), Some(name_index), Some(_)) => {
                (id_index, id_header, name_index)
            }
            _ => {
                let found: Vec<&str> = headers
                    .iter()
                    .map(String::as_str)
                    .filter(|h| !h.is_empty())
                    .collect();
                return Err(SheetError::MissingColumns {
                    expected: format!("ID (or CIF), {}, {}", NAME_HEADER, STATUS_HEADER),
                    found: found.join(", "),
                });
            }
        };

    let cell = |row: &[String], index: usize| row.get(index).cloned().unwrap_or_default();

    let records = rows
        .filter(|row| row.iter().any(|value| !value.trim().is_empty()))
        .enumerate()
        .map(|(position, row)| {
            EntityRecord::new(
                position,
                cell(&row, id_index).trim(),
                cell(&row, name_index),
            )
        })
        .collect();

    Ok(SheetData {
        id_header: id_header.to_string(),
        headers,
        records,
    })
}
