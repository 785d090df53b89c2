// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Reading audit workbooks and raw listings back in

use calamine::{open_workbook_auto, Range, Reader, Sheets};
use chrono::NaiveDate;
use quick_xml::events::Event;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::links::resolve_against;
use super::{normalize_header, parse_cell_ref, StoredLink};
use crate::collector::{extension_of, mb_to_bytes, FileRecord};
use crate::config::SheetConfig;
use crate::owner::OwnerLookup;
use crate::{Result, TreeAuditError};

const ACTION_COLUMN: &str = "Action";
const RENAME_COLUMN: &str = "Rename as…";
const MOVE_COLUMN: &str = "Move to…";
const RAW_PATH_COLUMN: &str = "File Path";

/// One data row of an edited audit sheet
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    /// 1-based worksheet row number; the header is row 1
    pub sheet_row: u32,
    pub name: String,
    pub item_type: String,
    pub action: String,
    pub rename_as: String,
    pub move_to: String,
    /// Path recovered from the row's location reference
    pub path: Option<PathBuf>,
}

/// An opened workbook plus the package path for relationship lookups
pub struct WorkbookReader {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl WorkbookReader {
    pub fn open(path: &Path) -> Result<Self> {
        let sheets = open_workbook_auto(path)
            .map_err(|e| TreeAuditError::Workbook(format!("Failed to open {:?}: {}", path, e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    fn values(&mut self, sheet: &str) -> Result<SheetGrid> {
        if !self.sheet_names().iter().any(|s| s == sheet) {
            return Err(TreeAuditError::MissingSheet(sheet.to_string()));
        }
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| TreeAuditError::Workbook(format!("Failed to read sheet '{}': {}", sheet, e)))?;
        Ok(SheetGrid::new(sheet, range))
    }

    fn formulas(&mut self, sheet: &str) -> Range<String> {
        match self.sheets.worksheet_formula(sheet) {
            Ok(range) => range,
            Err(e) => {
                debug!("No formulas readable in '{}': {}", sheet, e);
                Range::empty()
            }
        }
    }

    /// Recover the path referenced by `column` for every data row of `sheet`.
    ///
    /// Keys are worksheet row numbers. A formula reference in the cell wins
    /// over a native hyperlink; rows with neither map to `None`. Relative
    /// targets are resolved against the folder holding the workbook.
    pub fn location_references(&mut self, sheet: &str, column: &str) -> Result<BTreeMap<u32, Option<PathBuf>>> {
        let workbook_dir = self.workbook_dir()?;
        let grid = self.values(sheet)?;
        let col = grid.require_column(column)?;
        let formulas = self.formulas(sheet);
        let native = native_hyperlinks(&self.path, sheet)?;

        let last_row = [grid.last_row(), formulas.end().map(|(r, _)| r)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(grid.header_row);
        let native_last = native.keys().map(|(r, _)| *r).max().unwrap_or(0);
        let last_row = last_row.max(native_last);

        let mut references = BTreeMap::new();
        for row in (grid.header_row + 1)..=last_row {
            let stored = formulas
                .get_value((row, col))
                .filter(|f| !f.trim().is_empty())
                .map(|f| StoredLink::Formula(f.clone()))
                .or_else(|| native.get(&(row, col)).map(|t| StoredLink::Native(t.clone())));

            let target = stored
                .as_ref()
                .and_then(StoredLink::target)
                .map(|path| resolve_against(path, &workbook_dir));
            match &target {
                Some(path) => debug!("Reference extracted at row {}: {:?}", row + 1, path),
                None => debug!("No reference at row {}", row + 1),
            }
            references.insert(row + 1, target);
        }

        Ok(references)
    }

    fn workbook_dir(&self) -> Result<PathBuf> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        if dir.is_absolute() {
            Ok(dir.to_path_buf())
        } else {
            Ok(std::env::current_dir()?.join(dir))
        }
    }
}

/// Values of one sheet with its header row located
struct SheetGrid {
    name: String,
    range: Range<calamine::Data>,
    header_row: u32,
    columns: HashMap<String, u32>,
}

impl SheetGrid {
    fn new(name: &str, range: Range<calamine::Data>) -> Self {
        let (header_row, first_col) = range.start().unwrap_or((0, 0));
        let last_col = range.end().map(|(_, c)| c).unwrap_or(0);

        let mut columns = HashMap::new();
        if !range.is_empty() {
            for col in first_col..=last_col {
                if let Some(value) = range.get_value((header_row, col)) {
                    let header = normalize_header(&value.to_string());
                    if !header.is_empty() {
                        columns.entry(header).or_insert(col);
                    }
                }
            }
        }

        Self {
            name: name.to_string(),
            range,
            header_row,
            columns,
        }
    }

    fn column(&self, header: &str) -> Option<u32> {
        self.columns.get(&normalize_header(header)).copied()
    }

    fn require_column(&self, header: &str) -> Result<u32> {
        self.column(header).ok_or_else(|| TreeAuditError::MissingColumn {
            sheet: self.name.clone(),
            column: header.to_string(),
        })
    }

    fn last_row(&self) -> Option<u32> {
        self.range.end().map(|(r, _)| r)
    }

    fn text(&self, row: u32, col: Option<u32>) -> String {
        col.and_then(|c| self.range.get_value((row, c)))
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// Recover per-row paths from `column` of `sheet` in the workbook at `path`
pub fn read_location_references(path: &Path, sheet: &str, column: &str) -> Result<BTreeMap<u32, Option<PathBuf>>> {
    WorkbookReader::open(path)?.location_references(sheet, column)
}

/// Read every data row of the audit sheet, joined to its location reference by row number
pub fn read_audit_rows(path: &Path, sheets: &SheetConfig) -> Result<Vec<AuditRow>> {
    let mut reader = WorkbookReader::open(path)?;
    let grid = reader.values(&sheets.audit_sheet)?;

    let action_col = grid.require_column(ACTION_COLUMN)?;
    let rename_col = grid.require_column(RENAME_COLUMN)?;
    let move_col = grid.require_column(MOVE_COLUMN)?;
    let name_col = grid.column("Name");
    let type_col = grid.column("Item Type");

    let references = reader.location_references(&sheets.audit_sheet, &sheets.reference_column)?;

    let mut rows = Vec::new();
    for (&sheet_row, target) in &references {
        let row = sheet_row - 1;
        let audit_row = AuditRow {
            sheet_row,
            name: grid.text(row, name_col),
            item_type: grid.text(row, type_col).trim().to_string(),
            action: grid.text(row, Some(action_col)).trim().to_string(),
            rename_as: grid.text(row, Some(rename_col)).trim().to_string(),
            move_to: grid.text(row, Some(move_col)).trim().to_string(),
            path: target.clone(),
        };

        let blank = audit_row.path.is_none()
            && audit_row.name.trim().is_empty()
            && audit_row.action.is_empty();
        if !blank {
            rows.push(audit_row);
        }
    }

    info!("Read {} audit rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Read a raw listing (xlsx sheet with a "File Path" column, or CSV) back into records.
///
/// Missing owners are looked up again; missing sizes and dates are left empty.
pub fn read_raw_listing(path: &Path, owners: &dyn OwnerLookup) -> Result<Vec<FileRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let table = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => raw_table_from_workbook(path)?,
        _ => raw_table_from_csv(path)?,
    };

    let column = |name: &str| table.header.iter().position(|h| *h == normalize_header(name));
    let path_col = column(RAW_PATH_COLUMN).ok_or_else(|| TreeAuditError::MissingColumn {
        sheet: path.to_string_lossy().into_owned(),
        column: RAW_PATH_COLUMN.to_string(),
    })?;
    let name_col = column("File Name");
    let type_col = column("File Type");
    let size_col = column("File Size (MB)");
    let created_col = column("Date Created");
    let modified_col = column("Last Modified");
    let owner_col = column("Owner");

    let mut records = Vec::new();
    for row in &table.rows {
        let field = |col: Option<usize>| col.and_then(|c| row.get(c)).map(|s| s.trim()).unwrap_or("");

        let file_path = field(Some(path_col));
        if file_path.is_empty() {
            continue;
        }
        let file_path = PathBuf::from(file_path);

        let name = match field(name_col) {
            "" => file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            n => n.to_string(),
        };
        let file_type = match field(type_col) {
            "" => extension_of(&file_path),
            t => t.to_string(),
        };
        let owner = match owner_col {
            Some(_) => field(owner_col).to_string(),
            None => owners.owner_of(&file_path),
        };

        records.push(FileRecord {
            name,
            file_type,
            size_bytes: mb_to_bytes(field(size_col).parse().unwrap_or(0.0)),
            created: parse_date(field(created_col)),
            modified: parse_date(field(modified_col)),
            owner,
            path: file_path,
        });
    }

    info!("Read {} records from raw listing {:?}", records.len(), path);
    Ok(records)
}

struct RawTable {
    /// Normalized header text
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn raw_table_from_workbook(path: &Path) -> Result<RawTable> {
    let mut reader = WorkbookReader::open(path)?;

    for sheet in reader.sheet_names() {
        let grid = reader.values(&sheet)?;
        if grid.column(RAW_PATH_COLUMN).is_none() {
            debug!("Sheet '{}' has no '{}' column", sheet, RAW_PATH_COLUMN);
            continue;
        }

        let mut rows = grid.range.rows();
        let header = rows
            .next()
            .map(|r| r.iter().map(|c| normalize_header(&c.to_string())).collect())
            .unwrap_or_default();
        let rows = rows
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        return Ok(RawTable { header, rows });
    }

    Err(TreeAuditError::MissingColumn {
        sheet: "any sheet".to_string(),
        column: RAW_PATH_COLUMN.to_string(),
    })
}

fn raw_table_from_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header = reader.headers()?.iter().map(normalize_header).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record.iter().map(String::from).collect()),
            Err(e) => warn!("Skipping malformed CSV row in {:?}: {}", path, e),
        }
    }
    Ok(RawTable { header, rows })
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, super::DATE_FORMAT).ok()
}

/// Native hyperlinks of `sheet`, keyed by zero-based (row, column).
///
/// Workbooks that are not OOXML packages have none.
fn native_hyperlinks(path: &Path, sheet: &str) -> Result<HashMap<(u32, u32), String>> {
    let mut links = HashMap::new();

    let mut archive = match zip::ZipArchive::new(File::open(path)?) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("{:?} is not an xlsx package ({}), skipping native links", path, e);
            return Ok(links);
        }
    };

    let Some(workbook) = read_part(&mut archive, "xl/workbook.xml")? else {
        return Ok(links);
    };
    let Some(sheet_rid) = elements(&workbook, b"sheet")?
        .into_iter()
        .find(|attrs| attrs.get("name").map(String::as_str) == Some(sheet))
        .and_then(|attrs| attrs.get("id").cloned())
    else {
        return Ok(links);
    };

    let workbook_rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();
    let Some(sheet_target) = relationship_targets(&workbook_rels)?.remove(&sheet_rid) else {
        return Ok(links);
    };
    let sheet_part = resolve_part("xl", &sheet_target);

    let Some(sheet_xml) = read_part(&mut archive, &sheet_part)? else {
        warn!("Sheet part {} missing from {:?}", sheet_part, path);
        return Ok(links);
    };
    let rels_part = match sheet_part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", sheet_part),
    };
    let sheet_rels = read_part(&mut archive, &rels_part)?.unwrap_or_default();
    let targets = relationship_targets(&sheet_rels)?;

    for attrs in elements(&sheet_xml, b"hyperlink")? {
        let (Some(reference), Some(rid)) = (attrs.get("ref"), attrs.get("id")) else {
            continue;
        };
        let (Some(cell), Some(target)) = (parse_cell_ref(reference), targets.get(rid)) else {
            continue;
        };
        links.insert(cell, target.clone());
    }

    debug!("Found {} native links in sheet '{}'", links.len(), sheet);
    Ok(links)
}

fn read_part(archive: &mut zip::ZipArchive<File>, name: &str) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut content = String::new();
            part.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Part name for a relationship target relative to `base_dir`
fn resolve_part(base_dir: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}/{}", base_dir, target),
    }
}

fn relationship_targets(xml: &str) -> Result<HashMap<String, String>> {
    Ok(elements(xml, b"Relationship")?
        .into_iter()
        .filter_map(|mut attrs| Some((attrs.remove("Id")?, attrs.remove("Target")?)))
        .collect())
}

/// Attributes (by local name) of every element named `local_name`
fn elements(xml: &str, local_name: &[u8]) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut found = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == local_name => {
                let mut attrs = HashMap::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    attrs.insert(key, attr.decode_and_unescape_value(&reader)?.into_owned());
                }
                found.push(attrs);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}
