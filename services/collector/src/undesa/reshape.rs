//! Wide-to-long reshaping of the origin/destination matrix into yearly
//! immigrant and emigrant stocks per M49 area.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::LazyLock;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use regex::Regex;
use serde::Serialize;
use store::schema::{parse_int, parse_number, parse_year, pick_column};
use store::Table;
use tracing::debug;

use crate::error::PipelineError;

/// M49 code of the "World" aggregate.
pub const WORLD_M49: i64 = 900;

/// Rows probed for the header before falling back to [`FALLBACK_HEADER_ROW`].
const HEADER_PROBE_ROWS: usize = 25;
const FALLBACK_HEADER_ROW: usize = 10;

const DEST_CODE_HEADER: &str = "location code of destination";
const ORIGIN_CODE_HEADER: &str = "location code of origin";
const DEST_NAME_HEADER: &str = "country or area of destination";
const ORIGIN_NAME_HEADER: &str = "country or area of origin";

const LONG_ORIGIN_COLUMNS: &[&str] = &["location code of origin", "origin code", "origin m49", "origin"];
const LONG_DEST_COLUMNS: &[&str] = &[
    "location code of destination",
    "destination code",
    "destination m49",
    "destination",
];
const LONG_YEAR_COLUMNS: &[&str] = &["year", "time"];
const LONG_VALUE_COLUMNS: &[&str] = &["value", "migrants", "stock"];

static TABLE1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)table\s*1").expect("sheet pattern"));

/// Migrant stocks of one area in one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InOutRow {
    pub m49: i64,
    pub country: Option<String>,
    pub year: i32,
    pub immigrants: Option<f64>,
    pub emigrants: Option<f64>,
}

impl InOutRow {
    fn new(m49: i64, year: i32) -> Self {
        Self {
            m49,
            country: None,
            year,
            immigrants: None,
            emigrants: None,
        }
    }
}

// =============================================================================
// Cell grid
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// A whole number, as location codes and year headers are.
    fn whole(&self) -> Option<i64> {
        match self {
            Cell::Number(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Cell::Text(s) => parse_int(Some(s)),
            _ => None,
        }
    }

    /// Numeric value; placeholders such as `..` read as `None`.
    fn value(&self) -> Option<f64> {
        match self {
            Cell::Number(f) => Some(*f),
            Cell::Text(s) => parse_number(Some(s)),
            Cell::Empty => None,
        }
    }

    fn header_contains(&self, needle: &str) -> bool {
        self.text().is_some_and(|t| t.to_lowercase().contains(needle))
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Empty | Data::Error(_) => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Sheet contents addressed from A1, whatever the used range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn from_range(range: &Range<Data>) -> Self {
        let (row0, col0) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows = vec![Vec::new(); row0];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col0];
            cells.extend(row.iter().map(Cell::from));
            rows.push(cells);
        }
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, r: usize) -> &[Cell] {
        self.rows.get(r).map(Vec::as_slice).unwrap_or(&[])
    }

    fn cell(&self, r: usize, c: usize) -> &Cell {
        self.row(r).get(c).unwrap_or(&EMPTY)
    }
}

/// Open a workbook from memory and read the "Table 1" sheet (else the first).
pub fn read_workbook(bytes: &[u8]) -> Result<Grid, PipelineError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PipelineError::UnreadableContainer(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet = sheet_names
        .iter()
        .find(|name| TABLE1_RE.is_match(name))
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| PipelineError::UnreadableContainer("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| PipelineError::UnreadableContainer(format!("sheet '{}': {}", sheet, e)))?;
    debug!(sheet = %sheet, rows = range.height(), cols = range.width(), "read sheet");
    Ok(Grid::from_range(&range))
}

// =============================================================================
// Workbook layout
// =============================================================================

fn find_header_row(grid: &Grid) -> Option<usize> {
    (0..grid.height().min(HEADER_PROBE_ROWS)).find(|&r| {
        let row = grid.row(r);
        row.iter().any(|c| c.header_contains(DEST_CODE_HEADER))
            && row.iter().any(|c| c.header_contains(ORIGIN_CODE_HEADER))
    })
}

fn merge_into(
    merged: &mut BTreeMap<(i64, i32), InOutRow>,
    m49: i64,
    year: i32,
    name: Option<&str>,
    immigrants: Option<Option<f64>>,
    emigrants: Option<Option<f64>>,
) {
    let row = merged
        .entry((m49, year))
        .or_insert_with(|| InOutRow::new(m49, year));
    if let Some(v) = immigrants {
        row.immigrants = v;
        if name.is_some() {
            row.country = name.map(str::to_string);
        }
    }
    if let Some(v) = emigrants {
        row.emigrants = v;
        if row.country.is_none() {
            row.country = name.map(str::to_string);
        }
    }
}

/// Immigrants are the rows whose origin is the World, keyed by destination;
/// emigrants the rows whose destination is the World, keyed by origin.
pub fn reshape_workbook(grid: &Grid) -> Result<Vec<InOutRow>, PipelineError> {
    let header_row = find_header_row(grid).unwrap_or(FALLBACK_HEADER_ROW);
    debug!(header_row, "header row");
    let header = grid.row(header_row);
    let column = |needle: &str| header.iter().position(|c| c.header_contains(needle));

    let dest = column(DEST_CODE_HEADER)
        .ok_or_else(|| PipelineError::MissingColumn("Location code of destination".to_string()))?;
    let origin = column(ORIGIN_CODE_HEADER)
        .ok_or_else(|| PipelineError::MissingColumn("Location code of origin".to_string()))?;
    let dest_name = column(DEST_NAME_HEADER);
    let origin_name = column(ORIGIN_NAME_HEADER);

    let mut seen = HashSet::new();
    let years: Vec<(usize, i32)> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| match c {
            Cell::Number(_) => c.whole().and_then(|y| i32::try_from(y).ok()).map(|y| (idx, y)),
            _ => None,
        })
        .filter(|(_, y)| seen.insert(*y))
        .collect();
    if years.is_empty() {
        return Err(PipelineError::MissingColumn("year columns".to_string()));
    }

    let mut merged = BTreeMap::new();
    for r in header_row + 1..grid.height() {
        let origin_code = grid.cell(r, origin).whole();
        let dest_code = grid.cell(r, dest).whole();
        let name_at = |idx: Option<usize>| idx.and_then(|i| grid.cell(r, i).text());

        if origin_code == Some(WORLD_M49) {
            if let Some(d) = dest_code {
                for &(c, year) in &years {
                    let v = grid.cell(r, c).value();
                    merge_into(&mut merged, d, year, name_at(dest_name), Some(v), None);
                }
            }
        }
        if dest_code == Some(WORLD_M49) {
            if let Some(o) = origin_code {
                for &(c, year) in &years {
                    let v = grid.cell(r, c).value();
                    merge_into(&mut merged, o, year, name_at(origin_name), None, Some(v));
                }
            }
        }
    }
    Ok(merged.into_values().collect())
}

// =============================================================================
// Long CSV layout
// =============================================================================

fn looks_long(headers: &[String]) -> bool {
    let lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let any = |f: &dyn Fn(&str) -> bool| lower.iter().any(|h| f(h));
    any(&|h| h.contains("origin"))
        && any(&|h| h.contains("destin"))
        && any(&|h| h == "year" || h.contains("time"))
        && any(&|h| h == "value" || h.contains("migrant") || h.contains("stock"))
}

/// Long layout (one row per origin, destination and year): values summed per
/// (area, year) over the rows that have the World on the other side.
pub fn reshape_long_csv(table: &Table) -> Result<Vec<InOutRow>, PipelineError> {
    let headers = table.headers();
    if !looks_long(headers) {
        return Err(PipelineError::UnreadableContainer(
            "csv is not in destination/origin long format".to_string(),
        ));
    }
    let pick = |candidates: &[&str], what: &str| {
        pick_column(headers, candidates).ok_or_else(|| PipelineError::MissingColumn(what.to_string()))
    };
    let origin = pick(LONG_ORIGIN_COLUMNS, "origin")?;
    let dest = pick(LONG_DEST_COLUMNS, "destination")?;
    let year = pick(LONG_YEAR_COLUMNS, "year")?;
    let value = pick(LONG_VALUE_COLUMNS, "value")?;

    let mut immigrants: BTreeMap<(i64, i32), f64> = BTreeMap::new();
    let mut emigrants: BTreeMap<(i64, i32), f64> = BTreeMap::new();
    for r in table.rows() {
        let Some(y) = parse_year(r.at(year)) else {
            continue;
        };
        let o = parse_int(r.at(origin));
        let d = parse_int(r.at(dest));
        let v = parse_number(r.at(value)).unwrap_or(0.0);
        if let (Some(WORLD_M49), Some(d)) = (o, d) {
            *immigrants.entry((d, y)).or_default() += v;
        }
        if let (Some(WORLD_M49), Some(o)) = (d, o) {
            *emigrants.entry((o, y)).or_default() += v;
        }
    }

    let mut merged = BTreeMap::new();
    for ((m49, y), v) in immigrants {
        merge_into(&mut merged, m49, y, None, Some(Some(v)), None);
    }
    for ((m49, y), v) in emigrants {
        merge_into(&mut merged, m49, y, None, None, Some(Some(v)));
    }
    Ok(merged.into_values().collect())
}
