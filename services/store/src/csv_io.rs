//! CSV I/O that tolerates whatever the fetchers have written over the years.
//!
//! - `read_csv_safe`: whole-file read, encoding and separator guessed
//! - `read_csv_filtered`: streamed read keeping a single country's rows
//! - `write_csv` / `append_csv`: the write side used by the collector
//!
//! The read functions never fail. A missing, empty or unparseable file reads
//! as an empty table (with the requested columns, when given).

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::time::UNIX_EPOCH;

use encoding_rs::{UTF_16BE, UTF_16LE, WINDOWS_1252};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schema::{self, FieldAliases};
use crate::table::{cell_from_text, Table};

/// Records per chunk for filtered reads.
pub const CHUNK_ROWS: usize = 200_000;

/// Separators in the order they are tried.
const SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Bytes inspected when sniffing for UTF-16.
const SNIFF_BYTES: usize = 4096;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf16Le,
    Utf16Be,
    Utf8,
    Cp1252,
    Latin1,
}

// =============================================================================
// File signature
// =============================================================================

/// Modification time and size of a file; `None` fields when it does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FileSignature {
    pub modified_ns: Option<u128>,
    pub size: Option<u64>,
}

pub fn file_signature(path: &Path) -> FileSignature {
    match fs::metadata(path) {
        Ok(meta) => FileSignature {
            modified_ns: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos()),
            size: Some(meta.len()),
        },
        Err(_) => FileSignature::default(),
    }
}

// =============================================================================
// Robust whole-file reader
// =============================================================================

/// Read a CSV of unknown encoding and separator.
///
/// With `expected` set, missing columns are added as nulls and the result is
/// sliced to exactly those columns, in that order.
pub fn read_csv_safe(path: &Path, expected: Option<&[&str]>) -> Table {
    let empty = || expected.map(Table::empty).unwrap_or_default();

    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return empty(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read csv");
            return empty();
        }
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return empty();
    }

    let Some(table) = parse_csv_bytes(&raw) else {
        warn!(path = %path.display(), "no encoding/separator combination parsed");
        return empty();
    };

    match expected {
        Some(columns) => table.select_columns(columns),
        None => table,
    }
}

/// `read_csv_safe` without an expected column list.
pub fn read_csv_safe_any(path: &Path) -> Table {
    read_csv_safe(path, None)
}

/// Parse in-memory CSV bytes, trying every encoding against every separator.
///
/// A parse that yields a single column only wins when no combination yields
/// more, since any single-separator file "parses" with the wrong separator.
pub fn parse_csv_bytes(raw: &[u8]) -> Option<Table> {
    let mut single_column: Option<Table> = None;

    for encoding in candidate_encodings(raw) {
        let Some(text) = decode(raw, encoding) else {
            continue;
        };
        for separator in SEPARATORS {
            match parse_text(&text, separator) {
                Ok(table) if table.width() > 1 => {
                    debug!(?encoding, separator = %(separator as char).escape_default(), "csv parsed");
                    return Some(table);
                }
                Ok(table) => {
                    single_column.get_or_insert(table);
                }
                Err(_) => {}
            }
        }
    }
    single_column
}

fn candidate_encodings(raw: &[u8]) -> Vec<TextEncoding> {
    use TextEncoding::*;

    let mut out = Vec::with_capacity(5);
    if raw.starts_with(UTF16LE_BOM) {
        out.extend([Utf16Le, Utf16Be]);
    } else if raw.starts_with(UTF16BE_BOM) {
        out.extend([Utf16Be, Utf16Le]);
    } else {
        let head = &raw[..raw.len().min(SNIFF_BYTES)];
        let (even, odd) = head
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == 0)
            .fold((0usize, 0usize), |(e, o), (i, _)| {
                if i % 2 == 0 {
                    (e + 1, o)
                } else {
                    (e, o + 1)
                }
            });
        // ASCII text in UTF-16LE has its NULs at odd offsets.
        if odd > 0 && odd >= even {
            out.extend([Utf16Le, Utf16Be]);
        } else if even > 0 {
            out.extend([Utf16Be, Utf16Le]);
        }
    }
    out.extend([Utf8, Cp1252, Latin1]);
    out
}

fn decode(raw: &[u8], encoding: TextEncoding) -> Option<String> {
    match encoding {
        TextEncoding::Utf16Le => {
            let body = raw.strip_prefix(UTF16LE_BOM).unwrap_or(raw);
            UTF_16LE
                .decode_without_bom_handling_and_without_replacement(body)
                .map(Cow::into_owned)
        }
        TextEncoding::Utf16Be => {
            let body = raw.strip_prefix(UTF16BE_BOM).unwrap_or(raw);
            UTF_16BE
                .decode_without_bom_handling_and_without_replacement(body)
                .map(Cow::into_owned)
        }
        TextEncoding::Utf8 => {
            let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
            std::str::from_utf8(body).ok().map(str::to_string)
        }
        TextEncoding::Cp1252 => Some(WINDOWS_1252.decode_without_bom_handling(raw).0.into_owned()),
        TextEncoding::Latin1 => Some(raw.iter().map(|&b| char::from(b)).collect()),
    }
}

fn parse_text(text: &str, separator: u8) -> std::result::Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();
    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_text_row(record.iter());
    }
    Ok(table)
}

fn clean_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').trim().to_string()
}

/// UTF-8 when valid, CP1252 otherwise.
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

// =============================================================================
// Filtered chunked reader
// =============================================================================

/// Column selection and parsing options for [`read_csv_filtered`].
#[derive(Debug, Clone)]
pub struct FilteredQuery {
    pub iso3_column: &'static str,
    pub columns: Vec<&'static str>,
    /// Aliases used to resolve drifted headers; empty means exact names only.
    pub schema: &'static [FieldAliases],
    /// Sniffed from the header line when `None`.
    pub separator: Option<u8>,
    pub chunk_rows: usize,
}

impl FilteredQuery {
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            iso3_column: "iso3",
            columns: columns.to_vec(),
            schema: &[],
            separator: None,
            chunk_rows: CHUNK_ROWS,
        }
    }

    pub fn with_schema(mut self, schema: &'static [FieldAliases]) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    pub fn with_iso3_column(mut self, column: &'static str) -> Self {
        self.iso3_column = column;
        self
    }

    fn resolve(&self, headers: &[String], column: &str) -> Option<usize> {
        match self.schema.iter().find(|f| f.canonical == column) {
            Some(f) => schema::pick_column(headers, &schema::candidates(f)),
            None => schema::pick_column(headers, &[column]),
        }
    }
}

/// Stream `path` in chunks and keep the rows whose ISO3 column equals `iso3`
/// (case-insensitive). Returns the requested columns only.
pub fn read_csv_filtered(path: &Path, iso3: &str, query: &FilteredQuery) -> Table {
    let empty = || Table::empty(&query.columns);
    let target = schema::normalize_iso3(iso3);

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "could not open csv");
            }
            return empty();
        }
    };
    let mut reader = BufReader::new(file);
    let head = match reader.fill_buf() {
        Ok(buf) => buf.to_vec(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read csv");
            return empty();
        }
    };
    if head.is_empty() {
        return empty();
    }

    // UTF-16 cannot be streamed record by record; take the robust path.
    if head.starts_with(UTF16LE_BOM) || head.starts_with(UTF16BE_BOM) || head.contains(&0) {
        debug!(path = %path.display(), "utf-16 input, filtering in memory");
        return filter_table(&read_csv_safe_any(path), &target, query);
    }

    let separator = query.separator.unwrap_or_else(|| sniff_separator(&head));
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = match csv_reader.byte_headers() {
        Ok(h) => h.iter().map(|f| clean_header(&decode_field(f))).collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read csv header");
            return empty();
        }
    };
    let Some(iso_idx) = query.resolve(&headers, query.iso3_column) else {
        debug!(path = %path.display(), column = query.iso3_column, "iso3 column not in header");
        return empty();
    };
    let col_idx: Vec<Option<usize>> = query.columns.iter().map(|c| query.resolve(&headers, c)).collect();

    let mut out = empty();
    let mut chunk: Vec<csv::ByteRecord> = Vec::with_capacity(query.chunk_rows.min(8192));
    let mut record = csv::ByteRecord::new();
    let mut exhausted = false;
    let mut chunks = 0usize;

    while !exhausted {
        chunk.clear();
        while chunk.len() < query.chunk_rows {
            match csv_reader.read_byte_record(&mut record) {
                Ok(true) => chunk.push(record.clone()),
                Ok(false) => {
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "stopped reading csv early");
                    exhausted = true;
                    break;
                }
            }
        }
        if chunk.is_empty() {
            break;
        }
        chunks += 1;

        for rec in &chunk {
            let matches = rec
                .get(iso_idx)
                .map(|f| schema::normalize_iso3(&decode_field(f)) == target)
                .unwrap_or(false);
            if !matches {
                continue;
            }
            out.push_row(col_idx.iter().map(|idx| {
                idx.and_then(|i| rec.get(i))
                    .and_then(|f| cell_from_text(&decode_field(f)))
            }));
        }
    }

    debug!(path = %path.display(), iso3 = %target, chunks, rows = out.len(), "filtered csv read");
    out
}

fn filter_table(table: &Table, target: &str, query: &FilteredQuery) -> Table {
    let mut out = Table::empty(&query.columns);
    let Some(iso_idx) = query.resolve(table.headers(), query.iso3_column) else {
        return out;
    };
    let col_idx: Vec<Option<usize>> = query
        .columns
        .iter()
        .map(|c| query.resolve(table.headers(), c))
        .collect();
    for row in table.rows() {
        if row.at(iso_idx).map(schema::normalize_iso3).as_deref() != Some(target) {
            continue;
        }
        out.push_row(col_idx.iter().map(|idx| idx.and_then(|i| row.at(i)).map(str::to_string)));
    }
    out
}

/// Pick the separator that occurs most often on the header line; `;` on ties
/// or when none occurs.
fn sniff_separator(head: &[u8]) -> u8 {
    let line = head.split(|b| *b == b'\n').next().unwrap_or(head);
    [b';', b',', b'\t']
        .into_iter()
        .map(|sep| (sep, line.iter().filter(|b| **b == sep).count()))
        .fold((b';', 0usize), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

// =============================================================================
// Writers
// =============================================================================

/// Write `table` to `path`, replacing any existing file.
pub fn write_csv(path: &Path, table: &Table, separator: u8) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(separator)
        .from_path(path)?;
    write_rows(&mut writer, path, table, true)
}

/// Append the rows of `table`, writing the header only when the file is new or empty.
pub fn append_csv(path: &Path, table: &Table, separator: u8) -> Result<()> {
    ensure_parent(path)?;
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(separator)
        .from_writer(file);
    write_rows(&mut writer, path, table, needs_header)
}

fn write_rows<W: std::io::Write>(writer: &mut csv::Writer<W>, path: &Path, table: &Table, header: bool) -> Result<()> {
    if header {
        writer.write_record(table.headers())?;
    }
    for row in table.rows() {
        writer.write_record(row.cells().iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Cell text for a number: whole values without a fractional part.
pub fn format_number(v: Option<f64>) -> Option<String> {
    let v = v.filter(|v| v.is_finite())?;
    if v.fract() == 0.0 && v.abs() < 1e15 {
        Some(format!("{}", v as i64))
    } else {
        Some(v.to_string())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut bytes = UTF16LE_BOM.to_vec();
        for unit in text.encode_utf16() {
            bytes.extend(unit.to_le_bytes());
        }
        bytes
    }

    fn sample(sep: char) -> String {
        format!(
            "iso3{s}name{s}value\nPRT{s}Portugal{s}10.5\nCIV{s}Côte d'Ivoire{s}3\n",
            s = sep
        )
    }

    fn assert_sample(table: &Table) {
        assert_eq!(table.headers(), &["iso3", "name", "value"]);
        assert_eq!(table.len(), 2);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0].get("value"), Some("10.5"));
        assert_eq!(rows[1].get("name"), Some("Côte d'Ivoire"));
    }

    // -------------------------------------------------------------------------
    // ROBUST READER
    // -------------------------------------------------------------------------

    #[test]
    fn test_round_trip_encodings_and_separators() {
        let dir = TempDir::new().unwrap();
        for sep in [',', ';', '\t'] {
            let text = sample(sep);
            let variants: Vec<(&str, Vec<u8>)> = vec![
                ("utf8", text.as_bytes().to_vec()),
                ("utf8-bom", [UTF8_BOM, text.as_bytes()].concat()),
                ("utf16", utf16le_with_bom(&text)),
            ];
            for (name, bytes) in variants {
                let path = dir.path().join(format!("{}-{}.csv", name, sep as u32));
                fs::write(&path, bytes).unwrap();
                let table = read_csv_safe_any(&path);
                assert_sample(&table);
            }
        }
    }

    #[test]
    fn test_utf16_without_bom_detected_by_nul_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nobom.csv");
        let bytes: Vec<u8> = sample(';').encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        fs::write(&path, bytes).unwrap();
        assert_sample(&read_csv_safe_any(&path));
    }

    #[test]
    fn test_cp1252_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp1252.csv");
        fs::write(&path, b"iso3;name\nCIV;C\xf4te d'Ivoire\n").unwrap();
        let table = read_csv_safe_any(&path);
        assert_eq!(table.rows().next().unwrap().get("name"), Some("Côte d'Ivoire"));
    }

    #[test]
    fn test_missing_file_returns_expected_columns() {
        let dir = TempDir::new().unwrap();
        let table = read_csv_safe(&dir.path().join("nope.csv"), Some(&["iso3", "year"]));
        assert!(table.is_empty());
        assert_eq!(table.headers(), &["iso3", "year"]);
        assert_eq!(read_csv_safe_any(&dir.path().join("nope.csv")).width(), 0);
    }

    #[test]
    fn test_whitespace_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.csv");
        fs::write(&path, "  \n\n").unwrap();
        let table = read_csv_safe(&path, Some(&["iso3"]));
        assert!(table.is_empty());
        assert_eq!(table.headers(), &["iso3"]);
    }

    #[test]
    fn test_expected_columns_hide_drift() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drift.csv");
        fs::write(&path, "year;iso3;extra\n2020;PRT;x\n").unwrap();
        let table = read_csv_safe(&path, Some(&["iso3", "year", "value"]));
        assert_eq!(table.headers(), &["iso3", "year", "value"]);
        let row = table.rows().next().unwrap();
        assert_eq!(row.get("iso3"), Some("PRT"));
        assert_eq!(row.get("value"), None);
    }

    #[test]
    fn test_single_column_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one.csv");
        fs::write(&path, "iso3\nPRT\nESP\n").unwrap();
        let table = read_csv_safe_any(&path);
        assert_eq!(table.headers(), &["iso3"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_semicolon_file_with_commas_in_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.csv");
        fs::write(&path, "iso3;name\nKOR;Korea, Republic of\nPRT;Portugal\n").unwrap();
        let table = read_csv_safe_any(&path);
        assert_eq!(table.headers(), &["iso3", "name"]);
        assert_eq!(table.rows().next().unwrap().get("name"), Some("Korea, Republic of"));
    }

    #[test]
    fn test_file_signature_missing_and_present() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sig.csv");
        assert_eq!(file_signature(&path), FileSignature::default());
        fs::write(&path, "a\n1\n").unwrap();
        let sig = file_signature(&path);
        assert_eq!(sig.size, Some(4));
        assert!(sig.modified_ns.is_some());
    }

    // -------------------------------------------------------------------------
    // FILTERED READER
    // -------------------------------------------------------------------------

    fn countries_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("series.csv");
        let mut body = String::from("iso3;year;value\n");
        for year in 2000..2010 {
            for iso in ["PRT", "esp", "FRA"] {
                body.push_str(&format!("{};{};{}\n", iso, year, year - 1999));
            }
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_filtered_returns_exactly_matching_rows() {
        let dir = TempDir::new().unwrap();
        let path = countries_file(&dir);
        let query = FilteredQuery::new(&["iso3", "year", "value"]);
        let table = read_csv_filtered(&path, "ESP", &query);
        assert_eq!(table.len(), 10);
        assert!(table.rows().all(|r| r.get("iso3") == Some("esp")));
    }

    #[test]
    fn test_filtered_is_independent_of_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = countries_file(&dir);
        let baseline = read_csv_filtered(&path, "esp", &FilteredQuery::new(&["year", "value"]));
        for chunk in [1, 2, 7, 30, 1000] {
            let query = FilteredQuery::new(&["year", "value"]).with_chunk_rows(chunk);
            assert_eq!(read_csv_filtered(&path, "ESP", &query), baseline);
        }
    }

    #[test]
    fn test_filtered_absent_iso3_returns_requested_columns() {
        let dir = TempDir::new().unwrap();
        let path = countries_file(&dir);
        let table = read_csv_filtered(&path, "DEU", &FilteredQuery::new(&["iso3", "value"]));
        assert!(table.is_empty());
        assert_eq!(table.headers(), &["iso3", "value"]);
    }

    #[test]
    fn test_filtered_missing_file() {
        let dir = TempDir::new().unwrap();
        let table = read_csv_filtered(&dir.path().join("nope.csv"), "PRT", &FilteredQuery::new(&["iso3"]));
        assert!(table.is_empty());
        assert_eq!(table.headers(), &["iso3"]);
    }

    #[test]
    fn test_filtered_sniffs_comma_and_resolves_aliases() {
        const SCHEMA: &[FieldAliases] = &[schema::field("year", &["ano"])];
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("comma.csv");
        fs::write(&path, "\u{feff}ISO3,Ano,value\nPRT,2020,1\nESP,2020,2\n").unwrap();
        let query = FilteredQuery::new(&["iso3", "year", "value"]).with_schema(SCHEMA);
        let table = read_csv_filtered(&path, "prt", &query);
        assert_eq!(table.len(), 1);
        let row = table.rows().next().unwrap();
        assert_eq!(row.get("year"), Some("2020"));
        assert_eq!(row.get("value"), Some("1"));
    }

    #[test]
    fn test_filtered_utf16_falls_back_to_robust_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.csv");
        fs::write(&path, utf16le_with_bom("iso3;year\nPRT;2020\nESP;2021\n")).unwrap();
        let table = read_csv_filtered(&path, "ESP", &FilteredQuery::new(&["year"]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows().next().unwrap().get("year"), Some("2021"));
    }

    #[test]
    fn test_filtered_without_iso3_column_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noiso.csv");
        fs::write(&path, "code;year\nPRT;2020\n").unwrap();
        assert!(read_csv_filtered(&path, "PRT", &FilteredQuery::new(&["year"])).is_empty());
    }

    #[test]
    fn test_sniff_separator() {
        assert_eq!(sniff_separator(b"a,b,c\n1;2"), b',');
        assert_eq!(sniff_separator(b"a\tb\n"), b'\t');
        assert_eq!(sniff_separator(b"a;b,c\n"), b';');
        assert_eq!(sniff_separator(b"single\n"), b';');
    }

    // -------------------------------------------------------------------------
    // WRITERS
    // -------------------------------------------------------------------------

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut table = Table::empty(&["iso3", "year", "immigrants"]);
        table.push_text_row(["PRT", "1990", "100"]);
        table.push_row([Some("ESP".to_string()), Some("1990".to_string()), None]);
        write_csv(&path, &table, b';').unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "iso3;year;immigrants\nPRT;1990;100\nESP;1990;\n");
        assert_eq!(read_csv_safe_any(&path), table);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(Some(1990.0)).as_deref(), Some("1990"));
        assert_eq!(format_number(Some(66.25)).as_deref(), Some("66.25"));
        assert_eq!(format_number(Some(f64::NAN)), None);
        assert_eq!(format_number(None), None);
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("append.csv");
        let mut table = Table::empty(&["iso3", "year"]);
        table.push_text_row(["PRT", "2000"]);
        append_csv(&path, &table, b',').unwrap();
        append_csv(&path, &table, b',').unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "iso3,year\nPRT,2000\nPRT,2000\n");
    }

    #[test]
    fn test_append_open_failure_names_the_path() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("is_a_dir");
        fs::create_dir(&target).unwrap();
        let err = append_csv(&target, &Table::empty(&["iso3"]), b',').unwrap_err();
        match err {
            Error::Io { path, .. } => assert_eq!(path, target),
            other => panic!("unexpected error: {other}"),
        }
    }
}
