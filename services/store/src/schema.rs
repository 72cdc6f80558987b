//! Column-name drift and cell coercion.
//!
//! Every dataset declares a table of canonical fields and the source aliases
//! each one has carried across fetcher versions. [`normalize_columns`] is the
//! single place where headers are matched against those tables.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::table::Table;

/// A canonical field and the source headers accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

pub const fn field(canonical: &'static str, aliases: &'static [&'static str]) -> FieldAliases {
    FieldAliases { canonical, aliases }
}

/// Header comparison key: trimmed, BOM stripped, lower-cased.
pub fn header_key(s: &str) -> String {
    s.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Looser key: only alphanumerics survive ("ISO 3166-1 alpha-3 code" -> "iso31661alpha3code").
pub fn alnum_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the first header matching any candidate, trying an exact key match
/// over all candidates before falling back to the alphanumeric key.
pub fn pick_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    let exact: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    for candidate in candidates {
        let key = header_key(candidate);
        if let Some(idx) = exact.iter().position(|h| *h == key) {
            return Some(idx);
        }
    }

    let loose: Vec<String> = headers.iter().map(|h| alnum_key(h)).collect();
    for candidate in candidates {
        let key = alnum_key(candidate);
        if key.is_empty() {
            continue;
        }
        if let Some(idx) = loose.iter().position(|h| *h == key) {
            return Some(idx);
        }
    }
    None
}

/// Candidate list for one field: the canonical name first, then its aliases.
pub fn candidates(field: &FieldAliases) -> Vec<&'static str> {
    std::iter::once(field.canonical)
        .chain(field.aliases.iter().copied())
        .collect()
}

/// Rename headers to their canonical names. Headers already canonical are
/// left alone; a header is claimed by at most one field.
pub fn normalize_columns(table: &mut Table, schema: &[FieldAliases]) {
    let mut claimed: Vec<usize> = Vec::new();
    for f in schema {
        if let Some(idx) = table.column_index(f.canonical) {
            claimed.push(idx);
        }
    }
    for f in schema {
        if table.has_column(f.canonical) {
            continue;
        }
        let headers = table.headers().to_vec();
        let hit = f
            .aliases
            .iter()
            .find_map(|alias| pick_column(&headers, &[alias]).filter(|idx| !claimed.contains(idx)));
        if let Some(idx) = hit {
            tracing::debug!(from = %headers[idx], to = f.canonical, "renamed drifted column");
            table.rename_column(idx, f.canonical);
            claimed.push(idx);
        }
    }
}

/// Strip accents, lower-case and collapse whitespace.
pub fn fold_text(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

const NAME_FIXES: &[(&str, &str)] = &[
    ("united states of america", "united states"),
    ("viet nam", "vietnam"),
    ("iran islamic republic of", "iran"),
    ("syrian arab republic", "syria"),
    ("russian federation", "russia"),
    ("bolivia plurinational state of", "bolivia"),
    ("tanzania united republic of", "tanzania"),
    ("korea republic of", "south korea"),
    ("korea democratic people s republic of", "north korea"),
];

/// Country-name matching key, reconciling UN DESA spellings with seed names.
pub fn name_key(s: &str) -> String {
    let folded = fold_text(&s.replace('&', " e "));
    let mut key: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    key = key.split_whitespace().collect::<Vec<_>>().join(" ");
    for (from, to) in NAME_FIXES {
        key = key.replace(from, to);
    }
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, upper-cased country code.
pub fn normalize_iso3(s: &str) -> String {
    s.trim().to_uppercase()
}

pub fn is_iso3(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase())
}

/// Lenient numeric coercion: unparseable or non-finite values become `None`.
pub fn parse_number(s: Option<&str>) -> Option<f64> {
    let v: f64 = s?.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

/// Integer coercion that also accepts whole floats ("1990.0").
pub fn parse_int(s: Option<&str>) -> Option<i64> {
    let s = s?.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = parse_number(Some(s))?;
    (f.fract() == 0.0).then_some(f as i64)
}

pub fn parse_year(s: Option<&str>) -> Option<i32> {
    parse_int(s).and_then(|v| i32::try_from(v).ok())
}

pub fn parse_flag(s: Option<&str>) -> bool {
    match s.map(|v| v.trim().to_lowercase()) {
        Some(v) => {
            matches!(v.as_str(), "true" | "yes" | "y")
                || parse_number(Some(v.as_str())).is_some_and(|n| n != 0.0)
        }
        None => false,
    }
}

/// Ascending order with missing values last.
pub(crate) fn cmp_opt<T: PartialOrd>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending order with missing values last.
pub(crate) fn cmp_opt_desc<T: PartialOrd>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(x).unwrap_or(Ordering::Equal),
        _ => cmp_opt(a, b),
    }
}
