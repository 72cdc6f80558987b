//! Migration datasets.
//!
//! - `migration_inout.csv`: UN DESA immigrant/emigrant stock per (iso3, year)
//! - `migration_inout_m49.csv`: the same keyed by M49, used when a country
//!   has no ISO3 row (its M49 code did not map)
//! - `migration_timeseries.csv` / `migration_latest.csv`: WDI indicators

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::csv_io::FilteredQuery;
use crate::offline::OfflineStore;
use crate::schema::{cmp_opt, field, name_key, normalize_iso3, parse_number, parse_year, FieldAliases};
use crate::table::RowRef;

const INOUT_COLUMNS: &[&str] = &["iso3", "year", "immigrants", "emigrants"];

const INOUT_SCHEMA: &[FieldAliases] = &[
    field("iso3", &["country", "pais", "code", "codigo"]),
    field("year", &["ano", "time"]),
    field("immigrants", &["imigrantes", "immig"]),
    field("emigrants", &["emigrantes", "emig"]),
];

const M49_COLUMNS: &[&str] = &["m49", "country", "year", "immigrants", "emigrants"];

const M49_SCHEMA: &[FieldAliases] = &[
    field("m49", &["m49_code", "code"]),
    field("country", &["pais", "name"]),
    field("year", &["ano", "time"]),
    field("immigrants", &["imigrantes", "immig"]),
    field("emigrants", &["emigrantes", "emig"]),
];

const INDICATOR_COLUMNS: &[&str] = &["iso3", "indicator", "indicator_name", "year", "value"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationInOut {
    pub iso3: String,
    pub year: i32,
    pub immigrants: Option<f64>,
    pub emigrants: Option<f64>,
}

impl MigrationInOut {
    fn from_row(r: &RowRef<'_>, iso3: Option<&str>) -> Option<Self> {
        let iso3 = match iso3 {
            Some(code) => code.to_string(),
            None => normalize_iso3(r.get("iso3")?),
        };
        Some(Self {
            iso3,
            year: parse_year(r.get("year"))?,
            immigrants: parse_number(r.get("immigrants")),
            emigrants: parse_number(r.get("emigrants")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorView {
    TimeSeries,
    Latest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationIndicator {
    pub iso3: String,
    pub indicator: Option<String>,
    pub indicator_name: Option<String>,
    pub year: Option<i32>,
    pub value: Option<f64>,
}

/// One row per year; a later row in input order replaces an earlier one.
fn keep_last_per_year(rows: impl IntoIterator<Item = MigrationInOut>) -> Vec<MigrationInOut> {
    let mut by_year: BTreeMap<i32, MigrationInOut> = BTreeMap::new();
    for row in rows {
        by_year.insert(row.year, row);
    }
    by_year.into_values().collect()
}

impl OfflineStore {
    /// Every (iso3, year) row with a year, sorted by iso3 then year.
    pub fn load_migration_inout(&self) -> Vec<MigrationInOut> {
        let table = self.load(&self.paths().migration_inout(), INOUT_SCHEMA, INOUT_COLUMNS);
        let mut rows: Vec<MigrationInOut> = table
            .rows()
            .filter_map(|r| MigrationInOut::from_row(&r, None))
            .collect();
        rows.sort_by(|a, b| a.iso3.cmp(&b.iso3).then(a.year.cmp(&b.year)));
        rows
    }

    /// Immigrant/emigrant series for one country, one row per year.
    ///
    /// Falls back to the M49-keyed file, matching its country names against
    /// the seed names for `iso3`.
    pub fn migration_inout_for_iso3(&self, iso3: &str) -> Vec<MigrationInOut> {
        let iso3 = normalize_iso3(iso3);
        let query = FilteredQuery::new(INOUT_COLUMNS).with_schema(INOUT_SCHEMA);
        let table = self.load_filtered(&self.paths().migration_inout(), &iso3, &query);
        let direct = keep_last_per_year(table.rows().filter_map(|r| MigrationInOut::from_row(&r, None)));
        if !direct.is_empty() {
            return direct;
        }
        self.migration_inout_by_name(&iso3)
    }

    fn migration_inout_by_name(&self, iso3: &str) -> Vec<MigrationInOut> {
        let keys: Vec<String> = self
            .seed_names(iso3)
            .iter()
            .map(|n| name_key(n))
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let table = self.load(&self.paths().migration_inout_m49(), M49_SCHEMA, M49_COLUMNS);
        let keyed: Vec<(String, RowRef<'_>)> = table
            .rows()
            .map(|r| (r.get("country").map(name_key).unwrap_or_default(), r))
            .collect();

        let mut matched: Vec<&RowRef<'_>> = keyed
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(_, r)| r)
            .collect();

        // Some UN names carry a prefix/suffix the seed lacks ("..., Republic of").
        if matched.is_empty() {
            for key in &keys {
                let hits: Vec<&RowRef<'_>> = keyed
                    .iter()
                    .filter(|(k, _)| k.starts_with(key.as_str()))
                    .map(|(_, r)| r)
                    .collect();
                if hits.is_empty() {
                    continue;
                }
                let codes: BTreeSet<&str> = hits.iter().copied().filter_map(|r| r.get("m49")).collect();
                if codes.len() == 1 {
                    matched = hits;
                } else {
                    debug!(iso3, key = key.as_str(), areas = codes.len(), "ambiguous name prefix");
                }
                break;
            }
        }

        debug!(iso3, names = ?keys, rows = matched.len(), "migration fallback by country name");
        keep_last_per_year(
            matched
                .into_iter()
                .filter_map(|r| MigrationInOut::from_row(r, Some(iso3))),
        )
    }

    /// WDI migration indicators for one country, sorted by indicator then year.
    pub fn migration_indicators_for_iso3(&self, iso3: &str, view: IndicatorView) -> Vec<MigrationIndicator> {
        let path = match view {
            IndicatorView::TimeSeries => self.paths().migration_timeseries(),
            IndicatorView::Latest => self.paths().migration_latest(),
        };
        let query = FilteredQuery::new(INDICATOR_COLUMNS);
        let mut rows: Vec<MigrationIndicator> = self
            .load_filtered(&path, iso3, &query)
            .rows()
            .map(|r| MigrationIndicator {
                iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
                indicator: r.text("indicator"),
                indicator_name: r.text("indicator_name"),
                year: parse_year(r.get("year")),
                value: parse_number(r.get("value")),
            })
            .collect();
        rows.sort_by(|a, b| cmp_opt(&a.indicator, &b.indicator).then_with(|| cmp_opt(&a.year, &b.year)));
        rows
    }
}
