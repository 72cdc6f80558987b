//! World Bank population series (`wb_timeseries.csv`).

use serde::Serialize;

use crate::offline::OfflineStore;
use crate::schema::{cmp_opt, field, normalize_iso3, parse_number, parse_year, FieldAliases};

/// Column order of `wb_timeseries.csv`, shared with the collector that writes it.
pub const WB_COLUMNS: &[&str] = &["iso3", "year", "pop_total", "pop_density", "urban_pct"];

const WB_SCHEMA: &[FieldAliases] = &[
    field("year", &["date", "ano"]),
    field("pop_total", &["population", "sp_pop_totl"]),
    field("pop_density", &["density", "en_pop_dnst"]),
    field("urban_pct", &["urban", "sp_urb_totl_in_zs"]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldBankPoint {
    pub iso3: String,
    pub year: Option<i32>,
    pub pop_total: Option<f64>,
    pub pop_density: Option<f64>,
    pub urban_pct: Option<f64>,
}

impl OfflineStore {
    pub fn load_worldbank_timeseries(&self) -> Vec<WorldBankPoint> {
        self.load(&self.paths().worldbank_timeseries(), WB_SCHEMA, WB_COLUMNS)
            .rows()
            .map(|r| WorldBankPoint {
                iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
                year: parse_year(r.get("year")),
                pop_total: parse_number(r.get("pop_total")),
                pop_density: parse_number(r.get("pop_density")),
                urban_pct: parse_number(r.get("urban_pct")),
            })
            .collect()
    }

    /// Rows for one country with a year, sorted by year.
    pub fn wb_series_for_country(&self, iso3: &str) -> Vec<WorldBankPoint> {
        let iso3 = normalize_iso3(iso3);
        let mut rows: Vec<WorldBankPoint> = self
            .load_worldbank_timeseries()
            .into_iter()
            .filter(|p| p.iso3 == iso3 && p.year.is_some())
            .collect();
        rows.sort_by(|a, b| cmp_opt(&a.year, &b.year));
        rows
    }
}
