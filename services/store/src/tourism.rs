//! Tourism: WDI series per ISO3 and Eurostat tables keyed by ISO2 `geo`.

use serde::Serialize;

use crate::offline::OfflineStore;
use crate::schema::{cmp_opt, cmp_opt_desc, field, normalize_iso3, parse_number, parse_year, FieldAliases};
use crate::table::{RowRef, Table};

const SERIES_COLUMNS: &[&str] = &["iso3", "country", "indicator", "indicator_name", "year", "value"];

const SERIES_SCHEMA: &[FieldAliases] = &[
    field("indicator", &["indicator_code", "code"]),
    field("year", &["ano", "time", "date"]),
];

const ORIGIN_COLUMNS: &[&str] = &["geo", "origin", "year", "arrivals", "unit"];

const PURPOSE_COLUMNS: &[&str] = &["geo", "purpose", "destination", "year", "trips", "unit"];

const ORIGIN_SCHEMA: &[FieldAliases] = &[
    field("origin", &["c_resid", "partner"]),
    field("year", &["time", "time_period"]),
    field("arrivals", &["value", "obs_value"]),
];

const PURPOSE_SCHEMA: &[FieldAliases] = &[
    field("destination", &["partner"]),
    field("year", &["time", "time_period"]),
    field("trips", &["value", "obs_value"]),
];

/// EU/EFTA countries as Eurostat codes them (Greece is `EL`).
const ISO3_TO_ISO2_EU: &[(&str, &str)] = &[
    ("AUT", "AT"),
    ("BEL", "BE"),
    ("BGR", "BG"),
    ("HRV", "HR"),
    ("CYP", "CY"),
    ("CZE", "CZ"),
    ("DNK", "DK"),
    ("EST", "EE"),
    ("FIN", "FI"),
    ("FRA", "FR"),
    ("DEU", "DE"),
    ("GRC", "EL"),
    ("HUN", "HU"),
    ("IRL", "IE"),
    ("ITA", "IT"),
    ("LVA", "LV"),
    ("LTU", "LT"),
    ("LUX", "LU"),
    ("MLT", "MT"),
    ("NLD", "NL"),
    ("POL", "PL"),
    ("PRT", "PT"),
    ("ROU", "RO"),
    ("SVK", "SK"),
    ("SVN", "SI"),
    ("ESP", "ES"),
    ("SWE", "SE"),
    ("ISL", "IS"),
    ("LIE", "LI"),
    ("NOR", "NO"),
    ("CHE", "CH"),
];

pub fn iso3_to_iso2_eu(iso3: &str) -> Option<&'static str> {
    let iso3 = normalize_iso3(iso3);
    ISO3_TO_ISO2_EU
        .iter()
        .find(|(code, _)| *code == iso3)
        .map(|(_, iso2)| *iso2)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourismSeries {
    pub iso3: String,
    pub country: Option<String>,
    pub indicator: Option<String>,
    pub indicator_name: Option<String>,
    pub year: Option<i32>,
    pub value: Option<f64>,
}

impl TourismSeries {
    fn from_row(r: &RowRef<'_>) -> Self {
        Self {
            iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
            country: r.text("country"),
            indicator: r.text("indicator"),
            indicator_name: r.text("indicator_name"),
            year: parse_year(r.get("year")),
            value: parse_number(r.get("value")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourismOrigin {
    /// ISO2 code of the residents' country.
    pub origin: Option<String>,
    pub year: Option<i32>,
    pub arrivals: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourismPurpose {
    pub purpose: Option<String>,
    pub destination: Option<String>,
    pub year: Option<i32>,
    pub trips: Option<f64>,
    pub unit: Option<String>,
}

fn upper(r: &RowRef<'_>, column: &str) -> Option<String> {
    r.text(column).map(|s| s.to_uppercase())
}

fn series_for(table: &Table, iso3: &str) -> Vec<TourismSeries> {
    let iso3 = normalize_iso3(iso3);
    let mut rows: Vec<TourismSeries> = table
        .rows()
        .map(|r| TourismSeries::from_row(&r))
        .filter(|s| s.iso3 == iso3)
        .collect();
    rows.sort_by(|a, b| cmp_opt(&a.year, &b.year));
    rows
}

impl OfflineStore {
    pub fn load_tourism_ts(&self) -> Vec<TourismSeries> {
        self.load(&self.paths().tourism_timeseries(), SERIES_SCHEMA, SERIES_COLUMNS)
            .rows()
            .map(|r| TourismSeries::from_row(&r))
            .collect()
    }

    pub fn load_tourism_latest(&self) -> Vec<TourismSeries> {
        self.load(&self.paths().tourism_latest(), SERIES_SCHEMA, SERIES_COLUMNS)
            .rows()
            .map(|r| TourismSeries::from_row(&r))
            .collect()
    }

    pub fn tourism_series_for_iso3(&self, iso3: &str) -> Vec<TourismSeries> {
        let table = self.load(&self.paths().tourism_timeseries(), SERIES_SCHEMA, SERIES_COLUMNS);
        series_for(&table, iso3)
    }

    pub fn tourism_latest_for_iso3(&self, iso3: &str) -> Vec<TourismSeries> {
        let table = self.load(&self.paths().tourism_latest(), SERIES_SCHEMA, SERIES_COLUMNS);
        series_for(&table, iso3)
    }

    /// Arrivals by residents' country, year ascending then arrivals descending.
    /// Countries outside the EU/EFTA table yield nothing.
    pub fn tourism_origin_for_iso3(&self, iso3: &str) -> Vec<TourismOrigin> {
        let Some(iso2) = iso3_to_iso2_eu(iso3) else {
            return Vec::new();
        };
        let table = self.load(&self.paths().tourism_origin_eu(), ORIGIN_SCHEMA, ORIGIN_COLUMNS);
        let mut rows: Vec<TourismOrigin> = table
            .rows()
            .filter(|r| upper(r, "geo").as_deref() == Some(iso2))
            .map(|r| TourismOrigin {
                origin: upper(&r, "origin"),
                year: parse_year(r.get("year")),
                arrivals: parse_number(r.get("arrivals")),
                unit: r.text("unit"),
            })
            .collect();
        rows.sort_by(|a, b| cmp_opt(&a.year, &b.year).then_with(|| cmp_opt_desc(&a.arrivals, &b.arrivals)));
        rows
    }

    /// Trips made by residents, year ascending then trips descending.
    pub fn tourism_purpose_for_iso3(&self, iso3: &str) -> Vec<TourismPurpose> {
        let Some(iso2) = iso3_to_iso2_eu(iso3) else {
            return Vec::new();
        };
        let table = self.load(&self.paths().tourism_purpose_eu(), PURPOSE_SCHEMA, PURPOSE_COLUMNS);
        let mut rows: Vec<TourismPurpose> = table
            .rows()
            .filter(|r| upper(r, "geo").as_deref() == Some(iso2))
            .map(|r| TourismPurpose {
                purpose: upper(&r, "purpose"),
                destination: upper(&r, "destination"),
                year: parse_year(r.get("year")),
                trips: parse_number(r.get("trips")),
                unit: r.text("unit"),
            })
            .collect();
        rows.sort_by(|a, b| cmp_opt(&a.year, &b.year).then_with(|| cmp_opt_desc(&a.trips, &b.trips)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DataPaths;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, OfflineStore) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let store = OfflineStore::new(DataPaths::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_iso2_table() {
        assert_eq!(iso3_to_iso2_eu("grc"), Some("EL"));
        assert_eq!(iso3_to_iso2_eu("CHE"), Some("CH"));
        assert_eq!(iso3_to_iso2_eu("USA"), None);
    }

    #[test]
    fn test_series_sorted_by_year() {
        let (_dir, store) = store_with(&[(
            "tourism_timeseries.csv",
            "iso3;country;indicator;indicator_name;year;value\n\
             PRT;Portugal;ST.INT.ARVL;Arrivals;2019;24600000\n\
             PRT;Portugal;ST.INT.ARVL;Arrivals;2010;13500000\n\
             ESP;Espanha;ST.INT.ARVL;Arrivals;2019;83500000\n",
        )]);
        let rows = store.tourism_series_for_iso3("prt");
        assert_eq!(rows.iter().map(|r| r.year.unwrap()).collect::<Vec<_>>(), vec![2010, 2019]);
        assert_eq!(store.load_tourism_ts().len(), 3);
        assert!(store.tourism_latest_for_iso3("PRT").is_empty());
    }

    #[test]
    fn test_origin_sort_and_greece_code() {
        let (_dir, store) = store_with(&[(
            "tourism_origin_eu.csv",
            "geo;origin;year;arrivals;unit\n\
             el;DE;2019;3000;NR\n\
             EL;UK;2019;4000;NR\n\
             EL;FR;2018;1000;NR\n\
             PT;ES;2019;9000;NR\n",
        )]);
        let rows = store.tourism_origin_for_iso3("GRC");
        let origins: Vec<_> = rows.iter().map(|r| r.origin.as_deref().unwrap()).collect();
        assert_eq!(origins, vec!["FR", "UK", "DE"]);
        assert!(store.tourism_origin_for_iso3("USA").is_empty());
    }

    #[test]
    fn test_purpose_sort() {
        let (_dir, store) = store_with(&[(
            "tourism_purpose_eu.csv",
            "geo;purpose;destination;year;trips;unit\n\
             PT;pers;dom;2019;100;NR\n\
             PT;prof;dom;2019;300;NR\n\
             PT;total;out;2018;50;NR\n",
        )]);
        let rows = store.tourism_purpose_for_iso3("PRT");
        let purposes: Vec<_> = rows.iter().map(|r| r.purpose.as_deref().unwrap()).collect();
        assert_eq!(purposes, vec!["TOTAL", "PROF", "PERS"]);
        assert_eq!(rows[0].destination.as_deref(), Some("OUT"));
    }
}
