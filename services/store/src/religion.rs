//! Religious affiliation shares (`religion.csv`).
//!
//! Columns are flexible: every numeric column besides the identifiers is kept
//! as a share (percent of population, 0-100).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::offline::OfflineStore;
use crate::schema::{field, header_key, normalize_iso3, parse_number, parse_year, FieldAliases};
use crate::table::{RowRef, Table};

const RELIGION_SCHEMA: &[FieldAliases] = &[
    field("iso3", &["iso", "code"]),
    field("country", &["pais", "name"]),
    field("source_year", &["year", "ano"]),
];

/// Share columns that read as 0.0 when blank.
pub const KNOWN_RELIGIONS: &[&str] = &[
    "christian",
    "muslim",
    "unaffiliated",
    "hindu",
    "buddhist",
    "folk_religions",
    "other_religions",
    "jewish",
];

const ID_COLUMNS: &[&str] = &["iso3", "country", "source_year"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReligionShare {
    pub iso3: String,
    pub country: Option<String>,
    pub source_year: Option<i32>,
    pub shares: BTreeMap<String, f64>,
}

impl ReligionShare {
    fn from_row(table: &Table, r: &RowRef<'_>) -> Self {
        let mut shares = BTreeMap::new();
        for (idx, header) in table.headers().iter().enumerate() {
            let key = header_key(header);
            if ID_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            match parse_number(r.at(idx)) {
                Some(v) => {
                    shares.insert(key, v);
                }
                None if KNOWN_RELIGIONS.contains(&key.as_str()) => {
                    shares.insert(key, 0.0);
                }
                None => {}
            }
        }
        Self {
            iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
            country: r.text("country"),
            source_year: parse_year(r.get("source_year")),
            shares,
        }
    }
}

impl OfflineStore {
    pub fn load_religion(&self) -> Vec<ReligionShare> {
        let table = self.load(&self.paths().religion(), RELIGION_SCHEMA, &[]);
        table
            .rows()
            .map(|r| ReligionShare::from_row(&table, &r))
            .collect()
    }

    pub fn religion_for_iso3(&self, iso3: &str) -> Option<ReligionShare> {
        let iso3 = normalize_iso3(iso3);
        self.load_religion().into_iter().find(|r| r.iso3 == iso3)
    }
}
