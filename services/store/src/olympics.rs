//! Summer Olympics medal table (`olympics_summer_manual.csv`, hand-maintained).
//!
//! Headers may be Portuguese or English and the country may be keyed by ISO3
//! or by NOC code; NOC codes are translated through a fixed table.

use serde::Serialize;

use crate::offline::OfflineStore;
use crate::schema::{is_iso3, parse_year, pick_column};
use crate::table::{RowRef, Table};

const CODE_HEADERS: &[&str] = &["iso3", "noc", "coi", "codigo", "codigo coi"];
const COUNTRY_HEADERS: &[&str] = &["pais", "país", "country"];
const GOLD_HEADERS: &[&str] = &["ouro", "gold"];
const SILVER_HEADERS: &[&str] = &["prata", "silver"];
const BRONZE_HEADERS: &[&str] = &["bronze"];
const TOTAL_HEADERS: &[&str] = &["total", "totais", "medalhas"];
const YEAR_HEADERS: &[&str] = &["ano", "year"];
const CITY_HEADERS: &[&str] = &["cidade", "city"];
const HOST_HEADERS: &[&str] = &["pais anfitriao", "país anfitrião", "host", "host country"];

/// NOC codes that differ from the ISO 3166-1 alpha-3 code.
const NOC_TO_ISO3: &[(&str, &str)] = &[
    ("ALG", "DZA"),
    ("BAN", "BGD"),
    ("BUL", "BGR"),
    ("CHI", "CHL"),
    ("CRO", "HRV"),
    ("DEN", "DNK"),
    ("FIJ", "FJI"),
    ("GER", "DEU"),
    ("GRE", "GRC"),
    ("GUA", "GTM"),
    ("HAI", "HTI"),
    ("INA", "IDN"),
    ("IRI", "IRN"),
    ("KOS", "XKX"),
    ("KSA", "SAU"),
    ("LAT", "LVA"),
    ("MAS", "MYS"),
    ("MGL", "MNG"),
    ("NED", "NLD"),
    ("NGR", "NGA"),
    ("PAR", "PRY"),
    ("PHI", "PHL"),
    ("POR", "PRT"),
    ("PUR", "PRI"),
    ("RSA", "ZAF"),
    ("SLO", "SVN"),
    ("SRI", "LKA"),
    ("SUD", "SDN"),
    ("SUI", "CHE"),
    ("TAN", "TZA"),
    ("TGA", "TON"),
    ("TPE", "TWN"),
    ("UAE", "ARE"),
    ("URU", "URY"),
    ("VIE", "VNM"),
    ("ZAM", "ZMB"),
    ("ZIM", "ZWE"),
];

/// Translate a NOC or ISO3 code; `None` when it is neither.
pub fn noc_to_iso3(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    if let Some((_, iso3)) = NOC_TO_ISO3.iter().find(|(noc, _)| *noc == code) {
        return Some(iso3.to_string());
    }
    is_iso3(&code).then_some(code)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlympicMedals {
    pub iso3: String,
    pub country: Option<String>,
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
    pub total: i64,
    pub year: Option<i32>,
    pub city: Option<String>,
    pub host_country: Option<String>,
}

/// Medal count: digits (and a sign) only, anything else counts as zero.
fn medal_count(s: Option<&str>) -> i64 {
    let digits: String = s
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().unwrap_or(0)
}

struct MedalColumns {
    code: Option<usize>,
    country: Option<usize>,
    gold: Option<usize>,
    silver: Option<usize>,
    bronze: Option<usize>,
    total: Option<usize>,
    year: Option<usize>,
    city: Option<usize>,
    host: Option<usize>,
}

impl MedalColumns {
    fn resolve(table: &Table) -> Self {
        let h = table.headers();
        Self {
            code: pick_column(h, CODE_HEADERS),
            country: pick_column(h, COUNTRY_HEADERS),
            gold: pick_column(h, GOLD_HEADERS),
            silver: pick_column(h, SILVER_HEADERS),
            bronze: pick_column(h, BRONZE_HEADERS),
            total: pick_column(h, TOTAL_HEADERS),
            year: pick_column(h, YEAR_HEADERS),
            city: pick_column(h, CITY_HEADERS),
            host: pick_column(h, HOST_HEADERS),
        }
    }

    fn read(&self, r: &RowRef<'_>) -> Option<OlympicMedals> {
        let cell = |idx: Option<usize>| idx.and_then(|i| r.at(i));
        let text = |idx: Option<usize>| cell(idx).map(|s| s.trim().to_string());

        let iso3 = noc_to_iso3(cell(self.code)?)?;
        let gold = medal_count(cell(self.gold));
        let silver = medal_count(cell(self.silver));
        let bronze = medal_count(cell(self.bronze));
        let total = match self.total {
            Some(_) => medal_count(cell(self.total)),
            None => gold + silver + bronze,
        };
        Some(OlympicMedals {
            iso3,
            country: text(self.country),
            gold,
            silver,
            bronze,
            total,
            year: parse_year(cell(self.year)),
            city: text(self.city),
            host_country: text(self.host),
        })
    }
}

impl OfflineStore {
    /// Rows with a usable country code, in file order.
    pub fn load_olympics_summer(&self) -> Vec<OlympicMedals> {
        let table = self.load(&self.paths().olympics_summer(), &[], &[]);
        let columns = MedalColumns::resolve(&table);
        table.rows().filter_map(|r| columns.read(&r)).collect()
    }
}
