//! Cities per country (`cities_all.csv`).

use std::collections::HashSet;

use serde::Serialize;

use crate::csv_io::FilteredQuery;
use crate::offline::OfflineStore;
use crate::schema::{cmp_opt, field, normalize_iso3, parse_flag, parse_number, parse_year, FieldAliases};
use crate::table::RowRef;

const CITY_COLUMNS: &[&str] = &[
    "iso3",
    "country",
    "city",
    "city_qid",
    "admin",
    "is_capital",
    "population",
    "year",
    "lat",
    "lon",
];

const CITY_SCHEMA: &[FieldAliases] = &[
    field("city", &["city_name", "cidade", "name"]),
    field("city_qid", &["qid"]),
    field("admin", &["admin_region", "region"]),
    field("is_capital", &["is_cap", "capital"]),
    field("population", &["pop", "populacao"]),
    field("year", &["yr", "ano"]),
    field("lat", &["latitude"]),
    field("lon", &["longitude", "lng"]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRecord {
    pub iso3: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub city_qid: Option<String>,
    pub admin: Option<String>,
    pub is_capital: bool,
    pub population: Option<f64>,
    pub year: Option<i32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl CityRecord {
    fn from_row(r: &RowRef<'_>) -> Self {
        Self {
            iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
            country: r.text("country"),
            city: r.text("city"),
            city_qid: r.text("city_qid"),
            admin: r.text("admin"),
            is_capital: parse_flag(r.get("is_capital")),
            population: parse_number(r.get("population")),
            year: parse_year(r.get("year")),
            lat: parse_number(r.get("lat")),
            lon: parse_number(r.get("lon")),
        }
    }

    /// Identity used for de-duplication: the QID, else the name.
    fn key(&self) -> Option<&str> {
        self.city_qid.as_deref().or(self.city.as_deref())
    }
}

impl OfflineStore {
    pub fn load_cities_all(&self) -> Vec<CityRecord> {
        self.load(&self.paths().cities(), CITY_SCHEMA, CITY_COLUMNS)
            .rows()
            .map(|r| CityRecord::from_row(&r))
            .collect()
    }

    /// One row per (city, year), the first one seen in the file, sorted by
    /// year then city name with missing values last.
    pub fn cities_for_iso3(&self, iso3: &str) -> Vec<CityRecord> {
        let query = FilteredQuery::new(CITY_COLUMNS).with_schema(CITY_SCHEMA);
        let table = self.load_filtered(&self.paths().cities(), iso3, &query);

        let mut seen: HashSet<(String, Option<i32>)> = HashSet::new();
        let mut out: Vec<CityRecord> = table
            .rows()
            .map(|r| CityRecord::from_row(&r))
            .filter(|c| match c.key() {
                Some(k) => seen.insert((k.to_string(), c.year)),
                None => true,
            })
            .collect();
        out.sort_by(|a, b| cmp_opt(&a.year, &b.year).then_with(|| cmp_opt(&a.city, &b.city)));
        out
    }

    pub fn country_has_cities(&self, iso3: &str) -> bool {
        !self.cities_for_iso3(iso3).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DataPaths;
    use std::fs;
    use tempfile::TempDir;

    fn setup(body: &str) -> (TempDir, OfflineStore) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cities_all.csv"), body).unwrap();
        let store = OfflineStore::new(DataPaths::new(dir.path()));
        (dir, store)
    }

    const CITIES: &str = "iso3,country,city,city_qid,admin,is_capital,population,year,lat,lon\n\
        PRT,Portugal,Porto,Q1,Norte,0,230000,2021,41.15,-8.61\n\
        PRT,Portugal,Lisboa,Q2,Lisboa,1,545000,2021,38.72,-9.14\n\
        PRT,Portugal,Lisboa,Q2,Lisboa,1,999999,2021,38.72,-9.14\n\
        ESP,Espanha,Madrid,Q3,Madrid,1,3300000,2021,40.4,-3.7\n\
        prt,Portugal,Braga,Q4,Norte,0,193000,,41.5,-8.4\n\
        PRT,Portugal,Aveiro,Q5,Centro,0,80000,2011,40.6,-8.6\n";

    #[test]
    fn test_cities_for_iso3_dedupes_and_sorts() {
        let (_dir, store) = setup(CITIES);
        let cities = store.cities_for_iso3("prt");
        let names: Vec<_> = cities.iter().map(|c| c.city.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["Aveiro", "Lisboa", "Porto", "Braga"]);

        let lisboa = &cities[1];
        assert!(lisboa.is_capital);
        assert_eq!(lisboa.population, Some(545_000.0));
        assert_eq!(lisboa.iso3, "PRT");
        assert_eq!(cities[3].year, None);
    }

    #[test]
    fn test_country_has_cities() {
        let (_dir, store) = setup(CITIES);
        assert!(store.country_has_cities("ESP"));
        assert!(!store.country_has_cities("FRA"));
    }

    #[test]
    fn test_load_cities_all_keeps_every_row() {
        let (_dir, store) = setup(CITIES);
        let all = store.load_cities_all();
        assert_eq!(all.len(), 6);
        assert_eq!(all[4].iso3, "PRT");
    }

    #[test]
    fn test_semicolon_file_with_aliases() {
        let (_dir, store) = setup("iso3;name;qid;capital;pop;ano\nFRA;Paris;Q90;1;2100000;2020\n");
        let cities = store.cities_for_iso3("FRA");
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].city.as_deref(), Some("Paris"));
        assert_eq!(cities[0].city_qid.as_deref(), Some("Q90"));
        assert!(cities[0].is_capital);
        assert_eq!(cities[0].year, Some(2020));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::new(DataPaths::new(dir.path()));
        assert!(store.cities_for_iso3("PRT").is_empty());
        assert!(store.load_cities_all().is_empty());
    }
}
