//! UNESCO World Heritage sites (`unesco_all.csv`).

use serde::Serialize;

use crate::csv_io::FilteredQuery;
use crate::offline::OfflineStore;
use crate::schema::{cmp_opt, field, normalize_iso3, parse_number, parse_year, FieldAliases};
use crate::table::RowRef;

const UNESCO_COLUMNS: &[&str] = &["iso3", "country", "site", "site_qid", "category", "year", "lat", "lon"];

const UNESCO_SCHEMA: &[FieldAliases] = &[
    field("site", &["site_name", "name"]),
    field("site_qid", &["qid"]),
    field("category", &["type", "kind"]),
    field("year", &["ano", "inscribed"]),
    field("lat", &["latitude"]),
    field("lon", &["longitude", "lng"]),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnescoSite {
    pub iso3: String,
    pub country: Option<String>,
    pub site: Option<String>,
    pub site_qid: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl UnescoSite {
    fn from_row(r: &RowRef<'_>) -> Self {
        Self {
            iso3: r.get("iso3").map(normalize_iso3).unwrap_or_default(),
            country: r.text("country"),
            site: r.text("site"),
            site_qid: r.text("site_qid"),
            category: r.text("category"),
            year: parse_year(r.get("year")),
            lat: parse_number(r.get("lat")),
            lon: parse_number(r.get("lon")),
        }
    }
}

impl OfflineStore {
    pub fn load_unesco_all(&self) -> Vec<UnescoSite> {
        self.load(&self.paths().unesco(), UNESCO_SCHEMA, UNESCO_COLUMNS)
            .rows()
            .map(|r| UnescoSite::from_row(&r))
            .collect()
    }

    pub fn unesco_for_iso3(&self, iso3: &str) -> Vec<UnescoSite> {
        let query = FilteredQuery::new(UNESCO_COLUMNS).with_schema(UNESCO_SCHEMA);
        let mut sites: Vec<UnescoSite> = self
            .load_filtered(&self.paths().unesco(), iso3, &query)
            .rows()
            .map(|r| UnescoSite::from_row(&r))
            .collect();
        sites.sort_by(|a, b| cmp_opt(&a.year, &b.year).then_with(|| cmp_opt(&a.site, &b.site)));
        sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DataPaths;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unesco_for_iso3_sorted_by_year_then_site() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("unesco_all.csv"),
            "iso3,country,site,site_qid,type,year,lat,lon\n\
             PRT,Portugal,Sintra,Q1,cultural,1995,38.8,-9.4\n\
             PRT,Portugal,Évora,Q2,cultural,1986,38.57,-7.9\n\
             ESP,Espanha,Alhambra,Q3,cultural,1984,37.17,-3.59\n\
             PRT,Portugal,Angra,Q4,cultural,1983,38.65,-27.2\n\
             PRT,Portugal,Batalha,Q5,cultural,1983,39.66,-8.82\n",
        )
        .unwrap();
        let store = OfflineStore::new(DataPaths::new(dir.path()));

        let sites = store.unesco_for_iso3("PRT");
        let names: Vec<_> = sites.iter().map(|s| s.site.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["Angra", "Batalha", "Évora", "Sintra"]);
        assert_eq!(sites[0].category.as_deref(), Some("cultural"));
        assert_eq!(store.load_unesco_all().len(), 5);
    }

    #[test]
    fn test_unknown_country_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::new(DataPaths::new(dir.path()));
        assert!(store.unesco_for_iso3("PRT").is_empty());
    }
}
