//! Country listing and profiles.
//!
//! `countries_profiles.csv` is the master list when present; otherwise the
//! seed file (`countries_seed.csv`) stands in.

use serde::Serialize;

use crate::offline::OfflineStore;
use crate::schema::{field, normalize_iso3, parse_number, parse_year, FieldAliases};

const PROFILE_COLUMNS: &[&str] = &[
    "qid",
    "name",
    "capital",
    "capital_qid",
    "inception",
    "area_km2",
    "head_of_government",
    "hog_party",
    "population",
    "population_year",
    "iso2",
    "iso3",
];

const PROFILE_SCHEMA: &[FieldAliases] = &[
    field("name", &["name_pt", "nome", "country"]),
    field("area_km2", &["area", "area_km"]),
    field("population", &["pop", "populacao"]),
    field("population_year", &["pop_year"]),
    field("iso3", &["iso_3", "iso3_code"]),
];

const SEED_COLUMNS: &[&str] = &["iso2", "iso3", "name_en", "name_pt", "name", "slug"];

const SEED_SCHEMA: &[FieldAliases] = &[field("iso3", &["iso_3", "iso3_code"])];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountrySummary {
    pub name: String,
    pub iso3: String,
    pub qid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProfile {
    pub iso3: Option<String>,
    pub iso2: Option<String>,
    pub name: Option<String>,
    pub qid: Option<String>,
    pub capital: Option<String>,
    pub capital_qid: Option<String>,
    pub inception: Option<String>,
    pub area_km2: Option<f64>,
    pub population: Option<f64>,
    pub population_year: Option<i32>,
    pub head_of_government: Option<String>,
    pub hog_party: Option<String>,
}

impl OfflineStore {
    pub fn have_master_profiles(&self) -> bool {
        self.paths().countries_profiles().exists()
    }

    pub fn load_profiles_master(&self) -> Vec<CountryProfile> {
        let table = self.load(&self.paths().countries_profiles(), PROFILE_SCHEMA, PROFILE_COLUMNS);
        table
            .rows()
            .map(|r| CountryProfile {
                iso3: r.text("iso3").map(|s| normalize_iso3(&s)),
                iso2: r.text("iso2").map(|s| s.to_uppercase()),
                name: r.text("name"),
                qid: r.text("qid"),
                capital: r.text("capital"),
                capital_qid: r.text("capital_qid"),
                inception: r.text("inception"),
                area_km2: parse_number(r.get("area_km2")),
                population: parse_number(r.get("population")),
                population_year: parse_year(r.get("population_year")),
                head_of_government: r.text("head_of_government"),
                hog_party: r.text("hog_party"),
            })
            .collect()
    }

    /// Countries with a name and an ISO3, one per ISO3 (first wins), sorted by name.
    pub fn list_available_countries(&self) -> Vec<CountrySummary> {
        let candidates: Vec<CountrySummary> = if self.have_master_profiles() {
            self.load_profiles_master()
                .into_iter()
                .filter_map(|p| {
                    Some(CountrySummary {
                        name: p.name?,
                        iso3: p.iso3?,
                        qid: p.qid,
                    })
                })
                .collect()
        } else {
            let seed = self.load(&self.paths().countries_seed(), SEED_SCHEMA, SEED_COLUMNS);
            seed.rows()
                .filter_map(|r| {
                    Some(CountrySummary {
                        name: r.text("name_pt").or_else(|| r.text("name_en"))?,
                        iso3: r.text("iso3").map(|s| normalize_iso3(&s))?,
                        qid: None,
                    })
                })
                .collect()
        };

        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<CountrySummary> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.iso3.clone()))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// First profile whose name equals `name` exactly (after trimming).
    pub fn get_profile_by_name(&self, name: &str) -> Option<CountryProfile> {
        let wanted = name.trim();
        self.load_profiles_master()
            .into_iter()
            .find(|p| p.name.as_deref() == Some(wanted))
    }

    /// Seed names for `iso3` in lookup order (pt, en, generic), duplicates removed.
    pub(crate) fn seed_names(&self, iso3: &str) -> Vec<String> {
        let iso3 = normalize_iso3(iso3);
        let seed = self.load(&self.paths().countries_seed(), SEED_SCHEMA, SEED_COLUMNS);
        let Some(row) = seed
            .rows()
            .find(|r| r.get("iso3").map(normalize_iso3).as_deref() == Some(iso3.as_str()))
        else {
            return Vec::new();
        };

        let mut names: Vec<String> = Vec::new();
        for column in ["name_pt", "name_en", "name"] {
            if let Some(name) = row.text(column) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DataPaths;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> OfflineStore {
        OfflineStore::new(DataPaths::new(dir.path()))
    }

    const SEED: &str = "iso2,iso3,name_en,name_pt,slug\n\
        PT,prt,Portugal,Portugal,portugal\n\
        ES,ESP,Spain,Espanha,spain\n\
        DE,DEU,Germany,,germany\n\
        XX,,Nowhere,,nowhere\n\
        ES,ESP,Spain again,Espanha 2,spain\n";

    #[test]
    fn test_seed_fallback_listing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("countries_seed.csv"), SEED).unwrap();
        let store = store(&dir);

        assert!(!store.have_master_profiles());
        let list = store.list_available_countries();
        let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Espanha", "Germany", "Portugal"]);
        assert_eq!(list[2].iso3, "PRT");
        assert!(list.iter().all(|c| c.qid.is_none()));
    }

    #[test]
    fn test_profiles_take_precedence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("countries_seed.csv"), SEED).unwrap();
        fs::write(
            dir.path().join("countries_profiles.csv"),
            "qid;name;capital;area_km2;population;population_year;iso3\n\
             Q45;Portugal;Lisboa;92212;10300000;2021;PRT\n\
             Q29;Espanha;Madrid;505990;47000000;2022;esp\n\
             Q1;;;;;;FRA\n",
        )
        .unwrap();
        let store = store(&dir);

        let list = store.list_available_countries();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].iso3, "ESP");
        assert_eq!(list[0].qid.as_deref(), Some("Q29"));

        let pt = store.get_profile_by_name(" Portugal ").unwrap();
        assert_eq!(pt.capital.as_deref(), Some("Lisboa"));
        assert_eq!(pt.population, Some(10_300_000.0));
        assert_eq!(pt.population_year, Some(2021));
        assert!(store.get_profile_by_name("Atlantis").is_none());
    }

    #[test]
    fn test_profile_aliases() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("countries_profiles.csv"),
            "name_pt,iso3,area\nBrasil,BRA,8515767\n",
        )
        .unwrap();
        let profiles = store(&dir).load_profiles_master();
        assert_eq!(profiles[0].name.as_deref(), Some("Brasil"));
        assert_eq!(profiles[0].area_km2, Some(8_515_767.0));
    }

    #[test]
    fn test_seed_names_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("countries_seed.csv"), SEED).unwrap();
        let store = store(&dir);
        assert_eq!(store.seed_names("esp"), vec!["Espanha", "Spain"]);
        assert_eq!(store.seed_names("PRT"), vec!["Portugal"]);
        assert!(store.seed_names("FRA").is_empty());
    }

    #[test]
    fn test_no_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.list_available_countries().is_empty());
        assert!(store.load_profiles_master().is_empty());
    }
}
