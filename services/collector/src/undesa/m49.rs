//! M49 → ISO3 translation through the UN reference table (`un_m49_iso.csv`).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Serialize;
use store::csv_io::read_csv_safe_any;
use store::migration::MigrationInOut;
use store::schema::{normalize_iso3, parse_int, pick_column};
use store::Table;
use tracing::{debug, warn};

use super::reshape::InOutRow;

const M49_HEADERS: &[&str] = &["M49 code", "M49", "UN M49", "m49", "code"];
const ISO3_HEADERS: &[&str] = &[
    "ISO-alpha3 code",
    "ISO 3166-1 alpha-3 code",
    "alpha-3",
    "iso3",
    "Alpha-3 code",
];

#[derive(Debug, Clone, Default)]
pub struct M49Map {
    codes: HashMap<i64, String>,
}

/// An area of the M49 table with no ISO3 code (regions, aggregates, or a gap
/// in the reference table).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Unmapped {
    pub m49: i64,
    pub country: Option<String>,
}

impl M49Map {
    /// `None` when the file is missing, empty, or has no recognisable
    /// M49/ISO3 column pair.
    pub fn load(path: &Path) -> Option<Self> {
        let table = read_csv_safe_any(path);
        if table.is_empty() {
            return None;
        }
        let map = Self::from_table(&table);
        if map.is_none() {
            warn!(path = %path.display(), headers = ?table.headers(), "no M49/ISO3 columns in reference table");
        }
        map
    }

    pub fn from_table(table: &Table) -> Option<Self> {
        let m49_col = pick_column(table.headers(), M49_HEADERS)?;
        let iso3_col = pick_column(table.headers(), ISO3_HEADERS)?;

        let mut codes = HashMap::new();
        for r in table.rows() {
            let Some(m49) = parse_int(r.at(m49_col)) else {
                continue;
            };
            let Some(iso3) = r.at(iso3_col).map(normalize_iso3).filter(|s| !s.is_empty()) else {
                continue;
            };
            codes.entry(m49).or_insert(iso3);
        }
        debug!(codes = codes.len(), "loaded M49 reference table");
        (!codes.is_empty()).then_some(Self { codes })
    }

    pub fn get(&self, m49: i64) -> Option<&str> {
        self.codes.get(&m49).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Translate rows to ISO3, sorted by (iso3, year). Rows without a code
    /// are dropped and reported once per (m49, name).
    pub fn apply(&self, rows: &[InOutRow]) -> (Vec<MigrationInOut>, Vec<Unmapped>) {
        let mut mapped = Vec::new();
        let mut unmapped = BTreeSet::new();
        for row in rows {
            match self.get(row.m49) {
                Some(iso3) => mapped.push(MigrationInOut {
                    iso3: iso3.to_string(),
                    year: row.year,
                    immigrants: row.immigrants,
                    emigrants: row.emigrants,
                }),
                None => {
                    unmapped.insert(Unmapped {
                        m49: row.m49,
                        country: row.country.clone(),
                    });
                }
            }
        }
        mapped.sort_by(|a, b| a.iso3.cmp(&b.iso3).then(a.year.cmp(&b.year)));
        (mapped, unmapped.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use store::csv_io::parse_csv_bytes;
    use tempfile::TempDir;

    fn row(m49: i64, country: &str, year: i32, imm: f64) -> InOutRow {
        InOutRow {
            m49,
            country: Some(country.to_string()),
            year,
            immigrants: Some(imm),
            emigrants: None,
        }
    }

    #[test]
    fn test_headers_matched_loosely() {
        let table = parse_csv_bytes(
            "Global Name;M49 Code ;ISO-alpha3 Code\nWorld;001;\nPortugal;620; prt \nPortugal;620;XXX\n".as_bytes(),
        )
        .unwrap();
        let map = M49Map::from_table(&table).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(620), Some("PRT"));
        assert_eq!(map.get(1), None);
    }

    #[test]
    fn test_alphanumeric_header_fallback() {
        let table = parse_csv_bytes(b"country,un_m49,ISO 3166-1 Alpha-3 Code\nFrance,250,FRA\n").unwrap();
        assert_eq!(M49Map::from_table(&table).unwrap().get(250), Some("FRA"));
    }

    #[test]
    fn test_apply_excludes_and_reports_unmapped() {
        let map = M49Map::from_table(
            &parse_csv_bytes(b"m49,iso3\n250,FRA\n620,PRT\n").unwrap(),
        )
        .unwrap();
        let rows = vec![
            row(620, "Portugal", 2000, 3.0),
            row(250, "France", 2000, 2.0),
            row(250, "France", 1990, 1.0),
            row(900, "World", 1990, 9.0),
            row(900, "World", 2000, 9.0),
            row(5500, "Central Asia", 1990, 4.0),
        ];
        let (mapped, unmapped) = map.apply(&rows);
        let keys: Vec<(&str, i32)> = mapped.iter().map(|m| (m.iso3.as_str(), m.year)).collect();
        assert_eq!(keys, vec![("FRA", 1990), ("FRA", 2000), ("PRT", 2000)]);
        assert_eq!(mapped[0].immigrants, Some(1.0));
        assert_eq!(
            unmapped,
            vec![
                Unmapped { m49: 900, country: Some("World".to_string()) },
                Unmapped { m49: 5500, country: Some("Central Asia".to_string()) },
            ]
        );
    }

    #[test]
    fn test_load_missing_or_unrecognised() {
        let dir = TempDir::new().unwrap();
        assert!(M49Map::load(&dir.path().join("un_m49_iso.csv")).is_none());

        let path = dir.path().join("odd.csv");
        fs::write(&path, "name,value\nx,1\n").unwrap();
        assert!(M49Map::load(&path).is_none());
    }
}
