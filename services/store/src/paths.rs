//! Locations of the canonical CSV files inside the data directory.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DataPaths {
    data_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `DATA_DIR`, defaulting to `./data`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn countries_seed(&self) -> PathBuf {
        self.file("countries_seed.csv")
    }

    pub fn countries_profiles(&self) -> PathBuf {
        self.file("countries_profiles.csv")
    }

    pub fn worldbank_timeseries(&self) -> PathBuf {
        self.file("wb_timeseries.csv")
    }

    pub fn cities(&self) -> PathBuf {
        self.file("cities_all.csv")
    }

    pub fn unesco(&self) -> PathBuf {
        self.file("unesco_all.csv")
    }

    pub fn leaders_current(&self) -> PathBuf {
        self.file("leaders_current.csv")
    }

    pub fn leaders_history(&self) -> PathBuf {
        self.file("leaders_history.csv")
    }

    pub fn religion(&self) -> PathBuf {
        self.file("religion.csv")
    }

    pub fn olympics_summer(&self) -> PathBuf {
        self.file("olympics_summer_manual.csv")
    }

    pub fn tourism_timeseries(&self) -> PathBuf {
        self.file("tourism_timeseries.csv")
    }

    pub fn tourism_latest(&self) -> PathBuf {
        self.file("tourism_latest.csv")
    }

    pub fn tourism_origin_eu(&self) -> PathBuf {
        self.file("tourism_origin_eu.csv")
    }

    pub fn tourism_purpose_eu(&self) -> PathBuf {
        self.file("tourism_purpose_eu.csv")
    }

    pub fn migration_inout(&self) -> PathBuf {
        self.file("migration_inout.csv")
    }

    pub fn migration_inout_m49(&self) -> PathBuf {
        self.file("migration_inout_m49.csv")
    }

    pub fn migration_timeseries(&self) -> PathBuf {
        self.file("migration_timeseries.csv")
    }

    pub fn migration_latest(&self) -> PathBuf {
        self.file("migration_latest.csv")
    }

    /// UN official M49 → ISO3 reference table.
    pub fn un_m49_map(&self) -> PathBuf {
        self.file("un_m49_iso.csv")
    }

    /// Optional local copy of the UN DESA workbook.
    pub fn migration_source_cache(&self) -> PathBuf {
        self.file("migration_inout_source.xlsx")
    }
}
