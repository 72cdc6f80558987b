//! UN DESA International Migrant Stock: origin/destination matrix to yearly
//! immigrant and emigrant stocks per country.
//!
//! Stages: locate, fetch, unwrap container, reshape, map M49 to ISO3, persist.
//! A stage that yields nothing aborts the run before anything is written.

pub mod container;
#[cfg(any(test, feature = "test-util"))]
pub mod fixture;
pub mod locate;
pub mod m49;
pub mod reshape;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::csv_io::parse_csv_bytes;
use store::migration::MigrationInOut;
use store::{format_number, write_csv, DataPaths, Table};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::fetch::Fetch;

pub use container::{unwrap_container, Container};
pub use locate::find_download_url;
pub use m49::{M49Map, Unmapped};
pub use reshape::{read_workbook, reshape_long_csv, reshape_workbook, InOutRow, WORLD_M49};

pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Unmapped areas listed in the log; the report carries all of them.
const UNMAPPED_LOG_SAMPLE: usize = 10;

const M49_COLUMNS: &[&str] = &["m49", "country", "year", "immigrants", "emigrants"];
const ISO3_COLUMNS: &[&str] = &["iso3", "year", "immigrants", "emigrants"];

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Local xlsx/zip/csv to use instead of downloading.
    pub source: Option<PathBuf>,
    /// Ignore the cached workbook.
    pub force: bool,
    /// Keep the downloaded workbook as the cache for later runs.
    pub keep_xlsx: bool,
    pub no_download: bool,
    pub base_url: String,
    pub max_depth: usize,
}

impl MigrationOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            source: None,
            force: false,
            keep_xlsx: false,
            no_download: false,
            base_url: base_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    Cached,
    Downloaded,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: SourceKind,
    pub source_url: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub container: &'static str,
    pub m49_rows: usize,
    /// `None` when no M49 reference table was available.
    pub iso3_rows: Option<usize>,
    pub unmapped: Vec<Unmapped>,
}

struct Obtained {
    container: Container,
    kind: SourceKind,
    url: Option<String>,
    captured_at: DateTime<Utc>,
}

async fn read_file(path: &Path) -> Result<Vec<u8>, PipelineError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::io(path, e))
}

async fn obtain<F: Fetch>(fetcher: &F, paths: &DataPaths, opts: &MigrationOptions) -> Result<Obtained, PipelineError> {
    if let Some(source) = &opts.source {
        if !source.exists() {
            return Err(PipelineError::SourceNotFound(source.clone()));
        }
        info!(path = %source.display(), "using local source");
        return Ok(Obtained {
            container: unwrap_container(read_file(source).await?)?,
            kind: SourceKind::Local,
            url: None,
            captured_at: Utc::now(),
        });
    }

    let cache = paths.migration_source_cache();
    if cache.exists() && !opts.force {
        info!(path = %cache.display(), "using cached workbook");
        return Ok(Obtained {
            container: Container::Workbook(read_file(&cache).await?),
            kind: SourceKind::Cached,
            url: None,
            captured_at: Utc::now(),
        });
    }
    if opts.no_download {
        return Err(PipelineError::DownloadDisabled);
    }

    let url = find_download_url(fetcher, &opts.base_url, opts.max_depth)
        .await
        .ok_or_else(|| PipelineError::NoLinkFound(opts.base_url.clone()))?;
    let blob = fetcher
        .fetch(&url)
        .await
        .map_err(|source| PipelineError::DownloadFailed {
            url: url.clone(),
            source,
        })?;
    let captured_at = Utc::now();
    let container = unwrap_container(blob)?;

    if opts.keep_xlsx {
        match &container {
            Container::Workbook(bytes) => {
                if let Some(dir) = cache.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| PipelineError::io(dir, e))?;
                }
                tokio::fs::write(&cache, bytes)
                    .await
                    .map_err(|e| PipelineError::io(cache.clone(), e))?;
                info!(path = %cache.display(), "kept workbook");
            }
            Container::Csv(_) => debug!("download is csv, nothing to keep"),
        }
    }

    Ok(Obtained {
        container,
        kind: SourceKind::Downloaded,
        url: Some(url),
        captured_at,
    })
}

/// Reshape the payload into one row per (m49, year).
pub fn extract(container: &Container) -> Result<Vec<InOutRow>, PipelineError> {
    let rows = match container {
        Container::Workbook(bytes) => reshape_workbook(&read_workbook(bytes)?)?,
        Container::Csv(bytes) => {
            let table = parse_csv_bytes(bytes)
                .ok_or_else(|| PipelineError::UnreadableContainer("csv could not be decoded".to_string()))?;
            reshape_long_csv(&table)?
        }
    };
    if rows.is_empty() {
        return Err(PipelineError::EmptyExtraction);
    }
    Ok(rows)
}

pub fn m49_table(rows: &[InOutRow]) -> Table {
    let mut table = Table::empty(M49_COLUMNS);
    for r in rows {
        table.push_row([
            Some(r.m49.to_string()),
            r.country.clone(),
            Some(r.year.to_string()),
            format_number(r.immigrants),
            format_number(r.emigrants),
        ]);
    }
    table
}

pub fn iso3_table(rows: &[MigrationInOut]) -> Table {
    let mut table = Table::empty(ISO3_COLUMNS);
    for r in rows {
        table.push_row([
            Some(r.iso3.clone()),
            Some(r.year.to_string()),
            format_number(r.immigrants),
            format_number(r.emigrants),
        ]);
    }
    table
}

pub async fn run<F: Fetch>(fetcher: &F, paths: &DataPaths, opts: &MigrationOptions) -> Result<RunReport, PipelineError> {
    let obtained = obtain(fetcher, paths, opts).await?;
    let container_kind = obtained.container.kind();
    let rows = extract(&obtained.container)?;
    info!(rows = rows.len(), container = container_kind, "extracted migrant stocks");

    let m49_path = paths.migration_inout_m49();
    write_csv(&m49_path, &m49_table(&rows), b';')?;
    info!(path = %m49_path.display(), rows = rows.len(), "wrote M49 table");

    let mut report = RunReport {
        source: obtained.kind,
        source_url: obtained.url,
        captured_at: obtained.captured_at,
        container: container_kind,
        m49_rows: rows.len(),
        iso3_rows: None,
        unmapped: Vec::new(),
    };

    let map_path = paths.un_m49_map();
    let Some(map) = M49Map::load(&map_path) else {
        warn!(path = %map_path.display(), "no M49 reference table, ISO3 table not written");
        return Ok(report);
    };

    let (mapped, unmapped) = map.apply(&rows);
    let iso3_path = paths.migration_inout();
    write_csv(&iso3_path, &iso3_table(&mapped), b';')?;
    info!(path = %iso3_path.display(), rows = mapped.len(), "wrote ISO3 table");

    if !unmapped.is_empty() {
        let sample = &unmapped[..unmapped.len().min(UNMAPPED_LOG_SAMPLE)];
        warn!(count = unmapped.len(), ?sample, "M49 codes without ISO3");
    }
    report.iso3_rows = Some(mapped.len());
    report.unmapped = unmapped;
    Ok(report)
}
