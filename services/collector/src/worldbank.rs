//! World Bank population indicators per country, appended to `wb_timeseries.csv`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use store::csv_io::read_csv_safe_any;
use store::schema::{normalize_iso3, parse_year, pick_column};
use store::worldbank::WB_COLUMNS;
use store::{append_csv, format_number, DataPaths, OfflineStore, Table};
use tracing::{debug, info, warn};

use crate::error::{FetchError, PipelineError};
use crate::fetch::Fetch;

/// Output column and World Bank indicator code, in `WB_COLUMNS` order.
pub const INDICATORS: &[(&str, &str)] = &[
    ("pop_total", "SP.POP.TOTL"),
    ("pop_density", "EN.POP.DNST"),
    ("urban_pct", "SP.URB.TOTL.IN.ZS"),
];

const PER_PAGE: u32 = 20_000;

pub fn indicator_url(api_base: &str, iso3: &str, code: &str) -> String {
    format!(
        "{}/country/{}/indicator/{}?format=json&per_page={}",
        api_base.trim_end_matches('/'),
        iso3,
        code,
        PER_PAGE
    )
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

/// Parse a `[meta, observations]` body into year → value.
///
/// Bodies of any other shape (the API answers unknown countries with a
/// one-element message array) carry no data.
pub fn parse_indicator_response(url: &str, body: &[u8]) -> Result<BTreeMap<i32, Option<f64>>, FetchError> {
    let json: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| FetchError::permanent(url, format!("invalid JSON: {}", e)))?;

    let mut out = BTreeMap::new();
    let Some(observations) = json
        .as_array()
        .filter(|parts| parts.len() >= 2)
        .and_then(|parts| parts[1].as_array())
    else {
        return Ok(out);
    };
    for raw in observations {
        let Ok(obs) = serde_json::from_value::<Observation>(raw.clone()) else {
            continue;
        };
        if let Some(year) = parse_year(obs.date.as_deref()) {
            out.insert(year, obs.value);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct WorldBankOptions {
    /// Fetch countries already present in the output file.
    pub force: bool,
    /// Restrict the run to these ISO3 codes.
    pub only: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldBankReport {
    pub countries: usize,
    pub skipped: usize,
    pub rows_written: usize,
    pub failed_indicators: usize,
}

fn seed_codes(paths: &DataPaths) -> Result<Vec<String>, PipelineError> {
    let seed_path = paths.countries_seed();
    if !seed_path.exists() {
        return Err(PipelineError::MissingSeed(seed_path));
    }
    let seed = read_csv_safe_any(&seed_path);
    let iso3_col = pick_column(seed.headers(), &["iso3"])
        .ok_or_else(|| PipelineError::MissingColumn("iso3".to_string()))?;

    let mut seen = HashSet::new();
    Ok(seed
        .rows()
        .filter_map(|r| r.at(iso3_col).map(normalize_iso3))
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .collect())
}

pub async fn run<F: Fetch>(
    fetcher: &F,
    paths: &DataPaths,
    api_base: &str,
    opts: &WorldBankOptions,
) -> Result<WorldBankReport, PipelineError> {
    let mut codes = seed_codes(paths)?;
    if !opts.only.is_empty() {
        let only: HashSet<String> = opts.only.iter().map(|c| normalize_iso3(c)).collect();
        codes.retain(|c| only.contains(c));
    }

    let existing: HashSet<String> = if opts.force {
        HashSet::new()
    } else {
        OfflineStore::new(paths.clone())
            .load_worldbank_timeseries()
            .into_iter()
            .map(|p| p.iso3)
            .collect()
    };

    let out = paths.worldbank_timeseries();
    let mut report = WorldBankReport::default();
    for iso3 in codes {
        if existing.contains(&iso3) {
            debug!(iso3 = %iso3, "already present, skipping");
            report.skipped += 1;
            continue;
        }

        let mut series = Vec::with_capacity(INDICATORS.len());
        for (_, code) in INDICATORS {
            let url = indicator_url(api_base, &iso3, code);
            let parsed = match fetcher.fetch(&url).await {
                Ok(body) => parse_indicator_response(&url, &body),
                Err(e) => Err(e),
            };
            series.push(parsed.unwrap_or_else(|e| {
                warn!(iso3 = %iso3, indicator = code, error = %e, "indicator skipped");
                report.failed_indicators += 1;
                BTreeMap::new()
            }));
        }

        let years: BTreeSet<i32> = series.iter().flat_map(|s| s.keys().copied()).collect();
        let mut table = Table::empty(WB_COLUMNS);
        for year in &years {
            table.push_row(
                [Some(iso3.clone()), Some(year.to_string())]
                    .into_iter()
                    .chain(series.iter().map(|s| format_number(s.get(year).copied().flatten()))),
            );
        }
        append_csv(&out, &table, b',')?;
        info!(iso3 = %iso3, years = years.len(), "appended World Bank series");

        report.countries += 1;
        report.rows_written += table.len();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MapFetcher;
    use std::fs;
    use tempfile::TempDir;

    const API: &str = "https://api.worldbank.org/v2";

    fn body(rows: &str) -> String {
        format!(r#"[{{"page":1,"pages":1,"per_page":20000,"total":2}},[{}]]"#, rows)
    }

    fn obs(date: &str, value: &str) -> String {
        format!(
            r#"{{"indicator":{{"id":"X","value":"X"}},"country":{{"id":"PT","value":"Portugal"}},"countryiso3code":"PRT","date":"{}","value":{},"unit":"","decimal":0}}"#,
            date, value
        )
    }

    #[test]
    fn test_indicator_columns_follow_output_order() {
        let names: Vec<&str> = INDICATORS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, WB_COLUMNS[2..].to_vec());
    }

    #[test]
    fn test_indicator_url() {
        assert_eq!(
            indicator_url("https://api.worldbank.org/v2/", "PRT", "SP.POP.TOTL"),
            "https://api.worldbank.org/v2/country/PRT/indicator/SP.POP.TOTL?format=json&per_page=20000"
        );
    }

    #[test]
    fn test_parse_response() {
        let raw = body(&[obs("2020", "10298252"), obs("2019", "null"), obs("2020Q1", "5")].join(","));
        let parsed = parse_indicator_response("u", raw.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[&2020], Some(10298252.0));
        assert_eq!(parsed[&2019], None);
    }

    #[test]
    fn test_parse_shapes_without_data() {
        let message = br#"[{"message":[{"id":"120","key":"Invalid value","value":"The provided parameter value is not valid"}]}]"#;
        assert!(parse_indicator_response("u", message).unwrap().is_empty());
        assert!(parse_indicator_response("u", br#"[{"page":0},null]"#).unwrap().is_empty());
        assert!(parse_indicator_response("u", b"{}").unwrap().is_empty());

        let err = parse_indicator_response("u", b"<html>").unwrap_err();
        assert!(!err.is_transient());
    }

    fn data_dir(seed: &str) -> (TempDir, DataPaths) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("countries_seed.csv"), seed).unwrap();
        let paths = DataPaths::new(dir.path());
        (dir, paths)
    }

    fn prt_fetcher() -> MapFetcher {
        MapFetcher::default()
            .with(
                &indicator_url(API, "PRT", "SP.POP.TOTL"),
                body(&[obs("2019", "10286263"), obs("2020", "10297081")].join(",")),
            )
            .with(
                &indicator_url(API, "PRT", "SP.URB.TOTL.IN.ZS"),
                body(&[obs("2020", "66.3"), obs("2021", "66.6")].join(",")),
            )
            .failing(&indicator_url(API, "PRT", "EN.POP.DNST"), false)
    }

    #[tokio::test]
    async fn test_appends_union_of_years() {
        let (_dir, paths) = data_dir("name_pt,iso3\nPortugal,prt\nPortugal,PRT\n");
        let report = run(&prt_fetcher(), &paths, API, &WorldBankOptions::default())
            .await
            .unwrap();
        assert_eq!(
            report,
            WorldBankReport {
                countries: 1,
                skipped: 0,
                rows_written: 3,
                failed_indicators: 1,
            }
        );
        let text = fs::read_to_string(paths.worldbank_timeseries()).unwrap();
        assert_eq!(
            text,
            "iso3,year,pop_total,pop_density,urban_pct\n\
             PRT,2019,10286263,,\n\
             PRT,2020,10297081,,66.3\n\
             PRT,2021,,,66.6\n"
        );
    }

    #[tokio::test]
    async fn test_existing_countries_skipped_unless_forced() {
        let (_dir, paths) = data_dir("iso3\nPRT\nESP\n");
        fs::write(
            paths.worldbank_timeseries(),
            "iso3,year,pop_total,pop_density,urban_pct\nESP,2020,47000000,94,80\n",
        )
        .unwrap();

        let fetcher = prt_fetcher();
        let report = run(&fetcher, &paths, API, &WorldBankOptions::default()).await.unwrap();
        assert_eq!(report.countries, 1);
        assert_eq!(report.skipped, 1);
        assert!(!fetcher.requested().iter().any(|u| u.contains("/ESP/")));

        let opts = WorldBankOptions {
            force: true,
            only: vec!["esp".to_string()],
        };
        let fetcher = MapFetcher::default();
        let report = run(&fetcher, &paths, API, &opts).await.unwrap();
        assert_eq!(report.countries, 1);
        assert_eq!(report.failed_indicators, 3);
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_seed_problems_abort() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path());
        let fetcher = MapFetcher::default();
        assert!(matches!(
            run(&fetcher, &paths, API, &WorldBankOptions::default()).await,
            Err(PipelineError::MissingSeed(_))
        ));

        let (_dir, paths) = data_dir("name,code\nPortugal,PRT\n");
        assert!(matches!(
            run(&fetcher, &paths, API, &WorldBankOptions::default()).await,
            Err(PipelineError::MissingColumn(_))
        ));
    }
}
