use std::time::Duration;

use store::DataPaths;

/// UN DESA International Migrant Stock landing page.
pub const UNDESA_BASE_URL: &str =
    "https://www.un.org/development/desa/pd/content/international-migrant-stock";

pub const WORLDBANK_API_URL: &str = "https://api.worldbank.org/v2";

const DEFAULT_USER_AGENT: &str = "GeoMigration/1.4";

#[derive(Debug, Clone)]
pub struct Config {
    pub paths: DataPaths,
    pub undesa_base_url: String,
    pub worldbank_api_url: String,
    pub rate_limit_ms: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            paths: DataPaths::from_env(),
            undesa_base_url: std::env::var("UNDESA_BASE_URL")
                .unwrap_or_else(|_| UNDESA_BASE_URL.to_string()),
            worldbank_api_url: std::env::var("WORLDBANK_API_URL")
                .unwrap_or_else(|_| WORLDBANK_API_URL.to_string()),
            rate_limit_ms: std::env::var("RATE_LIMIT_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            user_agent: std::env::var("USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
