//! Collector - Fetches public datasets and writes the canonical CSVs
//!
//! Responsibilities:
//! - Fetch resources over HTTP with a courtesy delay and bounded retries (`fetch`)
//! - Locate, download and reshape the UN DESA migrant stock workbook (`undesa`)
//! - Append World Bank population series per country (`worldbank`)
//!
//! Everything written here is read back through the `store` crate.

pub mod config;
pub mod error;
pub mod fetch;
pub mod undesa;
pub mod worldbank;

pub use config::Config;
pub use error::{FetchError, PipelineError};
pub use fetch::{Fetch, HttpFetcher, RetryPolicy};
