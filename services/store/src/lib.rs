//! Offline Store - Read-side access to the CSV datasets produced by the collector
//!
//! Responsibilities:
//! - Read CSVs of unknown encoding/separator without failing (`csv_io`)
//! - Stream large CSVs and keep only one country's rows (`csv_io::read_csv_filtered`)
//! - Absorb column-name drift through declarative alias tables (`schema`)
//! - Memoize reads per file signature in a bounded cache (`cache`)
//! - Expose typed per-entity queries on [`OfflineStore`]
//!
//! Accessors never fail: a missing or unreadable file reads as an empty table
//! and the problem is logged.

pub mod cache;
pub mod csv_io;
pub mod error;
pub mod paths;
pub mod schema;
pub mod table;

mod offline;

pub mod cities;
pub mod countries;
pub mod leaders;
pub mod migration;
pub mod olympics;
pub mod religion;
pub mod tourism;
pub mod unesco;
pub mod worldbank;

pub use cache::{CacheKey, CacheStats, FrameCache};
pub use csv_io::{
    append_csv, file_signature, format_number, read_csv_filtered, read_csv_safe, read_csv_safe_any, write_csv,
    FileSignature, FilteredQuery,
};
pub use error::{Error, Result};
pub use offline::OfflineStore;
pub use paths::DataPaths;
pub use table::{RowRef, Table};
