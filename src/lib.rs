// Sales Dashboard - Core Library
// CSV upload pipeline, sales store, and the dashboard's filter and view models

pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod record;
pub mod store;
pub mod view;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig};
pub use dashboard::DashboardStore;
pub use error::{IngestError, NetworkFailure, PersistenceFailure};
pub use filter::{categories_of, filter_records, FilterSelection};
pub use ingest::{ingest_batch, ingest_upload, SalesRows, TempUpload};
pub use record::{RawSalesRow, SalesRecord};
pub use store::{setup_schema, SalesStore};
pub use view::{render, Bar, Chart, DashboardView, Metric, SummaryCard};

#[cfg(feature = "server")]
pub use error::AppError;
#[cfg(feature = "server")]
pub use server::{router, AppState, UploadResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
