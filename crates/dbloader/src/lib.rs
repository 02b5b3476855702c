//! Additive schema reconciliation and bulk loading for Postgres.
//!
//! This crate provides:
//! - A registry of desired tables ([`DesiredSchema`])
//! - A snapshot of the live database catalog ([`LiveCatalog`])
//! - A reconciler that creates missing tables and adds missing columns
//! - A loader that appends delimited files to existing tables
//!
//! # Reconciliation
//!
//! Reconciliation is strictly additive: tables and columns that exist in the
//! database but not in the registry are never touched. Columns are compared by
//! name only, so a live column with a different type still counts as present.
//!
//! ```ignore
//! let tx = client.transaction().await?;
//! let live = tx.reflect().await?;
//! let report = dbloader::reconcile(&DesiredSchema::builtin(), &live, &tx.traced()).await?;
//! tx.commit().await?;
//! ```
//!
//! The caller owns the transaction. Every statement of a run shares it, so a
//! single failure leaves the database exactly as it was once rolled back.
//!
//! # Loading
//!
//! ```ignore
//! let batch = RowBatch::from_path("data/sample.csv", b',')?;
//! let report = Loader::new(&live).load(&tx.traced(), "sample_table1", &batch).await?;
//! ```

pub mod catalog;
pub mod conn;
mod error;
pub mod load;
pub mod reconcile;
pub mod schema;
mod sql;

pub use catalog::{CatalogReader, LiveCatalog, LiveColumn, LiveTable};
pub use conn::{Connection, ConnectionExt, Traced};
pub use error::{BoxError, Error};
pub use load::{LoadReport, Loader, RowBatch};
pub use reconcile::{ReconcilePlan, ReconcileReport, TableOutcome, TablePlan, reconcile};
pub use schema::{ColumnDef, DesiredSchema, LogicalType, TableDef};
pub use sql::{Ident, quote_ident};

/// Result type for dbloader operations.
pub type Result<T> = std::result::Result<T, Error>;
