//! SQLite backend for flightbook stores.
//!
//! This crate implements the [`Adapter`](flightbook_db::Adapter) contract
//! on top of `rusqlite`, generates DDL from table metadata, and rebuilds
//! table metadata from the SQLite catalog.
//!
//! # Architecture
//!
//! - **`adapter`**: [`SqliteAdapter`] and [`create_store`]
//! - **`schema`**: SQL generation for tables, indices and whole schemas
//! - **`migration`**: Lifecycle operations (up/down/refresh/status)
//! - **`convert`**: Value conversion between the store and SQLite
//!
//! # Quick start
//!
//! ```no_run
//! use flightbook_core::flightlog;
//! use flightbook_db::StoreConfig;
//! use flightbook_sqlite::create_store;
//!
//! let mut store = create_store(StoreConfig::new("flights.db"), flightlog::schema()).unwrap();
//! println!("{} people", store.count("people", None, &[]).unwrap());
//! ```
//!
//! Dates and datetimes are stored as text in the canonical formats of
//! [`flightbook_core::DATE_FORMAT`] and [`flightbook_core::DATETIME_FORMAT`].

mod adapter;
mod convert;
mod error;
mod migration;
mod schema;

pub use adapter::{IN_MEMORY, SqliteAdapter, create_store};
pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus};
pub use schema::{create_index_sql, create_table_sql, generate_drop_sql, generate_schema_sql};
