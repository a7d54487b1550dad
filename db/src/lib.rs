//! Storage-facing half of the flight log store.
//!
//! This crate defines the [`Adapter`] contract a storage engine implements
//! and the [`Store`] facade built on it:
//!
//! - schema creation in dependency order ([`Store::create_schema`]);
//! - batched imports of raw string rows with an [`ImportReport`] and a
//!   progress callback ([`Store::import`]);
//! - unique lookups and entity persistence through a [`Layout`];
//! - single-query join selects ([`Store::select_join`]);
//! - duplicate removal with foreign-key retargeting ([`Store::replace`]),
//!   made atomic by the caller through [`Store::atomically`].
//!
//! Configuration lives in [`StoreConfig`]; schemas can be kept in JSON or
//! YAML files through [`schema_file`].
//!
//! # Quick start
//!
//! ```ignore
//! use flightbook_core::flightlog;
//! use flightbook_db::{Store, StoreConfig};
//!
//! // `adapter` is any `Adapter` implementation
//! let mut store = Store::open(adapter, StoreConfig::new("flightlog.db"), Some(flightlog::schema()))?;
//! store.create_schema(false)?;
//! let report = store.atomically(|s| s.replace("people", "\"last_name\" = ?", &params, 1))?;
//! ```

mod adapter;
mod config;
mod error;
mod layout;
pub mod schema_file;
mod store;

pub use adapter::Adapter;
pub use config::{ImportPolicy, StoreConfig};
pub use error::{DatabaseError, Result};
pub use layout::Layout;
pub use store::{ImportReport, ReplaceReport, Store};
