//! Schema metadata and record identity for the flight log store.
//!
//! This crate holds everything that does not touch a database:
//!
//! - [`ColumnInfo`], [`IndexInfo`] and [`TableInfo`] describe tables, derive
//!   native types and parse raw strings into [`Value`]s.
//! - [`Schema`] is the set of tables; [`sort_tables`] orders them so that
//!   every table comes after the tables it references, and
//!   [`Schema::dependencies`] lists the columns pointing at a table.
//! - [`SchemaIterator`] walks foreign-key paths from a root table down to a
//!   depth budget; [`JoinPlan`] turns the walk into an aliased join select.
//! - [`Entity`] and [`Property`] carry the identity and merge rules: records
//!   compare by natural key, falling back to their storage id.
//! - [`flightlog`] defines the concrete tables and record kinds.
//!
//! # Example
//!
//! ```
//! use flightbook_core::{flightlog, Depth, JoinPlan};
//!
//! let schema = flightlog::schema();
//! let order: Vec<&str> = schema
//!     .sorted_tables()
//!     .unwrap()
//!     .iter()
//!     .map(|t| t.name())
//!     .collect();
//! assert_eq!(order[0], "people");
//!
//! let plan = JoinPlan::build(&schema, "missions", Depth::Limited(1)).unwrap();
//! assert!(plan.fields().iter().any(|f| f.alias == "pilot.people"));
//! ```

mod column;
mod descriptor;
mod error;
pub mod flightlog;
mod index;
mod placeholder;
mod property;
mod record;
mod row;
mod schema;
mod table;
mod traverse;
mod value;

pub use column::{ColumnInfo, Reference};
pub use descriptor::{ColumnDescriptor, IndexDescriptor, SchemaDescriptor, TableDescriptor};
pub use error::{Result, SchemaError};
pub use index::{IndexBuilder, IndexColumn, IndexInfo, SortOrder};
pub use placeholder::Placeholder;
pub use property::Property;
pub use record::{Entity, EntityKind, Identity, PropertyTable};
pub use row::{Row, RowShape};
pub use schema::{Dependency, Schema, sort_tables};
pub use table::TableInfo;
pub use traverse::{
    Depth, Frame, JoinLeaf, JoinPlan, JoinPredicate, PlanField, PlanJoin, SchemaIterator,
    quote_ident,
};
pub use value::{DATE_FORMAT, DATETIME_FORMAT, NativeType, Value};
