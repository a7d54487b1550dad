//! The store facade: schema creation, imports, lookups and `replace`.
//!
//! [`Store`] owns an [`Adapter`], the [`Schema`] it works against and the
//! [`StoreConfig`]. It never opens a transaction on its own; wrap
//! multi-statement work such as [`Store::replace`] in
//! [`Store::atomically`] when it has to be all-or-nothing.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use flightbook_core::{
    ColumnInfo, Depth, Entity, JoinPlan, Property, Row, RowShape, Schema, SchemaError, Value,
    quote_ident,
};
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::config::{ImportPolicy, StoreConfig};
use crate::error::Result;
use crate::layout::Layout;
use crate::schema_file;

/// Outcome of [`Store::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows read from the source.
    pub attempted: usize,
    /// Rows the adapter wrote.
    pub inserted: usize,
    /// Rows not written: ignored duplicates and rows of dropped batches.
    pub skipped: usize,
    /// Batches dropped under [`ImportPolicy::SkipBatch`].
    pub failed_batches: usize,
    /// The progress callback stopped the import early.
    pub stopped: bool,
}

/// Outcome of [`Store::replace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Duplicate rows matched, the canonical row excluded.
    pub matched: usize,
    /// Referencing rows retargeted to the canonical row.
    pub rewritten: usize,
    /// Duplicate rows deleted.
    pub deleted: usize,
}

impl ReplaceReport {
    /// Whether the run wrote anything.
    pub fn is_noop(&self) -> bool {
        self.rewritten == 0 && self.deleted == 0
    }
}

/// Schema-aware access to one adapter connection.
#[derive(Debug)]
pub struct Store<A: Adapter> {
    adapter: A,
    schema: Schema,
    config: StoreConfig,
}

impl<A: Adapter> Store<A> {
    /// Connects `adapter` to `config.database`.
    ///
    /// The schema is taken from `schema`, else from the configured schema
    /// file, else by introspecting the connected database.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, unreadable schema files and
    /// connection errors.
    pub fn open(mut adapter: A, config: StoreConfig, schema: Option<Schema>) -> Result<Self> {
        config.validate()?;
        let schema = match schema {
            Some(schema) => Some(schema),
            None => config.schema.as_ref().map(schema_file::load).transpose()?,
        };
        adapter.connect(&config.database, schema.as_ref())?;
        let schema = match schema {
            Some(schema) => schema,
            None => introspect(&adapter)?,
        };
        debug!(database = %config.database, tables = schema.len(), "store opened");
        Ok(Self {
            adapter,
            schema,
            config,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Disconnects and returns the adapter.
    pub fn close(mut self) -> Result<A> {
        self.adapter.disconnect()?;
        Ok(self.adapter)
    }

    /// Creates every table in dependency order, then its secondary
    /// indices. Returns the table names in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::SchemaCycle`] before touching the database if
    /// the tables cannot be ordered.
    pub fn create_schema(&mut self, force: bool) -> Result<Vec<String>> {
        let Self {
            adapter, schema, ..
        } = self;
        let ordered = schema.sorted_tables()?;
        let mut created = Vec::with_capacity(ordered.len());
        for table in ordered {
            adapter.create_table(table, force)?;
            for index in table.indices().into_iter().filter(|i| !i.is_primary()) {
                adapter.create_index(table.name(), index)?;
            }
            debug!(table = %table.name(), "created table");
            created.push(table.name().to_string());
        }
        info!(tables = created.len(), "schema created");
        Ok(created)
    }

    /// Imports raw string rows into `table`.
    ///
    /// `header` names the target column of each raw field. Rows are parsed
    /// through the columns' parsers and inserted in batches of
    /// `batch_size`; `progress` runs after every batch and may stop the
    /// import with [`ControlFlow::Break`]. A batch holding an unconvertible
    /// value fails the import or is dropped, per the configured
    /// [`ImportPolicy`]. Adapter errors always fail the import.
    ///
    /// # Errors
    ///
    /// Unknown tables or header columns, conversion errors under
    /// [`ImportPolicy::Abort`], and any adapter error.
    pub fn import<I, P>(
        &mut self,
        table: &str,
        header: &[&str],
        rows: I,
        force: bool,
        mut progress: P,
    ) -> Result<ImportReport>
    where
        I: IntoIterator<Item = Vec<String>>,
        P: FnMut(&ImportReport) -> ControlFlow<()>,
    {
        let Self {
            adapter,
            schema,
            config,
        } = self;
        let info = schema.table(table)?;
        let columns = header
            .iter()
            .map(|name| info.require_column(name))
            .collect::<flightbook_core::Result<Vec<_>>>()?;
        let shape = Arc::new(RowShape::new(header.iter().map(|h| h.to_string()).collect()));

        let mut report = ImportReport::default();
        let mut rows = rows.into_iter();
        let mut batch: Vec<Vec<String>> = Vec::with_capacity(config.batch_size);
        loop {
            batch.clear();
            batch.extend(rows.by_ref().take(config.batch_size));
            if batch.is_empty() {
                break;
            }
            report.attempted += batch.len();

            match convert_batch(&columns, &shape, &batch) {
                Ok(converted) => {
                    let written = adapter.insert(table, &converted, force)?;
                    report.inserted += written;
                    report.skipped += batch.len().saturating_sub(written);
                    debug!(table, rows = batch.len(), written, "imported batch");
                }
                Err(err) => match config.import_policy {
                    ImportPolicy::Abort => return Err(err.into()),
                    ImportPolicy::SkipBatch => {
                        warn!(table, rows = batch.len(), error = %err, "skipped batch");
                        report.failed_batches += 1;
                        report.skipped += batch.len();
                    }
                },
            }

            if progress(&report).is_break() {
                report.stopped = true;
                break;
            }
        }

        info!(
            table,
            attempted = report.attempted,
            inserted = report.inserted,
            skipped = report.skipped,
            failed_batches = report.failed_batches,
            stopped = report.stopped,
            "import finished"
        );
        Ok(report)
    }

    /// Selects rows of `table`, coerced to the columns' native types.
    pub fn select(
        &self,
        table: &str,
        filter: Option<&str>,
        order: Option<&str>,
        params: &[Value],
    ) -> Result<Vec<Row>> {
        let info = self.schema.table(table)?;
        let rows = self.adapter.select(info, filter, order, params)?;
        let columns: Vec<&ColumnInfo> = info.columns().iter().collect();
        Ok(coerce_rows(&columns, info.row_shape(), rows)?)
    }

    /// The single row of `table` matching `filter`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::NotFound`] on zero rows,
    /// [`SchemaError::AmbiguousLookup`] on more than one.
    pub fn find_one(&self, table: &str, filter: &str, params: &[Value]) -> Result<Row> {
        let mut rows = self.select(table, Some(filter), None, params)?;
        match rows.len() {
            0 => Err(SchemaError::NotFound(format!("{table} where {filter}")).into()),
            1 => Ok(rows.remove(0)),
            count => Err(SchemaError::AmbiguousLookup {
                what: format!("{table} where {filter}"),
                count,
            }
            .into()),
        }
    }

    /// The stored entity with the same natural key as `entity`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::IncompleteRecord`] if the natural key is incomplete,
    /// plus the errors of [`find_one`](Self::find_one).
    pub fn lookup(&self, entity: &Entity) -> Result<Entity> {
        let key = entity.natural_key()?;
        let filter = self.eq_filter(entity.kind().natural_key);
        let row = self.find_one(entity.table(), &filter, &key)?;
        let layout = Layout::for_table(entity.kind(), self.schema.table(entity.table())?);
        Ok(layout.to_entity(&row))
    }

    /// Back-fills the surrogate id of `entity` from storage.
    pub fn resolve_id(&self, entity: &mut Entity) -> Result<i64> {
        if let Some(id) = entity.id() {
            return Ok(id);
        }
        let stored = self.lookup(entity)?;
        let id = stored
            .id()
            .ok_or_else(|| SchemaError::NotFound(format!("id of a {} row", entity.table())))?;
        entity.set_id(id);
        Ok(id)
    }

    /// Inserts `entity` and its properties; with `force` a conflicting row
    /// is replaced, otherwise the stored row is kept. Returns the id the
    /// entity ends up with, which is also set on it.
    ///
    /// The id comes from the natural key when it is complete, else from the
    /// row the insert just wrote.
    ///
    /// # Errors
    ///
    /// [`SchemaError::IncompleteRecord`] when the entity has neither an id
    /// nor a complete natural key and the adapter wrote no row for it,
    /// since nothing then identifies the stored record.
    pub fn save(&mut self, entity: &mut Entity, force: bool) -> Result<i64> {
        let info = self.schema.table(entity.table())?;
        let row = Layout::for_table(entity.kind(), info).to_row(entity);
        let written = self.adapter.insert(entity.table(), &[row], force)?;

        let id = match (entity.id(), entity.natural_key()) {
            (Some(id), _) => id,
            (None, Ok(_)) => self.resolve_id(entity)?,
            (None, Err(err)) if written == 0 => {
                warn!(table = %entity.table(), "insert ignored and no natural key to resolve");
                return Err(err.into());
            }
            (None, Err(_)) => {
                let id = self.adapter.last_insert_id()?.ok_or_else(|| {
                    SchemaError::NotFound(format!("id of the new {} row", entity.table()))
                })?;
                entity.set_id(id);
                id
            }
        };
        debug!(table = %entity.table(), id, written, "saved entity");

        self.save_properties(entity)?;
        Ok(id)
    }

    /// Rewrites the stored properties of `entity` to match its buckets.
    /// Returns the number of property rows written.
    ///
    /// # Errors
    ///
    /// [`SchemaError::IncompleteRecord`] if the entity has no id yet.
    pub fn save_properties(&mut self, entity: &Entity) -> Result<usize> {
        let Some(storage) = entity.kind().property_table else {
            return Ok(0);
        };
        let owner = entity.id().ok_or_else(|| SchemaError::IncompleteRecord {
            table: entity.table().to_string(),
            missing: "id".into(),
        })?;

        let owner_filter = self.eq_filter(&[storage.owner_column]);
        self.adapter
            .delete(storage.table, Some(owner_filter.as_str()), &[Value::Integer(owner)])?;

        let shape = Arc::new(RowShape::new(
            [storage.owner_column, "kind", "value", "valid_from", "valid_until"]
                .map(String::from)
                .to_vec(),
        ));
        let rows: Vec<Row> = entity
            .property_buckets()
            .flat_map(|(_, bucket)| bucket)
            .map(|p| {
                Row::new(
                    Arc::clone(&shape),
                    vec![
                        Value::Integer(owner),
                        Value::from(p.kind.as_str()),
                        p.value.clone(),
                        bound(p.valid_from, chrono::NaiveDateTime::MIN),
                        bound(p.valid_until, chrono::NaiveDateTime::MAX),
                    ],
                )
            })
            .collect();
        if rows.is_empty() {
            return Ok(0);
        }
        let written = self.adapter.insert(storage.table, &rows, false)?;
        debug!(table = storage.table, owner, written, "saved properties");
        Ok(written)
    }

    /// Replaces the property buckets of `entity` with the stored ones.
    /// Returns the number of properties loaded.
    ///
    /// # Errors
    ///
    /// [`SchemaError::IncompleteRecord`] if the entity has no id, and
    /// [`SchemaError::UnknownPropertyKind`] for stored kinds the entity
    /// kind does not declare.
    pub fn load_properties(&self, entity: &mut Entity) -> Result<usize> {
        let Some(storage) = entity.kind().property_table else {
            return Ok(0);
        };
        let owner = entity.id().ok_or_else(|| SchemaError::IncompleteRecord {
            table: entity.table().to_string(),
            missing: "id".into(),
        })?;

        let filter = self.eq_filter(&[storage.owner_column]);
        let rows = self.select(
            storage.table,
            Some(filter.as_str()),
            Some(quote_ident("id").as_str()),
            &[Value::Integer(owner)],
        )?;
        for kind in entity.kind().property_kinds {
            Property::discard_from(entity, kind, None);
        }
        let loaded = rows.len();
        for row in rows {
            let kind = row
                .get("kind")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::TypeConversion {
                    column: "kind".into(),
                    value: row.get("kind").map(Value::to_string).unwrap_or_default(),
                    expected: "text".into(),
                })?
                .to_string();
            let mut property = Property::new(kind, row.get("value").cloned().unwrap_or_default())
                .with_validity(
                    row.get("valid_from").and_then(Value::as_datetime),
                    row.get("valid_until").and_then(Value::as_datetime),
                );
            property.id = row.get("id").and_then(Value::as_i64);
            property.add_to(entity)?;
        }
        Ok(loaded)
    }

    /// Materializes `root` with the rows its foreign keys reach, one query,
    /// fields named by dotted paths. `depth` defaults to the configured
    /// join depth.
    pub fn select_join(&self, root: &str, depth: Option<Depth>) -> Result<Vec<Row>> {
        let plan = JoinPlan::build(&self.schema, root, depth.unwrap_or(self.config.depth()))?;
        let sql = plan.select_sql();
        debug!(root, joins = plan.joins().len(), "join select");

        let tables: HashMap<&str, &str> = std::iter::once((plan.root(), plan.root()))
            .chain(plan.joins().iter().map(|j| (j.alias.as_str(), j.table.as_str())))
            .collect();
        let columns = plan
            .fields()
            .iter()
            .map(|f| {
                let table = tables.get(f.alias.as_str()).copied().unwrap_or(plan.root());
                self.schema.table(table)?.require_column(&f.column)
            })
            .collect::<flightbook_core::Result<Vec<_>>>()?;

        let rows = self.adapter.query(&sql, &[], plan.shape())?;
        Ok(coerce_rows(&columns, plan.shape(), rows)?)
    }

    /// Retargets every reference to the rows of `table` matching `filter`
    /// onto the row with id `by`, then deletes those rows.
    ///
    /// The canonical row itself is never touched, so a second run over the
    /// same filter matches nothing and writes nothing. The statements are
    /// not wrapped in a transaction; use [`atomically`](Self::atomically).
    ///
    /// # Errors
    ///
    /// [`SchemaError::NotFound`] if no row has id `by` or the table has no
    /// id column; adapter errors such as integrity violations are returned
    /// as they are, leaving earlier statements applied.
    pub fn replace(
        &mut self,
        table: &str,
        filter: &str,
        params: &[Value],
        by: i64,
    ) -> Result<ReplaceReport> {
        let info = self.schema.table(table)?;
        let id_column = info
            .id_column()
            .ok_or_else(|| SchemaError::NotFound(format!("id column of {table}")))?
            .name()
            .to_string();
        let id_filter = self.eq_filter(&[id_column.as_str()]);

        let canonical = self.find_one(table, &id_filter, &[Value::Integer(by)])?;
        let dependencies = self.schema.dependencies(table)?;
        let duplicates: Vec<Row> = self
            .adapter
            .select(info, Some(filter), None, params)?
            .into_iter()
            .filter(|row| row.get(&id_column).and_then(Value::as_i64) != Some(by))
            .collect();

        let mut report = ReplaceReport {
            matched: duplicates.len(),
            ..ReplaceReport::default()
        };

        for row in &duplicates {
            for dep in &dependencies {
                let Some(old) = row.get(&dep.column).filter(|v| !v.is_null()) else {
                    continue;
                };
                let new = canonical.get(&dep.column).cloned().unwrap_or_default();
                let column = dep.foreign_column.as_str();
                let assignment = self.eq_clause(column, &format!("new_{column}"));
                let filter = self.eq_clause(column, &format!("old_{column}"));
                let rewritten = self.adapter.update(
                    &dep.table,
                    &assignment,
                    Some(filter.as_str()),
                    &[new, old.clone()],
                )?;
                if rewritten > 0 {
                    debug!(
                        table = %dep.table,
                        column = %dep.foreign_column,
                        rows = rewritten,
                        "retargeted references"
                    );
                }
                report.rewritten += rewritten;
            }
        }

        for row in &duplicates {
            if let Some(id) = row.get(&id_column).filter(|v| !v.is_null()) {
                report.deleted += self
                    .adapter
                    .delete(table, Some(id_filter.as_str()), std::slice::from_ref(id))?;
            }
        }

        info!(
            table,
            by,
            matched = report.matched,
            rewritten = report.rewritten,
            deleted = report.deleted,
            "replace finished"
        );
        Ok(report)
    }

    /// Runs `f` between `begin` and `commit`, rolling back if it fails.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.adapter.begin()?;
        match f(self) {
            Ok(value) => {
                self.adapter.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.adapter.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub fn count(&self, table: &str, filter: Option<&str>, params: &[Value]) -> Result<u64> {
        self.schema.table(table)?;
        self.adapter.count(table, filter, params)
    }

    pub fn max_id(&self, table: &str) -> Result<Option<i64>> {
        self.adapter.max_id(self.schema.table(table)?)
    }

    /// `"a" = ? AND "b" = ?` in the adapter's placeholder style.
    fn eq_filter(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| self.eq_clause(c, c))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// `"column" = <marker for param>`.
    fn eq_clause(&self, column: &str, param: &str) -> String {
        format!(
            "{} = {}",
            quote_ident(column),
            self.adapter.placeholder().render(param)
        )
    }
}

fn introspect<A: Adapter>(adapter: &A) -> Result<Schema> {
    adapter
        .list_tables()?
        .iter()
        .map(|name| adapter.get_table_info(name))
        .collect()
}

fn convert_batch(
    columns: &[&ColumnInfo],
    shape: &Arc<RowShape>,
    batch: &[Vec<String>],
) -> flightbook_core::Result<Vec<Row>> {
    batch
        .iter()
        .map(|raw| {
            let values = columns
                .iter()
                .enumerate()
                .map(|(i, column)| column.parse(raw.get(i).map_or("", String::as_str)))
                .collect::<flightbook_core::Result<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(shape), values))
        })
        .collect()
}

fn coerce_rows(
    columns: &[&ColumnInfo],
    shape: Arc<RowShape>,
    rows: Vec<Row>,
) -> flightbook_core::Result<Vec<Row>> {
    rows.into_iter()
        .map(|row| {
            let values = columns
                .iter()
                .zip(row.into_values())
                .map(|(column, value)| column.coerce(value))
                .collect::<flightbook_core::Result<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&shape), values))
        })
        .collect()
}

/// Open validity bounds are stored as null.
fn bound(at: chrono::NaiveDateTime, open: chrono::NaiveDateTime) -> Value {
    if at == open {
        Value::Null
    } else {
        Value::DateTime(at)
    }
}
