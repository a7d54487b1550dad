//! Time-ranged attributes attached to records.
//!
//! A [`Property`] is valid on the half-open window
//! `[valid_from, valid_until)`. Lookups at an instant must find at most one
//! valid property of a kind; more than one is reported as
//! [`SchemaError::AmbiguousLookup`] instead of picking a winner.

use chrono::NaiveDateTime;

use crate::error::{Result, SchemaError};
use crate::record::Entity;
use crate::value::Value;

/// A kind-named value attached to a record for a validity window.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use flightbook_core::{flightlog, Entity, Property};
///
/// let mut pilot = Entity::new(&flightlog::PERSON);
/// pilot.set_id(3);
///
/// let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let jul = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// Property::new("licence", "SPL")
///     .with_validity(Some(jan), Some(jul))
///     .add_to(&mut pilot)
///     .unwrap();
///
/// let found = Property::get_from(&pilot, "licence", Some(jan)).unwrap();
/// assert_eq!(found.owner(), Some(3));
/// assert!(Property::get_from(&pilot, "licence", Some(jul)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Storage id of the property row, once persisted.
    pub id: Option<i64>,
    pub kind: String,
    pub value: Value,
    /// Inclusive start.
    pub valid_from: NaiveDateTime,
    /// Exclusive end.
    pub valid_until: NaiveDateTime,
    owner: Option<i64>,
}

impl Property {
    /// A property valid over the whole representable time range.
    pub fn new(kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            value: value.into(),
            valid_from: NaiveDateTime::MIN,
            valid_until: NaiveDateTime::MAX,
            owner: None,
        }
    }

    /// Narrows the validity window; `None` keeps the open end.
    pub fn with_validity(
        mut self,
        from: Option<NaiveDateTime>,
        until: Option<NaiveDateTime>,
    ) -> Self {
        self.valid_from = from.unwrap_or(NaiveDateTime::MIN);
        self.valid_until = until.unwrap_or(NaiveDateTime::MAX);
        self
    }

    /// Id of the owning record.
    pub fn owner(&self) -> Option<i64> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: i64) {
        self.owner = Some(owner);
    }

    pub fn is_valid_at(&self, at: NaiveDateTime) -> bool {
        self.valid_from <= at && at < self.valid_until
    }

    /// Attaches the property to `entity`, taking the entity's id as owner.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownPropertyKind`] if the entity's kind
    /// does not declare this property kind.
    pub fn add_to(mut self, entity: &mut Entity) -> Result<()> {
        if !entity.kind().declares_property(&self.kind) {
            return Err(SchemaError::UnknownPropertyKind {
                table: entity.table().to_string(),
                kind: self.kind,
            });
        }
        self.owner = entity.id();
        let kind = self.kind.clone();
        entity.bucket_mut(&kind).push(self);
        Ok(())
    }

    /// The single property of `kind` valid at `at` (or the single one at
    /// all, when `at` is `None`).
    ///
    /// # Errors
    ///
    /// [`SchemaError::NotFound`] on zero matches,
    /// [`SchemaError::AmbiguousLookup`] on more than one.
    pub fn get_from<'e>(
        entity: &'e Entity,
        kind: &str,
        at: Option<NaiveDateTime>,
    ) -> Result<&'e Property> {
        let matches: Vec<&Property> = entity
            .properties(kind)
            .iter()
            .filter(|p| at.is_none_or(|at| p.is_valid_at(at)))
            .collect();
        let what = || match at {
            Some(at) => format!("property '{kind}' of {} at {at}", entity.table()),
            None => format!("property '{kind}' of {}", entity.table()),
        };
        match matches.as_slice() {
            [] => Err(SchemaError::NotFound(what())),
            [single] => Ok(single),
            many => Err(SchemaError::AmbiguousLookup {
                what: what(),
                count: many.len(),
            }),
        }
    }

    /// Removes the whole `kind` bucket, or only the properties valid at
    /// `at`. Returns how many were removed.
    pub fn discard_from(entity: &mut Entity, kind: &str, at: Option<NaiveDateTime>) -> usize {
        match at {
            None => entity.clear_bucket(kind),
            Some(at) => {
                let Some(bucket) = entity.existing_bucket_mut(kind) else {
                    return 0;
                };
                let before = bucket.len();
                bucket.retain(|p| !p.is_valid_at(at));
                let removed = before - bucket.len();
                if bucket.is_empty() {
                    entity.clear_bucket(kind);
                }
                removed
            }
        }
    }
}
