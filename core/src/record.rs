//! Record identity: natural keys, surrogate ids and the merge rules built
//! on them.
//!
//! An [`Entity`] is a loosely typed record of some [`EntityKind`]. Its
//! [`Identity`] is the natural key when every key component is present,
//! the storage-assigned id otherwise. Equality and hashing go through the
//! identity only, so records loaded from different sources collapse into
//! one entry of a `HashSet` as long as their natural keys agree.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashSet;
//! use flightbook_core::{flightlog, Entity, Identity};
//!
//! let imported = Entity::new(&flightlog::PERSON)
//!     .with("last_name", "Reitsch")
//!     .with("first_name", "Hanna")
//!     .with("count", 0);
//! let mut stored = imported.clone();
//! stored.set_id(17);
//!
//! assert_eq!(imported, stored);
//! assert!(matches!(stored.identity(), Identity::NaturalKey(_)));
//! let set: HashSet<Entity> = [imported, stored].into_iter().collect();
//! assert_eq!(set.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::error::{Result, SchemaError};
use crate::property::Property;
use crate::value::Value;

/// Where the properties of an entity kind are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyTable {
    /// Table holding one row per property.
    pub table: &'static str,
    /// Column referencing the owning entity's id.
    pub owner_column: &'static str,
}

/// Static description of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKind {
    /// Table the records live in.
    pub table: &'static str,
    /// Attribute names forming the natural key, in key order.
    pub natural_key: &'static [&'static str],
    /// Property kinds records of this kind may carry.
    pub property_kinds: &'static [&'static str],
    /// Storage of the properties, if the kind has any.
    pub property_table: Option<PropertyTable>,
}

impl EntityKind {
    pub fn declares_property(&self, kind: &str) -> bool {
        self.property_kinds.contains(&kind)
    }
}

/// Identity of a record, as a tagged choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Every natural-key component is present.
    NaturalKey(Vec<Value>),
    /// Natural key incomplete; storage id known.
    SurrogateId(i64),
    /// Neither a complete natural key nor an id.
    Incomplete,
}

/// A record of some [`EntityKind`].
#[derive(Debug, Clone)]
pub struct Entity {
    kind: &'static EntityKind,
    id: Option<i64>,
    values: BTreeMap<String, Value>,
    properties: BTreeMap<String, Vec<Property>>,
}

impl Entity {
    pub fn new(kind: &'static EntityKind) -> Self {
        Self {
            kind,
            id: None,
            values: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// Value of an attribute; unset attributes read as null.
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn kind(&self) -> &'static EntityKind {
        self.kind
    }

    pub fn table(&self) -> &'static str {
        self.kind.table
    }

    /// Surrogate id, once storage has assigned one.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
        for bucket in self.properties.values_mut() {
            for property in bucket {
                property.set_owner(id);
            }
        }
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Natural key when complete, else the surrogate id, else incomplete.
    pub fn identity(&self) -> Identity {
        match self.natural_key() {
            Ok(key) => Identity::NaturalKey(key),
            Err(_) => self.id.map_or(Identity::Incomplete, Identity::SurrogateId),
        }
    }

    /// The natural-key values.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::IncompleteRecord`] naming the first missing
    /// component.
    pub fn natural_key(&self) -> Result<Vec<Value>> {
        self.kind
            .natural_key
            .iter()
            .map(|field| {
                let value = self.get(field);
                if value.is_present() {
                    Ok(value.clone())
                } else {
                    Err(SchemaError::IncompleteRecord {
                        table: self.kind.table.to_string(),
                        missing: (*field).to_string(),
                    })
                }
            })
            .collect()
    }

    /// Whether two distinct records claim the same slot.
    ///
    /// Records conflict when their natural keys differ but they agree on
    /// every attribute in `fields` (say two missions of one pilot at the
    /// same departure time). The same record never conflicts with itself.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::IncompleteRecord`] if either natural key is
    /// incomplete.
    pub fn conflicts_with(&self, other: &Entity, fields: &[&str]) -> Result<bool> {
        let mine = self.natural_key()?;
        let theirs = other.natural_key()?;
        if self.kind.table != other.kind.table || mine == theirs {
            return Ok(false);
        }
        Ok(fields.iter().all(|field| {
            let value = self.get(field);
            value.is_present() && value == other.get(field)
        }))
    }

    /// Properties of one kind, in insertion order.
    pub fn properties(&self, kind: &str) -> &[Property] {
        self.properties.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All property buckets.
    pub fn property_buckets(&self) -> impl Iterator<Item = (&str, &[Property])> {
        self.properties
            .iter()
            .map(|(kind, bucket)| (kind.as_str(), bucket.as_slice()))
    }

    pub(crate) fn bucket_mut(&mut self, kind: &str) -> &mut Vec<Property> {
        self.properties.entry(kind.to_string()).or_default()
    }

    pub(crate) fn existing_bucket_mut(&mut self, kind: &str) -> Option<&mut Vec<Property>> {
        self.properties.get_mut(kind)
    }

    pub(crate) fn clear_bucket(&mut self, kind: &str) -> usize {
        self.properties.remove(kind).map_or(0, |bucket| bucket.len())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if self.kind.table != other.kind.table {
            return false;
        }
        match (self.identity(), other.identity()) {
            (Identity::Incomplete, Identity::Incomplete) => self.values == other.values,
            (mine, theirs) => mine == theirs,
        }
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.table.hash(state);
        let identity = self.identity();
        identity.hash(state);
        if identity == Identity::Incomplete {
            self.values.hash(state);
        }
    }
}
