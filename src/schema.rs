//! Key schemas and schema resolution.
//!
//! A [`KeySchema`] names the fields that make a payload routable. A registry
//! knows a closed, discovery-ordered set of them ([`SchemaSet`]); routing a
//! payload first resolves which schema it satisfies, identified by a
//! [`SchemaId`] tag, then splits and matches against that schema.

use std::collections::BTreeSet;

use crate::error::{DispatchError, Result};
use crate::payload::{Payload, Selector};

/// How to pick a schema when a payload satisfies more than one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaResolution {
    /// First schema in discovery order whose keys are all present.
    #[default]
    FirstDiscovered,
    /// Satisfied schema with the most keys; ties go to the earlier one.
    MostSpecific,
}

/// Position of a schema within its [`SchemaSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub usize);

/// Ordered key names. Two schemas are the same if their key-name sets are equal.
#[derive(Debug, Clone, Eq)]
pub struct KeySchema {
    keys: Vec<String>,
}

impl KeySchema {
    /// Create a schema from key names, dropping repeats.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptySchema`] if no key names are given.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            if !ordered.contains(&key) {
                ordered.push(key);
            }
        }

        if ordered.is_empty() {
            return Err(DispatchError::EmptySchema);
        }
        Ok(Self { keys: ordered })
    }

    /// The schema formed by a selector's key names.
    pub fn of_selector(selector: &Selector) -> Self {
        Self {
            keys: selector.key_names().map(str::to_owned).collect(),
        }
    }

    /// Key names in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of key names.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the schema has no key names.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check if every key name is present in `action`.
    pub fn is_satisfied_by(&self, action: &Payload) -> bool {
        self.keys.iter().all(|k| action.contains_key(k))
    }

    fn key_set(&self) -> BTreeSet<&str> {
        self.keys.iter().map(String::as_str).collect()
    }
}

impl PartialEq for KeySchema {
    fn eq(&self, other: &Self) -> bool {
        self.keys.len() == other.keys.len() && self.key_set() == other.key_set()
    }
}

/// Recognized schemas in discovery order, deduplicated by key-name set.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<KeySchema>,
}

impl SchemaSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a schema; returns its id and whether it was newly discovered.
    pub fn insert(&mut self, schema: KeySchema) -> (SchemaId, bool) {
        if let Some(id) = self.position(&schema) {
            return (id, false);
        }
        self.schemas.push(schema);
        (SchemaId(self.schemas.len() - 1), true)
    }

    /// Find a schema with the same key-name set.
    pub fn position(&self, schema: &KeySchema) -> Option<SchemaId> {
        self.schemas.iter().position(|s| s == schema).map(SchemaId)
    }

    /// Get a schema by id.
    pub fn get(&self, id: SchemaId) -> Option<&KeySchema> {
        self.schemas.get(id.0)
    }

    /// Iterate schemas in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &KeySchema> {
        self.schemas.iter()
    }

    /// Number of recognized schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if no schema is recognized.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve which schema `action` satisfies under the given policy.
    pub fn resolve(&self, action: &Payload, resolution: SchemaResolution) -> Option<SchemaId> {
        let mut satisfied = self
            .schemas
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_satisfied_by(action));

        match resolution {
            SchemaResolution::FirstDiscovered => satisfied.next().map(|(i, _)| SchemaId(i)),
            SchemaResolution::MostSpecific => satisfied
                .fold(None, |best: Option<(usize, usize)>, (i, s)| match best {
                    Some((_, len)) if len >= s.len() => best,
                    _ => Some((i, s.len())),
                })
                .map(|(i, _)| SchemaId(i)),
        }
    }
}
