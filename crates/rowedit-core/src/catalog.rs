//! Value catalog
//!
//! Read-only list of selectable values (`{id, label, description}`) used by
//! the presentation layer to render options. The controller treats catalog
//! ids as opaque and never checks staged values against the catalog.

use crate::error::CatalogError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// One selectable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry<V> {
    /// Value identifier
    pub id: V,
    /// Display label
    pub label: String,
    /// Longer description
    #[serde(default)]
    pub description: String,
}

impl<V> CatalogEntry<V> {
    /// Create entry
    #[inline]
    pub fn new(id: V, label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Ordered catalog with lookup by id
#[derive(Debug, Clone)]
pub struct ValueCatalog<V: Eq + Hash> {
    entries: IndexMap<V, CatalogEntry<V>>,
}

impl<V> ValueCatalog<V>
where
    V: Eq + Hash + Clone + fmt::Display,
{
    /// Build a catalog, keeping source order
    ///
    /// # Errors
    /// - `CatalogError::DuplicateId` if an id appears twice
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry<V>>) -> Result<Self, CatalogError> {
        let mut map = IndexMap::new();
        for entry in entries {
            if map.contains_key(&entry.id) {
                return Err(CatalogError::DuplicateId(entry.id.to_string()));
            }
            map.insert(entry.id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Look up an entry
    #[inline]
    #[must_use]
    pub fn get(&self, id: &V) -> Option<&CatalogEntry<V>> {
        self.entries.get(id)
    }

    /// Check if id is listed
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &V) -> bool {
        self.entries.contains_key(id)
    }

    /// Label for an id, falling back to the id itself
    #[must_use]
    pub fn label_for(&self, id: &V) -> String {
        self.get(id)
            .map_or_else(|| id.to_string(), |entry| entry.label.clone())
    }

    /// Entries in source order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry<V>> {
        self.entries.values()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog as seen by the presentation layer while it loads
#[derive(Debug, Clone)]
pub enum CatalogState<V: Eq + Hash> {
    /// Fetch in progress
    Loading,
    /// Fetched
    Ready(ValueCatalog<V>),
    /// Fetch failed
    Failed(String),
}

impl<V: Eq + Hash> CatalogState<V> {
    /// Catalog if loaded
    #[inline]
    #[must_use]
    pub fn ready(&self) -> Option<&ValueCatalog<V>> {
        match self {
            Self::Ready(catalog) => Some(catalog),
            _ => None,
        }
    }

    /// Check if still loading
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Adapters for backends that return roles in older shapes
pub mod legacy {
    use super::{CatalogEntry, ValueCatalog};
    use crate::error::CatalogError;
    use crate::types::RoleId;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        List(Vec<RawRole>),
        Wrapped { roles: Vec<RawRole> },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRole {
        Name(String),
        Object {
            id: String,
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            description: Option<String>,
        },
    }

    impl RawRole {
        fn into_entry(self) -> CatalogEntry<RoleId> {
            match self {
                RawRole::Name(name) => {
                    let label = title_case(&name);
                    CatalogEntry::new(RoleId(name), label, "")
                }
                RawRole::Object {
                    id,
                    name,
                    description,
                } => {
                    let label = title_case(name.as_deref().unwrap_or(&id));
                    CatalogEntry::new(RoleId(id), label, description.unwrap_or_default())
                }
            }
        }
    }

    /// Parse a role list into a catalog
    ///
    /// Accepts a bare array or `{"roles": [...]}`; each role is either a
    /// string or an object with `id`, optional `name` and `description`.
    ///
    /// # Errors
    /// - `CatalogError::Malformed` for any other shape
    /// - `CatalogError::DuplicateId` for repeated ids
    pub fn parse_role_catalog(json: &str) -> Result<ValueCatalog<RoleId>, CatalogError> {
        let roles = match serde_json::from_str::<Payload>(json)? {
            Payload::List(roles) | Payload::Wrapped { roles } => roles,
        };
        ValueCatalog::new(roles.into_iter().map(RawRole::into_entry))
    }

    /// `"repo_admin"` -> `"Repo Admin"`
    #[must_use]
    pub fn title_case(raw: &str) -> String {
        raw.replace('_', " ")
            .split(' ')
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
