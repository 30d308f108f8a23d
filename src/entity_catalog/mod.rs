//! Read-only entity metadata consumed by the translation pipeline.
//!
//! The catalog is built once by the host (typically deserialized from
//! configuration) and never mutated afterwards. Translation components only
//! read from it: declared properties, declared/inherited navigations, and the
//! base-type relationships needed for member compatibility checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A scalar member of an entity type, mapped to a storage key
/// (a document key or a column name, depending on the backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Key used when building access paths into stored objects.
    pub storage_key: String,
    /// Name of the entity type this property is declared on.
    pub declaring_type: String,
    #[serde(default)]
    pub nullable: bool,
}

/// A reference from one entity type to another, mapped to a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Navigation {
    pub name: String,
    /// Key used when building access paths into stored objects.
    pub storage_key: String,
    /// Name of the entity type this navigation is declared on.
    pub declaring_type: String,
    /// Name of the entity type this navigation points at.
    pub target_type: String,
    /// True when the navigation yields a sequence of targets rather than one.
    #[serde(default)]
    pub is_collection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Direct supertype, if any. Chains are resolved through the catalog.
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub navigations: Vec<Navigation>,
}

impl EntityType {
    /// Look up a property declared directly on this type.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a navigation declared directly on this type.
    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.iter().find(|n| n.name == name)
    }
}

/// Name-keyed view over all entity types of one model.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entity_types: HashMap<String, Arc<EntityType>>,
}

impl EntityCatalog {
    pub fn new(entity_types: impl IntoIterator<Item = EntityType>) -> Self {
        Self {
            entity_types: entity_types
                .into_iter()
                .map(|t| (t.name.clone(), Arc::new(t)))
                .collect(),
        }
    }

    pub fn entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types.get(name)
    }

    /// True when `derived` is `base` itself or reaches `base` through its
    /// base-type chain.
    pub fn is_assignable_from(&self, base: &str, derived: &str) -> bool {
        let mut current = Some(derived);
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self
                .entity_types
                .get(name)
                .and_then(|t| t.base_type.as_deref());
        }
        false
    }

    /// True when the two types are related in either direction of the
    /// base-type chain. Members declared on unrelated types cannot be bound.
    pub fn are_compatible(&self, left: &str, right: &str) -> bool {
        self.is_assignable_from(left, right) || self.is_assignable_from(right, left)
    }

    /// Find a navigation by name on `type_name` or any of its supertypes.
    pub fn find_navigation(&self, type_name: &str, navigation: &str) -> Option<&Navigation> {
        let mut current = Some(type_name);
        while let Some(name) = current {
            let entity_type = self.entity_types.get(name)?;
            if let Some(found) = entity_type.navigation(navigation) {
                return Some(found);
            }
            current = entity_type.base_type.as_deref();
        }
        None
    }

    /// Find a property by name on `type_name` or any of its supertypes.
    pub fn find_property(&self, type_name: &str, property: &str) -> Option<&Property> {
        let mut current = Some(type_name);
        while let Some(name) = current {
            let entity_type = self.entity_types.get(name)?;
            if let Some(found) = entity_type.property(property) {
                return Some(found);
            }
            current = entity_type.base_type.as_deref();
        }
        None
    }
}
