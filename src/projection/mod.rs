//! Entity projection expansion.
//!
//! A projection node says "the object reachable via this access path, viewed
//! as entity type E". The [`ProjectionExpander`] turns member accesses over a
//! projection into bound sub-expressions: properties become key accesses,
//! navigations become nested projections (array-wrapped when collection
//! valued). Bindings are memoized per projection *instance* in an expander
//! owned side-table, so repeat binds return the identical node and the
//! projection node itself stays immutable.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::entity_catalog::{EntityCatalog, Navigation, Property};
use crate::target_expr::identity::IdentityMap;
use crate::target_expr::{ArrayProjection, EntityProjection, KeyAccess, ObjectAccess, TargetExpr};

#[derive(Debug, Clone, Error)]
pub enum ProjectionError {
    #[error(
        "cannot bind {member_kind} '{member}' declared on '{declaring_type}' to a projection of \
         entity type '{entity_type}' (the types are unrelated)"
    )]
    IncompatibleMember {
        member_kind: &'static str,
        member: String,
        declaring_type: String,
        entity_type: String,
    },

    #[error("navigation '{navigation}' targets unknown entity type '{target_type}' (check catalog configuration)")]
    UnknownTargetType {
        navigation: String,
        target_type: String,
    },

    #[error("unknown entity type '{0}' (check catalog configuration)")]
    UnknownEntityType(String),

    #[error("expected an entity projection node, got {0}")]
    NotAProjection(&'static str),
}

#[derive(Debug, Default)]
struct BindingTable {
    properties: HashMap<String, Arc<TargetExpr>>,
    navigations: HashMap<String, Arc<TargetExpr>>,
}

/// Binds members over projection nodes, memoizing per projection instance.
///
/// One expander serves one translation pass; the side-table dies with it.
/// A projection rebuilt by a rewrite (changed access path) is a new instance
/// and naturally starts with no bindings — they re-derive lazily on demand.
pub struct ProjectionExpander<'c> {
    catalog: &'c EntityCatalog,
    bindings: IdentityMap<TargetExpr, BindingTable>,
}

impl<'c> ProjectionExpander<'c> {
    pub fn new(catalog: &'c EntityCatalog) -> Self {
        Self {
            catalog,
            bindings: IdentityMap::new(),
        }
    }

    /// Build the projection a translation starts from: `entity_type` viewed
    /// through the query root binding `alias`.
    pub fn root(&self, entity_type: &str, alias: &str) -> Result<Arc<TargetExpr>, ProjectionError> {
        let entity_type = self
            .catalog
            .entity_type(entity_type)
            .ok_or_else(|| ProjectionError::UnknownEntityType(entity_type.to_string()))?;
        Ok(Arc::new(TargetExpr::EntityProjection(EntityProjection::new(
            Arc::clone(entity_type),
            TargetExpr::root_reference(alias),
        ))))
    }

    /// Bind `property` over `projection`, returning the memoized key-access
    /// leaf. Repeat binds on the same projection instance return the
    /// identical node.
    pub fn bind_property(
        &mut self,
        projection: &Arc<TargetExpr>,
        property: &Property,
    ) -> Result<Arc<TargetExpr>, ProjectionError> {
        let entity = entity_projection(projection)?;
        self.check_compatible(entity, "property", &property.name, &property.declaring_type)?;

        let table = self.bindings.entry_or_default(projection);
        if let Some(cached) = table.properties.get(&property.name) {
            log::debug!(
                "property '{}' already bound on projection '{}'",
                property.name,
                entity.entity_type.name
            );
            return Ok(Arc::clone(cached));
        }

        let bound = Arc::new(TargetExpr::KeyAccess(KeyAccess {
            property: property.clone(),
            access: Arc::clone(&entity.access),
        }));
        table
            .properties
            .insert(property.name.clone(), Arc::clone(&bound));
        Ok(bound)
    }

    /// Bind `navigation` over `projection`: a nested projection over the
    /// access path extended by the navigation's storage key, array-wrapped
    /// for collection navigations. Memoized like property binding.
    pub fn bind_navigation(
        &mut self,
        projection: &Arc<TargetExpr>,
        navigation: &Navigation,
    ) -> Result<Arc<TargetExpr>, ProjectionError> {
        let entity = entity_projection(projection)?;
        self.check_compatible(
            entity,
            "navigation",
            &navigation.name,
            &navigation.declaring_type,
        )?;

        let target_type = Arc::clone(self.catalog.entity_type(&navigation.target_type).ok_or_else(
            || ProjectionError::UnknownTargetType {
                navigation: navigation.name.clone(),
                target_type: navigation.target_type.clone(),
            },
        )?);

        let table = self.bindings.entry_or_default(projection);
        if let Some(cached) = table.navigations.get(&navigation.name) {
            log::debug!(
                "navigation '{}' already bound on projection '{}'",
                navigation.name,
                entity.entity_type.name
            );
            return Ok(Arc::clone(cached));
        }

        let nested = EntityProjection::new(
            target_type,
            Arc::new(TargetExpr::ObjectAccess(ObjectAccess {
                navigation: navigation.clone(),
                access: Arc::clone(&entity.access),
            })),
        );
        let bound = if navigation.is_collection {
            Arc::new(TargetExpr::ArrayProjection(ArrayProjection::new(nested)))
        } else {
            Arc::new(TargetExpr::EntityProjection(nested))
        };
        table
            .navigations
            .insert(navigation.name.clone(), Arc::clone(&bound));
        Ok(bound)
    }

    fn check_compatible(
        &self,
        entity: &EntityProjection,
        member_kind: &'static str,
        member: &str,
        declaring_type: &str,
    ) -> Result<(), ProjectionError> {
        if self
            .catalog
            .are_compatible(&entity.entity_type.name, declaring_type)
        {
            Ok(())
        } else {
            Err(ProjectionError::IncompatibleMember {
                member_kind,
                member: member.to_string(),
                declaring_type: declaring_type.to_string(),
                entity_type: entity.entity_type.name.clone(),
            })
        }
    }
}

fn entity_projection(expr: &Arc<TargetExpr>) -> Result<&EntityProjection, ProjectionError> {
    match expr.as_ref() {
        TargetExpr::EntityProjection(projection) => Ok(projection),
        other => Err(ProjectionError::NotAProjection(other.kind_name())),
    }
}
