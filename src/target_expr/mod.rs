//! Target-language expression tree.
//!
//! Every node is immutable once built and shared through `Arc`. Two contracts
//! hold crate-wide:
//!
//! - Equality is structural: same node kind, all fields and children equal by
//!   value, recursively. `Hash` is consistent with equality. Pointer equality
//!   is only ever a fast path, never the definition (the one deliberate
//!   exception, identity-keyed caching, lives in [`identity`]).
//! - [`TargetExpr::map_children`] returns the original `Arc` untouched when
//!   every transformed child comes back pointer-identical. Rewriters and the
//!   identity caches built on top rely on this; returning an equal-but-new
//!   node here silently breaks them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::entity_catalog::{EntityType, Navigation, Property};
use crate::parameter_expansion::CompositeParameterBinding;

pub mod identity;
pub mod rewriter;

/// A constant embedded in the target expression tree.
#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

// Floats compare and hash by bit pattern so that Eq stays lawful and
// Hash stays consistent with it.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Null, Literal::Null) => true,
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            (Literal::Integer(a), Literal::Integer(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::String(a), Literal::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Null => {}
            Literal::Boolean(b) => b.hash(state),
            Literal::Integer(i) => i.hash(state),
            Literal::Float(f) => f.to_bits().hash(state),
            Literal::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Binary operators a translator may emit when re-shaping arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Equal,
    NotEqual,
    And,
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Addition => f.write_str("+"),
            Operator::Subtraction => f.write_str("-"),
            Operator::Multiplication => f.write_str("*"),
            Operator::Division => f.write_str("/"),
            Operator::Equal => f.write_str("="),
            Operator::NotEqual => f.write_str("<>"),
            Operator::And => f.write_str("AND"),
            Operator::Or => f.write_str("OR"),
        }
    }
}

/// The query root binding an access path starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootReference {
    pub alias: String,
}

/// Property access over an access path: a leaf of the translated tree.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct KeyAccess {
    pub property: Property,
    pub access: Arc<TargetExpr>,
}

/// Navigation access over an access path: one step deeper into the object.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ObjectAccess {
    pub navigation: Navigation,
    pub access: Arc<TargetExpr>,
}

/// "The object reachable via `access`, viewed as an instance of
/// `entity_type`." Property/navigation bindings over it are memoized by the
/// projection expander, keyed by node identity, so the projection itself
/// carries no mutable state.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct EntityProjection {
    pub entity_type: Arc<EntityType>,
    pub access: Arc<TargetExpr>,
    /// Display name derived from the access path, when one is available.
    pub name: Option<String>,
}

impl EntityProjection {
    pub fn new(entity_type: Arc<EntityType>, access: Arc<TargetExpr>) -> Self {
        let name = match access.as_ref() {
            TargetExpr::RootReference(root) => Some(root.alias.clone()),
            TargetExpr::ObjectAccess(object) => Some(object.navigation.storage_key.clone()),
            _ => None,
        };
        Self {
            entity_type,
            access,
            name,
        }
    }
}

/// Marks a projection as collection-valued: the wrapped projection describes
/// one element, this node describes the sequence. Equality and hashing
/// delegate to the wrapped projection.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ArrayProjection {
    pub entity: EntityProjection,
}

impl ArrayProjection {
    pub fn new(entity: EntityProjection) -> Self {
        Self { entity }
    }

    pub fn name(&self) -> Option<&str> {
        self.entity.name.as_deref()
    }
}

/// Target function call emitted by a translator.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Arc<TargetExpr>>,
}

/// Binary operator application, used by translators that re-shape arguments
/// (for instance 0-based to 1-based index adjustment).
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<Arc<TargetExpr>>,
}

/// Backend-native query fragment whose `argument` stands for its runtime
/// parameters: a single named [`TargetExpr::Parameter`] before
/// materialization, a [`TargetExpr::CompositeParameter`] constant after.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct RawTemplate {
    pub template: String,
    pub argument: Arc<TargetExpr>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub enum TargetExpr {
    RootReference(RootReference),
    KeyAccess(KeyAccess),
    ObjectAccess(ObjectAccess),
    EntityProjection(EntityProjection),
    ArrayProjection(ArrayProjection),
    Literal(Literal),
    /// A named placeholder for a runtime-supplied value.
    Parameter(String),
    Function(FunctionCall),
    Operator(OperatorApplication),
    RawTemplate(RawTemplate),
    /// Materialized per-value parameter set replacing a template's single
    /// array-valued placeholder.
    CompositeParameter(Arc<CompositeParameterBinding>),
}

impl TargetExpr {
    pub fn root_reference(alias: impl Into<String>) -> Arc<Self> {
        Arc::new(TargetExpr::RootReference(RootReference {
            alias: alias.into(),
        }))
    }

    pub fn literal(literal: Literal) -> Arc<Self> {
        Arc::new(TargetExpr::Literal(literal))
    }

    pub fn integer(value: i64) -> Arc<Self> {
        Self::literal(Literal::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Arc<Self> {
        Self::literal(Literal::String(value.into()))
    }

    pub fn parameter(name: impl Into<String>) -> Arc<Self> {
        Arc::new(TargetExpr::Parameter(name.into()))
    }

    pub fn function(name: impl Into<String>, args: Vec<Arc<TargetExpr>>) -> Arc<Self> {
        Arc::new(TargetExpr::Function(FunctionCall {
            name: name.into(),
            args,
        }))
    }

    pub fn operator(operator: Operator, operands: Vec<Arc<TargetExpr>>) -> Arc<Self> {
        Arc::new(TargetExpr::Operator(OperatorApplication { operator, operands }))
    }

    pub fn raw_template(
        template: impl Into<String>,
        argument: Arc<TargetExpr>,
        alias: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(TargetExpr::RawTemplate(RawTemplate {
            template: template.into(),
            argument,
            alias: alias.into(),
        }))
    }

    /// Node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TargetExpr::RootReference(_) => "RootReference",
            TargetExpr::KeyAccess(_) => "KeyAccess",
            TargetExpr::ObjectAccess(_) => "ObjectAccess",
            TargetExpr::EntityProjection(_) => "EntityProjection",
            TargetExpr::ArrayProjection(_) => "ArrayProjection",
            TargetExpr::Literal(_) => "Literal",
            TargetExpr::Parameter(_) => "Parameter",
            TargetExpr::Function(_) => "Function",
            TargetExpr::Operator(_) => "Operator",
            TargetExpr::RawTemplate(_) => "RawTemplate",
            TargetExpr::CompositeParameter(_) => "CompositeParameter",
        }
    }

    /// Apply `transform` to every child node, in a fixed order: access paths
    /// first, then arguments/operands in declaration order. Returns the
    /// original `Arc` when every child comes back pointer-identical;
    /// otherwise rebuilds the node with non-child fields copied verbatim.
    ///
    /// Projections visit their access path only; a changed path yields a
    /// freshly constructed projection whose display name is re-derived and
    /// whose memoized bindings (expander-owned, identity-keyed) do not carry
    /// over.
    pub fn map_children<E>(
        self: &Arc<Self>,
        mut transform: impl FnMut(&Arc<TargetExpr>) -> Result<Arc<TargetExpr>, E>,
    ) -> Result<Arc<TargetExpr>, E> {
        match self.as_ref() {
            TargetExpr::RootReference(_)
            | TargetExpr::Literal(_)
            | TargetExpr::Parameter(_)
            | TargetExpr::CompositeParameter(_) => Ok(Arc::clone(self)),

            TargetExpr::KeyAccess(key) => {
                let access = transform(&key.access)?;
                if Arc::ptr_eq(&access, &key.access) {
                    Ok(Arc::clone(self))
                } else {
                    Ok(Arc::new(TargetExpr::KeyAccess(KeyAccess {
                        property: key.property.clone(),
                        access,
                    })))
                }
            }

            TargetExpr::ObjectAccess(object) => {
                let access = transform(&object.access)?;
                if Arc::ptr_eq(&access, &object.access) {
                    Ok(Arc::clone(self))
                } else {
                    Ok(Arc::new(TargetExpr::ObjectAccess(ObjectAccess {
                        navigation: object.navigation.clone(),
                        access,
                    })))
                }
            }

            TargetExpr::EntityProjection(projection) => {
                let access = transform(&projection.access)?;
                if Arc::ptr_eq(&access, &projection.access) {
                    Ok(Arc::clone(self))
                } else {
                    Ok(Arc::new(TargetExpr::EntityProjection(EntityProjection::new(
                        Arc::clone(&projection.entity_type),
                        access,
                    ))))
                }
            }

            TargetExpr::ArrayProjection(array) => {
                let access = transform(&array.entity.access)?;
                if Arc::ptr_eq(&access, &array.entity.access) {
                    Ok(Arc::clone(self))
                } else {
                    Ok(Arc::new(TargetExpr::ArrayProjection(ArrayProjection::new(
                        EntityProjection::new(Arc::clone(&array.entity.entity_type), access),
                    ))))
                }
            }

            TargetExpr::Function(call) => {
                let (args, changed) = Self::transform_all(&call.args, &mut transform)?;
                if changed {
                    Ok(Arc::new(TargetExpr::Function(FunctionCall {
                        name: call.name.clone(),
                        args,
                    })))
                } else {
                    Ok(Arc::clone(self))
                }
            }

            TargetExpr::Operator(application) => {
                let (operands, changed) = Self::transform_all(&application.operands, &mut transform)?;
                if changed {
                    Ok(Arc::new(TargetExpr::Operator(OperatorApplication {
                        operator: application.operator,
                        operands,
                    })))
                } else {
                    Ok(Arc::clone(self))
                }
            }

            TargetExpr::RawTemplate(raw) => {
                let argument = transform(&raw.argument)?;
                if Arc::ptr_eq(&argument, &raw.argument) {
                    Ok(Arc::clone(self))
                } else {
                    Ok(Arc::new(TargetExpr::RawTemplate(RawTemplate {
                        template: raw.template.clone(),
                        argument,
                        alias: raw.alias.clone(),
                    })))
                }
            }
        }
    }

    fn transform_all<E>(
        children: &[Arc<TargetExpr>],
        transform: &mut impl FnMut(&Arc<TargetExpr>) -> Result<Arc<TargetExpr>, E>,
    ) -> Result<(Vec<Arc<TargetExpr>>, bool), E> {
        let mut changed = false;
        let mut transformed = Vec::with_capacity(children.len());
        for child in children {
            let new_child = transform(child)?;
            changed |= !Arc::ptr_eq(&new_child, child);
            transformed.push(new_child);
        }
        Ok((transformed, changed))
    }
}

impl fmt::Display for TargetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetExpr::RootReference(root) => f.write_str(&root.alias),
            TargetExpr::KeyAccess(key) => {
                write!(f, "{}[\"{}\"]", key.access, key.property.storage_key)
            }
            TargetExpr::ObjectAccess(object) => {
                write!(f, "{}[\"{}\"]", object.access, object.navigation.storage_key)
            }
            TargetExpr::EntityProjection(projection) => write!(f, "{}", projection.access),
            TargetExpr::ArrayProjection(array) => write!(f, "{}", array.entity.access),
            TargetExpr::Literal(literal) => write!(f, "{}", literal),
            TargetExpr::Parameter(name) => write!(f, "${}", name),
            TargetExpr::Function(call) => {
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            TargetExpr::Operator(application) => {
                f.write_str("(")?;
                for (i, operand) in application.operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", application.operator)?;
                    }
                    write!(f, "{}", operand)?;
                }
                f.write_str(")")
            }
            TargetExpr::RawTemplate(raw) => write!(f, "({}) AS {}", raw.template, raw.alias),
            TargetExpr::CompositeParameter(composite) => write!(f, "${}", composite.name),
        }
    }
}
