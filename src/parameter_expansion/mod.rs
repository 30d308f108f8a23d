//! Materialization of raw-template parameters.
//!
//! A raw-template node enters the pipeline carrying one named placeholder
//! standing for a runtime-supplied, ordered sequence of heterogeneous values.
//! Before rendering, each element must become its own target parameter. The
//! [`ParameterMaterializer`] walks the tree once, expands every distinct
//! template occurrence exactly once (identity-keyed, see
//! [`crate::target_expr::identity`]), and replaces the placeholder with a
//! single [`CompositeParameterBinding`] constant.

use serde_json::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::target_expr::identity::IdentityMap;
use crate::target_expr::rewriter::ExprRewriter;
use crate::target_expr::{RawTemplate, TargetExpr};

#[derive(Debug, Clone, Error)]
pub enum ParameterExpansionError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter '{0}' must be bound to an ordered sequence of values")]
    NotASequence(String),

    #[error("Parameter '{0}' contains a nested sequence, which cannot become a single target parameter")]
    NestedSequence(String),
}

/// Backend type a materialized value is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeMapping {
    Boolean,
    Integer,
    Float,
    Text,
    /// Structured or absent values the backend receives as serialized JSON.
    Json,
}

/// Infers the backend type mapping for a runtime value.
pub trait TypeMappingSource {
    fn mapping_for_value(&self, value: &Value) -> TypeMapping;
}

/// Default inference driven by the JSON shape of the value.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTypeMappingSource;

impl TypeMappingSource for JsonTypeMappingSource {
    fn mapping_for_value(&self, value: &Value) -> TypeMapping {
        match value {
            Value::Bool(_) => TypeMapping::Boolean,
            Value::Number(n) if n.is_f64() => TypeMapping::Float,
            Value::Number(_) => TypeMapping::Integer,
            Value::String(_) => TypeMapping::Text,
            Value::Null | Value::Array(_) | Value::Object(_) => TypeMapping::Json,
        }
    }
}

/// Monotonic generator of target parameter names, scoped to one
/// materialization pass.
#[derive(Debug)]
pub struct ParameterNameGenerator {
    prefix: String,
    next: usize,
}

impl ParameterNameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn generate_next(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}

/// A caller-owned, backend-native parameter object.
///
/// Contract: when such a parameter arrives unnamed, materialization assigns
/// it the generated name *in place* — callers may read the assigned name back
/// afterwards. The name is the only mutable field.
#[derive(Debug)]
pub struct NativeParameter {
    name: Mutex<String>,
    pub value: Value,
}

impl NativeParameter {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: Mutex::new(name.into()),
            value,
        }
    }

    pub fn unnamed(value: Value) -> Self {
        Self::new(String::new(), value)
    }

    pub fn name(&self) -> String {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner) = name.into();
    }
}

impl PartialEq for NativeParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.value == other.value
    }
}

/// A runtime value supplied for a named placeholder.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Scalar(Value),
    Native(Arc<NativeParameter>),
    Sequence(Vec<RuntimeValue>),
}

impl From<Value> for RuntimeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                RuntimeValue::Sequence(items.into_iter().map(RuntimeValue::from).collect())
            }
            other => RuntimeValue::Scalar(other),
        }
    }
}

impl From<Arc<NativeParameter>> for RuntimeValue {
    fn from(parameter: Arc<NativeParameter>) -> Self {
        RuntimeValue::Native(parameter)
    }
}

/// One materialized target parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBinding {
    /// Caller-supplied native parameter, passed through under `name`.
    Raw {
        name: String,
        parameter: Arc<NativeParameter>,
    },
    /// Synthesized binding with an inferred type mapping.
    TypeMapped {
        name: String,
        mapping: TypeMapping,
        nullable: bool,
        value: Value,
    },
}

impl ParameterBinding {
    pub fn name(&self) -> &str {
        match self {
            ParameterBinding::Raw { name, .. } => name,
            ParameterBinding::TypeMapped { name, .. } => name,
        }
    }
}

// Hashing covers the immutable identifying fields only; runtime values are
// not hashable and the native parameter's name field is mutable.
impl Hash for ParameterBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParameterBinding::Raw { name, .. } => name.hash(state),
            ParameterBinding::TypeMapped {
                name,
                mapping,
                nullable,
                ..
            } => {
                name.hash(state);
                mapping.hash(state);
                nullable.hash(state);
            }
        }
    }
}

/// The per-value parameter set that replaces a template's single
/// array-valued placeholder. Created once per distinct template occurrence
/// within one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeParameterBinding {
    /// The logical (template-level) parameter name.
    pub name: String,
    pub bindings: Vec<ParameterBinding>,
}

impl Hash for CompositeParameterBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.bindings.hash(state);
    }
}

/// Rewrites raw-template nodes into their backend-ready form.
///
/// The cache is keyed by node *identity*: two value-equal templates are still
/// distinct occurrences and expand independently, while re-visits of the same
/// instance through shared sub-trees return the cached replacement without
/// advancing the name generator.
pub struct ParameterMaterializer<'a, M: TypeMappingSource> {
    parameter_values: &'a HashMap<String, RuntimeValue>,
    type_mappings: &'a M,
    names: ParameterNameGenerator,
    expanded: IdentityMap<TargetExpr, Arc<TargetExpr>>,
}

impl<'a, M: TypeMappingSource> ParameterMaterializer<'a, M> {
    pub fn new(parameter_values: &'a HashMap<String, RuntimeValue>, type_mappings: &'a M) -> Self {
        Self {
            parameter_values,
            type_mappings,
            names: ParameterNameGenerator::new("p"),
            expanded: IdentityMap::new(),
        }
    }

    fn expand_template(
        &mut self,
        raw: &RawTemplate,
    ) -> Result<Option<Arc<TargetExpr>>, ParameterExpansionError> {
        let TargetExpr::Parameter(parameter_name) = raw.argument.as_ref() else {
            // Already materialized, or carries no placeholder at all.
            return Ok(None);
        };

        let value = self
            .parameter_values
            .get(parameter_name)
            .ok_or_else(|| ParameterExpansionError::MissingParameter(parameter_name.clone()))?;
        let elements = match value {
            RuntimeValue::Sequence(elements) => elements,
            _ => return Err(ParameterExpansionError::NotASequence(parameter_name.clone())),
        };

        let mut bindings = Vec::with_capacity(elements.len());
        for element in elements {
            let generated = self.names.generate_next();
            match element {
                RuntimeValue::Native(parameter) => {
                    let name = if parameter.name().is_empty() {
                        parameter.set_name(generated.clone());
                        generated
                    } else {
                        parameter.name()
                    };
                    bindings.push(ParameterBinding::Raw {
                        name,
                        parameter: Arc::clone(parameter),
                    });
                }
                RuntimeValue::Scalar(value) => {
                    bindings.push(ParameterBinding::TypeMapped {
                        name: generated,
                        mapping: self.type_mappings.mapping_for_value(value),
                        nullable: value.is_null(),
                        value: value.clone(),
                    });
                }
                RuntimeValue::Sequence(_) => {
                    return Err(ParameterExpansionError::NestedSequence(
                        parameter_name.clone(),
                    ));
                }
            }
        }

        log::debug!(
            "expanded template parameter '{}' into {} target parameters",
            parameter_name,
            bindings.len()
        );

        let composite = CompositeParameterBinding {
            name: parameter_name.clone(),
            bindings,
        };
        Ok(Some(TargetExpr::raw_template(
            raw.template.clone(),
            Arc::new(TargetExpr::CompositeParameter(Arc::new(composite))),
            raw.alias.clone(),
        )))
    }
}

impl<M: TypeMappingSource> ExprRewriter for ParameterMaterializer<'_, M> {
    type Error = ParameterExpansionError;

    fn rewrite(&mut self, expr: &Arc<TargetExpr>) -> Result<Arc<TargetExpr>, Self::Error> {
        if let TargetExpr::RawTemplate(raw) = expr.as_ref() {
            if let Some(cached) = self.expanded.get(expr) {
                log::debug!("template '{}' already expanded in this pass", raw.alias);
                return Ok(Arc::clone(cached));
            }
            let replacement = self
                .expand_template(raw)?
                .unwrap_or_else(|| Arc::clone(expr));
            self.expanded.insert(Arc::clone(expr), Arc::clone(&replacement));
            return Ok(replacement);
        }
        self.rewrite_children(expr)
    }
}

/// Run one materialization pass over `expr` with a fresh name sequence.
pub fn materialize_parameters<M: TypeMappingSource>(
    expr: &Arc<TargetExpr>,
    parameter_values: &HashMap<String, RuntimeValue>,
    type_mappings: &M,
) -> Result<Arc<TargetExpr>, ParameterExpansionError> {
    ParameterMaterializer::new(parameter_values, type_mappings).rewrite(expr)
}
