//! Builtin translators.
//!
//! Most host-language calls map one-to-one onto a target function, so the
//! default translator is table-driven: a static registry from lowercased
//! method name to target function name plus the expected call shape. Calls
//! that need argument re-shaping (index-base adjustment) get their own
//! translator instead of complicating the table.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CallDescriptor, MethodCallTranslator};
use crate::target_expr::{Operator, TargetExpr};

/// One entry of the name-mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FunctionMapping {
    /// Host method name (lowercase for lookup).
    pub method_name: &'static str,
    /// Target function name.
    pub target_name: &'static str,
    /// Expected argument count, excluding the receiver.
    pub arity: usize,
    /// When true the call needs a receiver, passed as first argument.
    pub receiver_first: bool,
}

/// Get the mapping for a host method name, if the table knows it.
pub fn get_function_mapping(method: &str) -> Option<FunctionMapping> {
    let lower = method.to_lowercase();
    FUNCTION_MAPPINGS.get(lower.as_str()).copied()
}

lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();
        let mut insert = |method_name, target_name, arity, receiver_first| {
            m.insert(method_name, FunctionMapping { method_name, target_name, arity, receiver_first });
        };

        // String methods
        insert("to_upper", "UPPER", 0, true);
        insert("to_lower", "LOWER", 0, true);
        insert("trim", "TRIM", 0, true);
        insert("length", "LENGTH", 0, true);
        insert("contains", "CONTAINS", 1, true);
        insert("starts_with", "STARTSWITH", 1, true);
        insert("ends_with", "ENDSWITH", 1, true);
        insert("index_of", "INDEX_OF", 1, true);

        // Math functions
        insert("abs", "ABS", 1, false);
        insert("ceiling", "CEILING", 1, false);
        insert("floor", "FLOOR", 1, false);
        insert("round", "ROUND", 1, false);
        insert("sqrt", "SQRT", 1, false);

        // Date/time predicates
        insert("is_date", "ISDATE", 1, false);

        m
    };
}

/// Table-driven translator covering the one-to-one name mappings.
pub struct FunctionMappingTranslator;

impl MethodCallTranslator for FunctionMappingTranslator {
    fn translate(
        &self,
        receiver: Option<&Arc<TargetExpr>>,
        method: &CallDescriptor,
        args: &[Arc<TargetExpr>],
    ) -> Option<Arc<TargetExpr>> {
        let mapping = get_function_mapping(&method.method)?;
        if args.len() != mapping.arity || receiver.is_some() != mapping.receiver_first {
            return None;
        }

        let mut call_args = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = receiver {
            call_args.push(Arc::clone(receiver));
        }
        call_args.extend(args.iter().cloned());
        Some(TargetExpr::function(mapping.target_name, call_args))
    }
}

/// Translates 0-based `element_at` access onto a 1-based target builtin by
/// emitting `index + 1`.
pub struct ElementAtTranslator;

impl MethodCallTranslator for ElementAtTranslator {
    fn translate(
        &self,
        receiver: Option<&Arc<TargetExpr>>,
        method: &CallDescriptor,
        args: &[Arc<TargetExpr>],
    ) -> Option<Arc<TargetExpr>> {
        if method.method != "element_at" || args.len() != 1 {
            return None;
        }
        let receiver = receiver?;
        Some(TargetExpr::function(
            "ARRAY_ELEMENT",
            vec![
                Arc::clone(receiver),
                TargetExpr::operator(
                    Operator::Addition,
                    vec![Arc::clone(&args[0]), TargetExpr::integer(1)],
                ),
            ],
        ))
    }
}
