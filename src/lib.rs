//! Entiquery - object-graph query translation core
//!
//! This crate turns entity/navigation-shaped access expressions into a
//! backend query-language expression tree through:
//! - An immutable, structurally-comparable expression node model
//! - Lazy, memoized expansion of entity and navigation projections
//! - Materialization of raw-template parameters into per-value bindings
//! - A pluggable, ordered registry of method-call translators
//!
//! Parsing the source query language, building entity metadata, and
//! rendering/executing the produced tree are external collaborators.

pub mod entity_catalog;
pub mod function_translator;
pub mod parameter_expansion;
pub mod projection;
pub mod target_expr;
