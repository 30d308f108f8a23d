//! End-to-end translation over a small conference model: projection
//! expansion, method-call translation, and parameter materialization working
//! against one shared tree.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use entiquery::entity_catalog::{EntityCatalog, EntityType, Navigation, Property};
use entiquery::function_translator::{CallDescriptor, TranslatorRegistry};
use entiquery::parameter_expansion::{
    materialize_parameters, JsonTypeMappingSource, NativeParameter, ParameterMaterializer,
    RuntimeValue,
};
use entiquery::projection::ProjectionExpander;
use entiquery::target_expr::rewriter::ExprRewriter;
use entiquery::target_expr::{Operator, TargetExpr};

fn conference_catalog() -> EntityCatalog {
    EntityCatalog::new([
        EntityType {
            name: "Attendee".to_string(),
            base_type: None,
            properties: vec![Property {
                name: "UserName".to_string(),
                storage_key: "UserName".to_string(),
                declaring_type: "Attendee".to_string(),
                nullable: false,
            }],
            navigations: vec![Navigation {
                name: "Sessions".to_string(),
                storage_key: "Sessions".to_string(),
                declaring_type: "Attendee".to_string(),
                target_type: "Session".to_string(),
                is_collection: true,
            }],
        },
        EntityType {
            name: "Session".to_string(),
            base_type: None,
            properties: vec![Property {
                name: "Title".to_string(),
                storage_key: "Title".to_string(),
                declaring_type: "Session".to_string(),
                nullable: false,
            }],
            navigations: vec![],
        },
    ])
}

#[test]
fn binding_user_name_yields_property_node_over_root() {
    let catalog = conference_catalog();
    let mut expander = ProjectionExpander::new(&catalog);
    let attendee = expander.root("Attendee", "root").unwrap();

    let user_name = catalog.find_property("Attendee", "UserName").unwrap().clone();
    let bound = expander.bind_property(&attendee, &user_name).unwrap();

    assert_eq!(bound.to_string(), "root[\"UserName\"]");
    match bound.as_ref() {
        TargetExpr::KeyAccess(key) => {
            assert!(matches!(key.access.as_ref(), TargetExpr::RootReference(r) if r.alias == "root"));
        }
        other => panic!("expected KeyAccess, got {}", other.kind_name()),
    }
}

#[test]
fn binding_sessions_yields_array_projection_over_extended_path() {
    let catalog = conference_catalog();
    let mut expander = ProjectionExpander::new(&catalog);
    let attendee = expander.root("Attendee", "root").unwrap();

    let sessions = catalog.find_navigation("Attendee", "Sessions").unwrap().clone();
    let bound = expander.bind_navigation(&attendee, &sessions).unwrap();

    match bound.as_ref() {
        TargetExpr::ArrayProjection(array) => {
            assert_eq!(array.entity.entity_type.name, "Session");
            // Inner access path is root extended by the navigation's storage key.
            assert_eq!(array.entity.access.to_string(), "root[\"Sessions\"]");
            assert_eq!(array.name(), Some("Sessions"));
        }
        other => panic!("expected ArrayProjection, got {}", other.kind_name()),
    }
}

#[test]
fn translated_call_over_bound_property_renders_target_function() {
    let catalog = conference_catalog();
    let mut expander = ProjectionExpander::new(&catalog);
    let attendee = expander.root("Attendee", "a").unwrap();
    let user_name = catalog.find_property("Attendee", "UserName").unwrap().clone();
    let bound = expander.bind_property(&attendee, &user_name).unwrap();

    let registry = TranslatorRegistry::with_default_translators();
    let call = registry
        .translate_required(
            Some(&bound),
            &CallDescriptor::instance("String", "to_upper", 0),
            &[],
        )
        .unwrap();
    assert_eq!(call.to_string(), "UPPER(a[\"UserName\"])");

    let declined = registry.translate(
        Some(&bound),
        &CallDescriptor::instance("String", "reverse", 0),
        &[],
    );
    assert!(declined.is_none());
}

#[test]
fn materialization_rewrites_templates_inside_a_larger_tree() {
    let _ = env_logger::builder().is_test(true).try_init();
    let catalog = conference_catalog();
    let mut expander = ProjectionExpander::new(&catalog);
    let attendee = expander.root("Attendee", "a").unwrap();
    let user_name = catalog.find_property("Attendee", "UserName").unwrap().clone();
    let bound = expander.bind_property(&attendee, &user_name).unwrap();

    let native = Arc::new(NativeParameter::new("@p_custom", json!("keynote")));
    let values = HashMap::from([(
        "filters".to_string(),
        RuntimeValue::Sequence(vec![
            RuntimeValue::Scalar(json!(42)),
            RuntimeValue::Scalar(json!("x")),
            RuntimeValue::Native(Arc::clone(&native)),
        ]),
    )]);

    let template = TargetExpr::raw_template(
        "SELECT * FROM sessions WHERE day IN (?, ?, ?)",
        TargetExpr::parameter("filters"),
        "s",
    );
    // The template is shared: referenced from two operands of one predicate.
    let tree = TargetExpr::operator(
        Operator::And,
        vec![
            TargetExpr::operator(Operator::Equal, vec![Arc::clone(&bound), Arc::clone(&template)]),
            TargetExpr::operator(Operator::NotEqual, vec![bound, template]),
        ],
    );

    let mut materializer = ParameterMaterializer::new(&values, &JsonTypeMappingSource);
    let rewritten = materializer.rewrite(&tree).unwrap();
    assert!(!Arc::ptr_eq(&rewritten, &tree));

    // Both occurrences of the shared template instance were replaced by the
    // same materialized node: one expansion, one name sequence.
    let (left_template, right_template) = match rewritten.as_ref() {
        TargetExpr::Operator(and) => {
            let pick = |side: &Arc<TargetExpr>| match side.as_ref() {
                TargetExpr::Operator(cmp) => Arc::clone(&cmp.operands[1]),
                other => panic!("expected Operator, got {}", other.kind_name()),
            };
            (pick(&and.operands[0]), pick(&and.operands[1]))
        }
        other => panic!("expected Operator, got {}", other.kind_name()),
    };
    assert!(Arc::ptr_eq(&left_template, &right_template));

    match left_template.as_ref() {
        TargetExpr::RawTemplate(raw) => match raw.argument.as_ref() {
            TargetExpr::CompositeParameter(composite) => {
                assert_eq!(composite.name, "filters");
                let names: Vec<&str> = composite.bindings.iter().map(|b| b.name()).collect();
                assert_eq!(names, vec!["p0", "p1", "@p_custom"]);
            }
            other => panic!("expected CompositeParameter, got {}", other.kind_name()),
        },
        other => panic!("expected RawTemplate, got {}", other.kind_name()),
    }
}

#[test]
fn missing_template_parameter_aborts_translation() {
    let values: HashMap<String, RuntimeValue> = HashMap::new();
    let template = TargetExpr::raw_template("SELECT 1", TargetExpr::parameter("absent"), "t");
    let tree = TargetExpr::operator(
        Operator::Or,
        vec![TargetExpr::integer(1), template],
    );
    assert!(materialize_parameters(&tree, &values, &JsonTypeMappingSource).is_err());
}
