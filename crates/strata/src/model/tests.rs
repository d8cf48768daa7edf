use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

use super::*;
use crate::common::CommonStrata;
use crate::order::StratumOrderBuilder;
use crate::traits::TraitSet;

const LOADED: &str = "wms-capabilities";

fn order() -> Arc<StratumOrder> {
	let mut builder = StratumOrderBuilder::common();
	builder.add_load(LOADED).unwrap();
	Arc::new(builder.build())
}

fn traits() -> Arc<TraitSet> {
	TraitSet::builder()
		.with(TraitDef::primitive("name"))
		.with(TraitDef::primitive("opacity").underride())
		.with(TraitDef::primitive_array("layers").merge())
		.with(TraitDef::object("style").merge())
		.with(TraitDef::object_array("info", "name").with_removal_flag("removed"))
		.with(TraitDef::object_array("columns", "name").top_stratum_only())
		.build()
		.unwrap()
}

fn model() -> Model {
	Model::new(ModelId::new("m"), "wms", traits(), order())
}

#[test]
fn test_override_scenario() {
	let m = model();
	m.set_trait(CommonStrata::DEFINITION, "name", "Roads").unwrap();
	m.set_trait(CommonStrata::USER, "name", "My Roads").unwrap();
	assert_eq!(m.get_str("name").as_deref(), Some("My Roads"));

	m.clear_trait(CommonStrata::USER, "name");
	assert_eq!(m.get_str("name").as_deref(), Some("Roads"));
}

#[test]
fn test_null_is_undefined() {
	let m = model();
	m.set_stratum(Stratum::new(CommonStrata::DEFINITION).with("name", "Roads"))
		.unwrap();
	m.set_stratum(Stratum::new(CommonStrata::USER).with("name", Value::Null))
		.unwrap();
	assert_eq!(m.get_str("name").as_deref(), Some("Roads"));
}

#[test]
fn test_underride_lowest_wins() {
	let m = model();
	m.set_trait(CommonStrata::USER, "opacity", 0.5).unwrap();
	m.set_trait(CommonStrata::DEFAULTS, "opacity", 0.8).unwrap();
	assert_eq!(m.flatten("opacity"), Some(json!(0.8)));
}

#[test]
fn test_merge_arrays_highest_first() {
	let m = model();
	m.set_trait(LOADED, "layers", json!(["b", "c"])).unwrap();
	m.set_trait(CommonStrata::USER, "layers", json!(["a", "b"])).unwrap();
	assert_eq!(m.flatten("layers"), Some(json!(["a", "b", "c"])));
}

#[test]
fn test_merge_objects_deep() {
	let m = model();
	m.set_trait(
		CommonStrata::DEFAULTS,
		"style",
		json!({ "fill": { "color": "red", "opacity": 1 }, "stroke": "black" }),
	)
	.unwrap();
	m.set_trait(CommonStrata::USER, "style", json!({ "fill": { "color": "blue" } }))
		.unwrap();
	assert_eq!(
		m.flatten("style"),
		Some(json!({ "fill": { "color": "blue", "opacity": 1 }, "stroke": "black" }))
	);
}

#[test]
fn test_object_array_order_and_removal() {
	let m = model();
	m.set_trait(
		CommonStrata::DEFAULTS,
		"info",
		json!([{ "name": "About", "content": "x" }, { "name": "Licence", "content": "cc" }]),
	)
	.unwrap();
	m.set_trait(
		CommonStrata::DEFINITION,
		"info",
		json!([{ "name": "Contact", "content": "me" }, { "name": "About", "content": "y" }]),
	)
	.unwrap();
	m.set_trait(CommonStrata::USER, "info", json!([{ "name": "Licence", "removed": true }]))
		.unwrap();

	assert_eq!(
		m.flatten("info"),
		Some(json!([{ "name": "About", "content": "y" }, { "name": "Contact", "content": "me" }]))
	);
}

#[test]
fn test_object_array_top_stratum_only() {
	let m = model();
	m.set_trait(
		CommonStrata::DEFAULTS,
		"columns",
		json!([{ "name": "a", "type": "text" }, { "name": "b", "type": "text" }]),
	)
	.unwrap();
	m.set_trait(CommonStrata::USER, "columns", json!([{ "name": "b", "title": "B" }]))
		.unwrap();

	assert_eq!(
		m.flatten("columns"),
		Some(json!([{ "name": "b", "type": "text", "title": "B" }]))
	);
}

#[test]
fn test_unknown_stratum() {
	let m = model();
	let err = m.set_trait("nope", "name", "x").unwrap_err();
	assert_eq!(
		err,
		ModelError::UnknownStratum {
			model: "m".to_string(),
			stratum: "nope".to_string(),
		}
	);
}

#[test]
fn test_invalid_value() {
	let m = model();
	let err = m.set_trait(CommonStrata::USER, "layers", "a").unwrap_err();
	assert_eq!(
		err,
		ModelError::InvalidValue {
			model: "m".to_string(),
			trait_id: "layers".to_string(),
			expected: "array",
			got: "string",
		}
	);
	assert!(m.stratum(CommonStrata::USER).is_none());
}

#[test]
fn test_update_from_json_reports_rejected_keys() {
	let m = model();
	let json = json!({ "id": "m", "type": "wms", "name": "Roads", "bogus": 1, "layers": "a" });
	let err = m
		.update_from_json(CommonStrata::DEFINITION, json.as_object().unwrap(), true)
		.unwrap_err();

	let ModelError::Rejected { errors, .. } = err else {
		panic!("expected Rejected, got {err:?}");
	};
	assert_eq!(errors.len(), 2);
	assert_eq!(m.get_str("name").as_deref(), Some("Roads"));
}

#[test]
fn test_revision_invalidates_cache() {
	let m = model();
	m.set_trait(CommonStrata::DEFINITION, "name", "a").unwrap();
	let rev = m.revision();
	assert_eq!(m.get_str("name").as_deref(), Some("a"));
	assert_eq!(m.get_str("name").as_deref(), Some("a"));
	assert_eq!(m.revision(), rev);

	m.set_trait(CommonStrata::USER, "name", "b").unwrap();
	assert!(m.revision() > rev);
	assert_eq!(m.get_str("name").as_deref(), Some("b"));
}

#[test]
fn test_export_round_trip() {
	let m = model();
	m.set_trait(CommonStrata::DEFAULTS, "opacity", 0.8).unwrap();
	m.set_trait(CommonStrata::DEFINITION, "name", "Roads").unwrap();
	m.set_trait(LOADED, "layers", json!(["b", "c"])).unwrap();
	m.set_trait(CommonStrata::USER, "layers", json!(["a"])).unwrap();
	m.set_trait(CommonStrata::USER, "style", json!({ "fill": "red" })).unwrap();
	m.set_trait(CommonStrata::DEFINITION, "info", json!([{ "name": "About", "content": "x" }]))
		.unwrap();
	let exported = m.to_json();

	let fresh = model();
	fresh.set_trait(CommonStrata::DEFAULTS, "opacity", 0.8).unwrap();
	fresh
		.update_from_json(CommonStrata::OVERRIDE, &exported, true)
		.unwrap();
	assert_eq!(fresh.to_json(), exported);
}

#[test]
fn test_retain_strata() {
	let m = model();
	m.set_trait(CommonStrata::DEFINITION, "name", "a").unwrap();
	m.set_trait(CommonStrata::USER, "name", "b").unwrap();
	m.set_trait(LOADED, "name", "c").unwrap();

	m.retain_strata(|name| name == CommonStrata::USER);
	assert_eq!(m.strata_top_to_bottom(), vec![Box::from(CommonStrata::USER)]);
}

proptest! {
	#[test]
	fn prop_priority_independent_of_insertion_order(
		names in Just(vec![
			CommonStrata::DEFAULTS,
			CommonStrata::UNDERRIDE,
			LOADED,
			CommonStrata::DEFINITION,
			CommonStrata::USER,
			CommonStrata::OVERRIDE,
		]).prop_shuffle(),
	) {
		let m = model();
		for name in &names {
			m.set_trait(name, "name", *name).unwrap();
			m.set_trait(name, "layers", json!([*name])).unwrap();
		}

		prop_assert_eq!(m.get_str("name"), Some(CommonStrata::OVERRIDE.to_string()));
		prop_assert_eq!(
			m.get_strings("layers"),
			["override", "user", "definition", LOADED, "underride", "defaults"]
		);
	}

	#[test]
	fn prop_set_trait_idempotent(value in "[a-z]{1,8}") {
		let m = model();
		m.set_trait(CommonStrata::USER, "name", value.as_str()).unwrap();
		let once = m.to_json();
		m.set_trait(CommonStrata::USER, "name", value.as_str()).unwrap();
		prop_assert_eq!(m.to_json(), once);
	}
}
