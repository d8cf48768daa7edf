use std::sync::Arc;

use cairn_resolve::client::test_helpers::MemoryRegistry;
use cairn_resolve::{
	FormatRule, MAGDA_REFERENCE, ReferenceStatus, RegistryConfig, RegistryRecord, Resolution, ResolveError, Resolver,
	ResolverSettings, standard_order, standard_types,
};
use cairn_strata::{Catalog, CommonStrata, CommonTraits, ModelId};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const REGISTRY: &str = "https://registry.example";

/// Records tag their type as `aspects.type.tag`.
fn settings() -> ResolverSettings {
	RegistryConfig::from_toml_str(
		r#"
base_url = "https://registry.example"
type_aspect = "type"
type_key = "tag"
"#,
	)
	.unwrap()
	.settings()
	.unwrap()
}

fn resolver(registry: Arc<MemoryRegistry>) -> Arc<Resolver> {
	let types = standard_types(standard_order().unwrap()).unwrap();
	Arc::new(Resolver::new(Arc::new(Catalog::new()), types, registry, settings()))
}

fn record(value: Value) -> RegistryRecord {
	RegistryRecord::from_value(&value).unwrap()
}

fn resolve(resolver: &Resolver, id: &str, value: Value) -> Result<Resolution, ResolveError> {
	resolver.resolve(&ModelId::new(id), Some(&record(value)), None, None)
}

#[test]
fn test_group_dereference() {
	let resolver = resolver(Arc::new(MemoryRegistry::new()));
	let resolution = resolve(
		&resolver,
		"root",
		json!({ "aspects": { "group": { "members": [{ "id": "x", "aspects": { "type": { "tag": "wms" } } }] } } }),
	)
	.unwrap();

	let group = resolution.model().unwrap();
	assert_eq!(group.type_tag(), "group");
	assert_eq!(group.get_strings(CommonTraits::MEMBERS), ["x"]);

	let x = resolver.catalog().get("x").unwrap();
	assert_eq!(x.type_tag(), "wms");
}

#[test]
fn test_partial_dereference() {
	let resolver = resolver(Arc::new(MemoryRegistry::new()));
	let resolution = resolve(&resolver, "root", json!({ "aspects": { "group": { "members": [{ "id": "x" }] } } })).unwrap();
	assert!(!resolution.is_resolved());
	assert!(resolver.catalog().is_empty());
}

#[test]
fn test_format_rule_tie_break() {
	let mut settings = settings();
	settings.format_rules = cairn_resolve::FormatRules::prepare(&[
		FormatRule::new("WMS", "^wms$", "wms"),
		FormatRule::new("CSV", "^csv$", "csv"),
	])
	.unwrap();
	let types = standard_types(standard_order().unwrap()).unwrap();
	let resolver = Resolver::new(Arc::new(Catalog::new()), types, Arc::new(MemoryRegistry::new()), settings);

	let dataset = json!({
		"id": "ds",
		"aspects": {
			"dcat-dataset-strings": {},
			"dataset-distributions": { "distributions": [
				{ "id": "c", "aspects": { "dcat-distribution-strings": { "format": "csv", "downloadURL": "https://x/a.csv" } } },
				{ "id": "w", "aspects": { "dcat-distribution-strings": { "format": "wms", "accessURL": "https://x/wms" } } }
			] }
		}
	});
	let model = resolve(&resolver, "ds", dataset).unwrap().model().cloned().unwrap();
	assert_eq!(model.type_tag(), "wms");
	assert_eq!(model.get_str(CommonTraits::URL).as_deref(), Some("https://x/wms"));
}

#[test]
fn test_resolution_is_deterministic() {
	let value = json!({
		"id": "g",
		"name": "Transport",
		"aspects": {
			"group": { "members": [
				{ "id": "roads", "name": "Roads", "aspects": { "type": { "tag": "wms", "definition": { "layers": "roads" } } } },
				{ "id": "rail", "aspects": {} }
			] },
			"access-control": { "orgUnitId": "unit" }
		}
	});
	let override_ = json!({ "isOpen": true });

	let exports: Vec<_> = (0..2)
		.map(|_| {
			let resolver = resolver(Arc::new(MemoryRegistry::new()));
			let model = resolver
				.resolve(&ModelId::new("g"), Some(&record(value.clone())), override_.as_object(), None)
				.unwrap()
				.model()
				.cloned()
				.unwrap();
			let roads = resolver.catalog().get("roads").unwrap().to_json();
			(model.to_json(), roads)
		})
		.collect();

	assert_eq!(exports[0], exports[1]);
	assert_eq!(exports[0].0.get("accessType"), Some(&json!("non-public")));
}

#[test]
fn test_unknown_type_is_fatal() {
	let resolver = resolver(Arc::new(MemoryRegistry::new()));
	let err = resolve(&resolver, "x", json!({ "id": "x", "aspects": { "type": { "tag": "hologram" } } })).unwrap_err();
	assert!(matches!(err, ResolveError::UnknownType { ref type_tag, .. } if type_tag == "hologram"));
}

#[test]
fn test_previous_target_reuse_keeps_identity_not_values() {
	let resolver = resolver(Arc::new(MemoryRegistry::new()));
	let value = json!({ "id": "x", "name": "X", "aspects": { "type": { "tag": "kml" } } });
	let fresh = resolve(&resolver, "x", value.clone()).unwrap().model().cloned().unwrap();

	let previous = resolve(&resolver, "x", value.clone()).unwrap().model().cloned().unwrap();
	previous.set_trait(CommonStrata::DEFINITION, CommonTraits::DESCRIPTION, "stale").unwrap();
	let reused = resolver
		.resolve(&ModelId::new("x"), Some(&record(value)), None, Some(&previous))
		.unwrap()
		.model()
		.cloned()
		.unwrap();

	assert!(Arc::ptr_eq(&previous, &reused));
	assert_eq!(reused.to_json(), fresh.to_json());
}

#[test]
fn test_cycle_through_shared_member_ids() {
	let resolver = resolver(Arc::new(MemoryRegistry::new()));
	let value = json!({
		"id": "a",
		"aspects": { "group": { "members": [{
			"id": "b",
			"aspects": { "group": { "members": [{ "id": "a", "aspects": { "group": { "members": [] } } }] } }
		}] } }
	});
	let a = resolve(&resolver, "a", value).unwrap().model().cloned().unwrap();

	assert_eq!(a.get_strings(CommonTraits::MEMBERS), ["b"]);
	let b = resolver.catalog().get("b").unwrap();
	assert_eq!(b.get_strings(CommonTraits::MEMBERS), ["a"]);
	assert_eq!(resolver.catalog().get("a").unwrap().type_tag(), MAGDA_REFERENCE);
}

#[tokio::test]
async fn test_child_reference_loads_its_own_record() {
	let registry = Arc::new(MemoryRegistry::new());
	registry.insert(
		"rail",
		record(json!({ "id": "rail", "name": "Rail", "aspects": { "type": { "tag": "geojson" } } })),
	);
	let resolver = resolver(registry.clone());
	resolve(
		&resolver,
		"root",
		json!({ "aspects": { "group": { "members": [{ "id": "rail", "name": "Rail", "aspects": {} }] } } }),
	)
	.unwrap();

	let reference = resolver.reference("rail").unwrap();
	assert_eq!(reference.status(), ReferenceStatus::Unresolved);

	let target = reference.load(&resolver).await.unwrap().unwrap();
	assert_eq!(target.type_tag(), "geojson");
	assert_eq!(target.get_str(CommonTraits::NAME).as_deref(), Some("Rail"));
	assert_eq!(reference.status(), ReferenceStatus::Resolved);

	let (base, query) = &registry.queries()[0];
	assert_eq!(base, REGISTRY);
	assert_eq!(query.optional_aspects[0], "type");
}

#[tokio::test]
async fn test_unresolved_and_failed_are_distinct() {
	let registry = Arc::new(MemoryRegistry::new());
	registry.insert("shallow", record(json!({ "id": "shallow", "aspects": { "group": { "members": ["deeper"] } } })));
	let resolver = resolver(registry.clone());
	resolve(
		&resolver,
		"root",
		json!({ "aspects": { "group": { "members": [
			{ "id": "shallow", "aspects": {} },
			{ "id": "missing", "aspects": {} }
		] } } }),
	)
	.unwrap();

	let shallow = resolver.reference("shallow").unwrap();
	assert!(shallow.load(&resolver).await.unwrap().is_none());
	assert_eq!(shallow.status(), ReferenceStatus::Unresolved);

	let missing = resolver.reference("missing").unwrap();
	assert!(missing.load(&resolver).await.is_err());
	assert_eq!(missing.status(), ReferenceStatus::Failed);
}

#[tokio::test]
async fn test_one_fetch_per_load() {
	let registry = Arc::new(MemoryRegistry::new());
	registry.insert(
		"g",
		record(json!({
			"id": "g",
			"aspects": { "group": { "members": [
				{ "id": "m1", "aspects": { "type": { "tag": "csv" } } },
				{ "id": "m2", "aspects": {} }
			] } }
		})),
	);
	let resolver = resolver(registry.clone());
	let model = resolver.types().create(MAGDA_REFERENCE, ModelId::new("g")).unwrap();
	model.set_trait(CommonStrata::DEFINITION, "recordId", "g").unwrap();
	resolver.catalog().upsert(Arc::new(model));

	let reference = resolver.reference("g").unwrap();
	let group = reference.load(&resolver).await.unwrap().unwrap();
	reference.load(&resolver).await.unwrap();

	assert_eq!(registry.calls(), 1);
	assert_eq!(group.get_strings(CommonTraits::MEMBERS), ["m1", "m2"]);
	assert_eq!(resolver.catalog().get("m1").unwrap().type_tag(), "csv");
	assert_eq!(resolver.reference("m2").unwrap().status(), ReferenceStatus::Unresolved);
}
