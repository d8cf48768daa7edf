use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_common_order_top_to_bottom() {
	let mut builder = StratumOrderBuilder::common();
	builder.add_load("wms-capabilities").unwrap();
	builder.add_default("magda-record").unwrap();
	let order = builder.build();

	let names: Vec<&str> = order.priority_order().iter().map(|n| &**n).collect();
	assert_eq!(
		names,
		[
			"override",
			"user",
			"definition",
			"wms-capabilities",
			"underride",
			"magda-record",
			"defaults"
		]
	);
}

#[test]
fn test_reregister_same_band_is_noop() {
	let mut builder = StratumOrderBuilder::common();
	builder.add_load("a").unwrap();
	builder.add_load("b").unwrap();
	builder.add_load("a").unwrap();
	let order = builder.build();

	// "a" keeps its original slot below "b"
	assert_eq!(order.compare("b", "a"), Ordering::Greater);
}

#[test]
fn test_reregister_other_band_rejected() {
	let mut builder = StratumOrderBuilder::common();
	let err = builder.add_default(CommonStrata::USER).unwrap_err();
	assert_eq!(
		err,
		OrderError::DuplicateStratum {
			name: "user".to_string(),
			existing: StratumBand::User,
			requested: StratumBand::Default,
		}
	);
}

#[test]
fn test_sort_top_to_bottom() {
	let order = StratumOrder::common();
	let mut names = vec!["defaults", "override", "definition", "underride", "user"];
	order.sort_top_to_bottom(&mut names);
	assert_eq!(names, ["override", "user", "definition", "underride", "defaults"]);
}

#[test]
fn test_unregistered_sorts_below_everything() {
	let order = StratumOrder::common();
	assert!(!order.contains("nope"));
	assert_eq!(order.compare("nope", CommonStrata::DEFAULTS), Ordering::Less);
}
