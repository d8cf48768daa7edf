//! Access classification of registry records.

use serde_json::{Map, Value};

pub const PUBLIC: &str = "public";
pub const NON_PUBLIC: &str = "non-public";

/// Derives the access type of a record from its aspects.
///
/// `access-control` wins over `esri-access-control`. A record restricted to an
/// organisational unit is non-public unless it is exempt from constraints.
pub fn access_type(aspects: Option<&Map<String, Value>>) -> String {
	let Some(aspects) = aspects else {
		return PUBLIC.to_string();
	};

	if let Some(control) = aspects.get("access-control").filter(|v| truthy(v)) {
		let restricted = control.get("orgUnitId").is_some_and(truthy);
		let exempt = control.get("constraintExemption").is_some_and(truthy);
		let access = if restricted && !exempt { NON_PUBLIC } else { PUBLIC };
		return access.to_string();
	}

	if let Some(control) = aspects.get("esri-access-control").filter(|v| truthy(v))
		&& let Some(access) = control.get("access").and_then(Value::as_str)
	{
		return access.to_string();
	}

	PUBLIC.to_string()
}

fn truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case(json!({}), "public")]
	#[case(json!({ "access-control": { "orgUnitId": "org" } }), "non-public")]
	#[case(json!({ "access-control": { "orgUnitId": "org", "constraintExemption": true } }), "public")]
	#[case(json!({ "access-control": { "ownerId": "me" } }), "public")]
	#[case(json!({ "esri-access-control": { "access": "private" } }), "private")]
	#[case(
		json!({ "access-control": { "orgUnitId": "org" }, "esri-access-control": { "access": "public" } }),
		"non-public"
	)]
	fn test_access_type(#[case] aspects: Value, #[case] expected: &str) {
		assert_eq!(access_type(aspects.as_object()), expected);
	}

	#[test]
	fn test_no_aspects_is_public() {
		assert_eq!(access_type(None), PUBLIC);
	}
}
