//! Registry records.
//!
//! A record is `{ id, name?, aspects }`, where each aspect is a named facet
//! payload. Records nested inside `group.members` or
//! `dataset-distributions.distributions` are either dereferenced (full records
//! carrying their own aspects) or bare ids on the dereference frontier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aspect names the resolver reads.
pub struct Aspects;

impl Aspects {
	pub const GROUP: &'static str = "group";
	pub const DCAT_DATASET: &'static str = "dcat-dataset-strings";
	pub const DCAT_DISTRIBUTION: &'static str = "dcat-distribution-strings";
	pub const DATASET_DISTRIBUTIONS: &'static str = "dataset-distributions";
	pub const DATASET_FORMAT: &'static str = "dataset-format";
	pub const ACCESS_CONTROL: &'static str = "access-control";
	pub const ESRI_ACCESS_CONTROL: &'static str = "esri-access-control";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistryRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aspects: Option<Map<String, Value>>,
}

impl RegistryRecord {
	/// Reads a record leniently: fields of the wrong JSON type count as absent.
	/// Returns `None` if `value` is not an object.
	pub fn from_value(value: &Value) -> Option<Self> {
		let object = value.as_object()?;
		Some(Self {
			id: object.get("id").and_then(Value::as_str).map(str::to_string),
			name: object.get("name").and_then(Value::as_str).map(str::to_string),
			aspects: object.get("aspects").and_then(Value::as_object).cloned(),
		})
	}

	/// Returns `true` if `value` is a full record rather than a bare id.
	pub fn is_dereferenced(value: &Value) -> bool {
		value.get("aspects").is_some_and(Value::is_object)
	}

	pub fn aspect(&self, name: &str) -> Option<&Value> {
		self.aspects.as_ref()?.get(name)
	}

	pub fn aspect_object(&self, name: &str) -> Option<&Map<String, Value>> {
		self.aspect(name)?.as_object()
	}

	/// Replaces or adds every aspect of `overrides`.
	pub fn override_aspects(&mut self, overrides: &Map<String, Value>) {
		let aspects = self.aspects.get_or_insert_with(Map::new);
		for (key, value) in overrides {
			aspects.insert(key.clone(), value.clone());
		}
	}

	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}

	pub fn display_id(&self) -> &str {
		self.id.as_deref().unwrap_or("<anonymous>")
	}
}
