use std::sync::Arc;

use cairn_strata::{CommonStrata, CommonTraits, Model, ModelId};
use serde_json::{Map, Value, json};

use super::{Pass, Resolution};
use crate::error::Result;
use crate::formats::distribution_url;
use crate::record::{Aspects, RegistryRecord};

impl Pass<'_> {
	/// Picks a catalog type for a dataset or distribution record by matching
	/// its distributions against the format rules.
	pub(super) fn dataset(
		&mut self,
		id: &ModelId,
		record: &RegistryRecord,
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		let own = record.to_value();
		let mut candidates: Vec<&Value> = Vec::new();

		if record.aspect(Aspects::DCAT_DATASET).is_some() {
			let Some(distributions) = record
				.aspect(Aspects::DATASET_DISTRIBUTIONS)
				.and_then(|d| d.get("distributions"))
				.and_then(Value::as_array)
			else {
				tracing::debug!(record = record.display_id(), "dataset without distributions");
				return Ok(Resolution::Unresolved);
			};
			if !distributions.iter().all(RegistryRecord::is_dereferenced) {
				tracing::debug!(record = record.display_id(), "distributions not dereferenced");
				return Ok(Resolution::Unresolved);
			}
			candidates.extend(distributions);
		}
		if record.aspect(Aspects::DCAT_DISTRIBUTION).is_some() {
			candidates.push(&own);
		}
		if candidates.is_empty() {
			return Ok(Resolution::Unresolved);
		}

		let Some((rule, distribution)) = self.rules.find_match(&candidates) else {
			tracing::debug!(record = record.display_id(), "no format rule matched");
			return Ok(Resolution::Unresolved);
		};
		tracing::debug!(record = record.display_id(), rule = %rule.id, type_tag = %rule.type_tag, "format rule matched");

		let model = self.target(id, &rule.type_tag, record, previous)?;

		let underride = underride_values(record, distribution);
		if let Err(err) = model.update_from_json(CommonStrata::UNDERRIDE, &underride, true) {
			tracing::warn!(model = %model.id(), error = %err, "dataset values partially applied");
		}
		let definition: Map<String, Value> = rule.fields().map(|(k, v)| (k.clone(), v.clone())).collect();
		if !definition.is_empty()
			&& let Err(err) = model.update_from_json(CommonStrata::DEFINITION, &definition, true)
		{
			tracing::warn!(model = %model.id(), rule = %rule.id, error = %err, "format rule values partially applied");
		}

		self.apply_access_type(&model, record);
		self.apply_type_facet(&model, record);
		self.apply_override(&model, override_, false);
		Ok(Resolution::Resolved(model))
	}
}

/// Name, url, description and info derived from the dataset and the matched
/// distribution.
fn underride_values(record: &RegistryRecord, distribution: &Value) -> Map<String, Value> {
	let dcat = distribution
		.get("aspects")
		.and_then(|a| a.get(Aspects::DCAT_DISTRIBUTION))
		.and_then(Value::as_object);
	let dataset_description = record
		.aspect(Aspects::DCAT_DATASET)
		.and_then(|d| d.get("description"))
		.and_then(Value::as_str);
	let distribution_description = dcat.and_then(|d| d.get("description")).and_then(Value::as_str);

	let mut values = Map::new();
	if let Some(name) = &record.name {
		values.insert(CommonTraits::NAME.to_string(), json!(name));
	}
	if let Some(url) = distribution_url(dcat) {
		values.insert(CommonTraits::URL.to_string(), json!(url));
	}
	if let Some(description) = dataset_description.or(distribution_description) {
		values.insert(CommonTraits::DESCRIPTION.to_string(), json!(description));
	}

	let mut info = Vec::new();
	if let Some(content) = dataset_description {
		info.push(json!({ "name": "Dataset Description", "content": content }));
	}
	if let Some(content) = distribution_description {
		info.push(json!({ "name": "Distribution Description", "content": content }));
	}
	if !info.is_empty() {
		values.insert(CommonTraits::INFO.to_string(), Value::Array(info));
	}
	values
}
