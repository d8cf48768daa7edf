use std::sync::Arc;

use cairn_strata::{CatalogTypes, CommonStrata, CommonTraits, Model, ModelId, Stratum};
use serde_json::{Map, Value};

use super::{Pass, Resolution};
use crate::error::{ResolveError, Result};
use crate::record::{Aspects, RegistryRecord};
use crate::types::{MAGDA_REFERENCE, REGISTRY_RECORD, ReferenceTraits};

impl Pass<'_> {
	/// Builds a group from a record whose members are all dereferenced.
	///
	/// Members resolve recursively. Those that cannot, or that would close a
	/// cycle through the groups being resolved, become child references.
	pub(super) fn group(
		&mut self,
		id: &ModelId,
		record: &RegistryRecord,
		members: &[Value],
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		let tag = record
			.aspects
			.as_ref()
			.and_then(|a| self.type_tag(a))
			.unwrap_or(CatalogTypes::GROUP);
		let model = self.target(id, tag, record, previous)?;

		self.path.push(id.to_string());
		let member_ids = self.members(members, override_);
		self.path.pop();
		let member_ids = member_ids?;

		let mut registry = Stratum::new(REGISTRY_RECORD).with(CommonTraits::MEMBERS, member_ids);
		if let Some(name) = &record.name {
			registry = registry.with(CommonTraits::NAME, name.as_str());
		}
		model.set_stratum(registry)?;

		self.apply_access_type(&model, record);
		self.apply_type_facet(&model, record);
		self.apply_override(&model, override_, true);
		Ok(Resolution::Resolved(model))
	}

	/// Resolves each member into the catalog and returns their ids in order.
	fn members(&mut self, members: &[Value], override_: Option<&Map<String, Value>>) -> Result<Vec<String>> {
		let mut ids = Vec::with_capacity(members.len());
		for member in members {
			let Some(record) = RegistryRecord::from_value(member) else {
				continue;
			};
			let Some(member_id) = record.id.clone() else {
				tracing::warn!("group member without an id, skipping");
				continue;
			};
			let member_override = member_override(override_, &member_id);
			let model = self.member(&member_id, &record, member_override)?;
			tracing::trace!(member = %member_id, type_tag = model.type_tag(), "resolved group member");
			ids.push(member_id);
		}
		Ok(ids)
	}

	fn member(&mut self, member_id: &str, record: &RegistryRecord, override_: Option<&Map<String, Value>>) -> Result<Arc<Model>> {
		if self.path.iter().any(|id| id == member_id) {
			// the entry may be the reference being loaded right now; leave it alone
			if let Some(existing) = self.resolver.catalog.get(member_id) {
				tracing::warn!(member = member_id, "cyclic group membership, keeping the registered model");
				return Ok(existing);
			}
			tracing::warn!(member = member_id, "cyclic group membership, deferring to a reference");
			return self.reference_member(member_id, record, override_);
		}

		let id = ModelId::new(member_id);
		let previous = self.resolver.catalog.get(member_id);
		match self.resolve(&id, Some(record), override_, previous.as_ref()) {
			Ok(Resolution::Resolved(model)) => {
				self.resolver.publish(model.clone());
				Ok(model)
			}
			Ok(Resolution::Unresolved) => self.reference_member(member_id, record, override_),
			Err(ResolveError::UnknownType { type_tag, .. }) => {
				tracing::warn!(member = member_id, %type_tag, "unknown member type, deferring to a reference");
				self.reference_member(member_id, record, override_)
			}
			Err(err) => Err(err),
		}
	}

	/// Stores a reference for a member resolved later, from its own record.
	fn reference_member(&self, member_id: &str, record: &RegistryRecord, override_: Option<&Map<String, Value>>) -> Result<Arc<Model>> {
		let catalog = &self.resolver.catalog;
		let model = match catalog.get(member_id) {
			Some(existing) if existing.type_tag() == MAGDA_REFERENCE => existing,
			_ => {
				let created = self
					.resolver
					.types
					.create(MAGDA_REFERENCE, ModelId::new(member_id))
					.ok_or_else(|| ResolveError::UnknownType {
						type_tag: MAGDA_REFERENCE.to_string(),
						record: member_id.to_string(),
					})?;
				Arc::new(created)
			}
		};

		let mut definition = Stratum::new(CommonStrata::DEFINITION).with(ReferenceTraits::RECORD_ID, member_id);
		if let Some(url) = self.registry_url {
			definition = definition.with(CommonTraits::URL, url);
		}
		if record.aspect(Aspects::GROUP).is_some() {
			definition = definition.with(CommonTraits::IS_GROUP, true);
		} else {
			definition = definition
				.with(CommonTraits::IS_MAPPABLE, true)
				.with(CommonTraits::IS_CHARTABLE, true);
		}
		if let Some(name) = self.member_name(record) {
			definition = definition.with(CommonTraits::NAME, name);
		}
		if let Some(override_) = override_ {
			definition = definition.with(ReferenceTraits::OVERRIDE, Value::Object(override_.clone()));
		}
		model.set_stratum(definition)?;

		catalog.upsert(model.clone());
		self.resolver.reference_for(model.clone());
		Ok(model)
	}

	/// `definition.name` of the type facet, else the record name.
	fn member_name<'r>(&self, record: &'r RegistryRecord) -> Option<&'r str> {
		record
			.aspects
			.as_ref()
			.and_then(|a| self.type_facet(a))
			.and_then(|facet| facet.get(CommonStrata::DEFINITION))
			.and_then(|definition| definition.get(CommonTraits::NAME))
			.and_then(Value::as_str)
			.or(record.name.as_deref())
	}
}

/// The entry of `override.members` whose `id` is `member_id`.
fn member_override<'o>(override_: Option<&'o Map<String, Value>>, member_id: &str) -> Option<&'o Map<String, Value>> {
	override_?
		.get(CommonTraits::MEMBERS)?
		.as_array()?
		.iter()
		.filter_map(Value::as_object)
		.find(|member| member.get("id").and_then(Value::as_str) == Some(member_id))
}
