//! Turns registry records into catalog models.
//!
//! Resolution walks a record top-down. Each node becomes one of:
//!
//! - a group model, when the record has a fully dereferenced `group` facet,
//! - a model of the explicit type named by the type facet,
//! - a model picked by the first format rule matching one of its distributions,
//! - [`Resolution::Unresolved`] when the record is too shallow to decide.
//!
//! Unresolved group members become child references that fetch their own
//! record later. An unknown type tag aborts the attempt with
//! [`ResolveError::UnknownType`].

mod dataset;
mod group;

use std::fmt;
use std::sync::Arc;

use cairn_strata::{Catalog, CatalogTypes, CommonStrata, CommonTraits, Model, ModelError, ModelId, TypeRegistry};
use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;
use serde_json::{Map, Value};

use crate::access::access_type;
use crate::client::RegistryClient;
use crate::error::{ResolveError, Result};
use crate::formats::{FormatRule, FormatRules};
use crate::record::RegistryRecord;
use crate::reference::Reference;
use crate::types::REGISTRY_RECORD;


/// Outcome of one resolution attempt.
#[derive(Debug, Clone)]
pub enum Resolution {
	Resolved(Arc<Model>),
	/// The record lacks the data needed to decide; fetch a richer one.
	Unresolved,
}

impl Resolution {
	pub fn model(&self) -> Option<&Arc<Model>> {
		match self {
			Self::Resolved(model) => Some(model),
			Self::Unresolved => None,
		}
	}

	pub fn is_resolved(&self) -> bool {
		matches!(self, Self::Resolved(_))
	}
}

/// Knobs fixed for the lifetime of a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverSettings {
	/// Registry root for references that carry no url of their own.
	pub registry_url: Option<String>,
	pub type_aspect: String,
	pub type_key: String,
	pub format_rules: FormatRules,
}

impl Default for ResolverSettings {
	fn default() -> Self {
		Self {
			registry_url: None,
			type_aspect: "terria".to_string(),
			type_key: "type".to_string(),
			format_rules: FormatRules::prepare(&FormatRule::defaults()).expect("default format rules compile"),
		}
	}
}

/// Resolves records against a catalog.
pub struct Resolver {
	catalog: Arc<Catalog>,
	types: Arc<TypeRegistry>,
	client: Arc<dyn RegistryClient>,
	settings: ResolverSettings,
	references: Mutex<HashMap<ModelId, Arc<Reference>>>,
}

impl Resolver {
	pub fn new(catalog: Arc<Catalog>, types: Arc<TypeRegistry>, client: Arc<dyn RegistryClient>, settings: ResolverSettings) -> Self {
		Self {
			catalog,
			types,
			client,
			settings,
			references: Mutex::new(HashMap::default()),
		}
	}

	pub fn catalog(&self) -> &Arc<Catalog> {
		&self.catalog
	}

	pub fn types(&self) -> &Arc<TypeRegistry> {
		&self.types
	}

	pub fn client(&self) -> &Arc<dyn RegistryClient> {
		&self.client
	}

	pub fn settings(&self) -> &ResolverSettings {
		&self.settings
	}

	/// Resolves `record` into a model with id `id`.
	///
	/// `previous` is reused when its type matches, keeping its identity; the
	/// resulting trait values do not depend on it.
	pub fn resolve(
		&self,
		id: &ModelId,
		record: Option<&RegistryRecord>,
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		self.pass(&self.settings.format_rules, self.settings.registry_url.as_deref())
			.resolve(id, record, override_, previous)
	}

	/// The reference handle for a catalog model of the reference type.
	pub fn reference(&self, id: &str) -> Option<Arc<Reference>> {
		let model = self.catalog.get(id)?;
		Reference::is_reference(&model).then(|| self.reference_for(model))
	}

	/// Stores a resolved model, retiring any reference it replaces.
	pub(crate) fn publish(&self, model: Arc<Model>) {
		if let Some(replaced) = self.catalog.upsert(model.clone())
			&& !Arc::ptr_eq(&replaced, &model)
		{
			self.references.lock().remove(model.id());
		}
	}

	/// Returns the handle wrapping `model`, creating it on first use.
	pub(crate) fn reference_for(&self, model: Arc<Model>) -> Arc<Reference> {
		let mut references = self.references.lock();
		match references.get(model.id()) {
			Some(existing) if Arc::ptr_eq(existing.model(), &model) => existing.clone(),
			_ => {
				let reference = Arc::new(Reference::new(model.clone()));
				references.insert(model.id().clone(), reference.clone());
				reference
			}
		}
	}

	pub(crate) fn pass<'a>(&'a self, rules: &'a FormatRules, registry_url: Option<&'a str>) -> Pass<'a> {
		Pass {
			resolver: self,
			rules,
			registry_url,
			path: Vec::new(),
		}
	}
}

impl fmt::Debug for Resolver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolver")
			.field("settings", &self.settings)
			.field("catalog", &self.catalog.len())
			.finish_non_exhaustive()
	}
}

/// One top-down walk over a record tree.
pub(crate) struct Pass<'a> {
	resolver: &'a Resolver,
	rules: &'a FormatRules,
	registry_url: Option<&'a str>,
	/// Ids of the groups currently being resolved, outermost first.
	path: Vec<String>,
}

impl Pass<'_> {
	pub(crate) fn resolve(
		&mut self,
		id: &ModelId,
		record: Option<&RegistryRecord>,
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		let Some(record) = record else {
			return Ok(Resolution::Unresolved);
		};
		let Some(aspects) = record.aspects.as_ref() else {
			tracing::debug!(record = record.display_id(), "record has no aspects");
			return Ok(Resolution::Unresolved);
		};

		let resolution = self.resolve_aspects(id, record, aspects, override_, previous)?;
		if let Resolution::Resolved(model) = &resolution {
			self.apply_share_keys(model, aspects);
		}
		Ok(resolution)
	}

	fn resolve_aspects(
		&mut self,
		id: &ModelId,
		record: &RegistryRecord,
		aspects: &Map<String, Value>,
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		if let Some(members) = aspects
			.get(crate::record::Aspects::GROUP)
			.and_then(|g| g.get("members"))
			.and_then(Value::as_array)
		{
			if !members.iter().all(RegistryRecord::is_dereferenced) {
				tracing::debug!(record = record.display_id(), "group members not dereferenced");
				return Ok(Resolution::Unresolved);
			}
			return self.group(id, record, members, override_, previous);
		}

		if let Some(tag) = self.type_tag(aspects) {
			if tag == CatalogTypes::GROUP {
				// a group without its member list
				return Ok(Resolution::Unresolved);
			}
			return self.typed(id, record, tag, override_, previous);
		}

		self.dataset(id, record, override_, previous)
	}

	/// A model of the type named by the type facet.
	fn typed(
		&mut self,
		id: &ModelId,
		record: &RegistryRecord,
		tag: &str,
		override_: Option<&Map<String, Value>>,
		previous: Option<&Arc<Model>>,
	) -> Result<Resolution> {
		let model = self.target(id, tag, record, previous)?;
		if let Some(name) = &record.name {
			model.set_trait(REGISTRY_RECORD, CommonTraits::NAME, name.as_str())?;
		}
		self.apply_access_type(&model, record);
		self.apply_type_facet(&model, record);
		self.apply_override(&model, override_, false);
		Ok(Resolution::Resolved(model))
	}

	fn type_facet<'r>(&self, aspects: &'r Map<String, Value>) -> Option<&'r Map<String, Value>> {
		aspects.get(&self.resolver.settings.type_aspect)?.as_object()
	}

	fn type_tag<'r>(&self, aspects: &'r Map<String, Value>) -> Option<&'r str> {
		self.type_facet(aspects)?
			.get(&self.resolver.settings.type_key)?
			.as_str()
	}

	/// Reuses `previous` if it has type `tag`, otherwise creates a new model.
	///
	/// A reused model keeps only the strata resolution never writes, so the
	/// result is the same as for a fresh model.
	fn target(&self, id: &ModelId, tag: &str, record: &RegistryRecord, previous: Option<&Arc<Model>>) -> Result<Arc<Model>> {
		if let Some(previous) = previous
			&& previous.type_tag() == tag
		{
			previous.retain_strata(|name| name == CommonStrata::DEFAULTS || name == CommonStrata::USER);
			tracing::debug!(model = %previous.id(), type_tag = tag, "reusing previous target");
			return Ok(previous.clone());
		}

		let model = self.resolver.types.create(tag, id.clone()).ok_or_else(|| ResolveError::UnknownType {
			type_tag: tag.to_string(),
			record: record.display_id().to_string(),
		})?;
		Ok(Arc::new(model))
	}

	/// Installs each object-valued key of the type facet into the stratum of
	/// the same name.
	fn apply_type_facet(&self, model: &Model, record: &RegistryRecord) {
		let Some(facet) = record.aspects.as_ref().and_then(|a| self.type_facet(a)) else {
			return;
		};
		let type_key = self.resolver.settings.type_key.as_str();

		for (key, value) in facet {
			if key == "id" || key == type_key || key == CommonTraits::SHARE_KEYS {
				continue;
			}
			let Some(stratum) = value.as_object() else {
				continue;
			};
			if let Err(err) = model.update_from_json(key, stratum, true) {
				tracing::warn!(model = %model.id(), stratum = %key, error = %err, "failed to apply registry stratum");
				if let Err(err) = model.set_trait(CommonStrata::UNDERRIDE, CommonTraits::IS_EXPERIENCING_ISSUES, true) {
					tracing::debug!(model = %model.id(), error = %err, "cannot flag issues");
				}
			}
		}
	}

	/// Applies the caller override into the `override` stratum. With
	/// `strip_members`, a `members` array of objects is dropped: those are
	/// per-member overrides consumed while resolving the members.
	fn apply_override(&self, model: &Model, override_: Option<&Map<String, Value>>, strip_members: bool) {
		let Some(override_) = override_ else {
			return;
		};
		let mut values = override_.clone();
		if strip_members
			&& let Some(Value::Array(members)) = values.get(CommonTraits::MEMBERS)
			&& members.iter().any(Value::is_object)
		{
			values.remove(CommonTraits::MEMBERS);
		}
		if let Err(err) = model.update_from_json(CommonStrata::OVERRIDE, &values, true) {
			tracing::warn!(model = %model.id(), error = %err, "override partially applied");
		}
	}

	fn apply_share_keys(&self, model: &Model, aspects: &Map<String, Value>) {
		let Some(keys) = self
			.type_facet(aspects)
			.and_then(|facet| facet.get(CommonTraits::SHARE_KEYS))
			.and_then(Value::as_array)
		else {
			return;
		};
		for key in keys.iter().filter_map(Value::as_str) {
			self.resolver.catalog.add_share_key(model.id(), key);
		}
	}

	fn apply_access_type(&self, model: &Model, record: &RegistryRecord) {
		let access = access_type(record.aspects.as_ref());
		set_if_declared(model, REGISTRY_RECORD, CommonTraits::ACCESS_TYPE, Value::String(access));
	}
}

/// Sets a trait the model's type may not declare; undeclared traits are skipped.
fn set_if_declared(model: &Model, stratum: &str, trait_id: &str, value: Value) {
	if !model.traits().contains(trait_id) {
		return;
	}
	if let Err(err) = model.set_trait(stratum, trait_id, value) {
		log_model_error(model, &err);
	}
}

fn log_model_error(model: &Model, err: &ModelError) {
	tracing::warn!(model = %model.id(), error = %err, "failed to set registry value");
}
