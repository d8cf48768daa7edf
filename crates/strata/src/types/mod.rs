//! Catalog entry types: a tag, its traits and its built-in defaults.
//!
//! Types are registered once through a [`TypeRegistryBuilder`], which rejects
//! duplicate tags and validates defaults, and are read-only afterwards.

pub mod builtins;

use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use serde_json::{Map, Value};

use crate::common::CommonStrata;
use crate::error::TypeError;
use crate::model::{Model, ModelId};
use crate::order::StratumOrder;
use crate::traits::TraitSet;


/// Declaration of one catalog entry type.
#[derive(Debug, Clone)]
pub struct TypeDef {
	pub tag: Box<str>,
	pub traits: Arc<TraitSet>,
	/// Installed into the [`CommonStrata::DEFAULTS`] stratum of every new instance.
	pub defaults: Map<String, Value>,
}

impl TypeDef {
	pub fn new(tag: &str, traits: Arc<TraitSet>) -> Self {
		Self {
			tag: Box::from(tag),
			traits,
			defaults: Map::new(),
		}
	}

	pub fn with_default(mut self, trait_id: &str, value: impl Into<Value>) -> Self {
		self.defaults.insert(trait_id.to_string(), value.into());
		self
	}
}

/// Collects type declarations.
#[derive(Debug)]
pub struct TypeRegistryBuilder {
	order: Arc<StratumOrder>,
	types: HashMap<Box<str>, TypeDef>,
}

impl TypeRegistryBuilder {
	pub fn new(order: Arc<StratumOrder>) -> Self {
		Self {
			order,
			types: HashMap::default(),
		}
	}

	/// Registers a type, rejecting duplicate tags and defaults that do not fit
	/// the type's traits.
	pub fn register(&mut self, def: TypeDef) -> Result<&mut Self, TypeError> {
		if self.types.contains_key(&def.tag) {
			return Err(TypeError::DuplicateType { tag: def.tag.to_string() });
		}

		let probe = Model::new(ModelId::new("probe"), &def.tag, def.traits.clone(), self.order.clone());
		probe
			.update_from_json(CommonStrata::DEFAULTS, &def.defaults, true)
			.map_err(|source| TypeError::InvalidDefaults {
				tag: def.tag.to_string(),
				source,
			})?;

		self.types.insert(def.tag.clone(), def);
		Ok(self)
	}

	pub fn register_all(&mut self, defs: impl IntoIterator<Item = TypeDef>) -> Result<&mut Self, TypeError> {
		for def in defs {
			self.register(def)?;
		}
		Ok(self)
	}

	pub fn build(self) -> TypeRegistry {
		TypeRegistry {
			order: self.order,
			types: self.types,
		}
	}
}

/// Constructs models by type tag.
#[derive(Debug)]
pub struct TypeRegistry {
	order: Arc<StratumOrder>,
	types: HashMap<Box<str>, TypeDef>,
}

impl TypeRegistry {
	pub fn builder(order: Arc<StratumOrder>) -> TypeRegistryBuilder {
		TypeRegistryBuilder::new(order)
	}

	pub fn order(&self) -> &Arc<StratumOrder> {
		&self.order
	}

	pub fn get(&self, tag: &str) -> Option<&TypeDef> {
		self.types.get(tag)
	}

	pub fn contains(&self, tag: &str) -> bool {
		self.types.contains_key(tag)
	}

	/// Registered tags, sorted.
	pub fn tags(&self) -> Vec<&str> {
		let mut tags: Vec<&str> = self.types.keys().map(|t| &**t).collect();
		tags.sort_unstable();
		tags
	}

	/// Creates a model of type `tag` with its defaults installed, or `None` if
	/// the tag is unknown.
	pub fn create(&self, tag: &str, id: ModelId) -> Option<Model> {
		let def = self.types.get(tag)?;
		let model = Model::new(id, &def.tag, def.traits.clone(), self.order.clone());
		if !def.defaults.is_empty() {
			// Validated at registration.
			let _ = model.update_from_json(CommonStrata::DEFAULTS, &def.defaults, true);
		}
		Some(model)
	}
}
