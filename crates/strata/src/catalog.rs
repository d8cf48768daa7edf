//! Store of every live model, keyed by id.
//!
//! Share keys are alternate ids recorded for models whose id changed between
//! catalog revisions; [`Catalog::resolve_share_key`] maps them back.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;

use crate::model::{Model, ModelId};

#[derive(Debug, Default)]
struct Entries {
	models: HashMap<ModelId, Arc<Model>>,
	share_keys: HashMap<Box<str>, ModelId>,
}

/// Thread-safe model store.
#[derive(Debug, Default)]
pub struct Catalog {
	entries: RwLock<Entries>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, id: &str) -> Option<Arc<Model>> {
		self.entries.read().models.get(id).cloned()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.entries.read().models.contains_key(id)
	}

	/// Adds `model` unless one with the same id exists; returns the stored model.
	pub fn add(&self, model: Arc<Model>) -> Arc<Model> {
		let mut entries = self.entries.write();
		entries
			.models
			.entry(model.id().clone())
			.or_insert(model)
			.clone()
	}

	/// Stores `model`, replacing any model with the same id.
	pub fn upsert(&self, model: Arc<Model>) -> Option<Arc<Model>> {
		self.entries.write().models.insert(model.id().clone(), model)
	}

	pub fn remove(&self, id: &str) -> Option<Arc<Model>> {
		let mut entries = self.entries.write();
		let removed = entries.models.remove(id)?;
		entries.share_keys.retain(|_, target| target.as_str() != id);
		Some(removed)
	}

	/// Records `key` as an alias of `id`. An existing alias is left unchanged.
	pub fn add_share_key(&self, id: &ModelId, key: &str) {
		let mut entries = self.entries.write();
		if entries.models.contains_key(key) {
			return;
		}
		entries
			.share_keys
			.entry(Box::from(key))
			.or_insert_with(|| id.clone());
	}

	/// Maps an id or share key to the current model id.
	pub fn resolve_share_key(&self, key: &str) -> Option<ModelId> {
		let entries = self.entries.read();
		if let Some((id, _)) = entries.models.get_key_value(key) {
			return Some(id.clone());
		}
		entries.share_keys.get(key).cloned()
	}

	/// All model ids, sorted.
	pub fn ids(&self) -> Vec<ModelId> {
		let mut ids: Vec<ModelId> = self.entries.read().models.keys().cloned().collect();
		ids.sort();
		ids
	}

	pub fn len(&self) -> usize {
		self.entries.read().models.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().models.is_empty()
	}
}
