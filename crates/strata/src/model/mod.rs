//! Entity instances: a stable id plus a set of strata.
//!
//! A [`Model`] never mutates a stratum in place. Every write builds a new
//! strata snapshot and swaps it in with a compare-and-swap, so a concurrent
//! [`flatten`](Model::flatten) sees either the old or the new stratum, never a
//! partially updated one.

mod flatten;
mod json;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;
use serde_json::Value;

use crate::error::ModelError;
use crate::order::StratumOrder;
use crate::stratum::Stratum;
use crate::traits::{TraitDef, TraitSet, json_type_name};

#[cfg(test)]
mod tests;

/// Stable identity of a model, unchanged by strata mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Arc<str>);

impl ModelId {
	pub fn new(id: &str) -> Self {
		Self(Arc::from(id))
	}

	/// A fresh random id for models created without one.
	pub fn generate() -> Self {
		Self::new(&uuid::Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ModelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for ModelId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ModelId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for ModelId {
	fn from(id: String) -> Self {
		Self(Arc::from(id))
	}
}

#[derive(Debug, Clone, Default)]
struct Strata {
	revision: u64,
	by_name: HashMap<Box<str>, Arc<Stratum>>,
}

/// An entity instance.
pub struct Model {
	id: ModelId,
	type_tag: Box<str>,
	traits: Arc<TraitSet>,
	order: Arc<StratumOrder>,
	strata: ArcSwap<Strata>,
	/// Flattened values keyed by trait id, valid for the recorded revision.
	cache: Mutex<HashMap<Box<str>, (u64, Option<Value>)>>,
}

impl Model {
	/// Creates a model with no strata.
	///
	/// Usually called through [`TypeRegistry::create`](crate::TypeRegistry::create),
	/// which also installs the type's defaults.
	pub fn new(id: ModelId, type_tag: &str, traits: Arc<TraitSet>, order: Arc<StratumOrder>) -> Self {
		Self {
			id,
			type_tag: Box::from(type_tag),
			traits,
			order,
			strata: ArcSwap::from_pointee(Strata::default()),
			cache: Mutex::new(HashMap::default()),
		}
	}

	pub fn id(&self) -> &ModelId {
		&self.id
	}

	pub fn type_tag(&self) -> &str {
		&self.type_tag
	}

	pub fn traits(&self) -> &Arc<TraitSet> {
		&self.traits
	}

	pub fn order(&self) -> &Arc<StratumOrder> {
		&self.order
	}

	/// Monotonic counter bumped by every strata swap.
	pub fn revision(&self) -> u64 {
		self.strata.load().revision
	}

	/// Returns the combined value of `trait_id` across all strata.
	///
	/// Pure over the strata at the time of the call; never fails. Results are
	/// memoized until the next strata swap.
	pub fn flatten(&self, trait_id: &str) -> Option<Value> {
		let snap = self.strata.load_full();
		if let Some((revision, value)) = self.cache.lock().get(trait_id)
			&& *revision == snap.revision
		{
			return value.clone();
		}

		let top_to_bottom = self.sorted(&snap);
		let value = flatten::flatten(self.traits.get(trait_id), trait_id, &top_to_bottom);
		self.cache
			.lock()
			.insert(Box::from(trait_id), (snap.revision, value.clone()));
		value
	}

	pub fn get_str(&self, trait_id: &str) -> Option<String> {
		match self.flatten(trait_id)? {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn get_bool(&self, trait_id: &str) -> Option<bool> {
		self.flatten(trait_id)?.as_bool()
	}

	/// Returns the string items of an array trait; non-string items are skipped.
	pub fn get_strings(&self, trait_id: &str) -> Vec<String> {
		match self.flatten(trait_id) {
			Some(Value::Array(items)) => items
				.into_iter()
				.filter_map(|v| match v {
					Value::String(s) => Some(s),
					_ => None,
				})
				.collect(),
			_ => Vec::new(),
		}
	}

	/// Returns the raw value of `trait_id` in a single stratum.
	pub fn get_trait(&self, stratum: &str, trait_id: &str) -> Option<Value> {
		self.strata.load().by_name.get(stratum)?.get(trait_id)
	}

	pub fn stratum(&self, name: &str) -> Option<Arc<Stratum>> {
		self.strata.load().by_name.get(name).cloned()
	}

	/// Names of the installed strata, highest priority first.
	pub fn strata_top_to_bottom(&self) -> Vec<Box<str>> {
		let snap = self.strata.load_full();
		self.sorted(&snap).iter().map(|s| Box::from(s.name())).collect()
	}

	/// Installs or replaces a whole stratum.
	pub fn set_stratum(&self, stratum: Stratum) -> Result<(), ModelError> {
		self.install(Arc::new(stratum))
	}

	/// Installs or replaces a shared stratum.
	pub fn install(&self, stratum: Arc<Stratum>) -> Result<(), ModelError> {
		self.check_stratum(stratum.name())?;
		self.swap(|strata| {
			strata
				.by_name
				.insert(Box::from(stratum.name()), stratum.clone());
		});
		Ok(())
	}

	/// Removes a stratum, returning it.
	pub fn remove_stratum(&self, name: &str) -> Option<Arc<Stratum>> {
		let existing = self.stratum(name)?;
		self.swap(|strata| {
			strata.by_name.remove(name);
		});
		Some(existing)
	}

	/// Drops every stratum for which `keep` returns `false`.
	pub fn retain_strata(&self, mut keep: impl FnMut(&str) -> bool) {
		let snap = self.strata.load();
		if snap.by_name.keys().all(|name| keep(name)) {
			return;
		}
		let doomed: Vec<Box<str>> = snap
			.by_name
			.keys()
			.filter(|name| !keep(name))
			.cloned()
			.collect();
		self.swap(|strata| {
			for name in &doomed {
				strata.by_name.remove(name);
			}
		});
	}

	/// Sets one trait in one stratum, creating the stratum if needed.
	///
	/// The stratum is copied, modified and swapped in as a whole.
	pub fn set_trait(&self, stratum: &str, trait_id: &str, value: impl Into<Value>) -> Result<(), ModelError> {
		self.check_stratum(stratum)?;
		let value = value.into();
		self.check_value(self.declared(trait_id)?, &value)?;
		self.swap(|strata| {
			let mut next = strata
				.by_name
				.get(stratum)
				.map(|s| (**s).clone())
				.unwrap_or_else(|| Stratum::new(stratum));
			next.set(trait_id, value.clone());
			strata.by_name.insert(Box::from(stratum), Arc::new(next));
		});
		Ok(())
	}

	/// Removes one trait from one stratum.
	pub fn clear_trait(&self, stratum: &str, trait_id: &str) {
		if self.get_trait(stratum, trait_id).is_none() {
			return;
		}
		self.swap(|strata| {
			if let Some(existing) = strata.by_name.get(stratum) {
				let mut next = (**existing).clone();
				next.remove(trait_id);
				strata.by_name.insert(Box::from(stratum), Arc::new(next));
			}
		});
	}

	fn swap(&self, mut edit: impl FnMut(&mut Strata)) {
		loop {
			let cur = self.strata.load_full();
			let mut next = (*cur).clone();
			edit(&mut next);
			next.revision = cur.revision + 1;
			let prev = self.strata.compare_and_swap(&cur, Arc::new(next));
			if Arc::ptr_eq(&prev, &cur) {
				return;
			}
		}
	}

	fn sorted(&self, snap: &Strata) -> Vec<Arc<Stratum>> {
		let mut strata: Vec<Arc<Stratum>> = snap.by_name.values().cloned().collect();
		strata.sort_by(|a, b| self.order.compare(b.name(), a.name()));
		strata
	}

	fn check_stratum(&self, name: &str) -> Result<(), ModelError> {
		if self.order.contains(name) {
			Ok(())
		} else {
			Err(ModelError::UnknownStratum {
				model: self.id.to_string(),
				stratum: name.to_string(),
			})
		}
	}

	fn declared(&self, trait_id: &str) -> Result<&TraitDef, ModelError> {
		self.traits.get(trait_id).ok_or_else(|| ModelError::UnknownTrait {
			model: self.id.to_string(),
			type_tag: self.type_tag.to_string(),
			trait_id: trait_id.to_string(),
		})
	}

	fn check_value(&self, def: &TraitDef, value: &Value) -> Result<(), ModelError> {
		if def.kind.accepts(value) {
			Ok(())
		} else {
			Err(ModelError::InvalidValue {
				model: self.id.to_string(),
				trait_id: def.id.to_string(),
				expected: def.kind.name(),
				got: json_type_name(value),
			})
		}
	}
}

impl fmt::Debug for Model {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Model")
			.field("id", &self.id)
			.field("type_tag", &self.type_tag)
			.field("strata", &self.strata_top_to_bottom())
			.finish()
	}
}
