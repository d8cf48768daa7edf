//! A named bag of raw trait values.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use serde_json::{Map, Value};

/// Trait values computed on demand from some shared source.
///
/// Used by loaders that fetch one payload and project each trait out of it
/// lazily, so reading a trait never re-parses the payload.
pub trait DerivedValues: Send + Sync + fmt::Debug {
	/// Returns the value of `trait_id`, or `None` if this source does not define it.
	fn get(&self, trait_id: &str) -> Option<Value>;

	/// Returns every trait id this source may define.
	fn trait_ids(&self) -> Vec<Box<str>>;
}

#[derive(Clone)]
enum Values {
	Owned(HashMap<Box<str>, Value>),
	Derived(Arc<dyn DerivedValues>),
}

/// A named layer of raw trait values contributing to a [`Model`](crate::Model).
///
/// Strata are immutable once installed on a model; a model swaps a whole
/// stratum at a time. `Value::Null` is treated as "not defined".
#[derive(Clone)]
pub struct Stratum {
	name: Box<str>,
	values: Values,
}

impl Stratum {
	/// Creates an empty stratum.
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self {
			name: name.into(),
			values: Values::Owned(HashMap::default()),
		}
	}

	/// Creates a stratum whose values are computed by `values`.
	pub fn derived(name: impl Into<Box<str>>, values: Arc<dyn DerivedValues>) -> Self {
		Self {
			name: name.into(),
			values: Values::Derived(values),
		}
	}

	/// Creates a stratum from a JSON object, one trait per key.
	pub fn from_json(name: impl Into<Box<str>>, json: &Map<String, Value>) -> Self {
		let mut stratum = Self::new(name);
		for (key, value) in json {
			stratum.set(key.as_str(), value.clone());
		}
		stratum
	}

	/// Builder form of [`set`](Self::set).
	pub fn with(mut self, trait_id: &str, value: impl Into<Value>) -> Self {
		self.set(trait_id, value.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns a copy of this stratum under another name.
	pub fn renamed(&self, name: impl Into<Box<str>>) -> Self {
		Self {
			name: name.into(),
			values: self.values.clone(),
		}
	}

	/// Returns the defined value of `trait_id`.
	pub fn get(&self, trait_id: &str) -> Option<Value> {
		let value = match &self.values {
			Values::Owned(map) => map.get(trait_id).cloned(),
			Values::Derived(derived) => derived.get(trait_id),
		};
		value.filter(|v| !v.is_null())
	}

	/// Returns `true` if `trait_id` has a defined value in this stratum.
	pub fn contains(&self, trait_id: &str) -> bool {
		self.get(trait_id).is_some()
	}

	/// Sets a value. A derived stratum is materialized first.
	pub fn set(&mut self, trait_id: &str, value: Value) {
		self.owned_mut().insert(Box::from(trait_id), value);
	}

	/// Removes a value, returning the previous one.
	pub fn remove(&mut self, trait_id: &str) -> Option<Value> {
		self.owned_mut().remove(trait_id)
	}

	/// Returns the ids of all defined traits, sorted.
	pub fn trait_ids(&self) -> Vec<Box<str>> {
		let mut ids: Vec<Box<str>> = match &self.values {
			Values::Owned(map) => map
				.iter()
				.filter(|(_, v)| !v.is_null())
				.map(|(k, _)| k.clone())
				.collect(),
			Values::Derived(derived) => derived
				.trait_ids()
				.into_iter()
				.filter(|id| self.contains(id))
				.collect(),
		};
		ids.sort();
		ids
	}

	pub fn is_empty(&self) -> bool {
		self.trait_ids().is_empty()
	}

	/// Returns every defined value as a JSON object.
	pub fn to_json(&self) -> Map<String, Value> {
		self.trait_ids()
			.into_iter()
			.filter_map(|id| {
				let value = self.get(&id)?;
				Some((id.into_string(), value))
			})
			.collect()
	}

	fn owned_mut(&mut self) -> &mut HashMap<Box<str>, Value> {
		if let Values::Derived(derived) = &self.values {
			let map = derived
				.trait_ids()
				.into_iter()
				.filter_map(|id| derived.get(&id).map(|v| (id, v)))
				.collect();
			self.values = Values::Owned(map);
		}
		match &mut self.values {
			Values::Owned(map) => map,
			Values::Derived(_) => unreachable!("materialized above"),
		}
	}
}

impl fmt::Debug for Stratum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match self.values {
			Values::Owned(_) => "owned",
			Values::Derived(_) => "derived",
		};
		f.debug_struct("Stratum")
			.field("name", &self.name)
			.field("kind", &kind)
			.field("traits", &self.trait_ids())
			.finish()
	}
}

impl PartialEq for Stratum {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name && self.to_json() == other.to_json()
	}
}
