//! Trait declarations: the named property slots of an entity type and how each
//! one combines across strata.

use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use serde_json::Value;

use crate::error::TypeError;

/// How a trait's values from several strata are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combine {
	/// The highest-priority defined value wins.
	#[default]
	Override,
	/// The lowest-priority defined value wins.
	Underride,
	/// Arrays concatenate without duplicates; objects merge key by key.
	Merge,
}

/// How an element of an object array is identified across strata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdKey {
	Property(Box<str>),
	Index,
}

/// Which elements survive when combining an object array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
	/// Every element from every stratum, minus removals.
	#[default]
	All,
	/// Only elements present in the top-most stratum defining the trait.
	TopStratum,
}

/// Layout of an object-array trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectArraySpec {
	pub id_key: IdKey,
	/// Boolean element property that, when `true`, removes the element from lower strata.
	pub removal_flag: Option<Box<str>>,
	pub strategy: ArrayMerge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitKind {
	Primitive,
	PrimitiveArray,
	Object,
	ObjectArray(ObjectArraySpec),
}

impl TraitKind {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Primitive => "primitive",
			Self::PrimitiveArray => "array",
			Self::Object => "object",
			Self::ObjectArray(_) => "object array",
		}
	}

	/// Returns `true` if `value` has this kind's shape.
	pub fn accepts(&self, value: &Value) -> bool {
		match self {
			Self::Primitive => matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_)),
			Self::PrimitiveArray => value
				.as_array()
				.is_some_and(|items| items.iter().all(|v| !v.is_array() && !v.is_object() && !v.is_null())),
			Self::Object => value.is_object(),
			Self::ObjectArray(_) => value.as_array().is_some_and(|items| items.iter().all(Value::is_object)),
		}
	}
}

/// Human-readable JSON type name, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// A declared property slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDef {
	pub id: Box<str>,
	pub kind: TraitKind,
	pub combine: Combine,
}

impl TraitDef {
	pub fn new(id: &str, kind: TraitKind) -> Self {
		Self {
			id: Box::from(id),
			kind,
			combine: Combine::Override,
		}
	}

	pub fn primitive(id: &str) -> Self {
		Self::new(id, TraitKind::Primitive)
	}

	pub fn primitive_array(id: &str) -> Self {
		Self::new(id, TraitKind::PrimitiveArray)
	}

	pub fn object(id: &str) -> Self {
		Self::new(id, TraitKind::Object)
	}

	/// An object array whose elements are identified by the `id_key` property.
	pub fn object_array(id: &str, id_key: &str) -> Self {
		Self::new(
			id,
			TraitKind::ObjectArray(ObjectArraySpec {
				id_key: IdKey::Property(Box::from(id_key)),
				removal_flag: None,
				strategy: ArrayMerge::All,
			}),
		)
	}

	pub fn with_combine(mut self, combine: Combine) -> Self {
		self.combine = combine;
		self
	}

	pub fn underride(self) -> Self {
		self.with_combine(Combine::Underride)
	}

	pub fn merge(self) -> Self {
		self.with_combine(Combine::Merge)
	}

	/// Sets the element property that marks removals. No-op for non object arrays.
	pub fn with_removal_flag(mut self, flag: &str) -> Self {
		if let TraitKind::ObjectArray(spec) = &mut self.kind {
			spec.removal_flag = Some(Box::from(flag));
		}
		self
	}

	pub fn top_stratum_only(mut self) -> Self {
		if let TraitKind::ObjectArray(spec) = &mut self.kind {
			spec.strategy = ArrayMerge::TopStratum;
		}
		self
	}
}

/// The traits of one entity type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TraitSet {
	by_id: HashMap<Box<str>, usize>,
	defs: Vec<TraitDef>,
}

impl TraitSet {
	pub fn builder() -> TraitSetBuilder {
		TraitSetBuilder::default()
	}

	pub fn get(&self, id: &str) -> Option<&TraitDef> {
		self.by_id.get(id).map(|&idx| &self.defs[idx])
	}

	pub fn contains(&self, id: &str) -> bool {
		self.by_id.contains_key(id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &TraitDef> {
		self.defs.iter()
	}

	pub fn len(&self) -> usize {
		self.defs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.defs.is_empty()
	}
}

/// Accumulates trait declarations and rejects conflicts at build time.
#[derive(Debug, Clone, Default)]
pub struct TraitSetBuilder {
	defs: Vec<TraitDef>,
}

impl TraitSetBuilder {
	pub fn with(mut self, def: TraitDef) -> Self {
		self.defs.push(def);
		self
	}

	/// Adds every trait of `other`, as when mixing a shared trait group into a type.
	pub fn extend(mut self, other: &TraitSet) -> Self {
		self.defs.extend(other.iter().cloned());
		self
	}

	pub fn build(self) -> Result<Arc<TraitSet>, TypeError> {
		let mut set = TraitSet::default();
		for def in self.defs {
			if def.combine == Combine::Merge && def.kind == TraitKind::Primitive {
				return Err(TypeError::InvalidCombine {
					trait_id: def.id.to_string(),
					kind: def.kind.name(),
				});
			}
			if set.by_id.contains_key(&def.id) {
				return Err(TypeError::DuplicateTrait {
					trait_id: def.id.to_string(),
				});
			}
			set.by_id.insert(def.id.clone(), set.defs.len());
			set.defs.push(def);
		}
		Ok(Arc::new(set))
	}
}
