//! Trait combination engine.
//!
//! Every function here is pure over its inputs: the trait declaration and the
//! model's strata sorted from highest to lowest priority.

use std::sync::Arc;

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde_json::{Map, Value};

use crate::stratum::Stratum;
use crate::traits::{ArrayMerge, Combine, IdKey, ObjectArraySpec, TraitDef, TraitKind};

/// Combines the values of `trait_id` across `top_to_bottom`.
///
/// Undeclared traits combine with [`Combine::Override`]. Absence yields `None`.
pub(crate) fn flatten(def: Option<&TraitDef>, trait_id: &str, top_to_bottom: &[Arc<Stratum>]) -> Option<Value> {
	let Some(def) = def else {
		return top_to_bottom.iter().find_map(|s| s.get(trait_id));
	};

	if let TraitKind::ObjectArray(spec) = &def.kind {
		return combine_object_array(spec, trait_id, top_to_bottom);
	}

	match def.combine {
		Combine::Override => top_to_bottom.iter().find_map(|s| s.get(trait_id)),
		Combine::Underride => top_to_bottom.iter().rev().find_map(|s| s.get(trait_id)),
		Combine::Merge => match def.kind {
			TraitKind::PrimitiveArray => merge_arrays(trait_id, top_to_bottom),
			TraitKind::Object => merge_objects(trait_id, top_to_bottom),
			_ => top_to_bottom.iter().find_map(|s| s.get(trait_id)),
		},
	}
}

/// Concatenates arrays from the highest stratum down, skipping items already
/// seen. The top stratum's explicit ordering is preserved and lower strata
/// only append what is missing.
fn merge_arrays(trait_id: &str, top_to_bottom: &[Arc<Stratum>]) -> Option<Value> {
	let mut defined = false;
	let mut out: Vec<Value> = Vec::new();
	for stratum in top_to_bottom {
		let Some(value) = stratum.get(trait_id) else {
			continue;
		};
		let Value::Array(items) = value else {
			tracing::trace!(trait_id, stratum = stratum.name(), "ignoring non-array value in merged array trait");
			continue;
		};
		defined = true;
		for item in items {
			if !out.contains(&item) {
				out.push(item);
			}
		}
	}
	defined.then_some(Value::Array(out))
}

/// Starts from the lowest stratum's object and applies higher strata on top.
fn merge_objects(trait_id: &str, top_to_bottom: &[Arc<Stratum>]) -> Option<Value> {
	let mut merged: Option<Map<String, Value>> = None;
	for stratum in top_to_bottom.iter().rev() {
		let Some(Value::Object(layer)) = stratum.get(trait_id) else {
			continue;
		};
		match &mut merged {
			None => merged = Some(layer),
			Some(base) => merge_into(base, layer),
		}
	}
	merged.map(Value::Object)
}

/// Applies `top` onto `base`, recursing where both sides hold objects.
fn merge_into(base: &mut Map<String, Value>, top: Map<String, Value>) {
	for (key, value) in top {
		match value {
			Value::Null => {}
			Value::Object(upper) => {
				if let Some(Value::Object(lower)) = base.get_mut(&key) {
					merge_into(lower, upper);
				} else {
					base.insert(key, Value::Object(upper));
				}
			}
			value => {
				base.insert(key, value);
			}
		}
	}
}

fn element_id(spec: &ObjectArraySpec, element: &Map<String, Value>, index: usize) -> Option<String> {
	match &spec.id_key {
		IdKey::Index => Some(index.to_string()),
		IdKey::Property(key) => match element.get(&**key)? {
			Value::String(s) => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			_ => None,
		},
	}
}

fn is_removal(spec: &ObjectArraySpec, element: &Map<String, Value>) -> bool {
	spec.removal_flag
		.as_deref()
		.is_some_and(|flag| element.get(flag).and_then(Value::as_bool) == Some(true))
}

fn objects(value: &Value) -> impl Iterator<Item = (usize, &Map<String, Value>)> {
	value
		.as_array()
		.into_iter()
		.flatten()
		.enumerate()
		.filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

/// Combines an object array element-wise.
///
/// Element order is the order of first appearance walking strata bottom to
/// top, so frequently edited upper strata do not reshuffle elements that a
/// lower stratum established. Removals apply top to bottom: an element removed
/// by a stratum is ignored in every stratum below it.
fn combine_object_array(spec: &ObjectArraySpec, trait_id: &str, top_to_bottom: &[Arc<Stratum>]) -> Option<Value> {
	let layers: Vec<Value> = top_to_bottom.iter().filter_map(|s| s.get(trait_id)).collect();
	if layers.is_empty() {
		return None;
	}

	let mut order: Vec<String> = Vec::new();
	for layer in layers.iter().rev() {
		for (i, element) in objects(layer) {
			if is_removal(spec, element) {
				continue;
			}
			if let Some(id) = element_id(spec, element, i)
				&& !order.contains(&id)
			{
				order.push(id);
			}
		}
	}

	let mut removed: HashSet<String> = HashSet::default();
	let mut kept: HashSet<String> = HashSet::default();
	for layer in &layers {
		for (i, element) in objects(layer) {
			let Some(id) = element_id(spec, element, i) else {
				continue;
			};
			if is_removal(spec, element) {
				removed.insert(id);
			} else if !removed.contains(&id) {
				kept.insert(id);
			}
		}
	}

	if spec.strategy == ArrayMerge::TopStratum {
		let top: HashSet<String> = objects(&layers[0])
			.filter(|(_, e)| !is_removal(spec, e))
			.filter_map(|(i, e)| element_id(spec, e, i))
			.collect();
		kept.retain(|id| top.contains(id));
	}

	let mut merged: HashMap<String, Map<String, Value>> = HashMap::default();
	for layer in layers.iter().rev() {
		for (i, element) in objects(layer) {
			if is_removal(spec, element) {
				continue;
			}
			let Some(id) = element_id(spec, element, i) else {
				continue;
			};
			match merged.get_mut(&id) {
				Some(base) => merge_into(base, element.clone()),
				None => {
					merged.insert(id, element.clone());
				}
			}
		}
	}

	let elements = order
		.into_iter()
		.filter(|id| kept.contains(id))
		.filter_map(|id| merged.remove(&id).map(Value::Object))
		.collect();
	Some(Value::Array(elements))
}
