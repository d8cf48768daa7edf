use serde_json::{Map, Value};

use super::Model;
use crate::error::ModelError;
use crate::stratum::Stratum;

/// Keys that identify a model in serialized form rather than naming a trait.
const IDENTITY_KEYS: [&str; 2] = ["id", "type"];

impl Model {
	/// Applies a JSON object to one stratum, one trait per key.
	///
	/// With `replace`, the stratum is rebuilt from `json` alone; otherwise
	/// `json` is layered over the stratum's current values. The result is
	/// installed with a single swap. Keys that are not traits of this type, or
	/// whose values have the wrong shape, are skipped and reported through
	/// [`ModelError::Rejected`] after the valid keys were applied.
	pub fn update_from_json(&self, stratum: &str, json: &Map<String, Value>, replace: bool) -> Result<(), ModelError> {
		self.check_stratum(stratum)?;

		let mut next = match self.stratum(stratum) {
			Some(existing) if !replace => (*existing).clone(),
			_ => Stratum::new(stratum),
		};

		let mut errors = Vec::new();
		for (key, value) in json {
			if IDENTITY_KEYS.contains(&key.as_str()) {
				continue;
			}
			match self.declared(key).and_then(|def| self.check_value(def, value)) {
				Ok(()) => next.set(key, value.clone()),
				Err(err) => errors.push(err),
			}
		}

		self.set_stratum(next)?;

		if errors.is_empty() {
			Ok(())
		} else {
			Err(ModelError::Rejected {
				model: self.id.to_string(),
				stratum: stratum.to_string(),
				errors,
			})
		}
	}

	/// Flattened value of every declared trait, in declaration order.
	///
	/// Applying the result as a single stratum to a fresh model of the same
	/// type reproduces these values.
	pub fn to_json(&self) -> Map<String, Value> {
		self.traits
			.iter()
			.filter_map(|def| Some((def.id.to_string(), self.flatten(&def.id)?)))
			.collect()
	}
}
