//! Error types for the strata model.

use thiserror::Error;

use crate::order::StratumBand;

/// Errors raised while mutating a [`Model`](crate::Model).
///
/// Reading is infallible; only writes validate against the trait set and the
/// stratum order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
	/// The stratum name was never registered with the model's [`StratumOrder`](crate::StratumOrder).
	#[error("unknown stratum {stratum:?} on model {model}")]
	UnknownStratum { model: String, stratum: String },

	/// The trait is not declared for the model's type.
	#[error("{trait_id:?} is not a trait of {type_tag} (model {model})")]
	UnknownTrait {
		model: String,
		type_tag: String,
		trait_id: String,
	},

	/// The value does not fit the trait's declared kind.
	#[error("invalid value for {trait_id:?} on model {model}: expected {expected}, got {got}")]
	InvalidValue {
		model: String,
		trait_id: String,
		expected: &'static str,
		got: &'static str,
	},

	/// Some keys of a JSON update were rejected; the remaining keys were applied.
	#[error("{} rejected key(s) updating stratum {stratum:?} of model {model}: {}", errors.len(), join_errors(errors))]
	Rejected {
		model: String,
		stratum: String,
		errors: Vec<ModelError>,
	},
}

fn join_errors(errors: &[ModelError]) -> String {
	errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors raised while building a [`StratumOrder`](crate::StratumOrder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
	/// The name is already registered in a different band.
	#[error("stratum {name:?} already registered as {existing:?}, cannot re-register as {requested:?}")]
	DuplicateStratum {
		name: String,
		existing: StratumBand,
		requested: StratumBand,
	},
}

/// Errors raised while declaring traits or registering types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
	/// Two traits of one set share an id.
	#[error("duplicate trait {trait_id:?}")]
	DuplicateTrait { trait_id: String },

	/// The combine rule cannot be applied to the trait's kind.
	#[error("trait {trait_id:?} cannot merge values of kind {kind}")]
	InvalidCombine { trait_id: String, kind: &'static str },

	/// A type tag was registered twice.
	#[error("duplicate type tag {tag:?}")]
	DuplicateType { tag: String },

	/// A type's default stratum failed validation.
	#[error("invalid defaults for type {tag:?}: {source}")]
	InvalidDefaults {
		tag: String,
		#[source]
		source: ModelError,
	},
}
