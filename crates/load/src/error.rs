//! Load failures.

use cairn_strata::ModelError;
use thiserror::Error;

/// Errors raised while loading a stratum.
///
/// `Clone` because every caller sharing one pending load receives the same
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
	/// The model lacks something the loader needs; raised before any I/O.
	#[error("model {model} cannot load: {message}")]
	Configuration { model: String, message: String },

	/// The transport failed or returned an error status.
	#[error("failed to fetch {url}: {message}")]
	Fetch { url: String, message: String },

	/// The payload arrived but could not be decoded.
	#[error("failed to decode {url}: {message}")]
	Decode { url: String, message: String },

	#[error(transparent)]
	Model(#[from] ModelError),
}

impl LoadError {
	pub fn configuration(model: impl ToString, message: impl Into<String>) -> Self {
		Self::Configuration {
			model: model.to_string(),
			message: message.into(),
		}
	}
}
