//! Error types for registry access and resolution.

use std::path::PathBuf;

use cairn_strata::ModelError;
use thiserror::Error;

/// Failures fetching a record from the registry. No partial record is ever
/// produced alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
	#[error("invalid registry url {url:?}: {message}")]
	InvalidUrl { url: String, message: String },

	#[error("request to {url} failed: {message}")]
	Transport { url: String, message: String },

	#[error("registry returned status {status} for {url}")]
	Status { url: String, status: u16 },

	#[error("failed to decode record from {url}: {message}")]
	Decode { url: String, message: String },
}

/// Errors aborting a resolution attempt.
///
/// Incomplete records are not errors; they resolve to
/// [`Resolution::Unresolved`](crate::Resolution::Unresolved).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
	/// The reference lacks a record id or registry url; raised before any fetch.
	#[error("reference {reference} cannot be resolved: {message}")]
	Configuration { reference: String, message: String },

	/// The record names a catalog type that is not registered.
	#[error("unknown catalog type {type_tag:?} in record {record}")]
	UnknownType { type_tag: String, record: String },

	#[error(transparent)]
	Fetch(#[from] FetchError),

	#[error(transparent)]
	Model(#[from] ModelError),
}

/// Errors loading [`RegistryConfig`](crate::RegistryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("invalid registry url {url:?}: {error}")]
	InvalidUrl { url: String, error: url::ParseError },

	#[error("invalid pattern in format rule {rule:?}: {error}")]
	InvalidPattern { rule: String, error: regex::Error },

	/// A configured request header has an invalid name or value.
	#[error("invalid header {0:?}")]
	InvalidHeader(String),
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
