//! Registry record resolution.
//!
//! A [`Resolver`] turns records fetched from a catalog registry into
//! [`Model`](cairn_strata::Model)s of concrete catalog types. Parts of a
//! record tree that are not yet dereferenced become [`Reference`]s, which
//! load their own record on demand through a [`RegistryClient`].

pub mod access;
pub mod client;
pub mod config;
pub mod error;
pub mod formats;
pub mod record;
pub mod reference;
pub mod resolver;
pub mod types;

#[cfg(feature = "http")]
pub use client::HttpRegistryClient;
pub use client::{RecordQuery, RegistryClient};
pub use config::RegistryConfig;
pub use error::{ConfigError, FetchError, ResolveError};
pub use formats::{FormatRule, FormatRules, PreparedRule};
pub use record::{Aspects, RegistryRecord};
pub use reference::{Reference, ReferenceStatus};
pub use resolver::{Resolution, Resolver, ResolverSettings};
pub use types::{MAGDA_REFERENCE, REGISTRY_RECORD, ReferenceTraits, standard_order, standard_types};
