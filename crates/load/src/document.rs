//! A stratum projected out of one fetched JSON document.
//!
//! The document is fetched once per url and shared by every duplicate of the
//! source. Each trait is a JSON pointer into the document, evaluated the first
//! time the trait is read and cached from then on.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use cairn_strata::{CommonTraits, DerivedValues, Model, Stratum};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::LoadError;
use crate::loadable::LoadableStratum;

/// Transport for [`JsonDocumentStratum`].
#[async_trait]
pub trait DocumentFetcher: Send + Sync + fmt::Debug {
	async fn fetch(&self, url: &str) -> Result<Value, LoadError>;
}

/// Parses a fetched body as a JSON document.
pub fn decode_document(url: &str, body: &[u8]) -> Result<Value, LoadError> {
	serde_json::from_slice(body).map_err(|e| LoadError::Decode {
		url: url.to_string(),
		message: e.to_string(),
	})
}

#[cfg(feature = "http")]
pub use self::http::HttpDocumentFetcher;

#[cfg(feature = "http")]
mod http {
	use reqwest::Client;

	use super::*;

	/// [`DocumentFetcher`] over HTTP GET.
	#[derive(Debug, Clone, Default)]
	pub struct HttpDocumentFetcher {
		client: Client,
	}

	impl HttpDocumentFetcher {
		pub fn new(client: Client) -> Self {
			Self { client }
		}
	}

	#[async_trait]
	impl DocumentFetcher for HttpDocumentFetcher {
		async fn fetch(&self, url: &str) -> Result<Value, LoadError> {
			tracing::debug!(%url, "fetching document");
			let transport = |message: String| LoadError::Fetch {
				url: url.to_string(),
				message,
			};

			let response = self.client.get(url).send().await.map_err(|e| transport(e.to_string()))?;
			let status = response.status();
			if !status.is_success() {
				return Err(transport(format!("status {}", status.as_u16())));
			}

			let body = response.bytes().await.map_err(|e| transport(e.to_string()))?;
			decode_document(url, &body)
		}
	}
}

/// Maps one trait to a location in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitProjection {
	pub trait_id: Box<str>,
	/// RFC 6901 pointer, e.g. `/Capability/Layer/Title`.
	pub pointer: Box<str>,
}

impl TraitProjection {
	pub fn new(trait_id: &str, pointer: &str) -> Self {
		Self {
			trait_id: Box::from(trait_id),
			pointer: Box::from(pointer),
		}
	}
}

#[derive(Debug, Default)]
struct Cache {
	url: Option<Box<str>>,
	document: Option<Arc<Value>>,
}

/// Loads a stratum from the JSON document at the model's url.
#[derive(Clone)]
pub struct JsonDocumentStratum {
	name: Box<str>,
	influencing: Vec<Box<str>>,
	projections: Arc<[TraitProjection]>,
	fetcher: Arc<dyn DocumentFetcher>,
	cache: Arc<Mutex<Cache>>,
	evaluations: Arc<AtomicUsize>,
}

impl JsonDocumentStratum {
	/// The url is read from the model's `url` trait, which is also the only
	/// influencing trait unless more are added with [`influenced_by`](Self::influenced_by).
	pub fn new(name: &str, fetcher: Arc<dyn DocumentFetcher>, projections: impl IntoIterator<Item = TraitProjection>) -> Self {
		Self {
			name: Box::from(name),
			influencing: vec![Box::from(CommonTraits::URL)],
			projections: projections.into_iter().collect(),
			fetcher,
			cache: Arc::default(),
			evaluations: Arc::default(),
		}
	}

	pub fn influenced_by(mut self, trait_id: &str) -> Self {
		if !self.influencing.iter().any(|t| &**t == trait_id) {
			self.influencing.push(Box::from(trait_id));
		}
		self
	}

	/// Number of projections evaluated so far, across every stratum built by
	/// this source and its duplicates.
	pub fn evaluations(&self) -> usize {
		self.evaluations.load(Ordering::Relaxed)
	}

	fn cached(&self, url: &str) -> Option<Arc<Value>> {
		let cache = self.cache.lock();
		match (&cache.url, &cache.document) {
			(Some(cached), Some(document)) if &**cached == url => Some(document.clone()),
			_ => None,
		}
	}
}

#[async_trait]
impl LoadableStratum for JsonDocumentStratum {
	fn stratum_name(&self) -> &str {
		&self.name
	}

	fn influencing_traits(&self) -> &[Box<str>] {
		&self.influencing
	}

	async fn load(&self, model: &Model) -> Result<Stratum, LoadError> {
		let Some(url) = model.get_str(CommonTraits::URL) else {
			return Err(LoadError::configuration(model.id(), "`url` must be set"));
		};

		let document = match self.cached(&url) {
			Some(document) => {
				tracing::debug!(model = %model.id(), %url, "reusing fetched document");
				document
			}
			None => {
				let document = Arc::new(self.fetcher.fetch(&url).await?);
				let mut cache = self.cache.lock();
				cache.url = Some(Box::from(url.as_str()));
				cache.document = Some(document.clone());
				document
			}
		};

		let values = DocumentValues {
			document,
			projections: self.projections.clone(),
			cells: self.projections.iter().map(|_| OnceLock::new()).collect(),
			evaluations: self.evaluations.clone(),
		};
		Ok(Stratum::derived(&*self.name, Arc::new(values)))
	}

	fn duplicate_for(&self, _model: &Model) -> Box<dyn LoadableStratum> {
		Box::new(self.clone())
	}
}

impl fmt::Debug for JsonDocumentStratum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JsonDocumentStratum")
			.field("name", &self.name)
			.field("projections", &self.projections)
			.field("url", &self.cache.lock().url)
			.finish()
	}
}

/// Lazily evaluated projections over one document.
struct DocumentValues {
	document: Arc<Value>,
	projections: Arc<[TraitProjection]>,
	cells: Box<[OnceLock<Option<Value>>]>,
	evaluations: Arc<AtomicUsize>,
}

impl DerivedValues for DocumentValues {
	fn get(&self, trait_id: &str) -> Option<Value> {
		let idx = self.projections.iter().position(|p| &*p.trait_id == trait_id)?;
		self.cells[idx]
			.get_or_init(|| {
				self.evaluations.fetch_add(1, Ordering::Relaxed);
				self.document.pointer(&self.projections[idx].pointer).cloned()
			})
			.clone()
	}

	fn trait_ids(&self) -> Vec<Box<str>> {
		self.projections.iter().map(|p| p.trait_id.clone()).collect()
	}
}

impl fmt::Debug for DocumentValues {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentValues")
			.field("projections", &self.projections.len())
			.finish_non_exhaustive()
	}
}
