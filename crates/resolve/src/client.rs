//! Registry fetch contract.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::record::RegistryRecord;

/// Selects a record and the facets returned with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
	pub id: String,
	pub aspects: Vec<String>,
	pub optional_aspects: Vec<String>,
	pub dereference: bool,
}

impl RecordQuery {
	/// Facets requested when resolving a reference.
	pub const REFERENCE_ASPECTS: [&'static str; 8] = [
		"terria",
		"group",
		"dcat-dataset-strings",
		"dcat-distribution-strings",
		"dataset-distributions",
		"dataset-format",
		"access-control",
		"esri-access-control",
	];

	pub fn new(id: &str) -> Self {
		Self {
			id: id.to_string(),
			aspects: Vec::new(),
			optional_aspects: Vec::new(),
			dereference: false,
		}
	}

	/// The query issued by reference resolution, with `type_aspect` replacing
	/// `terria` when the type facet is configured under another name.
	pub fn for_reference(id: &str, type_aspect: &str) -> Self {
		let mut query = Self::new(id);
		query.optional_aspects = Self::REFERENCE_ASPECTS.iter().map(|a| a.to_string()).collect();
		if type_aspect != Self::REFERENCE_ASPECTS[0] {
			query.optional_aspects[0] = type_aspect.to_string();
		}
		query.dereference = true;
		query
	}

	/// `{base}/api/v0/registry/records/{id}` with the query parameters appended.
	pub fn uri(&self, base: &str) -> Result<Url, FetchError> {
		let invalid = |message: String| FetchError::InvalidUrl {
			url: base.to_string(),
			message,
		};
		let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
		url.path_segments_mut()
			.map_err(|()| invalid("cannot be a base".to_string()))?
			.pop_if_empty()
			.extend(["api", "v0", "registry", "records", self.id.as_str()]);

		let mut pairs: Vec<(&str, &str)> = Vec::new();
		pairs.extend(self.aspects.iter().map(|a| ("aspect", a.as_str())));
		pairs.extend(self.optional_aspects.iter().map(|a| ("optionalAspect", a.as_str())));
		if self.dereference {
			pairs.push(("dereference", "true"));
		}
		if !pairs.is_empty() {
			url.query_pairs_mut().extend_pairs(pairs);
		}
		Ok(url)
	}
}

/// Fetches records from a registry.
#[async_trait]
pub trait RegistryClient: Send + Sync + fmt::Debug {
	async fn fetch_record(&self, base_url: &str, query: &RecordQuery) -> Result<RegistryRecord, FetchError>;
}

#[cfg(feature = "http")]
pub use self::http::HttpRegistryClient;

#[cfg(feature = "http")]
mod http {
	use reqwest::Client;
	use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

	use super::*;
	use crate::error::ConfigError;

	/// [`RegistryClient`] over HTTP.
	#[derive(Debug, Clone)]
	pub struct HttpRegistryClient {
		client: Client,
		headers: HeaderMap,
	}

	impl HttpRegistryClient {
		/// `headers` are sent with every request.
		pub fn new(headers: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
			let mut map = HeaderMap::new();
			for (name, value) in headers {
				let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
				let value = HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(name.to_string()))?;
				map.insert(name, value);
			}
			Ok(Self {
				client: Client::new(),
				headers: map,
			})
		}
	}

	#[async_trait]
	impl RegistryClient for HttpRegistryClient {
		async fn fetch_record(&self, base_url: &str, query: &RecordQuery) -> Result<RegistryRecord, FetchError> {
			let uri = query.uri(base_url)?;
			let url = uri.to_string();
			tracing::debug!(%url, record = %query.id, "fetching registry record");

			let response = self
				.client
				.get(uri)
				.headers(self.headers.clone())
				.send()
				.await
				.map_err(|e| FetchError::Transport {
					url: url.clone(),
					message: e.to_string(),
				})?;

			let status = response.status();
			if !status.is_success() {
				return Err(FetchError::Status {
					url,
					status: status.as_u16(),
				});
			}

			response.json::<RegistryRecord>().await.map_err(|e| FetchError::Decode {
				url,
				message: e.to_string(),
			})
		}
	}
}

/// In-memory registry for tests and offline use.
#[doc(hidden)]
pub mod test_helpers {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use parking_lot::Mutex;

	use super::*;

	/// Serves records from a map and records every query.
	#[derive(Debug, Default)]
	pub struct MemoryRegistry {
		records: Mutex<BTreeMap<String, RegistryRecord>>,
		queries: Mutex<Vec<(String, RecordQuery)>>,
		calls: AtomicUsize,
	}

	impl MemoryRegistry {
		pub fn new() -> Self {
			Self::default()
		}

		pub fn insert(&self, id: &str, record: RegistryRecord) {
			self.records.lock().insert(id.to_string(), record);
		}

		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		pub fn queries(&self) -> Vec<(String, RecordQuery)> {
			self.queries.lock().clone()
		}
	}

	#[async_trait]
	impl RegistryClient for MemoryRegistry {
		async fn fetch_record(&self, base_url: &str, query: &RecordQuery) -> Result<RegistryRecord, FetchError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.queries.lock().push((base_url.to_string(), query.clone()));
			let url = query.uri(base_url)?.to_string();
			self.records
				.lock()
				.get(&query.id)
				.cloned()
				.ok_or(FetchError::Status { url, status: 404 })
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn test_reference_query_uri() {
		let uri = RecordQuery::for_reference("a b/c", "terria")
			.uri("https://registry.example/")
			.unwrap();
		assert_eq!(
			uri.as_str(),
			"https://registry.example/api/v0/registry/records/a%20b%2Fc?optionalAspect=terria&optionalAspect=group&optionalAspect=dcat-dataset-strings&optionalAspect=dcat-distribution-strings&optionalAspect=dataset-distributions&optionalAspect=dataset-format&optionalAspect=access-control&optionalAspect=esri-access-control&dereference=true"
		);
	}

	#[test]
	fn test_required_aspects_and_base_path() {
		let mut query = RecordQuery::new("r1");
		query.aspects.push("group".to_string());
		let uri = query.uri("https://example.org/magda").unwrap();
		assert_eq!(uri.as_str(), "https://example.org/magda/api/v0/registry/records/r1?aspect=group");
	}

	#[test]
	fn test_custom_type_aspect() {
		let query = RecordQuery::for_reference("r1", "type");
		assert_eq!(query.optional_aspects[0], "type");
		assert_eq!(query.optional_aspects.len(), RecordQuery::REFERENCE_ASPECTS.len());
	}

	#[test]
	fn test_invalid_base() {
		let err = RecordQuery::new("r1").uri("not a url").unwrap_err();
		assert!(matches!(err, FetchError::InvalidUrl { .. }));
	}
}
