//! The loadable-stratum protocol.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cairn_strata::{Model, ModelError, Stratum};
use serde_json::Value;

use crate::error::LoadError;
use crate::memo::{Fingerprint, LoadMemoizer, LoadStatus};

/// A stratum whose values come from an asynchronous fetch.
#[async_trait]
pub trait LoadableStratum: Send + Sync + fmt::Debug {
	/// Name of the stratum this source installs. Must be registered with the
	/// model's stratum order.
	fn stratum_name(&self) -> &str;

	/// Traits whose flattened values decide whether a reload is needed.
	fn influencing_traits(&self) -> &[Box<str>];

	/// Fetches and builds the stratum for `model`.
	async fn load(&self, model: &Model) -> Result<Stratum, LoadError>;

	/// A copy bound to `model` that reuses any payload already fetched.
	fn duplicate_for(&self, model: &Model) -> Box<dyn LoadableStratum>;
}

/// Flattened values of `traits` on `model`. Undefined traits contribute `null`.
pub fn fingerprint<S: AsRef<str>>(model: &Model, traits: &[S]) -> Fingerprint {
	traits
		.iter()
		.map(|id| model.flatten(id.as_ref()).unwrap_or(Value::Null))
		.collect()
}

/// Binds a [`LoadableStratum`] to a memoizer and installs what it loads.
#[derive(Debug)]
pub struct StratumLoader {
	source: Arc<dyn LoadableStratum>,
	memo: LoadMemoizer<Arc<Stratum>, LoadError>,
}

impl StratumLoader {
	pub fn new(source: impl LoadableStratum + 'static) -> Self {
		Self::from_source(Arc::new(source))
	}

	pub fn from_source(source: Arc<dyn LoadableStratum>) -> Self {
		Self {
			source,
			memo: LoadMemoizer::new(),
		}
	}

	pub fn stratum_name(&self) -> &str {
		self.source.stratum_name()
	}

	pub fn status(&self) -> LoadStatus {
		self.memo.status()
	}

	/// Loads the stratum into `model` unless the influencing traits are
	/// unchanged since the last successful load.
	///
	/// A failed load leaves the previously installed stratum in place.
	pub async fn load(&self, model: &Arc<Model>) -> Result<Arc<Stratum>, LoadError> {
		let name = self.source.stratum_name();
		if !model.order().contains(name) {
			return Err(ModelError::UnknownStratum {
				model: model.id().to_string(),
				stratum: name.to_string(),
			}
			.into());
		}

		let key = fingerprint(model, self.source.influencing_traits());
		let source = self.source.clone();
		let target = model.clone();
		let fetch = async move { source.load(&target).await.map(Arc::new) };

		let installer = Arc::downgrade(model);
		let commit = move |stratum: &Arc<Stratum>| {
			let Some(model) = installer.upgrade() else {
				return;
			};
			match model.install(stratum.clone()) {
				Ok(()) => tracing::debug!(model = %model.id(), stratum = stratum.name(), "installed loaded stratum"),
				Err(err) => tracing::warn!(model = %model.id(), error = %err, "failed to install loaded stratum"),
			}
		};

		self.memo.load(key, fetch, commit).await
	}

	/// A loader for `model` that starts idle but reuses any fetched payload.
	pub fn duplicate_for(&self, model: &Model) -> Self {
		Self::from_source(Arc::from(self.source.duplicate_for(model)))
	}
}
