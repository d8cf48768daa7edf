//! Placeholders that stand for a registry record until it is resolved.
//!
//! A reference is an ordinary catalog model of type
//! [`MAGDA_REFERENCE`](crate::MAGDA_REFERENCE) whose traits say where its
//! record lives. [`Reference::load`] turns it into a target model, fetching
//! the record only when the embedded copy is not enough.

use std::sync::Arc;

use cairn_load::{LoadMemoizer, LoadStatus, LoadTicket, fingerprint};
use cairn_strata::{CommonTraits, Model};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::client::RecordQuery;
use crate::error::{ResolveError, Result};
use crate::formats::{FormatRule, FormatRules};
use crate::record::RegistryRecord;
use crate::resolver::{Resolution, Resolver};
use crate::types::{MAGDA_REFERENCE, ReferenceTraits};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStatus {
	/// Not loaded yet, or loaded without producing a target.
	Unresolved,
	Resolving,
	Resolved,
	Failed,
}

/// Load state of one reference model.
#[derive(Debug)]
pub struct Reference {
	model: Arc<Model>,
	memo: LoadMemoizer<Resolution, ResolveError>,
	target: Arc<Mutex<Option<Arc<Model>>>>,
	/// Held while a load writes into the catalog and its target.
	resolving: Arc<Mutex<()>>,
}

impl Reference {
	pub fn new(model: Arc<Model>) -> Self {
		Self {
			model,
			memo: LoadMemoizer::new(),
			target: Arc::new(Mutex::new(None)),
			resolving: Arc::new(Mutex::new(())),
		}
	}

	pub fn is_reference(model: &Model) -> bool {
		model.type_tag() == MAGDA_REFERENCE
	}

	pub fn model(&self) -> &Arc<Model> {
		&self.model
	}

	/// The model this reference resolved to, if any.
	pub fn target(&self) -> Option<Arc<Model>> {
		self.target.lock().clone()
	}

	pub fn status(&self) -> ReferenceStatus {
		match self.memo.status() {
			LoadStatus::Idle => ReferenceStatus::Unresolved,
			LoadStatus::Loading => ReferenceStatus::Resolving,
			LoadStatus::Failed => ReferenceStatus::Failed,
			LoadStatus::Loaded if self.target.lock().is_some() => ReferenceStatus::Resolved,
			LoadStatus::Loaded => ReferenceStatus::Unresolved,
		}
	}

	/// Resolves the reference, reusing the last result while the traits that
	/// describe the record are unchanged.
	///
	/// The embedded `magdaRecord` is tried first. Only if it is too shallow is
	/// the record fetched from the registry, at most once per call.
	pub async fn load(&self, resolver: &Arc<Resolver>) -> Result<Option<Arc<Model>>> {
		let key = fingerprint(&self.model, &ReferenceTraits::FINGERPRINT[..]);
		let model = self.model.clone();
		let previous = self.target();
		let fetch_resolver = resolver.clone();
		let resolving = self.resolving.clone();
		let current = self.target.clone();
		let start = move |ticket| {
			let guard = Guard {
				ticket,
				resolving,
				target: current,
			};
			async move { resolve_reference(&fetch_resolver, &model, previous.as_ref(), &guard).await }
		};

		let target = self.target.clone();
		let commit = move |resolution: &Resolution| {
			*target.lock() = resolution.model().cloned();
		};

		let resolution = self.memo.load_with(key, start, commit).await?;
		Ok(resolution.model().cloned())
	}

	/// Drops the memoized result so the next load resolves again.
	pub fn invalidate(&self) {
		self.memo.invalidate();
	}
}

/// Keeps a superseded load from writing into the catalog or the target.
struct Guard {
	ticket: LoadTicket<Resolution, ResolveError>,
	resolving: Arc<Mutex<()>>,
	target: Arc<Mutex<Option<Arc<Model>>>>,
}

impl Guard {
	/// Runs `resolve` unless a newer load started; `None` if it did.
	fn run(&self, resolve: impl FnOnce() -> Result<Resolution>) -> Result<Option<Resolution>> {
		let _resolving = self.resolving.lock();
		if !self.ticket.is_current() {
			tracing::debug!(generation = self.ticket.generation(), "skipping superseded resolution");
			return Ok(None);
		}
		resolve().map(Some)
	}

	/// What a superseded load reports: the target committed by the newer one.
	fn current(&self) -> Resolution {
		match self.target.lock().clone() {
			Some(model) => Resolution::Resolved(model),
			None => Resolution::Unresolved,
		}
	}
}

async fn resolve_reference(
	resolver: &Resolver,
	model: &Model,
	previous: Option<&Arc<Model>>,
	guard: &Guard,
) -> Result<Resolution> {
	let override_ = model.flatten(ReferenceTraits::OVERRIDE).and_then(into_object);
	let extra_aspects = model
		.flatten(ReferenceTraits::ADD_OR_OVERRIDE_ASPECTS)
		.and_then(|v| v.get("aspects").cloned())
		.and_then(into_object);
	let rules = match model.flatten(ReferenceTraits::DISTRIBUTION_FORMATS) {
		Some(value) => Some(format_rules(model, value)?),
		None => None,
	};
	let rules = rules.as_ref().unwrap_or(&resolver.settings().format_rules);
	let url = model
		.get_str(CommonTraits::URL)
		.or_else(|| resolver.settings().registry_url.clone());
	let id = model.id();

	let embedded = model.flatten(ReferenceTraits::MAGDA_RECORD).as_ref().and_then(RegistryRecord::from_value);
	if let Some(mut record) = embedded {
		if let Some(extra) = &extra_aspects {
			record.override_aspects(extra);
		}
		let resolution = guard.run(|| {
			resolver
				.pass(rules, url.as_deref())
				.resolve(id, Some(&record), override_.as_ref(), previous)
		})?;
		match resolution {
			None => return Ok(guard.current()),
			Some(resolution) if resolution.is_resolved() => return Ok(resolution),
			Some(_) => {}
		}
	}

	let Some(record_id) = model.get_str(ReferenceTraits::RECORD_ID) else {
		return Err(ResolveError::Configuration {
			reference: id.to_string(),
			message: "no recordId to fetch".to_string(),
		});
	};
	let Some(url) = url else {
		return Err(ResolveError::Configuration {
			reference: id.to_string(),
			message: "no registry url".to_string(),
		});
	};

	let query = RecordQuery::for_reference(&record_id, &resolver.settings().type_aspect);
	let mut record = resolver.client().fetch_record(&url, &query).await?;
	tracing::debug!(reference = %id, record = %record_id, "fetched registry record");
	if let Some(extra) = &extra_aspects {
		record.override_aspects(extra);
	}

	let resolution = guard.run(|| {
		resolver
			.pass(rules, Some(&url))
			.resolve(id, Some(&record), override_.as_ref(), previous)
	})?;
	Ok(resolution.unwrap_or_else(|| guard.current()))
}

fn format_rules(model: &Model, value: Value) -> Result<FormatRules> {
	let configuration = |message: String| ResolveError::Configuration {
		reference: model.id().to_string(),
		message,
	};
	let rules: Vec<FormatRule> = serde_json::from_value(value).map_err(|e| configuration(format!("invalid distributionFormats: {e}")))?;
	FormatRules::prepare(&rules).map_err(|e| configuration(e.to_string()))
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
	match value {
		Value::Object(map) => Some(map),
		_ => None,
	}
}
