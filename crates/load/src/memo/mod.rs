//! Fingerprint memoization with a stale-completion guard.
//!
//! Each call to [`LoadMemoizer::load`] that actually starts a fetch bumps the
//! generation. A fetch only commits if its generation is still current when it
//! completes, so a slow fetch for an old fingerprint can never overwrite the
//! result of a newer one.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;

#[cfg(test)]
mod tests;

/// Flattened values of the traits that influence a load, in declaration order.
pub type Fingerprint = Vec<Value>;

type Pending<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
	#[default]
	Idle,
	Loading,
	Loaded,
	Failed,
}

struct State<T, E> {
	status: LoadStatus,
	fingerprint: Option<Fingerprint>,
	generation: u64,
	pending: Option<Pending<T, E>>,
	value: Option<T>,
}

/// Generation a fetch was started under.
///
/// A fetch with side effects beyond its result checks [`LoadTicket::is_current`]
/// before applying them, since the commit guard only covers the result.
pub struct LoadTicket<T, E> {
	state: Weak<Mutex<State<T, E>>>,
	generation: u64,
}

impl<T, E> LoadTicket<T, E> {
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// False once a newer load started, or the memoizer was invalidated or dropped.
	pub fn is_current(&self) -> bool {
		self.state
			.upgrade()
			.is_some_and(|state| state.lock().generation == self.generation)
	}
}

impl<T, E> Clone for LoadTicket<T, E> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			generation: self.generation,
		}
	}
}

impl<T, E> fmt::Debug for LoadTicket<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LoadTicket").field("generation", &self.generation).finish()
	}
}

/// Runs at most one fetch per fingerprint and shares it between callers.
pub struct LoadMemoizer<T, E> {
	state: Arc<Mutex<State<T, E>>>,
}

impl<T, E> Default for LoadMemoizer<T, E> {
	fn default() -> Self {
		Self {
			state: Arc::new(Mutex::new(State {
				status: LoadStatus::Idle,
				fingerprint: None,
				generation: 0,
				pending: None,
				value: None,
			})),
		}
	}
}

impl<T, E> LoadMemoizer<T, E>
where
	T: Clone + Send + Sync + 'static,
	E: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	pub fn status(&self) -> LoadStatus {
		self.state.lock().status
	}

	pub fn generation(&self) -> u64 {
		self.state.lock().generation
	}

	/// Fingerprint of the current or last successful load.
	pub fn fingerprint(&self) -> Option<Fingerprint> {
		self.state.lock().fingerprint.clone()
	}

	/// Value committed by the last successful load.
	pub fn value(&self) -> Option<T> {
		self.state.lock().value.clone()
	}

	/// Loads for `fingerprint`.
	///
	/// - Loaded with an equal fingerprint: resolves immediately, `fetch` is
	///   dropped without being polled.
	/// - Loading with an equal fingerprint: shares the pending fetch.
	/// - Otherwise starts `fetch` under a new generation.
	///
	/// On success `commit` runs with the state locked, and only if no newer
	/// load started meanwhile. A failure clears the fingerprint so the next
	/// call retries. Either way the caller receives the fetch result.
	pub fn load<F, C>(&self, fingerprint: Fingerprint, fetch: F, commit: C) -> BoxFuture<'static, Result<T, E>>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
		C: FnOnce(&T) + Send + 'static,
	{
		self.load_with(fingerprint, |_| fetch, commit)
	}

	/// [`load`](Self::load), building the fetch from the [`LoadTicket`] of its
	/// generation. `start` runs with the state locked and only when a new fetch
	/// starts, so it must not touch this memoizer.
	pub fn load_with<S, F, C>(&self, fingerprint: Fingerprint, start: S, commit: C) -> BoxFuture<'static, Result<T, E>>
	where
		S: FnOnce(LoadTicket<T, E>) -> F,
		F: Future<Output = Result<T, E>> + Send + 'static,
		C: FnOnce(&T) + Send + 'static,
	{
		let mut state = self.state.lock();

		if state.fingerprint.as_ref() == Some(&fingerprint) {
			match state.status {
				LoadStatus::Loaded => {
					if let Some(value) = state.value.clone() {
						tracing::debug!(generation = state.generation, "load memoized");
						return future::ready(Ok(value)).boxed();
					}
				}
				LoadStatus::Loading => {
					if let Some(pending) = state.pending.clone() {
						tracing::debug!(generation = state.generation, "sharing pending load");
						return pending.boxed();
					}
				}
				LoadStatus::Idle | LoadStatus::Failed => {}
			}
		}

		state.generation += 1;
		let generation = state.generation;
		state.fingerprint = Some(fingerprint);
		state.status = LoadStatus::Loading;

		let weak = Arc::downgrade(&self.state);
		let fetch = start(LoadTicket {
			state: weak.clone(),
			generation,
		});
		let pending = async move {
			let result = fetch.await;
			if let Some(shared) = weak.upgrade() {
				let mut state = shared.lock();
				if state.generation != generation {
					tracing::debug!(generation, current = state.generation, "discarding stale load");
				} else {
					match &result {
						Ok(value) => {
							commit(value);
							state.status = LoadStatus::Loaded;
							state.value = Some(value.clone());
						}
						Err(_) => {
							state.status = LoadStatus::Failed;
							state.fingerprint = None;
						}
					}
					state.pending = None;
				}
			}
			result
		}
		.boxed()
		.shared();

		state.pending = Some(pending.clone());
		pending.boxed()
	}

	/// Forgets the fingerprint so the next load fetches again. A pending
	/// fetch will not commit.
	pub fn invalidate(&self) {
		let mut state = self.state.lock();
		state.generation += 1;
		state.fingerprint = None;
		state.pending = None;
		if state.status == LoadStatus::Loading {
			state.status = LoadStatus::Idle;
		}
	}
}

impl<T, E> fmt::Debug for LoadMemoizer<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("LoadMemoizer")
			.field("status", &state.status)
			.field("generation", &state.generation)
			.field("fingerprint", &state.fingerprint)
			.finish()
	}
}
