use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::oneshot;

use super::*;

type Memo = LoadMemoizer<String, String>;

fn counted(calls: &Arc<AtomicUsize>, value: &str) -> impl Future<Output = Result<String, String>> + Send + 'static {
	let calls = calls.clone();
	let value = value.to_string();
	async move {
		calls.fetch_add(1, Ordering::SeqCst);
		Ok(value)
	}
}

fn gated(rx: oneshot::Receiver<Result<String, String>>) -> impl Future<Output = Result<String, String>> + Send + 'static {
	async move { rx.await.unwrap_or_else(|_| Err("sender dropped".to_string())) }
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn() -> Box<dyn FnOnce(&String) + Send>) {
	let commits = Arc::new(Mutex::new(Vec::new()));
	let sink = commits.clone();
	let make = move || {
		let sink = sink.clone();
		Box::new(move |value: &String| sink.lock().push(value.clone())) as Box<dyn FnOnce(&String) + Send>
	};
	(commits, make)
}

#[tokio::test]
async fn test_same_fingerprint_fetches_once() {
	let memo = Memo::new();
	let calls = Arc::new(AtomicUsize::new(0));
	let (commits, commit) = recorder();

	let first = memo.load(vec![json!("a")], counted(&calls, "one"), commit()).await;
	let second = memo.load(vec![json!("a")], counted(&calls, "two"), commit()).await;

	assert_eq!(first, Ok("one".to_string()));
	assert_eq!(second, Ok("one".to_string()));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(*commits.lock(), ["one"]);
	assert_eq!(memo.status(), LoadStatus::Loaded);
}

#[tokio::test]
async fn test_changed_fingerprint_refetches() {
	let memo = Memo::new();
	let calls = Arc::new(AtomicUsize::new(0));
	let (commits, commit) = recorder();

	memo.load(vec![json!("a")], counted(&calls, "one"), commit()).await.unwrap();
	let second = memo.load(vec![json!("b")], counted(&calls, "two"), commit()).await;

	assert_eq!(second, Ok("two".to_string()));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(*commits.lock(), ["one", "two"]);
	assert_eq!(memo.value().as_deref(), Some("two"));
	assert_eq!(memo.generation(), 2);
}

#[tokio::test]
async fn test_concurrent_loads_share_fetch() {
	let memo = Memo::new();
	let (tx, rx) = oneshot::channel();
	let (commits, commit) = recorder();

	let first = memo.load(vec![json!("a")], gated(rx), commit());
	let second = memo.load(vec![json!("a")], async { Err::<String, String>("second fetch must not run".to_string()) }, commit());
	assert_eq!(memo.status(), LoadStatus::Loading);

	tx.send(Ok("shared".to_string())).unwrap();
	let (first, second) = futures::join!(first, second);

	assert_eq!(first, Ok("shared".to_string()));
	assert_eq!(second, Ok("shared".to_string()));
	assert_eq!(*commits.lock(), ["shared"]);
}

/// A fetch that completes after a newer one started must not commit.
#[tokio::test]
async fn test_stale_completion_discarded() {
	let memo = Memo::new();
	let (tx_a, rx_a) = oneshot::channel();
	let (tx_b, rx_b) = oneshot::channel();
	let (commits, commit) = recorder();

	let load_a = memo.load(vec![json!("a")], gated(rx_a), commit());
	let load_b = memo.load(vec![json!("b")], gated(rx_b), commit());

	tx_b.send(Ok("b".to_string())).unwrap();
	assert_eq!(load_b.await, Ok("b".to_string()));

	tx_a.send(Ok("a".to_string())).unwrap();
	assert_eq!(load_a.await, Ok("a".to_string()));

	assert_eq!(*commits.lock(), ["b"]);
	assert_eq!(memo.value().as_deref(), Some("b"));
	assert_eq!(memo.fingerprint(), Some(vec![json!("b")]));
	assert_eq!(memo.status(), LoadStatus::Loaded);
}

#[tokio::test]
async fn test_failure_clears_fingerprint() {
	let memo = Memo::new();
	let calls = Arc::new(AtomicUsize::new(0));
	let (commits, commit) = recorder();

	memo.load(vec![json!("a")], counted(&calls, "one"), commit()).await.unwrap();

	let failed = memo
		.load(vec![json!("b")], async { Err::<String, String>("boom".to_string()) }, commit())
		.await;
	assert_eq!(failed, Err("boom".to_string()));
	assert_eq!(memo.status(), LoadStatus::Failed);
	assert_eq!(memo.fingerprint(), None);
	// the previously committed value is untouched
	assert_eq!(memo.value().as_deref(), Some("one"));

	memo.load(vec![json!("b")], counted(&calls, "two"), commit()).await.unwrap();
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(*commits.lock(), ["one", "two"]);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
	let memo = Memo::new();
	let calls = Arc::new(AtomicUsize::new(0));
	let (_, commit) = recorder();

	memo.load(vec![json!("a")], counted(&calls, "one"), commit()).await.unwrap();
	memo.invalidate();
	memo.load(vec![json!("a")], counted(&calls, "one"), commit()).await.unwrap();

	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ticket_goes_stale_when_superseded() {
	let memo = Memo::new();
	let (_tx_a, rx_a) = oneshot::channel();
	let (_, commit) = recorder();
	let ticket = Arc::new(Mutex::new(None));

	let slot = ticket.clone();
	let _load_a = memo.load_with(
		vec![json!("a")],
		move |t| {
			*slot.lock() = Some(t);
			gated(rx_a)
		},
		commit(),
	);
	let ticket_a = ticket.lock().take().unwrap();
	assert!(ticket_a.is_current());
	assert_eq!(ticket_a.generation(), 1);

	// a memo hit or shared fetch never builds a new fetch
	let slot = ticket.clone();
	let _shared = memo.load_with(
		vec![json!("a")],
		move |t| {
			*slot.lock() = Some(t);
			gated(oneshot::channel().1)
		},
		commit(),
	);
	assert!(ticket.lock().is_none());

	let _load_b = memo.load(vec![json!("b")], counted(&Arc::new(AtomicUsize::new(0)), "b"), commit());
	assert!(!ticket_a.is_current());

	memo.invalidate();
	drop(memo);
	assert!(!ticket_a.is_current());
}
