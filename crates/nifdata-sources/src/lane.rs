//! Rate-limited, coalescing call lane.
//!
//! A [`RateLimitedLane`] wraps an async `key -> Result<value, error>` operation
//! and gives it two properties:
//!
//! - **Serialised dispatch.** Calls form a single chain in the order
//!   [`call`](RateLimitedLane::call) was invoked. A link's operation starts only
//!   after the previous link's operation settled *and* the cool-down elapsed,
//!   so the lane dispatches at most once per cool-down whatever the key.
//!   A failed or panicked link still waits the cool-down and never stalls
//!   the chain.
//! - **In-flight coalescing.** A call whose key is already queued or running
//!   shares that link's outcome instead of adding a new one. The key is
//!   evicted as soon as its outcome settles, so a later call runs again.
//!
//! There is no queue bound and no backpressure.
//!
//! ```text
//! call(a) ─► [op(a)] ─ cool-down ─► [op(b)] ─ cool-down ─► [op(c)] ...
//! call(b) ─────────────────────────┘
//! call(a) ─► joins the first link while op(a) is pending
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// A lane link ended without delivering an outcome (its operation panicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lane call ended without an outcome")]
pub struct LaneAborted;

type Op<K, V, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type Outcome<V, E> = Shared<oneshot::Receiver<Result<V, E>>>;

struct LaneState<K, V, E> {
    /// Last link in the chain; completes after its op and cool-down.
    tail: Option<JoinHandle<()>>,
    pending: HashMap<K, Outcome<V, E>>,
}

pub struct RateLimitedLane<K, V, E> {
    op: Op<K, V, E>,
    cool_down: Duration,
    state: Arc<Mutex<LaneState<K, V, E>>>,
}

impl<K, V, E> RateLimitedLane<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + From<LaneAborted> + Send + Sync + 'static,
{
    pub fn new<F, Fut>(cool_down: Duration, op: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            op: Arc::new(move |key| op(key).boxed()),
            cool_down,
            state: Arc::new(Mutex::new(LaneState {
                tail: None,
                pending: HashMap::new(),
            })),
        }
    }

    /// Number of distinct keys queued or running.
    pub fn in_flight(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Queue `key` on the lane, or join its in-flight call.
    ///
    /// The position in the chain is fixed here, when `call` is invoked, not
    /// when the returned future is first polled. Must be called from within a
    /// Tokio runtime: each link runs as a spawned task, so the chain keeps
    /// moving even if a caller drops its future.
    pub fn call(&self, key: K) -> BoxFuture<'static, Result<V, E>> {
        let mut state = lock(&self.state);

        if let Some(outcome) = state.pending.get(&key) {
            debug!(key = ?key, "joining in-flight lane call");
            return settle(outcome.clone());
        }

        let (tx, rx) = oneshot::channel();
        let outcome = rx.shared();
        state.pending.insert(key.clone(), outcome.clone());

        let previous = state.tail.take();
        let op = Arc::clone(&self.op);
        let cool_down = self.cool_down;
        let evict = Evict {
            state: Arc::clone(&self.state),
            key: Some(key.clone()),
        };

        state.tail = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                // A panicked predecessor unwound before its cool-down.
                if previous.await.is_err() {
                    tokio::time::sleep(cool_down).await;
                }
            }
            debug!(key = ?key, "lane dispatch");
            let result = op(key).await;
            drop(evict);
            let _ = tx.send(result);
            tokio::time::sleep(cool_down).await;
        }));

        settle(outcome)
    }
}

fn settle<V, E>(outcome: Outcome<V, E>) -> BoxFuture<'static, Result<V, E>>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + From<LaneAborted> + Send + Sync + 'static,
{
    async move { outcome.await.unwrap_or_else(|_| Err(E::from(LaneAborted))) }.boxed()
}

/// Removes a key from the pending table when its link settles, including
/// when the operation panics.
struct Evict<K: Eq + Hash, V, E> {
    state: Arc<Mutex<LaneState<K, V, E>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V, E> Drop for Evict<K, V, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            lock(&self.state).pending.remove(&key);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Failed(String),
        Aborted,
    }

    impl From<LaneAborted> for TestError {
        fn from(_: LaneAborted) -> Self {
            Self::Aborted
        }
    }

    const COOL_DOWN: Duration = Duration::from_secs(60);

    /// Lane whose op sleeps `work`, counts invocations, and records dispatch
    /// times. Keys starting with "bad" fail.
    fn spy_lane(
        work: Duration,
    ) -> (
        RateLimitedLane<String, String, TestError>,
        Arc<AtomicUsize>,
        Arc<Mutex<Vec<(String, Instant)>>>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatches = Arc::new(Mutex::new(Vec::new()));
        let (c, d) = (Arc::clone(&calls), Arc::clone(&dispatches));
        let lane = RateLimitedLane::new(COOL_DOWN, move |key: String| {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            d.lock().unwrap().push((key.clone(), Instant::now()));
            async move {
                tokio::time::sleep(work).await;
                if key.starts_with("bad") {
                    Err(TestError::Failed(format!("{key}#{n}")))
                } else {
                    Ok(format!("{key}#{n}"))
                }
            }
        });
        (lane, calls, dispatches)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_same_key_shares_one_invocation() {
        let (lane, calls, _) = spy_lane(Duration::from_secs(1));

        let first = lane.call("a".into());
        let second = lane.call("a".into());
        assert_eq!(lane.in_flight(), 1);

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first, Ok("a#1".into()));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failure_is_shared() {
        let (lane, calls, _) = spy_lane(Duration::from_secs(1));

        let (first, second) = tokio::join!(lane.call("bad".into()), lane.call("bad".into()));
        assert_eq!(first, Err(TestError::Failed("bad#1".into())));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_key_runs_again() {
        let (lane, calls, _) = spy_lane(Duration::from_secs(1));

        assert_eq!(lane.call("a".into()).await, Ok("a#1".into()));
        assert_eq!(lane.in_flight(), 0);
        assert_eq!(lane.call("a".into()).await, Ok("a#2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_dispatches_are_spaced_by_cool_down() {
        let (lane, _, dispatches) = spy_lane(Duration::from_millis(250));

        for key in ["a", "b", "c", "d"] {
            lane.call(key.into()).await.unwrap();
        }

        let times: Vec<Instant> = dispatches.lock().unwrap().iter().map(|(_, t)| *t).collect();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= COOL_DOWN,
                "dispatch gap {:?} shorter than cool-down",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn queued_calls_dispatch_in_call_order() {
        let (lane, calls, dispatches) = spy_lane(Duration::from_millis(10));

        let c = lane.call("c".into());
        let a = lane.call("a".into());
        let b = lane.call("b".into());
        let again = lane.call("a".into());
        // Await out of order; dispatch order is fixed at call time.
        let (b, again, a, c) = tokio::join!(b, again, a, c);
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(a, again);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let order: Vec<String> = dispatches.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_stall_the_lane() {
        let (lane, _, dispatches) = spy_lane(Duration::from_millis(10));

        let bad = lane.call("bad".into());
        let good = lane.call("good".into());
        assert!(bad.await.is_err());
        assert_eq!(good.await, Ok("good#2".into()));

        let times: Vec<Instant> = dispatches.lock().unwrap().iter().map(|(_, t)| *t).collect();
        assert!(times[1] - times[0] >= COOL_DOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_does_not_stop_the_chain() {
        let (lane, calls, _) = spy_lane(Duration::from_millis(10));

        drop(lane.call("a".into()));
        assert_eq!(lane.call("b".into()).await, Ok("b#2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_op_reports_aborted_and_evicts() {
        let dispatches = Arc::new(Mutex::new(Vec::new()));
        let d = Arc::clone(&dispatches);
        let lane: RateLimitedLane<u32, u32, TestError> =
            RateLimitedLane::new(COOL_DOWN, move |key: u32| {
                d.lock().unwrap().push(Instant::now());
                async move {
                    if key == 0 {
                        panic!("boom");
                    }
                    Ok(key)
                }
            });

        let queued = lane.call(7);
        let panicked = lane.call(0);
        let behind_panic = lane.call(1);
        assert_eq!(queued.await, Ok(7));
        assert_eq!(panicked.await, Err(TestError::Aborted));
        assert_eq!(behind_panic.await, Ok(1));
        assert_eq!(lane.in_flight(), 0);

        let times = dispatches.lock().unwrap().clone();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= COOL_DOWN,
                "dispatch gap {:?} shorter than cool-down",
                pair[1] - pair[0]
            );
        }
    }
}
