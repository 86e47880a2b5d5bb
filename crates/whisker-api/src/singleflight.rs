// ── Request coalescing ──
//
// One in-flight operation per key. Concurrent callers for the same key
// wait for the leader's flight to close instead of issuing their own
// call, then re-read whatever authoritative state the leader produced.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::watch;

/// Outcome of [`SingleFlightGate::run_exclusive`].
#[derive(Debug)]
pub enum Flight<T> {
    /// This caller executed the operation and holds its result.
    Led(T),
    /// Another flight was open when this caller arrived; it has since
    /// completed. The caller should re-read the state the leader wrote
    /// (for fetches, the cache entry).
    Followed,
}

/// Coalesces concurrent identical operations into one execution.
///
/// The first caller for a key becomes the leader and runs the
/// operation. Everyone arriving while that flight is open waits for
/// completion and returns [`Flight::Followed`]. The in-flight mark is
/// cleared on every exit path -- success, error result, or panic --
/// so a failed flight can never wedge the key.
pub struct SingleFlightGate {
    inflight: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

enum Entry {
    Leader(watch::Sender<bool>),
    Follower(watch::Receiver<bool>),
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` unless a flight for `key` is already open, in which
    /// case wait for it and return [`Flight::Followed`].
    pub async fn run_exclusive<F, Fut, T>(&self, key: &str, op: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let entry = {
            let mut inflight = self.inflight.lock().expect("singleflight mutex poisoned");
            if let Some(rx) = inflight.get(key) {
                Entry::Follower(rx.clone())
            } else {
                let (tx, rx) = watch::channel(false);
                inflight.insert(key.to_owned(), rx);
                Entry::Leader(tx)
            }
        };

        match entry {
            Entry::Follower(mut rx) => {
                // The watch channel retains its value, so a flight that
                // closed between our map read and this await is still
                // observed.
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
                Flight::Followed
            }
            Entry::Leader(tx) => {
                let _guard = FlightGuard {
                    gate: self,
                    key: key.to_owned(),
                    tx,
                };
                Flight::Led(op().await)
            }
        }
    }
}

impl Default for SingleFlightGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the flight on drop: clears the in-flight mark and wakes every
/// waiter, regardless of how the leader's future ended.
struct FlightGuard<'a> {
    gate: &'a SingleFlightGate,
    key: String,
    tx: watch::Sender<bool>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = match self.gate.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inflight.remove(&self.key);
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn counted_flight(gate: &SingleFlightGate, counter: &AtomicUsize) -> Flight<u32> {
        gate.run_exclusive("fetch", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            42
        })
        .await
    }

    #[tokio::test]
    async fn concurrent_callers_execute_once() {
        let gate = Arc::new(SingleFlightGate::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b, c, d) = tokio::join!(
            counted_flight(&gate, &counter),
            counted_flight(&gate, &counter),
            counted_flight(&gate, &counter),
            counted_flight(&gate, &counter),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let led = [&a, &b, &c, &d]
            .iter()
            .filter(|f| matches!(f, Flight::Led(42)))
            .count();
        let followed = [&a, &b, &c, &d]
            .iter()
            .filter(|f| matches!(f, Flight::Followed))
            .count();
        assert_eq!(led, 1);
        assert_eq!(followed, 3);
    }

    #[tokio::test]
    async fn key_released_after_failed_flight() {
        let gate = SingleFlightGate::new();

        let first: Flight<Result<(), &str>> =
            gate.run_exclusive("fetch", || async { Err("boom") }).await;
        assert!(matches!(first, Flight::Led(Err("boom"))));

        // The failed flight must not leave the key busy.
        let second = gate.run_exclusive("fetch", || async { Ok::<_, &str>(()) }).await;
        assert!(matches!(second, Flight::Led(Ok(()))));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let gate = Arc::new(SingleFlightGate::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let run = |key: &'static str| {
            let gate = Arc::clone(&gate);
            let counter = Arc::clone(&counter);
            async move {
                gate.run_exclusive(key, || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
            }
        };

        let (a, b) = tokio::join!(run("alpha"), run("beta"));
        assert!(matches!(a, Flight::Led(())));
        assert!(matches!(b, Flight::Led(())));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
