use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::trace;

/// Per-key deduplication of concurrent work (singleflight).
///
/// The first caller for a key runs its future; callers arriving while it is
/// in flight wait for and receive a clone of its result. If the running
/// caller is dropped before finishing, one of the waiters takes over.
pub struct InFlight<T> {
    slots: Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let leader = loop {
            let waiting = {
                let mut slots = self.lock();
                match slots.get(key) {
                    Some(rx) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slots.insert(key.to_owned(), rx);
                        break Leader {
                            owner: self,
                            key: key.to_owned(),
                            tx,
                        };
                    }
                }
            };

            trace!(key, "waiting on in-flight work");
            let mut rx = waiting;
            let finished = match rx.wait_for(Option::is_some).await {
                Ok(done) => (*done).clone(),
                Err(_) => None,
            };
            if let Some(value) = finished {
                return value;
            }
            // The previous owner went away without a result; try again.
        };

        let value = work().await;
        leader.tx.send_replace(Some(value.clone()));
        value
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, watch::Receiver<Option<T>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Leader<'a, T: Clone + Send + Sync> {
    owner: &'a InFlight<T>,
    key: String,
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone + Send + Sync> Drop for Leader<'_, T> {
    fn drop(&mut self) {
        // The slot is released before `tx` drops, so a waiter that sees the
        // channel close always finds the key free.
        let mut slots = self.owner.lock();
        if slots
            .get(&self.key)
            .is_some_and(|rx| rx.same_channel(&self.tx.subscribe()))
        {
            slots.remove(&self.key);
        }
    }
}
