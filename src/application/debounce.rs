//! Trailing-edge debouncing for filter inputs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::debounce";

type Action<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Runs `action` with the latest value once `delay` has passed without a newer call.
pub struct Debouncer<T> {
    delay: Duration,
    action: Action<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, action: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value`, superseding any call still waiting.
    ///
    /// Outside a Tokio runtime, or with a zero delay, the action runs immediately.
    pub fn call(&self, value: T) {
        let mut pending = mutex_lock(&self.pending, SOURCE, "call");
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !self.delay.is_zero() => handle,
            _ => {
                drop(pending);
                (self.action)(value);
                return;
            }
        };

        let action = Arc::clone(&self.action);
        let delay = self.delay;
        *pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action(value);
        }));
    }

    /// Drop the waiting call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = mutex_lock(&self.pending, SOURCE, "cancel").take() {
            debug!(target = SOURCE, "cancelled pending debounced call");
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        mutex_lock(&self.pending, SOURCE, "is_pending")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = match self.pending.get_mut() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value| sink.lock().expect("sink").push(value))
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_value_in_a_burst_fires() {
        let (seen, action) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300), action);

        debouncer.call(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.call(2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.call(3);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(seen.lock().expect("seen").is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*seen.lock().expect("seen"), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_the_waiting_value() {
        let (seen, action) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(100), action);

        debouncer.call(7);
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(seen.lock().expect("seen").is_empty());
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn runs_immediately_without_runtime() {
        let (seen, action) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(100), action);
        debouncer.call(4);
        assert_eq!(*seen.lock().expect("seen"), vec![4]);
    }
}
