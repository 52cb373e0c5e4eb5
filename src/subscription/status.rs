//! Connection status tracking with multiple listeners

use super::ConnectionStatus;
use crate::telemetry::{increment, CounterMetric};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;

type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct Listener {
    id: u64,
    callback: StatusCallback,
}

type ListenerSet = Mutex<Vec<Listener>>;

/// Holds the current connection status and notifies listeners on transitions
///
/// Listeners run in registration order, only when the value actually changes.
pub struct ConnectionMonitor {
    current: watch::Sender<ConnectionStatus>,
    listeners: Arc<ListenerSet>,
    transitions: Mutex<()>,
    next_id: AtomicU64,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (current, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            current,
            listeners: Arc::new(Mutex::new(Vec::new())),
            transitions: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.current.borrow()
    }

    /// Receiver that observes every future transition
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.current.subscribe()
    }

    /// Register a listener; it stays registered until the handle is removed or dropped
    pub fn on_change<F>(&self, listener: F) -> StatusListener
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push(Listener {
            id,
            callback: Arc::new(listener),
        });

        StatusListener {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Record a transport observation
    pub(crate) fn set(&self, status: ConnectionStatus) {
        let _order = lock(&self.transitions);

        let changed = self.current.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if !changed {
            return;
        }

        increment(CounterMetric::StatusTransition);
        tracing::info!(%status, "Connection status changed");

        let callbacks: Vec<StatusCallback> = lock(&self.listeners)
            .iter()
            .map(|l| l.callback.clone())
            .collect();

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
                increment(CounterMetric::CallbackPanic);
                tracing::error!(%status, "Connection status listener panicked");
            }
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle for a connection status listener
///
/// Dropping the handle deregisters the listener.
pub struct StatusListener {
    id: u64,
    listeners: Weak<ListenerSet>,
}

impl StatusListener {
    pub fn remove(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).retain(|l| l.id != self.id);
        }
    }
}

impl Drop for StatusListener {
    fn drop(&mut self) {
        self.remove();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_default_disconnected() {
        let monitor = ConnectionMonitor::new();
        assert_eq!(monitor.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_all_listeners_notified() {
        let monitor = ConnectionMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = seen.clone();
        let _first = monitor.on_change(move |s| a.lock().unwrap().push(("a", s)));
        let b = seen.clone();
        let _second = monitor.on_change(move |s| b.lock().unwrap().push(("b", s)));

        monitor.set(ConnectionStatus::Connected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("a", ConnectionStatus::Connected),
                ("b", ConnectionStatus::Connected)
            ]
        );
    }

    #[test]
    fn test_only_transitions_notify() {
        let monitor = ConnectionMonitor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _listener = monitor.on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        monitor.set(ConnectionStatus::Disconnected);
        monitor.set(ConnectionStatus::Connected);
        monitor.set(ConnectionStatus::Connected);
        monitor.set(ConnectionStatus::Disconnected);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_handle_deregisters() {
        let monitor = ConnectionMonitor::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let listener = monitor.on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let _other = monitor.on_change(|_| {});
        assert_eq!(monitor.listener_count(), 2);

        drop(listener);
        assert_eq!(monitor.listener_count(), 1);

        monitor.set(ConnectionStatus::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let monitor = ConnectionMonitor::new();
        let count = Arc::new(AtomicUsize::new(0));

        let _bad = monitor.on_change(|_| panic!("listener failure"));
        let c = count.clone();
        let _good = monitor.on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        monitor.set(ConnectionStatus::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_watch_receiver_sees_transition() {
        let monitor = ConnectionMonitor::new();
        let mut rx = monitor.watch();

        monitor.set(ConnectionStatus::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);
    }
}
