//! Listener registration shared by the monitors.
//!
//! Every listener gets its own queue and delivery task, so a slow or
//! failing listener never holds up the others. Events reach one listener in
//! the order they were emitted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::WalletError;

pub type EventCallback<T> = Box<dyn Fn(&T) -> Result<(), WalletError> + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(&WalletError) + Send + Sync>;

enum Delivery<T> {
    Event(T),
    Error(WalletError),
}

struct Slots<T> {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<Delivery<T>>>,
}

type SharedSlots<T> = Arc<Mutex<Slots<T>>>;

fn lock<T>(slots: &Mutex<Slots<T>>) -> std::sync::MutexGuard<'_, Slots<T>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out of events of type `T` to registered listeners.
pub struct ListenerSet<T> {
    slots: SharedSlots<T>,
}

impl<T: Clone + Send + 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                senders: HashMap::new(),
            })),
        }
    }

    /// Register a listener. Must be called within a Tokio runtime.
    ///
    /// `on_event` failures go to `on_error`; the listener stays registered
    /// until the returned handle is cancelled or dropped.
    pub fn subscribe(
        &self,
        on_event: impl Fn(&T) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let on_event: EventCallback<T> = Box::new(on_event);
        let on_error: ErrorCallback = Box::new(on_error);
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<T>>();

        let id = {
            let mut slots = lock(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.senders.insert(id, tx);
            id
        };

        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match delivery {
                    Delivery::Event(event) => {
                        if let Err(e) = on_event(&event) {
                            on_error(&e);
                        }
                    }
                    Delivery::Error(e) => on_error(&e),
                }
            }
        });

        let slots: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        SubscriptionHandle {
            cancel: Some(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    lock(&slots).senders.remove(&id);
                }
            })),
            owned: None,
        }
    }

    /// Queue `event` for every listener.
    pub fn emit(&self, event: &T) {
        self.send(|| Delivery::Event(event.clone()));
    }

    /// Report a failure that is not tied to one listener to everybody.
    pub fn emit_error(&self, error: &WalletError) {
        self.send(|| Delivery::Error(error.clone()));
    }

    fn send(&self, make: impl Fn() -> Delivery<T>) {
        let mut slots = lock(&self.slots);
        // A closed queue means the delivery task is gone; forget it.
        slots.senders.retain(|_, tx| tx.send(make()).is_ok());
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
    /// Dropped together with the handle, after unsubscribing.
    owned: Option<Box<dyn std::any::Any + Send + Sync>>,
}

impl SubscriptionHandle {
    /// Keep `owner` alive exactly as long as this subscription.
    pub(crate) fn retain(mut self, owner: impl Send + Sync + 'static) -> Self {
        self.owned = Some(Box::new(owner));
        self
    }

    pub fn cancel(mut self) {
        self.unsubscribe();
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        self.owned = None;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn events_reach_every_listener_in_order() {
        let set = ListenerSet::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _a = set.subscribe(
            {
                let seen = seen.clone();
                move |n| {
                    seen.lock().unwrap().push(*n);
                    Ok(())
                }
            },
            |_| {},
        );
        let count = Arc::new(AtomicUsize::new(0));
        let _b = set.subscribe(
            {
                let count = count.clone();
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_| {},
        );

        for n in 1..=5 {
            set.emit(&n);
        }
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn failing_listener_stays_subscribed() {
        let set = ListenerSet::<u32>::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let _handle = set.subscribe(
            |n| {
                if n % 2 == 0 {
                    Err(WalletError::Listener(format!("even {n}")))
                } else {
                    Ok(())
                }
            },
            {
                let errors = errors.clone();
                move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
        for n in 1..=4 {
            set.emit(&n);
        }
        settle().await;
        assert_eq!(errors.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_listener_does_not_block_others() {
        let set = ListenerSet::<u32>::new();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        let _slow = set.subscribe(
            move |_| {
                let _ = gate_rx.lock().unwrap().recv_timeout(Duration::from_millis(200));
                Ok(())
            },
            |_| {},
        );
        let fast = Arc::new(AtomicUsize::new(0));
        let _fast = set.subscribe(
            {
                let fast = fast.clone();
                move |_| {
                    fast.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_| {},
        );

        set.emit(&1);
        set.emit(&2);
        for _ in 0..100 {
            if fast.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(fast.load(Ordering::SeqCst), 2);
        drop(gate_tx);
    }

    #[tokio::test]
    async fn cancel_and_drop_unsubscribe() {
        let set = ListenerSet::<u32>::new();
        let handle = set.subscribe(|_| Ok(()), |_| {});
        let other = set.subscribe(|_| Ok(()), |_| {});
        assert_eq!(set.len(), 2);
        assert!(handle.is_active());

        handle.cancel();
        assert_eq!(set.len(), 1);
        drop(other);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn emitted_errors_reach_error_callbacks() {
        let set = ListenerSet::<u32>::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let _handle = set.subscribe(|_| Ok(()), {
            let errors = errors.clone();
            move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            }
        });
        set.emit_error(&WalletError::NetworkTimeout);
        settle().await;
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
