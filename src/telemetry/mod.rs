//! # Telemetry Bus
//!
//! A small last-value-plus-change-stream primitive used for all telemetry
//! fan-out. Each sensor channel keeps the most recent value and delivers
//! every change to its subscribers on the writer's thread.
//!
//! Two variants exist: *deduplicated* channels skip writes equal to the
//! current value (connection state, flight state), *raw* channels publish
//! every write (sensor samples). Subscribers must not block; cancellation
//! is idempotent and automatic on drop.

use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    last: Option<T>,
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// Single-producer, multi-consumer telemetry channel
pub struct SensorChannel<T> {
    shared: Arc<Mutex<Shared<T>>>,
    dedup: bool,
}

impl<T> Clone for SensorChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            dedup: self.dedup,
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> SensorChannel<T> {
    fn new(dedup: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                last: None,
                subscribers: Vec::new(),
                next_id: 0,
            })),
            dedup,
        }
    }

    /// Create a channel that drops writes equal to the current value
    pub fn deduplicating() -> Self {
        Self::new(true)
    }

    /// Create a channel that publishes every write
    pub fn raw() -> Self {
        Self::new(false)
    }

    /// Publish a value
    ///
    /// Updates the last-value cell and invokes every subscriber with the
    /// new value, in subscription order, on the calling thread.
    pub fn write(&self, value: T) {
        let callbacks: Vec<Callback<T>> = {
            let mut shared = self.shared.lock().unwrap();

            if self.dedup && shared.last.as_ref() == Some(&value) {
                return;
            }

            shared.last = Some(value.clone());
            shared
                .subscribers
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect()
        };

        for callback in callbacks {
            callback(&value);
        }
    }

    /// Read the most recent value, if any
    pub fn last(&self) -> Option<T> {
        self.shared.lock().unwrap().last.clone()
    }

    /// Register a subscriber
    ///
    /// The callback runs on whichever thread publishes and must not block.
    /// The returned handle cancels the subscription when dropped or when
    /// [`Subscription::cancel`] is called.
    #[must_use]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut shared = self.shared.lock().unwrap();
            let id = shared.next_id;
            shared.next_id += 1;
            shared.subscribers.push((id, Arc::new(callback)));
            id
        };

        let weak = Arc::downgrade(&self.shared);
        Subscription {
            cancel: Mutex::new(Some(Box::new(move || {
                if let Some(shared) = Weak::upgrade(&weak) {
                    shared
                        .lock()
                        .unwrap()
                        .subscribers
                        .retain(|(sub_id, _)| *sub_id != id);
                }
            }))),
        }
    }
}

/// Cancellable handle to a channel subscription
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Remove the subscriber from its channel; safe to call repeatedly
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
