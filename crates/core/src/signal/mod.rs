//! Shared state cell with synchronous change notification.
//!
//! Each cell holds one snapshot that is mutated in place for the lifetime of
//! the owning service. Subscribers are called once with the current value
//! as soon as they subscribe, then after every update that changes it.
//! Listeners run on the updating thread, outside the internal lock, so they
//! may read the cell again.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct Inner<S> {
    state: S,
    listeners: BTreeMap<u64, Listener<S>>,
    next_id: u64,
}

pub struct StateCell<S> {
    inner: Arc<Mutex<Inner<S>>>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> StateCell<S>
where
    S: Clone + PartialEq + Send + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                listeners: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Copy of the current state.
    pub fn get(&self) -> S {
        self.lock().state.clone()
    }

    /// Registers `listener` and immediately calls it with the current state.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let listener: Listener<S> = Arc::new(listener);
        let (id, snapshot) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.insert(id, listener.clone());
            (id, inner.state.clone())
        };

        listener(&snapshot);

        let weak: Weak<Mutex<Inner<S>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        })
    }

    /// Applies `mutate` and notifies subscribers if the state changed.
    /// Returns whether a notification went out.
    pub fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut S),
    {
        let listeners: Vec<Listener<S>> = {
            let mut inner = self.lock();
            let before = inner.state.clone();
            mutate(&mut inner.state);
            if inner.state == before {
                return false;
            }
            inner.listeners.values().cloned().collect()
        };

        // A listener may update the cell again; later listeners then get
        // the newest state, never an older one after a newer one.
        for listener in listeners {
            let snapshot = self.get();
            listener(&snapshot);
        }
        true
    }

    pub fn set(&self, state: S) -> bool {
        self.update(|current| *current = state)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Ok(inner) => f
                .debug_struct("StateCell")
                .field("state", &inner.state)
                .field("listeners", &inner.listeners.len())
                .finish(),
            Err(_) => f.debug_struct("StateCell").finish_non_exhaustive(),
        }
    }
}

/// Handle returned by [`StateCell::subscribe`]; unsubscribes on drop.
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription that owns nothing, for observers with no listener set.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value: &u32| sink.lock().unwrap().push(*value))
    }

    #[test]
    fn subscribers_receive_current_state_immediately() {
        let cell = StateCell::new(7_u32);
        let (seen, listener) = recorder();
        let _sub = cell.subscribe(listener);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn identical_updates_are_not_broadcast() {
        let cell = StateCell::new(1_u32);
        let (seen, listener) = recorder();
        let _sub = cell.subscribe(listener);

        assert!(cell.set(2));
        assert!(!cell.set(2));
        assert!(cell.update(|value| *value += 1));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn dropping_the_subscription_stops_delivery() {
        let cell = StateCell::new(0_u32);
        let (seen, listener) = recorder();
        let sub = cell.subscribe(listener);
        assert_eq!(cell.subscriber_count(), 1);

        sub.unsubscribe();
        cell.set(5);

        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn listeners_may_read_the_cell() {
        let cell = StateCell::new(0_u32);
        let reader = cell.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = cell.subscribe(move |_| sink.lock().unwrap().push(reader.get()));

        cell.set(9);
        assert_eq!(*seen.lock().unwrap(), vec![0, 9]);
    }

    #[test]
    fn nested_updates_never_leave_a_listener_with_stale_state() {
        let cell = StateCell::new(0_u32);
        let writer = cell.clone();
        let _first = cell.subscribe(move |value| {
            if *value == 1 {
                writer.set(2);
            }
        });
        let (seen, listener) = recorder();
        let _second = cell.subscribe(listener);

        cell.set(1);

        assert_eq!(cell.get(), 2);
        assert_eq!(seen.lock().unwrap().last(), Some(&2));
        assert!(!seen.lock().unwrap().contains(&1));
    }

    #[test]
    fn subscription_outliving_the_cell_is_harmless() {
        let cell = StateCell::new(0_u32);
        let sub = cell.subscribe(|_| {});
        drop(cell);
        drop(sub);
    }
}
