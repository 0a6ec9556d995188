//! Change watcher.
//!
//! A [`Watcher`] registers selector/effect pairs against a store. On every
//! store notification each subscription recomputes its snapshot and compares
//! it with the last one by value. Only when the snapshot changed does it mint a
//! new generation and invoke the effect, synchronously, with the new snapshot,
//! a guarded [`Io`], a dispatcher, and the previous snapshot.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::generation::{Generation, LiveGeneration};
use super::guard::Io;
use crate::store::{Dispatcher, Reducer, Store, Unsubscribe};
use crate::sync::SyncError;
use crate::transport::Transport;

/// Per-registration record: last snapshot and live generation.
struct Subscription<T> {
    name: &'static str,
    last: Mutex<Option<T>>,
    live: LiveGeneration,
    firings: Arc<AtomicU64>,
}

impl<T> Subscription<T>
where
    T: Clone + PartialEq,
{
    fn on_notify<A, E>(&self, next: T, transport: &Transport, dispatcher: &Dispatcher<A>, effect: &E)
    where
        E: Fn(&T, Io, &Dispatcher<A>, Option<&T>) -> Result<(), SyncError>,
    {
        let previous = {
            let mut last = self.last.lock();
            if last.as_ref() == Some(&next) {
                return;
            }
            last.replace(next.clone())
        };

        let generation = self.live.advance();
        self.firings.fetch_add(1, Ordering::Relaxed);
        debug!(
            subscription = self.name,
            generation = %generation,
            "snapshot changed"
        );

        let io = Io::new(transport.clone(), generation, self.live.clone());
        if let Err(e) = effect(&next, io, dispatcher, previous.as_ref()) {
            warn!(
                subscription = self.name,
                generation = %generation,
                error = %e,
                "effect failed"
            );
        }
    }
}

/// Handle to a registered subscription.
#[derive(Debug)]
pub struct Registration {
    name: &'static str,
    live: LiveGeneration,
    firings: Arc<AtomicU64>,
    unsubscribe: Unsubscribe,
}

impl Registration {
    /// Name given at registration, used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The live generation, if the effect has fired.
    pub fn generation(&self) -> Option<Generation> {
        self.live.current()
    }

    /// How many times the effect has fired.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }

    /// Stop reacting to store notifications.
    pub fn unsubscribe(self) {
        self.unsubscribe.unsubscribe();
    }
}

/// Registers subscriptions against one store and one transport.
pub struct Watcher<S, A> {
    store: Store<S, A>,
    transport: Transport,
}

impl<S, A> Watcher<S, A>
where
    S: Reducer<A> + Send + Sync + 'static,
    A: Debug + Send + 'static,
{
    pub fn new(store: &Store<S, A>, transport: &Transport) -> Self {
        Self {
            store: store.clone(),
            transport: transport.clone(),
        }
    }

    /// Register a selector and the effect to run whenever its output changes.
    ///
    /// The selector must be pure; it runs under the store's read lock on every
    /// notification. The first notification after registration always fires.
    pub fn register<T, Sel, Eff>(&self, name: &'static str, selector: Sel, effect: Eff) -> Registration
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        Sel: Fn(&S) -> T + Send + Sync + 'static,
        Eff: Fn(&T, Io, &Dispatcher<A>, Option<&T>) -> Result<(), SyncError> + Send + Sync + 'static,
    {
        let subscription = Arc::new(Subscription {
            name,
            last: Mutex::new(None),
            live: LiveGeneration::new(),
            firings: Arc::new(AtomicU64::new(0)),
        });

        let store = self.store.downgrade();
        let dispatcher = self.store.dispatcher();
        let transport = self.transport.clone();
        let listener_subscription = Arc::clone(&subscription);

        let unsubscribe = self.store.subscribe(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            let next = store.select(|state| selector(state));
            drop(store);
            listener_subscription.on_notify(next, &transport, &dispatcher, &effect);
        });

        debug!(subscription = name, "registered");

        Registration {
            name,
            live: subscription.live.clone(),
            firings: Arc::clone(&subscription.firings),
            unsubscribe,
        }
    }

    /// The store this watcher observes.
    pub fn store(&self) -> &Store<S, A> {
        &self.store
    }

    /// The transport handed to effects.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}
