//! Reducer-driven state container.
//!
//! The store is the only shared mutable resource of the engine. State changes
//! exclusively through [`Store::dispatch`], which applies one action under the
//! write lock, releases it, and then notifies every listener synchronously.
//! Listeners may dispatch again from inside a notification; the nested action is
//! reduced and notified before the outer notification continues.
//!
//! # Example
//!
//! ```
//! use seedsync::store::{Reducer, Store};
//!
//! #[derive(Clone, Default)]
//! struct Counter(i64);
//!
//! #[derive(Debug)]
//! enum CounterAction {
//!     Add(i64),
//! }
//!
//! impl Reducer<CounterAction> for Counter {
//!     fn reduce(&mut self, action: &CounterAction) {
//!         match action {
//!             CounterAction::Add(n) => self.0 += n,
//!         }
//!     }
//! }
//!
//! let store = Store::new(Counter::default());
//! store.dispatch(CounterAction::Add(2));
//! assert_eq!(store.select(|c| c.0), 2);
//! ```

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

/// Applies actions to a state value.
pub trait Reducer<A> {
    /// Apply a single action in place.
    fn reduce(&mut self, action: &A);
}

type Listener = Arc<dyn Fn() + Send + Sync>;

struct StoreInner<S, A> {
    state: RwLock<S>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    _action: PhantomData<fn(A)>,
}

impl<S, A> StoreInner<S, A>
where
    S: Reducer<A>,
    A: Debug,
{
    /// Reduce `action` if `admit` holds, checked under the write lock, then
    /// notify. Returns whether the action was applied.
    fn dispatch_if(&self, action: A, admit: &dyn Fn() -> bool) -> bool {
        {
            let mut state = self.state.write();
            if !admit() {
                trace!(action = ?action, "action not admitted");
                return false;
            }
            trace!(action = ?action, "dispatch");
            state.reduce(&action);
        }

        // Snapshot the listener list so listeners can subscribe, unsubscribe
        // or dispatch without holding the registry lock.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener();
        }
        true
    }
}

/// Observable state container with single-writer dispatch.
pub struct Store<S, A> {
    inner: Arc<StoreInner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> Store<S, A>
where
    S: Reducer<A> + Send + Sync + 'static,
    A: Debug + Send + 'static,
{
    /// Create a store holding the given initial state.
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                _action: PhantomData,
            }),
        }
    }

    /// Returns a copy of the current state.
    pub fn get_state(&self) -> S
    where
        S: Clone,
    {
        self.inner.state.read().clone()
    }

    /// Runs a read-only projection against the current state.
    pub fn select<T>(&self, selector: impl FnOnce(&S) -> T) -> T {
        selector(&self.inner.state.read())
    }

    /// Applies an action and notifies every listener.
    pub fn dispatch(&self, action: A) {
        self.inner.dispatch_if(action, &|| true);
    }

    /// Registers a listener invoked after every dispatched action.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let weak = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// A dispatch-only handle that does not keep the store alive.
    pub fn dispatcher(&self) -> Dispatcher<A> {
        let weak = Arc::downgrade(&self.inner);
        let dispatch: Arc<DispatchFn<A>> =
            Arc::new(move |action: A, admit: &dyn Fn() -> bool| match weak.upgrade() {
                Some(inner) => inner.dispatch_if(action, admit),
                None => {
                    trace!(action = ?action, "store dropped, action discarded");
                    false
                }
            });
        Dispatcher { dispatch }
    }

    pub(crate) fn downgrade(&self) -> WeakStore<S, A> {
        WeakStore(Arc::downgrade(&self.inner))
    }
}

/// Non-owning reference to a store, used by subscriptions to avoid cycles.
pub(crate) struct WeakStore<S, A>(Weak<StoreInner<S, A>>);

impl<S, A> Clone for WeakStore<S, A> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<S, A> WeakStore<S, A> {
    pub(crate) fn upgrade(&self) -> Option<Store<S, A>> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

type DispatchFn<A> = dyn Fn(A, &dyn Fn() -> bool) -> bool + Send + Sync;

/// Cloneable dispatch handle handed to effects.
pub struct Dispatcher<A> {
    dispatch: Arc<DispatchFn<A>>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<A> Dispatcher<A> {
    /// Dispatch an action to the underlying store, if it still exists.
    pub fn dispatch(&self, action: A) {
        (self.dispatch)(action, &|| true);
    }

    /// Dispatch only if `admit` still holds once the store's write lock is
    /// taken. Nothing else can reduce between the check and the reduction.
    /// Returns whether the action was applied.
    pub fn dispatch_if(&self, action: A, admit: impl Fn() -> bool) -> bool {
        (self.dispatch)(action, &admit)
    }

    /// Build a dispatcher from an arbitrary sink. Useful in tests.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let dispatch: Arc<DispatchFn<A>> = Arc::new(move |action: A, admit: &dyn Fn() -> bool| {
            if !admit() {
                return false;
            }
            f(action);
            true
        });
        Self { dispatch }
    }
}

impl<A> std::fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// Handle that removes a listener when [`Unsubscribe::unsubscribe`] is called.
///
/// Dropping the handle leaves the listener registered.
pub struct Unsubscribe {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscribe {
    pub(crate) fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Remove the listener from the store.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
