//! Runtime-bound transport handle.
//!
//! [`Transport`] couples the real [`HttpClient`] with the Tokio runtime that
//! handler work runs on. Every spawned task is counted while it runs so callers
//! can wait until the engine has settled, and every task races the shared
//! shutdown token so nothing dispatches after the engine is stopped.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::TransportError;
use super::http::{HttpClient, Request, Response};

/// Counter of in-flight handler tasks.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight counter when the task finishes, however it ends.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// The real transport shared by all subscriptions of an engine.
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn HttpClient>,
    handle: Handle,
    in_flight: Arc<InFlight>,
    shutdown: CancellationToken,
}

impl Transport {
    /// Create a transport that spawns onto the given runtime.
    pub fn new(client: Arc<dyn HttpClient>, handle: Handle) -> Self {
        Self {
            client,
            handle,
            in_flight: Arc::new(InFlight::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a transport bound to the runtime of the calling task.
    pub fn from_current(client: Arc<dyn HttpClient>) -> Result<Self, TransportError> {
        let handle = Handle::try_current().map_err(|e| TransportError::Runtime(e.to_string()))?;
        Ok(Self::new(client, handle))
    }

    /// Send a request through the underlying client, without any guard.
    pub async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.client.send(request).await
    }

    /// Spawn handler work onto the runtime.
    ///
    /// The task is abandoned without running to completion once
    /// [`Transport::shutdown`] has been called.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            debug!("transport shut down, task not spawned");
            return;
        }

        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let shutdown = self.shutdown.clone();

        self.handle.spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("handler task abandoned on shutdown");
                }
                _ = future => {}
            }
        });
    }

    /// Number of handler tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Resolves once no handler task is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop all handler tasks and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether [`Transport::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("in_flight", &self.in_flight())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockHttpClient;
    use std::time::Duration;

    fn transport() -> (Arc<MockHttpClient>, Transport) {
        let mock = Arc::new(MockHttpClient::new());
        let transport = Transport::from_current(mock.clone()).unwrap();
        (mock, transport)
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_spawned() {
        let (_mock, transport) = transport();
        transport.wait_idle().await;
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_spawned_tasks() {
        let (_mock, transport) = transport();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            transport.spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(transport.in_flight(), 3);

        transport.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_tasks() {
        let (mock, transport) = transport();
        mock.hold("/never");
        let finished = Arc::new(AtomicUsize::new(0));

        let t = transport.clone();
        let finished_clone = Arc::clone(&finished);
        transport.spawn(async move {
            let _ = t.send(Request::get("/never")).await;
            finished_clone.fetch_add(1, Ordering::SeqCst);
        });

        transport.shutdown();
        transport.wait_idle().await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        transport.spawn(async {});
        assert_eq!(transport.in_flight(), 0);
    }

    #[test]
    fn test_from_current_without_runtime() {
        let mock = Arc::new(MockHttpClient::new());
        let result = Transport::from_current(mock);
        assert!(matches!(result, Err(TransportError::Runtime(_))));
    }
}
