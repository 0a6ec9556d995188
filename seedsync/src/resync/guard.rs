//! Guarded transport handed to effects.
//!
//! An [`Io`] is stamped with the generation of the firing that created it and
//! shares the subscription's live generation cell. When a response arrives, it
//! is released to the caller only if the stamp is still live; otherwise the
//! call yields [`TransportError::Stale`] and the caller drops the result.
//!
//! The request itself is never aborted. Only the application of its result is
//! gated, which turns "last response to arrive wins" into "last request issued
//! wins". Results go back through [`Io::dispatch`], which repeats the check
//! under the store's write lock so a firing that starts after the response was
//! admitted still wins.

use std::future::Future;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::generation::{Generation, LiveGeneration};
use crate::store::Dispatcher;
use crate::transport::{Method, Request, Response, Transport, TransportError};

/// Guarded transport bound to one effect firing.
#[derive(Clone, Debug)]
pub struct Io {
    transport: Transport,
    generation: Generation,
    live: LiveGeneration,
}

impl Io {
    pub(crate) fn new(transport: Transport, generation: Generation, live: LiveGeneration) -> Self {
        Self {
            transport,
            generation,
            live,
        }
    }

    /// The generation this handle was stamped with.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether this handle's generation is still the live one.
    pub fn is_current(&self) -> bool {
        self.live.is_current(self.generation)
    }

    /// Apply `action` only if this handle is still current when the store's
    /// write lock is held. Returns whether it was applied.
    pub fn dispatch<A>(&self, dispatcher: &Dispatcher<A>, action: A) -> bool {
        let applied = dispatcher.dispatch_if(action, || self.is_current());
        if !applied {
            debug!(
                generation = %self.generation,
                live = ?self.live.current(),
                "dropping stale result"
            );
        }
        applied
    }

    /// Guarded GET.
    pub async fn get(&self, url: &str) -> Result<Response, TransportError> {
        self.send(Request::get(url)).await
    }

    /// Guarded POST with a JSON body.
    pub async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<Response, TransportError> {
        self.send(Request::with_body(Method::Post, url, Some(body))).await
    }

    /// Guarded PUT with a JSON body.
    pub async fn put(&self, url: &str, body: serde_json::Value) -> Result<Response, TransportError> {
        self.send(Request::with_body(Method::Put, url, Some(body))).await
    }

    /// Guarded DELETE.
    pub async fn delete(&self, url: &str) -> Result<Response, TransportError> {
        self.send(Request::with_body(Method::Delete, url, None)).await
    }

    /// Guarded GET decoded as JSON.
    ///
    /// Decoding runs after the staleness check with no suspension in between.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        self.get(url).await?.json()
    }

    /// Spawn handler work on the engine runtime.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.transport.spawn(future);
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = request.url.clone();
        let result = self.transport.send(request).await;
        self.admit(&url, result)
    }

    /// Applies the staleness guard, then the status check.
    ///
    /// Errors from superseded requests are reported as stale too, so a late
    /// failure can never overwrite a newer value with `None`.
    fn admit(
        &self,
        url: &str,
        result: Result<Response, TransportError>,
    ) -> Result<Response, TransportError> {
        if !self.is_current() {
            debug!(
                generation = %self.generation,
                live = ?self.live.current(),
                url,
                "dropping stale response"
            );
            return Err(TransportError::Stale {
                generation: self.generation,
            });
        }
        result?.error_for_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockHttpClient;
    use serde_json::json;
    use std::sync::Arc;

    fn io_pair() -> (Arc<MockHttpClient>, Transport, LiveGeneration) {
        let mock = Arc::new(MockHttpClient::new());
        let transport = Transport::from_current(mock.clone()).unwrap();
        (mock, transport, LiveGeneration::new())
    }

    #[tokio::test]
    async fn test_current_response_is_released() {
        let (mock, transport, live) = io_pair();
        mock.respond("/value", 200, json!({"v": 1}));

        let io = Io::new(transport, live.advance(), live.clone());
        let json: serde_json::Value = io.get_json("/value").await.unwrap();
        assert_eq!(json["v"], 1);
    }

    #[tokio::test]
    async fn test_superseded_response_is_stale() {
        let (mock, transport, live) = io_pair();
        mock.hold("/value");

        let io = Io::new(transport, live.advance(), live.clone());
        let request = tokio::spawn({
            let io = io.clone();
            async move { io.get("/value").await }
        });

        while mock.parked("/value") == 0 {
            tokio::task::yield_now().await;
        }
        live.advance();
        mock.release("/value", 200, json!({"v": 1}));

        let result = request.await.unwrap();
        assert!(matches!(result, Err(TransportError::Stale { .. })));
        assert!(!io.is_current());
    }

    #[tokio::test]
    async fn test_stale_failure_is_reported_as_stale() {
        let (mock, transport, live) = io_pair();
        mock.fail("/value", "connection reset");

        let io = Io::new(transport, live.advance(), live.clone());
        live.advance();

        let result = io.get("/value").await;
        assert!(result.unwrap_err().is_stale());
    }

    #[tokio::test]
    async fn test_error_status_on_current_generation() {
        let (mock, transport, live) = io_pair();
        mock.respond("/value", 500, json!({}));

        let io = Io::new(transport, live.advance(), live.clone());
        let result = io.get("/value").await;
        assert!(matches!(result, Err(TransportError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_dispatch_drops_result_of_superseded_firing() {
        let (_mock, transport, live) = io_pair();
        let applied = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&applied);
        let dispatcher = Dispatcher::from_fn(move |value: u32| sink.lock().push(value));

        let older = Io::new(transport.clone(), live.advance(), live.clone());
        assert!(older.dispatch(&dispatcher, 1));

        let newer = Io::new(transport, live.advance(), live.clone());
        assert!(!older.dispatch(&dispatcher, 2));
        assert!(newer.dispatch(&dispatcher, 3));
        assert_eq!(applied.lock().as_slice(), [1, 3]);
    }

    #[tokio::test]
    async fn test_mutating_verbs_are_guarded() {
        let (mock, transport, live) = io_pair();
        mock.respond("/saves/", 201, json!({"id": 7}));

        let io = Io::new(transport, live.advance(), live.clone());
        assert!(io.post("/saves/", json!({"title": "a"})).await.is_ok());
        assert!(io.put("/saves/7/", json!({"title": "b"})).await.is_ok());

        live.advance();
        assert!(io.delete("/saves/7/").await.unwrap_err().is_stale());
        assert_eq!(mock.count("/saves/"), 3);
    }
}
