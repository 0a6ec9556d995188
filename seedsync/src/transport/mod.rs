//! Backend transport
//!
//! This module provides the HTTP client abstraction, the query string encoder,
//! and [`Transport`], the runtime-bound handle that spawns request work and
//! tracks how much of it is still in flight.
//!
//! Responses are not guarded here. Staleness is decided by
//! [`crate::resync::Io`], which wraps a [`Transport`] together with the
//! generation of the effect firing that created it.

mod error;
mod http;
mod query;
mod runtime;

pub use error::TransportError;
pub use http::{
    BoxFuture, ClientSettings, HttpClient, Method, ReqwestClient, Request, Response,
    DEFAULT_TIMEOUT_SECS,
};
pub use query::{encode_component, url_encode};
pub use runtime::Transport;

#[cfg(test)]
pub use http::tests::MockHttpClient;
