//! Change watching and stale-response suppression.
//!
//! This module is the core of the engine:
//!
//! - [`Watcher`] turns store notifications into effect firings, one per
//!   change of a selected snapshot.
//! - [`Generation`] and [`LiveGeneration`] identify firings and track which
//!   one is current for each subscription.
//! - [`Io`] is the guarded transport an effect receives. Responses that
//!   arrive after a newer firing of the same subscription are reported as
//!   [`crate::transport::TransportError::Stale`] and must be dropped.

mod generation;
mod guard;
mod watcher;

pub use generation::{Generation, LiveGeneration};
pub use guard::Io;
pub use watcher::{Registration, Watcher};
