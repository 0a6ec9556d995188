//! SeedSync - keeps remotely derived climate values in step with application state
//!
//! The library watches a reducer-driven [`store::Store`] through pure selectors.
//! Whenever a selected snapshot changes, the matching effect handler in [`sync`]
//! works out which items need refetching and issues guarded requests through
//! [`resync::Io`]. Responses belonging to a superseded snapshot are dropped, so
//! the state only ever reflects the most recently requested data.
//!
//! # Architecture
//!
//! ```text
//! dispatch ─► Store ─► Watcher (selector, equality) ─► effect handler
//!                ▲                                         │
//!                └──── per-item actions ◄── Io (guarded) ◄─┘
//! ```

pub mod arcgis;
pub mod config;
pub mod engine;
pub mod expr;
pub mod logging;
pub mod point;
pub mod resync;
pub mod state;
pub mod store;
pub mod sync;
pub mod transport;

pub use engine::{Engine, EngineConfig};
pub use point::Point;
