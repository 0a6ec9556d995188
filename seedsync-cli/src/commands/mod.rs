//! Command implementations.

pub mod check;
pub mod common;
pub mod eval;
pub mod init;
pub mod values;
pub mod watch;
