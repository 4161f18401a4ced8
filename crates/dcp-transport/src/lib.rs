//! DCP Transport - Publish/subscribe layer between coordinators
//!
//! This crate provides:
//! - The transport contract consumed by coordinators (publish, subscribe)
//! - The delivery callback contract implemented by subscribers
//! - An in-process bus with one delivery thread per subscriber

pub mod transport;
pub mod local;

pub use transport::*;
pub use local::*;
