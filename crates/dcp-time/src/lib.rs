//! DCP Time - Logical time for coordinating processes
//!
//! This crate implements Lamport's logical clock:
//! - local events advance the clock by one
//! - delivered timestamps pull the clock past the sender's value
//! - stamping couples an increment with building the outgoing envelope

pub mod clock;

pub use clock::*;
