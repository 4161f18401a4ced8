//! DCP Test Harness - Multi-process scenarios and protocol validation
//!
//! This crate provides:
//! - A cluster of coordinators wired to one in-process bus
//! - A bus observer recording the token's path around the ring
//! - A critical-section probe detecting overlapping holders
//! - A workload driver mixing messaging, barriers and critical sections
//! - End-to-end scenarios over the whole stack

pub mod cluster;
pub mod scenarios;
pub mod trace;
pub mod workload;

pub use cluster::*;
pub use trace::*;
pub use workload::*;
