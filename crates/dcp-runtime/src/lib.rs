//! DCP Runtime - Per-process coordination
//!
//! This crate implements the coordinator every process owns:
//! 1. Lamport-stamped broadcast and dedicated messaging
//! 2. Mailbox with blocking retrieval by sender
//! 3. Barrier synchronization across all processes
//! 4. Token-ring mutual exclusion
//! 5. Process lifecycle (spawn, stop, wait)

pub mod config;
pub mod mailbox;
pub mod coordinator;
pub mod process;
mod barrier;
mod gate;

pub use config::*;
pub use mailbox::*;
pub use coordinator::*;
pub use process::*;
