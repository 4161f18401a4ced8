//! DCP Core - Fundamental types shared by every process
//!
//! This crate defines the types exchanged between coordinators:
//! - Process identity and ring topology (ProcessId, Ring)
//! - Envelopes and accepted application messages
//! - Token state machine
//! - Error types

pub mod id;
pub mod ring;
pub mod envelope;
pub mod token;
pub mod error;

pub use id::*;
pub use ring::*;
pub use envelope::*;
pub use token::*;
pub use error::*;
