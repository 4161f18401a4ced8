//! Error types for coordination primitives

use thiserror::Error;

use crate::ProcessId;

/// Core coordination errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DcpError {
    // Mailbox errors
    #[error("Mailbox is empty")]
    Empty,

    // Wait errors
    #[error("Blocking wait interrupted")]
    Interrupted,

    // Protocol errors
    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("Unknown process: {0}")]
    UnknownProcess(ProcessId),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Lifecycle errors
    #[error("Failed to spawn process thread: {0}")]
    Spawn(String),

    #[error("Process {0} panicked")]
    ProcessPanicked(ProcessId),
}

/// Result type for coordination operations
pub type DcpResult<T> = Result<T, DcpError>;
