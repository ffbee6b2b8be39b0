//! plumber - config-driven URL routing daemon for browser-pipes

pub mod cli;
pub mod core;
pub mod execution;
pub mod transport;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::execution::{ExecutionError, SystemShell, WorkflowEngine};
pub use crate::transport::{Envelope, Response, Status};
