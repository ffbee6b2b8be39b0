//! Workflow execution engine

pub mod engine;
pub mod shell;

pub use engine::{ExecutionError, WorkflowEngine};
pub use shell::{ShellError, ShellOutput, ShellRunner, SystemShell};
