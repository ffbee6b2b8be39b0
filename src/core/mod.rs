//! Core domain models for plumber
//!
//! This module defines the configuration types, the runtime parameter
//! scope, URL canonicalization, and the config JSON Schema export.

pub mod config;
pub mod schema;
pub mod scope;
pub mod urlclean;

pub use config::{Config, Job, Parameter, Step, Workflow, WorkflowJob};
pub use scope::Scope;
