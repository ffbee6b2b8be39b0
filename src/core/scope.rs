//! Runtime parameter scope and template resolution

use crate::core::config::Parameter;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// Name→value bindings visible to a step's templates
///
/// A scope is created fresh when a job starts and replaced when a nested
/// command is entered; `save_to` captures extend the scope of the block that
/// is currently executing and never leak out of it.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: IndexMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope for a job: system parameters first, workflow bindings overlay
    /// on name collision.
    pub fn for_job(url: &str, workflow_params: &IndexMap<String, String>) -> Self {
        let mut scope = Self::new();
        scope.inject_system(url);
        for (key, value) in workflow_params {
            scope.set(key.clone(), value.clone());
        }
        scope
    }

    /// Fresh scope for a command invocation: declared defaults, then system
    /// parameters, then the caller's resolved bindings.
    pub fn for_command(
        parameters: &IndexMap<String, Parameter>,
        url: &str,
        bindings: IndexMap<String, String>,
    ) -> Self {
        let mut scope = Self::new();
        for (name, parameter) in parameters {
            if let Some(default) = &parameter.default {
                scope.set(name.clone(), default.clone());
            }
        }
        scope.inject_system(url);
        for (key, value) in bindings {
            scope.set(key, value);
        }
        scope
    }

    fn inject_system(&mut self, url: &str) {
        self.set("url".to_string(), url.to_string());
        self.set("url_hash".to_string(), url_hash(url));
    }

    pub fn set(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Substitute `<<parameters.NAME>>` / `<< parameters.NAME >>` for every
    /// key in the scope, then the literal `{url}` token.
    ///
    /// Substitution is textual: unknown placeholders survive untouched and
    /// values are not re-expanded.
    pub fn resolve(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("<< parameters.{} >>", key), value);
            out = out.replace(&format!("<<parameters.{}>>", key), value);
        }
        if let Some(url) = self.get("url") {
            out = out.replace("{url}", url);
        }
        out
    }
}

/// First 8 hex characters of the SHA-256 of the URL
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}
