//! Workflow matching and job execution
//!
//! Per message, every workflow job whose match rule accepts the URL runs in
//! configuration order. Each job gets its own temporary workspace and a
//! fresh parameter scope; steps run strictly in declaration order and the
//! first failure aborts the message.

use crate::core::config::{Command, Config, Job, Step};
use crate::core::scope::Scope;
use crate::execution::shell::{ShellError, ShellRunner};
use indexmap::IndexMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info};

/// Name of the staged page capture inside the job workspace
const HTML_FILE_NAME: &str = "page.html";

/// Error types for workflow execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no matching jobs found for url: {0}")]
    NoMatch(String),

    #[error("unknown command or step: {0}")]
    UnknownStep(String),

    #[error("run step failed: exit status {0}")]
    Step(i32),

    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error("failed to create job workspace: {0}")]
    Workspace(std::io::Error),

    #[error("failed to stage page HTML: {0}")]
    Html(std::io::Error),
}

/// Per-job state shared by every step of one job invocation
struct JobContext<'a> {
    url: &'a str,
    workspace: &'a Path,
    html: Option<&'a str>,
    staged_html: Option<PathBuf>,
}

impl JobContext<'_> {
    /// Substitute `{html}` with the absolute path of the staged capture.
    ///
    /// Staging is lazy: the file is written the first time a resolved
    /// script still references the token. Without HTML in the envelope the
    /// token survives like any other unresolved placeholder.
    async fn substitute_html(&mut self, script: String) -> Result<String, ExecutionError> {
        if !script.contains("{html}") {
            return Ok(script);
        }
        let html = match self.html {
            Some(html) => html,
            None => return Ok(script),
        };

        let path = match &self.staged_html {
            Some(path) => path.clone(),
            None => {
                let path = self.workspace.join(HTML_FILE_NAME);
                tokio::fs::write(&path, html)
                    .await
                    .map_err(ExecutionError::Html)?;
                self.staged_html = Some(path.clone());
                path
            }
        };

        Ok(script.replace("{html}", &path.to_string_lossy()))
    }
}

/// Drives workflow jobs against a [`ShellRunner`]
pub struct WorkflowEngine<'a, S> {
    config: &'a Config,
    shell: S,
}

impl<'a, S: ShellRunner> WorkflowEngine<'a, S> {
    pub fn new(config: &'a Config, shell: S) -> Self {
        Self { config, shell }
    }

    /// Run every matching job for the cleaned URL, in configuration order.
    /// The first failing job aborts the message; zero matches is an error.
    pub async fn run_for_url(&self, url: &str, html: Option<&str>) -> Result<(), ExecutionError> {
        let mut matched = false;

        for (workflow_name, workflow) in &self.config.workflows {
            debug!("checking workflow: {}", workflow_name);
            for job_ref in &workflow.jobs {
                if !job_ref.matches(url) {
                    continue;
                }
                info!(
                    "matched job '{}' (regex '{}')",
                    job_ref.name, job_ref.pattern
                );

                let job = match self.config.jobs.get(&job_ref.name) {
                    Some(job) => job,
                    None => {
                        // Unreachable after validation; skip defensively.
                        error!("job definition not found: {}", job_ref.name);
                        continue;
                    }
                };

                self.run_job(job, &job_ref.params, url, html).await?;
                matched = true;
            }
        }

        if !matched {
            return Err(ExecutionError::NoMatch(url.to_string()));
        }
        Ok(())
    }

    /// Execute one job: fresh workspace, fresh scope, steps in order. The
    /// workspace guard removes the directory on every exit path.
    async fn run_job(
        &self,
        job: &Job,
        workflow_params: &IndexMap<String, String>,
        url: &str,
        html: Option<&str>,
    ) -> Result<(), ExecutionError> {
        let workspace: TempDir = tempfile::Builder::new()
            .prefix("plumber-")
            .tempdir()
            .map_err(ExecutionError::Workspace)?;

        let mut ctx = JobContext {
            url,
            workspace: workspace.path(),
            html,
            staged_html: None,
        };
        let mut scope = Scope::for_job(url, workflow_params);

        for step in &job.steps {
            self.run_step(step, &mut scope, &mut ctx).await?;
        }
        Ok(())
    }

    /// Execute one step against the current scope. Boxed because command
    /// references recurse back into steps.
    fn run_step<'s, 'c: 's>(
        &'s self,
        step: &'s Step,
        scope: &'s mut Scope,
        ctx: &'s mut JobContext<'c>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 's>> {
        Box::pin(async move {
            match step {
                Step::Run { script, save_to } => {
                    self.run_shell_step(script, save_to.as_deref(), scope, ctx)
                        .await
                }
                Step::CommandRef { name, bindings } => {
                    let command = match self.config.commands.get(name) {
                        Some(command) => command,
                        None => return Err(ExecutionError::UnknownStep(name.clone())),
                    };

                    // Bindings are resolved in the caller's scope before the
                    // command's own scope exists.
                    let mut resolved = IndexMap::new();
                    for (key, expr) in bindings {
                        resolved.insert(key.clone(), scope.resolve(expr));
                    }

                    self.run_command(command, resolved, ctx).await
                }
            }
        })
    }

    /// Enter a command with a fresh scope; captures made inside it are
    /// discarded on return.
    async fn run_command(
        &self,
        command: &Command,
        bindings: IndexMap<String, String>,
        ctx: &mut JobContext<'_>,
    ) -> Result<(), ExecutionError> {
        let mut scope = Scope::for_command(&command.parameters, ctx.url, bindings);
        for step in &command.steps {
            self.run_step(step, &mut scope, ctx).await?;
        }
        Ok(())
    }

    async fn run_shell_step(
        &self,
        script: &str,
        save_to: Option<&str>,
        scope: &mut Scope,
        ctx: &mut JobContext<'_>,
    ) -> Result<(), ExecutionError> {
        let resolved = scope.resolve(script);
        let resolved = ctx.substitute_html(resolved).await?;

        info!("running: {}", resolved);
        let output = self.shell.run(&resolved, ctx.workspace).await?;

        // Child output is echoed to the diagnostic stream; stderr always,
        // stdout only when it is not being captured.
        if !output.stderr.is_empty() {
            info!("step stderr: {}", output.stderr.trim_end());
        }
        if !output.success() {
            return Err(ExecutionError::Step(output.code.unwrap_or(-1)));
        }

        match save_to {
            Some(key) => scope.set(key.to_string(), output.stdout.trim().to_string()),
            None => {
                if !output.stdout.is_empty() {
                    info!("step stdout: {}", output.stdout.trim_end());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::execution::shell::SystemShell;

    fn engine(config: &Config) -> WorkflowEngine<'_, SystemShell> {
        WorkflowEngine::new(config, SystemShell)
    }

    #[tokio::test]
    async fn matching_job_runs() {
        let config = Config::from_yaml(
            r#"
version: "2"
jobs:
  simple:
    steps:
      - run: "echo 'step 1' > file1.txt"
      - run: "cat file1.txt"
workflows:
  main:
    jobs:
      - simple:
          match: ".*example.com.*"
"#,
        )
        .unwrap();

        engine(&config)
            .run_for_url("https://example.com", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_match_is_an_error() {
        let config = Config::from_yaml(
            r#"
version: "2"
jobs:
  simple:
    steps:
      - run: "true"
workflows:
  main:
    jobs:
      - simple:
          match: ".*example.com.*"
"#,
        )
        .unwrap();

        let err = engine(&config)
            .run_for_url("https://nomatch.invalid", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NoMatch(_)));
        assert!(err.to_string().contains("no matching jobs found for url"));
    }

    #[tokio::test]
    async fn failing_step_aborts_the_job() {
        let config = Config::from_yaml(
            r#"
version: "2"
jobs:
  failing:
    steps:
      - run: "exit 7"
      - run: "true"
workflows:
  main:
    jobs:
      - failing
"#,
        )
        .unwrap();

        let err = engine(&config)
            .run_for_url("https://example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Step(7)));
    }

    #[tokio::test]
    async fn unknown_step_name_fails() {
        // Bypass from_yaml so validation doesn't reject the config first.
        let config: Config = serde_yaml::from_str(
            r#"
version: "2"
jobs:
  broken:
    steps:
      - no_such_command
workflows:
  main:
    jobs:
      - broken
"#,
        )
        .unwrap();

        let err = engine(&config)
            .run_for_url("https://example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownStep(_)));
        assert!(err.to_string().contains("unknown command or step"));
    }

    #[tokio::test]
    async fn html_staging_feeds_the_step() {
        let config = Config::from_yaml(
            r#"
version: "2"
jobs:
  read_page:
    steps:
      - run: "cat {html} | grep TEST"
workflows:
  main:
    jobs:
      - read_page
"#,
        )
        .unwrap();

        engine(&config)
            .run_for_url("https://example.com", Some("<html>TEST</html>"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn html_token_without_html_survives_and_fails_the_cat() {
        let config = Config::from_yaml(
            r#"
version: "2"
jobs:
  read_page:
    steps:
      - run: "cat {html}"
workflows:
  main:
    jobs:
      - read_page
"#,
        )
        .unwrap();

        let err = engine(&config)
            .run_for_url("https://example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Step(_)));
    }
}
