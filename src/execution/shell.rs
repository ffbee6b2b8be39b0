//! Shell invocation boundary - runs step scripts under `sh -c`

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Error types for shell invocation
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to start shell: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Outcome of one `sh -c` invocation
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Exit code; `None` when the child was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Boundary between the engine and the operating system shell - allows for
/// different implementations in tests
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Run `script` under a POSIX shell with `cwd` as the working directory
    async fn run(&self, script: &str, cwd: &Path) -> Result<ShellOutput, ShellError>;
}

/// Real `sh -c` runner; children inherit the parent environment unchanged
#[derive(Debug, Clone, Default)]
pub struct SystemShell;

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, script: &str, cwd: &Path) -> Result<ShellOutput, ShellError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(cwd)
            .output()
            .await?;

        Ok(ShellOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
