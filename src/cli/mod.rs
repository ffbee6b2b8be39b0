//! Command-line interface

pub mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// URL routing daemon for browser-pipes
#[derive(Debug, Parser, Clone)]
#[command(name = "plumber")]
#[command(about = "Routes URLs from a browser extension through configured workflows", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands; without one, `run` is assumed
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Read envelopes on stdin and execute matching workflows
    Run,

    /// Load and validate the configuration
    Validate,

    /// Print the configuration JSON Schema
    Schema,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Explicit `--config` path, or `~/.config/browser-pipes/plumber.yaml`
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.config {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home
            .join(".config")
            .join("browser-pipes")
            .join("plumber.yaml"))
    }
}
