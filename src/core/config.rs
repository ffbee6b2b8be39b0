//! Workflow configuration from YAML
//!
//! The config has two polymorphic nodes that need custom decoding:
//! a [`Step`] is either a bare command name or a single-key mapping, and a
//! [`WorkflowJob`] is either a bare job name or a single-key mapping whose
//! value carries the match rule and inline parameter bindings.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Top-level configuration loaded from YAML
///
/// Loaded once at startup and immutable thereafter. Mappings preserve the
/// authoring order of the file; the matcher iterates workflows in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Configuration version, must be "2"
    #[serde(default)]
    pub version: Option<String>,

    /// Reusable parameterized command definitions
    #[serde(default)]
    pub commands: IndexMap<String, Command>,

    /// Job definitions
    #[serde(default)]
    pub jobs: IndexMap<String, Job>,

    /// Workflows mapping jobs to URL match rules
    #[serde(default)]
    pub workflows: IndexMap<String, Workflow>,
}

/// A reusable parameterized building block invoked from job steps
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Command {
    /// Declared inputs; callers may only bind names listed here
    #[serde(default)]
    pub parameters: IndexMap<String, Parameter>,

    /// Ordered steps executed against the command's fresh scope
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Declaration of a named command input
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Only "string" is supported
    #[serde(default = "default_parameter_type", rename = "type")]
    pub kind: String,

    /// Seed value for the command scope; without one the caller must bind
    /// the parameter or its references survive unresolved
    #[serde(default)]
    pub default: Option<String>,
}

fn default_parameter_type() -> String {
    "string".to_string()
}

/// A named ordered sequence of steps
///
/// Jobs declare no parameters of their own; their scope is seeded from the
/// workflow binding plus the system-injected parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One unit of execution inside a job or command
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A shell script run under `sh -c`; `save_to` captures trimmed stdout
    /// into the current scope
    Run {
        script: String,
        save_to: Option<String>,
    },

    /// Invocation of a named command with argument bindings, each resolved
    /// in the current scope before the command is entered
    CommandRef {
        name: String,
        bindings: IndexMap<String, String>,
    },
}

/// Structured body of a `run:` step mapping
#[derive(Deserialize)]
#[serde(untagged)]
enum RunBody {
    Script(String),
    Structured {
        command: String,
        #[serde(default)]
        save_to: Option<String>,
    },
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Step, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StepVisitor;

        impl<'de> Visitor<'de> for StepVisitor {
            type Value = Step;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a command name or a single-key step mapping")
            }

            fn visit_str<E>(self, v: &str) -> Result<Step, E>
            where
                E: de::Error,
            {
                if v == "run" {
                    Ok(Step::Run {
                        script: String::new(),
                        save_to: None,
                    })
                } else {
                    Ok(Step::CommandRef {
                        name: v.to_string(),
                        bindings: IndexMap::new(),
                    })
                }
            }

            fn visit_map<A>(self, mut map: A) -> Result<Step, A::Error>
            where
                A: MapAccess<'de>,
            {
                let name: String = map
                    .next_key()?
                    .ok_or_else(|| de::Error::custom("step mapping must have exactly one key"))?;

                let step = if name == "run" {
                    match map.next_value::<RunBody>()? {
                        RunBody::Script(script) => Step::Run {
                            script,
                            save_to: None,
                        },
                        RunBody::Structured { command, save_to } => Step::Run {
                            script: command,
                            save_to,
                        },
                    }
                } else {
                    Step::CommandRef {
                        name,
                        bindings: map.next_value()?,
                    }
                };

                if map.next_key::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("step mapping must have exactly one key"));
                }

                Ok(step)
            }
        }

        deserializer.deserialize_any(StepVisitor)
    }
}

/// A named grouping of job references with URL match rules
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub jobs: Vec<WorkflowJob>,
}

/// Reference to a job inside a workflow
///
/// Encoded in YAML as either a bare job name or a single-key mapping whose
/// value holds `match` plus inline parameter bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowJob {
    /// Name of the referenced job
    pub name: String,

    /// Regex match rule against the cleaned URL; empty matches everything
    pub pattern: String,

    /// Inline parameter bindings merged into the job's scope
    pub params: IndexMap<String, String>,
}

impl WorkflowJob {
    /// Whether this reference applies to the URL. Empty patterns match all;
    /// non-empty patterns search unanchored.
    pub fn matches(&self, url: &str) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        match Regex::new(&self.pattern) {
            Ok(re) => re.is_match(url),
            Err(_) => false,
        }
    }
}

impl<'de> Deserialize<'de> for WorkflowJob {
    fn deserialize<D>(deserializer: D) -> Result<WorkflowJob, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct WorkflowJobVisitor;

        impl<'de> Visitor<'de> for WorkflowJobVisitor {
            type Value = WorkflowJob;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a job name or a single-key job mapping")
            }

            fn visit_str<E>(self, v: &str) -> Result<WorkflowJob, E>
            where
                E: de::Error,
            {
                Ok(WorkflowJob {
                    name: v.to_string(),
                    ..WorkflowJob::default()
                })
            }

            fn visit_map<A>(self, mut map: A) -> Result<WorkflowJob, A::Error>
            where
                A: MapAccess<'de>,
            {
                let name: String = map
                    .next_key()?
                    .ok_or_else(|| de::Error::custom("workflow job must have a single key"))?;

                // All inline keys other than `match` are parameter bindings.
                let mut fields: IndexMap<String, String> = map.next_value()?;
                let pattern = fields.shift_remove("match").unwrap_or_default();

                if map.next_key::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("workflow job must have a single key"));
                }

                Ok(WorkflowJob {
                    name,
                    pattern,
                    params: fields,
                })
            }
        }

        deserializer.deserialize_any(WorkflowJobVisitor)
    }
}

impl Config {
    /// Load and validate the configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("could not open config file at {}", path.as_ref().display())
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate the configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("could not decode config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration: version, job references, match regexes,
    /// command references and their parameter bindings. Never executes
    /// anything.
    pub fn validate(&self) -> Result<()> {
        match self.version.as_deref() {
            None | Some("") => {
                anyhow::bail!("missing 'version' in configuration (expected \"2\")")
            }
            Some("2") => {}
            Some(other) => {
                anyhow::bail!("unsupported config version '{}' (expected \"2\")", other)
            }
        }

        for (workflow_name, workflow) in &self.workflows {
            for job_ref in &workflow.jobs {
                if !self.jobs.contains_key(&job_ref.name) {
                    anyhow::bail!(
                        "workflow '{}' references undefined job '{}'",
                        workflow_name,
                        job_ref.name
                    );
                }
                if !job_ref.pattern.is_empty() {
                    Regex::new(&job_ref.pattern).with_context(|| {
                        format!(
                            "workflow '{}' job '{}' has invalid match regex '{}'",
                            workflow_name, job_ref.name, job_ref.pattern
                        )
                    })?;
                }
            }
        }

        for (job_name, job) in &self.jobs {
            for (i, step) in job.steps.iter().enumerate() {
                let (name, bindings) = match step {
                    Step::Run { .. } => continue,
                    Step::CommandRef { name, bindings } => (name, bindings),
                };
                let command = match self.commands.get(name) {
                    Some(command) => command,
                    None => anyhow::bail!(
                        "job '{}' step {} references undefined command '{}'",
                        job_name,
                        i + 1,
                        name
                    ),
                };
                for param in bindings.keys() {
                    if !command.parameters.contains_key(param) {
                        anyhow::bail!(
                            "job '{}' step {} passes unknown parameter '{}' to command '{}'",
                            job_name,
                            i + 1,
                            param,
                            name
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "2"

commands:
  open_browser:
    parameters:
      browser:
        type: string
        default: "firefox"
    steps:
      - run: "<<parameters.browser>> {url}"

jobs:
  open:
    steps:
      - open_browser:
          browser: "chromium"
  archive:
    steps:
      - run:
          command: "echo archiving {url}"
          save_to: "log_line"
      - run: "echo <<parameters.log_line>>"

workflows:
  main:
    jobs:
      - open:
          match: ".*example.com.*"
      - archive
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_yaml(VALID).unwrap();
        assert_eq!(config.version.as_deref(), Some("2"));
        assert_eq!(config.commands.len(), 1);
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.workflows["main"].jobs.len(), 2);
    }

    #[test]
    fn step_scalar_is_command_ref() {
        let steps: Vec<Step> = serde_yaml::from_str("- checkout").unwrap();
        assert_eq!(
            steps[0],
            Step::CommandRef {
                name: "checkout".to_string(),
                bindings: IndexMap::new(),
            }
        );
    }

    #[test]
    fn step_run_scalar_carries_script() {
        let steps: Vec<Step> = serde_yaml::from_str(r#"- run: "echo hi""#).unwrap();
        assert_eq!(
            steps[0],
            Step::Run {
                script: "echo hi".to_string(),
                save_to: None,
            }
        );
    }

    #[test]
    fn step_run_mapping_carries_save_to() {
        let yaml = r#"
- run:
    command: "echo captured"
    save_to: "result"
"#;
        let steps: Vec<Step> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            steps[0],
            Step::Run {
                script: "echo captured".to_string(),
                save_to: Some("result".to_string()),
            }
        );
    }

    #[test]
    fn step_command_ref_collects_bindings() {
        let yaml = r#"
- open_browser:
    browser: "chromium"
    profile: "work"
"#;
        let steps: Vec<Step> = serde_yaml::from_str(yaml).unwrap();
        match &steps[0] {
            Step::CommandRef { name, bindings } => {
                assert_eq!(name, "open_browser");
                assert_eq!(bindings["browser"], "chromium");
                assert_eq!(bindings["profile"], "work");
            }
            other => panic!("expected command ref, got {:?}", other),
        }
    }

    #[test]
    fn step_mapping_with_two_keys_is_rejected() {
        let yaml = r#"
- run: "echo hi"
  other: "value"
"#;
        let result: Result<Vec<Step>, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn step_scalar_value_for_command_ref_is_rejected() {
        let result: Result<Vec<Step>, _> = serde_yaml::from_str(r#"- open_browser: "firefox""#);
        assert!(result.is_err());
    }

    #[test]
    fn workflow_job_scalar_is_name_only() {
        let jobs: Vec<WorkflowJob> = serde_yaml::from_str("- archive").unwrap();
        assert_eq!(jobs[0].name, "archive");
        assert!(jobs[0].pattern.is_empty());
        assert!(jobs[0].params.is_empty());
    }

    #[test]
    fn workflow_job_mapping_splits_match_from_params() {
        let yaml = r#"
- open:
    match: ".*example.com.*"
    browser: "firefox"
"#;
        let jobs: Vec<WorkflowJob> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(jobs[0].name, "open");
        assert_eq!(jobs[0].pattern, ".*example.com.*");
        assert_eq!(jobs[0].params["browser"], "firefox");
    }

    #[test]
    fn workflow_job_empty_pattern_matches_everything() {
        let job = WorkflowJob {
            name: "open".to_string(),
            ..WorkflowJob::default()
        };
        assert!(job.matches("https://anything.invalid"));
    }

    #[test]
    fn workflow_job_pattern_searches_unanchored() {
        let job = WorkflowJob {
            name: "open".to_string(),
            pattern: "example\\.com".to_string(),
            params: IndexMap::new(),
        };
        assert!(job.matches("https://example.com/article"));
        assert!(!job.matches("https://other.invalid"));
    }

    #[test]
    fn validate_missing_version() {
        let err = Config::from_yaml("jobs: {}").unwrap_err();
        assert!(
            err.to_string().contains("missing 'version'"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn validate_wrong_version() {
        let err = Config::from_yaml(r#"version: "1""#).unwrap_err();
        assert!(err.to_string().contains("unsupported config version"));
    }

    #[test]
    fn validate_undefined_job_reference() {
        let yaml = r#"
version: "2"
workflows:
  main:
    jobs:
      - non_existent_job
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains("references undefined job"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn validate_invalid_match_regex() {
        let yaml = r#"
version: "2"
jobs:
  open:
    steps:
      - run: "true"
workflows:
  main:
    jobs:
      - open:
          match: "["
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("invalid match regex"));
    }

    #[test]
    fn validate_undefined_command_reference() {
        let yaml = r#"
version: "2"
jobs:
  open:
    steps:
      - missing_command
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("references undefined command"));
    }

    #[test]
    fn validate_unknown_parameter_binding() {
        let yaml = r#"
version: "2"
commands:
  greet:
    parameters:
      name:
        type: string
    steps:
      - run: "echo <<parameters.name>>"
jobs:
  open:
    steps:
      - greet:
          nickname: "bob"
workflows:
  main:
    jobs:
      - open
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains("passes unknown parameter"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn preserves_workflow_authoring_order() {
        let yaml = r#"
version: "2"
jobs:
  a:
    steps: []
  b:
    steps: []
workflows:
  zeta:
    jobs: [a]
  alpha:
    jobs: [b]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let names: Vec<&String> = config.workflows.keys().collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }
}
