//! Configuration model for proctools
//!
//! Defines the structure for XDG-compliant layered configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ProcError;
use crate::executor::{ExecOptions, Sink, SinkKind};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Defaults applied to every command launched from the CLI
    #[serde(default)]
    pub defaults: Defaults,

    /// Logging output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default execution settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Defaults {
    /// Working directory for commands; `~` and `$VAR` are expanded
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Where child stdout goes
    #[serde(default)]
    pub stdout: SinkKind,

    /// Where child stderr goes
    #[serde(default)]
    pub stderr: SinkKind,

    /// Extra environment variables for every command
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Defaults {
    /// Working directory with `~` and environment variables expanded
    pub fn resolved_working_dir(&self) -> Result<Option<PathBuf>, ProcError> {
        self.working_dir
            .as_deref()
            .map(|dir| {
                shellexpand::full(dir)
                    .map(|expanded| PathBuf::from(expanded.as_ref()))
                    .map_err(|e| ProcError::Config(format!("working_dir '{}': {}", dir, e)))
            })
            .transpose()
    }

    /// Build execution options from these defaults
    pub fn exec_options(&self) -> Result<ExecOptions, ProcError> {
        Ok(ExecOptions {
            working_dir: self.resolved_working_dir()?,
            env: self.env.clone(),
            stdout: Sink::from(self.stdout),
            stderr: Sink::from(self.stderr),
        })
    }
}

/// Logging output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.defaults.working_dir.is_none());
        assert_eq!(config.defaults.stdout, SinkKind::Capture);
        assert_eq!(config.defaults.stderr, SinkKind::Capture);
        assert!(config.defaults.env.is_empty());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [defaults]
            working_dir = "/srv/project"
            stdout = "inherit"
            stderr = "null"

            [defaults.env]
            LANG = "C"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.defaults.working_dir, Some("/srv/project".to_string()));
        assert_eq!(config.defaults.stdout, SinkKind::Inherit);
        assert_eq!(config.defaults.stderr, SinkKind::Null);
        assert_eq!(config.defaults.env.get("LANG"), Some(&"C".to_string()));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str("[logging]\nformat = \"json\"\n").unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.defaults.stdout, SinkKind::Capture);
    }

    #[test]
    fn test_unknown_sink_rejected() {
        let result: Result<Config, _> = toml::from_str("[defaults]\nstdout = \"socket\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_working_dir_expands_home() {
        let defaults = Defaults {
            working_dir: Some("~/src".to_string()),
            ..Default::default()
        };

        let resolved = defaults.resolved_working_dir().unwrap().unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolved, home.join("src"));
        }
    }

    #[test]
    fn test_resolved_working_dir_unset_variable() {
        let defaults = Defaults {
            working_dir: Some("$PROCTOOLS_TEST_UNSET_VAR_12345/dir".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            defaults.resolved_working_dir(),
            Err(ProcError::Config(_))
        ));
    }

    #[test]
    fn test_exec_options_from_defaults() {
        let defaults = Defaults {
            working_dir: Some("/tmp".to_string()),
            stdout: SinkKind::Null,
            stderr: SinkKind::Capture,
            env: HashMap::from([("KEY".to_string(), "value".to_string())]),
        };

        let options = defaults.exec_options().unwrap();

        assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
        assert!(matches!(options.stdout, Sink::Null));
        assert!(options.stderr.is_capture());
        assert_eq!(options.env.get("KEY"), Some(&"value".to_string()));
    }
}
