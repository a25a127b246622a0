//! Error types for proctools
//!
//! Provides structured error types with suggestions for common launch failures.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::executor::command::split_line;

/// Main error type for process operations
#[derive(Error, Debug)]
pub enum ProcError {
    /// Command string could not be split into words (e.g. unterminated quote)
    #[error("Cannot tokenize command: {command}")]
    Tokenize { command: String },

    /// Normalized command has no program to launch
    #[error("Empty command")]
    EmptyCommand,

    /// The OS refused to launch the child process
    #[error("Failed to spawn command: {command}")]
    Spawn {
        command: String,
        working_dir: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// Kill requested on a runner without a live child
    #[error("Process is not running (state: {state})")]
    NotRunning { state: String },

    /// The OS refused to deliver the kill signal
    #[error("Failed to signal process {pid}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// Async runtime or runner thread failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcError {
    /// Short machine-readable name of the error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            ProcError::Tokenize { .. } => "tokenize_failed",
            ProcError::EmptyCommand => "empty_command",
            ProcError::Spawn { .. } => "spawn_failed",
            ProcError::NotRunning { .. } => "not_running",
            ProcError::Signal { .. } => "signal_failed",
            ProcError::Runtime(_) => "runtime_error",
            ProcError::Config(_) => "config_error",
            ProcError::Io(_) => "io_error",
        }
    }
}

/// Serializable error info for JSON output
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&ProcError> for ErrorInfo {
    fn from(err: &ProcError) -> Self {
        let (os_error, suggestion) = match err {
            ProcError::Tokenize { .. } => (
                None,
                Some("Check for unbalanced quotes or a trailing backslash".to_string()),
            ),
            ProcError::EmptyCommand => (None, Some("Provide a program to run".to_string())),
            ProcError::Spawn {
                command,
                working_dir,
                source,
            } => {
                let program = split_line(command)
                    .and_then(|words| words.into_iter().next())
                    .unwrap_or_else(|| command.clone());
                (
                    Some(source.to_string()),
                    suggest_fix(&program, working_dir.as_deref(), source),
                )
            }
            ProcError::Signal { source, .. } => (Some(source.to_string()), None),
            ProcError::Io(e) => (Some(e.to_string()), None),
            ProcError::Config(_) => (
                None,
                Some("Check your proctools configuration file".to_string()),
            ),
            ProcError::NotRunning { .. } | ProcError::Runtime(_) => (None, None),
        };

        ErrorInfo {
            message: err.to_string(),
            error_type: err.error_type().to_string(),
            os_error,
            suggestion,
        }
    }
}

/// Suggest fixes for common launch failures
pub fn suggest_fix(program: &str, working_dir: Option<&Path>, error: &io::Error) -> Option<String> {
    if let Some(dir) = working_dir {
        if !dir.is_dir() {
            return Some(format!(
                "Working directory '{}' does not exist.",
                dir.display()
            ));
        }
    }

    match error.kind() {
        io::ErrorKind::NotFound => {
            if program.contains('/') {
                Some(format!("'{}' not found. Verify the path.", program))
            } else if which::which(program).is_err() {
                Some(format!(
                    "'{}' not found on PATH. Install it or use an absolute path.",
                    program
                ))
            } else {
                None
            }
        }
        io::ErrorKind::PermissionDenied => Some(format!(
            "Permission denied launching '{}'. Check that it is executable.",
            program
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "No such file or directory")
    }

    #[test]
    fn test_spawn_error_keeps_os_error() {
        let err = ProcError::Spawn {
            command: "nonexistent_cmd_12345 --flag".to_string(),
            working_dir: None,
            source: not_found(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to spawn command: nonexistent_cmd_12345 --flag"
        );

        let source = std::error::Error::source(&err).unwrap();
        let io_err = source.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_spawn_error_info() {
        let err = ProcError::Spawn {
            command: "nonexistent_cmd_12345 --flag".to_string(),
            working_dir: None,
            source: not_found(),
        };
        let info = ErrorInfo::from(&err);

        assert_eq!(info.error_type, "spawn_failed");
        assert!(info.os_error.is_some());
        assert!(info.suggestion.unwrap().contains("nonexistent_cmd_12345"));
    }

    #[test]
    fn test_spawn_error_info_missing_working_dir() {
        let err = ProcError::Spawn {
            command: "ls -la".to_string(),
            working_dir: Some(PathBuf::from("/nonexistent/dir/12345")),
            source: not_found(),
        };
        let info = ErrorInfo::from(&err);

        let suggestion = info.suggestion.unwrap();
        assert!(suggestion.contains("Working directory"));
        assert!(suggestion.contains("/nonexistent/dir/12345"));
    }

    #[test]
    fn test_tokenize_error() {
        let err = ProcError::Tokenize {
            command: "echo 'oops".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot tokenize command: echo 'oops");

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "tokenize_failed");
        assert!(info.suggestion.unwrap().contains("quotes"));
    }

    #[test]
    fn test_not_running_error() {
        let err = ProcError::NotRunning {
            state: "not started".to_string(),
        };
        assert!(err.to_string().contains("not started"));
        assert_eq!(ErrorInfo::from(&err).error_type, "not_running");
    }

    #[test]
    fn test_suggest_fix_missing_working_dir() {
        let suggestion = suggest_fix(
            "ls",
            Some(Path::new("/nonexistent/dir/12345")),
            &not_found(),
        );
        assert!(suggestion.unwrap().contains("Working directory"));
    }

    #[test]
    fn test_suggest_fix_relative_path() {
        let suggestion = suggest_fix("./missing.sh", None, &not_found());
        assert!(suggestion.unwrap().contains("./missing.sh"));
    }

    #[test]
    fn test_suggest_fix_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let suggestion = suggest_fix("./run.sh", None, &err);
        assert!(suggestion.unwrap().contains("executable"));
    }

    #[test]
    fn test_suggest_fix_no_match() {
        let err = io::Error::new(io::ErrorKind::Other, "something else");
        assert!(suggest_fix("ls", None, &err).is_none());
    }

    #[test]
    fn test_error_info_skips_empty_fields() {
        let info = ErrorInfo::from(&ProcError::Runtime("boom".to_string()));

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("runtime_error"));
        assert!(!json.contains("suggestion"));
        assert!(!json.contains("os_error"));
    }
}
