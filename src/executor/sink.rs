//! Output sinks for child process streams

use std::fs::File;
use std::io;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a child's stdout or stderr goes
#[derive(Debug, Clone, Default)]
pub enum Sink {
    /// Collect the bytes into the execution result
    #[default]
    Capture,
    /// Share the caller's stream
    Inherit,
    /// Discard
    Null,
    /// Write into a caller-supplied file
    File(Arc<File>),
}

impl Sink {
    /// Wrap an open file as a sink
    pub fn file(file: File) -> Self {
        Sink::File(Arc::new(file))
    }

    /// Whether the stream is collected into the result
    pub fn is_capture(&self) -> bool {
        matches!(self, Sink::Capture)
    }

    /// Build the `Stdio` for process launch
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Sink::Capture => Stdio::piped(),
            Sink::Inherit => Stdio::inherit(),
            Sink::Null => Stdio::null(),
            Sink::File(file) => Stdio::from(file.try_clone()?),
        })
    }
}

impl From<SinkKind> for Sink {
    fn from(kind: SinkKind) -> Self {
        match kind {
            SinkKind::Capture => Sink::Capture,
            SinkKind::Inherit => Sink::Inherit,
            SinkKind::Null => Sink::Null,
        }
    }
}

/// Sink choices expressible in configuration and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Capture,
    Inherit,
    Null,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "capture" | "pipe" => Ok(SinkKind::Capture),
            "inherit" | "passthrough" => Ok(SinkKind::Inherit),
            "null" | "discard" => Ok(SinkKind::Null),
            other => Err(format!("unknown sink '{}': expected capture, inherit or null", other)),
        }
    }
}
