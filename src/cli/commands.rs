//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::executor::{CommandSpec, SinkKind};

/// Process execution helpers for development tooling.
///
/// Runs commands in the foreground or on a background thread, and exposes
/// the shell-word normalization used to launch them.
#[derive(Parser, Debug)]
#[command(name = "proctools")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra config file, layered above the XDG paths
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command and wait for it
    Run(RunArgs),

    /// Run a command on a background thread, optionally killing it
    Spawn(SpawnArgs),

    /// Show how a command line is split into arguments
    Split(SplitArgs),

    /// Print the stable branch name for a version
    StableBranch(StableBranchArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Launch settings shared by `run` and `spawn`
#[derive(Parser, Debug)]
pub struct LaunchArgs {
    /// Command line (one argument) or program and arguments (several)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Working directory (defaults to configuration, then current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment variables in KEY=VALUE format
    #[arg(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Where the child's stdout goes
    #[arg(long, value_enum)]
    pub stdout: Option<SinkKind>,

    /// Where the child's stderr goes
    #[arg(long, value_enum)]
    pub stderr: Option<SinkKind>,
}

impl LaunchArgs {
    /// A single argument is a command line; several are already split
    pub fn command_spec(&self) -> CommandSpec {
        match self.command.as_slice() {
            [line] => CommandSpec::Line(line.clone()),
            args => CommandSpec::Args(args.to_vec()),
        }
    }
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the `spawn` subcommand
#[derive(Parser, Debug)]
pub struct SpawnArgs {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Kill the child if it is still running after this many seconds
    #[arg(short, long)]
    pub kill_after: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the `split` subcommand
#[derive(Parser, Debug)]
pub struct SplitArgs {
    /// Command line to split
    pub line: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the `stable-branch` subcommand
#[derive(Parser, Debug)]
pub struct StableBranchArgs {
    /// `master` or a version number such as 31
    #[arg(id = "version_number", value_name = "VERSION")]
    pub version: String,
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// Plain text
    Plain,
}

/// Parse KEY=VALUE argument
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid argument '{}': expected KEY=VALUE format", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_run_line() {
        let cli = Cli::parse_from(["proctools", "run", "echo 'a b'"]);
        if let Commands::Run(args) = cli.command {
            assert_eq!(
                args.launch.command_spec(),
                CommandSpec::Line("echo 'a b'".to_string())
            );
            assert!(matches!(args.format, OutputFormat::Plain));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_args() {
        let cli = Cli::parse_from(["proctools", "run", "--", "ls", "-la", "/tmp"]);
        if let Commands::Run(args) = cli.command {
            assert_eq!(
                args.launch.command_spec(),
                CommandSpec::from(["ls", "-la", "/tmp"])
            );
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_options() {
        let cli = Cli::parse_from([
            "proctools",
            "run",
            "--cwd",
            "/tmp",
            "-e",
            "A=1",
            "-e",
            "B=x=y",
            "--stdout",
            "inherit",
            "--stderr",
            "null",
            "-f",
            "json",
            "make test",
        ]);
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.launch.cwd, Some(PathBuf::from("/tmp")));
            assert_eq!(
                args.launch.env,
                vec![
                    ("A".to_string(), "1".to_string()),
                    ("B".to_string(), "x=y".to_string())
                ]
            );
            assert_eq!(args.launch.stdout, Some(SinkKind::Inherit));
            assert_eq!(args.launch.stderr, Some(SinkKind::Null));
            assert!(matches!(args.format, OutputFormat::Json));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_spawn() {
        let cli = Cli::parse_from(["proctools", "spawn", "--kill-after", "1.5", "sleep 10"]);
        if let Commands::Spawn(args) = cli.command {
            assert_eq!(args.kill_after, Some(1.5));
            assert_eq!(args.launch.command, vec!["sleep 10".to_string()]);
        } else {
            panic!("Expected Spawn command");
        }
    }

    #[test]
    fn test_cli_parse_split() {
        let cli = Cli::parse_from(["proctools", "split", "a 'b c'", "-f", "json"]);
        if let Commands::Split(args) = cli.command {
            assert_eq!(args.line, "a 'b c'");
            assert!(matches!(args.format, OutputFormat::Json));
        } else {
            panic!("Expected Split command");
        }
    }

    #[test]
    fn test_cli_parse_stable_branch() {
        let cli = Cli::parse_from(["proctools", "stable-branch", "31"]);
        if let Commands::StableBranch(args) = cli.command {
            assert_eq!(args.version, "31");
        } else {
            panic!("Expected StableBranch command");
        }
    }

    #[test]
    fn test_cli_parse_config() {
        let cli = Cli::parse_from(["proctools", "config"]);
        if let Commands::Config(args) = cli.command {
            assert!(matches!(args.format, OutputFormat::Table));
        } else {
            panic!("Expected Config command");
        }
    }

    #[test]
    fn test_cli_run_requires_command() {
        assert!(Cli::try_parse_from(["proctools", "run"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["proctools", "-v", "-c", "/path/to/config.toml", "config"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_parse_key_value_valid() {
        assert_eq!(
            parse_key_value("FOO=bar"),
            Ok(("FOO".to_string(), "bar".to_string()))
        );
        assert_eq!(
            parse_key_value("FOO="),
            Ok(("FOO".to_string(), "".to_string()))
        );
    }

    #[test]
    fn test_parse_key_value_invalid() {
        assert!(parse_key_value("INVALID").is_err());
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }
}
