//! proctools CLI entry point
//!
//! Usage:
//!   proctools run <command>...            Run a command and wait for it
//!   proctools spawn <command>...          Run a command on a background thread
//!   proctools split <line>                Show how a command line is split
//!   proctools stable-branch <version>     Print the stable branch name
//!   proctools config                      Show configuration

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use proctools::cli::commands::{
    ConfigArgs, LaunchArgs, OutputFormat, RunArgs, SpawnArgs, SplitArgs, StableBranchArgs,
};
use proctools::config::{active_layers, load_config, Config};
use proctools::error::{ErrorInfo, ProcError};
use proctools::executor::{run, ExecOptions, ExecResult, RunState, Sink, ThreadedRunner};
use proctools::{logging, stable_branch, Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let _ = logging::try_init(&config.logging, cli.verbose);

    match cli.command {
        Commands::Run(args) => run_command(args, &config, cli.verbose),
        Commands::Spawn(args) => spawn_command(args, &config, cli.verbose),
        Commands::Split(args) => split_command(args),
        Commands::StableBranch(args) => print_stable_branch(args),
        Commands::Config(args) => show_config(args, &config, cli.config.as_deref()),
    }
}

/// Merge configuration defaults with command-line overrides
fn build_options(launch: &LaunchArgs, config: &Config) -> Result<ExecOptions> {
    let mut options = config
        .defaults
        .exec_options()
        .context("Invalid [defaults] configuration")?;

    if let Some(ref cwd) = launch.cwd {
        options.working_dir = Some(cwd.clone());
    }
    options.env.extend(launch.env.iter().cloned());
    if let Some(kind) = launch.stdout {
        options.stdout = Sink::from(kind);
    }
    if let Some(kind) = launch.stderr {
        options.stderr = Sink::from(kind);
    }

    Ok(options)
}

/// Run a command in the foreground
fn run_command(args: RunArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let options = build_options(&args.launch, config)?;
    let spec = args.launch.command_spec();

    if verbose {
        eprintln!("{}: {}", "running".cyan(), spec);
    }

    let result = match run(spec.clone(), &options) {
        Ok(result) => result,
        Err(e) => return report_error(e, &args.format),
    };

    print_result(&spec.display(), &result, None, &args.format)?;
    Ok(child_exit_code(&result))
}

/// Run a command on a background thread
fn spawn_command(args: SpawnArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let options = build_options(&args.launch, config)?;
    let spec = args.launch.command_spec();

    let handle = match ThreadedRunner::new(spec.clone(), options).and_then(|r| r.start()) {
        Ok(handle) => handle,
        Err(e) => return report_error(e, &args.format),
    };

    if let Some(pid) = handle.wait_for_pid() {
        eprintln!("{}: {}", "pid".cyan(), pid);
    }

    if let Some(secs) = args.kill_after {
        let delay = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid --kill-after value: {}", secs))?;
        if !handle.wait_timeout(delay) {
            if verbose {
                eprintln!("{}: {} after {:?}", "killing".yellow(), spec, delay);
            }
            match handle.kill() {
                // Finished on its own in the meantime
                Ok(()) | Err(ProcError::NotRunning { .. }) => {}
                Err(e) => return Err(e).context("Failed to kill background process"),
            }
        }
    }

    let state = handle.wait();
    let result = match handle.join() {
        Ok(result) => result,
        Err(e) => return report_error(e, &args.format),
    };

    print_result(&spec.display(), &result, Some(state), &args.format)?;
    Ok(child_exit_code(&result))
}

/// Print how a command line is split
fn split_command(args: SplitArgs) -> Result<ExitCode> {
    let tokens = proctools::CommandSpec::Line(args.line).normalize()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tokens)?),
        OutputFormat::Plain => {
            for token in &tokens {
                println!("{}", token);
            }
        }
        OutputFormat::Table => {
            for (i, token) in tokens.iter().enumerate() {
                println!("  {:>3}  {}", i.to_string().cyan(), token);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_stable_branch(args: StableBranchArgs) -> Result<ExitCode> {
    println!("{}", stable_branch(&args.version)?);
    Ok(ExitCode::SUCCESS)
}

/// Show resolved configuration
fn show_config(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> Result<ExitCode> {
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Plain => print!("{}", toml::to_string(config)?),
        OutputFormat::Table => {
            let working_dir = config
                .defaults
                .resolved_working_dir()?
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(current directory)".to_string());

            println!("{}: {}", "Working Dir".cyan(), working_dir);
            println!("{}: {:?}", "Stdout".cyan(), config.defaults.stdout);
            println!("{}: {:?}", "Stderr".cyan(), config.defaults.stderr);
            if !config.defaults.env.is_empty() {
                println!("{}:", "Environment".cyan());
                for (key, value) in &config.defaults.env {
                    println!("  {}={}", key, value);
                }
            }
            println!(
                "{}: {} ({:?})",
                "Log Level".cyan(),
                config.logging.level,
                config.logging.format
            );

            let layers = active_layers(explicit);
            if !layers.is_empty() {
                println!("{}:", "Files".cyan());
                for layer in layers {
                    println!("  - {} ({})", layer.path.display(), layer.scope);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_result(
    command: &str,
    result: &ExecResult,
    state: Option<RunState>,
    format: &OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "command": command,
                "state": state.map(|s| s.to_string()),
                "exit_code": result.exit_code,
                "signal": result.signal,
                "success": result.success(),
                "duration_ms": result.duration.as_millis() as u64,
                "stdout": result.stdout_lossy(),
                "stderr": result.stderr_lossy(),
            }))?;
            println!("{}", json);
        }
        OutputFormat::Plain => {
            std::io::stdout().write_all(&result.stdout)?;
            std::io::stderr().write_all(&result.stderr)?;
        }
        OutputFormat::Table => {
            println!("{}: {}", "Command".cyan(), command);
            if let Some(state) = state {
                println!("{}: {}", "State".cyan(), state);
            }
            let exit = match (result.exit_code, result.signal) {
                (Some(0), _) => "0".green().to_string(),
                (Some(code), _) => code.to_string().red().to_string(),
                (None, Some(signal)) => format!("signal {}", signal).red().to_string(),
                (None, None) => "unknown".yellow().to_string(),
            };
            println!("{}: {}", "Exit".cyan(), exit);
            println!("{}: {}ms", "Duration".cyan(), result.duration.as_millis());
            if !result.stdout.is_empty() {
                println!("{}:", "Stdout".cyan());
                print!("{}", result.stdout_lossy());
            }
            if !result.stderr.is_empty() {
                println!("{}:", "Stderr".cyan());
                print!("{}", result.stderr_lossy());
            }
        }
    }

    Ok(())
}

/// JSON callers get a structured error on stdout; everyone else gets anyhow
fn report_error(err: ProcError, format: &OutputFormat) -> Result<ExitCode> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&ErrorInfo::from(&err))?);
            Ok(ExitCode::FAILURE)
        }
        _ => {
            let info = ErrorInfo::from(&err);
            let err = anyhow::Error::new(err);
            match info.suggestion {
                Some(suggestion) => Err(err.context(suggestion)),
                None => Err(err),
            }
        }
    }
}

/// Mirror the child's exit status, shell style (128 + signal)
fn child_exit_code(result: &ExecResult) -> ExitCode {
    match (result.exit_code, result.signal) {
        (Some(code), _) => ExitCode::from((code & 0xff) as u8),
        (None, Some(signal)) => ExitCode::from((128 + signal).clamp(0, 255) as u8),
        (None, None) => ExitCode::FAILURE,
    }
}
