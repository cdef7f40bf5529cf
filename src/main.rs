use anyhow::Context as _;
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use perfsift::{Config, analyze_run, default_config_path, resolve_run_dir};

mod cli_logger;

use cli_logger::CliLogger;

#[derive(Debug, Parser)]
#[command(name = "perfsift", version)]
#[command(about = "Summarize an iOS performance capture run into issues and root-cause hints")]
struct Cli {
    /// Capture run directory (holds metrics/final.json and thread_cpu_analysis.json)
    #[arg(value_name = "RUN_DIR")]
    run_dir: PathBuf,

    /// Emit the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Disable ANSI colors in CLI messages
    #[arg(long)]
    no_color: bool,

    /// Threshold/limit overrides (defaults to ./perfsift.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            print!("{err}");
            return ExitCode::from(exit_code_for(err.kind()));
        }
    };

    let logger = CliLogger::new(cli.json, cli.no_color);
    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, logger: &CliLogger) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load_optional(&default_config_path()),
    };
    let run_dir = resolve_run_dir(&cli.run_dir)?;
    let report = analyze_run(&run_dir, &config);
    logger.print_report(&report)
}

/// Help and version requests succeed; every other parse failure is an
/// invocation error.
fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_exit_code(args: &[&str]) -> u8 {
        let err = Cli::try_parse_from(args).expect_err("parse should stop");
        exit_code_for(err.kind())
    }

    #[test]
    fn missing_run_dir_exits_one() {
        let err = Cli::try_parse_from(["perfsift"]).expect_err("missing run dir");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(exit_code_for(err.kind()), 1);
    }

    #[test]
    fn unknown_flag_exits_one() {
        assert_eq!(parse_exit_code(&["perfsift", "x", "--bogus"]), 1);
    }

    #[test]
    fn help_and_version_exit_zero() {
        assert_eq!(parse_exit_code(&["perfsift", "--help"]), 0);
        assert_eq!(parse_exit_code(&["perfsift", "--version"]), 0);
    }

    #[test]
    fn run_dir_and_flags_parse() {
        let cli = Cli::try_parse_from(["perfsift", "runs/case1", "--json", "--no-color"])
            .expect("valid invocation");
        assert_eq!(cli.run_dir, PathBuf::from("runs/case1"));
        assert!(cli.json);
        assert!(cli.no_color);
        assert!(cli.config.is_none());
    }
}
