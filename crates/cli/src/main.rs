// fbag - run baggage scenarios through the fee engine (headless)

mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use farebag_cli::report;
use farebag_cli::scenario::{Scenario, ScenarioError};
use farebag_config::{ConfigError, EngineConfig};
use farebag_engine::EngineError;

use exit_codes::{
    EXIT_CONFIG, EXIT_ENGINE, EXIT_ERROR, EXIT_FEE_INVALID, EXIT_SCENARIO, EXIT_SUCCESS,
    EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "fbag")]
#[command(about = "Baggage allowance and charge engine (CLI mode, headless)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve carriers, match rules and price fare paths for a scenario file
    #[command(after_help = "\
Examples:
  fbag run trip.json
  fbag run trip.json --config engine.toml --json
  fbag run trip.json --json --trace | jq '.trace'
  fbag run trip.json --strict || echo 'some fare path has no valid fee'")]
    Run {
        /// Scenario JSON file
        scenario: PathBuf,

        /// Engine config (TOML). Defaults to the user config file, then built-in defaults.
        #[arg(long, short = 'c', env = "FAREBAG_CONFIG")]
        config: Option<PathBuf>,

        /// Write the report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Include structured rule-trace events in the report
        #[arg(long)]
        trace: bool,

        /// Exit 6 when any fare path has no valid fee
        #[arg(long)]
        strict: bool,
    },

    /// Parse and validate an engine config file
    CheckConfig {
        /// Config file (TOML)
        config: PathBuf,

        /// Print the effective config as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  farebag-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "farebag_engine=debug,farebag_cli=info,warn",
            _ => "farebag_engine=trace,farebag_cli=debug,info",
        })
    });
    // A subscriber may already be installed when embedded; keep going either way
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            scenario,
            config,
            json,
            trace,
            strict,
        } => cmd_run(&scenario, config.as_deref(), json, trace, strict),
        Commands::CheckConfig { config, json } => cmd_check_config(&config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ScenarioError> for CliError {
    fn from(err: ScenarioError) -> Self {
        let code = match err {
            ScenarioError::Io(_) => EXIT_USAGE,
            ScenarioError::Parse(_) | ScenarioError::Invalid(_) => EXIT_SCENARIO,
        };
        Self { code, message: err.to_string(), hint: None }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io(_) => EXIT_USAGE,
            ConfigError::Parse(_) | ConfigError::Validation(_) => EXIT_CONFIG,
        };
        Self { code, message: err.to_string(), hint: None }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let hint = match &err {
            EngineError::Store(_) => Some("check the scenario's \"store\" section".to_string()),
            EngineError::InvalidFarePath(_) => {
                Some("fare components must cover distinct itinerary segments".to_string())
            }
            _ => None,
        };
        let code = match err {
            EngineError::Config(_) => EXIT_CONFIG,
            _ => EXIT_ENGINE,
        };
        Self { code, message: err.to_string(), hint }
    }
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .and_then(|()| handle.flush())
        .map_err(|e| CliError::io(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// run
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(p) => EngineConfig::load(p).map_err(|e| {
            let hint = format!("validate it with `fbag check-config {}`", p.display());
            CliError::from(e).with_hint(hint)
        }),
        None => Ok(EngineConfig::load_default()?),
    }
}

fn cmd_run(
    scenario: &Path,
    config: Option<&Path>,
    json: bool,
    trace: bool,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(config)?;
    let scenario = Scenario::load(scenario)?;
    log::debug!(
        "{} segment(s), {} passenger(s), {} fare path(s)",
        scenario.segments.len(),
        scenario.passengers.len(),
        scenario.fare_paths.len()
    );

    let report = report::run(&scenario, config, trace)?;
    if json {
        write_stdout(&to_json(&report)?)?;
    } else {
        write_stdout(&report::render_text(&report))?;
    }

    if strict && report.has_invalid_fee() {
        return Err(CliError {
            code: EXIT_FEE_INVALID,
            message: "at least one fare path has no valid fee".to_string(),
            hint: Some("run with --trace to see which rules were considered".to_string()),
        });
    }
    Ok(())
}

// ============================================================================
// check-config
// ============================================================================

fn cmd_check_config(path: &Path, json: bool) -> Result<(), CliError> {
    let config = EngineConfig::load(path)?;
    if json {
        write_stdout(&to_json(&config)?)
    } else {
        write_stdout(&format!("{}: ok\n", path.display()))
    }
}
