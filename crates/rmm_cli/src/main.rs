//! RMM agent CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid input or configuration
//! - 3: Invocation cancelled

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rmm_agents::AgentError;
use rmm_core::CoreError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_INPUT: u8 = 2;
    pub const CANCELLED: u8 = 3;
}

fn env_filter() -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["rmm=info", "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Logs go to stderr so `--json` output on stdout stays machine readable.
fn init_logging(json: bool) {
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    // Already initialized when embedded in another subscriber; keep going.
    let _ = tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(env_filter())
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = match commands::load_config(cli.config.as_deref(), cli.mock) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(categorize_error(&e));
        }
    };

    let result = match cli.command {
        Commands::Route(args) => commands::route::execute(args).await,
        Commands::Ask(args) => commands::ask::execute(args, &config).await,
        Commands::Stream(args) => commands::stream::execute(args, &config).await,
        Commands::Health(args) => commands::health::execute(args, &config).await,
        Commands::Execute(args) => commands::execute::execute(args, &config).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<AgentError>() {
            if err.is_cancelled() {
                return ExitCodes::CANCELLED;
            }
            if err.is_invalid_input() {
                return ExitCodes::INVALID_INPUT;
            }
        }
        if let Some(err) = cause.downcast_ref::<CoreError>() {
            match err {
                CoreError::Cancelled => return ExitCodes::CANCELLED,
                CoreError::InvalidInput(_) | CoreError::Config(_) => return ExitCodes::INVALID_INPUT,
                _ => {}
            }
        }
    }
    ExitCodes::GENERAL_ERROR
}
