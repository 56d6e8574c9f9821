//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, installs logging,
//! dispatches the command and prints every error itself.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use super::args::{Cli, Commands};
use super::commands;

use crate::utils::logging::init_tracing;
use crate::utils::redaction::redact_error_message;
use crate::{CliArgs, Config, ExitCode, ItineraError, PlannerContext};

/// Run the CLI. Errors are printed here; the caller only maps the exit code.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        cache_dir: cli.cache_dir.clone(),
        verbose: cli.verbose.then_some(true),
        model: cli.model.clone(),
        evaluator_model: cli.evaluator_model.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = ItineraError::from(err);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    if let Err(e) = init_tracing(config.defaults.verbose) {
        eprintln!("warning: logging disabled: {e}");
    }
    for (key, (value, source)) in config.effective_config() {
        debug!(key = %key, value = %value, source = %source, "Effective config");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(dispatch(cli.command, config));
    match result {
        Ok(()) => Ok(()),
        Err(error) => Err(report_error(&error)),
    }
}

async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::CacheKey { city, days } => commands::execute_cache_key_command(&city, days),
        Commands::Config => commands::execute_config_command(&config),
        Commands::Plan { info, city, days } => {
            let ctx = PlannerContext::from_config(config)?;
            commands::execute_plan_command(&ctx, info.as_deref(), city, days).await
        }
        Commands::Trip { query } => {
            let ctx = PlannerContext::from_config(config)?;
            commands::execute_trip_command(&ctx, &query).await
        }
        Commands::Intent { query } => {
            let ctx = PlannerContext::from_config(config)?;
            commands::execute_intent_command(&ctx, &query).await
        }
        Commands::Ask {
            question,
            image_description,
            knowledge,
            json,
        } => {
            let ctx = PlannerContext::from_config(config)?;
            commands::execute_ask_command(
                &ctx,
                &question,
                image_description.as_deref(),
                knowledge.as_deref(),
                json,
            )
            .await
        }
    }
}

fn report_error(error: &anyhow::Error) -> ExitCode {
    if let Some(err) = error.downcast_ref::<ItineraError>() {
        eprintln!("{}", err.display_for_user());
        return err.to_exit_code();
    }
    eprintln!("✗ Unexpected error: {}", redact_error_message(&format!("{error:#}")));
    eprintln!("\n  Run with --verbose for more detailed output");
    ExitCode::INTERNAL
}
