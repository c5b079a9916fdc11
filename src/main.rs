use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use ssh_copy::cli::{Args, Commands};
use ssh_copy::config::{load_or_default, CopyTaskConfig};
use ssh_copy::error::CopyError;
use ssh_copy::remote::ssh::SshSession;
use ssh_copy::security::scrub_secrets;
use ssh_copy::task::CopyTask;
use ssh_copy::transfer::{TaskOutcome, TaskStatus};
use ssh_copy::utils::summary::{write_run_summary, RunInfo};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    // Load and process configuration
    let config = load_and_process_config(&args)?;
    let secrets: Vec<String> = config.endpoint.secrets().into_iter().map(str::to_string).collect();

    let info = RunInfo::start(&config.endpoint.endpoint(), &config.source_folder, &config.target_folder);
    info!("Starting copy run {}", info.run_id);

    let outcome = match run_copy(config) {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = scrub_secrets(&format!("{:#}", e), &secrets);
            error!("{}", message);
            if let Some(path) = &args.summary {
                write_run_summary(path, &info, &TaskOutcome::failure(message))?;
            }
            process::exit(1);
        }
    };

    for line in outcome.failure_lines() {
        error!("  {}", scrub_secrets(&line, &secrets));
    }

    if let Some(path) = &args.summary {
        write_run_summary(path, &info, &outcome)?;
    }

    if outcome.status == TaskStatus::Failed {
        error!("{}", outcome.summary);
        process::exit(1);
    }

    info!("{}", outcome.summary);
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating example configuration file at {}", path.display());
            CopyTaskConfig::example().save_to_yaml_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Load configuration, apply command-line overrides and expand variables
fn load_and_process_config(args: &Args) -> Result<CopyTaskConfig> {
    let mut config = load_or_default(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.process_environment_variables();
    config.validate()?;
    Ok(config)
}

/// Resolve locally, then connect and run the remote phases
fn run_copy(config: CopyTaskConfig) -> Result<TaskOutcome> {
    let task = CopyTask::prepare(config)?;

    if !task.needs_session() {
        return Ok(TaskOutcome::success(0, "No files matched; nothing to copy"));
    }

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(async {
        let endpoint = task.config().endpoint.clone();
        let connections = task.config().queue_config().concurrency;
        let session = SshSession::connect(endpoint.clone(), connections)
            .await
            .map_err(|source| CopyError::Connection {
                endpoint: endpoint.endpoint(),
                source,
            })?;

        let session = Arc::new(session);
        let outcome = task.run(Arc::clone(&session)).await?;
        info!("Uploaded {} bytes in total", session.get_progress());
        Ok(outcome)
    })
}
