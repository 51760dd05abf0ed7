//! Network Speed Probe - Main CLI Application
//!
//! Periodically downloads a fixed-size file, records the measured throughput
//! and keeps a running total of data used across sessions.

use clap::Parser;
use network_speed_probe::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    logging::Logger,
    models::Aggregates,
    output::{draw, format_history, ConsoleSink, TerminalChart},
    BlobStore, FileBlobStore, ProbeScheduler, ResultStore, SpeedProbe, PKG_NAME, VERSION,
};
use std::{error::Error, future, process, sync::Arc, time::Duration};

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(2);
    }

    let use_color = cli.use_colors();
    if let Err(e) = run_application(cli).await {
        eprintln!("Error: {}", e.format_for_console(use_color));

        if let Some(source) = e.source() {
            eprintln!("Caused by: {}", source);
        }

        print_error_suggestions(&e);

        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.env_help {
        println!("{}", EnvManager::display_env_help());
        return Ok(());
    }

    if cli.debug {
        println!("{} v{}", PKG_NAME, VERSION);
        println!("Debug mode enabled");
        println!();

        for warning in EnvManager::validate_current_env() {
            eprintln!("{}", warning);
        }
    }

    let config = load_config(cli.clone())?;
    let logger = Logger::with_config("NSP", &config);
    logger.set_session_id(Logger::new_correlation_id()).await;

    if config.debug {
        println!("Configuration loaded successfully:");
        println!("{}", display_config_summary(&config));
        println!();
    }

    for warning in validate_config(&config)? {
        eprintln!("{}", warning.format(config.enable_color));
    }

    let data_dir = config.resolved_data_dir();
    let backend: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(&data_dir));
    let store = ResultStore::new(backend, logger.clone()).with_max_entries(config.max_entries);

    if cli.clear {
        store.clear()?;
        println!("Cleared stored results in {}", data_dir.display());
        return Ok(());
    }

    if cli.history {
        return print_history(&store).await;
    }

    let sink = Arc::new(ConsoleSink::new(config.enable_color).with_elapsed(config.verbose));
    let chart = Arc::new(TerminalChart::new(config.enable_color));
    let probe = Arc::new(SpeedProbe::from_config(&config, logger.clone())?);

    let mut scheduler = ProbeScheduler::new(
        probe,
        store,
        sink,
        chart,
        config.target(),
        config.interval(),
        logger.clone(),
    );
    scheduler.bootstrap().await?;

    if cli.once {
        scheduler.run_once().await?;
        return Ok(());
    }

    logger
        .info("Starting periodic probes")
        .field("url", &config.url)
        .field("interval_seconds", config.interval_seconds)
        .log()
        .await;

    let mut attempts = scheduler.subscribe_attempts();
    let run_limit = cli.runs;
    let time_limit = cli.duration.map(Duration::from_secs);

    scheduler.start();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            logger.info("Interrupted, stopping").log().await;
        }
        _ = async {
            match time_limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending().await,
            }
        } => {
            logger.info("Duration limit reached").log().await;
        }
        _ = async {
            match run_limit {
                Some(runs) => {
                    let _ = attempts.wait_for(|count| *count >= runs).await;
                }
                None => future::pending().await,
            }
        } => {
            logger.info("Run limit reached").log().await;
        }
    }

    scheduler.stop();
    Ok(())
}

/// Print the stored log, its aggregates and the chart
async fn print_history(store: &ResultStore) -> Result<()> {
    let log = store.all().await?;

    if log.is_empty() {
        println!("No stored results");
    } else {
        println!("{}", format_history(&log));
        println!();
        let points: Vec<_> = log.iter().map(|m| m.chart_point()).collect();
        print!("{}", draw(&points, 40));
    }

    println!("{}", ConsoleSink::aggregates_line(&Aggregates::from_log(&log)));
    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (see --env-help)");
            eprintln!("  - The probe URL must start with http:// or https://");
            eprintln!("  - The expected size must match the remote file exactly");
        }
        AppError::Network(_) | AppError::Probe(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify the remote file size with --size");
            eprintln!("  - Increase the request timeout with --timeout");
        }
        AppError::Io(_) | AppError::Storage(_) => {
            eprintln!();
            eprintln!("Storage help:");
            eprintln!("  - Check that the results directory is writable (--data-dir)");
            eprintln!("  - Use --clear to reset the stored log");
        }
        _ => {}
    }
}
