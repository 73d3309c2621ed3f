//! Application entry point — YouTube live chat reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (`--config PATH` or the default settings file).
//! 4. Overlay CLI flags and validate; optionally save the settings.
//! 5. Build the YouTube chat source and the Speech Dispatcher backend.
//! 6. Install the Ctrl-C handler.
//! 7. Run the [`Orchestrator`] on stdin/stdout until quit.
//!
//! Exit code 0 on a clean quit, 1 on configuration or runtime failure.

use std::io::{stdin, stdout, BufReader};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use yt_liveread::{
    chat::YouTubeChat,
    cli::Cli,
    config::AppConfig,
    pipeline::{install_interrupt_handler, Orchestrator, PipelineError},
    speech::SpeechDispatcher,
};

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 4. CLI overrides
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        println!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    if cli.save_config {
        let saved = match &cli.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        };
        match saved {
            Ok(()) => log::info!("Settings saved"),
            Err(e) => log::warn!("Failed to save settings: {e}"),
        }
    }

    // 5. Collaborators
    let orchestrator = match Orchestrator::new(
        config,
        Arc::new(YouTubeChat::new()),
        Arc::new(SpeechDispatcher::new()),
    ) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            println!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // 6. Ctrl-C
    if let Err(e) = install_interrupt_handler(orchestrator.signals().shutdown.clone()) {
        log::warn!("Ctrl-C handling unavailable: {e}");
    }

    // 7. Run
    match orchestrator.run(BufReader::new(stdin()), stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                PipelineError::SpeechUnavailable | PipelineError::ChatUnavailable => {
                    log::error!("{e}")
                }
                _ => log::error!("Fatal error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}
