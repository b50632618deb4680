//! parikrama-io daemon entry point
//!
//! Loads the TOML configuration, installs the interrupt handler, and runs
//! the acquisition pipeline until cancelled or a fatal error occurs.

use parikrama_io::{app, AppConfig};
use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `parikrama-io <path>` (positional)
/// - `parikrama-io --config <path>` (flag-based)
/// - `parikrama-io -c <path>` (short flag)
///
/// Defaults to `/etc/parikrama.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/parikrama.toml".to_string()
}

fn main() {
    let config_path = parse_config_path();
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            process::exit(-1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("parikrama-io v0.1.0 starting (config: {})", config_path);

    // The handler only flips the flag; teardown happens on the main flow at
    // the loop's next safe point
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    }) {
        log::error!("Error setting Ctrl-C handler: {}", e);
        process::exit(1);
    }

    match app::run(&config, running) {
        Ok(()) => log::info!("parikrama-io stopped"),
        Err(e) => {
            log::error!("{}", e);
            process::exit(e.exit_code());
        }
    }
}
