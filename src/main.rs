//! # Concurrent Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración, inicializa el logging, instala las señales y
//! corre el servidor hasta SIGINT/SIGTERM.

use log::{debug, error, info};
use std::process;

use concurrent_server::config::Config;
use concurrent_server::error::ServerError;
use concurrent_server::logger;
use concurrent_server::server::{signals, Server};

fn main() {
    println!("=================================");
    println!("  Concurrent Server");
    println!("  Acceptor + cola acotada + workers");
    println!("=================================\n");

    let config = Config::new();

    if let Err(e) = logger::init(config.log_level) {
        eprintln!("💥 {}", e);
        process::exit(1);
    }

    if let Err(e) = run(config) {
        error!("💥 fatal: {}", e);
        process::exit(1);
    }
}

fn run(config: Config) -> Result<(), ServerError> {
    config.validate()?;
    config.print_summary();

    std::env::set_current_dir(&config.root_dir).map_err(|source| ServerError::Chdir {
        dir: config.root_dir.clone(),
        source,
    })?;

    let server = Server::bind(config)?;
    let metrics = server.metrics();
    let signal_handle = signals::install(server.shutdown_handle())?;

    let report = server.run()?;
    signal_handle.close();

    info!(
        "📊 accepted {}, handled {} ok / {} failed, drained {}, uptime {}s",
        report.metrics.accepted,
        report.metrics.handled_ok,
        report.metrics.handled_failed,
        report.drained,
        report.metrics.uptime_secs
    );
    debug!("final metrics: {}", metrics.to_json());
    if report.workers.panicked > 0 {
        error!("{} workers terminated by panic", report.workers.panicked);
    }

    Ok(())
}
