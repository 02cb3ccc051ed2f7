//! # Logging
//! src/logger.rs
//!
//! Inicializa `fern` como backend del facade `log`: salida a stderr con nivel
//! coloreado, timestamp RFC 3339 y nombre del thread (acceptor, worker-N, ...).

use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use humantime::format_rfc3339_millis;
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::error::ServerError;

/// Evita una segunda inicialización
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configura el logger global.
///
/// Llamarlo más de una vez no hace nada (retorna Ok).
pub fn init(level: LevelFilter) -> Result<(), ServerError> {
    if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let colors = ColoredLevelConfig::new()
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .trace(Color::Magenta);

    Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            let thread = std::thread::current();
            out.finish(format_args!(
                "[{date} {level} {thread}] {message} [{target}]",
                date = format_rfc3339_millis(SystemTime::now()),
                level = colors.color(record.level()),
                thread = thread.name().unwrap_or("unnamed"),
                message = message,
                target = record.target(),
            ))
        })
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| ServerError::Logger(e.to_string()))?;

    log::debug!("Logger initialized with level: {level}");
    Ok(())
}
