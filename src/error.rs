//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores:
//! - **Fatales de arranque** (`ServerError`): bind, creación de threads, chdir, señales.
//!   El proceso reporta y termina; nunca queda un arranque parcial corriendo.
//! - **Transitorios por conexión** (`HandlerError`): quedan aislados en un worker,
//!   se registran y la conexión se cierra igual.
//! - Las carreras con el shutdown (push/pop que observan la parada) no son errores:
//!   se modelan como `Err(item)` y `None` en la cola.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errores de validación de la configuración
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker threads must be >= 1 (got {0})")]
    InvalidThreads(usize),

    #[error("queue buffers must be >= 1 (got {0})")]
    InvalidBuffers(usize),

    #[error("unknown scheduling policy '{0}' (expected 0|1|fifo|sff)")]
    InvalidPolicy(String),
}

/// Errores fatales del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to change directory to {}: {source}", .dir.display())]
    Chdir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),

    #[error("failed to initialize logger: {0}")]
    Logger(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errores de un handler sobre una única conexión
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;
