//! # Concurrent Server
//! src/lib.rs
//!
//! Esqueleto de servidor concurrente: un acceptor, una cola acotada de
//! conexiones y un pool fijo de workers, con shutdown ordenado por señales.
//!
//! ## Arquitectura
//!
//! - `queue`: cola acotada bloqueante (FIFO o shortest-first)
//! - `server`: acceptor, workers, coordinador de shutdown y señales
//! - `handler`: trait del colaborador que atiende cada conexión, más el
//!   handler HTTP/1.0 por defecto
//! - `http`: parsing de requests y construcción de responses
//! - `metrics`: contadores y latencias del servidor
//! - `config`, `logger`, `error`: CLI, logging y errores tipados
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use concurrent_server::config::Config;
//! use concurrent_server::server::Server;
//!
//! let config = Config::default();
//! let server = Server::bind(config).expect("bind failed");
//! let report = server.run().expect("server failed");
//! println!("{} requests served", report.metrics.handled_ok);
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod queue;
pub mod server;

#[cfg(test)]
mod test_support;
