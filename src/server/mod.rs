//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Threads del servidor y su coordinación:
//! - `acceptor`: único productor, acepta y encola conexiones
//! - `worker`: pool fijo de consumidores que despachan al handler
//! - `shutdown`: máquina de estados RUNNING → STOPPING → STOPPED
//! - `signals`: thread que traduce SIGINT/SIGTERM a un pedido de stop
//! - `listener`: abstracción del socket de escucha
//! - `tcp`: `Server`, que arma todo y supervisa el shutdown

pub mod acceptor;
pub mod listener;
pub mod shutdown;
pub mod signals;
pub mod tcp;
pub mod worker;

// Re-exportar para facilitar el uso
pub use acceptor::{Acceptor, AcceptorExit};
pub use listener::Listener;
pub use shutdown::{Phase, ShutdownCoordinator, ShutdownHandle};
pub use tcp::{Server, ServerReport};
pub use worker::{PoolExit, WorkerContext, WorkerPool};
