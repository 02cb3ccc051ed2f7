//! # Cola de Conexiones
//! src/queue/mod.rs
//!
//! Hand-off acotado entre el acceptor y el pool de workers:
//! - `bounded`: la cola bloqueante (push/pop con backpressure y cierre)
//! - `policy`: orden de admisión (FIFO o ShortestFirst)

pub mod bounded;
pub mod policy;

pub use bounded::{BoundedQueue, QueueStats};
pub use policy::{SchedPolicy, SizeHint};
