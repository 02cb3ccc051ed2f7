//! # Acceptor
//! src/server/acceptor.rs
//!
//! Único productor: acepta conexiones y las empuja a la cola. Cuando la cola
//! está llena, `push` bloquea y con eso deja de aceptar (backpressure).
//!
//! Si el shutdown llega mientras espera en `push`, recupera la conexión y la
//! cierra él mismo: en ese momento es su único dueño.
//!
//! Un error de `accept` que se repite (EMFILE, ENFILE) no se reintenta en
//! caliente: espera entre intentos, duplicando hasta `ACCEPT_BACKOFF_MAX`.

use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::listener::Listener;
use super::shutdown::ShutdownCoordinator;
use crate::metrics::MetricsCollector;
use crate::queue::BoundedQueue;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Cómo terminó el loop del acceptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptorExit {
    pub accepted: u64,
    pub rejected: u64,
}

pub struct Acceptor<L: Listener> {
    listener: Arc<L>,
    queue: Arc<BoundedQueue<L::Conn>>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: MetricsCollector,
}

impl<L: Listener> Acceptor<L> {
    pub fn new(
        listener: Arc<L>,
        queue: Arc<BoundedQueue<L::Conn>>,
        shutdown: Arc<ShutdownCoordinator>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            listener,
            queue,
            shutdown,
            metrics,
        }
    }

    /// Corre el loop en un thread propio llamado `acceptor`
    pub fn spawn(self) -> io::Result<JoinHandle<AcceptorExit>> {
        thread::Builder::new()
            .name("acceptor".to_string())
            .spawn(move || self.run())
    }

    /// Loop del productor; retorna cuando `running` pasa a false
    pub fn run(self) -> AcceptorExit {
        let mut exit = AcceptorExit::default();
        let mut backoff = ACCEPT_BACKOFF_MIN;

        while self.shutdown.is_running() {
            let conn = match self.listener.accept() {
                Ok(conn) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    conn
                }
                Err(e) => {
                    if !self.shutdown.is_running() {
                        break;
                    }
                    warn!("❌ accept failed: {} (retrying in {:?})", e, backoff);
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                    continue;
                }
            };

            // Puede ser la conexión de `wake` o un cliente que llegó tarde
            if !self.shutdown.is_running() {
                debug!("connection accepted after shutdown began, closing it");
                drop(conn);
                break;
            }

            exit.accepted += 1;
            self.metrics.record_accepted();

            if let Err(rejected) = self.queue.push(conn) {
                debug!("queue closed while pushing, closing connection");
                drop(rejected);
                exit.rejected += 1;
                self.metrics.record_rejected();
                break;
            }
        }

        info!(
            "acceptor stopped ({} accepted, {} closed at shutdown)",
            exit.accepted, exit.rejected
        );
        exit
    }
}
