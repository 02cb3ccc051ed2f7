//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Arma las piezas y supervisa el ciclo de vida:
//!
//! ```text
//! listener ──► Acceptor ──push──► BoundedQueue ──pop──► WorkerPool ──► handler ──► close
//! ```
//!
//! `run` bloquea el thread que lo llama (el supervisor) hasta que alguien pide
//! el stop. Desde ahí, en orden:
//!
//! 1. `wake` del listener para sacar al acceptor de `accept`
//! 2. `close` de la cola: despierta a todos los que esperan en `push`/`pop`
//! 3. join del acceptor y de los workers
//! 4. cierre de las conexiones que quedaron encoladas sin despachar
//! 5. fase STOPPED

use log::{error, info, warn};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use super::acceptor::{Acceptor, AcceptorExit};
use super::listener::Listener;
use super::shutdown::{ShutdownCoordinator, ShutdownHandle};
use super::worker::{PoolExit, WorkerContext, WorkerPool};
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::handler::{ConnectionHandler, HttpHandler};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::queue::BoundedQueue;

/// Servidor concurrente con pool fijo de workers y cola acotada
pub struct Server<H> {
    config: Config,
    listener: Arc<TcpListener>,
    queue: Arc<BoundedQueue<TcpStream>>,
    handler: Arc<H>,
    coordinator: Arc<ShutdownCoordinator>,
    metrics: MetricsCollector,
}

/// Resumen que deja `run` al terminar
#[derive(Debug, Clone)]
pub struct ServerReport {
    pub metrics: MetricsSnapshot,
    pub acceptor: AcceptorExit,
    pub workers: PoolExit,
    /// Conexiones encoladas que nunca llegaron a un worker
    pub drained: usize,
}

impl Server<HttpHandler> {
    /// Bind con el handler HTTP por defecto
    pub fn bind(config: Config) -> Result<Self> {
        let (listener, queue, metrics) = bind_parts(&config)?;
        let handler = HttpHandler::new(Arc::clone(&queue), metrics.clone());
        Ok(Self::assemble(config, listener, queue, metrics, handler))
    }
}

impl<H: ConnectionHandler<TcpStream>> Server<H> {
    /// Bind con un handler propio
    pub fn bind_with_handler(config: Config, handler: H) -> Result<Self> {
        let (listener, queue, metrics) = bind_parts(&config)?;
        Ok(Self::assemble(config, listener, queue, metrics, handler))
    }

    fn assemble(
        config: Config,
        listener: Arc<TcpListener>,
        queue: Arc<BoundedQueue<TcpStream>>,
        metrics: MetricsCollector,
        handler: H,
    ) -> Self {
        let coordinator = ShutdownCoordinator::new();
        // La cola se cierra dentro de la transición a STOPPING
        let stop_queue = Arc::clone(&queue);
        coordinator.on_stop(move || {
            stop_queue.close();
        });

        Self {
            config,
            listener,
            queue,
            handler: Arc::new(handler),
            coordinator,
            metrics,
        }
    }

    /// Dirección real del socket (útil con puerto 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(Listener::local_addr(&*self.listener)?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.coordinator.handle()
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Corre el servidor hasta que se pida el stop y todos los threads terminen
    pub fn run(self) -> Result<ServerReport> {
        let addr = self.local_addr()?;

        let ctx = WorkerContext {
            queue: Arc::clone(&self.queue),
            handler: Arc::clone(&self.handler),
            shutdown: Arc::clone(&self.coordinator),
            metrics: self.metrics.clone(),
        };
        let pool = WorkerPool::spawn(self.config.threads, ctx).map_err(|source| {
            ServerError::Spawn {
                what: "worker pool".to_string(),
                source,
            }
        })?;
        info!(
            "🚀 listening on {} ({} workers, {} buffers, {} scheduling)",
            addr,
            pool.size(),
            self.config.buffers,
            self.config.policy
        );

        let acceptor = Acceptor::new(
            Arc::clone(&self.listener),
            Arc::clone(&self.queue),
            Arc::clone(&self.coordinator),
            self.metrics.clone(),
        );
        let acceptor = match acceptor.spawn() {
            Ok(handle) => handle,
            Err(source) => {
                self.coordinator.request_stop();
                self.queue.close();
                pool.join();
                self.finish();
                return Err(ServerError::Spawn {
                    what: "acceptor".to_string(),
                    source,
                });
            }
        };

        self.coordinator.wait_for_stop_request();
        info!("🛑 shutdown requested, waking acceptor and workers");

        if let Err(e) = self.listener.wake() {
            error!("could not wake the acceptor: {}", e);
        }
        self.queue.close();

        let acceptor_exit = acceptor.join().unwrap_or_else(|_| {
            warn!("⚠️ acceptor terminated by panic");
            AcceptorExit::default()
        });
        let workers = pool.join();
        let drained = self.finish();

        let report = ServerReport {
            metrics: self.metrics.snapshot(),
            acceptor: acceptor_exit,
            workers,
            drained,
        };
        info!(
            "✅ server stopped: {} handled, {} failed, {} drained",
            report.metrics.handled_ok, report.metrics.handled_failed, report.drained
        );
        Ok(report)
    }

    /// Cierra lo que quedó en la cola y marca STOPPED
    fn finish(&self) -> usize {
        let leftover = self.queue.drain();
        let drained = leftover.len();
        drop(leftover);

        if drained > 0 {
            warn!("closed {} queued connections that were never dispatched", drained);
        }
        self.metrics.record_drained(drained);
        self.coordinator.mark_stopped();
        drained
    }
}

fn bind_parts(
    config: &Config,
) -> Result<(Arc<TcpListener>, Arc<BoundedQueue<TcpStream>>, MetricsCollector)> {
    config.validate()?;

    let addr = config.address();
    let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
        addr: addr.clone(),
        source,
    })?;

    let queue = Arc::new(BoundedQueue::new(config.buffers, config.policy));
    Ok((Arc::new(listener), queue, MetricsCollector::new()))
}
