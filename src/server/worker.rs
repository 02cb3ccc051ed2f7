//! # Pool de Workers
//! src/server/worker.rs
//!
//! N threads de vida larga. Cada uno repite:
//!
//! ```text
//! pop() ──► handler.handle(&mut conn) ──► drop(conn)   (cierre siempre)
//!   │
//!   └── None ("no work", solo tras el shutdown) ──► salir
//! ```
//!
//! El handle es del worker desde el `pop` hasta el `drop`; un error o un panic
//! del handler no impide el cierre ni tumba al worker.

use log::{debug, info, warn};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::shutdown::ShutdownCoordinator;
use crate::handler::ConnectionHandler;
use crate::metrics::MetricsCollector;
use crate::queue::BoundedQueue;

/// Lo que comparten todos los workers
pub struct WorkerContext<C, H> {
    pub queue: Arc<BoundedQueue<C>>,
    pub handler: Arc<H>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub metrics: MetricsCollector,
}

impl<C, H> Clone for WorkerContext<C, H> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            handler: Arc::clone(&self.handler),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
        }
    }
}

/// Conjunto fijo de threads worker
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

/// Resultado del join del pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExit {
    pub joined: usize,
    pub panicked: usize,
}

impl WorkerPool {
    /// Lanza `size` workers con nombre `worker-<i>`.
    ///
    /// Si la creación de algún thread falla, cierra la cola, espera a los que ya
    /// arrancaron y retorna el error: no queda un pool a medias corriendo.
    pub fn spawn<C, H>(size: usize, ctx: WorkerContext<C, H>) -> io::Result<Self>
    where
        C: Send + 'static,
        H: ConnectionHandler<C>,
    {
        let mut handles = Vec::with_capacity(size);

        for id in 0..size {
            let worker_ctx = ctx.clone();
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker_loop(id, worker_ctx));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    ctx.queue.close();
                    WorkerPool { handles }.join();
                    return Err(e);
                }
            }
        }

        info!("👷 {} workers started", size);
        Ok(WorkerPool { handles })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Espera a que terminen todos los workers
    pub fn join(self) -> PoolExit {
        let mut exit = PoolExit {
            joined: 0,
            panicked: 0,
        };

        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(()) => exit.joined += 1,
                Err(_) => {
                    warn!("⚠️ {} terminated by panic", name);
                    exit.panicked += 1;
                }
            }
        }

        exit
    }
}

fn worker_loop<C, H>(id: usize, ctx: WorkerContext<C, H>)
where
    H: ConnectionHandler<C>,
{
    debug!("worker {} waiting for connections", id);

    // La cola se cierra dentro de request_stop: tras STOPPING, pop da None
    while ctx.shutdown.is_running() {
        let Some(mut conn) = ctx.queue.pop() else {
            break;
        };

        ctx.metrics.record_dispatch();
        let start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| ctx.handler.handle(&mut conn)));

        // Cierre siempre, antes de mirar el resultado
        drop(conn);

        let success = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("worker {}: request failed: {}", id, e);
                false
            }
            Err(payload) => {
                warn!("worker {}: handler panicked: {}", id, panic_message(&*payload));
                false
            }
        };

        ctx.metrics.record_handled(success, start.elapsed());
    }

    debug!("worker {} exiting", id);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::queue::SchedPolicy;
    use crate::test_support::{CloseLog, TrackedConn};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    const LIVENESS: Duration = Duration::from_secs(5);

    fn context<H>(capacity: usize, handler: H) -> WorkerContext<TrackedConn, H> {
        WorkerContext {
            queue: Arc::new(BoundedQueue::new(capacity, SchedPolicy::Fifo)),
            handler: Arc::new(handler),
            shutdown: ShutdownCoordinator::new(),
            metrics: MetricsCollector::new(),
        }
    }

    fn stop<H>(ctx: &WorkerContext<TrackedConn, H>) {
        ctx.shutdown.request_stop();
        ctx.queue.close();
    }

    #[test]
    fn test_no_dispatch_after_stop_with_queue_hook() {
        let log = CloseLog::new();
        let calls = Arc::new(Mutex::new(0usize));
        let ctx = context(4, {
            let calls = Arc::clone(&calls);
            move |_: &mut TrackedConn| -> Result<(), HandlerError> {
                *calls.lock().unwrap() += 1;
                Ok(())
            }
        });
        let hook_queue = Arc::clone(&ctx.queue);
        ctx.shutdown.on_stop(move || {
            hook_queue.close();
        });

        for id in 1..=3 {
            ctx.queue.push(log.conn(id)).unwrap();
        }

        // Solo request_stop, sin close explícito
        ctx.shutdown.request_stop();
        assert!(ctx.queue.is_closed());
        assert!(ctx.queue.pop().is_none());

        let pool = WorkerPool::spawn(2, ctx.clone()).unwrap();
        assert_eq!(pool.join(), PoolExit { joined: 2, panicked: 0 });

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(ctx.queue.drain().len(), 3);
    }

    #[test]
    fn test_single_worker_fifo_dispatch() {
        let log = CloseLog::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(2, {
            let seen = Arc::clone(&seen);
            move |conn: &mut TrackedConn| -> Result<(), HandlerError> {
                seen.lock().unwrap().push(conn.id);
                Ok(())
            }
        });

        let pool = WorkerPool::spawn(1, ctx.clone()).unwrap();
        for id in 1..=6 {
            ctx.queue.push(log.conn(id)).unwrap();
        }

        assert!(log.wait_for(6, LIVENESS));
        stop(&ctx);
        assert_eq!(pool.join(), PoolExit { joined: 1, panicked: 0 });

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(log.closed(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_three_workers_capacity_one_no_duplicates() {
        let log = CloseLog::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(1, {
            let seen = Arc::clone(&seen);
            move |conn: &mut TrackedConn| -> Result<(), HandlerError> {
                seen.lock().unwrap().push(conn.id);
                thread::sleep(Duration::from_millis(5));
                Ok(())
            }
        });

        let pool = WorkerPool::spawn(3, ctx.clone()).unwrap();
        assert_eq!(pool.size(), 3);
        for id in 1..=5 {
            ctx.queue.push(log.conn(id)).unwrap();
        }

        assert!(log.wait_for(5, LIVENESS));
        stop(&ctx);
        pool.join();

        let mut ids = seen.lock().unwrap().clone();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(log.each_closed_once());
        assert_eq!(ctx.metrics.snapshot().dispatched, 5);
    }

    #[test]
    fn test_handler_error_still_closes() {
        let log = CloseLog::new();
        let ctx = context(4, |conn: &mut TrackedConn| -> Result<(), HandlerError> {
            if conn.id % 2 == 0 {
                Err(HandlerError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        });

        let pool = WorkerPool::spawn(1, ctx.clone()).unwrap();
        for id in 1..=4 {
            ctx.queue.push(log.conn(id)).unwrap();
        }

        assert!(log.wait_for(4, LIVENESS));
        stop(&ctx);
        pool.join();

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.handled_ok, 2);
        assert_eq!(snapshot.handled_failed, 2);
        assert!(log.each_closed_once());
    }

    #[test]
    fn test_handler_panic_does_not_kill_worker() {
        let log = CloseLog::new();
        let ctx = context(4, |conn: &mut TrackedConn| -> Result<(), HandlerError> {
            if conn.id == 1 {
                panic!("handler exploded");
            }
            Ok(())
        });

        let pool = WorkerPool::spawn(1, ctx.clone()).unwrap();
        ctx.queue.push(log.conn(1)).unwrap();
        ctx.queue.push(log.conn(2)).unwrap();

        assert!(log.wait_for(2, LIVENESS));
        stop(&ctx);
        assert_eq!(pool.join(), PoolExit { joined: 1, panicked: 0 });

        assert_eq!(log.closed(), vec![1, 2]);
        assert_eq!(ctx.metrics.snapshot().handled_failed, 1);
    }

    #[test]
    fn test_idle_workers_exit_on_shutdown() {
        let ctx = context(1, |_: &mut TrackedConn| -> Result<(), HandlerError> { Ok(()) });
        let pool = WorkerPool::spawn(4, ctx.clone()).unwrap();

        // Todos bloqueados en pop() con la cola vacía
        thread::sleep(Duration::from_millis(50));
        stop(&ctx);

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || tx.send(pool.join()).unwrap());
        let exit = rx.recv_timeout(LIVENESS).expect("workers did not exit in time");
        assert_eq!(exit.joined, 4);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(&*payload), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
