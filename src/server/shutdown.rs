//! # Coordinador de Shutdown
//! src/server/shutdown.rs
//!
//! Máquina de estados del proceso:
//!
//! ```text
//! RUNNING ──request_stop()──► STOPPING ──mark_stopped()──► STOPPED
//! ```
//!
//! `request_stop` baja la bandera `running`, corre los hooks de stop y despierta
//! al supervisor; es lo único que hace un thread de señales. El trabajo pesado
//! (despertar el accept, join de threads) lo hace el supervisor en `Server::run`.
//!
//! Los hooks corren bajo el lock de la fase y antes de que `running` cambie: la
//! cola registrada como hook queda cerrada antes de que alguien pueda observar
//! STOPPING, así ningún `pop` despacha trabajo después.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Fase del ciclo de vida del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Running => "RUNNING",
            Phase::Stopping => "STOPPING",
            Phase::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

type StopHook = Box<dyn FnOnce() + Send>;

/// Estado de ejecución compartido por acceptor, workers y supervisor
pub struct ShutdownCoordinator {
    /// Leída sin lock por todos los loops; se escribe una sola vez
    running: AtomicBool,
    phase: Mutex<Phase>,
    changed: Condvar,
    hooks: Mutex<Vec<StopHook>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            phase: Mutex::new(Phase::Running),
            changed: Condvar::new(),
            hooks: Mutex::new(Vec::new()),
        })
    }

    /// Registra una acción que corre una sola vez dentro de la transición
    /// RUNNING → STOPPING. Si el stop ya ocurrió, corre en el acto.
    ///
    /// El hook no debe volver a llamar al coordinador (corre con el lock tomado).
    pub fn on_stop<F: FnOnce() + Send + 'static>(&self, hook: F) {
        let phase = self.lock();
        if *phase != Phase::Running {
            drop(phase);
            hook();
            return;
        }
        self.hooks_lock().push(Box::new(hook));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    /// Transición RUNNING → STOPPING.
    ///
    /// Solo la primera llamada tiene efecto y retorna `true`.
    pub fn request_stop(&self) -> bool {
        let mut phase = self.lock();
        if *phase != Phase::Running {
            return false;
        }

        let hooks = std::mem::take(&mut *self.hooks_lock());
        for hook in hooks {
            hook();
        }

        self.running.store(false, Ordering::SeqCst);
        *phase = Phase::Stopping;
        drop(phase);

        self.changed.notify_all();
        true
    }

    /// Bloquea al supervisor hasta que alguien pida el stop
    pub fn wait_for_stop_request(&self) {
        let mut phase = self.lock();
        while *phase == Phase::Running {
            phase = self
                .changed
                .wait(phase)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Transición STOPPING → STOPPED (todos los threads terminaron)
    pub fn mark_stopped(&self) {
        let mut phase = self.lock();
        self.running.store(false, Ordering::SeqCst);
        *phase = Phase::Stopped;
        drop(phase);

        self.changed.notify_all();
    }

    /// Espera a STOPPED con timeout. Retorna `true` si se alcanzó.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut phase = self.lock();

        while *phase != Phase::Stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            phase = self
                .changed
                .wait_timeout(phase, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
        true
    }

    pub fn handle(self: &Arc<Self>) -> ShutdownHandle {
        ShutdownHandle {
            coordinator: Arc::clone(self),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn hooks_lock(&self) -> MutexGuard<'_, Vec<StopHook>> {
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle clonable para pedir la parada desde afuera (señales, tests, etc.)
#[derive(Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<ShutdownCoordinator>,
}

impl ShutdownHandle {
    pub fn request_stop(&self) -> bool {
        self.coordinator.request_stop()
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    pub fn phase(&self) -> Phase {
        self.coordinator.phase()
    }

    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.coordinator.wait_stopped(timeout)
    }
}
