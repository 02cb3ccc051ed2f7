//! # Soporte para Tests
//! src/test_support.rs
//!
//! Utilidades compartidas por los tests unitarios.
//!
//! `TrackedConn` simula un handle de conexión: su `Drop` registra el cierre en un
//! `CloseLog`, así los tests pueden verificar "cerrado exactamente una vez".

use crate::queue::SizeHint;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Registro de cierres (en orden)
#[derive(Debug)]
pub struct CloseLog {
    closed: Mutex<Vec<u32>>,
    changed: Condvar,
}

impl CloseLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            closed: Mutex::new(Vec::new()),
            changed: Condvar::new(),
        })
    }

    pub fn conn(self: &Arc<Self>, id: u32) -> TrackedConn {
        self.sized_conn(id, 0)
    }

    pub fn sized_conn(self: &Arc<Self>, id: u32, size: u64) -> TrackedConn {
        TrackedConn {
            id,
            size,
            log: Arc::clone(self),
        }
    }

    pub fn closed(&self) -> Vec<u32> {
        self.closed.lock().unwrap().clone()
    }

    pub fn close_count(&self, id: u32) -> usize {
        self.closed.lock().unwrap().iter().filter(|&&c| c == id).count()
    }

    pub fn each_closed_once(&self) -> bool {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for id in self.closed.lock().unwrap().iter() {
            *counts.entry(*id).or_insert(0) += 1;
        }
        counts.values().all(|&n| n == 1)
    }

    /// Espera hasta que haya al menos `n` cierres
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut closed = self.closed.lock().unwrap();
        while closed.len() < n {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            closed = self.changed.wait_timeout(closed, deadline - now).unwrap().0;
        }
        true
    }

    fn record(&self, id: u32) {
        self.closed.lock().unwrap().push(id);
        self.changed.notify_all();
    }
}

/// Handle de conexión falso
#[derive(Debug)]
pub struct TrackedConn {
    pub id: u32,
    size: u64,
    log: Arc<CloseLog>,
}

impl SizeHint for TrackedConn {
    fn size_hint(&self) -> u64 {
        self.size
    }
}

impl Drop for TrackedConn {
    fn drop(&mut self) {
        self.log.record(self.id);
    }
}
