//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta métricas del pipeline acceptor → cola → workers en tiempo real.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Conexiones aceptadas por el acceptor
    accepted: u64,

    /// Conexiones que el acceptor tuvo que cerrar porque la cola ya estaba cerrada
    rejected: u64,

    /// Conexiones entregadas a un worker
    dispatched: u64,

    /// Handlers que terminaron bien
    handled_ok: u64,

    /// Handlers que fallaron (error o panic)
    handled_failed: u64,

    /// Conexiones encoladas que se cerraron en el shutdown sin despacharse
    drained: u64,

    /// Workers atendiendo una conexión en este momento
    active_workers: u64,

    /// Latencias del handler (en microsegundos), ventana móvil
    latencies: VecDeque<u64>,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                latencies: VecDeque::with_capacity(MAX_LATENCIES),
                ..MetricsData::default()
            })),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.data().accepted += 1;
    }

    pub fn record_rejected(&self) {
        self.data().rejected += 1;
    }

    pub fn record_drained(&self, count: usize) {
        self.data().drained += count as u64;
    }

    /// Un worker tomó una conexión de la cola
    pub fn record_dispatch(&self) {
        let mut data = self.data();
        data.dispatched += 1;
        data.active_workers += 1;
    }

    /// El handler terminó (bien o mal) y la conexión se cerró
    pub fn record_handled(&self, success: bool, latency: Duration) {
        let mut data = self.data();

        if success {
            data.handled_ok += 1;
        } else {
            data.handled_failed += 1;
        }

        if data.active_workers > 0 {
            data.active_workers -= 1;
        }

        // Si tenemos demasiadas latencias, eliminar las más antiguas
        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);
    }

    /// Obtiene el número de workers ocupados
    pub fn active_workers(&self) -> u64 {
        self.data().active_workers
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();
        let (p50, p95, p99, avg) = calculate_percentiles(&data.latencies);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: data.accepted,
            rejected: data.rejected,
            dispatched: data.dispatched,
            handled_ok: data.handled_ok,
            handled_failed: data.handled_failed,
            drained: data.drained,
            active_workers: data.active_workers,
            latency_us: LatencySummary {
                p50,
                p95,
                p99,
                avg,
                samples: data.latencies.len(),
            },
        }
    }

    /// Obtiene las métricas actuales en formato JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    fn data(&self) -> MutexGuard<'_, MetricsData> {
        // Las métricas no protegen invariantes: un panic a mitad de un update
        // deja, a lo sumo, un contador corrido
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calcula percentiles de latencia
fn calculate_percentiles(latencies: &VecDeque<u64>) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];

    let sum: u64 = sorted.iter().sum();
    let avg = sum / len as u64;

    (p50, p95, p99, avg)
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub handled_ok: u64,
    pub handled_failed: u64,
    pub drained: u64,
    pub active_workers: u64,
    pub latency_us: LatencySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub samples: usize,
}
