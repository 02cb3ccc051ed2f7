//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Este módulo implementa la recolección de métricas del servidor:
//! - Conexiones aceptadas, despachadas, rechazadas y drenadas en el shutdown
//! - Resultado de los handlers (ok / fallidos)
//! - Latencias (p50, p95, p99)
//! - Workers ocupados

pub mod collector;

pub use collector::{LatencySummary, MetricsCollector, MetricsSnapshot};
