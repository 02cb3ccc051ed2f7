//! # Políticas de Admisión
//! src/queue/policy.rs
//!
//! Define el orden en que la cola entrega conexiones pendientes:
//!
//! - **FIFO**: orden de llegada (`VecDeque`).
//! - **ShortestFirst**: menor `size_hint` primero; a igual tamaño, orden de llegada
//!   (`BinaryHeap` con desempate por número de secuencia).

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::io;
use std::net::TcpStream;
use std::str::FromStr;

use crate::error::ConfigError;

/// Algoritmo de planificación seleccionable por CLI (`-s`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedPolicy {
    /// First-in-first-out
    #[default]
    Fifo,

    /// Menor trabajo primero según `SizeHint`
    ShortestFirst,
}

impl SchedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedPolicy::Fifo => "fifo",
            SchedPolicy::ShortestFirst => "sff",
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    /// Acepta la forma numérica heredada (`1` = FIFO, `0` = SFF) y los nombres.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "fifo" => Ok(SchedPolicy::Fifo),
            "0" | "sff" | "shortest-first" => Ok(SchedPolicy::ShortestFirst),
            other => Err(ConfigError::InvalidPolicy(other.to_string())),
        }
    }
}

/// Estimación del costo de atender un elemento encolado.
///
/// Solo la usa `SchedPolicy::ShortestFirst`. Se evalúa una vez, fuera del lock.
pub trait SizeHint {
    fn size_hint(&self) -> u64 {
        0
    }
}

/// Bytes máximos que se inspeccionan con `peek`
const PEEK_LIMIT: usize = 8192;

impl SizeHint for TcpStream {
    /// Bytes del request que el cliente ya envió (sin consumirlos).
    fn size_hint(&self) -> u64 {
        peek_available(self).unwrap_or(0) as u64
    }
}

fn peek_available(stream: &TcpStream) -> io::Result<usize> {
    let mut buf = [0u8; PEEK_LIMIT];
    stream.set_nonblocking(true)?;
    let peeked = match stream.peek(&mut buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    };
    stream.set_nonblocking(false)?;
    peeked
}

/// Elemento en el heap de ShortestFirst
pub(crate) struct Ranked<T> {
    size: u64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.seq == other.seq
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap es max-heap: invertimos para sacar el menor tamaño,
        // y a igual tamaño la menor secuencia (FIFO)
        other
            .size
            .cmp(&self.size)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Almacenamiento interno de la cola según la política.
///
/// No es thread-safe por sí mismo: siempre vive detrás del lock de `BoundedQueue`.
pub(crate) enum Slots<T> {
    Fifo(VecDeque<T>),
    ShortestFirst { heap: BinaryHeap<Ranked<T>>, next_seq: u64 },
}

impl<T> Slots<T> {
    pub(crate) fn new(policy: SchedPolicy, capacity: usize) -> Self {
        match policy {
            SchedPolicy::Fifo => Slots::Fifo(VecDeque::with_capacity(capacity)),
            SchedPolicy::ShortestFirst => Slots::ShortestFirst {
                heap: BinaryHeap::with_capacity(capacity),
                next_seq: 0,
            },
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Slots::Fifo(items) => items.len(),
            Slots::ShortestFirst { heap, .. } => heap.len(),
        }
    }

    /// `size` se ignora en FIFO
    pub(crate) fn insert(&mut self, item: T, size: u64) {
        match self {
            Slots::Fifo(items) => items.push_back(item),
            Slots::ShortestFirst { heap, next_seq } => {
                heap.push(Ranked { size, seq: *next_seq, item });
                *next_seq += 1;
            }
        }
    }

    pub(crate) fn take_next(&mut self) -> Option<T> {
        match self {
            Slots::Fifo(items) => items.pop_front(),
            Slots::ShortestFirst { heap, .. } => heap.pop().map(|ranked| ranked.item),
        }
    }

    /// Vacía en el mismo orden en que se habrían despachado
    pub(crate) fn drain_ordered(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(item) = self.take_next() {
            out.push(item);
        }
        out
    }
}
