//! # Cola Acotada de Conexiones
//! src/queue/bounded.rs
//!
//! Buffer de capacidad fija entre el acceptor (productor) y los workers
//! (consumidores).
//!
//! ## Protocolo de sincronización
//!
//! ```text
//! push ──► [ lock ] ── while lleno && !cerrado: wait(not_full)  ──► insert ──► notify_one(not_empty)
//! pop  ──► [ lock ] ── while vacío && !cerrado: wait(not_empty) ──► take   ──► notify_one(not_full)
//! close ─► [ lock ] ── cerrado = true ──► notify_all(not_empty) + notify_all(not_full)
//! ```
//!
//! Un único `Mutex` protege los slots *y* la bandera `closed`, y ambas `Condvar`
//! esperan sobre ese mismo mutex. Cada espera re-evalúa su predicado en un loop,
//! así un wake espurio o un broadcast del shutdown nunca se confunde con trabajo.

use serde::Serialize;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::policy::{SchedPolicy, SizeHint, Slots};

/// Estado protegido por el lock
struct QueueState<T> {
    slots: Slots<T>,
    closed: bool,
    pushed: u64,
    popped: u64,
    high_water: usize,
}

/// Cola acotada y bloqueante de conexiones pendientes
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,

    /// "item available": despierta a workers bloqueados en `pop`
    not_empty: Condvar,

    /// "space available": despierta al productor bloqueado en `push`
    not_full: Condvar,

    capacity: usize,
    policy: SchedPolicy,
}

impl<T> BoundedQueue<T> {
    /// Crea una cola con capacidad fija.
    ///
    /// # Panics
    ///
    /// Si `capacity == 0` (la configuración se valida antes de llegar aquí).
    pub fn new(capacity: usize, policy: SchedPolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");

        Self {
            state: Mutex::new(QueueState {
                slots: Slots::new(policy, capacity),
                closed: false,
                pushed: 0,
                popped: 0,
                high_water: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Saca el siguiente elemento según la política.
    ///
    /// Bloquea mientras la cola esté vacía. Retorna `None` ("no work") cuando la
    /// cola fue cerrada: a partir de ese momento no se despacha nada más, aunque
    /// queden elementos (los recoge `drain`).
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return None;
            }

            if let Some(item) = state.slots.take_next() {
                state.popped += 1;
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }

            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|_| sync_failure("wait(not_empty)"));
        }
    }

    /// Saca sin bloquear. `None` si está vacía o cerrada.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }

        let item = state.slots.take_next()?;
        state.popped += 1;
        drop(state);
        self.not_full.notify_one();
        Some(item)
    }

    /// Cierra la cola y despierta a *todos* los que esperan en cualquiera de las
    /// dos condiciones.
    ///
    /// Retorna `true` solo para la llamada que efectivamente la cerró.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let newly_closed = !state.closed;
        state.closed = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        newly_closed
    }

    /// Remueve todo lo que sigue en el buffer, en orden de despacho.
    ///
    /// Lo usa el coordinador de shutdown para cerrar las conexiones que se
    /// encolaron pero nunca llegaron a un worker.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let items = state.slots.drain_ordered();
        drop(state);

        self.not_full.notify_all();
        items
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Snapshot consistente (tomado bajo el lock)
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            len: state.slots.len(),
            capacity: self.capacity,
            policy: self.policy,
            closed: state.closed,
            pushed: state.pushed,
            popped: state.popped,
            high_water_mark: state.high_water,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|_| sync_failure("lock"))
    }
}

impl<T: SizeHint> BoundedQueue<T> {
    /// Encola un elemento.
    ///
    /// Bloquea mientras la cola esté llena (backpressure). Si la cola se cierra
    /// durante la espera, retorna `Err(item)`: el llamador vuelve a ser dueño del
    /// elemento y le toca cerrarlo.
    pub fn push(&self, item: T) -> Result<(), T> {
        let size = self.rank(&item);
        let mut state = self.lock();

        while !state.closed && state.slots.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(|_| sync_failure("wait(not_full)"));
        }

        if state.closed {
            return Err(item);
        }

        Self::insert_locked(&mut state, item, size);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Encola sin bloquear. `Err(item)` si está llena o cerrada.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let size = self.rank(&item);
        let mut state = self.lock();

        if state.closed || state.slots.len() >= self.capacity {
            return Err(item);
        }

        Self::insert_locked(&mut state, item, size);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    // El hint se calcula antes de tomar el lock: puede hacer I/O (peek)
    fn rank(&self, item: &T) -> u64 {
        match self.policy {
            SchedPolicy::Fifo => 0,
            SchedPolicy::ShortestFirst => item.size_hint(),
        }
    }

    fn insert_locked(state: &mut QueueState<T>, item: T, size: u64) {
        state.slots.insert(item, size);
        state.pushed += 1;
        state.high_water = state.high_water.max(state.slots.len());
    }
}

/// Un mutex envenenado significa que otro thread murió a mitad de una sección
/// crítica: el estado de la cola ya no es confiable y no se puede continuar.
fn sync_failure(op: &str) -> ! {
    log::error!("connection queue {} failed: lock poisoned, aborting", op);
    std::process::abort()
}

/// Estadísticas de la cola
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub len: usize,
    pub capacity: usize,
    pub policy: SchedPolicy,
    pub closed: bool,
    pub pushed: u64,
    pub popped: u64,
    pub high_water_mark: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CloseLog, TrackedConn};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const BLOCKED: Duration = Duration::from_millis(150);
    const LIVENESS: Duration = Duration::from_secs(5);

    #[test]
    fn test_new_queue_is_empty() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(3, SchedPolicy::Fifo);

        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert!(!queue.is_closed());
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.policy(), SchedPolicy::Fifo);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _queue: BoundedQueue<u8> = BoundedQueue::new(0, SchedPolicy::Fifo);
    }

    #[test]
    fn test_fifo_order_single_consumer() {
        let log = CloseLog::new();
        let queue = BoundedQueue::new(8, SchedPolicy::Fifo);

        for id in 1..=5 {
            queue.push(log.conn(id)).unwrap();
        }

        let order: Vec<u32> = (0..5).map(|_| queue.pop().unwrap().id).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert_eq!(log.closed(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_shortest_first_uses_size_hint() {
        let log = CloseLog::new();
        let queue = BoundedQueue::new(8, SchedPolicy::ShortestFirst);

        queue.push(log.sized_conn(1, 900)).unwrap();
        queue.push(log.sized_conn(2, 10)).unwrap();
        queue.push(log.sized_conn(3, 10)).unwrap();
        queue.push(log.sized_conn(4, 0)).unwrap();

        let order: Vec<u32> = (0..4).map(|_| queue.pop().unwrap().id).collect();
        assert_eq!(order, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_try_push_full_returns_item() {
        let log = CloseLog::new();
        let queue = BoundedQueue::new(1, SchedPolicy::Fifo);

        assert!(queue.try_push(log.conn(1)).is_ok());
        let rejected = queue.try_push(log.conn(2)).unwrap_err();
        assert_eq!(rejected.id, 2);
        assert!(queue.is_full());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_try_pop_empty() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(2, SchedPolicy::Fifo);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_push_blocks_when_full_until_pop() {
        let log = CloseLog::new();
        let queue = Arc::new(BoundedQueue::new(1, SchedPolicy::Fifo));
        queue.push(log.conn(1)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn({
            let queue = Arc::clone(&queue);
            let conn = log.conn(2);
            move || {
                let result = queue.push(conn).is_ok();
                done_tx.send(result).unwrap();
            }
        });

        // Backpressure: el segundo push no puede completar
        assert!(done_rx.recv_timeout(BLOCKED).is_err());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().unwrap().id, 1);
        assert!(done_rx.recv_timeout(LIVENESS).unwrap());
        producer.join().unwrap();

        assert_eq!(queue.pop().unwrap().id, 2);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let log = CloseLog::new();
        let queue = Arc::new(BoundedQueue::new(2, SchedPolicy::Fifo));

        let (tx, rx) = mpsc::channel();
        let consumer = thread::spawn({
            let queue = Arc::clone(&queue);
            move || {
                let conn = queue.pop();
                tx.send(conn.map(|c: TrackedConn| c.id)).unwrap();
            }
        });

        assert!(rx.recv_timeout(BLOCKED).is_err());
        queue.push(log.conn(7)).unwrap();
        assert_eq!(rx.recv_timeout(LIVENESS).unwrap(), Some(7));
        consumer.join().unwrap();
    }

    #[test]
    fn test_capacity_two_scenario() {
        // A y B entran directo, C espera hasta que sale A
        let log = CloseLog::new();
        let queue = Arc::new(BoundedQueue::new(2, SchedPolicy::Fifo));

        queue.push(log.conn(1)).unwrap();
        queue.push(log.conn(2)).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = thread::spawn({
            let queue = Arc::clone(&queue);
            let c = log.conn(3);
            move || {
                queue.push(c).unwrap();
                tx.send(()).unwrap();
            }
        });
        assert!(rx.recv_timeout(BLOCKED).is_err());

        let a = queue.pop().unwrap();
        rx.recv_timeout(LIVENESS).unwrap();
        producer.join().unwrap();
        assert_eq!(queue.len(), 2);
        drop(a);

        let b = queue.pop().unwrap();
        drop(b);
        let c = queue.pop().unwrap();
        drop(c);

        assert!(queue.is_empty());
        assert_eq!(log.closed(), vec![1, 2, 3]);
        assert_eq!(queue.stats().high_water_mark, 2);
    }

    #[test]
    fn test_close_releases_blocked_poppers() {
        let queue: Arc<BoundedQueue<u8>> = Arc::new(BoundedQueue::new(1, SchedPolicy::Fifo));
        let (tx, rx) = mpsc::channel();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                thread::spawn(move || tx.send(queue.pop().is_none()).unwrap())
            })
            .collect();

        assert!(rx.recv_timeout(BLOCKED).is_err());
        assert!(queue.close());

        for _ in 0..3 {
            assert!(rx.recv_timeout(LIVENESS).unwrap());
        }
        for consumer in consumers {
            consumer.join().unwrap();
        }
    }

    #[test]
    fn test_close_releases_blocked_pusher_with_ownership() {
        let log = CloseLog::new();
        let queue = Arc::new(BoundedQueue::new(1, SchedPolicy::Fifo));
        queue.push(log.conn(1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = thread::spawn({
            let queue = Arc::clone(&queue);
            let conn = log.conn(2);
            move || {
                // El productor recupera la conexión y la cierra él mismo
                let rejected = queue.push(conn).unwrap_err();
                tx.send(rejected.id).unwrap();
            }
        });

        assert!(rx.recv_timeout(BLOCKED).is_err());
        queue.close();
        assert_eq!(rx.recv_timeout(LIVENESS).unwrap(), 2);
        producer.join().unwrap();
        assert_eq!(log.closed(), vec![2]);

        // La conexión que quedó en el buffer se cierra con drain
        drop(queue.drain());
        assert_eq!(log.closed(), vec![2, 1]);
        assert_eq!(log.close_count(1), 1);
    }

    #[test]
    fn test_pop_after_close_returns_none_even_with_items() {
        let log = CloseLog::new();
        let queue = BoundedQueue::new(2, SchedPolicy::Fifo);
        queue.push(log.conn(1)).unwrap();
        queue.close();

        assert!(queue.pop().is_none());
        assert!(queue.try_pop().is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.push(log.conn(2)).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(1, SchedPolicy::Fifo);
        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());
    }

    #[test]
    fn test_capacity_invariant_under_contention() {
        let log = CloseLog::new();
        let queue = Arc::new(BoundedQueue::new(3, SchedPolicy::Fifo));
        let total_per_producer = 200;

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..total_per_producer {
                        queue.push(log.conn(p * 1000 + i)).unwrap();
                        assert!(queue.len() <= 3);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(conn) = queue.pop() {
                        assert!(queue.len() <= 3);
                        seen.push(conn.id);
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        assert!(log.wait_for(4 * total_per_producer as usize, LIVENESS));
        queue.close();

        let mut seen: Vec<u32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();

        assert_eq!(seen.len(), 4 * total_per_producer as usize);
        assert!(queue.stats().high_water_mark <= 3);
        assert!(log.each_closed_once());
    }

    #[test]
    fn test_stats_counts() {
        let log = CloseLog::new();
        let queue = BoundedQueue::new(4, SchedPolicy::ShortestFirst);
        queue.push(log.conn(1)).unwrap();
        queue.push(log.conn(2)).unwrap();
        let _ = queue.pop();

        let stats = queue.stats();
        assert_eq!(stats.len, 1);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.pushed, 2);
        assert_eq!(stats.popped, 1);
        assert_eq!(stats.policy, SchedPolicy::ShortestFirst);
        assert!(!stats.closed);
    }
}
