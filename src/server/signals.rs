//! # Señales
//! src/server/signals.rs
//!
//! SIGINT/SIGTERM se reciben en un thread normal (`signal_hook::iterator`), no
//! dentro de un handler asíncrono. Ese thread solo llama a `request_stop()`;
//! el supervisor hace el resto desde `Server::run`.
//!
//! Una segunda señal mientras el shutdown está en curso termina el proceso
//! con estado 1.

use log::{error, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::thread;

use super::shutdown::ShutdownHandle;
use crate::error::ServerError;

/// Estado de salida cuando llega una segunda señal
pub const FORCED_EXIT_CODE: i32 = 1;

/// Qué hacer con una señal recibida
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Primera señal: shutdown ordenado
    Stop,
    /// El shutdown ya estaba pedido
    ForceExit,
}

/// Registra SIGINT/SIGTERM y lanza el thread `signals`.
///
/// El `Handle` retornado permite cerrar el iterador cuando el servidor ya
/// terminó, para que el thread no quede colgado.
pub fn install(shutdown: ShutdownHandle) -> Result<Handle, ServerError> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(ServerError::Signal)?;
    let handle = signals.handle();

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match dispatch(&shutdown) {
                    SignalAction::Stop => {
                        warn!("🛑 received {}, shutting down", signal_name(signal));
                    }
                    SignalAction::ForceExit => {
                        error!("received {} again, forcing exit", signal_name(signal));
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            }
        })
        .map_err(|source| ServerError::Spawn {
            what: "signal thread".to_string(),
            source,
        })?;

    Ok(handle)
}

/// Aplica una señal sobre el coordinador
pub fn dispatch(shutdown: &ShutdownHandle) -> SignalAction {
    if shutdown.request_stop() {
        SignalAction::Stop
    } else {
        SignalAction::ForceExit
    }
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        _ => "signal",
    }
}
