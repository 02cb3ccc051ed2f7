//! # Handlers de Conexión
//! src/handler/mod.rs
//!
//! El colaborador externo que atiende una conexión ya despachada. El worker lo
//! invoca una vez por conexión y cierra el handle al volver, sin importar el
//! resultado.
//!
//! - `http`: handler HTTP/1.0 mínimo que usa el binario

pub mod http;

pub use self::http::HttpHandler;

use crate::error::HandlerError;

/// Atiende una unidad de trabajo dado su handle.
///
/// Varios workers lo llaman en paralelo, por eso `Sync`: la implementación no
/// debe guardar estado por conexión entre llamadas.
pub trait ConnectionHandler<C>: Send + Sync + 'static {
    fn handle(&self, conn: &mut C) -> Result<(), HandlerError>;
}

impl<C, F> ConnectionHandler<C> for F
where
    F: Fn(&mut C) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, conn: &mut C) -> Result<(), HandlerError> {
        self(conn)
    }
}
