//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Lo mínimo de HTTP/1.0 que necesita el handler por defecto:
//!
//! - Parsing de la request line y headers
//! - Construcción de responses
//! - Status codes
//!
//! No hay keep-alive: una conexión, un request, una respuesta.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request, Version};
pub use response::Response;
pub use status::StatusCode;
