//! # Handler HTTP/1.0
//! src/handler/http.rs
//!
//! Handler por defecto del binario. Lee un request, responde y retorna; el worker
//! se encarga de cerrar el socket.
//!
//! ## Rutas
//!
//! - `GET /`        → saludo JSON
//! - `GET /status`  → estadísticas de la cola y métricas del servidor
//! - cualquier otra → 404

use log::debug;
use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::ConnectionHandler;
use crate::error::HandlerError;
use crate::http::{Method, Request, Response, StatusCode};
use crate::metrics::MetricsCollector;
use crate::queue::BoundedQueue;

/// Tamaño máximo del request que se lee
const MAX_REQUEST_BYTES: usize = 8192;

const SERVER_NAME: &str = "concurrent_server/0.1";

/// Límite de cada read/write sobre el socket. Un cliente que conecta y no
/// manda nada libera al worker al vencer, también durante el shutdown.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpHandler {
    queue: Arc<BoundedQueue<TcpStream>>,
    metrics: MetricsCollector,
    io_timeout: Duration,
}

impl HttpHandler {
    pub fn new(queue: Arc<BoundedQueue<TcpStream>>, metrics: MetricsCollector) -> Self {
        Self {
            queue,
            metrics,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Cambia el timeout de I/O (debe ser mayor que cero)
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Atiende un request sobre cualquier stream (los tests usan sockets reales)
    pub fn serve<S: Read + Write>(&self, stream: &mut S) -> Result<(), HandlerError> {
        let raw = read_request(stream)?;
        if raw.is_empty() {
            debug!("peer closed before sending a request");
            return Ok(());
        }

        let (response, outcome) = match Request::parse(&raw) {
            Ok(request) => {
                debug!(
                    "{} {} {}",
                    request.method().as_str(),
                    request.path(),
                    request.version()
                );
                let response = self.route(&request);
                let response = match request.method() {
                    Method::HEAD => response.without_body(),
                    Method::GET => response,
                };
                (response, Ok(()))
            }
            Err(e) => (
                Response::error(StatusCode::BadRequest, &format!("Invalid: {}", e)),
                Err(HandlerError::Parse(e.to_string())),
            ),
        };

        let mut response = response;
        response.add_header("Server", SERVER_NAME);
        response.add_header("Connection", "close");
        response.add_header(
            "X-Worker-Thread",
            thread::current().name().unwrap_or("unnamed"),
        );

        stream.write_all(&response.to_bytes())?;
        stream.flush()?;

        outcome
    }

    fn route(&self, request: &Request) -> Response {
        match request.path() {
            "/" => Response::json(
                &json!({ "server": SERVER_NAME, "status": "running" }).to_string(),
            ),
            "/status" => self.status_response(),
            path => Response::error(StatusCode::NotFound, &format!("Route not found: {}", path)),
        }
    }

    fn status_response(&self) -> Response {
        let body = json!({
            "queue": self.queue.stats(),
            "metrics": self.metrics.snapshot(),
        });

        match serde_json::to_string_pretty(&body) {
            Ok(text) => Response::json(&text),
            Err(e) => Response::error(StatusCode::InternalServerError, &e.to_string()),
        }
    }
}

impl ConnectionHandler<TcpStream> for HttpHandler {
    fn handle(&self, conn: &mut TcpStream) -> Result<(), HandlerError> {
        conn.set_read_timeout(Some(self.io_timeout))?;
        conn.set_write_timeout(Some(self.io_timeout))?;
        self.serve(conn)
    }
}

/// Lee hasta el fin de los headers, EOF o `MAX_REQUEST_BYTES`
fn read_request<S: Read>(stream: &mut S) -> Result<Vec<u8>, HandlerError> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let mut filled = 0;

    while filled < MAX_REQUEST_BYTES {
        let n = stream.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;

        if buffer[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    buffer.truncate(filled);
    Ok(buffer)
}
