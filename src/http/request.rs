//! # Parsing de Requests HTTP/1.0
//! src/http/request.rs
//!
//! Parser mínimo: request line y headers. El body se ignora y el query string
//! se descarta del path (ninguna ruta lo usa).
//!
//! ```text
//! GET /status HTTP/1.0\r\n
//! Host: localhost:10000\r\n
//! \r\n
//! ```

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    /// Como GET pero la respuesta va sin body
    HEAD,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
        }
    }
}

/// Versiones aceptadas. 1.1 se atiende igual que 1.0 (sin keep-alive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Http10 => f.write_str("HTTP/1.0"),
            Version::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty request")]
    EmptyRequest,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Request parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    version: Version,
    /// Nombres en minúscula
    headers: HashMap<String, String>,
}

impl Request {
    /// Parsea el request desde los bytes leídos del socket
    ///
    /// ```
    /// use concurrent_server::http::{Method, Request};
    ///
    /// let request = Request::parse(b"HEAD /status?x=1 HTTP/1.0\r\nHost: a\r\n\r\n").unwrap();
    /// assert_eq!(request.method(), Method::HEAD);
    /// assert_eq!(request.path(), "/status");
    /// assert_eq!(request.header("host"), Some("a"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(buffer).map_err(|_| ParseError::InvalidRequestLine)?;
        if text.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        // Solo interesa lo anterior a la línea vacía
        let head = text.split("\r\n\r\n").next().unwrap_or(text);
        let mut lines = head.split("\r\n");

        let request_line = lines.next().ok_or(ParseError::EmptyRequest)?;
        let (method, path, version) = parse_request_line(request_line)?;

        let mut headers = HashMap::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Request {
            method,
            path,
            version,
            headers,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Búsqueda sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

/// `METHOD TARGET VERSION`, separados por espacios
fn parse_request_line(line: &str) -> Result<(Method, String, Version), ParseError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    let method = match method {
        "GET" => Method::GET,
        "HEAD" => Method::HEAD,
        other => return Err(ParseError::UnsupportedMethod(other.to_string())),
    };

    let version = match version {
        "HTTP/1.0" => Version::Http10,
        "HTTP/1.1" => Version::Http11,
        other => return Err(ParseError::InvalidHttpVersion(other.to_string())),
    };

    if !target.starts_with('/') {
        return Err(ParseError::InvalidRequestLine);
    }
    let path = target.split('?').next().unwrap_or(target).to_string();

    Ok((method, path, version))
}
