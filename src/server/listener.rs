//! # Socket de Escucha
//! src/server/listener.rs
//!
//! Abstrae el socket de escucha para que el acceptor no dependa de TCP:
//! los tests lo manejan con conexiones en memoria.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::queue::SizeHint;

/// Timeout del connect que usa `wake`
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Fuente de conexiones nuevas para el acceptor
pub trait Listener: Send + Sync + 'static {
    type Conn: SizeHint + Send + 'static;

    /// Bloquea hasta la próxima conexión
    fn accept(&self) -> io::Result<Self::Conn>;

    /// Desbloquea un `accept` pendiente. Lo llama el supervisor en el shutdown.
    fn wake(&self) -> io::Result<()>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Listener for TcpListener {
    type Conn = TcpStream;

    fn accept(&self) -> io::Result<TcpStream> {
        TcpListener::accept(self).map(|(stream, _)| stream)
    }

    /// Un `close()` desde otro thread no desbloquea `accept` de forma portable;
    /// conectarse a uno mismo sí. El acceptor ve `running == false` y descarta
    /// esa conexión.
    fn wake(&self) -> io::Result<()> {
        let addr = wake_target(TcpListener::local_addr(self)?);
        TcpStream::connect_timeout(&addr, WAKE_CONNECT_TIMEOUT).map(drop)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Si el bind fue a 0.0.0.0 / ::, hay que conectarse por loopback
fn wake_target(mut addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    addr
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wake_target_unspecified() {
        let addr: SocketAddr = "0.0.0.0:4000".parse().unwrap();
        assert_eq!(wake_target(addr), "127.0.0.1:4000".parse().unwrap());

        let addr: SocketAddr = "[::]:4000".parse().unwrap();
        assert_eq!(wake_target(addr), "[::1]:4000".parse().unwrap());
    }

    #[test]
    fn test_wake_target_specific_ip_unchanged() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(wake_target(addr), addr);
    }

    #[test]
    fn test_wake_unblocks_accept() {
        let listener = std::sync::Arc::new(TcpListener::bind("0.0.0.0:0").unwrap());

        let acceptor = thread::spawn({
            let listener = std::sync::Arc::clone(&listener);
            move || Listener::accept(&*listener).is_ok()
        });

        listener.wake().unwrap();
        assert!(acceptor.join().unwrap());
    }
}
