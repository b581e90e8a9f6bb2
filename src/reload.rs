//! Live reload over WebSocket.
//!
//! ```text
//! ┌───────────────┐  notify()   ┌──────────────┐  "reload"  ┌─────────┐
//! │ stage / watch │ ──────────▶ │  ReloadHub   │ ─────────▶ │ browser │
//! └───────────────┘             │ (clients[])  │ ◀───────── └─────────┘
//!                               └──────▲───────┘  ws connect
//!                                      │
//!                               accept thread
//! ```
//!
//! The dev server injects [`client_script`] into every HTML response.

use crate::log;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};
use tungstenite::{Message, WebSocket};

const CLIENT_TEMPLATE: &str = include_str!("embed/reload.js");

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Broadcasts reload signals to connected browsers.
///
/// A detached hub has no listener and only counts notifications; production
/// tasks and tests use it.
pub struct ReloadHub {
    clients: Option<Clients>,
    port: Option<u16>,
    notified: AtomicUsize,
}

impl ReloadHub {
    pub fn detached() -> Self {
        Self {
            clients: None,
            port: None,
            notified: AtomicUsize::new(0),
        }
    }

    /// Listen on `interface:port` and accept clients on a background thread.
    pub fn bind(interface: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(interface, port);
        let listener = TcpListener::bind(addr)
            .with_context(|| format!("Failed to bind live reload on {addr}"))?;
        let port = listener.local_addr()?.port();

        let clients: Clients = Arc::default();
        let accepted = Arc::clone(&clients);
        thread::spawn(move || accept_loop(&listener, &accepted));

        log!("reload"; "ws://{}:{}", interface, port);

        Ok(Self {
            clients: Some(clients),
            port: Some(port),
            notified: AtomicUsize::new(0),
        })
    }

    /// Port the hub listens on, `None` when detached.
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Number of reload signals requested so far.
    pub fn notified(&self) -> usize {
        self.notified.load(Ordering::Relaxed)
    }

    /// Ask every connected browser to reload. Dead connections are dropped.
    pub fn notify(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);

        let Some(clients) = &self.clients else {
            return;
        };
        let mut clients = clients.lock();
        clients.retain_mut(|ws| ws.send(Message::text("reload")).is_ok());
    }

    /// Connected client count (0 when detached).
    pub fn client_count(&self) -> usize {
        self.clients.as_ref().map_or(0, |c| c.lock().len())
    }
}

impl std::fmt::Debug for ReloadHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHub")
            .field("port", &self.port)
            .field("clients", &self.client_count())
            .field("notified", &self.notified())
            .finish()
    }
}

fn accept_loop(listener: &TcpListener, clients: &Clients) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log!("reload"; "accept failed: {e}");
                continue;
            }
        };
        match tungstenite::accept(stream) {
            Ok(ws) => clients.lock().push(ws),
            Err(e) => log!("reload"; "handshake failed: {e}"),
        }
    }
}

/// Browser-side script that connects to the hub on `port`.
pub fn client_script(port: u16) -> String {
    CLIENT_TEMPLATE.replace("__RELOAD_PORT__", &port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::Ipv4Addr, time::Duration};

    #[test]
    fn test_detached_counts_notifications() {
        let hub = ReloadHub::detached();
        assert_eq!(hub.port(), None);
        hub.notify();
        hub.notify();
        assert_eq!(hub.notified(), 2);
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn test_client_script_port() {
        let script = client_script(35729);
        assert!(script.contains("35729"));
        assert!(!script.contains("__RELOAD_PORT__"));
        assert!(script.contains("location.reload()"));
    }

    #[test]
    fn test_bound_hub_delivers_reload() {
        let hub = ReloadHub::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        let port = hub.port().unwrap();

        let (mut socket, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).unwrap();

        // Wait for the accept thread to register the client
        for _ in 0..100 {
            if hub.client_count() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(hub.client_count(), 1);

        hub.notify();
        let message = socket.read().unwrap();
        assert_eq!(message.into_text().unwrap().as_str(), "reload");
    }
}
