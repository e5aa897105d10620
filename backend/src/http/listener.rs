//! Listener binding with port fallback.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BindError {
    #[error("no candidate ports configured")]
    NoPorts,
    #[error("Could not start server. All ports {ports:?} on {host} are unavailable")]
    Exhausted { host: String, ports: Vec<u16> },
}

/// Bind the first port of `ports` that is free on `host`.
///
/// Ports are tried in order. A port that fails to bind is logged and
/// skipped.
pub async fn bind_first_available(host: &str, ports: &[u16]) -> Result<(TcpListener, SocketAddr), BindError> {
    if ports.is_empty() {
        return Err(BindError::NoPorts);
    }

    for &port in ports {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let addr = listener
                    .local_addr()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
                info!(%addr, "Bound listener");
                return Ok((listener, addr));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!("Port {} is in use, trying next port...", port);
            }
            Err(e) => {
                warn!(port, error = %e, "Could not bind port, trying next port...");
            }
        }
    }

    Err(BindError::Exhausted {
        host: host.to_string(),
        ports: ports.to_vec(),
    })
}
