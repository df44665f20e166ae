//! TCP acceptor for log-collection clients.
//!
//! Owns the listening socket for the life of the process. Every accepted
//! connection is handed to a freshly spawned session task; the accept loop
//! never waits on a session's progress.

use crate::config::Config;
use crate::session;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Server instance holding the bound listener.
pub struct Server {
    config: Arc<Config>,
    listener: TcpListener,
}

impl Server {
    /// Bind the listening endpoint. A bind failure is fatal and propagates
    /// to the caller.
    pub async fn bind(config: Config) -> std::io::Result<Server> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Server {
            config: Arc::new(config),
            listener,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is torn down.
    ///
    /// Sessions are unbounded in number; each one runs independently, and a
    /// session error never affects other sessions or the accept loop. A
    /// single failed accept is logged and skipped.
    pub async fn run(self) -> std::io::Result<()> {
        info!(address = %self.local_addr()?, "Listening for log clients");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "Accepting new connection");

                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = session::run(stream, &config).await {
                            warn!(peer = %addr, error = %e, "Session ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
