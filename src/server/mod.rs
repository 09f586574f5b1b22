//! RESP server
//!
//! Accepts TCP connections and hands each one to its own task. Every
//! connection shares the same dispatcher; the server stops accepting once
//! the shutdown token fires.

mod connection;

use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use connection::Connection;

/// Bind `addr` and serve until `shutdown` fires
pub async fn run(addr: &str, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding RESP listener on {}", addr))?;
    serve(listener, dispatcher, shutdown).await
}

/// Serve connections from an already bound listener
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Result<()> {
    info!("RESP server listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("RESP server stopped");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };
        info!("New RESP connection from {}", addr);

        let dispatcher = dispatcher.clone();
        let shutdown = shutdown.child_token();
        tokio::spawn(async move {
            let _ = socket.set_nodelay(true);
            let mut connection = Connection::new(socket);

            if let Err(e) = connection.handle(&dispatcher, &shutdown).await {
                error!("Connection error from {}: {}", addr, e);
            }

            info!("Connection closed: {}", addr);
        });
    }
}
