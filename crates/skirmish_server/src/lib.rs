//! # Skirmish Dedicated Server
//!
//! Hosts one match over TCP without rendering.
//!
//! A single authority task owns the [`Simulation`](skirmish_core::simulation::Simulation)
//! and ticks it at a fixed rate. Each client connection runs on its own
//! task, speaking the JSON-lines protocol in [`protocol`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod protocol;

use std::future::Future;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use host::{Host, HostHandle};

/// Accept clients on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub async fn serve<F>(listener: TcpListener, config: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let (host, handle) = Host::new(config)?;
    let (stop_host, host_stopped) = oneshot::channel::<()>();
    let host_task = tokio::spawn(host.run(async move {
        host_stopped.await.ok();
    }));

    tracing::info!(addr = ?listener.local_addr().ok(), "Accepting connections");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                tracing::debug!(%peer, "Connection accepted");
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = connection::handle_connection(stream, handle).await {
                        tracing::warn!(%peer, error = %e, "Connection closed with error");
                    }
                });
            }
        }
    }

    tracing::info!("Shutting down");
    stop_host.send(()).ok();
    if let Err(e) = host_task.await {
        tracing::error!(error = %e, "Match host task failed");
    }
    Ok(())
}

/// Bind the configured address and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the configuration
/// is invalid.
pub async fn run(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let listener = TcpListener::bind(&config.bind_addr).await?;
    serve(listener, &config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await
}
