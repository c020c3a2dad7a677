//! Virtual coordinator actor task
//!
//! Owns a [`VirtualCoordinator`] and serves it over an async stream. The
//! task uses a select! loop to:
//! - Read ZNP requests from the stream and write back the responses
//! - Handle shutdown commands from a channel

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::VirtualCoordinator;

/// Commands that can be sent to a virtual coordinator actor
#[derive(Debug, Clone)]
pub enum VirtualCoordinatorCommand {
    /// Shutdown the virtual coordinator actor
    Shutdown,
}

/// Run the virtual coordinator actor task
///
/// Returns the coordinator when the stream closes or shutdown is requested,
/// so callers can inspect the requests it saw.
pub async fn run_virtual_coordinator_task<S>(
    mut stream: S,
    mut coordinator: VirtualCoordinator,
    mut cmd_rx: mpsc::Receiver<VirtualCoordinatorCommand>,
) -> io::Result<VirtualCoordinator>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];

    info!("Starting virtual coordinator task for {}", coordinator.id());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual coordinator stream closed for {}", coordinator.id());
                        break;
                    }
                    Ok(n) => {
                        let data = &buf[..n];
                        debug!(
                            "Virtual coordinator {} received {} bytes: {:02X?}",
                            coordinator.id(), n, data
                        );

                        coordinator.process_bytes(data);
                        while let Some(output) = coordinator.take_output() {
                            debug!("Virtual coordinator {} sending {:02X?}", coordinator.id(), output);
                            stream.write_all(&output).await?;
                        }
                        stream.flush().await?;
                    }
                    Err(e) => {
                        warn!("Virtual coordinator {} stream error: {}", coordinator.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualCoordinatorCommand::Shutdown) => {
                        info!("Shutdown requested for virtual coordinator {}", coordinator.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual coordinator {}", coordinator.id());
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual coordinator task ended for {}", coordinator.id());
    Ok(coordinator)
}
