//! TCP transport: length-prefixed request frames in, length-prefixed reply frames out.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use pcisim_device::PciSimulator;
use pcisim_protocol::{LENGTH_PREFIX_BYTES, MAX_FRAME_BYTES};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::handle_frame;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Frames announcing a larger length close the connection.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7420)),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting, drops open connections and waits for the accept loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Binds `cfg.bind_addr` and serves `sim` until the returned handle is shut down or dropped.
///
/// Every connection runs in its own task; they all share the one simulator.
pub async fn start_server(cfg: ServerConfig, sim: Arc<PciSimulator>) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let max_frame_bytes = cfg.max_frame_bytes;

    let task = tokio::spawn(async move {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "connection accepted");
                        let sim = sim.clone();
                        connections.spawn(async move {
                            if let Err(err) = serve_connection(stream, sim, max_frame_bytes).await {
                                tracing::debug!(%peer, error = %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "accept failed"),
                },
            }
        }
        connections.shutdown().await;
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn serve_connection(
    mut stream: TcpStream,
    sim: Arc<PciSimulator>,
    max_frame_bytes: usize,
) -> io::Result<()> {
    loop {
        let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
        match stream.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }

        let len = u32::from_le_bytes(prefix) as usize;
        if len > max_frame_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit of {max_frame_bytes}"),
            ));
        }
        let mut frame = vec![0u8; len];
        stream.read_exact(&mut frame).await?;

        // The simulator lock is a blocking mutex; keep it off the async workers.
        let sim = sim.clone();
        let reply = tokio::task::spawn_blocking(move || handle_frame(&sim, &frame))
            .await
            .map_err(io::Error::other)?;

        stream.write_all(&(reply.len() as u32).to_le_bytes()).await?;
        stream.write_all(&reply).await?;
    }
}
