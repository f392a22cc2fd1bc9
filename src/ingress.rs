//! Ingress transport. Collectors themselves are out of scope; this is the
//! wire format this binary listens on so a collector has somewhere to
//! connect: a Unix domain socket carrying a stream of big-endian
//! u32-length-prefixed framed envelopes, fed into the bounded ingress
//! channel the pipeline consumes.

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(socket_path: &str, sender: mpsc::Sender<Vec<u8>>) -> anyhow::Result<()> {
    // A stale socket file from a previous run would otherwise make bind fail.
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)
        .map_err(|e| anyhow::anyhow!("failed to bind ingress socket '{}': {}", socket_path, e))?;
    info!(socket_path, "ingress listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let tx = sender.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, tx).await {
                warn!(error = %e, "ingress connection ended");
            }
        });
    }
}

async fn handle_connection(mut stream: UnixStream, sender: mpsc::Sender<Vec<u8>>) -> anyhow::Result<()> {
    loop {
        let mut len_buf = [0u8; 4];
        if let Err(e) = stream.read_exact(&mut len_buf).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(());
            }
            return Err(e.into());
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut frame = vec![0u8; len];
        stream.read_exact(&mut frame).await?;

        // A full ingress queue blocks this read loop, which blocks the
        // collector's writes — backpressure extends all the way to the
        // transport.
        if sender.send(frame).await.is_err() {
            return Ok(());
        }
    }
}
