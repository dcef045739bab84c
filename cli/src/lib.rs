//! Client side of the upcase channel
//!
//! Opens a session, writes, reads back. `echo_once` is the single-shot
//! client; `echo_stream` keeps one task writing while another reads from
//! the same session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use upcase::{BlockingMode, Device, ReadError};

/// Write `text` once and read the same number of bytes back
///
/// # Errors
/// Any allocation, write or read failure from the channel.
pub async fn echo_once(
    device: &Device,
    mode: BlockingMode,
    text: &[u8],
) -> Result<Vec<u8>, upcase::Error> {
    let mut session = device.open(mode)?;

    let written = session.write(text)?;
    let out = session.read(written).await?;

    session.close();
    Ok(out)
}

/// Write `text` over and over while reading `count` chunks back
///
/// Every chunk read is handed to `on_read`. In non-blocking mode an empty
/// read is retried. Returns the total number of bytes read.
///
/// # Errors
/// Any allocation, write or read failure other than `WouldBlock`.
pub async fn echo_stream<F>(
    device: &Device,
    mode: BlockingMode,
    text: &[u8],
    count: usize,
    mut on_read: F,
) -> Result<usize, upcase::Error>
where
    F: FnMut(&[u8]),
{
    let session = Arc::new(device.open(mode)?);
    // Fail early on oversized input instead of inside the writer task
    session.write(text)?;

    let stop = Arc::new(AtomicBool::new(false));
    let writer = tokio::spawn({
        let session = Arc::clone(&session);
        let stop = Arc::clone(&stop);
        let text = text.to_vec();
        async move {
            let mut writes = 0usize;
            while !stop.load(Ordering::Relaxed) {
                if let Err(e) = session.write(&text) {
                    warn!("stream writer stopped: {e}");
                    break;
                }
                writes += 1;
                tokio::task::yield_now().await;
            }
            writes
        }
    });

    let mut total = 0;
    let mut reads = 0;
    let result = loop {
        if reads == count {
            break Ok(total);
        }
        match session.read(text.len()).await {
            Ok(chunk) => {
                on_read(&chunk);
                total += chunk.len();
                reads += 1;
            }
            Err(ReadError::WouldBlock) => tokio::task::yield_now().await,
            Err(e) => break Err(e.into()),
        }
    };

    stop.store(true, Ordering::Relaxed);
    match writer.await {
        Ok(writes) => debug!(writes, reads, total, "stream finished"),
        Err(e) => warn!("stream writer task failed: {e}"),
    }
    result
}
