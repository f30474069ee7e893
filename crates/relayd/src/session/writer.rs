//! Write side of a session.
//!
//! Once a session is logged in, its socket write half moves into a
//! dedicated task that drains the outbound queue. Reading and writing
//! therefore never wait on each other.

use std::time::Duration;

use relay_core::SessionId;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ConnectionError, OutboundQueue};

/// Writes one encoded line and flushes it, bounded by `limit`.
pub(super) async fn write_line<W>(
    writer: &mut W,
    line: &str,
    limit: Duration,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    match timeout(limit, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Drains `outbound` into `writer` until the queue closes or `cancel` fires.
///
/// `cancel` also interrupts a write in progress. A failed or timed-out write
/// cancels the session token so the read side stops too. The write half is
/// shut down on the way out.
pub(super) async fn run<W>(
    session_id: SessionId,
    mut writer: W,
    outbound: OutboundQueue,
    cancel: CancellationToken,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = outbound.next() => match line {
                Some(line) => line,
                None => break,
            },
        };

        // A client that stopped reading must not hold the session open past cancel
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = write_line(&mut writer, &line, write_timeout) => result,
        };

        if let Err(e) = result {
            debug!(session_id = %session_id, error = %e, "Write failed, closing session");
            cancel.cancel();
            break;
        }
    }

    let _ = writer.shutdown().await;
    trace!(session_id = %session_id, "Write loop finished");
}
