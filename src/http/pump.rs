//! Outbound body pump.
//!
//! Pulls fragments from a producer and writes them one at a time, waiting
//! for each acknowledgement before pulling the next, so at most one write is
//! ever in flight. The stream is always ended with one empty `end_stream`
//! write, including after a producer failure.

use crate::base::neterror::NetError;
use crate::http::stream::StreamWriter;
use bytes::Bytes;
use futures::{pin_mut, StreamExt};

pub(crate) async fn drive<S, E>(writer: &StreamWriter, producer: S) -> Result<(), NetError>
where
    S: futures::Stream<Item = Result<Bytes, E>>,
    E: Into<NetError>,
{
    pin_mut!(producer);

    let mut write_error = None;
    let mut producer_error = None;
    let mut fragments = 0usize;

    while let Some(item) = producer.next().await {
        match item {
            Ok(fragment) if fragment.is_empty() => continue,
            Ok(fragment) => {
                if let Err(e) = writer.submit(fragment, false).await {
                    write_error = Some(e);
                    break;
                }
                fragments += 1;
            }
            Err(e) => {
                let e = e.into();
                tracing::debug!(error = %e, "body producer failed");
                producer_error = Some(e);
                break;
            }
        }
    }

    let finished = match writer.submit(Bytes::new(), true).await {
        // The peer answered before the body ended; nothing left to flush.
        Err(NetError::StreamClosed) if writer.completed_cleanly() => Ok(()),
        other => other,
    };
    tracing::trace!(fragments, "body pump finished");

    if let Some(e) = write_error {
        return Err(e);
    }
    if let Some(e) = producer_error {
        return Err(e);
    }
    finished
}
