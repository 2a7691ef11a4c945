//! Request body fed by `NativeTransport::write`.

use crate::relay::StreamSink;
use bytes::Bytes;
use http_body::{Body, Frame};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;

/// One fragment submitted through `write`.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub(crate) data: Bytes,
    pub(crate) end_stream: bool,
}

/// Streaming body whose frames are the stream's writes, in order.
///
/// A write is acknowledged as soon as hyper pulls it, which happens only
/// when the connection has room for it. That is the flow control the
/// adapter sees.
pub(crate) struct WriteChannelBody {
    rx: UnboundedReceiver<PendingWrite>,
    events: StreamSink,
    done: bool,
}

impl WriteChannelBody {
    pub(crate) fn new(rx: UnboundedReceiver<PendingWrite>, events: StreamSink) -> Self {
        Self {
            rx,
            events,
            done: false,
        }
    }
}

impl Body for WriteChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }
            match ready!(self.rx.poll_recv(cx)) {
                Some(write) => {
                    self.done = write.end_stream;
                    self.events.on_write_complete(None);
                    if !write.data.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(write.data))));
                    }
                }
                None => {
                    self.done = true;
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "body writer went away before end of stream",
                    ))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayEvent, StreamEvent};
    use crate::transport::StreamId;
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;

    fn body() -> (
        mpsc::UnboundedSender<PendingWrite>,
        mpsc::UnboundedReceiver<RelayEvent>,
        WriteChannelBody,
    ) {
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let events = StreamSink::new(StreamId::next(), relay_tx);
        (tx, relay_rx, WriteChannelBody::new(rx, events))
    }

    fn is_ack(event: RelayEvent) -> bool {
        matches!(
            event,
            RelayEvent::Stream(_, StreamEvent::WriteComplete(None))
        )
    }

    #[tokio::test]
    async fn test_writes_become_frames_and_acks() {
        let (tx, mut relay_rx, mut body) = body();
        tx.send(PendingWrite {
            data: Bytes::from_static(b"part"),
            end_stream: false,
        })
        .unwrap();
        tx.send(PendingWrite {
            data: Bytes::new(),
            end_stream: true,
        })
        .unwrap();

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"part"));
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());

        assert!(is_ack(relay_rx.recv().await.unwrap()));
        assert!(is_ack(relay_rx.recv().await.unwrap()));
    }

    #[tokio::test]
    async fn test_dropped_writer_is_an_error() {
        let (tx, _relay_rx, mut body) = body();
        drop(tx);
        let err = body.frame().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
