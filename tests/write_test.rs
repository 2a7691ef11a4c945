//! Outbound write and body pump tests.
//!
//! Covers:
//! - one write in flight per stream, also across a cancelled write
//! - write errors mirrored into completion
//! - exactly one end-of-stream write, also after a producer failure
//! - multiplexing requirements

use bytes::Bytes;
use futures::stream;
use relaynet::http::{HttpRequest, RequestBody};
use relaynet::transport::scripted::{RecordedWrite, ScriptedTransport};
use relaynet::{ConnectOptions, Connection, NetError};
use std::sync::Arc;
use std::time::Duration;

async fn connect_h2(transport: &Arc<ScriptedTransport>) -> Connection {
    let options = ConnectOptions::new("scripted", 443).http2();
    Connection::connect(transport.clone(), options).await.unwrap()
}

fn fragments(writes: &[RecordedWrite]) -> Vec<(&[u8], bool)> {
    writes
        .iter()
        .map(|w| (w.data.as_ref(), w.end_stream))
        .collect()
}

#[tokio::test]
async fn test_one_write_in_flight() {
    let transport = Arc::new(ScriptedTransport::new().manual_write_acks());
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/upload").manual_write())
        .unwrap();
    let sink = transport.stream_sink(stream.id()).unwrap();

    let first = stream.write("a", false);
    tokio::pin!(first);
    assert!(tokio::time::timeout(Duration::from_millis(20), &mut first)
        .await
        .is_err());

    // The second write waits for credit and never reaches the engine.
    let second = stream.write("b", false);
    tokio::pin!(second);
    assert!(tokio::time::timeout(Duration::from_millis(20), &mut second)
        .await
        .is_err());
    assert_eq!(transport.writes().len(), 1);

    sink.on_write_complete(None);
    assert_eq!(first.await, Ok(()));

    let ack = async {
        transport.wait_for_writes(2).await;
        sink.on_write_complete(None);
    };
    let (second, ()) = tokio::join!(second, ack);
    assert_eq!(second, Ok(()));

    let writes = transport.writes_for(stream.id());
    assert_eq!(fragments(&writes), [(&b"a"[..], false), (&b"b"[..], false)]);
}

#[tokio::test]
async fn test_cancelled_write_holds_credit_until_acked() {
    let transport = Arc::new(ScriptedTransport::new().manual_write_acks());
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/upload").manual_write())
        .unwrap();
    let sink = transport.stream_sink(stream.id()).unwrap();

    // Abandoned after the engine took the fragment.
    let abandoned = tokio::time::timeout(Duration::from_millis(20), stream.write("a", false)).await;
    assert!(abandoned.is_err());
    assert_eq!(transport.writes().len(), 1);

    let second = stream.write("b", true);
    tokio::pin!(second);
    assert!(tokio::time::timeout(Duration::from_millis(20), &mut second)
        .await
        .is_err());
    assert_eq!(transport.writes().len(), 1);

    // The late acknowledgement releases the credit and nothing else.
    sink.on_write_complete(None);
    let ack = async {
        transport.wait_for_writes(2).await;
        sink.on_write_complete(None);
    };
    let (second, ()) = tokio::join!(second, ack);
    assert_eq!(second, Ok(()));

    assert!(!stream.state().is_terminal());
    assert!(
        tokio::time::timeout(Duration::from_millis(20), stream.wait_for_completion())
            .await
            .is_err()
    );
    let writes = transport.writes_for(stream.id());
    assert_eq!(fragments(&writes), [(&b"a"[..], false), (&b"b"[..], true)]);
}

#[tokio::test]
async fn test_write_error_is_completion_error() {
    let transport = Arc::new(ScriptedTransport::new().fail_writes(-361));
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/").manual_write())
        .unwrap();

    assert_eq!(
        stream.write("payload", false).await,
        Err(NetError::Http2FlowControlError)
    );
    assert_eq!(
        stream.wait_for_completion().await,
        Err(NetError::Http2FlowControlError)
    );

    // Later writes short-circuit with the same error.
    assert_eq!(
        stream.write("more", true).await,
        Err(NetError::Http2FlowControlError)
    );
    assert_eq!(transport.writes().len(), 1);
}

#[tokio::test]
async fn test_write_after_completion_does_not_reach_engine() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/").manual_write())
        .unwrap();
    let sink = transport.stream_sink(stream.id()).unwrap();

    std::thread::spawn(move || {
        sink.on_status(413);
        sink.on_headers([("connection", "close")]);
        sink.on_complete(None);
    })
    .join()
    .unwrap();

    assert_eq!(stream.wait_for_completion().await, Ok(413));
    assert_eq!(stream.write("late", false).await, Err(NetError::StreamClosed));
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_write_after_end_stream_is_rejected() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/").manual_write())
        .unwrap();

    stream.write("last", true).await.unwrap();
    assert_eq!(
        stream.write("extra", false).await,
        Err(NetError::WriteAfterEndStream)
    );
}

#[tokio::test]
async fn test_send_body_ends_stream_once() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = connect_h2(&transport).await;
    let stream = connection
        .request(HttpRequest::post("/").manual_write())
        .unwrap();

    let producer = stream::iter(vec![
        Ok::<_, NetError>(Bytes::from_static(b"one")),
        Ok(Bytes::new()),
        Ok(Bytes::from_static(b"two")),
    ]);
    stream.send_body(producer).await.unwrap();

    let writes = transport.writes_for(stream.id());
    assert_eq!(
        fragments(&writes),
        [(&b"one"[..], false), (&b"two"[..], false), (&b""[..], true)]
    );
}

#[tokio::test]
async fn test_producer_failure_still_ends_stream() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = connect_h2(&transport).await;

    let producer = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(NetError::RequestBodyError),
        Ok(Bytes::from_static(b"never sent")),
    ]);
    let stream = connection
        .request(HttpRequest::put("/object").body(RequestBody::stream(producer)))
        .unwrap();

    // The pump's failure becomes the stream's outcome.
    assert_eq!(
        stream.wait_for_completion().await,
        Err(NetError::RequestBodyError)
    );

    let writes = transport.writes_for(stream.id());
    assert_eq!(
        fragments(&writes),
        [(&b"partial"[..], false), (&b""[..], true)]
    );
    assert_eq!(writes.iter().filter(|w| w.end_stream).count(), 1);
}

#[tokio::test]
async fn test_streamed_request_body_is_pumped() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = connect_h2(&transport).await;

    let producer = stream::iter((0..5u8).map(|i| Ok::<_, NetError>(Bytes::from(vec![i; 3]))));
    let stream = connection
        .request(HttpRequest::post("/").body(RequestBody::stream(producer)))
        .unwrap();

    let activation = transport.last_activation().unwrap();
    assert!(activation.request.streaming_body);
    assert!(activation.request.body.is_none());

    let writes = transport.wait_for_writes(6).await;
    assert!(writes.last().unwrap().end_stream);

    // Writing by hand is reserved for manual-write streams.
    assert_eq!(
        stream.write("x", false).await,
        Err(NetError::ManualWriteDisabled)
    );
}

#[tokio::test]
async fn test_streaming_requires_multiplexing() {
    let transport = Arc::new(ScriptedTransport::new());
    let connection = Connection::connect(transport.clone(), ConnectOptions::new("scripted", 80))
        .await
        .unwrap();

    let result = connection.request(HttpRequest::post("/").manual_write());
    assert_eq!(result.unwrap_err(), NetError::MultiplexingRequired);

    let producer = stream::iter(vec![Ok::<_, NetError>(Bytes::from_static(b"x"))]);
    let result = connection.request(HttpRequest::post("/").body(RequestBody::stream(producer)));
    assert_eq!(result.unwrap_err(), NetError::MultiplexingRequired);

    // Buffered bodies are fine on either variant.
    let stream = connection
        .request(HttpRequest::post("/").body("buffered"))
        .unwrap();
    let activation = transport.last_activation().unwrap();
    assert_eq!(activation.stream, stream.id());
    assert_eq!(activation.request.body, Some(Bytes::from_static(b"buffered")));
    assert!(transport.writes().is_empty());
}
