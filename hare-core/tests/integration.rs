//! Integration tests: exchange lifecycle, publishing and confirms against a
//! scripted broker over a real TCP connection on localhost.

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use hare_core::codec::frame::{FramePayload, MethodFrame};
use hare_core::method::{basic, class, confirm, exchange};
use hare_core::network::{self, Pumps};
use hare_core::{
    Exchange, ExchangeEvent, ExchangeKind, ExchangeOptions, ExchangeState, FieldTable, Frame,
    FrameCodec, FrameSender, OutgoingMessage, ReplyCode,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;

const FRAME_MAX: u32 = 4096;
const CHANNEL: u16 = 1;

type Broker = Framed<TcpStream, FrameCodec>;

// ── Helpers ──────────────────────────────────────────────────────

/// `RUST_LOG=hare_core=trace cargo test` shows the exchange's logs.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connect an exchange to a scripted broker on an ephemeral port.
async fn connect(name: &str) -> (Arc<Exchange>, FrameSender, Pumps, Broker) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
    let (server, _) = listener.accept().await.unwrap();
    let client = client.await.unwrap();

    let (sender, rx) = FrameSender::channel(FRAME_MAX);
    let exchange = Arc::new(Exchange::new(name, CHANNEL, Arc::new(sender.clone())).unwrap());
    let pumps = network::attach(client, rx, exchange.clone(), FRAME_MAX);
    let broker = Framed::new(server, FrameCodec::new(FRAME_MAX));
    (exchange, sender, pumps, broker)
}

async fn next_frame(broker: &mut Broker) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), broker.next())
        .await
        .expect("timeout")
        .expect("stream closed")
        .expect("decode error")
}

async fn expect_method(broker: &mut Broker, class_id: u16, method_id: u16) -> MethodFrame {
    let frame = next_frame(broker).await;
    let method = frame.as_method().cloned().expect("method frame");
    assert_eq!((method.class_id, method.method_id), (class_id, method_id));
    method
}

async fn reply(broker: &mut Broker, class_id: u16, method_id: u16, args: BytesMut) {
    let method = MethodFrame::new(class_id, method_id, args.freeze());
    broker.send(Frame::method(CHANNEL, method)).await.unwrap();
}

fn ack_args(tag: u64, multiple: bool) -> BytesMut {
    let mut args = BytesMut::new();
    args.put_u64(tag);
    args.put_u8(u8::from(multiple));
    args
}

async fn next_event(events: &mut broadcast::Receiver<ExchangeEvent>) -> ExchangeEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timeout")
        .expect("event channel closed")
}

/// Drain the publish method, header and body frames of one message.
async fn expect_publish(broker: &mut Broker, body_len: usize) {
    expect_method(broker, class::BASIC, basic::PUBLISH).await;
    let header = next_frame(broker).await;
    assert!(matches!(header.payload, FramePayload::Header(ref h) if h.body_size == body_len as u64));
    let mut received = 0;
    while received < body_len {
        match next_frame(broker).await.payload {
            FramePayload::Body(chunk) => received += chunk.len(),
            other => panic!("expected body frame, got {other:?}"),
        }
    }
    assert_eq!(received, body_len);
}

async fn declare_over_wire(ex: &Exchange, broker: &mut Broker) {
    let mut events = ex.subscribe();
    ex.channel_opened().unwrap();
    ex.declare(ExchangeKind::Topic, ExchangeOptions::DURABLE, FieldTable::new())
        .unwrap();
    expect_method(broker, class::EXCHANGE, exchange::DECLARE).await;
    reply(broker, class::EXCHANGE, exchange::DECLARE_OK, BytesMut::new()).await;
    assert_eq!(next_event(&mut events).await, ExchangeEvent::Declared);
    assert!(ex.is_declared());
}

// ── Scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_with_confirms() {
    let (ex, _sender, _pumps, mut broker) = connect("logs").await;
    declare_over_wire(&ex, &mut broker).await;
    let mut events = ex.subscribe();

    // no confirms yet: nothing tracked
    ex.publish_text("hello", "app.info").unwrap();
    expect_publish(&mut broker, 5).await;
    assert!(ex.unconfirmed().is_empty());

    ex.enable_confirms(false).unwrap();
    expect_method(&mut broker, class::CONFIRM, confirm::SELECT).await;
    reply(&mut broker, class::CONFIRM, confirm::SELECT_OK, BytesMut::new()).await;
    assert_eq!(next_event(&mut events).await, ExchangeEvent::ConfirmsEnabled);

    ex.publish_text("a", "app.info").unwrap();
    ex.publish_text("b", "app.info").unwrap();
    assert_eq!(ex.unconfirmed(), vec![1, 2]);
    expect_publish(&mut broker, 1).await;
    expect_publish(&mut broker, 1).await;

    reply(&mut broker, class::BASIC, basic::ACK, ack_args(1, false)).await;
    reply(&mut broker, class::BASIC, basic::ACK, ack_args(2, true)).await;
    assert_eq!(next_event(&mut events).await, ExchangeEvent::AllMessagesDelivered);
    assert!(ex.unconfirmed().is_empty());
}

#[tokio::test]
async fn test_large_body_is_chunked() {
    let (ex, _sender, _pumps, mut broker) = connect("blobs").await;
    declare_over_wire(&ex, &mut broker).await;

    let chunk = (FRAME_MAX - 7) as usize;
    ex.publish("k", OutgoingMessage::new(vec![7u8; 2 * chunk + 1]))
        .unwrap();

    expect_method(&mut broker, class::BASIC, basic::PUBLISH).await;
    next_frame(&mut broker).await;
    let mut sizes = Vec::new();
    for _ in 0..3 {
        match next_frame(&mut broker).await.payload {
            FramePayload::Body(b) => sizes.push(b.len()),
            other => panic!("expected body frame, got {other:?}"),
        }
    }
    assert_eq!(sizes, vec![chunk, chunk, 1]);
}

#[tokio::test]
async fn test_wait_for_confirms_wakes_on_ack() {
    let (ex, _sender, _pumps, mut broker) = connect("logs").await;
    declare_over_wire(&ex, &mut broker).await;
    ex.enable_confirms(true).unwrap();
    expect_method(&mut broker, class::CONFIRM, confirm::SELECT).await;

    ex.publish_text("x", "k").unwrap();
    expect_publish(&mut broker, 1).await;

    let waiter = tokio::spawn({
        let ex = ex.clone();
        async move { ex.wait_for_confirms(Duration::from_secs(5)).await }
    });
    reply(&mut broker, class::BASIC, basic::ACK, ack_args(1, false)).await;
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn test_wait_for_confirms_times_out() {
    let (ex, _sender, _pumps, mut broker) = connect("logs").await;
    declare_over_wire(&ex, &mut broker).await;
    ex.enable_confirms(true).unwrap();
    ex.publish_text("x", "k").unwrap();

    assert!(!ex.wait_for_confirms(Duration::from_millis(50)).await);
    assert_eq!(ex.unconfirmed(), vec![1]);
}

#[tokio::test]
async fn test_delayed_declare_sent_after_declare_ok() {
    let (ex, _sender, _pumps, mut broker) = connect("logs").await;
    ex.channel_opened().unwrap();
    for _ in 0..3 {
        ex.declare(ExchangeKind::Fanout, ExchangeOptions::empty(), FieldTable::new())
            .unwrap();
    }
    expect_method(&mut broker, class::EXCHANGE, exchange::DECLARE).await;
    reply(&mut broker, class::EXCHANGE, exchange::DECLARE_OK, BytesMut::new()).await;

    // exactly one follow-up declare
    expect_method(&mut broker, class::EXCHANGE, exchange::DECLARE).await;
    reply(&mut broker, class::EXCHANGE, exchange::DECLARE_OK, BytesMut::new()).await;

    ex.enable_confirms(true).unwrap();
    expect_method(&mut broker, class::CONFIRM, confirm::SELECT).await;
    assert!(ex.is_declared());
}

#[tokio::test]
async fn test_returned_message_records_error() {
    let (ex, _sender, _pumps, mut broker) = connect("logs").await;
    declare_over_wire(&ex, &mut broker).await;
    let mut events = ex.subscribe();

    let mut args = BytesMut::new();
    args.put_u16(312);
    hare_core::codec::field::put_short_str(&mut args, "NO_ROUTE").unwrap();
    hare_core::codec::field::put_short_str(&mut args, "logs").unwrap();
    hare_core::codec::field::put_short_str(&mut args, "nowhere").unwrap();
    reply(&mut broker, class::BASIC, basic::RETURN, args).await;

    assert_eq!(next_event(&mut events).await, ExchangeEvent::Error(ReplyCode::NoRoute));
    assert_eq!(ex.error_string(), "NO_ROUTE");
    assert!(ex.is_declared());
}

#[tokio::test]
async fn test_unnamed_exchange_publishes_without_declare() {
    let (ex, _sender, _pumps, mut broker) = connect("").await;
    ex.channel_opened().unwrap();
    ex.declare(ExchangeKind::Direct, ExchangeOptions::empty(), FieldTable::new())
        .unwrap();
    ex.publish_text("direct to queue", "jobs").unwrap();

    // first frame on the wire is the publish, not a declare
    expect_publish(&mut broker, 15).await;
}

#[tokio::test]
async fn test_peer_close_disconnects_exchange() {
    let (ex, _sender, pumps, mut broker) = connect("logs").await;
    declare_over_wire(&ex, &mut broker).await;

    drop(broker);
    let result = tokio::time::timeout(Duration::from_secs(5), pumps.reader)
        .await
        .expect("timeout")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(ex.state(), ExchangeState::Closed);

    ex.publish_text("lost", "k").unwrap();
    assert!(ex.unconfirmed().is_empty());
}
