use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, trace};

use crate::codec::FrameCodec;
use crate::codec::frame::{Frame, FramePayload};
use crate::error::HareError;
use crate::exchange::Exchange;

/// Writer task: drains queued frames onto `io` in order.
///
/// Ends when every sender is dropped (after flushing) or on the first
/// write error.
pub fn spawn_writer<W>(
    io: W,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    frame_max: u32,
) -> JoinHandle<Result<(), HareError>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut sink = FramedWrite::new(io, FrameCodec::new(frame_max));
        while let Some(frame) = rx.recv().await {
            trace!(channel = frame.channel, frame_type = frame.frame_type(), "write frame");
            if let Err(e) = sink.send(frame).await {
                error!("network write error: {e}");
                return Err(e);
            }
        }
        debug!("frame queue closed, writer stopping");
        sink.close().await
    })
}

/// Reader task: decodes frames from `io` and hands method frames on the
/// exchange's channel to [`Exchange::handle_method`].
///
/// On EOF or a read error the exchange is told the connection is gone.
pub fn spawn_reader<R>(
    io: R,
    exchange: Arc<Exchange>,
    frame_max: u32,
) -> JoinHandle<Result<(), HareError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = FramedRead::new(io, FrameCodec::new(frame_max));
        let result = loop {
            match stream.next().await {
                Some(Ok(frame)) => {
                    if let Err(e) = dispatch(&exchange, frame) {
                        error!("inbound frame rejected: {e}");
                        break Err(e);
                    }
                }
                Some(Err(e)) => {
                    error!("network read error: {e}");
                    break Err(e);
                }
                None => {
                    debug!("peer closed the connection");
                    break Ok(());
                }
            }
        };
        exchange.disconnected();
        result
    })
}

fn dispatch(exchange: &Exchange, frame: Frame) -> Result<(), HareError> {
    if frame.channel != exchange.channel() {
        trace!(channel = frame.channel, "frame for another channel");
        return Ok(());
    }
    match frame.payload {
        FramePayload::Method(method) => {
            if !exchange.handle_method(&method)? {
                trace!(
                    class_id = method.class_id,
                    method_id = method.method_id,
                    "method not handled by exchange"
                );
            }
        }
        // returned message content is not surfaced
        FramePayload::Header(_) | FramePayload::Body(_) => {}
        FramePayload::Heartbeat => trace!("heartbeat"),
    }
    Ok(())
}

/// Reader and writer tasks of one attached stream.
#[derive(Debug)]
pub struct Pumps {
    pub reader: JoinHandle<Result<(), HareError>>,
    pub writer: JoinHandle<Result<(), HareError>>,
}

/// Split `stream` and run both pumps on it.
pub fn attach<S>(
    stream: S,
    rx: mpsc::UnboundedReceiver<Frame>,
    exchange: Arc<Exchange>,
    frame_max: u32,
) -> Pumps
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    Pumps {
        writer: spawn_writer(write_half, rx, frame_max),
        reader: spawn_reader(read_half, exchange, frame_max),
    }
}
