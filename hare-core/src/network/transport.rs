//! The outbound seam between an exchange and its channel's transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc;

use crate::codec::frame::Frame;
use crate::error::HareError;

/// What an exchange needs from the connection: ordered frame delivery and
/// the negotiated maximum frame size.
pub trait FrameTransport: Send + Sync {
    /// Hand a complete frame to the transport. Frames sent in order on the
    /// same channel reach the broker in order.
    fn send_frame(&self, frame: Frame) -> Result<(), HareError>;

    /// Negotiated `frame-max`; `0` means no limit.
    fn frame_max(&self) -> u32;
}

/// `FrameTransport` backed by an unbounded mpsc channel.
///
/// Sending never blocks, so it is safe to call from the inbound frame
/// handler. A writer task drains the receiver onto the socket.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<Frame>,
    frame_max: Arc<AtomicU32>,
}

impl FrameSender {
    /// Create a sender and the receiver its writer task consumes.
    pub fn channel(frame_max: u32) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Self {
            tx,
            frame_max: Arc::new(AtomicU32::new(frame_max)),
        };
        (sender, rx)
    }

    /// Update after `connection.tune`.
    pub fn set_frame_max(&self, frame_max: u32) {
        self.frame_max.store(frame_max, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl FrameTransport for FrameSender {
    fn send_frame(&self, frame: Frame) -> Result<(), HareError> {
        self.tx.send(frame)?;
        Ok(())
    }

    fn frame_max(&self) -> u32 {
        self.frame_max.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_arrive_in_order() {
        let (sender, mut rx) = FrameSender::channel(4096);
        sender.send_frame(Frame::heartbeat()).unwrap();
        sender
            .send_frame(Frame::body(1, bytes::Bytes::from_static(b"a")))
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), Frame::heartbeat());
        assert_eq!(rx.try_recv().unwrap().channel, 1);
    }

    #[test]
    fn closed_receiver_reports_channel_closed() {
        let (sender, rx) = FrameSender::channel(4096);
        drop(rx);
        assert!(sender.is_closed());
        assert!(matches!(
            sender.send_frame(Frame::heartbeat()),
            Err(HareError::ChannelClosed)
        ));
    }

    #[test]
    fn frame_max_is_shared_between_clones() {
        let (sender, _rx) = FrameSender::channel(4096);
        let clone = sender.clone();
        sender.set_frame_max(131_072);
        assert_eq!(clone.frame_max(), 131_072);
    }
}
