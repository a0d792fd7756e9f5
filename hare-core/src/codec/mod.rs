//! Frame codec for `tokio_util` framed I/O.
//!
//! [`FrameCodec`] splits a byte stream into whole AMQP frames and writes
//! frames back out. Method arguments and content-header properties are
//! encoded by [`field`] primitives.

pub mod field;
pub mod frame;

use bytes::{Buf, BytesMut};

use crate::error::HareError;
pub use field::{FieldTable, FieldValue, ShortString};
pub use frame::{ContentHeader, Frame, FramePayload, MethodFrame};

/// Default maximum frame size before tuning (AMQP `frame-min-size` is 4096;
/// RabbitMQ offers 128 KiB).
pub const DEFAULT_FRAME_MAX: u32 = 131_072;

#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Largest accepted prefix plus payload; the end octet is not counted,
    /// so a body chunk of `frame_max - 7` bytes fits. `0` = unlimited.
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(frame_max: u32) -> Self {
        Self {
            max_frame_size: frame_max as usize,
        }
    }

    pub fn set_frame_max(&mut self, frame_max: u32) {
        self.max_frame_size = frame_max as usize;
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_MAX)
    }
}

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = Frame;
    type Error = HareError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < frame::FRAME_PREFIX_SIZE {
            return Ok(None);
        }

        let frame_type = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        let framed = frame::FRAME_PREFIX_SIZE + size;
        let total = framed + 1;

        if self.max_frame_size > 0 && framed > self.max_frame_size {
            return Err(HareError::FrameTooLarge {
                size: framed,
                max: self.max_frame_size,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(frame::FRAME_PREFIX_SIZE);
        let payload = src.split_to(size).freeze();
        let end = src.get_u8();
        if end != frame::FRAME_END {
            return Err(HareError::InvalidFrameEnd(end));
        }

        Frame::parse(frame_type, channel, payload).map(Some)
    }
}

impl tokio_util::codec::Encoder<Frame> for FrameCodec {
    type Error = HareError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}
