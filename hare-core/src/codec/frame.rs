//! AMQP 0-9-1 frames.
//!
//! ```text
//! type:     u8   (1 = method, 2 = header, 3 = body, 8 = heartbeat)
//! channel:  u16
//! size:     u32
//! payload:  [u8; size]
//! end:      u8   (0xCE)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::field::ensure;
use crate::error::HareError;
use crate::properties::BasicProperties;

pub const FRAME_METHOD: u8 = 1;
pub const FRAME_HEADER: u8 = 2;
pub const FRAME_BODY: u8 = 3;
pub const FRAME_HEARTBEAT: u8 = 8;
pub const FRAME_END: u8 = 0xCE;

/// Bytes in front of every payload: type, channel and size.
pub const FRAME_PREFIX_SIZE: usize = 7;

// ── MethodFrame ──────────────────────────────────────────────────

/// A method identified by class and method id, with pre-encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFrame {
    pub class_id: u16,
    pub method_id: u16,
    pub arguments: Bytes,
}

impl MethodFrame {
    pub fn new(class_id: u16, method_id: u16, arguments: impl Into<Bytes>) -> Self {
        Self {
            class_id,
            method_id,
            arguments: arguments.into(),
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16(self.class_id);
        dst.put_u16(self.method_id);
        dst.put_slice(&self.arguments);
    }

    fn decode(mut payload: Bytes) -> Result<Self, HareError> {
        ensure(&payload, 4, "method frame")?;
        let class_id = payload.get_u16();
        let method_id = payload.get_u16();
        Ok(Self {
            class_id,
            method_id,
            arguments: payload,
        })
    }
}

// ── ContentHeader ────────────────────────────────────────────────

/// The content header sent between a `basic.publish` and its body frames.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    pub class_id: u16,
    pub body_size: u64,
    pub properties: BasicProperties,
}

impl ContentHeader {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), HareError> {
        dst.put_u16(self.class_id);
        dst.put_u16(0); // weight
        dst.put_u64(self.body_size);
        self.properties.encode(dst)
    }

    fn decode(mut payload: Bytes) -> Result<Self, HareError> {
        ensure(&payload, 12, "content header")?;
        let class_id = payload.get_u16();
        let _weight = payload.get_u16();
        let body_size = payload.get_u64();
        let properties = BasicProperties::decode(&mut payload)?;
        Ok(Self {
            class_id,
            body_size,
            properties,
        })
    }
}

// ── Frame ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Method(MethodFrame),
    Header(ContentHeader),
    Body(Bytes),
    Heartbeat,
}

/// A single frame addressed to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub payload: FramePayload,
}

impl Frame {
    pub fn method(channel: u16, method: MethodFrame) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method),
        }
    }

    pub fn header(channel: u16, header: ContentHeader) -> Self {
        Self {
            channel,
            payload: FramePayload::Header(header),
        }
    }

    pub fn body(channel: u16, body: Bytes) -> Self {
        Self {
            channel,
            payload: FramePayload::Body(body),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            payload: FramePayload::Heartbeat,
        }
    }

    pub fn frame_type(&self) -> u8 {
        match self.payload {
            FramePayload::Method(_) => FRAME_METHOD,
            FramePayload::Header(_) => FRAME_HEADER,
            FramePayload::Body(_) => FRAME_BODY,
            FramePayload::Heartbeat => FRAME_HEARTBEAT,
        }
    }

    pub fn as_method(&self) -> Option<&MethodFrame> {
        match &self.payload {
            FramePayload::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Append the complete wire representation to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), HareError> {
        let mut payload = BytesMut::new();
        match &self.payload {
            FramePayload::Method(m) => m.encode(&mut payload),
            FramePayload::Header(h) => h.encode(&mut payload)?,
            FramePayload::Body(b) => payload.put_slice(b),
            FramePayload::Heartbeat => {}
        }
        let size = u32::try_from(payload.len())
            .map_err(|_| HareError::LongValueTooLong(payload.len()))?;

        dst.reserve(FRAME_PREFIX_SIZE + payload.len() + 1);
        dst.put_u8(self.frame_type());
        dst.put_u16(self.channel);
        dst.put_u32(size);
        dst.put_slice(&payload);
        dst.put_u8(FRAME_END);
        Ok(())
    }

    /// Build a frame from its already-delimited parts.
    pub fn parse(frame_type: u8, channel: u16, payload: Bytes) -> Result<Self, HareError> {
        let payload = match frame_type {
            FRAME_METHOD => FramePayload::Method(MethodFrame::decode(payload)?),
            FRAME_HEADER => FramePayload::Header(ContentHeader::decode(payload)?),
            FRAME_BODY => FramePayload::Body(payload),
            FRAME_HEARTBEAT => FramePayload::Heartbeat,
            other => {
                return Err(HareError::UnknownVariant {
                    type_name: "FrameType",
                    value: other as u64,
                });
            }
        };
        Ok(Self { channel, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_frame_wire_layout() {
        let frame = Frame::method(1, MethodFrame::new(85, 10, vec![0u8]));
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[1, 0, 1, 0, 0, 0, 5, 0, 85, 0, 10, 0, FRAME_END]
        );
    }

    #[test]
    fn heartbeat_is_empty() {
        let mut buf = BytesMut::new();
        Frame::heartbeat().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[8, 0, 0, 0, 0, 0, 0, FRAME_END]);
    }

    #[test]
    fn parse_rejects_unknown_type() {
        assert!(matches!(
            Frame::parse(9, 1, Bytes::new()),
            Err(HareError::UnknownVariant {
                type_name: "FrameType",
                value: 9
            })
        ));
    }

    #[test]
    fn parse_short_method_payload() {
        assert!(matches!(
            Frame::parse(FRAME_METHOD, 1, Bytes::from_static(&[0, 60])),
            Err(HareError::Truncated { .. })
        ));
    }
}
