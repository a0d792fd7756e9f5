//! Publish pipeline: one message becomes `basic.publish`, a content header
//! and zero or more body frames, in that order.
//!
//! Body frames are cut to `frame_max - 7` bytes of payload. A zero-length
//! body still gets its content header but no body frame.

use bytes::Bytes;

use crate::codec::field::{FieldTable, ShortString};
use crate::codec::frame::{ContentHeader, Frame};
use crate::error::HareError;
use crate::flags::PublishOptions;
use crate::method::{self, class};
use crate::properties::BasicProperties;

/// Mime type used when the caller does not set one.
pub const DEFAULT_MIME_TYPE: &str = "text/plain";
pub const CONTENT_ENCODING: &str = "utf-8";
pub const DEFAULT_MESSAGE_ID: &str = "0";

/// Bytes of every frame reserved for the transport's framing.
pub const BODY_FRAME_OVERHEAD: u32 = 7;

// ── OutgoingMessage ──────────────────────────────────────────────

/// A message to publish, with its content-header settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    body: Bytes,
    mime_type: String,
    headers: FieldTable,
    properties: BasicProperties,
    options: PublishOptions,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            headers: FieldTable::new(),
            properties: BasicProperties::default(),
            options: PublishOptions::empty(),
        }
    }

    /// A UTF-8 text message.
    pub fn text(text: &str) -> Self {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_headers(mut self, headers: FieldTable) -> Self {
        self.headers = headers;
        self
    }

    /// Properties laid over the defaults; set fields win.
    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn options(&self) -> PublishOptions {
        self.options
    }

    /// The full property list sent in the content header.
    pub fn header_properties(&self) -> Result<BasicProperties, HareError> {
        let defaults = BasicProperties {
            content_type: Some(ShortString::new(self.mime_type.as_str())?),
            content_encoding: Some(ShortString::new(CONTENT_ENCODING)?),
            headers: Some(self.headers.clone()),
            message_id: Some(ShortString::new(DEFAULT_MESSAGE_ID)?),
            ..BasicProperties::default()
        };
        Ok(defaults.overlay(&self.properties))
    }
}

// ── Frame building ───────────────────────────────────────────────

/// Largest body payload per frame, or `None` when `frame_max` is `0`
/// (no negotiated limit).
pub fn body_chunk_size(frame_max: u32) -> Result<Option<usize>, HareError> {
    match frame_max {
        0 => Ok(None),
        max if max <= BODY_FRAME_OVERHEAD => Err(HareError::InvalidFrameMax(max)),
        max => Ok(Some((max - BODY_FRAME_OVERHEAD) as usize)),
    }
}

/// Build every frame for one publish, in wire order.
pub fn build_frames(
    channel: u16,
    exchange: &str,
    routing_key: &str,
    message: &OutgoingMessage,
    frame_max: u32,
) -> Result<Vec<Frame>, HareError> {
    let chunk = body_chunk_size(frame_max)?;
    let body = &message.body;

    let mut frames = Vec::with_capacity(2 + chunk.map_or(1, |c| body.len().div_ceil(c)));
    frames.push(Frame::method(
        channel,
        method::basic_publish(exchange, routing_key, message.options)?,
    ));
    frames.push(Frame::header(
        channel,
        ContentHeader {
            class_id: class::BASIC,
            body_size: body.len() as u64,
            properties: message.header_properties()?,
        },
    ));

    let chunk = chunk.unwrap_or(body.len());
    let mut sent = 0;
    while sent < body.len() {
        let end = (sent + chunk).min(body.len());
        frames.push(Frame::body(channel, body.slice(sent..end)));
        sent = end;
    }
    Ok(frames)
}
