//! `basic` class content-header properties.
//!
//! On the wire a 16-bit flag word announces which properties follow; only
//! present properties are written, in flag order from the high bit down.

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::field::{FieldTable, ShortString, ensure};
use crate::error::HareError;

const CONTENT_TYPE: u16 = 1 << 15;
const CONTENT_ENCODING: u16 = 1 << 14;
const HEADERS: u16 = 1 << 13;
const DELIVERY_MODE: u16 = 1 << 12;
const PRIORITY: u16 = 1 << 11;
const CORRELATION_ID: u16 = 1 << 10;
const REPLY_TO: u16 = 1 << 9;
const EXPIRATION: u16 = 1 << 8;
const MESSAGE_ID: u16 = 1 << 7;
const TIMESTAMP: u16 = 1 << 6;
const TYPE: u16 = 1 << 5;
const USER_ID: u16 = 1 << 4;
const APP_ID: u16 = 1 << 3;
const CLUSTER_ID: u16 = 1 << 2;

/// Delivery mode values for [`BasicProperties::delivery_mode`].
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Optional message properties. `None` fields are not sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicProperties {
    pub content_type: Option<ShortString>,
    pub content_encoding: Option<ShortString>,
    pub headers: Option<FieldTable>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<ShortString>,
    pub reply_to: Option<ShortString>,
    pub expiration: Option<ShortString>,
    pub message_id: Option<ShortString>,
    pub timestamp: Option<u64>,
    pub kind: Option<ShortString>,
    pub user_id: Option<ShortString>,
    pub app_id: Option<ShortString>,
    pub cluster_id: Option<ShortString>,
}

impl BasicProperties {
    pub fn with_content_type(mut self, value: &str) -> Result<Self, HareError> {
        self.content_type = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_content_encoding(mut self, value: &str) -> Result<Self, HareError> {
        self.content_encoding = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_headers(mut self, headers: FieldTable) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_delivery_mode(mut self, mode: u8) -> Self {
        self.delivery_mode = Some(mode);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_correlation_id(mut self, value: &str) -> Result<Self, HareError> {
        self.correlation_id = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_reply_to(mut self, value: &str) -> Result<Self, HareError> {
        self.reply_to = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_expiration(mut self, value: &str) -> Result<Self, HareError> {
        self.expiration = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_message_id(mut self, value: &str) -> Result<Self, HareError> {
        self.message_id = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_kind(mut self, value: &str) -> Result<Self, HareError> {
        self.kind = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_user_id(mut self, value: &str) -> Result<Self, HareError> {
        self.user_id = Some(ShortString::new(value)?);
        Ok(self)
    }

    pub fn with_app_id(mut self, value: &str) -> Result<Self, HareError> {
        self.app_id = Some(ShortString::new(value)?);
        Ok(self)
    }

    /// Returns `self` with every property set in `top` replaced by `top`'s value.
    pub fn overlay(self, top: &BasicProperties) -> Self {
        Self {
            content_type: top.content_type.clone().or(self.content_type),
            content_encoding: top.content_encoding.clone().or(self.content_encoding),
            headers: top.headers.clone().or(self.headers),
            delivery_mode: top.delivery_mode.or(self.delivery_mode),
            priority: top.priority.or(self.priority),
            correlation_id: top.correlation_id.clone().or(self.correlation_id),
            reply_to: top.reply_to.clone().or(self.reply_to),
            expiration: top.expiration.clone().or(self.expiration),
            message_id: top.message_id.clone().or(self.message_id),
            timestamp: top.timestamp.or(self.timestamp),
            kind: top.kind.clone().or(self.kind),
            user_id: top.user_id.clone().or(self.user_id),
            app_id: top.app_id.clone().or(self.app_id),
            cluster_id: top.cluster_id.clone().or(self.cluster_id),
        }
    }

    /// The flag word announcing which properties are present.
    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, bit: u16| {
            if present {
                flags |= bit;
            }
        };
        set(self.content_type.is_some(), CONTENT_TYPE);
        set(self.content_encoding.is_some(), CONTENT_ENCODING);
        set(self.headers.is_some(), HEADERS);
        set(self.delivery_mode.is_some(), DELIVERY_MODE);
        set(self.priority.is_some(), PRIORITY);
        set(self.correlation_id.is_some(), CORRELATION_ID);
        set(self.reply_to.is_some(), REPLY_TO);
        set(self.expiration.is_some(), EXPIRATION);
        set(self.message_id.is_some(), MESSAGE_ID);
        set(self.timestamp.is_some(), TIMESTAMP);
        set(self.kind.is_some(), TYPE);
        set(self.user_id.is_some(), USER_ID);
        set(self.app_id.is_some(), APP_ID);
        set(self.cluster_id.is_some(), CLUSTER_ID);
        flags
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), HareError> {
        dst.put_u16(self.flags());

        let put_str = |dst: &mut BytesMut, value: &Option<ShortString>| {
            if let Some(v) = value {
                v.encode(dst);
            }
        };
        put_str(dst, &self.content_type);
        put_str(dst, &self.content_encoding);
        if let Some(headers) = &self.headers {
            headers.encode(dst)?;
        }
        if let Some(mode) = self.delivery_mode {
            dst.put_u8(mode);
        }
        if let Some(priority) = self.priority {
            dst.put_u8(priority);
        }
        put_str(dst, &self.correlation_id);
        put_str(dst, &self.reply_to);
        put_str(dst, &self.expiration);
        put_str(dst, &self.message_id);
        if let Some(ts) = self.timestamp {
            dst.put_u64(ts);
        }
        put_str(dst, &self.kind);
        put_str(dst, &self.user_id);
        put_str(dst, &self.app_id);
        put_str(dst, &self.cluster_id);
        Ok(())
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, HareError> {
        ensure(src, 2, "property flags")?;
        let flags = src.get_u16();
        let has = |bit: u16| flags & bit != 0;

        let mut props = BasicProperties::default();
        if has(CONTENT_TYPE) {
            props.content_type = Some(ShortString::decode(src)?);
        }
        if has(CONTENT_ENCODING) {
            props.content_encoding = Some(ShortString::decode(src)?);
        }
        if has(HEADERS) {
            props.headers = Some(FieldTable::decode(src)?);
        }
        if has(DELIVERY_MODE) {
            ensure(src, 1, "delivery mode")?;
            props.delivery_mode = Some(src.get_u8());
        }
        if has(PRIORITY) {
            ensure(src, 1, "priority")?;
            props.priority = Some(src.get_u8());
        }
        if has(CORRELATION_ID) {
            props.correlation_id = Some(ShortString::decode(src)?);
        }
        if has(REPLY_TO) {
            props.reply_to = Some(ShortString::decode(src)?);
        }
        if has(EXPIRATION) {
            props.expiration = Some(ShortString::decode(src)?);
        }
        if has(MESSAGE_ID) {
            props.message_id = Some(ShortString::decode(src)?);
        }
        if has(TIMESTAMP) {
            ensure(src, 8, "timestamp")?;
            props.timestamp = Some(src.get_u64());
        }
        if has(TYPE) {
            props.kind = Some(ShortString::decode(src)?);
        }
        if has(USER_ID) {
            props.user_id = Some(ShortString::decode(src)?);
        }
        if has(APP_ID) {
            props.app_id = Some(ShortString::decode(src)?);
        }
        if has(CLUSTER_ID) {
            props.cluster_id = Some(ShortString::decode(src)?);
        }
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_properties_are_a_zero_flag_word() {
        let mut buf = BytesMut::new();
        BasicProperties::default().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0]);
    }

    #[test]
    fn flags_follow_property_order() {
        let props = BasicProperties::default()
            .with_content_type("text/plain")
            .unwrap()
            .with_message_id("0")
            .unwrap();
        assert_eq!(props.flags(), CONTENT_TYPE | MESSAGE_ID);

        let mut buf = BytesMut::new();
        props.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[0x80, 0x80, 10, b't']);
        assert_eq!(&buf[buf.len() - 2..], &[1, b'0']);
    }

    #[test]
    fn overlay_prefers_top_values() {
        let base = BasicProperties::default()
            .with_content_type("text/plain")
            .unwrap()
            .with_message_id("0")
            .unwrap();
        let top = BasicProperties::default()
            .with_message_id("order-17")
            .unwrap()
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT);

        let merged = base.overlay(&top);
        assert_eq!(merged.message_id.unwrap().as_str(), "order-17");
        assert_eq!(merged.content_type.unwrap().as_str(), "text/plain");
        assert_eq!(merged.delivery_mode, Some(DELIVERY_MODE_PERSISTENT));
    }

    #[test]
    fn decode_full_property_list() {
        let props = BasicProperties::default()
            .with_content_type("application/json")
            .unwrap()
            .with_headers(FieldTable::new().with("x", 1i32).unwrap())
            .with_priority(5)
            .with_timestamp(1_700_000_000)
            .with_app_id("billing")
            .unwrap();
        let mut buf = BytesMut::new();
        props.encode(&mut buf).unwrap();

        let decoded = BasicProperties::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, props);
    }
}
