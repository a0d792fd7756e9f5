//! Class and method identifiers, and the argument layouts this client
//! sends and receives.
//!
//! | Method               | Arguments                                                   |
//! |----------------------|-------------------------------------------------------------|
//! | `exchange.declare`   | reserved i16, name, type, options u8, arguments table       |
//! | `exchange.delete`    | reserved i16, name, options u8                              |
//! | `basic.publish`      | reserved i16, exchange, routing key, options u8             |
//! | `confirm.select`     | no-wait u8                                                  |
//! | `basic.return`       | reply code u16, reply text, exchange, routing key           |
//! | `basic.ack` / `nack` | delivery tag u64, bits u8 (bit 0 = multiple)                |

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::field::{FieldTable, ensure, put_short_str};
use crate::codec::frame::MethodFrame;
use crate::error::HareError;
use crate::flags::{ExchangeOptions, PublishOptions, RemoveOptions};
use crate::returned::BasicReturn;

// ── Identifiers ──────────────────────────────────────────────────

pub mod class {
    pub const CONNECTION: u16 = 10;
    pub const CHANNEL: u16 = 20;
    pub const EXCHANGE: u16 = 40;
    pub const QUEUE: u16 = 50;
    pub const BASIC: u16 = 60;
    pub const CONFIRM: u16 = 85;
    pub const TX: u16 = 90;
}

pub mod exchange {
    pub const DECLARE: u16 = 10;
    pub const DECLARE_OK: u16 = 11;
    pub const DELETE: u16 = 20;
    pub const DELETE_OK: u16 = 21;
}

pub mod basic {
    pub const PUBLISH: u16 = 40;
    pub const RETURN: u16 = 50;
    pub const ACK: u16 = 80;
    pub const NACK: u16 = 120;
}

pub mod confirm {
    pub const SELECT: u16 = 10;
    pub const SELECT_OK: u16 = 11;
}

// ── Outbound ─────────────────────────────────────────────────────

pub fn exchange_declare(
    name: &str,
    kind: &str,
    options: ExchangeOptions,
    arguments: &FieldTable,
) -> Result<MethodFrame, HareError> {
    let mut args = BytesMut::new();
    args.put_i16(0); // reserved-1
    put_short_str(&mut args, name)?;
    put_short_str(&mut args, kind)?;
    args.put_u8(options.bits());
    arguments.encode(&mut args)?;
    Ok(MethodFrame::new(class::EXCHANGE, exchange::DECLARE, args.freeze()))
}

pub fn exchange_delete(name: &str, options: RemoveOptions) -> Result<MethodFrame, HareError> {
    let mut args = BytesMut::new();
    args.put_i16(0); // reserved-1
    put_short_str(&mut args, name)?;
    args.put_u8(options.bits());
    Ok(MethodFrame::new(class::EXCHANGE, exchange::DELETE, args.freeze()))
}

pub fn basic_publish(
    exchange: &str,
    routing_key: &str,
    options: PublishOptions,
) -> Result<MethodFrame, HareError> {
    let mut args = BytesMut::new();
    args.put_i16(0); // reserved-1
    put_short_str(&mut args, exchange)?;
    put_short_str(&mut args, routing_key)?;
    args.put_u8(options.bits());
    Ok(MethodFrame::new(class::BASIC, basic::PUBLISH, args.freeze()))
}

pub fn confirm_select(no_wait: bool) -> MethodFrame {
    MethodFrame::new(
        class::CONFIRM,
        confirm::SELECT,
        Bytes::copy_from_slice(&[u8::from(no_wait)]),
    )
}

// ── Inbound ──────────────────────────────────────────────────────

/// Arguments of `basic.ack` and `basic.nack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub delivery_tag: u64,
    pub multiple: bool,
}

impl Confirmation {
    pub fn decode(mut args: Bytes) -> Result<Self, HareError> {
        ensure(&args, 9, "confirmation")?;
        let delivery_tag = args.get_u64();
        let bits = args.get_u8();
        Ok(Self {
            delivery_tag,
            multiple: bits & 0x01 != 0,
        })
    }
}

/// Inbound methods routed to an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMethod {
    DeclareOk,
    DeleteOk,
    Ack(Confirmation),
    Nack(Confirmation),
    Return(BasicReturn),
    SelectOk,
    /// A `basic` method this client does not act on; still owned by the exchange.
    OtherBasic(u16),
    /// An `exchange` method this client does not act on.
    OtherExchange(u16),
}

impl InboundMethod {
    /// Classify a method frame. `Ok(None)` means the frame belongs to some
    /// other channel handler.
    pub fn decode(frame: &MethodFrame) -> Result<Option<Self>, HareError> {
        let args = frame.arguments.clone();
        let method = match (frame.class_id, frame.method_id) {
            (class::EXCHANGE, exchange::DECLARE_OK) => InboundMethod::DeclareOk,
            (class::EXCHANGE, exchange::DELETE_OK) => InboundMethod::DeleteOk,
            (class::EXCHANGE, other) => InboundMethod::OtherExchange(other),
            (class::BASIC, basic::ACK) => InboundMethod::Ack(Confirmation::decode(args)?),
            (class::BASIC, basic::NACK) => InboundMethod::Nack(Confirmation::decode(args)?),
            (class::BASIC, basic::RETURN) => InboundMethod::Return(BasicReturn::decode(args)?),
            (class::BASIC, other) => InboundMethod::OtherBasic(other),
            (class::CONFIRM, confirm::SELECT_OK) => InboundMethod::SelectOk,
            _ => return Ok(None),
        };
        Ok(Some(method))
    }
}
