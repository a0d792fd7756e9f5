//! Undeliverable-message notifications (`basic.return`) and the last error
//! they recorded.

use bytes::{Buf, Bytes};

use crate::codec::field::{ensure, get_short_str};
use crate::error::HareError;
use crate::reply::ReplyCode;

/// Arguments of a broker-initiated `basic.return`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicReturn {
    pub reply_code: ReplyCode,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

impl BasicReturn {
    pub fn decode(mut args: Bytes) -> Result<Self, HareError> {
        ensure(&args, 2, "reply code")?;
        let reply_code = ReplyCode::from(args.get_u16());
        let reply_text = get_short_str(&mut args)?;
        let exchange = get_short_str(&mut args)?;
        let routing_key = get_short_str(&mut args)?;
        Ok(Self {
            reply_code,
            reply_text,
            exchange,
            routing_key,
        })
    }
}

/// Last error reported by the broker for this exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
    code: ReplyCode,
    text: String,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self {
            code: ReplyCode::NoError,
            text: String::new(),
        }
    }
}

impl ErrorState {
    pub fn code(&self) -> ReplyCode {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Record the return if it carries an error code.
    ///
    /// Returns the recorded code, or `None` for success sentinels.
    pub fn record(&mut self, ret: &BasicReturn) -> Option<ReplyCode> {
        if !ret.reply_code.is_error() {
            return None;
        }
        self.code = ret.reply_code;
        self.text.clone_from(&ret.reply_text);
        Some(self.code)
    }
}
