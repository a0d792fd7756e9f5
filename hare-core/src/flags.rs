//! Option bits packed into the single options octet of exchange and
//! publish methods.

use bitflags::bitflags;

bitflags! {
    /// `exchange.declare` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExchangeOptions: u8 {
        const PASSIVE     = 0x01;
        const DURABLE     = 0x02;
        const AUTO_DELETE = 0x04;
        const INTERNAL    = 0x08;
        const NO_WAIT     = 0x10;
    }
}

bitflags! {
    /// `exchange.delete` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RemoveOptions: u8 {
        /// Only delete if the exchange has no bindings.
        const IF_UNUSED = 0x01;
        const NO_WAIT   = 0x02;
    }
}

bitflags! {
    /// `basic.publish` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PublishOptions: u8 {
        /// Return the message if it cannot be routed to a queue.
        const MANDATORY = 0x01;
        /// Return the message if it cannot be delivered to a consumer immediately.
        const IMMEDIATE = 0x02;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_bits_pack_into_one_octet() {
        let opts = ExchangeOptions::DURABLE | ExchangeOptions::AUTO_DELETE;
        assert_eq!(opts.bits(), 0x06);
        assert_eq!(ExchangeOptions::all().bits(), 0x1F);
    }

    #[test]
    fn unknown_bits_are_dropped() {
        assert_eq!(PublishOptions::from_bits_truncate(0xFF), PublishOptions::all());
    }
}
