//! Exchange lifecycle state machine.
//!
//! The [`Lifecycle`] performs no I/O: each transition tells the caller
//! whether a frame has to be sent. Refused requests are not errors.
//!
//! ```text
//!            channel open (named)        declare           declare-ok
//!  Closed ───────────────────────► Undeclared ──────► Declaring ──────► Declared
//!    ▲                                 ▲                                   │
//!    │ channel close / disconnect      │ delete-ok                 remove  │
//!    └──────── (from any state)        └─────────── Removing ◄─────────────┘
//! ```
//!
//! An unnamed (default) exchange skips the wire round trip and becomes
//! `Declared` as soon as its channel opens.

use std::fmt;

use crate::codec::field::FieldTable;
use crate::flags::ExchangeOptions;

// ── ExchangeState ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExchangeState {
    /// Channel not open. Initial state.
    #[default]
    Closed,
    /// Channel open, exchange not declared.
    Undeclared,
    /// `exchange.declare` sent, awaiting `declare-ok`.
    Declaring,
    /// Ready for publishing.
    Declared,
    /// `exchange.delete` sent, awaiting `delete-ok`.
    Removing,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Undeclared => write!(f, "Undeclared"),
            Self::Declaring => write!(f, "Declaring"),
            Self::Declared => write!(f, "Declared"),
            Self::Removing => write!(f, "Removing"),
        }
    }
}

// ── ExchangeKind ─────────────────────────────────────────────────

/// The routing algorithm of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
    /// Broker extension such as `x-delayed-message`.
    Custom(String),
}

impl ExchangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Direct => "direct",
            Self::Fanout => "fanout",
            Self::Topic => "topic",
            Self::Headers => "headers",
            Self::Custom(kind) => kind,
        }
    }
}

impl From<&str> for ExchangeKind {
    fn from(value: &str) -> Self {
        match value {
            "direct" => Self::Direct,
            "fanout" => Self::Fanout,
            "topic" => Self::Topic,
            "headers" => Self::Headers,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Declaration ──────────────────────────────────────────────────

/// Everything `exchange.declare` carries besides the name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declaration {
    pub kind: ExchangeKind,
    pub options: ExchangeOptions,
    pub arguments: FieldTable,
}

impl Declaration {
    pub fn new(kind: ExchangeKind, options: ExchangeOptions, arguments: FieldTable) -> Self {
        Self {
            kind,
            options,
            arguments,
        }
    }
}

/// Outcome of a declare request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclareDecision {
    /// Send `exchange.declare` with this declaration now.
    Send(Declaration),
    /// Stored; sent once the in-flight declare completes or the channel opens.
    Deferred,
    /// Dropped: the exchange is declared or being removed.
    Ignored,
    /// Dropped: the default exchange is never declared over the wire.
    Unnamed,
}

// ── Lifecycle ────────────────────────────────────────────────────

/// Lifecycle of one exchange on one channel.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: ExchangeState,
    /// The declaration last sent (or, before that, requested).
    current: Declaration,
    /// At most one queued declare; a newer request replaces it.
    pending: Option<Declaration>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_declared(&self) -> bool {
        self.state == ExchangeState::Declared
    }

    pub fn current(&self) -> &Declaration {
        &self.current
    }

    pub fn has_pending_declare(&self) -> bool {
        self.pending.is_some()
    }

    fn set_state(&mut self, next: ExchangeState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "exchange state");
        }
        self.state = next;
    }

    fn begin_declare(&mut self, declaration: Declaration) -> Declaration {
        self.set_state(ExchangeState::Declaring);
        self.pending = None;
        self.current = declaration.clone();
        declaration
    }

    /// Request a declare.
    ///
    /// Valid from: `Undeclared`. Deferred from `Closed` and `Declaring`.
    pub fn request_declare(&mut self, named: bool, declaration: Declaration) -> DeclareDecision {
        if !named {
            return DeclareDecision::Unnamed;
        }
        match self.state {
            ExchangeState::Undeclared => DeclareDecision::Send(self.begin_declare(declaration)),
            ExchangeState::Closed | ExchangeState::Declaring => {
                self.pending = Some(declaration);
                DeclareDecision::Deferred
            }
            ExchangeState::Declared | ExchangeState::Removing => DeclareDecision::Ignored,
        }
    }

    /// `declare-ok` received. Returns a queued declaration to send next.
    pub fn declare_ok(&mut self) -> Option<Declaration> {
        self.set_state(ExchangeState::Declared);
        let next = self.pending.take()?;
        Some(self.begin_declare(next))
    }

    /// Request a delete. Always discards a queued declare.
    ///
    /// Valid from: `Declared`. Returns `false` when refused.
    pub fn request_remove(&mut self) -> bool {
        self.pending = None;
        if self.state != ExchangeState::Declared {
            return false;
        }
        self.set_state(ExchangeState::Removing);
        true
    }

    /// `delete-ok` received.
    pub fn delete_ok(&mut self) {
        self.set_state(ExchangeState::Undeclared);
    }

    /// The owning channel opened. Returns a queued declaration to send.
    pub fn channel_opened(&mut self, named: bool) -> Option<Declaration> {
        if !named {
            self.pending = None;
            self.set_state(ExchangeState::Declared);
            return None;
        }
        self.set_state(ExchangeState::Undeclared);
        let next = self.pending.take()?;
        Some(self.begin_declare(next))
    }

    /// The owning channel closed. A queued declare survives for the reopen.
    pub fn channel_closed(&mut self) {
        self.set_state(ExchangeState::Closed);
    }

    /// The connection was lost. Queued declare intent is discarded.
    pub fn disconnected(&mut self) {
        self.pending = None;
        self.set_state(ExchangeState::Closed);
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Declaration {
        Declaration::new(ExchangeKind::Topic, ExchangeOptions::DURABLE, FieldTable::new())
    }

    fn fanout() -> Declaration {
        Declaration::new(ExchangeKind::Fanout, ExchangeOptions::empty(), FieldTable::new())
    }

    fn open() -> Lifecycle {
        let mut lc = Lifecycle::new();
        assert!(lc.channel_opened(true).is_none());
        lc
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut lc = open();
        assert_eq!(lc.state(), ExchangeState::Undeclared);

        assert_eq!(lc.request_declare(true, topic()), DeclareDecision::Send(topic()));
        assert_eq!(lc.state(), ExchangeState::Declaring);

        assert!(lc.declare_ok().is_none());
        assert!(lc.is_declared());

        assert!(lc.request_remove());
        assert_eq!(lc.state(), ExchangeState::Removing);

        lc.delete_ok();
        assert_eq!(lc.state(), ExchangeState::Undeclared);
    }

    #[test]
    fn unnamed_declare_leaves_state_unchanged() {
        let mut lc = open();
        assert_eq!(lc.request_declare(false, topic()), DeclareDecision::Unnamed);
        assert_eq!(lc.state(), ExchangeState::Undeclared);
        assert!(!lc.has_pending_declare());
    }

    #[test]
    fn unnamed_exchange_is_declared_on_open() {
        let mut lc = Lifecycle::new();
        assert!(lc.channel_opened(false).is_none());
        assert!(lc.is_declared());
    }

    #[test]
    fn declare_while_declaring_is_queued_once() {
        let mut lc = open();
        lc.request_declare(true, topic());
        assert_eq!(lc.request_declare(true, topic()), DeclareDecision::Deferred);
        assert_eq!(lc.request_declare(true, fanout()), DeclareDecision::Deferred);

        // last request wins, and only one follow-up is sent
        assert_eq!(lc.declare_ok(), Some(fanout()));
        assert_eq!(lc.state(), ExchangeState::Declaring);
        assert_eq!(lc.current().kind, ExchangeKind::Fanout);
        assert!(lc.declare_ok().is_none());
        assert!(lc.is_declared());
    }

    #[test]
    fn declare_before_open_is_sent_on_open() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.request_declare(true, topic()), DeclareDecision::Deferred);
        assert_eq!(lc.channel_opened(true), Some(topic()));
        assert_eq!(lc.state(), ExchangeState::Declaring);
        assert!(!lc.has_pending_declare());
    }

    #[test]
    fn queued_declare_survives_channel_cycle() {
        let mut lc = open();
        lc.request_declare(true, topic());
        lc.request_declare(true, topic());
        lc.channel_closed();
        assert_eq!(lc.state(), ExchangeState::Closed);
        assert_eq!(lc.channel_opened(true), Some(topic()));
        assert!(lc.channel_opened(true).is_none());
    }

    #[test]
    fn disconnect_discards_queued_declare() {
        let mut lc = open();
        lc.request_declare(true, topic());
        lc.request_declare(true, topic());
        lc.disconnected();
        assert_eq!(lc.state(), ExchangeState::Closed);
        assert!(lc.channel_opened(true).is_none());
        assert_eq!(lc.state(), ExchangeState::Undeclared);
    }

    #[test]
    fn declare_ignored_when_declared_or_removing() {
        let mut lc = open();
        lc.request_declare(true, topic());
        lc.declare_ok();
        assert_eq!(lc.request_declare(true, topic()), DeclareDecision::Ignored);
        lc.request_remove();
        assert_eq!(lc.request_declare(true, topic()), DeclareDecision::Ignored);
        assert!(!lc.has_pending_declare());
    }

    #[test]
    fn remove_refused_unless_declared_and_clears_queue() {
        let mut lc = open();
        lc.request_declare(true, topic());
        lc.request_declare(true, fanout());
        assert!(!lc.request_remove());
        assert!(!lc.has_pending_declare());
        assert_eq!(lc.state(), ExchangeState::Declaring);
    }

    #[test]
    fn kind_strings() {
        assert_eq!(ExchangeKind::Topic.as_str(), "topic");
        assert_eq!(ExchangeKind::from("fanout"), ExchangeKind::Fanout);
        assert_eq!(
            ExchangeKind::from("x-delayed-message"),
            ExchangeKind::Custom("x-delayed-message".into())
        );
        assert_eq!(ExchangeState::Declaring.to_string(), "Declaring");
    }
}
