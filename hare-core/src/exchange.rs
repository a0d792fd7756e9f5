//! The exchange as seen by a publishing client.
//!
//! [`Exchange`] ties together the lifecycle state machine, the publish
//! pipeline, publisher-confirm tracking and `basic.return` handling for one
//! exchange bound to one channel.
//!
//! All state sits behind a single mutex that is never held while a frame
//! is handed to the transport, so a transport that delivers inbound frames
//! synchronously can call [`Exchange::handle_method`] from inside
//! `send_frame` without deadlocking. Publishes are additionally serialized
//! so delivery tags match the order frames reach the broker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, trace, warn};

use crate::codec::field::{FieldTable, ShortString};
use crate::codec::frame::{Frame, MethodFrame};
use crate::config::ExchangeConfig;
use crate::error::HareError;
use crate::flags::{ExchangeOptions, PublishOptions, RemoveOptions};
use crate::method::{self, Confirmation, InboundMethod};
use crate::network::FrameTransport;
use crate::publish::{self, OutgoingMessage};
use crate::reply::ReplyCode;
use crate::returned::{BasicReturn, ErrorState};
use crate::state::{ConfirmTracker, DeclareDecision, Declaration, ExchangeKind, ExchangeState, Lifecycle};

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ── ExchangeEvent ────────────────────────────────────────────────

/// Notifications raised to the owning application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeEvent {
    /// `declare-ok` received, or an unnamed exchange's channel opened.
    Declared,
    /// `delete-ok` received.
    Removed,
    /// `confirm.select-ok` received.
    ConfirmsEnabled,
    /// The last outstanding delivery tag was acknowledged.
    AllMessagesDelivered,
    /// A `basic.return` carried an error reply code.
    Error(ReplyCode),
}

// ── Exchange ─────────────────────────────────────────────────────

/// Per-exchange behaviour taken from [`ExchangeConfig`].
#[derive(Debug, Clone)]
struct Settings {
    /// Declaration used by `declare_configured`.
    declaration: Declaration,
    /// `Some(no_wait)` when confirms are enabled once the exchange is declared.
    auto_confirms: Option<bool>,
    confirm_timeout: Duration,
    mime_type: String,
    publish_options: PublishOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&ExchangeConfig::default())
    }
}

impl From<&ExchangeConfig> for Settings {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            declaration: Declaration::default(),
            auto_confirms: config.confirms.enabled.then_some(config.confirms.no_wait),
            confirm_timeout: config.wait_timeout(),
            mime_type: config.publish.mime_type.clone(),
            publish_options: config.publish_options(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    lifecycle: Lifecycle,
    confirms: ConfirmTracker,
    error: ErrorState,
}

pub struct Exchange {
    name: ShortString,
    channel: u16,
    transport: Arc<dyn FrameTransport>,
    settings: Settings,
    inner: Mutex<Inner>,
    publish_order: Mutex<()>,
    events: broadcast::Sender<ExchangeEvent>,
    /// Number of unconfirmed delivery tags, for `wait_for_confirms`.
    pending: watch::Sender<usize>,
    span: tracing::Span,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish()
    }
}

impl Exchange {
    /// Create an exchange on `channel`. An empty `name` is the default exchange.
    pub fn new(
        name: &str,
        channel: u16,
        transport: Arc<dyn FrameTransport>,
    ) -> Result<Self, HareError> {
        Self::with_event_capacity(name, channel, transport, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(
        name: &str,
        channel: u16,
        transport: Arc<dyn FrameTransport>,
        event_capacity: usize,
    ) -> Result<Self, HareError> {
        let name = ShortString::new(name)?;
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let (pending, _) = watch::channel(0);
        let span = tracing::debug_span!("exchange", name = %name, channel);
        Ok(Self {
            name,
            channel,
            transport,
            settings: Settings::default(),
            inner: Mutex::new(Inner::default()),
            publish_order: Mutex::new(()),
            events,
            pending,
            span,
        })
    }

    /// Build an exchange from its configuration section.
    pub fn from_config(
        config: &ExchangeConfig,
        transport: Arc<dyn FrameTransport>,
    ) -> Result<Self, HareError> {
        let mut exchange = Self::with_event_capacity(
            &config.name,
            config.channel,
            transport,
            config.event_capacity,
        )?;
        exchange.settings = Settings {
            declaration: config.declaration()?,
            ..Settings::from(config)
        };
        Ok(exchange)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ExchangeEvent) {
        trace!(?event, "exchange event");
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn state(&self) -> ExchangeState {
        self.lock().lifecycle.state()
    }

    pub fn is_declared(&self) -> bool {
        self.lock().lifecycle.is_declared()
    }

    pub fn kind(&self) -> ExchangeKind {
        self.lock().lifecycle.current().kind.clone()
    }

    pub fn options(&self) -> ExchangeOptions {
        self.lock().lifecycle.current().options
    }

    pub fn arguments(&self) -> FieldTable {
        self.lock().lifecycle.current().arguments.clone()
    }

    /// Last error code recorded from a `basic.return`.
    pub fn error(&self) -> ReplyCode {
        self.lock().error.code()
    }

    pub fn error_string(&self) -> String {
        self.lock().error.text().to_string()
    }

    pub fn confirms_enabled(&self) -> bool {
        self.lock().confirms.is_enabled()
    }

    pub fn next_delivery_tag(&self) -> u64 {
        self.lock().confirms.next_delivery_tag()
    }

    /// Outstanding delivery tags in publish order.
    pub fn unconfirmed(&self) -> Vec<u64> {
        self.lock().confirms.unconfirmed()
    }

    /// Configured default for [`Exchange::wait_for_confirms`].
    pub fn confirm_timeout(&self) -> Duration {
        self.settings.confirm_timeout
    }

    /// Receive every event raised from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.events.subscribe()
    }

    // ── Declare / remove ──────────────────────────────────────────

    /// Declare the exchange.
    ///
    /// Sent immediately when `Undeclared`. While `Closed` or `Declaring` the
    /// request is queued (one slot, latest wins); otherwise it is dropped.
    pub fn declare(
        &self,
        kind: ExchangeKind,
        options: ExchangeOptions,
        arguments: FieldTable,
    ) -> Result<(), HareError> {
        self.declare_with(Declaration::new(kind, options, arguments))
    }

    pub fn declare_with(&self, declaration: Declaration) -> Result<(), HareError> {
        let _enter = self.span.enter();
        // encode up front so a bad declaration never changes state
        let frame = self.declare_frame(&declaration)?;

        let decision = self
            .lock()
            .lifecycle
            .request_declare(!self.name.is_empty(), declaration);
        match decision {
            DeclareDecision::Send(_) => {
                debug!("declaring exchange");
                self.transport.send_frame(frame)
            }
            DeclareDecision::Deferred => {
                debug!("declare queued until the current one completes");
                Ok(())
            }
            DeclareDecision::Ignored => {
                debug!(state = %self.state(), "declare ignored");
                Ok(())
            }
            DeclareDecision::Unnamed => {
                debug!("attempting to declare an unnamed exchange, aborting");
                Ok(())
            }
        }
    }

    /// Declare with the kind, options and arguments this exchange was
    /// configured with.
    pub fn declare_configured(&self) -> Result<(), HareError> {
        self.declare_with(self.settings.declaration.clone())
    }

    fn declare_frame(&self, declaration: &Declaration) -> Result<Frame, HareError> {
        let method = method::exchange_declare(
            self.name.as_str(),
            declaration.kind.as_str(),
            declaration.options,
            &declaration.arguments,
        )?;
        Ok(Frame::method(self.channel, method))
    }

    fn send_queued_declare(&self, declaration: &Declaration) -> Result<(), HareError> {
        debug!("sending queued declare");
        let frame = self.declare_frame(declaration)?;
        self.transport.send_frame(frame)
    }

    /// Delete the exchange. Only valid once declared.
    ///
    /// Any queued declare is discarded either way.
    pub fn remove(&self, options: RemoveOptions) -> Result<(), HareError> {
        let _enter = self.span.enter();
        let frame = Frame::method(
            self.channel,
            method::exchange_delete(self.name.as_str(), options)?,
        );

        if !self.lock().lifecycle.request_remove() {
            debug!("remove of exchange not in declared state");
            return Ok(());
        }
        self.transport.send_frame(frame)
    }

    // ── Publish ───────────────────────────────────────────────────

    /// Publish `message` with `routing_key`.
    ///
    /// Dropped (not queued) when the exchange is not declared. With
    /// confirms enabled the message is tagged before any frame is sent.
    pub fn publish(&self, routing_key: &str, message: OutgoingMessage) -> Result<(), HareError> {
        let _enter = self.span.enter();
        let _order = self
            .publish_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let frames = publish::build_frames(
            self.channel,
            self.name.as_str(),
            routing_key,
            &message,
            self.transport.frame_max(),
        )?;

        {
            let mut inner = self.lock();
            if !inner.lifecycle.is_declared() {
                debug!("attempted to publish to exchange not yet declared");
                return Ok(());
            }
            if let Some(tag) = inner.confirms.assign() {
                trace!(delivery_tag = tag, routing_key, "tagged message");
                self.pending.send_replace(inner.confirms.pending_count());
            }
        }

        for frame in frames {
            self.transport.send_frame(frame)?;
        }
        Ok(())
    }

    /// A message carrying the configured mime type and publish options.
    pub fn message(&self, body: impl Into<bytes::Bytes>) -> OutgoingMessage {
        self.with_defaults(OutgoingMessage::new(body))
    }

    fn with_defaults(&self, message: OutgoingMessage) -> OutgoingMessage {
        message
            .with_mime_type(self.settings.mime_type.as_str())
            .with_options(self.settings.publish_options)
    }

    /// Publish UTF-8 text; `text/plain` unless configured otherwise.
    pub fn publish_text(&self, text: &str, routing_key: &str) -> Result<(), HareError> {
        self.publish(routing_key, self.with_defaults(OutgoingMessage::text(text)))
    }

    // ── Confirms ──────────────────────────────────────────────────

    /// Put the channel in confirm mode and start tagging publishes.
    ///
    /// With `no_wait` the broker sends no `select-ok`, so no
    /// [`ExchangeEvent::ConfirmsEnabled`] follows.
    pub fn enable_confirms(&self, no_wait: bool) -> Result<(), HareError> {
        let _enter = self.span.enter();
        {
            let mut inner = self.lock();
            if !inner.lifecycle.is_declared() {
                debug!("attempted to enable confirms on exchange not yet declared");
                return Ok(());
            }
            if inner.confirms.enable() {
                debug!("delivery tagging enabled");
            }
        }
        self.transport
            .send_frame(Frame::method(self.channel, method::confirm_select(no_wait)))
    }

    /// Wait until every tagged message is acknowledged or `timeout` passes.
    ///
    /// Returns whether nothing is outstanding when the wait ends. Inbound
    /// frames keep being handled on other tasks while this waits.
    pub async fn wait_for_confirms(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.subscribe();
        let drained = tokio::time::timeout(timeout, pending.wait_for(|count| *count == 0))
            .await
            .map(|res| res.is_ok())
            .unwrap_or(false);
        if !drained {
            debug!(parent: &self.span, ?timeout, "timed out waiting for confirms");
        }
        self.lock().confirms.is_empty()
    }

    // ── Inbound ───────────────────────────────────────────────────

    /// Handle an inbound method frame for this exchange's channel.
    ///
    /// Returns `Ok(false)` when the method belongs to some other handler.
    pub fn handle_method(&self, frame: &MethodFrame) -> Result<bool, HareError> {
        let _enter = self.span.enter();
        let Some(method) = InboundMethod::decode(frame)? else {
            return Ok(false);
        };

        match method {
            InboundMethod::DeclareOk => self.on_declare_ok()?,
            InboundMethod::DeleteOk => {
                self.lock().lifecycle.delete_ok();
                debug!("deleted exchange");
                self.emit(ExchangeEvent::Removed);
            }
            InboundMethod::Ack(confirmation) => self.on_ack(confirmation),
            InboundMethod::Nack(confirmation) => {
                warn!(
                    delivery_tag = confirmation.delivery_tag,
                    multiple = confirmation.multiple,
                    "message nacked"
                );
            }
            InboundMethod::Return(ret) => self.on_return(&ret),
            InboundMethod::SelectOk => self.emit(ExchangeEvent::ConfirmsEnabled),
            InboundMethod::OtherBasic(id) | InboundMethod::OtherExchange(id) => {
                trace!(
                    class_id = frame.class_id,
                    method_id = id,
                    "ignoring method"
                );
            }
        }
        Ok(true)
    }

    fn on_declare_ok(&self) -> Result<(), HareError> {
        let queued = self.lock().lifecycle.declare_ok();
        debug!("declared exchange");
        self.emit(ExchangeEvent::Declared);
        match queued {
            Some(declaration) => self.send_queued_declare(&declaration),
            None => self.auto_enable_confirms(),
        }
    }

    fn auto_enable_confirms(&self) -> Result<(), HareError> {
        match self.settings.auto_confirms {
            Some(no_wait) if !self.confirms_enabled() => self.enable_confirms(no_wait),
            _ => Ok(()),
        }
    }

    fn on_ack(&self, confirmation: Confirmation) {
        let outcome = {
            let mut inner = self.lock();
            let outcome = inner
                .confirms
                .ack(confirmation.delivery_tag, confirmation.multiple);
            self.pending.send_replace(inner.confirms.pending_count());
            outcome
        };
        trace!(
            delivery_tag = confirmation.delivery_tag,
            multiple = confirmation.multiple,
            removed = outcome.removed,
            "message acked"
        );
        if outcome.drained {
            self.emit(ExchangeEvent::AllMessagesDelivered);
        }
    }

    fn on_return(&self, ret: &BasicReturn) {
        warn!(
            reply_code = ret.reply_code.code(),
            reply_text = %ret.reply_text,
            exchange = %ret.exchange,
            routing_key = %ret.routing_key,
            "message returned"
        );
        let recorded = self.lock().error.record(ret);
        if let Some(code) = recorded {
            self.emit(ExchangeEvent::Error(code));
        }
    }

    // ── Channel events ────────────────────────────────────────────

    /// The owning channel opened.
    ///
    /// The unnamed exchange is declared implicitly; a named one becomes
    /// `Undeclared` and sends any queued declare.
    pub fn channel_opened(&self) -> Result<(), HareError> {
        let _enter = self.span.enter();
        let named = !self.name.is_empty();
        let queued = self.lock().lifecycle.channel_opened(named);

        if !named {
            debug!("automatically declaring built-in exchange");
            self.emit(ExchangeEvent::Declared);
            return self.auto_enable_confirms();
        }
        match queued {
            Some(declaration) => self.send_queued_declare(&declaration),
            None => {
                debug!("no delayed declare pending");
                Ok(())
            }
        }
    }

    /// The owning channel closed. A queued declare is kept for the reopen.
    pub fn channel_closed(&self) {
        let _enter = self.span.enter();
        debug!("channel closed");
        self.lock().lifecycle.channel_closed();
    }

    /// The connection was lost. Queued declare intent is discarded.
    pub fn disconnected(&self) {
        let _enter = self.span.enter();
        debug!("exchange disconnected");
        self.lock().lifecycle.disconnected();
    }
}

// ── Tests ────────────────────────────────────────────────────────
