pub mod confirms;
pub mod exchange;

pub use confirms::{AckOutcome, ConfirmTracker};
pub use exchange::{DeclareDecision, Declaration, ExchangeKind, ExchangeState, Lifecycle};
