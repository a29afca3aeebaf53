//! Conversational flow: inbound events in, outbound messages out.

mod callback;
mod creation;
mod engine;
mod inbound;
pub mod keyboards;
mod management;
mod outbox;
mod picker;
mod settings;
pub mod validate;

use thiserror::Error;

pub use callback::{CallbackAction, EditField};
pub use engine::FlowEngine;
pub use inbound::{Command, Inbound, MediaRoute, classify_attachment};
pub use outbox::{Button, OutboundMessage, Outbox};
pub use validate::ValidationError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Outbox closed")]
    OutboxClosed,

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}
