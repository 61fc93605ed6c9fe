//! Typed event vocabulary and per-run Event Bus.
//!
//! Every event carries an envelope (`run_id`, `session_id`, monotone `seq`,
//! `timestamp`) around a tagged payload. The payload vocabulary and the
//! envelope shape follow the AG-UI event stream convention.

mod bus;
mod error;
mod event;
mod ids;

pub use bus::{EventBus, Subscriber};
pub use error::RunErrorKind;
pub use event::{CustomEvent, Event, EventPayload, JsonPatchOp, PatchOp, ToolOutcome};
pub use ids::{ApprovalId, CheckpointId, MessageId, RunId, SessionId, ToolCallId};
