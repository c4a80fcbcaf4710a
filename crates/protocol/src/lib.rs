//! Message bus between the synchronization engine and the server transport.
//!
//! The transport itself (sockets, framing, JSON parsing) lives elsewhere; this
//! crate fixes the structured messages that cross the boundary.
//!
//! # Invariants
//! - Inbound events are already parsed; the engine never sees raw frames.
//! - Outbound messages are fire-and-forget; acknowledgements arrive as events.

mod bus;
mod message;

pub use bus::{MessageBus, RecordingBus};
pub use message::{
    ClientInfo, Command, InboundEvent, LogSeverity, OutboundMessage, RecordingAction,
    STREAMING_TOKEN, SceneChange, SceneEvent, Welcome,
};
