use std::cell::RefCell;
use std::rc::Rc;

use worldlink_common::Delta;

use crate::message::{Command, OutboundMessage};

/// Outbound side of the message bus.
///
/// Sending never blocks; the transport queues or drops as it sees fit.
pub trait MessageBus {
    fn send(&mut self, message: OutboundMessage);
}

/// In-memory bus that records every outbound message.
///
/// Clones share the same log, so a test can hand one clone to the engine and
/// inspect traffic through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    sent: Rc<RefCell<Vec<OutboundMessage>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.borrow().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.borrow().is_empty()
    }

    /// All `MyChanges` batches, in send order.
    pub fn change_batches(&self) -> Vec<Vec<Delta>> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::MyChanges(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }

    /// All commands, in send order.
    pub fn commands(&self) -> Vec<Command> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Command(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MessageBus for RecordingBus {
    fn send(&mut self, message: OutboundMessage) {
        tracing::trace!(?message, "outbound");
        self.sent.borrow_mut().push(message);
    }
}
