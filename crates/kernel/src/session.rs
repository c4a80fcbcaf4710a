use std::time::Duration;
use tokio::sync::oneshot;
use worldlink_common::Delta;
use worldlink_protocol::{Command, MessageBus, OutboundMessage, Welcome};

use crate::error::SessionError;
use crate::timer::SampleTimer;

/// Where the connection and world handshake stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Offline,
    Connecting,
    Connected,
    EnteredWorld,
}

/// Which welcome a pending `enter` is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Acknowledgement of the connection itself.
    AwaitConnect,
    /// Acknowledgement of an `Enter` command.
    AwaitEnter,
}

/// Outcome of an `enter`: the welcome that completed it, or why it failed.
pub type EnterResult = Result<Welcome, SessionError>;

struct PendingEnter {
    phase: HandshakePhase,
    properties: Vec<Delta>,
    world: Option<String>,
    reply: oneshot::Sender<EnterResult>,
}

/// Drives the connect, enter, session handshake and owns the sampling timer.
///
/// Each `enter` registers one continuation tagged with the welcome it waits
/// for. A welcome consumes the continuation of its phase, so unrelated
/// welcomes later on never re-trigger it.
pub struct SessionController {
    state: SessionState,
    timer: SampleTimer,
    pending: Option<PendingEnter>,
    welcome: Option<Welcome>,
}

impl SessionController {
    /// An offline controller whose timer ticks every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            state: SessionState::Offline,
            timer: SampleTimer::new(period),
            pending: None,
            welcome: None,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while the sampling timer runs.
    pub fn is_online(&self) -> bool {
        self.timer.is_active()
    }

    /// The sampling timer started and stopped with the session.
    pub fn timer(&self) -> &SampleTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut SampleTimer {
        &mut self.timer
    }

    /// Last welcome received on the current connection.
    pub fn welcome(&self) -> Option<&Welcome> {
        self.welcome.as_ref()
    }

    /// Phase the outstanding `enter` waits for, if there is one.
    pub fn pending_phase(&self) -> Option<HandshakePhase> {
        self.pending.as_ref().map(|p| p.phase)
    }

    /// Start or stop the sampling timer. Returns false if it already was in
    /// the requested state.
    pub fn set_session_status(&mut self, active: bool) -> bool {
        let changed = if active {
            self.timer.start()
        } else {
            self.timer.stop()
        };
        if changed {
            tracing::info!(active, "session status changed");
        }
        changed
    }

    /// Connect if needed, then enter `world` (or just start a session).
    ///
    /// `properties` are sent as own properties right after the connection is
    /// acknowledged; they are not resent when already connected.
    pub fn enter(
        &mut self,
        bus: &mut dyn MessageBus,
        server_url: &str,
        world: Option<String>,
        properties: Vec<Delta>,
    ) -> oneshot::Receiver<EnterResult> {
        let (reply, receiver) = oneshot::channel();
        if let Some(previous) = self.pending.take() {
            tracing::debug!(phase = ?previous.phase, "replacing pending enter");
            let _ = previous.reply.send(Err(SessionError::Superseded));
        }
        match self.state {
            SessionState::Offline | SessionState::Connecting => {
                if self.state == SessionState::Offline {
                    tracing::info!(url = server_url, "connecting");
                    bus.send(OutboundMessage::Connect {
                        url: server_url.to_string(),
                    });
                    self.state = SessionState::Connecting;
                }
                self.pending = Some(PendingEnter {
                    phase: HandshakePhase::AwaitConnect,
                    properties,
                    world,
                    reply,
                });
            }
            SessionState::Connected | SessionState::EnteredWorld => match world {
                Some(world) => {
                    send_enter(bus, &world);
                    self.pending = Some(PendingEnter {
                        phase: HandshakePhase::AwaitEnter,
                        properties: Vec::new(),
                        world: Some(world),
                        reply,
                    });
                }
                None => {
                    let result = self.welcome.clone().ok_or_else(|| {
                        SessionError::Connection("no welcome received yet".into())
                    });
                    let _ = reply.send(result);
                }
            },
        }
        receiver
    }

    /// Handle a welcome. Returns the phase it completed, if any.
    pub fn on_welcome(
        &mut self,
        bus: &mut dyn MessageBus,
        welcome: Welcome,
    ) -> Option<HandshakePhase> {
        self.set_session_status(true);
        self.welcome = Some(welcome.clone());
        let Some(mut pending) = self.pending.take() else {
            if self.state == SessionState::Connecting {
                self.state = SessionState::Connected;
            }
            tracing::debug!(client = %welcome.client.id, "welcome without pending enter");
            return None;
        };
        let phase = pending.phase;
        match phase {
            HandshakePhase::AwaitConnect => {
                self.state = SessionState::Connected;
                tracing::info!(client = %welcome.client.id, "connected");
                for property in pending.properties.drain(..) {
                    bus.send(OutboundMessage::MyProperty(property));
                }
                match pending.world.clone() {
                    Some(world) => {
                        send_enter(bus, &world);
                        pending.phase = HandshakePhase::AwaitEnter;
                        self.pending = Some(pending);
                    }
                    None => {
                        bus.send(OutboundMessage::Command(Command::Session));
                        self.entered(pending, welcome);
                    }
                }
            }
            HandshakePhase::AwaitEnter => self.entered(pending, welcome),
        }
        Some(phase)
    }

    /// Handle a connection status report. Losing the connection stops the
    /// timer and fails a pending `enter`.
    pub fn on_connection(&mut self, up: bool) {
        if up {
            tracing::debug!(state = ?self.state, "connection up");
            return;
        }
        tracing::warn!(state = ?self.state, "connection lost");
        self.set_session_status(false);
        self.state = SessionState::Offline;
        self.welcome = None;
        if let Some(pending) = self.pending.take() {
            let _ = pending
                .reply
                .send(Err(SessionError::Connection("connection closed".into())));
        }
    }

    fn entered(&mut self, pending: PendingEnter, welcome: Welcome) {
        self.state = SessionState::EnteredWorld;
        tracing::info!(world = ?pending.world, "entered world");
        if pending.reply.send(Ok(welcome)).is_err() {
            tracing::debug!("enter caller went away before the welcome");
        }
    }
}

fn send_enter(bus: &mut dyn MessageBus, world: &str) {
    bus.send(OutboundMessage::Command(Command::Enter {
        world: world.to_string(),
    }));
    bus.send(OutboundMessage::Command(Command::Session));
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("online", &self.is_online())
            .field("pending", &self.pending_phase())
            .finish()
    }
}
