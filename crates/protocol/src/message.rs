use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use worldlink_common::{Delta, EntityId, SharedEntity};

/// Key under which the welcome message carries the media-streaming token.
pub const STREAMING_TOKEN: &str = "OpenVidu";

/// Server command. Serializes in the server's `{"Name": {..}}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Enter the named world.
    Enter { world: String },
    /// Start the session in the current world.
    Session,
    /// Control server-side event recording.
    Recording { action: RecordingAction },
    /// Forward a log line to the server log.
    Log {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        severity: Option<LogSeverity>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enter { .. } => "Enter",
            Self::Session => "Session",
            Self::Recording { .. } => "Recording",
            Self::Log { .. } => "Log",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingAction {
    Record,
    Stop,
    Play,
}

/// Severity of a forwarded log line. Absent means the server default (debug).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warn,
    Error,
}

/// Everything the engine sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Open the connection.
    Connect { url: String },
    /// One tick's worth of local changes.
    MyChanges(Vec<Delta>),
    /// A single own property, sent outside the sampling loop.
    MyProperty(Delta),
    Command(Command),
}

/// Identity of this client as assigned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: EntityId,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

/// Handshake acknowledgement, sent after connect and after each `Enter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    pub client: ClientInfo,
    #[serde(default)]
    pub permanents: Vec<SharedEntity>,
}

impl Welcome {
    pub fn streaming_token(&self) -> Option<&str> {
        self.client.tokens.get(STREAMING_TOKEN).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneChange {
    Added(SharedEntity),
    Removed(EntityId),
}

/// Scene membership change as seen by this session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEvent {
    pub object_id: EntityId,
    pub change: SceneChange,
    /// Number of entities in the scene after the change.
    pub scene_size: usize,
}

impl SceneEvent {
    pub fn added(entity: SharedEntity, scene_size: usize) -> Self {
        Self {
            object_id: entity.id,
            change: SceneChange::Added(entity),
            scene_size,
        }
    }

    pub fn removed(id: EntityId, scene_size: usize) -> Self {
        Self {
            object_id: id,
            change: SceneChange::Removed(id),
            scene_size,
        }
    }
}

/// Everything the server delivers to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboundEvent {
    Welcome(Welcome),
    /// Transport reports the connection as up or down.
    Connection(bool),
    Scene(SceneEvent),
    /// Field-level changes of one entity, in delivery order.
    Changes { id: EntityId, changes: Vec<Delta> },
    ServerError(String),
}
