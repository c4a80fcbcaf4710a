//! Collaborator interfaces for loading.
//!
//! Every method returns immediately. Results are delivered later by calling
//! the engine's completion entry points with the ticket from the request, on
//! the engine's thread.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worldlink_common::{EntityId, SharedEntity};

use crate::folder::ServerFolder;

/// Correlates a load request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoadTicket(pub Uuid);

impl LoadTicket {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoadTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.8}", self.0.to_string())
    }
}

/// Errors reported by loading collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("asset parse error: {0}")]
    Parse(String),
    #[error("load rejected: {0}")]
    Rejected(String),
}

/// Outcome of probing for a fix-up descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    NotFound,
    /// The request itself failed (network error, cross-origin rejection).
    Failed(String),
}

impl ProbeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found)
    }
}

/// Everything an avatar loader needs to instantiate an articulated avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub entity: EntityId,
    pub folder: ServerFolder,
    pub file: String,
    /// Network frame rate, used to time limb animations.
    pub fps: u32,
    pub user_height: f32,
    pub animate_arms: bool,
    /// glTF characters face the viewer when loaded and must be turned around.
    pub turn_around: bool,
}

/// Loads generic meshes for shared entities.
pub trait AssetLoader {
    fn load_object(&mut self, ticket: LoadTicket, entity: &SharedEntity);

    /// Release whatever the loader keeps for the entity.
    fn unload_object(&mut self, _entity: EntityId) {}
}

/// Loads articulated avatars.
pub trait AvatarLoader {
    fn load_avatar(&mut self, ticket: LoadTicket, request: AvatarRequest);
}

/// Checks whether a fix-up descriptor exists (an uncached HTTP GET).
pub trait FixupProbe {
    fn probe(&mut self, path: &str);
}
