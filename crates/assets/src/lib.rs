//! Asset loading seen from the synchronization engine.
//!
//! Loading itself (fetching, parsing glTF, building meshes) is done by
//! collaborators behind the traits in [`loader`]. The engine issues a
//! [`LoadTicket`] with every request and the collaborator reports back with
//! the same ticket, so completions for entities that are gone can be told
//! apart from live ones.
//!
//! # Layout
//! Avatar assets live in per-avatar directories:
//! ```text
//! <base>/<dir>/scene.gltf     - avatar asset
//! <base>/<dir>-fixes.json     - optional fix-up descriptor for glTF avatars
//! <base>/<dir>/bot.glb        - binary avatar asset
//! <base>/<dir>/bot-fixes.json - optional fix-up descriptor next to a .glb
//! ```

mod cache;
mod folder;
pub mod loader;

pub use cache::{FixupCache, ProbeStart};
pub use folder::{AvatarAsset, ServerFolder};
pub use loader::{
    AssetLoader, AvatarLoader, AvatarRequest, FixupProbe, LoadError, LoadTicket, ProbeOutcome,
};
