//! Local representations of shared entities.
//!
//! # Invariants
//! - The synchronization engine only touches a representation through the
//!   [`Representation`] trait and its root [`SceneNode`].
//! - Motion handles are owned per entity and dropped with it.
//!
//! # Workaround
//! Nodes are plain transform records rather than handles into a live scene
//! graph. A rendering backend copies them out each frame.

mod motion;
mod node;
mod representation;
mod streaming;
mod video;

pub use motion::{Interpolate, Interpolation, MotionSlots, RotationMotion};
pub use node::SceneNode;
pub use representation::{
    Capabilities, Capability, Limb, MeshInstance, Representation, RepresentationKind,
};
pub use streaming::StreamingSubsystem;
pub use video::{VideoAvatar, VideoAvatarFactory, default_video_avatar};
