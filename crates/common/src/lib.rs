//! Shared types for the worldlink synchronization layer.
//!
//! # Invariants
//! - Types here are plain data: no I/O, no scene access.
//! - Wire shapes (`{x,y,z}`, `{x,y,z,w}`, `{field, value}`) are fixed by the server.

mod entity;
mod field;
mod types;

pub use entity::{EntityKind, SharedEntity, VIDEO_MARKER};
pub use field::{Delta, Field, FieldValue};
pub use types::{EntityId, Quaternion, Rotation, Vector3, euler_to_quat, quat_to_euler};
