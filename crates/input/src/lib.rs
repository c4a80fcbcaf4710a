//! Embodiment input: samples the local pose (tracked mesh, viewpoint, hand
//! controllers) and turns it into minimal outbound deltas.
//!
//! # Invariants
//! - Desktop and VR share one tracker; controllers only add fields.
//! - A quantity is republished only when it leaves the tolerance band.

pub mod pose;
pub mod tracker;

pub use pose::{ArmPose, ControllerState, ManualPose, PoseSample, PoseSource, TrackedMesh, Viewpoint};
pub use tracker::{ChangeTracker, TrackedLocalState};
