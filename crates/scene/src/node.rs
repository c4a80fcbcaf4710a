use glam::{Quat, Vec3};

/// Transform node of a local representation.
///
/// Rotation is kept either as Euler angles or, once set, as a quaternion that
/// takes precedence, the way scene graphs commonly do.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<String>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub rotation_quaternion: Option<Quat>,
    pub scaling: Vec3,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            rotation_quaternion: None,
            scaling: Vec3::ONE,
        }
    }

    /// Effective orientation.
    pub fn orientation(&self) -> Quat {
        self.rotation_quaternion
            .unwrap_or_else(|| worldlink_common::euler_to_quat(self.rotation))
    }
}
