use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a shared entity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position, scale or Euler rotation as it travels over the wire (`{x, y, z}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// All components exactly zero. The server reports fresh entities at the
    /// origin before the owning client has published anything.
    pub fn is_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// A rotation quaternion on the wire (`{x, y, z, w}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quat::IDENTITY.into()
    }
}

impl From<Quat> for Quaternion {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl From<Quaternion> for Quat {
    fn from(q: Quaternion) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

/// Rotation of a shared entity: Euler angles from desktop viewpoints, a
/// quaternion from XR devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rotation {
    Quaternion(Quaternion),
    Euler(Vector3),
}

impl Rotation {
    pub fn to_quat(&self) -> Quat {
        match self {
            Self::Quaternion(q) => (*q).into(),
            Self::Euler(e) => euler_to_quat(Vec3::from(*e)),
        }
    }

    pub fn to_euler(&self) -> Vec3 {
        match self {
            Self::Quaternion(q) => quat_to_euler(Quat::from(*q)),
            Self::Euler(e) => Vec3::from(*e),
        }
    }

    /// Euler rotation with all angles zero. Quaternions are never treated as
    /// uninitialized.
    pub fn is_origin(&self) -> bool {
        matches!(self, Self::Euler(e) if e.is_origin())
    }
}

/// Euler angles (x = pitch, y = yaw, z = roll, applied yaw first) to a quaternion.
pub fn euler_to_quat(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z)
}

/// Inverse of [`euler_to_quat`].
pub fn quat_to_euler(q: Quat) -> Vec3 {
    let (y, x, z) = q.to_euler(EulerRot::YXZ);
    Vec3::new(x, y, z)
}
