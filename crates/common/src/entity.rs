use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::field::{Field, FieldValue};
use crate::types::{EntityId, Quaternion, Rotation, Vector3};

/// Mesh reference the server uses to mark a live video stream.
pub const VIDEO_MARKER: &str = "video";

/// How a shared entity is represented locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Rigged 3D avatar loaded from the mesh reference.
    Avatar,
    /// Video-stream avatar, no asset fetch.
    VideoStream,
    /// Generic object handed to the asset loader.
    Mesh,
}

/// An object the server shares with this session.
///
/// The struct mirrors the server's view: built-in properties have typed
/// slots, everything else lands in `properties`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedEntity {
    pub id: EntityId,
    pub class_name: String,
    /// Set by the server for clients that carry an avatar.
    pub has_avatar: bool,
    pub mesh: Option<String>,
    pub position: Vector3,
    pub rotation: Option<Rotation>,
    pub scale: Option<Vector3>,
    pub left_arm_pos: Option<Vector3>,
    pub right_arm_pos: Option<Vector3>,
    pub left_arm_rot: Option<Quaternion>,
    pub right_arm_rot: Option<Quaternion>,
    pub name: Option<String>,
    pub animation: Option<String>,
    pub user_height: Option<f32>,
    #[serde(flatten)]
    pub properties: BTreeMap<String, FieldValue>,
}

impl SharedEntity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_mesh(mut self, mesh: impl Into<String>) -> Self {
        self.mesh = Some(mesh.into());
        self
    }

    /// Classify the entity. `None` means there is nothing to instantiate yet.
    pub fn kind(&self) -> Option<EntityKind> {
        match self.mesh.as_deref() {
            Some(_) if self.has_avatar => Some(EntityKind::Avatar),
            Some(VIDEO_MARKER) => Some(EntityKind::VideoStream),
            Some(_) => Some(EntityKind::Mesh),
            None => None,
        }
    }

    /// Display name, or a generated `u<id>` when the owner never set one.
    pub fn display_label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("u{}", self.id),
        }
    }

    /// Store a new value for `field`. Returns false when the value has the
    /// wrong shape for a built-in field; the stored value is left unchanged.
    pub fn apply(&mut self, field: &Field, value: FieldValue) -> bool {
        match field {
            Field::Position => set(&mut self.position, value.as_vector()),
            Field::Rotation => set_opt(&mut self.rotation, value.as_rotation()),
            Field::Scale => set_opt(&mut self.scale, value.as_vector()),
            Field::LeftArmPos => set_opt(&mut self.left_arm_pos, value.as_vector()),
            Field::RightArmPos => set_opt(&mut self.right_arm_pos, value.as_vector()),
            Field::LeftArmRot => set_opt(&mut self.left_arm_rot, value.as_quaternion()),
            Field::RightArmRot => set_opt(&mut self.right_arm_rot, value.as_quaternion()),
            Field::Name => set_opt(&mut self.name, value.as_text().map(str::to_string)),
            Field::Animation => set_opt(&mut self.animation, value.as_text().map(str::to_string)),
            Field::Mesh => set_opt(&mut self.mesh, value.as_text().map(str::to_string)),
            Field::UserHeight => {
                set_opt(&mut self.user_height, value.as_number().map(|h| h as f32))
            }
            Field::Custom(name) => {
                self.properties.insert(name.clone(), value);
                true
            }
        }
    }

    /// Current value of `field`, if set.
    pub fn value(&self, field: &Field) -> Option<FieldValue> {
        match field {
            Field::Position => Some(self.position.into()),
            Field::Rotation => self.rotation.map(Into::into),
            Field::Scale => self.scale.map(Into::into),
            Field::LeftArmPos => self.left_arm_pos.map(Into::into),
            Field::RightArmPos => self.right_arm_pos.map(Into::into),
            Field::LeftArmRot => self.left_arm_rot.map(Into::into),
            Field::RightArmRot => self.right_arm_rot.map(Into::into),
            Field::Name => self.name.clone().map(Into::into),
            Field::Animation => self.animation.clone().map(Into::into),
            Field::Mesh => self.mesh.clone().map(Into::into),
            Field::UserHeight => self.user_height.map(|h| FieldValue::Number(f64::from(h))),
            Field::Custom(name) => self.properties.get(name).cloned(),
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}
