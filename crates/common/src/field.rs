use serde::{Deserialize, Serialize};

use crate::types::{Quaternion, Rotation, Vector3};

/// Name of a synchronized property.
///
/// Built-in fields get dedicated handling on both the sampling and the
/// applying side. Anything else is carried as [`Field::Custom`] and routed by
/// name, so fields introduced by the server later still flow through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    Position,
    Rotation,
    Scale,
    Animation,
    LeftArmPos,
    RightArmPos,
    LeftArmRot,
    RightArmRot,
    Name,
    UserHeight,
    Mesh,
    Custom(String),
}

impl Field {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::Scale => "scale",
            Self::Animation => "animation",
            Self::LeftArmPos => "leftArmPos",
            Self::RightArmPos => "rightArmPos",
            Self::LeftArmRot => "leftArmRot",
            Self::RightArmRot => "rightArmRot",
            Self::Name => "name",
            Self::UserHeight => "userHeight",
            Self::Mesh => "mesh",
            Self::Custom(name) => name,
        }
    }

    /// Name of the entity-level operation notified when this field changes
    /// and the representation has no operation of its own for it.
    pub fn changed_operation(&self) -> String {
        format!("{}Changed", self.as_str())
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        match name {
            "position" => Self::Position,
            "rotation" => Self::Rotation,
            "scale" => Self::Scale,
            "animation" => Self::Animation,
            "leftArmPos" => Self::LeftArmPos,
            "rightArmPos" => Self::RightArmPos,
            "leftArmRot" => Self::LeftArmRot,
            "rightArmRot" => Self::RightArmRot,
            "name" => Self::Name,
            "userHeight" => Self::UserHeight,
            "mesh" => Self::Mesh,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.as_str().to_string()
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a synchronized property. Variants are tried in declaration order
/// when decoding, so a quaternion is never mistaken for a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Quaternion(Quaternion),
    Vector(Vector3),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_vector(&self) -> Option<Vector3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<Quaternion> {
        match self {
            Self::Quaternion(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_rotation(&self) -> Option<Rotation> {
        match self {
            Self::Quaternion(q) => Some(Rotation::Quaternion(*q)),
            Self::Vector(v) => Some(Rotation::Euler(*v)),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Vector3> for FieldValue {
    fn from(v: Vector3) -> Self {
        Self::Vector(v)
    }
}

impl From<Quaternion> for FieldValue {
    fn from(q: Quaternion) -> Self {
        Self::Quaternion(q)
    }
}

impl From<Rotation> for FieldValue {
    fn from(r: Rotation) -> Self {
        match r {
            Rotation::Quaternion(q) => Self::Quaternion(q),
            Rotation::Euler(e) => Self::Vector(e),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// A `{field, value}` change record, outbound or inbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub field: Field,
    pub value: FieldValue,
}

impl Delta {
    pub fn new(field: Field, value: impl Into<FieldValue>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
