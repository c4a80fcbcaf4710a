use glam::{Quat, Vec3};
use worldlink_common::{Delta, Field, FieldValue, Quaternion, Vector3, quat_to_euler};

use crate::pose::{ControllerState, PoseSample, TrackedMesh, Viewpoint};

/// Last values published for the local user. Every quantity stays `None`
/// until first observed, so the first sample always publishes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedLocalState {
    pub position: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub left_arm_pos: Option<Vec3>,
    pub right_arm_pos: Option<Vec3>,
    pub left_arm_rot: Option<Quat>,
    pub right_arm_rot: Option<Quat>,
    pub user_height: Option<f32>,
}

/// Diffs sampled poses against [`TrackedLocalState`].
///
/// A quantity counts as changed when any component leaves
/// `[old - tolerance, old + tolerance]`; all components are then overwritten
/// together.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    tolerance: f32,
    track_rotation: bool,
    state: TrackedLocalState,
}

impl ChangeTracker {
    pub fn new(tolerance: f32, track_rotation: bool) -> Self {
        Self {
            tolerance,
            track_rotation,
            state: TrackedLocalState::default(),
        }
    }

    pub fn state(&self) -> &TrackedLocalState {
        &self.state
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Forget everything published, e.g. after reconnecting to a fresh session.
    pub fn reset(&mut self) {
        self.state = TrackedLocalState::default();
    }

    /// Compare one sample against the published state and return the changed
    /// quantities in a fixed order: position, rotation, left arm, right arm,
    /// height.
    pub fn sample(&mut self, pose: &PoseSample) -> Vec<Delta> {
        let mut changes = Vec::new();
        if let Some(mesh) = &pose.mesh {
            self.sample_mesh(mesh, &mut changes);
        } else if let Some(viewpoint) = &pose.viewpoint {
            self.sample_viewpoint(viewpoint, &mut changes);
            if let Some(controllers) = &pose.controllers {
                self.sample_controllers(controllers, &mut changes);
            }
        }
        changes
    }

    fn sample_mesh(&mut self, mesh: &TrackedMesh, changes: &mut Vec<Delta>) {
        let mut position = mesh.position;
        if let Some(ellipsoid) = mesh.ellipsoid {
            position.y -= ellipsoid.y;
        }
        let tol = self.tolerance;
        check_vec3(Field::Position, &mut self.state.position, position, tol, changes);
        if self.track_rotation {
            check_vec3(Field::Rotation, &mut self.state.rotation, mesh.rotation, tol, changes);
        }
    }

    fn sample_viewpoint(&mut self, viewpoint: &Viewpoint, changes: &mut Vec<Delta>) {
        let mut position = viewpoint.global_position;
        if let Some(ellipsoid) = viewpoint.ellipsoid {
            position.y -= ellipsoid.y * 2.0;
            if let Some(offset) = viewpoint.ellipsoid_offset {
                position.y += offset.y;
            }
        }
        let tol = self.tolerance;
        check_vec3(Field::Position, &mut self.state.position, position, tol, changes);
        if self.track_rotation {
            let rotation = match viewpoint.rotation_quaternion {
                Some(q) => quat_to_euler(q),
                None => viewpoint.rotation,
            };
            check_vec3(Field::Rotation, &mut self.state.rotation, rotation, tol, changes);
        }
    }

    fn sample_controllers(&mut self, controllers: &ControllerState, changes: &mut Vec<Delta>) {
        let tol = self.tolerance;
        let state = &mut self.state;
        if let Some(left) = controllers.left {
            check_vec3(Field::LeftArmPos, &mut state.left_arm_pos, left.position, tol, changes);
            check_quat(Field::LeftArmRot, &mut state.left_arm_rot, left.rotation, tol, changes);
        }
        if let Some(right) = controllers.right {
            check_vec3(Field::RightArmPos, &mut state.right_arm_pos, right.position, tol, changes);
            check_quat(Field::RightArmRot, &mut state.right_arm_rot, right.rotation, tol, changes);
        }
        let height = controllers.real_world_height;
        if outside(state.user_height.map(|h| [h]).as_ref(), &[height], tol) {
            state.user_height = Some(height);
            changes.push(Delta::new(Field::UserHeight, FieldValue::Number(f64::from(height))));
        }
    }
}

fn check_vec3(field: Field, slot: &mut Option<Vec3>, value: Vec3, tol: f32, changes: &mut Vec<Delta>) {
    if outside(slot.map(|v| v.to_array()).as_ref(), &value.to_array(), tol) {
        tracing::trace!(%field, ?value, "changed");
        *slot = Some(value);
        changes.push(Delta::new(field, Vector3::from(value)));
    }
}

fn check_quat(field: Field, slot: &mut Option<Quat>, value: Quat, tol: f32, changes: &mut Vec<Delta>) {
    if outside(slot.map(|q| q.to_array()).as_ref(), &value.to_array(), tol) {
        tracing::trace!(%field, ?value, "changed");
        *slot = Some(value);
        changes.push(Delta::new(field, Quaternion::from(value)));
    }
}

/// True if any component of `new` lies outside the tolerance band around
/// `old`, or nothing was published yet.
fn outside<const N: usize>(old: Option<&[f32; N]>, new: &[f32; N], tol: f32) -> bool {
    let Some(old) = old else {
        return true;
    };
    old.iter()
        .zip(new)
        .any(|(o, v)| *v < o - tol || *v > o + tol)
}
