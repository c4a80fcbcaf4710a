use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

/// A mesh followed in third-person view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedMesh {
    pub position: Vec3,
    /// Euler angles.
    pub rotation: Vec3,
    /// Collision ellipsoid radii. The mesh origin sits `ellipsoid.y` above ground.
    pub ellipsoid: Option<Vec3>,
}

impl TrackedMesh {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            ellipsoid: None,
        }
    }
}

/// The active viewpoint (camera) in first-person view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub global_position: Vec3,
    /// Euler angles.
    pub rotation: Vec3,
    /// Set by XR viewpoints, which do not maintain Euler angles.
    pub rotation_quaternion: Option<Quat>,
    /// Collision ellipsoid radii. The eye sits `2 * ellipsoid.y` above ground.
    pub ellipsoid: Option<Vec3>,
    pub ellipsoid_offset: Option<Vec3>,
}

impl Viewpoint {
    pub fn at(global_position: Vec3) -> Self {
        Self {
            global_position,
            rotation: Vec3::ZERO,
            rotation_quaternion: None,
            ellipsoid: None,
            ellipsoid_offset: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Hand controllers reported by the VR/AR helper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub left: Option<ArmPose>,
    pub right: Option<ArmPose>,
    /// Real-world height of the user as measured by the headset.
    pub real_world_height: f32,
}

/// Everything the tracker needs for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseSample {
    pub mesh: Option<TrackedMesh>,
    pub viewpoint: Option<Viewpoint>,
    pub controllers: Option<ControllerState>,
}

/// Source of the local pose, read once per tick.
pub trait PoseSource {
    fn sample(&self) -> PoseSample;
}

/// Pose source updated by the host application.
///
/// Clones share state: the host keeps one to write the pose, the engine reads
/// through another.
#[derive(Debug, Clone, Default)]
pub struct ManualPose {
    current: Rc<RefCell<PoseSample>>,
}

impl ManualPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a mesh (third-person view), or stop following with `None`.
    pub fn track_mesh(&self, mesh: Option<TrackedMesh>) {
        match (&mesh, &self.current.borrow().mesh) {
            (Some(_), _) => tracing::debug!("tracking mesh"),
            (None, Some(_)) => tracing::debug!("stopped tracking mesh"),
            (None, None) => {}
        }
        self.current.borrow_mut().mesh = mesh;
    }

    pub fn set_viewpoint(&self, viewpoint: Option<Viewpoint>) {
        self.current.borrow_mut().viewpoint = viewpoint;
    }

    pub fn set_controllers(&self, controllers: Option<ControllerState>) {
        self.current.borrow_mut().controllers = controllers;
    }

    /// Apply an arbitrary edit to the shared sample.
    pub fn update(&self, edit: impl FnOnce(&mut PoseSample)) {
        edit(&mut self.current.borrow_mut());
    }
}

impl PoseSource for ManualPose {
    fn sample(&self) -> PoseSample {
        *self.current.borrow()
    }
}
