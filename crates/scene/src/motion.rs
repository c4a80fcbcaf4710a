use glam::{Quat, Vec3};

use crate::node::SceneNode;

/// Values that can be blended between two endpoints.
pub trait Interpolate: Copy {
    fn interpolate(self, to: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(self, to: Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(self, to: Self, t: f32) -> Self {
        self.slerp(to, t)
    }
}

/// Linear motion from the value at retarget time to a target, over a fixed
/// duration. Retargeting restarts from wherever the node currently is.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation<T> {
    from: T,
    to: T,
    elapsed: f32,
    duration: f32,
}

impl<T: Interpolate> Interpolation<T> {
    /// An idle interpolation resting at `current`.
    pub fn new(current: T, duration: f32) -> Self {
        Self {
            from: current,
            to: current,
            elapsed: duration,
            duration,
        }
    }

    pub fn retarget(&mut self, current: T, target: T) {
        self.from = current;
        self.to = target;
        self.elapsed = 0.0;
    }

    /// Step forward by `dt` seconds and return the new value.
    pub fn advance(&mut self, dt: f32) -> T {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.value()
    }

    pub fn value(&self) -> T {
        if self.duration <= 0.0 {
            return self.to;
        }
        self.from.interpolate(self.to, self.elapsed / self.duration)
    }

    pub fn target(&self) -> T {
        self.to
    }

    pub fn is_running(&self) -> bool {
        self.elapsed < self.duration
    }
}

/// Rotation motion: Euler angles for plain objects, quaternions for avatars.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationMotion {
    Euler(Interpolation<Vec3>),
    Quaternion(Interpolation<Quat>),
}

/// The motion handles of one entity, created lazily on first use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSlots {
    pub translate: Option<Interpolation<Vec3>>,
    pub rotate: Option<RotationMotion>,
    pub rescale: Option<Interpolation<Vec3>>,
}

impl MotionSlots {
    pub fn move_to(&mut self, node: &mut SceneNode, target: Vec3, duration: f32, animate: bool) {
        if !animate {
            node.position = target;
            return;
        }
        self.translate
            .get_or_insert_with(|| Interpolation::new(node.position, duration))
            .retarget(node.position, target);
    }

    pub fn scale_to(&mut self, node: &mut SceneNode, target: Vec3, duration: f32, animate: bool) {
        if !animate {
            node.scaling = target;
            return;
        }
        self.rescale
            .get_or_insert_with(|| Interpolation::new(node.scaling, duration))
            .retarget(node.scaling, target);
    }

    pub fn rotate_to_euler(&mut self, node: &mut SceneNode, target: Vec3, duration: f32, animate: bool) {
        if !animate {
            node.rotation = target;
            return;
        }
        match &mut self.rotate {
            Some(RotationMotion::Euler(m)) => m.retarget(node.rotation, target),
            _ => {
                let mut m = Interpolation::new(node.rotation, duration);
                m.retarget(node.rotation, target);
                self.rotate = Some(RotationMotion::Euler(m));
            }
        }
    }

    pub fn rotate_to_quat(&mut self, node: &mut SceneNode, target: Quat, duration: f32, animate: bool) {
        if !animate {
            node.rotation_quaternion = Some(target);
            return;
        }
        let current = node.orientation();
        match &mut self.rotate {
            Some(RotationMotion::Quaternion(m)) => m.retarget(current, target),
            _ => {
                let mut m = Interpolation::new(current, duration);
                m.retarget(current, target);
                self.rotate = Some(RotationMotion::Quaternion(m));
            }
        }
    }

    /// Step every running handle and write the values into `node`.
    pub fn advance(&mut self, dt: f32, node: &mut SceneNode) {
        if let Some(m) = self.translate.as_mut().filter(|m| m.is_running()) {
            node.position = m.advance(dt);
        }
        match self.rotate.as_mut() {
            Some(RotationMotion::Euler(m)) if m.is_running() => node.rotation = m.advance(dt),
            Some(RotationMotion::Quaternion(m)) if m.is_running() => {
                node.rotation_quaternion = Some(m.advance(dt));
            }
            _ => {}
        }
        if let Some(m) = self.rescale.as_mut().filter(|m| m.is_running()) {
            node.scaling = m.advance(dt);
        }
    }

    /// Number of handles created so far.
    pub fn live(&self) -> usize {
        usize::from(self.translate.is_some())
            + usize::from(self.rotate.is_some())
            + usize::from(self.rescale.is_some())
    }

    pub fn is_running(&self) -> bool {
        let rotating = match &self.rotate {
            Some(RotationMotion::Euler(m)) => m.is_running(),
            Some(RotationMotion::Quaternion(m)) => m.is_running(),
            None => false,
        };
        rotating
            || self.translate.as_ref().is_some_and(Interpolation::is_running)
            || self.rescale.as_ref().is_some_and(Interpolation::is_running)
    }

    /// Drop every handle. Returns how many existed; slots never created are
    /// simply skipped.
    pub fn release(&mut self) -> usize {
        let released = self.live();
        *self = Self::default();
        released
    }
}
