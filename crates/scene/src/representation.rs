use glam::{Quat, Vec3};
use std::collections::BTreeMap;
use worldlink_common::SharedEntity;

use crate::node::SceneNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    ArticulatedAvatar,
    VideoAvatar,
    MeshInstance,
}

/// Limb of an articulated avatar, from the avatar's own point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limb {
    Left,
    Right,
}

/// A named operation a representation exposes to field routing. It receives
/// the entity after the field value has been stored.
pub type Capability = Box<dyn FnMut(&SharedEntity)>;

/// Named operations registered by a representation at construction.
#[derive(Default)]
pub struct Capabilities {
    handlers: BTreeMap<String, Capability>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, returning true if it replaced another.
    pub fn register(&mut self, name: impl Into<String>, handler: Capability) -> bool {
        self.handlers.insert(name.into(), handler).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the handler named `name`. Returns false if there is none.
    pub fn invoke(&mut self, name: &str, entity: &SharedEntity) -> bool {
        match self.handlers.get_mut(name) {
            Some(handler) => {
                handler(entity);
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Local stand-in for a shared entity.
///
/// Avatar-specific operations default to no-ops so plain objects only
/// implement what they have.
pub trait Representation {
    fn kind(&self) -> RepresentationKind;

    /// Node moved by position, rotation and scale changes.
    fn root(&self) -> &SceneNode;
    fn root_mut(&mut self) -> &mut SceneNode;

    fn capabilities(&mut self) -> &mut Capabilities;

    fn set_label(&mut self, _label: &str) {}

    fn start_animation(&mut self, _name: &str) {}

    /// Move the hand of `limb` towards `target`.
    fn reach_for(&mut self, _limb: Limb, _target: Vec3) {}

    /// Orient the pointer of `limb`.
    fn point_limb(&mut self, _limb: Limb, _orientation: Quat) {}

    /// Rescale proportions to the user's real-world height.
    fn track_height(&mut self, _height: f32) {}

    /// Video avatars only: whether playback starts and attaches by itself.
    fn set_autoplay(&mut self, _auto_start: bool, _auto_attach: bool) {}

    fn show(&mut self) {}

    /// Release everything the representation owns.
    fn dispose(&mut self);
}

/// Generic mesh instance produced by an asset loader.
#[derive(Debug)]
pub struct MeshInstance {
    root: SceneNode,
    capabilities: Capabilities,
    disposed: bool,
}

impl MeshInstance {
    pub fn new(root: SceneNode) -> Self {
        Self {
            root,
            capabilities: Capabilities::new(),
            disposed: false,
        }
    }

    /// Add a named operation before handing the instance to the engine.
    pub fn with_capability(mut self, name: impl Into<String>, handler: Capability) -> Self {
        self.capabilities.register(name, handler);
        self
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Representation for MeshInstance {
    fn kind(&self) -> RepresentationKind {
        RepresentationKind::MeshInstance
    }

    fn root(&self) -> &SceneNode {
        &self.root
    }

    fn root_mut(&mut self) -> &mut SceneNode {
        &mut self.root
    }

    fn capabilities(&mut self) -> &mut Capabilities {
        &mut self.capabilities
    }

    fn dispose(&mut self) {
        tracing::trace!(node = %self.root.name, "disposing mesh instance");
        self.disposed = true;
    }
}
