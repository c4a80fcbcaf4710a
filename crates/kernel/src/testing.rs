//! Scripted collaborators for unit tests.

use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;
use worldlink_assets::{
    AssetLoader, AvatarLoader, AvatarRequest, FixupProbe, LoadTicket,
};
use worldlink_common::{EntityId, SharedEntity};
use worldlink_scene::{
    Capabilities, Limb, Representation, RepresentationKind, SceneNode, StreamingSubsystem,
};

use crate::lifecycle::{Collaborators, Entry, EntityPhase};

/// Everything a [`ProbeAvatar`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    reaches: Rc<RefCell<Vec<(Limb, Vec3)>>>,
    pointers: Rc<RefCell<Vec<(Limb, Quat)>>>,
    animations: Rc<RefCell<Vec<String>>>,
    disposals: Rc<RefCell<u32>>,
}

impl Probe {
    pub fn reaches(&self) -> Vec<(Limb, Vec3)> {
        self.reaches.borrow().clone()
    }

    pub fn pointers(&self) -> Vec<(Limb, Quat)> {
        self.pointers.borrow().clone()
    }

    pub fn animations(&self) -> Vec<String> {
        self.animations.borrow().clone()
    }

    pub fn disposals(&self) -> u32 {
        *self.disposals.borrow()
    }
}

/// Articulated avatar that records calls into a shared [`Probe`].
pub struct ProbeAvatar {
    root: SceneNode,
    capabilities: Capabilities,
    probe: Probe,
}

impl ProbeAvatar {
    pub fn new(probe: Probe) -> Self {
        Self {
            root: SceneNode::new("avatar"),
            capabilities: Capabilities::new(),
            probe,
        }
    }
}

impl Representation for ProbeAvatar {
    fn kind(&self) -> RepresentationKind {
        RepresentationKind::ArticulatedAvatar
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

    fn start_animation(&mut self, name: &str) {
        self.probe.animations.borrow_mut().push(name.to_string());
    }

    fn reach_for(&mut self, limb: Limb, target: Vec3) {
        self.probe.reaches.borrow_mut().push((limb, target));
    }

    fn point_limb(&mut self, limb: Limb, orientation: Quat) {
        self.probe.pointers.borrow_mut().push((limb, orientation));
    }

    fn dispose(&mut self) {
        *self.probe.disposals.borrow_mut() += 1;
    }
}

pub fn ready_entry(entity: SharedEntity, representation: Box<dyn Representation>) -> Entry {
    Entry {
        entity,
        phase: EntityPhase::Ready,
        representation: Some(representation),
        parent: None,
        motion: Default::default(),
    }
}

/// Requests seen by [`fake_collaborators`].
#[derive(Debug, Clone, Default)]
pub struct LoaderLog {
    pub objects: Rc<RefCell<Vec<(LoadTicket, EntityId)>>>,
    pub avatars: Rc<RefCell<Vec<(LoadTicket, AvatarRequest)>>>,
    pub probes: Rc<RefCell<Vec<String>>>,
    pub unloads: Rc<RefCell<Vec<EntityId>>>,
}

impl LoaderLog {
    pub fn last_object_ticket(&self) -> Option<LoadTicket> {
        self.objects.borrow().last().map(|(t, _)| *t)
    }

    pub fn last_avatar(&self) -> Option<(LoadTicket, AvatarRequest)> {
        self.avatars.borrow().last().cloned()
    }
}

struct FakeLoader(LoaderLog);

impl AssetLoader for FakeLoader {
    fn load_object(&mut self, ticket: LoadTicket, entity: &SharedEntity) {
        self.0.objects.borrow_mut().push((ticket, entity.id));
    }

    fn unload_object(&mut self, entity: EntityId) {
        self.0.unloads.borrow_mut().push(entity);
    }
}

impl AvatarLoader for FakeLoader {
    fn load_avatar(&mut self, ticket: LoadTicket, request: AvatarRequest) {
        self.0.avatars.borrow_mut().push((ticket, request));
    }
}

impl FixupProbe for FakeLoader {
    fn probe(&mut self, path: &str) {
        self.0.probes.borrow_mut().push(path.to_string());
    }
}

pub fn fake_collaborators() -> (Collaborators, LoaderLog) {
    let log = LoaderLog::default();
    let collaborators = Collaborators {
        assets: Box::new(FakeLoader(log.clone())),
        avatars: Box::new(FakeLoader(log.clone())),
        fixups: Box::new(FakeLoader(log.clone())),
    };
    (collaborators, log)
}

/// Streaming subsystem that records calls as strings.
#[derive(Debug, Clone, Default)]
pub struct FakeStreaming {
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl StreamingSubsystem for FakeStreaming {
    fn connect(&mut self, token: &str) {
        self.calls.borrow_mut().push(format!("connect {token}"));
    }

    fn publish(&mut self, video: bool) {
        self.calls.borrow_mut().push(format!("publish video={video}"));
    }

    fn stream_to_mesh(&mut self, entity: EntityId, node: &SceneNode) {
        self.calls
            .borrow_mut()
            .push(format!("stream {entity} to {}", node.name));
    }

    fn remove_client(&mut self, entity: EntityId) {
        self.calls.borrow_mut().push(format!("remove {entity}"));
    }
}
