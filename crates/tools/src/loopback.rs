use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;
use worldlink_assets::{
    AssetLoader, AvatarLoader, AvatarRequest, FixupProbe, LoadError, LoadTicket, ProbeOutcome,
};
use worldlink_common::{EntityId, SharedEntity};
use worldlink_kernel::{Collaborators, WorldManager};
use worldlink_scene::{
    Capabilities, Limb, MeshInstance, Representation, RepresentationKind, SceneNode,
};

#[derive(Debug, Clone, PartialEq)]
enum Request {
    Object {
        ticket: LoadTicket,
        entity: EntityId,
        mesh: String,
    },
    Avatar {
        ticket: LoadTicket,
        request: AvatarRequest,
    },
    Probe(String),
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<Request>,
    /// Mesh references that fail with `NotFound`.
    missing: BTreeSet<String>,
    /// Fix-up descriptors that exist.
    fixups: BTreeSet<String>,
    unloaded: Vec<EntityId>,
}

/// In-process stand-in for the asset, avatar and fix-up collaborators.
///
/// Requests are queued and answered on [`Loopback::pump`]: objects become
/// [`MeshInstance`]s, avatars become [`Puppet`]s. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    state: Rc<RefCell<State>>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `mesh` fail.
    pub fn with_missing(self, mesh: impl Into<String>) -> Self {
        self.state.borrow_mut().missing.insert(mesh.into());
        self
    }

    /// Make the fix-up probe for `path` succeed.
    pub fn with_fixup(self, path: impl Into<String>) -> Self {
        self.state.borrow_mut().fixups.insert(path.into());
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            assets: Box::new(self.clone()),
            avatars: Box::new(self.clone()),
            fixups: Box::new(self.clone()),
        }
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Entities whose loader resources were released.
    pub fn unloaded(&self) -> Vec<EntityId> {
        self.state.borrow().unloaded.clone()
    }

    /// Answer queued requests until none are left, including the avatar
    /// loads that answered probes issue. Returns how many were answered.
    pub fn pump(&self, manager: &mut WorldManager) -> usize {
        let mut answered = 0;
        loop {
            let next = self.state.borrow_mut().queue.pop_front();
            let Some(request) = next else {
                break;
            };
            answered += 1;
            match request {
                Request::Object {
                    ticket,
                    entity,
                    mesh,
                } => {
                    let missing = self.state.borrow().missing.contains(&mesh);
                    let result: Result<Box<dyn Representation>, LoadError> = if missing {
                        Err(LoadError::NotFound(mesh))
                    } else {
                        Ok(Box::new(MeshInstance::new(SceneNode::new(format!(
                            "{mesh}#{entity}"
                        )))))
                    };
                    manager.complete_object_load(ticket, result);
                }
                Request::Avatar { ticket, request } => {
                    let missing = self.state.borrow().missing.contains(&request.file);
                    let result: Result<Box<dyn Representation>, LoadError> = if missing {
                        Err(LoadError::NotFound(request.file))
                    } else {
                        Ok(Box::new(Puppet::new(&request)))
                    };
                    manager.complete_avatar_load(ticket, result);
                }
                Request::Probe(path) => {
                    let outcome = if self.state.borrow().fixups.contains(&path) {
                        ProbeOutcome::Found
                    } else {
                        ProbeOutcome::NotFound
                    };
                    manager.complete_fixup_probe(&path, outcome);
                }
            }
        }
        answered
    }

    fn push(&self, request: Request) {
        tracing::trace!(?request, "queued");
        self.state.borrow_mut().queue.push_back(request);
    }
}

impl AssetLoader for Loopback {
    fn load_object(&mut self, ticket: LoadTicket, entity: &SharedEntity) {
        self.push(Request::Object {
            ticket,
            entity: entity.id,
            mesh: entity.mesh.clone().unwrap_or_default(),
        });
    }

    fn unload_object(&mut self, entity: EntityId) {
        self.state.borrow_mut().unloaded.push(entity);
    }
}

impl AvatarLoader for Loopback {
    fn load_avatar(&mut self, ticket: LoadTicket, request: AvatarRequest) {
        self.push(Request::Avatar { ticket, request });
    }
}

impl FixupProbe for Loopback {
    fn probe(&mut self, path: &str) {
        self.push(Request::Probe(path.to_string()));
    }
}

/// Articulated avatar without a skeleton. Remembers the last pose it was
/// asked to take.
#[derive(Debug)]
pub struct Puppet {
    root: SceneNode,
    capabilities: Capabilities,
    pub label: String,
    pub animation: Option<String>,
    pub reaches: [Option<Vec3>; 2],
    pub pointing: [Option<Quat>; 2],
    pub height: f32,
}

impl Puppet {
    pub fn new(request: &AvatarRequest) -> Self {
        Self {
            root: SceneNode::new(request.file.clone()),
            capabilities: Capabilities::new(),
            label: String::new(),
            animation: None,
            reaches: [None; 2],
            pointing: [None; 2],
            height: request.user_height,
        }
    }
}

fn slot(limb: Limb) -> usize {
    match limb {
        Limb::Left => 0,
        Limb::Right => 1,
    }
}

impl Representation for Puppet {
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

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn start_animation(&mut self, name: &str) {
        self.animation = Some(name.to_string());
    }

    fn reach_for(&mut self, limb: Limb, target: Vec3) {
        self.reaches[slot(limb)] = Some(target);
    }

    fn point_limb(&mut self, limb: Limb, orientation: Quat) {
        self.pointing[slot(limb)] = Some(orientation);
    }

    fn track_height(&mut self, height: f32) {
        self.height = height;
    }

    fn dispose(&mut self) {
        tracing::trace!(avatar = %self.root.name, "puppet disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldlink_common::{Delta, Field, Vector3};
    use worldlink_input::ManualPose;
    use worldlink_kernel::SyncConfig;
    use worldlink_protocol::{InboundEvent, RecordingBus, SceneEvent};

    fn manager(loopback: &Loopback) -> WorldManager {
        WorldManager::new(
            SyncConfig::default(),
            Box::new(RecordingBus::new()),
            Box::new(ManualPose::new()),
            loopback.collaborators(),
        )
    }

    fn add(manager: &mut WorldManager, entity: SharedEntity) {
        manager.handle(InboundEvent::Scene(SceneEvent::added(entity, 1)));
    }

    #[test]
    fn pump_instantiates_meshes_and_avatars() {
        let loopback = Loopback::new();
        let mut manager = manager(&loopback);
        add(&mut manager, SharedEntity::new(EntityId(1)).with_mesh("chair.glb"));
        add(
            &mut manager,
            SharedEntity {
                has_avatar: true,
                ..SharedEntity::new(EntityId(2)).with_mesh("/babylon/girl/girl.glb")
            },
        );
        assert_eq!(loopback.pending(), 2);

        // the probe answer queues the avatar load, which is answered too
        assert_eq!(loopback.pump(&mut manager), 3);
        assert_eq!(loopback.pending(), 0);
        assert!(manager.lifecycle().entries().all(|e| e.is_ready()));
        assert_eq!(manager.lifecycle().pending_loads(), 0);
    }

    #[test]
    fn missing_meshes_fail_and_removal_unloads() {
        let loopback = Loopback::new().with_missing("gone.glb");
        let mut manager = manager(&loopback);
        add(&mut manager, SharedEntity::new(EntityId(1)).with_mesh("gone.glb"));
        add(&mut manager, SharedEntity::new(EntityId(2)).with_mesh("here.glb"));
        loopback.pump(&mut manager);

        let ready: Vec<_> = manager
            .lifecycle()
            .entries()
            .filter(|e| e.is_ready())
            .map(|e| e.entity.id)
            .collect();
        assert_eq!(ready, vec![EntityId(2)]);

        manager.handle(InboundEvent::Scene(SceneEvent::removed(EntityId(2), 1)));
        assert_eq!(loopback.unloaded(), vec![EntityId(2)]);
    }

    #[test]
    fn puppet_follows_limb_changes() {
        let loopback = Loopback::new();
        let mut manager = manager(&loopback);
        add(
            &mut manager,
            SharedEntity {
                has_avatar: true,
                ..SharedEntity::new(EntityId(3)).with_mesh("/babylon/girl/girl.glb")
            },
        );
        loopback.pump(&mut manager);
        manager.handle(InboundEvent::Changes {
            id: EntityId(3),
            changes: vec![Delta::new(Field::RightArmPos, Vector3::new(0.5, 1.5, 0.0))],
        });
        let kind = manager.lifecycle().entry(EntityId(3)).and_then(|e| e.kind());
        assert_eq!(kind, Some(RepresentationKind::ArticulatedAvatar));
    }
}
