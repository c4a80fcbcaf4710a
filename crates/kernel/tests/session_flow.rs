use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;
use worldlink_assets::{
    AssetLoader, AvatarLoader, AvatarRequest, FixupProbe, LoadTicket, ProbeOutcome,
};
use worldlink_common::{Delta, EntityId, Field, SharedEntity, Vector3};
use worldlink_input::{ManualPose, Viewpoint};
use worldlink_kernel::{Collaborators, SessionState, SyncConfig, WorldManager};
use worldlink_protocol::{
    ClientInfo, Command, InboundEvent, OutboundMessage, RecordingBus, SceneEvent, Welcome,
};
use worldlink_scene::{
    Capabilities, Limb, MeshInstance, Representation, RepresentationKind, SceneNode,
};

#[derive(Clone, Default)]
struct Requests {
    objects: Rc<RefCell<Vec<(LoadTicket, EntityId)>>>,
    avatars: Rc<RefCell<Vec<(LoadTicket, AvatarRequest)>>>,
    probes: Rc<RefCell<Vec<String>>>,
}

struct Loader(Requests);

impl AssetLoader for Loader {
    fn load_object(&mut self, ticket: LoadTicket, entity: &SharedEntity) {
        self.0.objects.borrow_mut().push((ticket, entity.id));
    }
}

impl AvatarLoader for Loader {
    fn load_avatar(&mut self, ticket: LoadTicket, request: AvatarRequest) {
        self.0.avatars.borrow_mut().push((ticket, request));
    }
}

impl FixupProbe for Loader {
    fn probe(&mut self, path: &str) {
        self.0.probes.borrow_mut().push(path.to_string());
    }
}

/// Articulated avatar recording limb calls and disposals.
#[derive(Clone, Default)]
struct Limbs {
    reaches: Rc<RefCell<Vec<(Limb, Vec3)>>>,
    pointers: Rc<RefCell<Vec<(Limb, Quat)>>>,
    disposed: Rc<RefCell<u32>>,
}

struct TestAvatar {
    root: SceneNode,
    capabilities: Capabilities,
    limbs: Limbs,
}

impl Representation for TestAvatar {
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
    fn reach_for(&mut self, limb: Limb, target: Vec3) {
        self.limbs.reaches.borrow_mut().push((limb, target));
    }
    fn point_limb(&mut self, limb: Limb, orientation: Quat) {
        self.limbs.pointers.borrow_mut().push((limb, orientation));
    }
    fn dispose(&mut self) {
        *self.limbs.disposed.borrow_mut() += 1;
    }
}

struct World {
    manager: WorldManager,
    bus: RecordingBus,
    pose: ManualPose,
    requests: Requests,
}

fn world(config: SyncConfig) -> World {
    let bus = RecordingBus::new();
    let pose = ManualPose::new();
    let requests = Requests::default();
    let collaborators = Collaborators {
        assets: Box::new(Loader(requests.clone())),
        avatars: Box::new(Loader(requests.clone())),
        fixups: Box::new(Loader(requests.clone())),
    };
    let manager = WorldManager::new(
        config,
        Box::new(bus.clone()),
        Box::new(pose.clone()),
        collaborators,
    );
    World {
        manager,
        bus,
        pose,
        requests,
    }
}

fn welcome(id: u64) -> InboundEvent {
    InboundEvent::Welcome(Welcome {
        client: ClientInfo {
            id: EntityId(id),
            ..ClientInfo::default()
        },
        permanents: Vec::new(),
    })
}

fn added(entity: SharedEntity) -> InboundEvent {
    InboundEvent::Scene(SceneEvent::added(entity, 1))
}

fn changes(id: u64, changes: Vec<Delta>) -> InboundEvent {
    InboundEvent::Changes {
        id: EntityId(id),
        changes,
    }
}

/// Add an articulated avatar and drive it through probe and load.
fn load_avatar(w: &mut World, id: u64) -> Limbs {
    let entity = SharedEntity {
        has_avatar: true,
        ..SharedEntity::new(EntityId(id)).with_mesh("/babylon/dolphin/dolphin.glb")
    };
    w.manager.handle(added(entity));
    let path = w.requests.probes.borrow().last().cloned();
    if let Some(path) = path {
        w.manager.complete_fixup_probe(&path, ProbeOutcome::NotFound);
    }
    let (ticket, _) = w.requests.avatars.borrow().last().cloned().unwrap();
    let limbs = Limbs::default();
    w.manager.complete_avatar_load(
        ticket,
        Ok(Box::new(TestAvatar {
            root: SceneNode::new("dolphin"),
            capabilities: Capabilities::new(),
            limbs: limbs.clone(),
        })),
    );
    limbs
}

#[test]
fn positions_within_tolerance_send_nothing() {
    let mut w = world(SyncConfig::default());
    w.pose.set_viewpoint(Some(Viewpoint::at(Vec3::new(1.0, 1.0, 1.0))));
    w.manager.tick();
    assert_eq!(w.bus.change_batches().len(), 1);

    for step in [0.002, -0.005, 0.009, 0.0] {
        w.pose.set_viewpoint(Some(Viewpoint::at(Vec3::new(1.0 + step, 1.0, 1.0 - step))));
        w.manager.tick();
    }
    assert_eq!(w.bus.change_batches().len(), 1);
}

#[test]
fn axis_beyond_tolerance_sends_one_position() {
    let mut w = world(SyncConfig::default());
    w.pose.set_viewpoint(Some(Viewpoint::at(Vec3::ZERO)));
    w.manager.tick();
    w.bus.take();

    w.pose.set_viewpoint(Some(Viewpoint::at(Vec3::new(0.0, 0.5, 0.0))));
    w.manager.tick();
    let batches = w.bus.change_batches();
    assert_eq!(batches.len(), 1);
    let positions: Vec<_> = batches[0]
        .iter()
        .filter(|d| d.field == Field::Position)
        .collect();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].value.as_vector(), Some(Vector3::new(0.0, 0.5, 0.0)));
    assert_eq!(w.manager.tracker().state().position, Some(Vec3::new(0.0, 0.5, 0.0)));
}

#[test]
fn session_status_starts_and_stops_once() {
    let mut w = world(SyncConfig::default());
    assert!(w.manager.set_session_status(true));
    assert!(!w.manager.set_session_status(true));
    assert!(w.manager.is_online());
    assert!(w.manager.set_session_status(false));
    assert!(!w.manager.is_online());
    let timer = w.manager.session().timer();
    assert_eq!((timer.starts(), timer.stops()), (1, 1));
}

#[test]
fn mesh_at_origin_gets_default_position() {
    let mut w = world(SyncConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        w.manager.add_change_listener(Rc::new(
            move |e: &SharedEntity, f: &Field, n: &SceneNode| {
                seen.borrow_mut().push((e.id, f.clone(), e.position, n.position))
            },
        ));
    }
    w.manager
        .handle(added(SharedEntity::new(EntityId(42)).with_mesh("bot.glb")));
    let (ticket, id) = w.requests.objects.borrow()[0];
    assert_eq!(id, EntityId(42));

    w.manager.complete_object_load(
        ticket,
        Ok(Box::new(MeshInstance::new(SceneNode::new("bot")))),
    );
    let default = Vector3::new(1000.0, 1000.0, 1000.0);
    assert_eq!(
        seen.borrow().first().cloned(),
        Some((EntityId(42), Field::Position, default, Vec3::from(default)))
    );
    // the stored position is no longer treated as uninitialized
    assert_eq!(w.manager.entity(EntityId(42)).map(|e| e.position), Some(default));
}

#[test]
fn left_arm_moves_right_limb() {
    let mut w = world(SyncConfig::default());
    let limbs = load_avatar(&mut w, 11);
    w.manager.handle(changes(
        11,
        vec![Delta::new(Field::LeftArmPos, Vector3::new(1.0, 2.0, 3.0))],
    ));
    assert_eq!(
        *limbs.reaches.borrow(),
        vec![(Limb::Right, Vec3::new(1.0, 2.0, 3.0))]
    );
}

#[test]
fn unknown_fields_never_stop_processing() {
    let mut w = world(SyncConfig::default());
    let moods = Rc::new(RefCell::new(Vec::new()));
    let mesh = {
        let moods = moods.clone();
        MeshInstance::new(SceneNode::new("pet")).with_capability(
            "mood",
            Box::new(move |e: &SharedEntity| moods.borrow_mut().push(e.id)),
        )
    };
    w.manager
        .handle(added(SharedEntity::new(EntityId(5)).with_mesh("pet.glb")));
    w.manager
        .handle(added(SharedEntity::new(EntityId(6)).with_mesh("rock.glb")));
    let tickets: Vec<_> = w.requests.objects.borrow().iter().map(|(t, _)| *t).collect();
    w.manager.complete_object_load(tickets[0], Ok(Box::new(mesh)));
    w.manager.complete_object_load(
        tickets[1],
        Ok(Box::new(MeshInstance::new(SceneNode::new("rock")))),
    );

    let mood_changed = Rc::new(RefCell::new(0));
    {
        let mood_changed = mood_changed.clone();
        w.manager.register_entity_operation(
            "moodChanged",
            Box::new(move |_: &SharedEntity| *mood_changed.borrow_mut() += 1),
        );
    }

    w.manager.handle(changes(5, vec![Delta::new(Field::from("mood"), "happy")]));
    assert_eq!(*moods.borrow(), vec![EntityId(5)]);
    assert_eq!(*mood_changed.borrow(), 0);

    // no capability on the rock: falls through to the entity operation
    w.manager.handle(changes(6, vec![Delta::new(Field::from("mood"), "calm")]));
    assert_eq!(*mood_changed.borrow(), 1);

    // nothing handles this one; the following field still applies
    w.manager.handle(changes(
        6,
        vec![
            Delta::new(Field::from("sparkle"), "lots"),
            Delta::new(Field::Name, "pebble"),
        ],
    ));
    assert_eq!(
        w.manager.entity(EntityId(6)).and_then(|e| e.name.clone()),
        Some("pebble".to_string())
    );
}

#[tokio::test]
async fn enter_as_alice() {
    let mut w = world(SyncConfig {
        world_name: Some("paradise".into()),
        ..SyncConfig::default()
    });
    let rx = w.manager.enter(vec![Delta::new(Field::Name, "Alice")]);
    assert_eq!(w.manager.session_state(), SessionState::Connecting);

    w.manager.handle(welcome(77));
    w.manager.handle(welcome(77));
    let accepted = rx.await.unwrap().unwrap();
    assert_eq!(accepted.client.id, EntityId(77));
    assert_eq!(w.manager.session_state(), SessionState::EnteredWorld);
    assert!(w.manager.is_online());

    assert_eq!(
        w.bus.messages(),
        vec![
            OutboundMessage::Connect {
                url: SyncConfig::default().server_url
            },
            OutboundMessage::MyProperty(Delta::new(Field::Name, "Alice")),
            OutboundMessage::Command(Command::Enter {
                world: "paradise".into()
            }),
            OutboundMessage::Command(Command::Session),
        ]
    );

    // further welcomes do not replay the handshake
    w.manager.handle(welcome(77));
    assert_eq!(w.bus.len(), 4);
}

#[test]
fn failed_connection_rejects_enter() {
    let mut w = world(SyncConfig::default());
    let mut rx = w.manager.enter(Vec::new());
    w.manager.handle(InboundEvent::Connection(false));
    assert!(rx.try_recv().unwrap().is_err());
    assert_eq!(w.manager.session_state(), SessionState::Offline);

    // retry works
    let mut rx = w.manager.enter(Vec::new());
    w.manager.handle(welcome(1));
    assert!(rx.try_recv().unwrap().is_ok());
}

#[test]
fn removal_disposes_exactly_once() {
    let mut w = world(SyncConfig::default());
    let limbs = load_avatar(&mut w, 21);
    w.manager.handle(changes(
        21,
        vec![
            Delta::new(Field::Position, Vector3::new(3.0, 0.0, 0.0)),
            Delta::new(Field::Scale, Vector3::new(2.0, 2.0, 2.0)),
        ],
    ));
    w.manager.handle(InboundEvent::Scene(SceneEvent::removed(EntityId(21), 0)));
    w.manager.handle(InboundEvent::Scene(SceneEvent::removed(EntityId(21), 0)));
    assert_eq!(*limbs.disposed.borrow(), 1);
    assert!(w.manager.lifecycle().is_empty());
}

#[test]
fn late_load_is_discarded() {
    let mut w = world(SyncConfig::default());
    w.manager
        .handle(added(SharedEntity::new(EntityId(9)).with_mesh("slow.glb")));
    let (ticket, _) = w.requests.objects.borrow()[0];
    w.manager.handle(InboundEvent::Scene(SceneEvent::removed(EntityId(9), 0)));

    let limbs = Limbs::default();
    w.manager.complete_object_load(
        ticket,
        Ok(Box::new(TestAvatar {
            root: SceneNode::new("slow"),
            capabilities: Capabilities::new(),
            limbs: limbs.clone(),
        })),
    );
    assert_eq!(*limbs.disposed.borrow(), 1);
    assert!(w.manager.entity(EntityId(9)).is_none());
}

#[test]
fn motion_reaches_target_after_one_period() {
    let mut w = world(SyncConfig::default());
    load_avatar(&mut w, 30);
    w.manager.handle(changes(
        30,
        vec![Delta::new(Field::Position, Vector3::new(4.0, 0.0, 0.0))],
    ));
    w.manager.advance(0.1);
    let node = w.manager.lifecycle().entry(EntityId(30)).and_then(|e| e.node()).cloned();
    assert!((node.map(|n| n.position.x).unwrap_or_default() - 2.0).abs() < 1e-3);
    w.manager.advance(0.1);
    let node = w.manager.lifecycle().entry(EntityId(30)).and_then(|e| e.node()).cloned();
    assert!((node.map(|n| n.position.x).unwrap_or_default() - 4.0).abs() < 1e-3);
}
