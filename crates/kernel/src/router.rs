use glam::Vec3;
use std::collections::BTreeMap;
use std::rc::Rc;
use worldlink_common::{Delta, Field, SharedEntity};
use worldlink_scene::{Limb, Representation, RepresentationKind, SceneNode};

use crate::config::SyncConfig;
use crate::lifecycle::Entry;
use crate::listeners::ChangeListener;

/// Engine-wide handler for `<field>Changed` notifications.
pub type EntityOperation = Box<dyn FnMut(&SharedEntity)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Values a fresh representation starts from: motion snaps to them.
    Initial,
    /// Remote updates: motion interpolates over one tick period.
    Live,
}

/// What happened to one routed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    BuiltIn,
    Capability,
    EntityOperation,
    Ignored,
}

/// Applies remote field changes to local representations.
///
/// Built-in fields are handled directly. Anything else goes to the
/// representation's capability of the same name, then to an engine-wide
/// `<field>Changed` operation, and is otherwise logged and dropped.
pub struct RemoteChangeRouter {
    duration: f32,
    animate: bool,
    operations: BTreeMap<String, EntityOperation>,
}

impl RemoteChangeRouter {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            duration: config.tick_period().as_secs_f32(),
            animate: config.create_animations,
            operations: BTreeMap::new(),
        }
    }

    /// Register a `<field>Changed` style operation. Returns true if it
    /// replaced another.
    pub fn register_entity_operation(
        &mut self,
        name: impl Into<String>,
        operation: EntityOperation,
    ) -> bool {
        self.operations.insert(name.into(), operation).is_some()
    }

    pub fn has_entity_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Store each change on the entity and apply it to the representation,
    /// in order. Change listeners run after every field.
    pub fn route(
        &mut self,
        entry: &mut Entry,
        changes: &[Delta],
        listeners: &[Rc<ChangeListener>],
        mode: RouteMode,
    ) -> Vec<Routed> {
        let _span = tracing::debug_span!("route", entity = %entry.entity.id, ?mode).entered();
        let mut routed = Vec::with_capacity(changes.len());
        for Delta { field, value } in changes {
            if !entry.entity.apply(field, value.clone()) {
                tracing::warn!(%field, ?value, "unexpected value shape, change skipped");
                continue;
            }
            routed.push(self.apply_field(entry, field, mode));
            if let Some(node) = entry.node() {
                for listener in listeners {
                    listener(&entry.entity, field, node);
                }
            }
        }
        routed
    }

    fn apply_field(&mut self, entry: &mut Entry, field: &Field, mode: RouteMode) -> Routed {
        let Entry {
            entity,
            representation,
            parent,
            motion,
            ..
        } = entry;
        let Some(rep) = representation.as_deref_mut() else {
            return Routed::Ignored;
        };
        let animate = self.animate && mode == RouteMode::Live;
        let duration = self.duration;
        match field {
            Field::Position => {
                let target = Vec3::from(entity.position);
                motion.move_to(node_of(parent, rep), target, duration, animate);
            }
            Field::Rotation => {
                let Some(rotation) = entity.rotation else {
                    return Routed::Ignored;
                };
                if rep.kind() == RepresentationKind::ArticulatedAvatar {
                    let target = rotation.to_quat();
                    motion.rotate_to_quat(node_of(parent, rep), target, duration, animate);
                } else {
                    let target = rotation.to_euler();
                    motion.rotate_to_euler(node_of(parent, rep), target, duration, animate);
                }
            }
            Field::Scale => {
                let Some(scale) = entity.scale else {
                    return Routed::Ignored;
                };
                motion.scale_to(node_of(parent, rep), scale.into(), duration, animate);
            }
            Field::Animation => {
                if let Some(name) = &entity.animation {
                    rep.start_animation(name);
                }
            }
            // Limb data is mirrored: the sender's left is the avatar's right.
            Field::LeftArmPos => {
                if let Some(pos) = entity.left_arm_pos {
                    rep.reach_for(Limb::Right, pos.into());
                }
            }
            Field::RightArmPos => {
                if let Some(pos) = entity.right_arm_pos {
                    rep.reach_for(Limb::Left, pos.into());
                }
            }
            Field::LeftArmRot => {
                if let Some(rot) = entity.right_arm_rot {
                    rep.point_limb(Limb::Left, rot.into());
                }
            }
            Field::RightArmRot => {
                if let Some(rot) = entity.left_arm_rot {
                    rep.point_limb(Limb::Right, rot.into());
                }
            }
            Field::Name => rep.set_label(&entity.display_label()),
            Field::UserHeight => {
                if let Some(height) = entity.user_height {
                    rep.track_height(height);
                }
            }
            Field::Mesh | Field::Custom(_) => return self.dispatch(entity, rep, field),
        }
        Routed::BuiltIn
    }

    fn dispatch(
        &mut self,
        entity: &SharedEntity,
        rep: &mut dyn Representation,
        field: &Field,
    ) -> Routed {
        if rep.capabilities().invoke(field.as_str(), entity) {
            return Routed::Capability;
        }
        if let Some(operation) = self.operations.get_mut(&field.changed_operation()) {
            operation(entity);
            return Routed::EntityOperation;
        }
        tracing::debug!(%field, "no handler for field, ignored");
        Routed::Ignored
    }
}

fn node_of<'a>(parent: &'a mut Option<SceneNode>, rep: &'a mut dyn Representation) -> &'a mut SceneNode {
    match parent {
        Some(node) => node,
        None => rep.root_mut(),
    }
}

impl std::fmt::Debug for RemoteChangeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteChangeRouter")
            .field("duration", &self.duration)
            .field("animate", &self.animate)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Probe, ProbeAvatar, ready_entry};
    use glam::Quat;
    use std::cell::RefCell;
    use worldlink_common::{EntityId, FieldValue, Quaternion, Vector3};
    use worldlink_scene::MeshInstance;

    fn router() -> RemoteChangeRouter {
        RemoteChangeRouter::new(&SyncConfig::default())
    }

    #[test]
    fn position_interpolates_over_one_tick() {
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(1)),
            Box::new(MeshInstance::new(SceneNode::new("m"))),
        );
        let target = Vector3::new(10.0, 0.0, 0.0);
        let routed = router.route(
            &mut entry,
            &[Delta::new(Field::Position, target)],
            &[],
            RouteMode::Live,
        );
        assert_eq!(routed, vec![Routed::BuiltIn]);
        assert_eq!(entry.entity.position, target);
        assert_eq!(entry.node().map(|n| n.position), Some(Vec3::ZERO));
        assert_eq!(entry.motion.live(), 1);

        entry.advance(0.2);
        assert_eq!(entry.node().map(|n| n.position), Some(Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn initial_mode_snaps() {
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(1)),
            Box::new(MeshInstance::new(SceneNode::new("m"))),
        );
        router.route(
            &mut entry,
            &[Delta::new(Field::Scale, Vector3::new(2.0, 2.0, 2.0))],
            &[],
            RouteMode::Initial,
        );
        assert_eq!(entry.node().map(|n| n.scaling), Some(Vec3::splat(2.0)));
        assert_eq!(entry.motion.live(), 0);
    }

    #[test]
    fn arm_data_is_mirrored() {
        let probe = Probe::default();
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(5)),
            Box::new(ProbeAvatar::new(probe.clone())),
        );
        let left_rot = Quat::from_rotation_x(0.5);
        let right_rot = Quat::from_rotation_y(0.5);
        entry.entity.right_arm_rot = Some(Quaternion::from(right_rot));
        router.route(
            &mut entry,
            &[
                Delta::new(Field::LeftArmPos, Vector3::new(1.0, 2.0, 3.0)),
                Delta::new(Field::LeftArmRot, Quaternion::from(left_rot)),
            ],
            &[],
            RouteMode::Live,
        );
        assert_eq!(
            probe.reaches(),
            vec![(Limb::Right, Vec3::new(1.0, 2.0, 3.0))]
        );
        // left pointer takes the right arm's orientation
        assert_eq!(probe.pointers(), vec![(Limb::Left, right_rot)]);
    }

    #[test]
    fn avatar_rotation_uses_quaternion() {
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(5)),
            Box::new(ProbeAvatar::new(Probe::default())),
        );
        let q = Quat::from_rotation_y(1.0);
        router.route(
            &mut entry,
            &[Delta::new(Field::Rotation, Quaternion::from(q))],
            &[],
            RouteMode::Initial,
        );
        let node = entry.node().unwrap();
        assert!(node.orientation().angle_between(q) < 1e-4);
        assert!(node.rotation_quaternion.is_some());
    }

    #[test]
    fn animation_starts_by_name() {
        let probe = Probe::default();
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(6)),
            Box::new(ProbeAvatar::new(probe.clone())),
        );
        router.route(
            &mut entry,
            &[
                Delta::new(Field::Animation, "wave"),
                Delta::new(Field::Animation, "idle"),
            ],
            &[],
            RouteMode::Live,
        );
        assert_eq!(probe.animations(), vec!["wave".to_string(), "idle".to_string()]);
    }

    #[test]
    fn unknown_fields_fall_back_in_order() {
        let mood_calls = Rc::new(RefCell::new(Vec::new()));
        let mesh = {
            let calls = mood_calls.clone();
            MeshInstance::new(SceneNode::new("m")).with_capability(
                "mood",
                Box::new(move |e: &SharedEntity| {
                    calls.borrow_mut().push(e.properties.get("mood").cloned())
                }),
            )
        };
        let mut router = router();
        let colour_calls = Rc::new(RefCell::new(0));
        {
            let calls = colour_calls.clone();
            router.register_entity_operation(
                "colourChanged",
                Box::new(move |_: &SharedEntity| *calls.borrow_mut() += 1),
            );
        }
        let mut entry = ready_entry(SharedEntity::new(EntityId(2)), Box::new(mesh));
        let routed = router.route(
            &mut entry,
            &[
                Delta::new(Field::from("mood"), "happy"),
                Delta::new(Field::from("colour"), "red"),
                Delta::new(Field::from("weather"), "rain"),
                Delta::new(Field::Position, Vector3::new(1.0, 1.0, 1.0)),
            ],
            &[],
            RouteMode::Live,
        );
        assert_eq!(
            routed,
            vec![
                Routed::Capability,
                Routed::EntityOperation,
                Routed::Ignored,
                Routed::BuiltIn
            ]
        );
        assert_eq!(
            *mood_calls.borrow(),
            vec![Some(FieldValue::Text("happy".into()))]
        );
        assert_eq!(*colour_calls.borrow(), 1);
    }

    #[test]
    fn listeners_run_after_each_field() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let listener: Rc<ChangeListener> = {
            let seen = seen.clone();
            Rc::new(move |e: &SharedEntity, f: &Field, n: &SceneNode| {
                seen.borrow_mut().push((e.id, f.clone(), n.name.clone()))
            })
        };
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(3)),
            Box::new(MeshInstance::new(SceneNode::new("crate"))),
        );
        router.route(
            &mut entry,
            &[
                Delta::new(Field::Name, "box"),
                Delta::new(Field::from("unknown"), 1.0),
            ],
            &[listener],
            RouteMode::Live,
        );
        assert_eq!(
            *seen.borrow(),
            vec![
                (EntityId(3), Field::Name, "crate".to_string()),
                (EntityId(3), Field::from("unknown"), "crate".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_value_is_skipped() {
        let mut router = router();
        let mut entry = ready_entry(
            SharedEntity::new(EntityId(4)),
            Box::new(MeshInstance::new(SceneNode::new("m"))),
        );
        let routed = router.route(
            &mut entry,
            &[
                Delta::new(Field::Position, "not a vector"),
                Delta::new(Field::Name, "ok"),
            ],
            &[],
            RouteMode::Live,
        );
        assert_eq!(routed, vec![Routed::BuiltIn]);
        assert_eq!(entry.entity.position, Vector3::ZERO);
        assert_eq!(entry.entity.name.as_deref(), Some("ok"));
    }
}
