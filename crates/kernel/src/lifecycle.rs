use std::collections::BTreeMap;
use worldlink_assets::{
    AssetLoader, AvatarAsset, AvatarLoader, AvatarRequest, FixupCache, FixupProbe, LoadError,
    LoadTicket, ProbeOutcome, ProbeStart,
};
use worldlink_common::{Delta, EntityId, EntityKind, Field, Rotation, SharedEntity};
use worldlink_scene::{
    MotionSlots, Representation, RepresentationKind, SceneNode, StreamingSubsystem,
    VideoAvatarFactory, default_video_avatar,
};

use crate::config::SyncConfig;

/// Invoked once per successful instantiation.
pub type LoadCallback = Box<dyn FnMut(&SharedEntity, &dyn Representation)>;

/// Invoked when a generic mesh or avatar fails to load.
pub type LoadErrorHandler = Box<dyn FnMut(&SharedEntity, &LoadError)>;

/// Loading collaborators handed to the engine at construction.
pub struct Collaborators {
    pub assets: Box<dyn AssetLoader>,
    pub avatars: Box<dyn AvatarLoader>,
    pub fixups: Box<dyn FixupProbe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPhase {
    /// Registered, nothing instantiated (no mesh yet, or the load failed).
    Unloaded,
    ProbingFixup(LoadTicket),
    Loading(LoadTicket),
    /// Representation attached; remote changes are routed to it.
    Ready,
}

impl EntityPhase {
    pub fn ticket(&self) -> Option<LoadTicket> {
        match self {
            Self::ProbingFixup(t) | Self::Loading(t) => Some(*t),
            _ => None,
        }
    }
}

/// Everything the engine keeps for one shared entity.
pub struct Entry {
    pub entity: SharedEntity,
    pub phase: EntityPhase,
    pub representation: Option<Box<dyn Representation>>,
    /// Transform a video display is parented under. Motion targets it
    /// instead of the display itself.
    pub parent: Option<SceneNode>,
    pub motion: MotionSlots,
}

impl Entry {
    fn new(entity: SharedEntity) -> Self {
        Self {
            entity,
            phase: EntityPhase::Unloaded,
            representation: None,
            parent: None,
            motion: MotionSlots::default(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == EntityPhase::Ready
    }

    pub fn kind(&self) -> Option<RepresentationKind> {
        self.representation.as_ref().map(|r| r.kind())
    }

    /// Node moved by position, rotation and scale changes.
    pub fn node(&self) -> Option<&SceneNode> {
        match &self.parent {
            Some(parent) => Some(parent),
            None => self.representation.as_ref().map(|r| r.root()),
        }
    }

    /// Step the entry's motion handles.
    pub fn advance(&mut self, dt: f32) {
        let Some(rep) = self.representation.as_deref_mut() else {
            return;
        };
        let node = match &mut self.parent {
            Some(parent) => parent,
            None => rep.root_mut(),
        };
        self.motion.advance(dt, node);
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("entity", &self.entity.id)
            .field("phase", &self.phase)
            .field("kind", &self.kind())
            .field("motion", &self.motion.live())
            .finish()
    }
}

/// A freshly instantiated representation waiting for its initial deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub id: EntityId,
    pub initial: Vec<Delta>,
}

/// What a removal released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub disposed: bool,
    pub released_handles: usize,
}

/// Owns every entry and drives representations from membership events
/// through loading to disposal.
///
/// Load requests carry a ticket. A completion whose ticket no longer belongs
/// to a live entry is late: the entity was removed, or reloaded, meanwhile.
pub struct ObjectLifecycleManager {
    entries: BTreeMap<EntityId, Entry>,
    tickets: BTreeMap<LoadTicket, EntityId>,
    fixups: FixupCache,
    loaders: Collaborators,
    streaming: Option<Box<dyn StreamingSubsystem>>,
    video_factory: VideoAvatarFactory,
    on_load: Option<LoadCallback>,
    on_load_error: Option<LoadErrorHandler>,
}

impl ObjectLifecycleManager {
    pub fn new(loaders: Collaborators) -> Self {
        Self {
            entries: BTreeMap::new(),
            tickets: BTreeMap::new(),
            fixups: FixupCache::new(),
            loaders,
            streaming: None,
            video_factory: default_video_avatar(),
            on_load: None,
            on_load_error: None,
        }
    }

    pub fn set_video_factory(&mut self, factory: VideoAvatarFactory) {
        self.video_factory = factory;
    }

    pub fn set_load_callback(&mut self, callback: LoadCallback) {
        self.on_load = Some(callback);
    }

    pub fn set_load_error_handler(&mut self, handler: LoadErrorHandler) {
        self.on_load_error = Some(handler);
    }

    pub fn set_streaming(&mut self, streaming: Option<Box<dyn StreamingSubsystem>>) {
        self.streaming = streaming;
    }

    pub fn streaming_mut(&mut self) -> Option<&mut (dyn StreamingSubsystem + 'static)> {
        self.streaming.as_deref_mut()
    }

    pub fn entry(&self, id: EntityId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn entry_mut(&mut self, id: EntityId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fixup_cache(&self) -> &FixupCache {
        &self.fixups
    }

    /// Loads and probes not completed yet.
    pub fn pending_loads(&self) -> usize {
        self.tickets.len()
    }

    /// Register a newly visible entity and start instantiating it.
    pub fn add(&mut self, entity: SharedEntity, config: &SyncConfig) -> Option<Loaded> {
        let id = entity.id;
        if self.entries.contains_key(&id) {
            tracing::warn!(entity = %id, "entity already registered, add ignored");
            return None;
        }
        self.entries.insert(id, Entry::new(entity));
        self.load(id, config)
    }

    /// Classify an unloaded entity and start the matching path. Video avatars
    /// are instantiated right away; everything else completes later.
    pub fn load(&mut self, id: EntityId, config: &SyncConfig) -> Option<Loaded> {
        let entry = self.entries.get_mut(&id)?;
        if entry.phase != EntityPhase::Unloaded {
            return None;
        }
        match entry.entity.kind() {
            None => {
                tracing::warn!(entity = %id, class = %entry.entity.class_name, "no mesh reference, not instantiated");
                None
            }
            Some(EntityKind::VideoStream) => self.instantiate_video(id, config),
            Some(EntityKind::Avatar) => {
                self.start_avatar(id, config);
                None
            }
            Some(EntityKind::Mesh) => {
                let ticket = LoadTicket::new();
                entry.phase = EntityPhase::Loading(ticket);
                self.tickets.insert(ticket, id);
                tracing::debug!(entity = %id, %ticket, mesh = ?entry.entity.mesh, "loading mesh");
                self.loaders.assets.load_object(ticket, &entry.entity);
                None
            }
        }
    }

    fn instantiate_video(&mut self, id: EntityId, config: &SyncConfig) -> Option<Loaded> {
        let entry = self.entries.get_mut(&id)?;
        let mut video = (self.video_factory)(&entry.entity, config.custom_options.as_ref());
        video.set_autoplay(false, false);
        video.set_label(&entry.entity.display_label());
        video.show();
        let parent = SceneNode::new(format!("Root of {id}"));
        video.root_mut().parent = Some(parent.name.clone());
        entry.parent = Some(parent);
        entry.representation = Some(video);
        apply_default_position(&mut entry.entity, config);
        apply_default_rotation(&mut entry.entity, config);
        tracing::debug!(entity = %id, "video avatar created");
        Some(Loaded {
            id,
            initial: initial_deltas(&entry.entity, &[Field::Position, Field::Rotation]),
        })
    }

    fn start_avatar(&mut self, id: EntityId, config: &SyncConfig) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        let Some(mesh) = entry.entity.mesh.as_deref() else {
            return;
        };
        let path = AvatarAsset::from_mesh_reference(mesh).fixup_path();
        let ticket = LoadTicket::new();
        entry.phase = EntityPhase::ProbingFixup(ticket);
        self.tickets.insert(ticket, id);
        match self.fixups.start(&path, ticket) {
            ProbeStart::Cached(fixes) => self.request_avatar(ticket, fixes, config),
            ProbeStart::Issue => {
                tracing::debug!(entity = %id, path, "probing fix-up descriptor");
                self.loaders.fixups.probe(&path);
            }
            ProbeStart::Joined => tracing::debug!(entity = %id, path, "waiting for fix-up probe"),
        }
    }

    fn request_avatar(&mut self, ticket: LoadTicket, fixes: Option<String>, config: &SyncConfig) {
        let Some(id) = self.tickets.get(&ticket).copied() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.phase != EntityPhase::ProbingFixup(ticket) {
            return;
        }
        let Some(mesh) = entry.entity.mesh.as_deref() else {
            return;
        };
        let asset = AvatarAsset::from_mesh_reference(mesh);
        let request = AvatarRequest {
            entity: id,
            folder: asset.folder(fixes),
            turn_around: !asset.file.to_lowercase().ends_with(".glb"),
            file: asset.file,
            fps: config.fps,
            user_height: entry.entity.user_height.unwrap_or(config.default_user_height),
            animate_arms: config.create_animations,
        };
        entry.phase = EntityPhase::Loading(ticket);
        tracing::debug!(entity = %id, %ticket, file = %request.file, "loading avatar");
        self.loaders.avatars.load_avatar(ticket, request);
    }

    /// Deliver a fix-up probe result. Every avatar waiting on `path` proceeds
    /// to load, with the descriptor if it was found.
    pub fn complete_fixup_probe(&mut self, path: &str, outcome: ProbeOutcome, config: &SyncConfig) {
        if let ProbeOutcome::Failed(reason) = &outcome {
            tracing::warn!(path, %reason, "fix-up probe failed, treating as missing");
        }
        let found = outcome.is_found();
        let fixes = found.then(|| path.to_string());
        for ticket in self.fixups.finish(path, found) {
            self.request_avatar(ticket, fixes.clone(), config);
        }
    }

    pub fn complete_object_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Box<dyn Representation>, LoadError>,
        config: &SyncConfig,
    ) -> Option<Loaded> {
        let Some(id) = self.claim(ticket) else {
            discard_late(ticket, result);
            return None;
        };
        let entry = self.entries.get_mut(&id)?;
        match result {
            Ok(representation) => {
                entry.representation = Some(representation);
                apply_default_position(&mut entry.entity, config);
                let mut fields = vec![Field::Position];
                if entry.entity.scale.is_some() {
                    fields.push(Field::Scale);
                }
                if entry.entity.rotation.is_some() {
                    fields.push(Field::Rotation);
                }
                Some(Loaded {
                    id,
                    initial: initial_deltas(&entry.entity, &fields),
                })
            }
            Err(err) => {
                self.fail(id, err);
                None
            }
        }
    }

    pub fn complete_avatar_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Box<dyn Representation>, LoadError>,
    ) -> Option<Loaded> {
        let Some(id) = self.claim(ticket) else {
            discard_late(ticket, result);
            return None;
        };
        let entry = self.entries.get_mut(&id)?;
        match result {
            Ok(representation) => {
                entry.representation = Some(representation);
                let fields = [Field::Name, Field::Position, Field::Rotation, Field::Animation];
                Some(Loaded {
                    id,
                    initial: initial_deltas(&entry.entity, &fields),
                })
            }
            Err(err) => {
                self.fail(id, err);
                None
            }
        }
    }

    /// Resolve a completion ticket to the entity still waiting for it.
    fn claim(&mut self, ticket: LoadTicket) -> Option<EntityId> {
        let entries = &self.entries;
        self.tickets.remove(&ticket).filter(|id| {
            entries
                .get(id)
                .is_some_and(|e| e.phase == EntityPhase::Loading(ticket))
        })
    }

    fn fail(&mut self, id: EntityId, err: LoadError) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.phase = EntityPhase::Unloaded;
        match self.on_load_error.as_mut() {
            Some(handler) => handler(&entry.entity, &err),
            None => tracing::warn!(entity = %id, error = %err, "load failed"),
        }
    }

    /// Mark a loaded entry ready once its initial deltas went through: bind
    /// streaming and notify the load callback.
    pub fn activate(&mut self, id: EntityId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        let Some(rep) = entry.representation.as_deref() else {
            return;
        };
        entry.phase = EntityPhase::Ready;
        if let Some(streaming) = self.streaming.as_deref_mut() {
            streaming.stream_to_mesh(id, rep.root());
        }
        if let Some(callback) = self.on_load.as_mut() {
            callback(&entry.entity, rep);
        }
        tracing::debug!(entity = %id, kind = ?rep.kind(), "entity ready");
    }

    /// Dispose everything owned for `id`. Returns `None` if it was unknown.
    pub fn remove(&mut self, id: EntityId) -> Option<Removal> {
        let mut entry = self.entries.remove(&id)?;
        if let Some(ticket) = entry.phase.ticket() {
            self.tickets.remove(&ticket);
            self.fixups.forget(ticket);
        }
        if let Some(streaming) = self.streaming.as_deref_mut() {
            streaming.remove_client(id);
        }
        let mut disposed = false;
        if let Some(mut rep) = entry.representation.take() {
            if rep.kind() == RepresentationKind::MeshInstance {
                self.loaders.assets.unload_object(id);
            }
            rep.dispose();
            disposed = true;
        }
        let released_handles = entry.motion.release();
        tracing::debug!(entity = %id, disposed, released_handles, "entity removed");
        Some(Removal {
            disposed,
            released_handles,
        })
    }

    /// Remove every entry, e.g. when the session ends.
    pub fn clear(&mut self) -> usize {
        let ids: Vec<EntityId> = self.entries.keys().copied().collect();
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }
}

/// Fill in the configured default position for an entity still at the
/// origin, so later comparisons see a real value.
fn apply_default_position(entity: &mut SharedEntity, config: &SyncConfig) {
    if entity.position.is_origin() {
        tracing::debug!(entity = %entity.id, "applying default position");
        entity.position = config.default_position;
    }
}

/// A declared rotation still at the origin is uninitialized. An absent one
/// stays absent.
fn apply_default_rotation(entity: &mut SharedEntity, config: &SyncConfig) {
    if entity.rotation.is_some_and(|r| r.is_origin()) {
        entity.rotation = Some(Rotation::Euler(config.default_rotation));
    }
}

fn initial_deltas(entity: &SharedEntity, fields: &[Field]) -> Vec<Delta> {
    fields
        .iter()
        .filter_map(|field| {
            entity.value(field).map(|value| Delta {
                field: field.clone(),
                value,
            })
        })
        .collect()
}

/// The entity went away (or was reloaded) while this load was in flight.
fn discard_late(ticket: LoadTicket, result: Result<Box<dyn Representation>, LoadError>) {
    match result {
        Ok(mut rep) => {
            tracing::warn!(%ticket, "discarding late load completion");
            rep.dispose();
        }
        Err(err) => tracing::debug!(%ticket, error = %err, "late load failure ignored"),
    }
}
