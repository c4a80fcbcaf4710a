use std::rc::Rc;
use std::time::Instant;
use tokio::sync::oneshot;
use worldlink_assets::{LoadError, LoadTicket, ProbeOutcome};
use worldlink_common::{Delta, EntityId, Field, FieldValue, SharedEntity};
use worldlink_input::{ChangeTracker, PoseSource};
use worldlink_protocol::{
    Command, InboundEvent, MessageBus, OutboundMessage, RecordingAction, SceneChange, Welcome,
};
use worldlink_scene::{Representation, StreamingSubsystem, VideoAvatarFactory};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::lifecycle::{
    Collaborators, EntityPhase, LoadCallback, LoadErrorHandler, Loaded, ObjectLifecycleManager,
};
use crate::listeners::{ChangeListener, ListenerId, MyChangeListener, Registry};
use crate::remote_log::RemoteLogSink;
use crate::router::{EntityOperation, RemoteChangeRouter, RouteMode};
use crate::session::{EnterResult, HandshakePhase, SessionController, SessionState};

/// The synchronization engine.
///
/// Single owner, single thread: inbound events, timer ticks and collaborator
/// completions all arrive as `&mut self` calls, in the order the host makes
/// them.
pub struct WorldManager {
    config: SyncConfig,
    bus: Box<dyn MessageBus>,
    pose: Box<dyn PoseSource>,
    tracker: ChangeTracker,
    session: SessionController,
    lifecycle: ObjectLifecycleManager,
    router: RemoteChangeRouter,
    my_listeners: Registry<MyChangeListener>,
    change_listeners: Registry<ChangeListener>,
    remote_log: Option<RemoteLogSink>,
    last_error: Option<String>,
    ticks: u64,
}

impl WorldManager {
    pub fn new(
        config: SyncConfig,
        bus: Box<dyn MessageBus>,
        pose: Box<dyn PoseSource>,
        loaders: Collaborators,
    ) -> Self {
        tracing::debug!(fps = config.fps, tolerance = config.tolerance, "world manager created");
        Self {
            tracker: ChangeTracker::new(config.tolerance, config.track_rotation),
            session: SessionController::new(config.tick_period()),
            lifecycle: ObjectLifecycleManager::new(loaders),
            router: RemoteChangeRouter::new(&config),
            config,
            bus,
            pose,
            my_listeners: Registry::new(),
            change_listeners: Registry::new(),
            remote_log: None,
            last_error: None,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// World the next `enter` goes to.
    pub fn set_world(&mut self, world: Option<String>) {
        self.config.world_name = world;
    }

    /// Connect (if needed) and enter the configured world. `properties` are
    /// published as own properties once the connection is acknowledged.
    ///
    /// The receiver resolves exactly once: with the welcome, or with an error
    /// if the connection fails or a newer `enter` replaces this one.
    pub fn enter(&mut self, properties: Vec<Delta>) -> oneshot::Receiver<EnterResult> {
        self.session.enter(
            &mut *self.bus,
            &self.config.server_url,
            self.config.world_name.clone(),
            properties,
        )
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// True while local changes are being sampled and published.
    pub fn is_online(&self) -> bool {
        self.session.is_online()
    }

    /// Start or stop sampling. Repeated calls with the same value are no-ops.
    pub fn set_session_status(&mut self, active: bool) -> bool {
        self.session.set_session_status(active)
    }

    /// Dispatch one inbound event.
    pub fn handle(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Welcome(welcome) => {
                let _span = tracing::info_span!("welcome", client = %welcome.client.id).entered();
                self.on_welcome(welcome);
            }
            InboundEvent::Connection(up) => self.on_connection(up),
            InboundEvent::Scene(scene) => {
                let _span = tracing::info_span!("scene", entity = %scene.object_id).entered();
                tracing::debug!(size = scene.scene_size, "membership changed");
                match scene.change {
                    SceneChange::Added(entity) => self.admit(entity),
                    SceneChange::Removed(id) => {
                        if self.lifecycle.remove(id).is_none() {
                            tracing::debug!("removal of unknown entity");
                        }
                    }
                }
            }
            InboundEvent::Changes { id, changes } => {
                let _span = tracing::info_span!("changes", entity = %id).entered();
                self.apply_changes(id, changes);
            }
            InboundEvent::ServerError(message) => {
                tracing::warn!(%message, "server error");
                self.last_error = Some(message);
            }
        }
    }

    fn on_welcome(&mut self, welcome: Welcome) {
        let permanents = welcome.permanents.clone();
        let token = welcome.streaming_token().map(str::to_string);
        let phase = self.session.on_welcome(&mut *self.bus, welcome);
        if phase == Some(HandshakePhase::AwaitConnect) {
            if let (Some(streaming), Some(token)) = (self.lifecycle.streaming_mut(), token) {
                tracing::info!("joining media session");
                streaming.connect(&token);
                streaming.publish(self.config.auto_publish_video);
            }
        }
        if self.session.state() == SessionState::EnteredWorld && self.config.remote_logging {
            if let Some(sink) = &self.remote_log {
                sink.set_enabled(true);
            }
        }
        for entity in permanents {
            self.admit(entity);
        }
    }

    fn on_connection(&mut self, up: bool) {
        self.session.on_connection(up);
        if up {
            return;
        }
        if let Some(sink) = &self.remote_log {
            sink.set_enabled(false);
        }
        let removed = self.lifecycle.clear();
        self.tracker.reset();
        tracing::info!(removed, "session ended");
    }

    fn admit(&mut self, entity: SharedEntity) {
        if let Some(loaded) = self.lifecycle.add(entity, &self.config) {
            self.finish_load(loaded);
        }
    }

    /// Route the initial deltas of a new representation, then start routing
    /// live changes to it.
    fn finish_load(&mut self, loaded: Loaded) {
        let listeners = self.change_listeners.snapshot();
        if let Some(entry) = self.lifecycle.entry_mut(loaded.id) {
            self.router
                .route(entry, &loaded.initial, &listeners, RouteMode::Initial);
        }
        self.lifecycle.activate(loaded.id);
    }

    fn apply_changes(&mut self, id: EntityId, changes: Vec<Delta>) {
        let listeners = self.change_listeners.snapshot();
        let Some(entry) = self.lifecycle.entry_mut(id) else {
            tracing::debug!(count = changes.len(), "changes for unknown entity dropped");
            return;
        };
        if entry.is_ready() {
            self.router.route(entry, &changes, &listeners, RouteMode::Live);
            return;
        }
        // Not instantiated yet: keep the values for the initial deltas.
        let mut mesh_arrived = false;
        for Delta { field, value } in changes {
            mesh_arrived |= field == Field::Mesh;
            if !entry.entity.apply(&field, value) {
                tracing::warn!(%field, "unexpected value shape, change skipped");
            }
        }
        if mesh_arrived && entry.phase == EntityPhase::Unloaded {
            tracing::debug!("mesh reference arrived, loading");
            if let Some(loaded) = self.lifecycle.load(id, &self.config) {
                self.finish_load(loaded);
            }
        }
    }

    /// Sample the local pose and publish whatever changed.
    pub fn tick(&mut self) {
        self.ticks += 1;
        let _span = tracing::info_span!("tick", n = self.ticks).entered();
        let changes = self.tracker.sample(&self.pose.sample());
        if !changes.is_empty() {
            tracing::debug!(count = changes.len(), "publishing local changes");
            self.bus.send(OutboundMessage::MyChanges(changes.clone()));
            for listener in self.my_listeners.snapshot() {
                listener(&changes);
            }
        }
        self.flush_remote_log();
    }

    fn flush_remote_log(&mut self) {
        let Some(sink) = &self.remote_log else {
            return;
        };
        let bus = &mut self.bus;
        sink.forward(|record| {
            bus.send(OutboundMessage::Command(Command::Log {
                message: record.message,
                severity: record.severity,
            }));
        });
    }

    /// Run a tick if one is due at `now`. Returns whether it ran.
    pub fn poll_timer(&mut self, now: Instant) -> bool {
        if self.session.timer_mut().poll(now) {
            self.tick();
            true
        } else {
            false
        }
    }

    /// Step every running motion by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        for entry in self.lifecycle.entries_mut() {
            entry.advance(dt);
        }
    }

    pub fn complete_object_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Box<dyn Representation>, LoadError>,
    ) {
        if let Some(loaded) = self
            .lifecycle
            .complete_object_load(ticket, result, &self.config)
        {
            self.finish_load(loaded);
        }
    }

    pub fn complete_avatar_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Box<dyn Representation>, LoadError>,
    ) {
        if let Some(loaded) = self.lifecycle.complete_avatar_load(ticket, result) {
            self.finish_load(loaded);
        }
    }

    pub fn complete_fixup_probe(&mut self, path: &str, outcome: ProbeOutcome) {
        self.lifecycle
            .complete_fixup_probe(path, outcome, &self.config);
    }

    pub fn add_my_change_listener(&mut self, listener: Rc<MyChangeListener>) -> ListenerId {
        self.my_listeners.add(listener)
    }

    pub fn remove_my_change_listener(&mut self, id: ListenerId) -> bool {
        self.my_listeners.remove(id)
    }

    pub fn add_change_listener(&mut self, listener: Rc<ChangeListener>) -> ListenerId {
        self.change_listeners.add(listener)
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.change_listeners.remove(id)
    }

    /// Publish a single own property outside the sampling loop.
    pub fn send_my(&mut self, field: Field, value: impl Into<FieldValue>) -> Result<(), SyncError> {
        self.ensure_connected()?;
        self.bus
            .send(OutboundMessage::MyProperty(Delta::new(field, value)));
        Ok(())
    }

    pub fn recording(&mut self, action: RecordingAction) -> Result<(), SyncError> {
        self.ensure_connected()?;
        self.bus
            .send(OutboundMessage::Command(Command::Recording { action }));
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), SyncError> {
        match self.session.state() {
            SessionState::Offline | SessionState::Connecting => Err(SyncError::NotConnected),
            _ => Ok(()),
        }
    }

    pub fn set_avatar_factory(&mut self, factory: VideoAvatarFactory) {
        self.lifecycle.set_video_factory(factory);
    }

    pub fn set_load_error_handler(&mut self, handler: LoadErrorHandler) {
        self.lifecycle.set_load_error_handler(handler);
    }

    pub fn set_load_callback(&mut self, callback: LoadCallback) {
        self.lifecycle.set_load_callback(callback);
    }

    pub fn set_streaming(&mut self, streaming: Box<dyn StreamingSubsystem>) {
        self.lifecycle.set_streaming(Some(streaming));
    }

    /// Register an engine-wide `<field>Changed` operation.
    pub fn register_entity_operation(
        &mut self,
        name: impl Into<String>,
        operation: EntityOperation,
    ) -> bool {
        self.router.register_entity_operation(name, operation)
    }

    /// Forward records captured by `sink` to the server once a world is
    /// entered, if remote logging is configured.
    pub fn attach_remote_log(&mut self, sink: RemoteLogSink) {
        if self.config.remote_logging && self.session.state() == SessionState::EnteredWorld {
            sink.set_enabled(true);
        }
        self.remote_log = Some(sink);
    }

    /// Most recent error reported by the server.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn lifecycle(&self) -> &ObjectLifecycleManager {
        &self.lifecycle
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn entity(&self, id: EntityId) -> Option<&SharedEntity> {
        self.lifecycle.entry(id).map(|e| &e.entity)
    }
}

impl std::fmt::Debug for WorldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldManager")
            .field("session", &self.session)
            .field("entities", &self.lifecycle.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}
