use worldlink_common::{EntityId, EntityKind};
use worldlink_kernel::{EntityPhase, Entry, SessionState, WorldManager};

/// Sync inspector for developer tooling.
///
/// Read-only queries against a running engine, for debugging and status
/// output.
pub struct SyncInspector;

impl SyncInspector {
    /// Produce a summary of the engine state.
    pub fn summary(manager: &WorldManager) -> SyncSummary {
        let mut summary = SyncSummary {
            state: manager.session_state(),
            online: manager.is_online(),
            ticks: manager.ticks(),
            entities: 0,
            ready: 0,
            loading: 0,
            unloaded: 0,
            pending_loads: manager.lifecycle().pending_loads(),
            probe_misses: manager.lifecycle().fixup_cache().misses(),
            last_error: manager.last_error().map(str::to_string),
        };
        for entry in manager.lifecycle().entries() {
            summary.entities += 1;
            match entry.phase {
                EntityPhase::Ready => summary.ready += 1,
                EntityPhase::Unloaded => summary.unloaded += 1,
                EntityPhase::ProbingFixup(_) | EntityPhase::Loading(_) => summary.loading += 1,
            }
        }
        summary
    }

    pub fn inspect_entity(manager: &WorldManager, id: EntityId) -> Option<EntityInfo> {
        manager.lifecycle().entry(id).map(EntityInfo::from_entry)
    }

    /// List all known entity IDs, in ascending order.
    pub fn list_entities(manager: &WorldManager) -> Vec<EntityId> {
        let mut ids: Vec<_> = manager.lifecycle().entries().map(|e| e.entity.id).collect();
        ids.sort();
        ids
    }
}

/// Summary of engine state for the inspector.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub state: SessionState,
    pub online: bool,
    pub ticks: u64,
    pub entities: usize,
    pub ready: usize,
    pub loading: usize,
    pub unloaded: usize,
    pub pending_loads: usize,
    pub probe_misses: usize,
    pub last_error: Option<String>,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sync: state={:?} online={} ticks={} entities={} (ready={} loading={} unloaded={}) pending_loads={} probe_misses={}",
            self.state,
            self.online,
            self.ticks,
            self.entities,
            self.ready,
            self.loading,
            self.unloaded,
            self.pending_loads,
            self.probe_misses,
        )?;
        if let Some(error) = &self.last_error {
            write!(f, " last_error={error:?}")?;
        }
        Ok(())
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub label: String,
    pub kind: Option<EntityKind>,
    pub phase: &'static str,
    /// Where the server says the entity is.
    pub position: [f32; 3],
    /// Where the local representation currently is, once there is one.
    pub rendered: Option<[f32; 3]>,
}

impl EntityInfo {
    fn from_entry(entry: &Entry) -> Self {
        let p = entry.entity.position;
        Self {
            id: entry.entity.id,
            label: entry.entity.display_label(),
            kind: entry.entity.kind(),
            phase: match entry.phase {
                EntityPhase::Unloaded => "unloaded",
                EntityPhase::ProbingFixup(_) => "probing",
                EntityPhase::Loading(_) => "loading",
                EntityPhase::Ready => "ready",
            },
            position: [p.x, p.y, p.z],
            rendered: entry.node().map(|n| n.position.to_array()),
        }
    }
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entity {} '{}' {:?} [{}] pos=({:.2}, {:.2}, {:.2})",
            self.id,
            self.label,
            self.kind,
            self.phase,
            self.position[0],
            self.position[1],
            self.position[2],
        )?;
        if let Some(r) = self.rendered {
            write!(f, " rendered=({:.2}, {:.2}, {:.2})", r[0], r[1], r[2])?;
        }
        Ok(())
    }
}
