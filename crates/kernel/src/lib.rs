//! World Kernel: the synchronization engine.
//!
//! Keeps the local participant's pose in sync with the session and mirrors
//! remote entities into local representations.
//!
//! # Invariants
//! - An entity has at most one representation, created after its add event
//!   and disposed before its removal completes.
//! - A tick with no change beyond tolerance sends nothing.
//! - The sampling timer starts once per session and stops once when the
//!   connection goes away; `is_online` reflects it.
//! - Collaborator completions carry the ticket of their request. A ticket that
//!   no longer matches a live entry is discarded.
//!
//! # Threading
//! Everything runs on the caller's thread through `&mut WorldManager`. Hosts
//! doing I/O on other threads hand results back with the `complete_*` calls.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listeners;
pub mod manager;
pub mod remote_log;
pub mod router;
pub mod session;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::SyncConfig;
pub use error::{SessionError, SyncError};
pub use lifecycle::{
    Collaborators, EntityPhase, Entry, LoadCallback, LoadErrorHandler, ObjectLifecycleManager,
};
pub use listeners::{ChangeListener, ListenerId, MyChangeListener, Registry};
pub use manager::WorldManager;
pub use remote_log::{RemoteLogLayer, RemoteLogRecord, RemoteLogSink};
pub use router::{EntityOperation, RemoteChangeRouter, RouteMode, Routed};
pub use session::{EnterResult, HandshakePhase, SessionController, SessionState};
pub use timer::SampleTimer;
