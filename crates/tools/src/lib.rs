//! Developer tooling: sync inspector and loopback collaborators.
//!
//! # Invariants
//! - Tools only read engine state or drive it through its public entry points.

pub mod inspector;
pub mod loopback;

pub use inspector::{EntityInfo, SyncInspector, SyncSummary};
pub use loopback::Loopback;

pub fn crate_info() -> &'static str {
    "worldlink-tools v0.1.0"
}
