use std::collections::BTreeMap;

use crate::loader::LoadTicket;

/// What to do about a fix-up descriptor probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStart {
    /// Outcome already known; carries the descriptor path if it exists.
    Cached(Option<String>),
    /// No probe for this path yet: the caller must issue one.
    Issue,
    /// A probe for this path is in flight; the ticket waits for it.
    Joined,
}

/// Per-path cache of fix-up descriptor probes.
///
/// Each distinct path is probed at most once per cache lifetime. Failed
/// probes (not found, or a fetch error such as a cross-origin rejection) are
/// remembered as misses.
#[derive(Debug, Clone, Default)]
pub struct FixupCache {
    outcomes: BTreeMap<String, bool>,
    waiting: BTreeMap<String, Vec<LoadTicket>>,
}

impl FixupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest of `ticket` in the descriptor at `path`.
    pub fn start(&mut self, path: &str, ticket: LoadTicket) -> ProbeStart {
        if let Some(found) = self.outcomes.get(path) {
            return ProbeStart::Cached(found.then(|| path.to_string()));
        }
        match self.waiting.get_mut(path) {
            Some(tickets) => {
                tickets.push(ticket);
                ProbeStart::Joined
            }
            None => {
                self.waiting.insert(path.to_string(), vec![ticket]);
                ProbeStart::Issue
            }
        }
    }

    /// Record the probe outcome and return every ticket that waited on it,
    /// in registration order.
    pub fn finish(&mut self, path: &str, found: bool) -> Vec<LoadTicket> {
        if !found {
            tracing::debug!(path, "fix-up descriptor missing, caching miss");
        }
        self.outcomes.insert(path.to_string(), found);
        self.waiting.remove(path).unwrap_or_default()
    }

    /// Drop a ticket that no longer needs the probe result.
    pub fn forget(&mut self, ticket: LoadTicket) {
        for tickets in self.waiting.values_mut() {
            tickets.retain(|t| *t != ticket);
        }
    }

    pub fn is_known_missing(&self, path: &str) -> bool {
        self.outcomes.get(path) == Some(&false)
    }

    /// Number of paths cached as missing.
    pub fn misses(&self) -> usize {
        self.outcomes.values().filter(|found| !**found).count()
    }

    /// Number of paths with a probe in flight.
    pub fn in_flight(&self) -> usize {
        self.waiting.len()
    }
}
