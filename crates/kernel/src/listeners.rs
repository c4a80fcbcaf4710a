use std::rc::Rc;
use worldlink_common::{Delta, Field, SharedEntity};
use worldlink_scene::SceneNode;

/// Called with every published batch of local changes.
pub type MyChangeListener = dyn Fn(&[Delta]);

/// Called after each remote field has been applied to a representation.
pub type ChangeListener = dyn Fn(&SharedEntity, &Field, &SceneNode);

/// Handle returned on registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered observer list. Registering the same listener twice keeps one
/// entry and returns the original handle.
pub struct Registry<F: ?Sized> {
    next: u64,
    entries: Vec<(ListenerId, Rc<F>)>,
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Registry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` unless the same `Rc` is already registered.
    pub fn add(&mut self, listener: Rc<F>) -> ListenerId {
        if let Some((id, _)) = self.entries.iter().find(|(_, l)| Rc::ptr_eq(l, &listener)) {
            return *id;
        }
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    /// Listeners in registration order. Cloned so callers may keep mutating
    /// the owner while notifying.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<F: ?Sized> std::fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}
