//! Collaborator directory: which external capabilities are available.
//!
//! Collaborators are tools, services or repositories an operation declares
//! it needs. The engine only checks availability; it never calls them.

use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Lookup of available collaborators, consulted by the validation gate.
#[cfg_attr(test, mockall::automock)]
pub trait CollaboratorDirectory: Send + Sync {
    /// Returns true if the named collaborator is available.
    fn has_collaborator(&self, name: &str) -> bool;
}

/// A directory backed by a set of names.
///
/// Names can be added after construction, e.g. once a tool probe succeeds.
#[derive(Debug, Default)]
pub struct StaticCollaboratorDirectory {
    names: RwLock<BTreeSet<String>>,
}

impl StaticCollaboratorDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory from names.
    pub fn from_names(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Marks a collaborator available.
    pub fn add(&self, name: impl Into<String>) {
        self.names.write().insert(name.into());
    }

    /// Marks a collaborator unavailable. Returns true if it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.names.write().remove(name)
    }

    /// Lists available collaborators, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names.read().iter().cloned().collect()
    }
}

impl CollaboratorDirectory for StaticCollaboratorDirectory {
    fn has_collaborator(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }
}
