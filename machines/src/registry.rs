//! System registry for host discovery.
//!
//! Each runnable system self-registers via [`inventory::submit!`] with a
//! [`SystemEntry`] carrying its name and a factory function, so hosts
//! enumerate available systems without a central list.

use crate::simple6809::Simple6809System;

/// Describes one runnable system.
pub struct SystemEntry {
    /// Name used to select this system (e.g., "simple6809").
    pub name: &'static str,
    /// Human-readable summary for listings.
    pub description: &'static str,
    /// Factory: construct the system with its default configuration.
    pub create: fn() -> Simple6809System,
}

impl SystemEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        create: fn() -> Simple6809System,
    ) -> Self {
        Self {
            name,
            description,
            create,
        }
    }
}

inventory::collect!(SystemEntry);

/// All registered systems, sorted by name.
pub fn all() -> Vec<&'static SystemEntry> {
    let mut entries: Vec<_> = inventory::iter::<SystemEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a system by name.
pub fn find(name: &str) -> Option<&'static SystemEntry> {
    inventory::iter::<SystemEntry>
        .into_iter()
        .find(|e| e.name == name)
}
