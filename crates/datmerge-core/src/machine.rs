//! Machine identity and lineage.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Name used for entries whose machine has no name.
pub const DEFAULT_MACHINE_NAME: &str = "Default";

/// A game/machine record shared by reference between its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    /// Short machine name (set name).
    pub name: CompactString,

    /// Human-readable description.
    #[serde(default)]
    pub description: CompactString,

    /// Parent machine this one is a clone of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_of: Option<CompactString>,

    /// Machine whose content this one borrows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rom_of: Option<CompactString>,
}

impl Machine {
    /// Create a machine with only a name.
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style description setter.
    pub fn with_description(mut self, description: impl Into<CompactString>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style parent setter.
    pub fn with_clone_of(mut self, parent: impl Into<CompactString>) -> Self {
        self.clone_of = Some(parent.into());
        self
    }

    /// Builder-style rom-of setter.
    pub fn with_rom_of(mut self, rom_of: impl Into<CompactString>) -> Self {
        self.rom_of = Some(rom_of.into());
        self
    }

    /// Name used for keying, falling back to [`DEFAULT_MACHINE_NAME`] when blank.
    pub fn key_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() {
            DEFAULT_MACHINE_NAME
        } else {
            name
        }
    }

    /// Check whether this machine is a clone or rom-of child of `other`.
    pub fn is_child_of(&self, other: &Machine) -> bool {
        self.clone_of.as_deref() == Some(other.name.as_str())
            || self.rom_of.as_deref() == Some(other.name.as_str())
    }

    /// Check whether two machines belong to the same lineage: identical names,
    /// one derived from the other, or both clones of the same parent.
    pub fn is_linked_to(&self, other: &Machine) -> bool {
        if self.name == other.name || self.is_child_of(other) || other.is_child_of(self) {
            return true;
        }
        matches!((&self.clone_of, &other.clone_of), (Some(a), Some(b)) if a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_default() {
        assert_eq!(Machine::new("  ").key_name(), DEFAULT_MACHINE_NAME);
        assert_eq!(Machine::new("pacman").key_name(), "pacman");
    }

    #[test]
    fn test_lineage() {
        let parent = Machine::new("pacman");
        let clone = Machine::new("puckman").with_clone_of("pacman");
        let sibling = Machine::new("pacmanf").with_clone_of("pacman");
        let other = Machine::new("galaga");

        assert!(clone.is_child_of(&parent));
        assert!(!parent.is_child_of(&clone));
        assert!(parent.is_linked_to(&clone));
        assert!(clone.is_linked_to(&sibling));
        assert!(!other.is_linked_to(&parent));
    }
}
