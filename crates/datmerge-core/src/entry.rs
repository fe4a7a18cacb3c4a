//! Catalog entry types.

use std::sync::Arc;

use bitflags::bitflags;
use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString};

use crate::digest::{DigestType, Digests};
use crate::machine::{DEFAULT_MACHINE_NAME, Machine};

/// Kind of catalog item.
///
/// Declaration order is the sort order used within a machine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ItemKind {
    /// Content file inside a set.
    #[default]
    Rom,
    /// Disk image (CHD and similar).
    Disk,
    /// Auxiliary media image.
    Media,
    /// Free-text note.
    Note,
    /// Placeholder standing in for an otherwise empty machine.
    Blank,
    /// Audio sample reference.
    Sample,
    /// Release information.
    Release,
    /// BIOS set description.
    BiosSet,
    /// Reference to a device machine.
    DeviceRef,
    /// Archive container description.
    Archive,
}

/// Per-kind behavior consulted by keying, equivalence, and merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindTraits {
    /// Takes part in duplicate classification and merging.
    pub dedupes: bool,
    /// Size must agree when both sides know it.
    pub compares_size: bool,
    /// Describes real content that should carry at least one digest.
    pub carries_content: bool,
}

impl ItemKind {
    /// Dispatch table for kind-sensitive behavior.
    pub const fn traits(self) -> KindTraits {
        match self {
            Self::Rom => KindTraits {
                dedupes: true,
                compares_size: true,
                carries_content: true,
            },
            Self::Disk | Self::Media => KindTraits {
                dedupes: true,
                compares_size: false,
                carries_content: true,
            },
            Self::Note
            | Self::Blank
            | Self::Sample
            | Self::Release
            | Self::BiosSet
            | Self::DeviceRef
            | Self::Archive => KindTraits {
                dedupes: false,
                compares_size: false,
                carries_content: false,
            },
        }
    }

    /// Check if entries of this kind take part in deduplication.
    pub const fn dedupes(self) -> bool {
        self.traits().dedupes
    }
}

/// Dump status recorded by the source catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ItemStatus {
    #[default]
    None,
    Good,
    BadDump,
    /// Content exists but no verified digest is known.
    NoDump,
    Verified,
}

bitflags! {
    /// Relationship between a retained entry and the duplicates merged into it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DupeType: u8 {
        /// Duplicate from the same source and machine context.
        const INTERNAL = 1 << 0;
        /// Duplicate spanning sources, priorities, or unrelated machines.
        const EXTERNAL = 1 << 1;
        /// Machine name and entry name both match.
        const ALL = 1 << 2;
        /// Only the digests match.
        const HASH = 1 << 3;
    }
}

/// One content item belonging to one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry name, path-like for content files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CompactString>,

    /// Item kind.
    #[serde(default)]
    pub kind: ItemKind,

    /// Known digests.
    #[serde(default, skip_serializing_if = "Digests::is_empty")]
    pub digests: Digests,

    /// Size in bytes, if known.
    #[serde(
        default,
        deserialize_with = "lenient_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,

    /// Dump status.
    #[serde(default)]
    pub status: ItemStatus,

    /// Owning machine. `None` marks an entry tombstoned by upstream filtering.
    #[serde(default)]
    pub machine: Option<Arc<Machine>>,

    /// Rank of the originating catalog; lower is higher priority.
    #[serde(default)]
    pub source_priority: u32,

    /// Soft-delete flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub marked_for_removal: bool,

    /// Classification recorded when duplicates were merged into this entry.
    #[serde(default, skip_serializing_if = "DupeType::is_empty")]
    pub dupe_type: DupeType,
}

impl Entry {
    /// Create an entry of the given kind with no machine.
    pub fn new(kind: ItemKind, name: impl Into<CompactString>) -> Self {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            kind,
            digests: Digests::new(),
            size: None,
            status: ItemStatus::None,
            machine: None,
            source_priority: 0,
            marked_for_removal: false,
            dupe_type: DupeType::empty(),
        }
    }

    /// Create a content-file entry.
    pub fn rom(name: impl Into<CompactString>) -> Self {
        Self::new(ItemKind::Rom, name)
    }

    /// Create a disk-image entry.
    pub fn disk(name: impl Into<CompactString>) -> Self {
        Self::new(ItemKind::Disk, name)
    }

    /// Create a media-image entry.
    pub fn media(name: impl Into<CompactString>) -> Self {
        Self::new(ItemKind::Media, name)
    }

    /// Create a placeholder entry for a machine.
    pub fn blank(machine: Arc<Machine>) -> Self {
        Self::new(ItemKind::Blank, "").with_machine(machine)
    }

    pub fn with_digest(mut self, kind: DigestType, value: impl AsRef<str>) -> Self {
        self.digests.set(kind, value);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_machine(mut self, machine: Arc<Machine>) -> Self {
        self.machine = Some(machine);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.source_priority = priority;
        self
    }

    /// Entry name, empty when absent.
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Owning machine name for keying and sorting.
    pub fn machine_name(&self) -> &str {
        self.machine
            .as_deref()
            .map_or(DEFAULT_MACHINE_NAME, Machine::key_name)
    }

    /// Check if the status is nodump.
    pub fn is_nodump(&self) -> bool {
        self.status == ItemStatus::NoDump
    }

    /// Check if the machine reference was cleared.
    pub fn is_tombstoned(&self) -> bool {
        self.machine.is_none()
    }

    /// Check if a consumer should see this entry.
    pub fn is_visible(&self) -> bool {
        !self.marked_for_removal && !self.is_tombstoned()
    }

    /// Check if this entry is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.kind == ItemKind::Blank
    }

    /// Check if this entry can take part in duplicate classification.
    /// Nodumps and entries marked for removal never do.
    pub fn is_dedupe_candidate(&self) -> bool {
        self.kind.dedupes() && !self.is_nodump() && !self.marked_for_removal
    }

    /// Normalize data-quality problems in place.
    ///
    /// A content-carrying entry without any digest becomes nodump. Returns
    /// `true` if anything changed.
    pub fn normalize(&mut self) -> bool {
        if self.kind.traits().carries_content && self.digests.is_empty() && !self.is_nodump() {
            self.status = ItemStatus::NoDump;
            return true;
        }
        false
    }

    /// Replace machine identity and display name with those of `other`.
    pub fn adopt_identity(&mut self, other: &Entry) {
        self.machine.clone_from(&other.machine);
        self.name.clone_from(&other.name);
    }
}

/// Parse a catalog size field. Accepts decimal or `0x`-prefixed hex; anything
/// else, including negative values, is unknown.
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}

/// Whole, non-negative floats that fit in `u64`; anything else is unknown.
fn float_size(size: f64) -> Option<u64> {
    if size.is_finite() && size >= 0.0 && size.fract() == 0.0 && size < u64::MAX as f64 {
        Some(size as u64)
    } else {
        None
    }
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<RawSize>::deserialize(deserializer)? {
        Some(RawSize::Unsigned(size)) => Some(size),
        Some(RawSize::Signed(size)) => u64::try_from(size).ok(),
        Some(RawSize::Float(size)) => float_size(size),
        None => None,
        Some(RawSize::Text(text)) => parse_size(&text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_traits() {
        assert!(ItemKind::Rom.dedupes());
        assert!(ItemKind::Disk.dedupes());
        assert!(!ItemKind::Blank.dedupes());
        assert!(ItemKind::Rom.traits().compares_size);
        assert!(!ItemKind::Media.traits().compares_size);
    }

    #[test]
    fn test_normalize_marks_nodump() {
        let mut entry = Entry::rom("a.bin").with_size(16);
        assert!(entry.normalize());
        assert!(entry.is_nodump());
        assert!(!entry.normalize());

        let mut note = Entry::new(ItemKind::Note, "readme");
        assert!(!note.normalize());
        assert_eq!(note.status, ItemStatus::None);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("0x10"), Some(16));
        assert_eq!(parse_size("-1"), None);
        assert_eq!(parse_size("big"), None);
    }

    #[test]
    fn test_visibility() {
        let machine = Arc::new(Machine::new("pacman"));
        let mut entry = Entry::rom("a.bin").with_machine(machine);
        assert!(entry.is_visible());

        entry.marked_for_removal = true;
        assert!(!entry.is_visible());

        let orphan = Entry::rom("b.bin");
        assert!(orphan.is_tombstoned());
        assert!(!orphan.is_visible());
        assert_eq!(orphan.machine_name(), DEFAULT_MACHINE_NAME);
    }

    #[test]
    fn test_dupe_type_flags() {
        let dupe = DupeType::EXTERNAL | DupeType::ALL;
        assert!(dupe.contains(DupeType::EXTERNAL));
        assert!(!dupe.contains(DupeType::INTERNAL));
    }
}
