//! Identity keys used to bucket entries.

use datmerge_core::{DigestType, Entry, IndexError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Strategy deciding which bucket an entry belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BucketStrategy {
    /// Arbitrary keys as supplied by the producer.
    #[default]
    None,
    #[strum(serialize = "crc", serialize = "crc32")]
    Crc32,
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    SpamSum,
    #[strum(serialize = "machine", serialize = "game")]
    Machine,
}

impl BucketStrategy {
    /// Digest type this strategy keys on, if any.
    pub const fn digest(self) -> Option<DigestType> {
        match self {
            Self::Crc32 => Some(DigestType::Crc32),
            Self::Md5 => Some(DigestType::Md5),
            Self::Sha1 => Some(DigestType::Sha1),
            Self::Sha256 => Some(DigestType::Sha256),
            Self::Sha384 => Some(DigestType::Sha384),
            Self::Sha512 => Some(DigestType::Sha512),
            Self::SpamSum => Some(DigestType::SpamSum),
            Self::None | Self::Machine => None,
        }
    }

    /// Strategy keying on the given digest type.
    pub const fn from_digest(digest: DigestType) -> Self {
        match digest {
            DigestType::Crc32 => Self::Crc32,
            DigestType::Md5 => Self::Md5,
            DigestType::Sha1 => Self::Sha1,
            DigestType::Sha256 => Self::Sha256,
            DigestType::Sha384 => Self::Sha384,
            DigestType::Sha512 => Self::Sha512,
            DigestType::SpamSum => Self::SpamSum,
        }
    }

    /// Parse a strategy name such as `crc`, `sha1`, or `machine`.
    pub fn from_name(name: &str) -> Result<Self, IndexError> {
        name.trim()
            .parse()
            .map_err(|_| IndexError::UnknownStrategy {
                name: name.to_string(),
            })
    }
}

/// Scope of a deduplication pass.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DedupeScope {
    /// No merging.
    #[default]
    None,
    /// Merge only entries belonging to the same machine.
    #[strum(serialize = "within-machine", serialize = "machine", serialize = "game")]
    WithinMachine,
    /// Merge any entries sharing the active identity key.
    Full,
}

impl DedupeScope {
    /// Parse a scope name such as `none`, `machine`, or `full`.
    pub fn from_name(name: &str) -> Result<Self, IndexError> {
        name.trim()
            .parse()
            .map_err(|_| IndexError::UnknownDedupeScope {
                name: name.to_string(),
            })
    }
}

/// Compute the bucket key for an entry.
///
/// Digest strategies fall back to the digest of empty content when the entry
/// lacks that digest, so unknown entries share a bucket with verified-empty
/// ones. Machine keys carry a zero-padded source priority prefix unless
/// `rename_aware` is set.
pub fn key_for(entry: &Entry, strategy: BucketStrategy, lowercase: bool, rename_aware: bool) -> String {
    let key = match strategy.digest() {
        Some(digest) => entry
            .digests
            .get(digest)
            .unwrap_or(digest.zero())
            .to_string(),
        None => machine_key(entry, rename_aware),
    };

    if lowercase { key.to_lowercase() } else { key }
}

/// Machine-qualified key, as used by [`BucketStrategy::Machine`].
pub fn machine_key(entry: &Entry, rename_aware: bool) -> String {
    if rename_aware {
        entry.machine_name().to_string()
    } else {
        format!("{:010}-{}", entry.source_priority, entry.machine_name())
    }
}
