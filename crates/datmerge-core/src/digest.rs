//! Digest types and the sparse digest set carried by every entry.

use std::collections::BTreeMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// Kind of digest a catalog may record for an entry.
///
/// Variants are ordered from weakest to strongest; `SpamSum` is a fuzzy hash
/// and never participates in strength ranking.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DigestType {
    #[strum(serialize = "crc", serialize = "crc32")]
    Crc32,
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    SpamSum,
}

impl DigestType {
    /// Digest of zero-length input for this type.
    ///
    /// Format readers synthesize zero-byte entries from the same table, so the
    /// values must never change.
    pub const fn zero(self) -> &'static str {
        match self {
            Self::Crc32 => ZERO_CRC32,
            Self::Md5 => ZERO_MD5,
            Self::Sha1 => ZERO_SHA1,
            Self::Sha256 => ZERO_SHA256,
            Self::Sha384 => ZERO_SHA384,
            Self::Sha512 => ZERO_SHA512,
            Self::SpamSum => ZERO_SPAMSUM,
        }
    }

    /// Cryptographic digests from strongest to weakest, excluding CRC32.
    pub const STRONGEST_FIRST: [DigestType; 5] = [
        Self::Sha512,
        Self::Sha384,
        Self::Sha256,
        Self::Sha1,
        Self::Md5,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

pub const ZERO_CRC32: &str = "00000000";
pub const ZERO_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
pub const ZERO_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
pub const ZERO_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
pub const ZERO_SHA384: &str = "38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da274edebfe76f65fbd51ad2f14898b95b";
pub const ZERO_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";
pub const ZERO_SPAMSUM: &str = "3::";

/// Sparse set of digests, at most one value per [`DigestType`].
///
/// Values are stored trimmed and compared case-insensitively. Blank values are
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<DigestType, CompactString>",
    into = "BTreeMap<DigestType, CompactString>"
)]
pub struct Digests {
    values: [Option<CompactString>; DigestType::COUNT],
}

impl Digests {
    /// Create an empty digest set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest set describing zero-length content.
    pub fn zero() -> Self {
        let mut digests = Self::new();
        for kind in DigestType::iter() {
            digests.set(kind, kind.zero());
        }
        digests
    }

    /// Builder-style setter.
    pub fn with(mut self, kind: DigestType, value: impl AsRef<str>) -> Self {
        self.set(kind, value);
        self
    }

    /// Set a digest, replacing any existing value. Blank input clears it.
    pub fn set(&mut self, kind: DigestType, value: impl AsRef<str>) {
        let trimmed = value.as_ref().trim();
        self.values[kind.index()] = if trimmed.is_empty() {
            None
        } else {
            Some(CompactString::from(trimmed))
        };
    }

    /// Remove a digest.
    pub fn clear(&mut self, kind: DigestType) {
        self.values[kind.index()] = None;
    }

    /// Get a digest value.
    pub fn get(&self, kind: DigestType) -> Option<&str> {
        self.values[kind.index()].as_deref()
    }

    /// Check whether a digest of this type is present.
    pub fn has(&self, kind: DigestType) -> bool {
        self.values[kind.index()].is_some()
    }

    /// Check if no digest is present at all.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Number of digests present.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Iterate present digests in [`DigestType`] order.
    pub fn iter(&self) -> impl Iterator<Item = (DigestType, &str)> {
        DigestType::iter().filter_map(|kind| self.get(kind).map(|v| (kind, v)))
    }

    /// Compare one axis: an absent value on either side matches anything.
    pub fn axis_matches(&self, other: &Self, kind: DigestType) -> bool {
        match (self.get(kind), other.get(kind)) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }

    /// Check every axis with [`Digests::axis_matches`].
    pub fn matches(&self, other: &Self) -> bool {
        DigestType::iter().all(|kind| self.axis_matches(other, kind))
    }

    /// Copy every digest `other` has that this set lacks. Present values are
    /// never overwritten. Returns the number of digests gained.
    pub fn fill_missing(&mut self, other: &Self) -> usize {
        let mut gained = 0;
        for (slot, theirs) in self.values.iter_mut().zip(other.values.iter()) {
            if slot.is_none() && theirs.is_some() {
                *slot = theirs.clone();
                gained += 1;
            }
        }
        gained
    }
}

impl From<BTreeMap<DigestType, CompactString>> for Digests {
    fn from(map: BTreeMap<DigestType, CompactString>) -> Self {
        let mut digests = Self::new();
        for (kind, value) in map {
            digests.set(kind, value);
        }
        digests
    }
}

impl From<Digests> for BTreeMap<DigestType, CompactString> {
    fn from(digests: Digests) -> Self {
        DigestType::iter()
            .zip(digests.values)
            .filter_map(|(kind, value)| value.map(|v| (kind, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_value_is_absent() {
        let digests = Digests::new().with(DigestType::Crc32, "  ");
        assert!(digests.is_empty());
        assert!(!digests.has(DigestType::Crc32));
    }

    #[test]
    fn test_axis_wildcard() {
        let a = Digests::new().with(DigestType::Crc32, "DEADBEEF");
        let b = Digests::new().with(DigestType::Sha1, ZERO_SHA1);
        assert!(a.matches(&b));

        let c = Digests::new().with(DigestType::Crc32, "deadbeef");
        assert!(a.axis_matches(&c, DigestType::Crc32));

        let d = Digests::new().with(DigestType::Crc32, "12345678");
        assert!(!a.matches(&d));
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let mut kept = Digests::new().with(DigestType::Crc32, "aaaaaaaa");
        let incoming = Digests::new()
            .with(DigestType::Crc32, "bbbbbbbb")
            .with(DigestType::Md5, ZERO_MD5);

        assert_eq!(kept.fill_missing(&incoming), 1);
        assert_eq!(kept.get(DigestType::Crc32), Some("aaaaaaaa"));
        assert_eq!(kept.get(DigestType::Md5), Some(ZERO_MD5));
    }

    #[test]
    fn test_zero_set_is_complete() {
        let zero = Digests::zero();
        assert_eq!(zero.len(), DigestType::COUNT);
        assert_eq!(zero.get(DigestType::Sha256), Some(ZERO_SHA256));
    }

    #[test]
    fn test_parse_digest_type() {
        assert_eq!("CRC".parse::<DigestType>().unwrap(), DigestType::Crc32);
        assert_eq!("sha256".parse::<DigestType>().unwrap(), DigestType::Sha256);
        assert!("whirlpool".parse::<DigestType>().is_err());
    }
}
