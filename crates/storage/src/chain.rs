//! Per-key version chains
//!
//! Versions are kept newest-first so the latest read is O(1) and an
//! all-versions scan emits them in the order the store contract requires.

use std::collections::VecDeque;

use keyspan_core::Timestamp;

/// One retained version of a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Encoded value
    pub value: Vec<u8>,
    /// Write-order marker
    pub timestamp: Timestamp,
}

/// Retained versions of one key, newest first
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<Version>,
}

impl VersionChain {
    /// Create a chain holding a single version
    pub fn new(version: Version) -> Self {
        let mut versions = VecDeque::with_capacity(1);
        versions.push_front(version);
        Self { versions }
    }

    /// Add a version newer than every retained one, then apply retention
    #[inline]
    pub fn push(&mut self, version: Version, max_versions: Option<usize>) {
        debug_assert!(
            self.latest().map_or(true, |v| v.timestamp < version.timestamp),
            "versions must be pushed in timestamp order"
        );
        self.versions.push_front(version);
        self.retain(max_versions);
    }

    /// Drop the oldest versions beyond `max_versions`; keeps at least one
    pub fn retain(&mut self, max_versions: Option<usize>) {
        if let Some(max) = max_versions {
            self.versions.truncate(max.max(1));
        }
    }

    /// Newest version
    #[inline]
    pub fn latest(&self) -> Option<&Version> {
        self.versions.front()
    }

    /// All versions, newest first
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// Number of retained versions
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}
