//! `manifest.json` generation.
//!
//! The manifest maps every bundle member name to the lowercase hex SHA-1 of
//! its bytes. It must cover each member exactly once.

use super::{normalize_member_name, BundleMember};
use crate::{Error, Result};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use tracing::debug;

/// Builder for the manifest of a pass bundle.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: BTreeMap<String, String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash data directly
    pub fn hash_data(data: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&result);
        sha1
    }

    /// Add one member. A name that collides after normalization is an error.
    pub fn add(&mut self, name: &str, content: &[u8]) -> Result<&mut Self> {
        let name = normalize_member_name(name)?;
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateMember(name));
        }

        let digest = hex::encode(Self::hash_data(content));
        self.entries.insert(name, digest);
        Ok(self)
    }

    /// Add every member in order.
    pub fn add_members(&mut self, members: &[BundleMember]) -> Result<&mut Self> {
        for member in members {
            self.add(&member.name, &member.content)?;
        }
        Ok(self)
    }

    /// Get the number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Manifest {
        debug!(entries = self.entries.len(), "Manifest built");
        Manifest(self.entries)
    }
}

/// Finished manifest, sorted by member name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    /// Hex digest recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized `manifest.json` bytes. These exact bytes are signed and written.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Whether `content` matches the digest recorded for `name`.
    pub fn verify_member(&self, name: &str, content: &[u8]) -> bool {
        self.get(name)
            .is_some_and(|digest| digest == hex::encode(ManifestBuilder::hash_data(content)))
    }
}
