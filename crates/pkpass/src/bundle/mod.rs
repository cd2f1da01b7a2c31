//! Pass bundle members, manifest and container output.
//!
//! A finished `.pkpass` is a ZIP container holding:
//!
//! | Member | Produced by |
//! |--------|-------------|
//! | image assets, `<lang>.lproj/*` | copied from the model directory ([`model`]) |
//! | `pass.json` | the patched descriptor |
//! | `<lang>.lproj/pass.strings` | [`crate::localization`] |
//! | `manifest.json` | [`ManifestBuilder`], SHA-1 of every member above |
//! | `signature` | detached CMS over the exact `manifest.json` bytes |
//!
//! # Examples
//!
//! ```
//! use pkpass::bundle::{BundleMember, ManifestBuilder, MemberKind};
//!
//! let members = vec![
//!     BundleMember::new("icon.png", MemberKind::Asset, b"png".to_vec())?,
//!     BundleMember::new("pass.json", MemberKind::Descriptor, b"{}".to_vec())?,
//! ];
//!
//! let mut builder = ManifestBuilder::new();
//! builder.add_members(&members)?;
//! let manifest = builder.build();
//! assert_eq!(manifest.len(), 2);
//! # Ok::<(), pkpass::Error>(())
//! ```

pub mod manifest;
pub mod model;
pub mod writer;

pub use manifest::{Manifest, ManifestBuilder};
pub use model::ModelDir;
pub use writer::{BundleWriter, CompressionLevel, PassStream};

use crate::{Error, Result};

/// Descriptor member name.
pub const DESCRIPTOR_MEMBER: &str = "pass.json";

/// Manifest member name.
pub const MANIFEST_MEMBER: &str = "manifest.json";

/// Detached signature member name.
pub const SIGNATURE_MEMBER: &str = "signature";

/// Names produced by the signing step; never copied from a model.
pub fn is_meta_member(name: &str) -> bool {
    name == MANIFEST_MEMBER || name == SIGNATURE_MEMBER
}

/// Where a member came from. Ordering matches the write order of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKind {
    /// A file copied from the model directory.
    Asset,
    /// The patched `pass.json`.
    Descriptor,
    /// A generated `pass.strings` table.
    Localization,
}

/// A named byte payload queued for the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMember {
    pub name: String,
    pub kind: MemberKind,
    pub content: Vec<u8>,
}

impl BundleMember {
    /// Create a member; the name is normalized with [`normalize_member_name`].
    pub fn new(name: impl AsRef<str>, kind: MemberKind, content: Vec<u8>) -> Result<Self> {
        Ok(Self {
            name: normalize_member_name(name.as_ref())?,
            kind,
            content,
        })
    }
}

/// Normalize a member path to forward slashes, no leading `./` or `/`, no empty segments.
///
/// # Errors
///
/// Returns [`Error::InvalidMemberName`] if a segment is `..` or nothing is left.
pub fn normalize_member_name(name: &str) -> Result<String> {
    let normalized = name.replace('\\', "/");
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() || segments.contains(&"..") {
        return Err(Error::InvalidMemberName(name.to_string()));
    }
    Ok(segments.join("/"))
}
