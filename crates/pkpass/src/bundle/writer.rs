//! `.pkpass` container output.
//!
//! Members are written in a fixed order: model assets, `pass.json`, generated
//! string tables, `signature`, then `manifest.json`. The finished archive is
//! handed back as a [`PassStream`].
//!
//! # Examples
//!
//! ```
//! use pkpass::bundle::{BundleMember, BundleWriter, CompressionLevel, MemberKind};
//!
//! let members = vec![BundleMember::new("icon.png", MemberKind::Asset, b"png".to_vec())?];
//! let stream = BundleWriter::new(CompressionLevel::NONE).write(&members, b"sig", b"{}")?;
//! assert!(!stream.is_empty());
//! # Ok::<(), pkpass::Error>(())
//! ```

use super::{BundleMember, MANIFEST_MEMBER, SIGNATURE_MEMBER};
use crate::{Error, Result};
use std::io::{self, Cursor, Read, Write};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for the pass container.
///
/// Use the provided constants for common use cases, or [`CompressionLevel::new`]
/// for custom levels.
///
/// ```
/// use pkpass::bundle::CompressionLevel;
///
/// let custom = CompressionLevel::new(12);
/// assert_eq!(custom.level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Stored members, no deflate.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn options(&self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.0 as i64))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Writes bundle members into an in-memory ZIP container.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleWriter {
    level: CompressionLevel,
}

impl BundleWriter {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    /// Write the container.
    ///
    /// `members` are ordered by [`super::MemberKind`] (assets, descriptor,
    /// string tables), keeping their relative order within a kind. The
    /// signature and manifest follow. Member content is written as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Zip`] if the archive cannot be written.
    pub fn write(
        &self,
        members: &[BundleMember],
        signature: &[u8],
        manifest_json: &[u8],
    ) -> Result<PassStream> {
        let options = self.level.options();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let mut ordered: Vec<&BundleMember> = members.iter().collect();
        ordered.sort_by_key(|member| member.kind);

        for member in ordered {
            debug!(name = %member.name, size = member.content.len(), "Writing member");
            zip.start_file(member.name.as_str(), options)
                .map_err(Error::Zip)?;
            zip.write_all(&member.content)?;
        }

        zip.start_file(SIGNATURE_MEMBER, options).map_err(Error::Zip)?;
        zip.write_all(signature)?;

        zip.start_file(MANIFEST_MEMBER, options).map_err(Error::Zip)?;
        zip.write_all(manifest_json)?;

        let cursor = zip.finish().map_err(Error::Zip)?;
        let bytes = cursor.into_inner();
        info!(members = members.len() + 2, size = bytes.len(), "Bundle finalized");

        Ok(PassStream::new(bytes))
    }
}

/// Readable `.pkpass` bytes.
///
/// Implements [`Read`] so it can be piped straight into a file or an HTTP
/// response body.
#[derive(Debug, Clone)]
pub struct PassStream {
    inner: Cursor<Vec<u8>>,
}

impl PassStream {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    /// Total size of the container in bytes.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the remaining bytes into `writer`, returning how many were copied.
    pub fn write_to<W: Write>(&mut self, mut writer: W) -> Result<u64> {
        let copied = io::copy(&mut self.inner, &mut writer)?;
        writer.flush()?;
        Ok(copied)
    }

    /// The whole container, regardless of how much has been read.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for PassStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}
