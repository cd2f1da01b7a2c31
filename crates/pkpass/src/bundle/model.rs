//! Model directory listing and reads.
//!
//! A model is a directory holding `pass.json`, image assets at the root and
//! optional `<lang>.lproj/` folders. Hidden files and stale `manifest.json` /
//! `signature` members are never picked up.

use super::{is_meta_member, normalize_member_name, DESCRIPTOR_MEMBER};
use crate::{Error, Result};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

const LPROJ_SUFFIX: &str = ".lproj";

fn icon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^icon(@\dx)?\.png$").expect("valid icon pattern"))
}

/// Whether `name` is an icon asset (`icon.png`, `icon@2x.png`, ...).
pub fn is_icon(name: &str) -> bool {
    icon_pattern().is_match(name)
}

/// Top-level entries of a model directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootListing {
    /// Plain files, sorted.
    pub files: Vec<String>,
    /// `*.lproj` folder names, sorted.
    pub lproj_dirs: Vec<String>,
}

impl RootListing {
    pub fn has_icon(&self) -> bool {
        self.files.iter().any(|name| is_icon(name))
    }

    pub fn has_descriptor(&self) -> bool {
        self.files.iter().any(|name| name == DESCRIPTOR_MEMBER)
    }

    /// Root files other than the descriptor.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|name| *name != DESCRIPTOR_MEMBER)
    }
}

/// A model directory on disk.
#[derive(Debug, Clone)]
pub struct ModelDir {
    path: PathBuf,
}

impl ModelDir {
    /// Open a model directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProjectNotFound`] if the path is missing or not a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Self {
                path: path.to_path_buf(),
            }),
            Ok(_) => Err(Error::ProjectNotFound(format!(
                "{} is not a directory",
                path.display()
            ))),
            Err(e) => Err(Error::ProjectNotFound(format!("{}: {}", path.display(), e))),
        }
    }

    /// List the top level of the model.
    pub fn list_root(&self) -> Result<RootListing> {
        let entries = fs::read_dir(&self.path)
            .map_err(|e| Error::ProjectNotFound(format!("{}: {}", self.path.display(), e)))?;

        let mut listing = RootListing::default();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if is_hidden(&name) || is_meta_member(&name) {
                debug!(name = %name, "Skipping model entry");
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if name.ends_with(LPROJ_SUFFIX) {
                    listing.lproj_dirs.push(name);
                } else {
                    debug!(name = %name, "Skipping non-localization folder");
                }
            } else if file_type.is_file() {
                listing.files.push(name);
            }
        }

        listing.files.sort();
        listing.lproj_dirs.sort();
        Ok(listing)
    }

    /// List the files inside the given `.lproj` folders as member names
    /// (`<lang>.lproj/<file>`).
    pub fn list_localized(&self, lproj_dirs: &[String]) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for dir in lproj_dirs {
            let walker = WalkDir::new(self.path.join(dir))
                .min_depth(1)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.file_name().to_str().is_some_and(|n| !is_hidden(n)));

            for entry in walker {
                let entry = entry.map_err(|e| {
                    Error::Io(io::Error::other(format!("Failed to walk {}: {}", dir, e)))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let relative = entry.path().strip_prefix(&self.path).map_err(|_| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Failed to compute relative path",
                    ))
                })?;
                names.push(normalize_member_name(&relative.to_string_lossy())?);
            }
        }

        Ok(names)
    }

    /// Read one member by name.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path.join(name))?)
    }

    /// Read every named member concurrently. All reads complete before this returns.
    pub fn read_files(&self, names: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
        names
            .par_iter()
            .map(|name| Ok((name.clone(), self.read(name)?)))
            .collect()
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
