//! Error types for pass assembly.
//!
//! This module defines the [`enum@Error`] enum covering every fatal failure of
//! an assembly run: missing or unusable model directories, descriptor
//! validation, credential loading, manifest construction and signing.
//!
//! Cosmetic input problems (an invalid colour, an unmatched legacy scan-code
//! selector, an empty translation table) are never reported here. They are
//! normalized away and logged through `tracing` instead.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for pass assembly.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Every variant is fatal to the current [`crate::Project::assemble`] call; the
/// caller fixes the input and assembles again.
///
/// # Examples
///
/// ```no_run
/// use pkpass::{Error, Project};
///
/// let result = Project::new("models/coupon.pass").assemble();
/// match result {
///     Ok(stream) => println!("{} bytes", stream.into_bytes().len()),
///     Err(Error::UninitializedProject(msg)) => eprintln!("Model is incomplete: {msg}"),
///     Err(Error::InvalidCredentials(msg)) => eprintln!("Check certificates: {msg}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// The model directory is missing or cannot be listed.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// The model has no icon asset, or no bundle members at all.
    #[error("Uninitialized project: {0}")]
    UninitializedProject(String),

    /// The descriptor is not valid JSON, has no supported pass type, or lacks
    /// required fields after overrides were merged.
    #[error("Descriptor validation failed: {0}")]
    DescriptorValidationFailed(String),

    /// The value handed to the signature engine is neither an object nor a string.
    #[error("Manifest must be a JSON object or a string, got {0}")]
    ManifestTypeError(String),

    /// A certificate or key could not be loaded, classified or decrypted, a
    /// role is missing, or the key does not belong to the signer certificate.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The project configuration is incomplete (no model path, no credentials).
    #[error("Missing required input: {0}")]
    MissingRequiredInput(String),

    /// Two bundle members share a name after path normalization.
    #[error("Duplicate bundle member: {0}")]
    DuplicateMember(String),

    /// A member name is empty or climbs out of the bundle root with `..`.
    #[error("Invalid bundle member name: '{0}'")]
    InvalidMemberName(String),

    /// The signing primitive rejected its input.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP container operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
