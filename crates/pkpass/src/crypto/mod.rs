//! Credential loading and manifest signing.

pub mod cms;
pub mod credentials;

pub use cms::{manifest_bytes, sign_detached, sign_manifest, verify_detached};
pub use credentials::{CredentialRole, Credentials, PemInput, PemSource};
