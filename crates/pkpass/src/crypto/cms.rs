//! Detached CMS signature over the pass manifest.
//!
//! The signature is a PKCS#7/CMS `SignedData` structure that binds the exact
//! bytes of `manifest.json` to the signer certificate. It carries both the
//! signer and the authority certificate, and the signed attributes
//! content-type (`data`), message-digest and signing-time.
//!
//! The structure is produced detached: the encapsulated content slot is left
//! empty, so the signature never carries a second copy of the manifest. A
//! verifier supplies the manifest bytes from the bundle itself.

use crate::crypto::Credentials;
use crate::{Error, Result};
use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::pkey::{PKeyRef, Private};
use openssl::stack::{Stack, StackRef};
use openssl::x509::store::{X509StoreBuilder, X509StoreRef};
use openssl::x509::{X509Ref, X509};
use serde_json::Value;
use tracing::debug;

/// Flags used when producing the signature.
///
/// `NOSMIMECAP` keeps the signed attributes down to content-type,
/// message-digest and signing-time.
fn signing_flags() -> CMSOptions {
    CMSOptions::DETACHED | CMSOptions::BINARY | CMSOptions::NOSMIMECAP
}

/// Serialize a manifest value to the bytes that get signed.
///
/// Objects are serialized as compact JSON; strings are taken verbatim so that
/// callers holding an already serialized manifest sign exactly those bytes.
///
/// # Errors
///
/// Returns [`Error::ManifestTypeError`] for any other JSON type.
pub fn manifest_bytes(manifest: &Value) -> Result<Vec<u8>> {
    match manifest {
        Value::Object(_) => Ok(serde_json::to_vec(manifest)?),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(Error::ManifestTypeError(json_type_name(other).to_string())),
    }
}

/// Sign a manifest given as a JSON object or as its serialized string form.
///
/// Returns the DER encoding of the detached signature.
pub fn sign_manifest(manifest: &Value, credentials: &Credentials) -> Result<Vec<u8>> {
    let content = manifest_bytes(manifest)?;
    sign_detached(&content, credentials)
}

/// Produce a detached DER-encoded CMS signature over `content`.
pub fn sign_detached(content: &[u8], credentials: &Credentials) -> Result<Vec<u8>> {
    let mut chain = Stack::new().map_err(signing_error)?;
    chain
        .push(credentials.authority_certificate().clone())
        .map_err(signing_error)?;

    let signer_cert: &X509Ref = credentials.signer_certificate();
    let signer_key: &PKeyRef<Private> = credentials.signer_key();
    let chain_ref: &StackRef<X509> = &chain;

    let cms = CmsContentInfo::sign(
        Some(signer_cert),
        Some(signer_key),
        Some(chain_ref),
        Some(content),
        signing_flags(),
    )
    .map_err(signing_error)?;

    let der = cms.to_der().map_err(signing_error)?;

    debug!(content_bytes = content.len(), signature_bytes = der.len(), "Signed manifest");

    Ok(der)
}

/// Verify a detached signature against `content`, trusting only `authority`.
///
/// The signer certificate is taken from the signature itself and must chain
/// up to `authority`.
pub fn verify_detached(signature: &[u8], content: &[u8], authority: &X509) -> Result<()> {
    let mut cms = CmsContentInfo::from_der(signature)
        .map_err(|e| Error::Signing(format!("Failed to parse signature: {}", e)))?;

    let mut store = X509StoreBuilder::new().map_err(signing_error)?;
    store.add_cert(authority.clone()).map_err(signing_error)?;
    let store = store.build();
    let store_ref: &X509StoreRef = &store;

    cms.verify(None, Some(store_ref), Some(content), None, CMSOptions::BINARY)
        .map_err(|e| Error::Signing(format!("Signature verification failed: {}", e)))
}

fn signing_error(e: openssl::error::ErrorStack) -> Error {
    Error::Signing(e.to_string())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_bytes_from_object() {
        let manifest = json!({ "icon.png": "abc" });
        let bytes = manifest_bytes(&manifest).unwrap();
        assert_eq!(bytes, br#"{"icon.png":"abc"}"#);
    }

    #[test]
    fn test_manifest_bytes_from_string_is_verbatim() {
        let raw = "{ \"icon.png\" : \"abc\" }";
        let bytes = manifest_bytes(&Value::String(raw.to_string())).unwrap();
        assert_eq!(bytes, raw.as_bytes());
    }

    #[test]
    fn test_manifest_type_error() {
        for value in [json!(null), json!(42), json!(["a"]), json!(true)] {
            let err = manifest_bytes(&value).unwrap_err();
            assert!(matches!(err, Error::ManifestTypeError(_)), "{:?}", value);
        }
    }

    #[test]
    fn test_manifest_type_error_names_type() {
        let err = manifest_bytes(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_signing_flags_are_detached() {
        assert!(signing_flags().contains(CMSOptions::DETACHED));
        assert!(signing_flags().contains(CMSOptions::NOSMIMECAP));
    }
}
