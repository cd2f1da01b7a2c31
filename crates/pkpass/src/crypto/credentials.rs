//! Signer certificate, authority certificate and private key loading.
//!
//! Pass signing needs three pieces of PEM-encoded trust material, each playing
//! a fixed [`CredentialRole`]:
//!
//! - the **authority certificate** (the intermediate CA that issued the signer),
//! - the **signer certificate** (issued for the pass type identifier),
//! - the **signer private key**, usually encrypted with a passphrase.
//!
//! Classification is done in two passes. The block type comes from the PEM
//! header (`CERTIFICATE` vs `... PRIVATE KEY`); a certificate's role comes from
//! the `paired_with_key` flag the caller declares on its [`PemInput`]. A block
//! that is neither a certificate nor a key is rejected, as is any missing role.
//!
//! # Examples
//!
//! ```no_run
//! use pkpass::crypto::{Credentials, PemInput, PemSource};
//! use secrecy::SecretString;
//!
//! let passphrase = SecretString::new("secret".to_string());
//! let credentials = Credentials::load(
//!     &[
//!         PemInput::authority(PemSource::path("certs/wwdr.pem")),
//!         PemInput::signer(PemSource::path("certs/signerCert.pem")),
//!         PemInput::signer(PemSource::path("certs/signerKey.pem")),
//!     ],
//!     Some(&passphrase),
//! )?;
//! # Ok::<(), pkpass::Error>(())
//! ```

use crate::{Error, Result};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// The three roles trust material can play in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    AuthorityCertificate,
    SignerCertificate,
    SignerPrivateKey,
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialRole::AuthorityCertificate => "authority certificate",
            CredentialRole::SignerCertificate => "signer certificate",
            CredentialRole::SignerPrivateKey => "signer private key",
        };
        f.write_str(name)
    }
}

/// Where PEM content comes from.
#[derive(Clone)]
pub enum PemSource {
    /// Read from a file at assembly time.
    Path(PathBuf),
    /// Already in memory.
    Inline(Vec<u8>),
}

impl PemSource {
    /// PEM content stored in a file.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        PemSource::Path(path.into())
    }

    /// PEM content already loaded in memory.
    pub fn inline(content: impl Into<Vec<u8>>) -> Self {
        PemSource::Inline(content.into())
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            PemSource::Path(path) => fs::read(path).map_err(|e| {
                Error::InvalidCredentials(format!("Failed to read {}: {}", path.display(), e))
            }),
            PemSource::Inline(content) => Ok(content.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            PemSource::Path(path) => path.display().to_string(),
            PemSource::Inline(_) => "<inline PEM>".to_string(),
        }
    }
}

impl fmt::Debug for PemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A PEM source plus the caller's declaration of how its certificates are used.
///
/// `paired_with_key` marks certificates that were exported together with the
/// private key: those become the signer certificate, every other certificate
/// becomes the authority certificate. The flag has no effect on key blocks.
#[derive(Debug, Clone)]
pub struct PemInput {
    pub source: PemSource,
    pub paired_with_key: bool,
}

impl PemInput {
    /// Input holding the authority (issuing CA) certificate.
    pub fn authority(source: PemSource) -> Self {
        Self {
            source,
            paired_with_key: false,
        }
    }

    /// Input holding the signer certificate and/or its private key.
    pub fn signer(source: PemSource) -> Self {
        Self {
            source,
            paired_with_key: true,
        }
    }
}

/// Block type parsed from a PEM header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Certificate,
    EncryptedPrivateKey,
    PrivateKey,
}

fn classify_block(tag: &str) -> Option<BlockKind> {
    match tag {
        "CERTIFICATE" | "X509 CERTIFICATE" => Some(BlockKind::Certificate),
        "ENCRYPTED PRIVATE KEY" => Some(BlockKind::EncryptedPrivateKey),
        t if t.ends_with("PRIVATE KEY") => Some(BlockKind::PrivateKey),
        _ => None,
    }
}

/// Fully loaded signing credentials.
///
/// Construction guarantees that all three roles are present and that the
/// private key belongs to the signer certificate.
///
/// # Security
///
/// The private key should be treated as sensitive data. The [`fmt::Debug`]
/// implementation only prints certificate subjects.
pub struct Credentials {
    authority_certificate: X509,
    signer_certificate: X509,
    signer_key: PKey<Private>,
}

impl Credentials {
    /// Load and classify every PEM block of every input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if:
    /// - An input cannot be read or contains no PEM block
    /// - A block is neither a certificate nor a private key
    /// - A key cannot be decrypted with `passphrase`
    /// - A role is supplied twice or not at all
    /// - The private key does not match the signer certificate
    pub fn load(inputs: &[PemInput], passphrase: Option<&SecretString>) -> Result<Self> {
        let mut authority = None;
        let mut signer = None;
        let mut key = None;

        for input in inputs {
            let data = input.source.read()?;
            let blocks = pem::parse_many(&data).map_err(|e| {
                Error::InvalidCredentials(format!(
                    "Malformed PEM in {}: {}",
                    input.source.describe(),
                    e
                ))
            })?;

            if blocks.is_empty() {
                return Err(Error::InvalidCredentials(format!(
                    "No PEM block found in {}",
                    input.source.describe()
                )));
            }

            for block in &blocks {
                let kind = classify_block(block.tag()).ok_or_else(|| {
                    Error::InvalidCredentials(format!(
                        "Unsupported PEM block '{}' in {}",
                        block.tag(),
                        input.source.describe()
                    ))
                })?;

                match kind {
                    BlockKind::Certificate => {
                        let cert = X509::from_der(block.contents()).map_err(|e| {
                            Error::InvalidCredentials(format!("Failed to parse certificate: {}", e))
                        })?;
                        let (slot, role) = if input.paired_with_key {
                            (&mut signer, CredentialRole::SignerCertificate)
                        } else {
                            (&mut authority, CredentialRole::AuthorityCertificate)
                        };
                        place(slot, cert, role)?;
                        debug!(role = %role, source = %input.source.describe(), "Classified PEM block");
                    }
                    BlockKind::EncryptedPrivateKey | BlockKind::PrivateKey => {
                        let pkey = decode_private_key(block, kind, passphrase)?;
                        place(&mut key, pkey, CredentialRole::SignerPrivateKey)?;
                        debug!(source = %input.source.describe(), "Loaded signer private key");
                    }
                }
            }
        }

        let authority = authority.ok_or_else(|| missing(CredentialRole::AuthorityCertificate))?;
        let signer = signer.ok_or_else(|| missing(CredentialRole::SignerCertificate))?;
        let key = key.ok_or_else(|| missing(CredentialRole::SignerPrivateKey))?;

        Self::from_parts(authority, signer, key)
    }

    /// Build credentials from already parsed OpenSSL objects.
    pub fn from_parts(
        authority_certificate: X509,
        signer_certificate: X509,
        signer_key: PKey<Private>,
    ) -> Result<Self> {
        Self::validate_key_pair(&signer_certificate, &signer_key)?;

        Ok(Self {
            authority_certificate,
            signer_certificate,
            signer_key,
        })
    }

    pub fn authority_certificate(&self) -> &X509 {
        &self.authority_certificate
    }

    pub fn signer_certificate(&self) -> &X509 {
        &self.signer_certificate
    }

    pub fn signer_key(&self) -> &PKey<Private> {
        &self.signer_key
    }

    /// Validate that the private key matches the certificate's public key
    fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
        let cert_public_key = cert.public_key().map_err(|e| {
            Error::InvalidCredentials(format!(
                "Failed to extract public key from signer certificate: {}",
                e
            ))
        })?;

        if !private_key.public_eq(&cert_public_key) {
            return Err(Error::InvalidCredentials(
                "Private key does not match signer certificate public key".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("authority_certificate", &subject_line(&self.authority_certificate))
            .field("signer_certificate", &subject_line(&self.signer_certificate))
            .field("signer_key", &"<redacted>")
            .finish()
    }
}

fn subject_line(cert: &X509) -> String {
    cert.subject_name()
        .entries()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn place<T>(slot: &mut Option<T>, value: T, role: CredentialRole) -> Result<()> {
    if slot.is_some() {
        return Err(Error::InvalidCredentials(format!("More than one {} supplied", role)));
    }
    *slot = Some(value);
    Ok(())
}

fn missing(role: CredentialRole) -> Error {
    Error::InvalidCredentials(format!("No {} supplied", role))
}

fn decode_private_key(
    block: &pem::Pem,
    kind: BlockKind,
    passphrase: Option<&SecretString>,
) -> Result<PKey<Private>> {
    let decoded = match (kind, passphrase) {
        (BlockKind::EncryptedPrivateKey, Some(pass)) => PKey::private_key_from_pkcs8_passphrase(
            block.contents(),
            pass.expose_secret().as_bytes(),
        ),
        (BlockKind::EncryptedPrivateKey, None) => {
            return Err(Error::InvalidCredentials(
                "Encrypted private key requires a passphrase".into(),
            ));
        }
        (_, Some(pass)) => PKey::private_key_from_pem_passphrase(
            pem::encode(block).as_bytes(),
            pass.expose_secret().as_bytes(),
        ),
        (_, None) => PKey::private_key_from_pem(pem::encode(block).as_bytes()),
    };

    decoded.map_err(|e| Error::InvalidCredentials(format!("Failed to decrypt private key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::symm::Cipher;
    use openssl::x509::{X509Builder, X509NameBuilder};

    /// Helper to generate a test EC key pair
    fn generate_test_ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let ec_key = EcKey::generate(&group).unwrap();
        PKey::from_ec_key(ec_key).unwrap()
    }

    /// Helper to generate a self-signed certificate for a given private key
    fn generate_test_cert(private_key: &PKey<Private>, cn: &str) -> X509 {
        let mut name_builder = X509NameBuilder::new().unwrap();
        name_builder.append_entry_by_text("CN", cn).unwrap();
        let name = name_builder.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap();
        builder.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(private_key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
        builder.sign(private_key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    struct Fixture {
        authority_pem: Vec<u8>,
        signer_pem: Vec<u8>,
        key_pem: Vec<u8>,
    }

    fn fixture(passphrase: &str) -> Fixture {
        let authority_key = generate_test_ec_key();
        let signer_key = generate_test_ec_key();
        Fixture {
            authority_pem: generate_test_cert(&authority_key, "Test Authority").to_pem().unwrap(),
            signer_pem: generate_test_cert(&signer_key, "Test Signer").to_pem().unwrap(),
            key_pem: signer_key
                .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), passphrase.as_bytes())
                .unwrap(),
        }
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_classify_block() {
        assert_eq!(classify_block("CERTIFICATE"), Some(BlockKind::Certificate));
        assert_eq!(classify_block("ENCRYPTED PRIVATE KEY"), Some(BlockKind::EncryptedPrivateKey));
        assert_eq!(classify_block("RSA PRIVATE KEY"), Some(BlockKind::PrivateKey));
        assert_eq!(classify_block("PRIVATE KEY"), Some(BlockKind::PrivateKey));
        assert_eq!(classify_block("PUBLIC KEY"), None);
        assert_eq!(classify_block("X509 CRL"), None);
    }

    #[test]
    fn test_load_all_roles() {
        let f = fixture("pass");
        let creds = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
            ],
            Some(&secret("pass")),
        )
        .unwrap();

        assert!(subject_line(creds.authority_certificate()).contains("Test Authority"));
        assert!(subject_line(creds.signer_certificate()).contains("Test Signer"));
    }

    #[test]
    fn test_signer_cert_and_key_in_one_file() {
        let f = fixture("pass");
        let mut combined = f.signer_pem.clone();
        combined.extend_from_slice(&f.key_pem);

        let result = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(combined)),
            ],
            Some(&secret("pass")),
        );
        assert!(result.is_ok(), "Failed: {:?}", result.err());
    }

    #[test]
    fn test_wrong_passphrase() {
        let f = fixture("pass");
        let result = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
            ],
            Some(&secret("nope")),
        );
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[test]
    fn test_encrypted_key_without_passphrase() {
        let f = fixture("pass");
        let result = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
            ],
            None,
        );
        match result {
            Err(Error::InvalidCredentials(msg)) => assert!(msg.contains("passphrase")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_authority_role() {
        let f = fixture("pass");
        let result = Credentials::load(
            &[
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
            ],
            Some(&secret("pass")),
        );
        match result {
            Err(Error::InvalidCredentials(msg)) => assert!(msg.contains("authority certificate")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unclassifiable_block_fails() {
        let f = fixture("pass");
        let public = generate_test_ec_key().public_key_to_pem().unwrap();
        let result = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
                PemInput::signer(PemSource::inline(public)),
            ],
            Some(&secret("pass")),
        );
        match result {
            Err(Error::InvalidCredentials(msg)) => assert!(msg.contains("PUBLIC KEY")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_input_without_pem_blocks() {
        let result = Credentials::load(
            &[PemInput::authority(PemSource::inline(b"not a pem".to_vec()))],
            None,
        );
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Credentials::load(
            &[PemInput::authority(PemSource::path("/nonexistent/wwdr.pem"))],
            None,
        );
        match result {
            Err(Error::InvalidCredentials(msg)) => assert!(msg.contains("/nonexistent/wwdr.pem")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_signer_certificate() {
        let f = fixture("pass");
        let result = Credentials::load(
            &[
                PemInput::authority(PemSource::inline(f.authority_pem)),
                PemInput::signer(PemSource::inline(f.signer_pem.clone())),
                PemInput::signer(PemSource::inline(f.signer_pem)),
                PemInput::signer(PemSource::inline(f.key_pem)),
            ],
            Some(&secret("pass")),
        );
        match result {
            Err(Error::InvalidCredentials(msg)) => assert!(msg.contains("More than one")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_key_pair_mismatched() {
        let key1 = generate_test_ec_key();
        let key2 = generate_test_ec_key();
        let certificate = generate_test_cert(&key1, "Signer");
        let authority = generate_test_cert(&key2, "Authority");

        let result = Credentials::from_parts(authority, certificate, key2);
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("does not match"), "{}", err_msg);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = generate_test_ec_key();
        let cert = generate_test_cert(&key, "Signer");
        let creds = Credentials::from_parts(cert.clone(), cert, key).unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("Signer"));
    }
}
