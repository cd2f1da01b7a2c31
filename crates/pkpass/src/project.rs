//! Project builder API
//!
//! A [`Project`] points at a model directory, collects caller configuration
//! through chainable setters and turns it all into a signed `.pkpass` with a
//! single [`Project::assemble`] call.

use crate::bundle::{
    BundleMember, BundleWriter, CompressionLevel, ManifestBuilder, MemberKind, ModelDir,
    PassStream, DESCRIPTOR_MEMBER,
};
use crate::crypto::{sign_detached, Credentials, PemInput, PemSource};
use crate::descriptor::relevance::format_pass_date;
use crate::descriptor::{
    Descriptor, FieldArea, FieldAreas, MergePolicy, Overrides, Relevance, TransitType,
};
use crate::localization::{strings_member_language, Localizations};
use crate::scancode::{ScanCodeInput, ScanCodeSet};
use crate::{Error, Result};
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pass assembly with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use pkpass::{FieldArea, PemSource, Project};
/// use serde_json::json;
/// use std::io::Write;
///
/// let mut stream = Project::new("models/event.pass")
///     .authority_certificate(PemSource::path("certs/wwdr.pem"))
///     .signer_certificate(PemSource::path("certs/signerCert.pem"))
///     .signer_key(PemSource::path("certs/signerKey.pem"))
///     .passphrase("secret")
///     .add_field(FieldArea::Primary, json!({ "key": "event", "label": "Event", "value": "RustConf" }))
///     .add_localization("it", [("Event", "Evento")])
///     .set_scan_code("TICKET-0042")
///     .assemble()?;
///
/// let file = std::fs::File::create("event.pkpass")?;
/// stream.write_to(file)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Project {
    model_dir: PathBuf,
    overrides: Overrides,
    merge_policy: MergePolicy,
    fields: FieldAreas,
    localizations: Localizations,
    expiration: Option<String>,
    voided: bool,
    relevance: Vec<Relevance>,
    scan_codes: Option<ScanCodeSet>,
    transit_type: Option<TransitType>,
    credential_inputs: Vec<PemInput>,
    passphrase: Option<SecretString>,
    credentials: Option<Credentials>,
    compression_level: CompressionLevel,
}

impl Project {
    /// Create a project for the model directory at `model_dir`.
    pub fn new(model_dir: impl AsRef<Path>) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            overrides: Overrides::default(),
            merge_policy: MergePolicy::default(),
            fields: FieldAreas::new(),
            localizations: Localizations::new(),
            expiration: None,
            voided: false,
            relevance: Vec::new(),
            scan_codes: None,
            transit_type: None,
            credential_inputs: Vec::new(),
            passphrase: None,
            credentials: None,
            compression_level: CompressionLevel::DEFAULT,
        }
    }

    /// Set descriptor overrides.
    ///
    /// Only allow-listed properties are kept; see [`crate::descriptor::merge`].
    /// Repeated calls accumulate, and a later value for the same property
    /// replaces the earlier one.
    pub fn set_overrides(mut self, overrides: Map<String, Value>) -> Self {
        for (name, value) in overrides {
            self.overrides.insert(&name, value);
        }
        self
    }

    /// Choose how overrides combine with the model's values. Default is
    /// [`MergePolicy::Overwrite`].
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Append a field record to one of the field areas.
    ///
    /// Invalid records and records reusing a key are dropped with a warning.
    pub fn add_field(mut self, area: FieldArea, field: Value) -> Self {
        self.fields.push(area, field);
        self
    }

    /// Add translations for `lang`. An empty table adds no file to the bundle.
    pub fn add_localization<I, K, V>(mut self, lang: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.localizations.add(lang, entries);
        self
    }

    /// Set the expiration date. Dates that cannot be parsed are ignored.
    pub fn set_expiration(mut self, date: impl AsRef<str>) -> Self {
        let date = date.as_ref();
        match format_pass_date(date) {
            Some(formatted) => self.expiration = Some(formatted),
            None => warn!(date, "Ignoring unparseable expiration date"),
        }
        self
    }

    /// Mark the pass as voided.
    pub fn mark_voided(mut self) -> Self {
        self.voided = true;
        self
    }

    /// Set a relevance trigger. Setting the same kind twice keeps the last one.
    pub fn set_relevance(mut self, relevance: Relevance) -> Self {
        self.relevance.retain(|r| r.key() != relevance.key());
        self.relevance.push(relevance);
        self
    }

    /// Configure scan codes from a message or from explicit records.
    ///
    /// Inspect the outcome with [`Project::scan_codes`].
    pub fn set_scan_code(mut self, input: impl Into<ScanCodeInput>) -> Self {
        let set = ScanCodeSet::from_input(input.into());
        debug!(records = set.count(), "Scan codes configured");
        self.scan_codes = Some(set);
        self
    }

    /// Pick the scan code written to the legacy `barcode` property.
    ///
    /// `None` clears it. Has no effect before [`Project::set_scan_code`].
    pub fn select_legacy_scan_code(mut self, selector: Option<&str>) -> Self {
        match self.scan_codes.as_mut() {
            Some(set) => {
                set.select_legacy(selector);
            }
            None => debug!("No scan codes configured, legacy selection ignored"),
        }
        self
    }

    /// Set the boarding pass transit type.
    pub fn transit_type(mut self, transit_type: TransitType) -> Self {
        self.transit_type = Some(transit_type);
        self
    }

    /// Set the authority (issuing CA) certificate.
    pub fn authority_certificate(self, source: PemSource) -> Self {
        self.credential_input(PemInput::authority(source))
    }

    /// Set the signer certificate.
    pub fn signer_certificate(self, source: PemSource) -> Self {
        self.credential_input(PemInput::signer(source))
    }

    /// Set the signer private key.
    ///
    /// A single PEM holding both the signer certificate and key can be passed
    /// to either [`Project::signer_certificate`] or this method, not both.
    pub fn signer_key(self, source: PemSource) -> Self {
        self.credential_input(PemInput::signer(source))
    }

    /// Add a PEM input with an explicit classification flag.
    pub fn credential_input(mut self, input: PemInput) -> Self {
        self.credential_inputs.push(input);
        self
    }

    /// Set the passphrase of the signer private key.
    ///
    /// The passphrase is stored securely and will be zeroized when dropped.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecretString::new(passphrase.into()));
        self
    }

    /// Use already loaded credentials instead of PEM inputs.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set ZIP compression level for the output (0-9).
    ///
    /// 0 = no compression (fastest), 9 = maximum compression (smallest).
    /// Default is 6 (balanced).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Scan codes configured so far.
    pub fn scan_codes(&self) -> Option<&ScanCodeSet> {
        self.scan_codes.as_ref()
    }

    /// Validate the builder configuration.
    ///
    /// Returns [`Error::MissingRequiredInput`] if:
    /// - The model directory path is empty
    /// - Neither PEM inputs nor loaded credentials are configured
    /// - Both PEM inputs and loaded credentials are configured
    pub fn validate(&self) -> Result<()> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(Error::MissingRequiredInput(
                "Model directory path is empty".into(),
            ));
        }

        let has_inputs = !self.credential_inputs.is_empty();
        let has_loaded = self.credentials.is_some();

        if has_inputs && has_loaded {
            return Err(Error::MissingRequiredInput(
                "Cannot specify both loaded credentials and PEM inputs".into(),
            ));
        }

        if !has_inputs && !has_loaded {
            return Err(Error::MissingRequiredInput(
                "Must specify signing credentials".into(),
            ));
        }

        Ok(())
    }

    /// Apply all configuration to the model's `pass.json` bytes.
    ///
    /// Order: overrides, scan codes, relevance, expiration, voided, transit
    /// type, field records. The result is validated.
    pub fn patch_descriptor(&self, bytes: &[u8]) -> Result<Descriptor> {
        let mut descriptor = Descriptor::parse(bytes)?;

        let root = descriptor.root_mut();
        self.overrides.apply(root, self.merge_policy);

        if let Some(codes) = &self.scan_codes {
            codes.apply(root);
        }

        for relevance in &self.relevance {
            relevance.apply(root);
        }

        if let Some(date) = &self.expiration {
            root.insert("expirationDate".to_string(), Value::String(date.clone()));
        }

        if self.voided {
            root.insert("voided".to_string(), Value::Bool(true));
        }

        if let Some(transit_type) = self.transit_type {
            descriptor.type_section_mut().insert(
                "transitType".to_string(),
                Value::String(transit_type.as_str().to_string()),
            );
        }

        if !self.fields.is_empty() {
            self.fields.apply(descriptor.type_section_mut());
        }

        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Assemble and sign the pass.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingRequiredInput`] from [`Project::validate`]
    /// - [`Error::ProjectNotFound`] if the model directory cannot be listed
    /// - [`Error::UninitializedProject`] if the model has no icon; checked
    ///   before localization folders are listed or credentials are loaded
    /// - [`Error::DescriptorValidationFailed`] if `pass.json` is missing or invalid
    /// - [`Error::InvalidCredentials`] if the credentials cannot be loaded
    /// - [`Error::DuplicateMember`], [`Error::Signing`], [`Error::Zip`] from
    ///   manifest construction, signing and writing
    pub fn assemble(&self) -> Result<PassStream> {
        self.validate()?;

        let model = ModelDir::open(&self.model_dir)?;
        let listing = model.list_root()?;

        if !listing.has_icon() {
            return Err(Error::UninitializedProject(format!(
                "no icon asset in {}",
                self.model_dir.display()
            )));
        }
        if !listing.has_descriptor() {
            return Err(Error::DescriptorValidationFailed(format!(
                "{} not found in {}",
                DESCRIPTOR_MEMBER,
                self.model_dir.display()
            )));
        }

        let mut names: Vec<String> = listing.assets().map(str::to_string).collect();
        names.extend(model.list_localized(&listing.lproj_dirs)?);
        names.push(DESCRIPTOR_MEMBER.to_string());

        let files = model.read_files(&names)?;
        debug!(files = files.len(), "Model files read");

        let mut descriptor_bytes = Vec::new();
        let mut model_strings: HashMap<String, Vec<u8>> = HashMap::new();
        let mut members = Vec::with_capacity(files.len() + 1);

        for (name, content) in files {
            if name == DESCRIPTOR_MEMBER {
                descriptor_bytes = content;
                continue;
            }
            if let Some(lang) = strings_member_language(&name).filter(|l| self.has_translations(l)) {
                model_strings.insert(lang.to_string(), content);
                continue;
            }
            members.push(BundleMember::new(name, MemberKind::Asset, content)?);
        }

        let descriptor = self.patch_descriptor(&descriptor_bytes)?;
        members.push(BundleMember::new(
            DESCRIPTOR_MEMBER,
            MemberKind::Descriptor,
            descriptor.to_bytes()?,
        )?);

        for (name, content) in self.localizations.render(|lang| model_strings.remove(lang)) {
            members.push(BundleMember::new(name, MemberKind::Localization, content)?);
        }

        info!(
            pass_type = %descriptor.pass_type(),
            members = members.len(),
            "Bundle members collected"
        );

        let loaded;
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => {
                loaded = Credentials::load(&self.credential_inputs, self.passphrase.as_ref())?;
                &loaded
            }
        };

        let mut builder = ManifestBuilder::new();
        builder.add_members(&members)?;
        let manifest_json = builder.build().to_json()?;

        let signature = sign_detached(&manifest_json, credentials)?;

        BundleWriter::new(self.compression_level).write(&members, &signature, &manifest_json)
    }

    fn has_translations(&self, lang: &str) -> bool {
        self.localizations
            .get(lang)
            .is_some_and(|table| !table.is_empty())
    }
}
