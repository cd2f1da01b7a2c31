//! Scan-code (barcode) records.
//!
//! A pass carries up to four parallel scan-code records, one per
//! [`ScanCodeFormat`], under `barcodes`. Older wallet versions only read the
//! single `barcode` property, the *legacy slot*, which points at one of them.
//!
//! [`ScanCodeSet`] is the result of configuring scan codes: it reports how
//! many records survived validation and lets the caller pick the legacy record.
//!
//! # Examples
//!
//! ```
//! use pkpass::scancode::{ScanCodeInput, ScanCodeSet};
//!
//! let mut set = ScanCodeSet::from_input(ScanCodeInput::message("TICKET-0042"));
//! assert_eq!(set.count(), 4);
//!
//! set.select_legacy(Some("pdf417"));
//! assert_eq!(set.legacy().unwrap().format.as_str(), "PKBarcodeFormatPDF417");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Default text encoding for scan-code messages.
pub const DEFAULT_MESSAGE_ENCODING: &str = "iso-8859-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanCodeFormat {
    #[serde(rename = "PKBarcodeFormatQR")]
    Qr,
    #[serde(rename = "PKBarcodeFormatPDF417")]
    Pdf417,
    #[serde(rename = "PKBarcodeFormatAztec")]
    Aztec,
    #[serde(rename = "PKBarcodeFormatCode128")]
    Code128,
}

impl ScanCodeFormat {
    pub const ALL: [ScanCodeFormat; 4] = [
        ScanCodeFormat::Qr,
        ScanCodeFormat::Pdf417,
        ScanCodeFormat::Aztec,
        ScanCodeFormat::Code128,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCodeFormat::Qr => "PKBarcodeFormatQR",
            ScanCodeFormat::Pdf417 => "PKBarcodeFormatPDF417",
            ScanCodeFormat::Aztec => "PKBarcodeFormatAztec",
            ScanCodeFormat::Code128 => "PKBarcodeFormatCode128",
        }
    }
}

fn default_encoding() -> String {
    DEFAULT_MESSAGE_ENCODING.to_string()
}

/// One scan-code record as stored in `pass.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCodeRecord {
    pub format: ScanCodeFormat,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default = "default_encoding")]
    pub message_encoding: String,
}

impl ScanCodeRecord {
    /// Validate a caller-supplied JSON record.
    ///
    /// The record must be an object with a known `format` and a string
    /// `message`; `altText` and `messageEncoding` must be strings if present.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What the caller hands to [`crate::Project::set_scan_code`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScanCodeInput {
    /// A single message expanded into one record per format.
    Message {
        message: String,
        alt_text: Option<String>,
        encoding: Option<String>,
    },
    /// Explicit records, each validated on its own.
    Records(Vec<Value>),
}

impl ScanCodeInput {
    pub fn message(message: impl Into<String>) -> Self {
        ScanCodeInput::Message {
            message: message.into(),
            alt_text: None,
            encoding: None,
        }
    }

    /// Set the alternative text. No effect on [`ScanCodeInput::Records`].
    pub fn alt_text(mut self, text: impl Into<String>) -> Self {
        if let ScanCodeInput::Message { alt_text, .. } = &mut self {
            *alt_text = Some(text.into());
        }
        self
    }

    /// Set the message encoding. No effect on [`ScanCodeInput::Records`].
    pub fn encoding(mut self, value: impl Into<String>) -> Self {
        if let ScanCodeInput::Message { encoding, .. } = &mut self {
            *encoding = Some(value.into());
        }
        self
    }
}

impl From<&str> for ScanCodeInput {
    fn from(message: &str) -> Self {
        ScanCodeInput::message(message)
    }
}

impl From<String> for ScanCodeInput {
    fn from(message: String) -> Self {
        ScanCodeInput::message(message)
    }
}

impl From<Vec<Value>> for ScanCodeInput {
    fn from(records: Vec<Value>) -> Self {
        ScanCodeInput::Records(records)
    }
}

/// Keep the records that validate, at most one per format.
///
/// The first record of each format wins; later ones are dropped with a
/// warning, as are records that fail validation. Each survivor is returned
/// with its original JSON value.
pub fn validate_records(values: Vec<Value>) -> Vec<(Value, ScanCodeRecord)> {
    let total = values.len();
    let mut invalid = 0;
    let mut kept: Vec<(Value, ScanCodeRecord)> = Vec::with_capacity(ScanCodeFormat::ALL.len());

    for value in values {
        let Some(record) = ScanCodeRecord::from_value(&value) else {
            invalid += 1;
            continue;
        };
        if kept.iter().any(|(_, seen)| seen.format == record.format) {
            continue;
        }
        kept.push((value, record));
    }

    if invalid > 0 {
        warn!(dropped = invalid, "Dropped invalid scan-code records");
    }
    let repeated = total - invalid - kept.len();
    if repeated > 0 {
        warn!(dropped = repeated, "Dropped scan-code records repeating a format");
    }
    kept
}

/// Validated scan-code records plus the legacy selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanCodeSet {
    records: Vec<ScanCodeRecord>,
    legacy: Option<usize>,
}

impl ScanCodeSet {
    /// Build the set from caller input.
    ///
    /// A message always yields exactly one record per [`ScanCodeFormat`].
    /// Explicit records go through [`validate_records`]. The legacy slot
    /// starts out pointing at the first surviving record.
    pub fn from_input(input: ScanCodeInput) -> Self {
        let records: Vec<ScanCodeRecord> = match input {
            ScanCodeInput::Message {
                message,
                alt_text,
                encoding,
            } => {
                let message_encoding = encoding.unwrap_or_else(default_encoding);
                ScanCodeFormat::ALL
                    .into_iter()
                    .map(|format| ScanCodeRecord {
                        format,
                        message: message.clone(),
                        alt_text: alt_text.clone(),
                        message_encoding: message_encoding.clone(),
                    })
                    .collect()
            }
            ScanCodeInput::Records(values) => validate_records(values)
                .into_iter()
                .map(|(_, record)| record)
                .collect(),
        };

        let legacy = (!records.is_empty()).then_some(0);
        Self { records, legacy }
    }

    /// Number of valid records.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ScanCodeRecord] {
        &self.records
    }

    /// The record currently occupying the legacy slot.
    pub fn legacy(&self) -> Option<&ScanCodeRecord> {
        self.legacy.and_then(|i| self.records.get(i))
    }

    /// Choose the legacy record.
    ///
    /// `None` clears the slot. `Some(selector)` picks the first record whose
    /// format name contains `selector`, ignoring case; when nothing matches
    /// the previous selection is kept.
    pub fn select_legacy(&mut self, selector: Option<&str>) -> &mut Self {
        let Some(selector) = selector else {
            self.legacy = None;
            return self;
        };

        let needle = selector.to_lowercase();
        match self
            .records
            .iter()
            .position(|r| r.format.as_str().to_lowercase().contains(&needle))
        {
            Some(index) => self.legacy = Some(index),
            None => debug!(selector, "No scan-code record matches legacy selector"),
        }
        self
    }

    /// Write `barcodes` and the legacy `barcode` into the descriptor root.
    ///
    /// An empty set leaves the descriptor untouched; a cleared legacy slot
    /// removes any `barcode` the model declared.
    pub fn apply(&self, root: &mut Map<String, Value>) {
        if self.records.is_empty() {
            return;
        }

        root.insert(
            "barcodes".to_string(),
            Value::Array(self.records.iter().map(ScanCodeRecord::to_value).collect()),
        );

        match self.legacy() {
            Some(record) => {
                root.insert("barcode".to_string(), record.to_value());
            }
            None => {
                root.remove("barcode");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_expands_to_four_records() {
        let set = ScanCodeSet::from_input(
            ScanCodeInput::message("hello").alt_text("alt").encoding("utf-8"),
        );
        assert_eq!(set.count(), 4);
        for (record, format) in set.records().iter().zip(ScanCodeFormat::ALL) {
            assert_eq!(record.format, format);
            assert_eq!(record.message, "hello");
            assert_eq!(record.alt_text.as_deref(), Some("alt"));
            assert_eq!(record.message_encoding, "utf-8");
        }
    }

    #[test]
    fn test_message_default_encoding() {
        let set = ScanCodeSet::from_input("hello".into());
        assert!(set
            .records()
            .iter()
            .all(|r| r.message_encoding == DEFAULT_MESSAGE_ENCODING && r.alt_text.is_none()));
    }

    #[test]
    fn test_legacy_defaults_to_first() {
        let set = ScanCodeSet::from_input("hello".into());
        assert_eq!(set.legacy().unwrap().format, ScanCodeFormat::Qr);
    }

    #[test]
    fn test_explicit_records_invalid_dropped() {
        let set = ScanCodeSet::from_input(ScanCodeInput::Records(vec![
            json!({ "format": "PKBarcodeFormatAztec", "message": "a" }),
            json!({ "format": "PKBarcodeFormatQR" }),
            json!({ "format": "QR", "message": "b" }),
            json!({ "format": "PKBarcodeFormatCode128", "message": 5 }),
            json!("PKBarcodeFormatQR"),
        ]));
        assert_eq!(set.count(), 1);
        assert_eq!(set.records()[0].format, ScanCodeFormat::Aztec);
        assert_eq!(set.records()[0].message_encoding, DEFAULT_MESSAGE_ENCODING);
    }

    #[test]
    fn test_explicit_records_one_per_format() {
        let records: Vec<Value> = (0..6)
            .map(|i| json!({ "format": "PKBarcodeFormatQR", "message": format!("m{}", i) }))
            .collect();
        let set = ScanCodeSet::from_input(ScanCodeInput::Records(records));
        assert_eq!(set.count(), 1);
        assert_eq!(set.records()[0].message, "m0");
    }

    #[test]
    fn test_validate_records_keeps_original_values() {
        let kept = validate_records(vec![
            json!({ "format": "PKBarcodeFormatPDF417", "message": "p", "extra": 1 }),
            json!({ "format": "PKBarcodeFormatQR", "message": "q" }),
            json!({ "format": "PKBarcodeFormatPDF417", "message": "again" }),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].0["extra"], 1);
        assert_eq!(kept[1].1.format, ScanCodeFormat::Qr);
    }

    #[test]
    fn test_select_legacy_case_insensitive() {
        let mut set = ScanCodeSet::from_input("hello".into());
        set.select_legacy(Some("CODE128"));
        assert_eq!(set.legacy().unwrap().format, ScanCodeFormat::Code128);
        set.select_legacy(Some("aztec"));
        assert_eq!(set.legacy().unwrap().format, ScanCodeFormat::Aztec);
    }

    #[test]
    fn test_select_legacy_none_clears() {
        let mut set = ScanCodeSet::from_input("hello".into());
        set.select_legacy(None);
        assert!(set.legacy().is_none());

        let mut root = Map::new();
        root.insert("barcode".into(), json!({ "format": "PKBarcodeFormatQR", "message": "old" }));
        set.apply(&mut root);
        assert!(!root.contains_key("barcode"));
        assert_eq!(root["barcodes"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_select_legacy_unmatched_keeps_previous() {
        let mut set = ScanCodeSet::from_input("hello".into());
        set.select_legacy(Some("pdf"));
        set.select_legacy(Some("datamatrix"));
        assert_eq!(set.legacy().unwrap().format, ScanCodeFormat::Pdf417);
    }

    #[test]
    fn test_apply_writes_wire_format() {
        let set = ScanCodeSet::from_input(ScanCodeInput::message("m").alt_text("a"));
        let mut root = Map::new();
        set.apply(&mut root);
        assert_eq!(
            root["barcode"],
            json!({
                "format": "PKBarcodeFormatQR",
                "message": "m",
                "altText": "a",
                "messageEncoding": "iso-8859-1",
            })
        );
    }

    #[test]
    fn test_empty_set_leaves_descriptor() {
        let set = ScanCodeSet::from_input(ScanCodeInput::Records(vec![json!({})]));
        let mut root = Map::new();
        root.insert("barcode".into(), json!({ "format": "PKBarcodeFormatQR", "message": "x" }));
        set.apply(&mut root);
        assert!(root.contains_key("barcode"));
        assert!(!root.contains_key("barcodes"));
    }
}
