//! Property merge engine.
//!
//! Callers may override a fixed allow-list of top-level descriptor
//! properties. Each allowed name maps to a [`PropertyKind`] that knows the
//! JSON shape it accepts. Everything else (including the properties owned by
//! dedicated setters such as expiration, voiding, relevance and field areas)
//! is dropped when the override map is converted into [`Overrides`].
//!
//! Two policies decide how an accepted value lands in the descriptor:
//!
//! | Policy | Existing scalar | Existing array | Existing object | Absent |
//! |--------|-----------------|----------------|-----------------|--------|
//! | [`MergePolicy::Overwrite`] | replaced | replaced | replaced | set |
//! | [`MergePolicy::Extend`] | replaced | appended to | shallow-merged | set |

use crate::scancode::{validate_records, ScanCodeRecord};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// How overrides combine with values already in the descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    #[default]
    Overwrite,
    Extend,
}

/// JSON shape accepted for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueShape {
    String,
    Bool,
    Object,
    NumberArray,
    Color,
    ScanCode,
    ScanCodeArray,
}

/// The allow-list of overridable descriptor properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    SerialNumber,
    Description,
    OrganizationName,
    PassTypeIdentifier,
    TeamIdentifier,
    GroupingIdentifier,
    LogoText,
    AppLaunchUrl,
    AssociatedStoreIdentifiers,
    UserInfo,
    WebServiceUrl,
    AuthenticationToken,
    SharingProhibited,
    SuppressStripShine,
    BackgroundColor,
    ForegroundColor,
    LabelColor,
    Barcodes,
    Barcode,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 19] = [
        PropertyKind::SerialNumber,
        PropertyKind::Description,
        PropertyKind::OrganizationName,
        PropertyKind::PassTypeIdentifier,
        PropertyKind::TeamIdentifier,
        PropertyKind::GroupingIdentifier,
        PropertyKind::LogoText,
        PropertyKind::AppLaunchUrl,
        PropertyKind::AssociatedStoreIdentifiers,
        PropertyKind::UserInfo,
        PropertyKind::WebServiceUrl,
        PropertyKind::AuthenticationToken,
        PropertyKind::SharingProhibited,
        PropertyKind::SuppressStripShine,
        PropertyKind::BackgroundColor,
        PropertyKind::ForegroundColor,
        PropertyKind::LabelColor,
        PropertyKind::Barcodes,
        PropertyKind::Barcode,
    ];

    /// Property name in `pass.json`.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyKind::SerialNumber => "serialNumber",
            PropertyKind::Description => "description",
            PropertyKind::OrganizationName => "organizationName",
            PropertyKind::PassTypeIdentifier => "passTypeIdentifier",
            PropertyKind::TeamIdentifier => "teamIdentifier",
            PropertyKind::GroupingIdentifier => "groupingIdentifier",
            PropertyKind::LogoText => "logoText",
            PropertyKind::AppLaunchUrl => "appLaunchURL",
            PropertyKind::AssociatedStoreIdentifiers => "associatedStoreIdentifiers",
            PropertyKind::UserInfo => "userInfo",
            PropertyKind::WebServiceUrl => "webServiceURL",
            PropertyKind::AuthenticationToken => "authenticationToken",
            PropertyKind::SharingProhibited => "sharingProhibited",
            PropertyKind::SuppressStripShine => "suppressStripShine",
            PropertyKind::BackgroundColor => "backgroundColor",
            PropertyKind::ForegroundColor => "foregroundColor",
            PropertyKind::LabelColor => "labelColor",
            PropertyKind::Barcodes => "barcodes",
            PropertyKind::Barcode => "barcode",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    fn shape(&self) -> ValueShape {
        match self {
            PropertyKind::SharingProhibited | PropertyKind::SuppressStripShine => ValueShape::Bool,
            PropertyKind::UserInfo => ValueShape::Object,
            PropertyKind::AssociatedStoreIdentifiers => ValueShape::NumberArray,
            PropertyKind::BackgroundColor
            | PropertyKind::ForegroundColor
            | PropertyKind::LabelColor => ValueShape::Color,
            PropertyKind::Barcodes => ValueShape::ScanCodeArray,
            PropertyKind::Barcode => ValueShape::ScanCode,
            _ => ValueShape::String,
        }
    }

    /// Check (and for scan-code arrays, filter) a value for this property.
    ///
    /// Returns `None` when the value must be dropped.
    fn accept(&self, value: Value) -> Option<Value> {
        match self.shape() {
            ValueShape::String => value.is_string().then_some(value),
            ValueShape::Bool => value.is_boolean().then_some(value),
            ValueShape::Object => value.is_object().then_some(value),
            ValueShape::NumberArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_u64))
                .then_some(value),
            ValueShape::Color => value.as_str().is_some_and(is_valid_color).then_some(value),
            ValueShape::ScanCode => ScanCodeRecord::from_value(&value).is_some().then_some(value),
            ValueShape::ScanCodeArray => {
                let Value::Array(items) = value else {
                    return None;
                };
                let valid = unique_scan_codes(items);
                (!valid.is_empty()).then_some(Value::Array(valid))
            }
        }
    }
}

/// Caller overrides that passed the allow-list and shape checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: Vec<(PropertyKind, Value)>,
}

impl Overrides {
    /// Filter an arbitrary caller map down to accepted overrides.
    ///
    /// Unknown properties and properties with dedicated setters are dropped
    /// silently; allow-listed properties with an unacceptable value (for
    /// example `backgroundColor: "rgb(999,0,0)"`) are dropped with a warning.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut overrides = Self::default();
        for (name, value) in map {
            overrides.insert(&name, value);
        }
        overrides
    }

    /// Add a single override; returns whether it was accepted.
    pub fn insert(&mut self, name: &str, value: Value) -> bool {
        let Some(kind) = PropertyKind::from_name(name) else {
            debug!(property = name, "Ignoring property outside the override allow-list");
            return false;
        };

        let Some(value) = kind.accept(value) else {
            warn!(property = name, "Dropping override with invalid value");
            return false;
        };

        self.entries.retain(|(k, _)| *k != kind);
        self.entries.push((kind, value));
        true
    }

    pub fn get(&self, kind: PropertyKind) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| *k == kind).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every accepted override into `root` under `policy`.
    pub fn apply(&self, root: &mut Map<String, Value>, policy: MergePolicy) {
        for (kind, value) in &self.entries {
            merge_property(root, kind.name(), value.clone(), policy);

            // extending may have appended a format the model already had
            if *kind == PropertyKind::Barcodes {
                if let Some(Value::Array(items)) = root.get_mut(kind.name()) {
                    let merged = std::mem::take(items);
                    *items = unique_scan_codes(merged);
                }
            }
        }
    }
}

fn unique_scan_codes(items: Vec<Value>) -> Vec<Value> {
    validate_records(items)
        .into_iter()
        .map(|(value, _)| value)
        .collect()
}

/// Merge one property into `root` under `policy`.
pub fn merge_property(root: &mut Map<String, Value>, key: &str, value: Value, policy: MergePolicy) {
    let Some(existing) = root.get_mut(key) else {
        root.insert(key.to_string(), value);
        return;
    };

    match (policy, existing, value) {
        (MergePolicy::Extend, Value::Array(current), Value::Array(incoming)) => {
            current.extend(incoming);
        }
        (MergePolicy::Extend, Value::Array(current), incoming) => {
            current.push(incoming);
        }
        (MergePolicy::Extend, Value::Object(current), Value::Object(incoming)) => {
            for (k, v) in incoming {
                current.insert(k, v);
            }
        }
        (_, existing, incoming) => {
            *existing = incoming;
        }
    }
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)\s*$")
            .expect("color pattern is valid")
    })
}

/// `rgb(r, g, b)` with every channel in `0..=255`.
pub fn is_valid_color(value: &str) -> bool {
    let Some(caps) = color_pattern().captures(value) else {
        return false;
    };
    (1..=3).all(|i| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .is_some_and(|channel| channel <= 255)
    })
}
