//! The pass descriptor (`pass.json`) and everything that patches it.
//!
//! A [`Descriptor`] is the parsed JSON document from the model directory.
//! Its root must contain exactly one [`PassType`] key whose value is an
//! object holding the field areas. Caller configuration is applied in a fixed
//! order by [`crate::Project`]:
//!
//! 1. allow-listed overrides ([`merge`])
//! 2. scan codes ([`crate::scancode`])
//! 3. relevance, expiration and voiding ([`relevance`])
//! 4. field-area records ([`fields`])
//!
//! after which [`Descriptor::validate`] checks the required identifying fields.

pub mod fields;
pub mod merge;
pub mod relevance;
pub mod schema;

pub use fields::{FieldArea, FieldAreas};
pub use merge::{MergePolicy, Overrides, PropertyKind};
pub use relevance::Relevance;

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// The closed set of pass styles a descriptor can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    BoardingPass,
    Coupon,
    EventTicket,
    Generic,
    StoreCard,
}

impl PassType {
    pub const ALL: [PassType; 5] = [
        PassType::BoardingPass,
        PassType::Coupon,
        PassType::EventTicket,
        PassType::Generic,
        PassType::StoreCard,
    ];

    /// The descriptor root key for this style.
    pub fn key(&self) -> &'static str {
        match self {
            PassType::BoardingPass => "boardingPass",
            PassType::Coupon => "coupon",
            PassType::EventTicket => "eventTicket",
            PassType::Generic => "generic",
            PassType::StoreCard => "storeCard",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Transit kinds accepted by boarding passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitType {
    Air,
    Boat,
    Bus,
    Generic,
    Train,
}

impl TransitType {
    pub const ALL: [TransitType; 5] = [
        TransitType::Air,
        TransitType::Boat,
        TransitType::Bus,
        TransitType::Generic,
        TransitType::Train,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitType::Air => "PKTransitTypeAir",
            TransitType::Boat => "PKTransitTypeBoat",
            TransitType::Bus => "PKTransitTypeBus",
            TransitType::Generic => "PKTransitTypeGeneric",
            TransitType::Train => "PKTransitTypeTrain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Parsed `pass.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    root: Map<String, Value>,
    pass_type: PassType,
}

impl Descriptor {
    /// Parse descriptor bytes and detect the pass type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorValidationFailed`] if the bytes are not a
    /// JSON object, if no supported pass type key is present, if more than one
    /// is present, or if the type key does not hold an object.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            Error::DescriptorValidationFailed(format!("pass.json is not valid JSON: {}", e))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(Error::DescriptorValidationFailed(
                "pass.json root must be an object".into(),
            ));
        };
        let pass_type = detect_pass_type(&root)?;
        Ok(Self { root, pass_type })
    }

    pub fn pass_type(&self) -> PassType {
        self.pass_type
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// The object stored under the pass type key.
    pub fn type_section(&self) -> Option<&Map<String, Value>> {
        self.root.get(self.pass_type.key()).and_then(Value::as_object)
    }

    /// Mutable access to the pass type object, recreating it if a merge
    /// replaced it with something else.
    pub fn type_section_mut(&mut self) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry(self.pass_type.key())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(section) => section,
            _ => unreachable!("type section was normalized to an object"),
        }
    }

    /// Check the fields every signed pass must carry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorValidationFailed`] naming the missing or
    /// mistyped fields, or a missing/unknown boarding pass transit type.
    pub fn validate(&self) -> Result<()> {
        let missing = schema::missing_required_fields(&self.root);
        if !missing.is_empty() {
            return Err(Error::DescriptorValidationFailed(format!(
                "missing or invalid required fields: {}",
                missing.join(", ")
            )));
        }

        if self.pass_type == PassType::BoardingPass {
            let transit = self
                .type_section()
                .and_then(|s| s.get("transitType"))
                .and_then(Value::as_str);
            match transit {
                Some(t) if TransitType::parse(t).is_some() => {}
                Some(t) => {
                    return Err(Error::DescriptorValidationFailed(format!(
                        "unknown transitType '{}'",
                        t
                    )));
                }
                None => {
                    return Err(Error::DescriptorValidationFailed(
                        "boardingPass requires a transitType".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Serialize to the bytes stored in the bundle.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.root)?)
    }
}

fn detect_pass_type(root: &Map<String, Value>) -> Result<PassType> {
    let found: Vec<PassType> = PassType::ALL
        .into_iter()
        .filter(|t| root.contains_key(t.key()))
        .collect();

    match found.as_slice() {
        [] => Err(Error::DescriptorValidationFailed(format!(
            "no supported pass type found, expected one of: {}",
            PassType::ALL.map(|t| t.key()).join(", ")
        ))),
        [pass_type] => {
            if root.get(pass_type.key()).is_some_and(Value::is_object) {
                Ok(*pass_type)
            } else {
                Err(Error::DescriptorValidationFailed(format!(
                    "'{}' must be an object",
                    pass_type
                )))
            }
        }
        many => Err(Error::DescriptorValidationFailed(format!(
            "more than one pass type declared: {}",
            many.iter().map(|t| t.key()).collect::<Vec<_>>().join(", ")
        ))),
    }
}
