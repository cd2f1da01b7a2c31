//! Field areas of a pass.
//!
//! Every pass style lays its content out in five ordered lists of field
//! records. Records pushed through [`FieldAreas`] are appended after the
//! records the model already declares, area by area in [`FieldArea::ALL`]
//! order. Field keys are unique across all areas of a pass.

use super::schema;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldArea {
    Header,
    Primary,
    Secondary,
    Auxiliary,
    Back,
}

impl FieldArea {
    /// Declaration order, which is also the order records are applied in.
    pub const ALL: [FieldArea; 5] = [
        FieldArea::Header,
        FieldArea::Primary,
        FieldArea::Secondary,
        FieldArea::Auxiliary,
        FieldArea::Back,
    ];

    /// Array name inside the pass type object.
    pub fn key(&self) -> &'static str {
        match self {
            FieldArea::Header => "headerFields",
            FieldArea::Primary => "primaryFields",
            FieldArea::Secondary => "secondaryFields",
            FieldArea::Auxiliary => "auxiliaryFields",
            FieldArea::Back => "backFields",
        }
    }

    fn index(&self) -> usize {
        match self {
            FieldArea::Header => 0,
            FieldArea::Primary => 1,
            FieldArea::Secondary => 2,
            FieldArea::Auxiliary => 3,
            FieldArea::Back => 4,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

/// Accumulated caller-supplied field records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAreas {
    areas: [Vec<Value>; 5],
    keys: HashSet<String>,
}

impl FieldAreas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record for `area`.
    ///
    /// Records that fail the field schema, or reuse a key already queued in
    /// any area, are dropped. Returns whether the record was kept.
    pub fn push(&mut self, area: FieldArea, field: Value) -> bool {
        if !schema::is_valid_field(&field) {
            warn!(area = area.key(), "Dropping invalid field record");
            return false;
        }

        let key = field_key(&field).unwrap_or_default().to_string();
        if !self.keys.insert(key.clone()) {
            warn!(area = area.key(), key = %key, "Dropping field with duplicate key");
            return false;
        }

        self.areas[area.index()].push(field);
        true
    }

    /// Records queued for one area.
    pub fn area(&self, area: FieldArea) -> &[Value] {
        &self.areas[area.index()]
    }

    /// Total queued records across all areas.
    pub fn len(&self) -> usize {
        self.areas.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the queued records to the pass type object.
    ///
    /// Keys already used by records in the model take precedence; a queued
    /// record reusing one of them is skipped.
    pub fn apply(&self, section: &mut Map<String, Value>) {
        let mut taken: HashSet<String> = FieldArea::ALL
            .iter()
            .filter_map(|area| section.get(area.key()).and_then(Value::as_array))
            .flatten()
            .filter_map(|f| field_key(f).map(str::to_string))
            .collect();

        for area in FieldArea::ALL {
            let queued = self.area(area);
            if queued.is_empty() {
                continue;
            }

            let slot = section
                .entry(area.key())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }

            if let Value::Array(records) = slot {
                for field in queued {
                    let key = field_key(field).unwrap_or_default();
                    if !taken.insert(key.to_string()) {
                        warn!(area = area.key(), key, "Field key already used by the model");
                        continue;
                    }
                    records.push(field.clone());
                }
            }
        }
    }
}

fn field_key(field: &Value) -> Option<&str> {
    field.get("key").and_then(Value::as_str)
}
