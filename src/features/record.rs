//! Per-user engagement counters as read from a request body or the feature table.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Canonical field order. Churn and segmentation scalers were fitted on exactly this order.
pub const FEATURE_NAMES: [&str; 10] = [
    "total_events",
    "events_last_30d",
    "events_last_7d",
    "unique_event_types",
    "login_events",
    "view_events",
    "click_events",
    "purchase_events",
    "days_with_events",
    "days_since_last_event",
];

/// Raw value of one named field, as seen by a record source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Missing,
    NotNumeric,
    Number(f64),
}

impl From<Option<&serde_json::Value>> for FieldValue {
    fn from(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => FieldValue::Missing,
            Some(v) => v.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::NotNumeric),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for FieldValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => FieldValue::Missing,
            ValueRef::Integer(i) => FieldValue::Number(i as f64),
            ValueRef::Real(f) => FieldValue::Number(f),
            ValueRef::Text(_) | ValueRef::Blob(_) => FieldValue::NotNumeric,
        }
    }
}

/// The ten engagement counters. All fields are finite and non-negative;
/// no activity is recorded as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserFeatureVector {
    pub total_events: f64,
    pub events_last_30d: f64,
    pub events_last_7d: f64,
    pub unique_event_types: f64,
    pub login_events: f64,
    pub view_events: f64,
    pub click_events: f64,
    pub purchase_events: f64,
    pub days_with_events: f64,
    pub days_since_last_event: f64,
}

impl UserFeatureVector {
    /// Build from any record source by looking each field up by name.
    pub fn from_fields<F>(mut lookup: F) -> Result<Self, ValidationError>
    where
        F: FnMut(&'static str) -> FieldValue,
    {
        let mut values = [0.0; 10];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            *slot = match lookup(name) {
                FieldValue::Missing => return Err(ValidationError::MissingField(name)),
                FieldValue::NotNumeric => return Err(ValidationError::NotNumeric(name)),
                FieldValue::Number(v) => check(name, v)?,
            };
        }
        Ok(Self::from_canonical(values))
    }

    /// Parse a JSON object carrying the ten fields. Unknown keys are ignored.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
        Self::from_fields(|name| FieldValue::from(obj.get(name)))
    }

    /// Build from values in canonical order, validating each.
    pub fn from_array(values: [f64; 10]) -> Result<Self, ValidationError> {
        for (name, v) in FEATURE_NAMES.into_iter().zip(values) {
            check(name, v)?;
        }
        Ok(Self::from_canonical(values))
    }

    fn from_canonical(v: [f64; 10]) -> Self {
        Self {
            total_events: v[0],
            events_last_30d: v[1],
            events_last_7d: v[2],
            unique_event_types: v[3],
            login_events: v[4],
            view_events: v[5],
            click_events: v[6],
            purchase_events: v[7],
            days_with_events: v[8],
            days_since_last_event: v[9],
        }
    }

    /// Values in canonical order.
    pub fn to_array(&self) -> [f64; 10] {
        [
            self.total_events,
            self.events_last_30d,
            self.events_last_7d,
            self.unique_event_types,
            self.login_events,
            self.view_events,
            self.click_events,
            self.purchase_events,
            self.days_with_events,
            self.days_since_last_event,
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.to_array()[i])
    }
}

fn check(name: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        Err(ValidationError::NotFinite(name))
    } else if value < 0.0 {
        Err(ValidationError::Negative { field: name, value })
    } else {
        Ok(value)
    }
}
