//! Raw property records
//!
//! A registry entry's properties arrive as a nested key-value record. Every
//! read goes through a get-or-default accessor: an absent key or a value of
//! the wrong shape yields the zero value, never an error, since different
//! firmware revisions expose different subsets of keys.

use serde::Serialize;
use std::collections::BTreeMap;

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Record(RawRecord),
    IntArray(Vec<i64>),
}

/// Nested property record as returned by a [`RecordReader`](crate::RecordReader)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawRecord {
    entries: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw access to a property
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Integer property, 0 when absent or not an integer
    pub fn int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(Value::Int(v)) => *v,
            _ => 0,
        }
    }

    /// Boolean property, false when absent or not a boolean
    pub fn bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    /// String property, empty when absent or not a string
    pub fn string(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::Str(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Integer array property truncated to at most `max` entries
    pub fn int_array(&self, key: &str, max: usize) -> Vec<i64> {
        match self.get(key) {
            Some(Value::IntArray(values)) => values.iter().take(max).copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Nested record, `None` when absent or not a record
    pub fn record(&self, key: &str) -> Option<&RawRecord> {
        match self.get(key) {
            Some(Value::Record(r)) => Some(r),
            _ => None,
        }
    }

    /// Nested record, treating a missing one as empty
    pub fn record_or_empty(&self, key: &str) -> &RawRecord {
        static EMPTY: RawRecord = RawRecord {
            entries: BTreeMap::new(),
        };
        self.record(key).unwrap_or(&EMPTY)
    }

    /// Build a record from a JSON object.
    ///
    /// Conversion is lenient in the same way the accessors are: floats,
    /// nulls and arrays that are not purely integers are dropped rather
    /// than failing the whole record. Returns `None` if `json` is not an
    /// object.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let object = json.as_object()?;
        let mut record = Self::new();
        for (key, value) in object {
            if let Some(value) = Value::from_json(value) {
                record.insert(key.clone(), value);
            }
        }
        Some(record)
    }
}

impl Value {
    fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(_) => json_int(json).map(Value::Int),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(json_int)
                .collect::<Option<Vec<_>>>()
                .map(Value::IntArray),
            serde_json::Value::Object(_) => RawRecord::from_json(json).map(Value::Record),
            serde_json::Value::Null => None,
        }
    }
}

/// Integers printed unsigned above `i64::MAX` wrap to their signed value,
/// matching how the registry text is read
fn json_int(json: &serde_json::Value) -> Option<i64> {
    json.as_i64().or_else(|| json.as_u64().map(|v| v as i64))
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<RawRecord> for Value {
    fn from(v: RawRecord) -> Self {
        Value::Record(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntArray(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(v.into_iter().map(i64::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawRecord {
        RawRecord::new()
            .with("DesignCapacity", 8579)
            .with("IsCharging", true)
            .with("Serial", "F5D1234")
            .with("CellVoltage", vec![3783, 3785, 3784])
            .with("AdapterDetails", RawRecord::new().with("Watts", 96))
    }

    #[test]
    fn test_accessors_return_values() {
        let record = sample();
        assert_eq!(record.int("DesignCapacity"), 8579);
        assert!(record.bool("IsCharging"));
        assert_eq!(record.string("Serial"), "F5D1234");
        assert_eq!(record.int_array("CellVoltage", 16), vec![3783, 3785, 3784]);
        assert_eq!(record.record_or_empty("AdapterDetails").int("Watts"), 96);
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let record = RawRecord::new();
        assert_eq!(record.int("DesignCapacity"), 0);
        assert!(!record.bool("IsCharging"));
        assert_eq!(record.string("Serial"), "");
        assert!(record.int_array("CellVoltage", 16).is_empty());
        assert!(record.record("AdapterDetails").is_none());
        assert!(record.record_or_empty("AdapterDetails").is_empty());
    }

    #[test]
    fn test_shape_mismatch_defaults_to_zero() {
        let record = sample();
        assert_eq!(record.int("Serial"), 0);
        assert!(!record.bool("DesignCapacity"));
        assert_eq!(record.string("IsCharging"), "");
        assert!(record.int_array("AdapterDetails", 16).is_empty());
        assert!(record.record("CellVoltage").is_none());
    }

    #[test]
    fn test_int_array_truncates() {
        let record = RawRecord::new().with("CellVoltage", (0..20).collect::<Vec<i64>>());
        let cells = record.int_array("CellVoltage", 16);
        assert_eq!(cells.len(), 16);
        assert_eq!(cells[15], 15);
    }

    #[test]
    fn test_from_json_is_lenient() {
        let json = serde_json::json!({
            "DesignCapacity": 8579,
            "Temperature": 30.5,
            "Serial": null,
            "Mixed": [1, "two"],
            "BatteryData": { "CellVoltage": [3783, 3785] }
        });
        let record = RawRecord::from_json(&json).unwrap();
        assert_eq!(record.int("DesignCapacity"), 8579);
        assert!(record.get("Temperature").is_none());
        assert!(record.get("Serial").is_none());
        assert!(record.get("Mixed").is_none());
        assert_eq!(
            record
                .record_or_empty("BatteryData")
                .int_array("CellVoltage", 16),
            vec![3783, 3785]
        );
    }

    #[test]
    fn test_from_json_wraps_unsigned_integers() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"Amperage": 18446744073709551104, "CellVoltage": [3783, 18446744073709551615]}"#,
        )
        .unwrap();
        let record = RawRecord::from_json(&json).unwrap();
        assert_eq!(record.int("Amperage"), -512);
        assert_eq!(record.int_array("CellVoltage", 16), vec![3783, -1]);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(RawRecord::from_json(&serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["DesignCapacity"], 8579);
        assert_eq!(json["CellVoltage"][1], 3785);
        assert_eq!(json["AdapterDetails"]["Watts"], 96);
    }
}
