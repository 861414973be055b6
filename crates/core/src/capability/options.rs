//! Encoder option values and schemas.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value of a single command-line option.
///
/// Rendering is defined by the command builder: `Flag(true)` emits the flag
/// alone, `Flag(false)` omits it, `Value` emits `flag value` and `Repeated`
/// emits the flag once per element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Value(String),
    Repeated(Vec<String>),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::Repeated(value)
    }
}

/// Insertion-ordered option map.
///
/// Order is significant: device initialisation flags must precede the flags
/// that use the device. Keys are stored with a leading `-`. Re-inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, OptionValue)>,
}

fn normalize_flag(key: &str) -> String {
    let key = key.trim();
    if key.starts_with('-') {
        key.to_string()
    } else {
        format!("-{}", key)
    }
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        let key = normalize_flag(key);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        let key = normalize_flag(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Returns the string value of `key` if it is a `Value`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(OptionValue::Value(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let key = normalize_flag(key);
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Merges `other` into `self` with [`insert`](Self::insert) semantics.
    pub fn extend(&mut self, other: &OptionMap) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionMapVisitor;

        impl<'de> Visitor<'de> for OptionMapVisitor {
            type Value = OptionMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of option names to bool, string or string list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionMap, A::Error> {
                let mut map = OptionMap::new();
                while let Some((key, value)) = access.next_entry::<String, OptionValue>()? {
                    map.insert(&key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OptionMapVisitor)
    }
}

/// Type of a tunable encoder/container option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Integer,
    Float,
    String,
    Boolean,
    Choice,
}

/// Schema entry describing one option, for capability discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    pub help: String,
}

impl OptionSchema {
    pub fn new(name: &str, kind: OptionKind, help: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            min: None,
            max: None,
            choices: Vec::new(),
            help: help.to_string(),
        }
    }

    pub fn integer(name: &str, min: f64, max: f64, help: &str) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::new(name, OptionKind::Integer, help)
        }
    }

    pub fn choice(name: &str, choices: &[&str], help: &str) -> Self {
        Self {
            choices: choices.iter().map(|c| c.to_string()).collect(),
            ..Self::new(name, OptionKind::Choice, help)
        }
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order_and_replaces_in_place() {
        let mut map = OptionMap::new();
        map.insert("init_hw_device", vec!["vaapi=va:/dev/dri/renderD128".to_string()]);
        map.insert("-filter_hw_device", "va");
        map.insert("-preset", "fast");
        map.insert("init_hw_device", vec!["qsv=hw".to_string()]);

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["-init_hw_device", "-filter_hw_device", "-preset"]);
        assert_eq!(
            map.get("init_hw_device"),
            Some(&OptionValue::Repeated(vec!["qsv=hw".to_string()]))
        );
    }

    #[test]
    fn test_remove_and_get_str() {
        let mut map = OptionMap::new().with("crf", "23").with("y", true);
        assert_eq!(map.get_str("-crf"), Some("23"));
        assert_eq!(map.get_str("y"), None);
        assert_eq!(map.remove("crf"), Some(OptionValue::Value("23".to_string())));
        assert!(!map.contains_key("crf"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_serde_keeps_document_order() {
        let json = r#"{"-zeta": "1", "alpha": true, "-init_hw_device": ["a", "b"]}"#;
        let map: OptionMap = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["-zeta", "-alpha", "-init_hw_device"]);
        assert_eq!(map.get("alpha"), Some(&OptionValue::Flag(true)));

        let back = serde_json::to_string(&map).unwrap();
        assert_eq!(back, r#"{"-zeta":"1","-alpha":true,"-init_hw_device":["a","b"]}"#);
    }

    #[test]
    fn test_schema_builders() {
        let crf = OptionSchema::integer("crf", 0.0, 51.0, "Constant rate factor").with_default(23);
        assert_eq!(crf.kind, OptionKind::Integer);
        assert_eq!(crf.max, Some(51.0));
        let json = serde_json::to_value(&crf).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["default"], 23);
    }
}
