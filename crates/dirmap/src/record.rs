//! Raw and normalized record types
//!
//! `RawEntry`/`RawEntrySet` mirror what a directory search hands back: every
//! attribute keeps its full value list, and the count of values is carried
//! alongside. `Record` and `ShapedRecord` are the flattened, caller-facing
//! shapes produced by the normalizer and the relationship resolver.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A normalized attribute value: single-valued attributes are scalars,
/// multi-valued attributes keep their value order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Exactly one value.
    Single(String),
    /// Two or more values, in directory order.
    Multi(Vec<String>),
}

impl Value {
    /// Get as a string if this is a single value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Single(s) => Some(s),
            Value::Multi(_) => None,
        }
    }

    /// Get every value, in order (one element for scalars).
    pub fn values(&self) -> Vec<&str> {
        match self {
            Value::Single(s) => vec![s.as_str()],
            Value::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// First value, for scalars the value itself.
    pub fn first(&self) -> Option<&str> {
        match self {
            Value::Single(s) => Some(s),
            Value::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// Check if this is multi-valued.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Value::Multi(_))
    }

    /// Append a value, promoting a scalar to a two-element sequence.
    pub fn push(&mut self, value: impl Into<String>) {
        match self {
            Value::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Value::Multi(vec![first, value.into()]);
            }
            Value::Multi(values) => values.push(value.into()),
        }
    }

    /// Render as directory value strings.
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Value::Single(s) => vec![s],
            Value::Multi(values) => values,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Single(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Single(s.to_string())
    }
}

impl<T: Into<String>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() == 1 {
            Value::Single(values.remove(0))
        } else {
            Value::Multi(values)
        }
    }
}

/// A normalized directory entry: lower-cased attribute names mapped to
/// scalar or multi values, plus the entry's DN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Distinguished name, copied verbatim from the raw entry.
    pub dn: String,

    /// Attribute values keyed by lower-cased attribute name.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record for the given DN.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute using builder pattern.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute value. The name is lower-cased.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_lowercase(), value.into());
    }

    /// Get an attribute value by (case-insensitive) name.
    ///
    /// `dn` resolves to the entry's DN.
    pub fn get(&self, name: &str) -> Option<Value> {
        let key = name.to_lowercase();
        if key == "dn" {
            return Some(Value::Single(self.dn.clone()));
        }
        self.attributes.get(&key).cloned()
    }

    /// Get a single-valued string attribute.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_lowercase())
            .and_then(Value::as_str)
    }

    /// Check if an attribute exists.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(&name.to_lowercase())
    }

    /// Get the number of attributes (excluding the DN).
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A normalized record wrapped under its base label, optionally carrying
/// related records attached by the relationship resolver.
///
/// Serializes as `{ "<label>": { ... }, "<related label>": [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedRecord {
    /// Title-cased object class label (e.g. "Person").
    pub label: String,

    /// The queried entry itself.
    pub record: Record,

    /// Related records keyed by the related subtree's label (e.g. "Group").
    pub related: BTreeMap<String, Vec<Record>>,
}

impl ShapedRecord {
    /// Wrap a record under a label.
    pub fn new(label: impl Into<String>, record: Record) -> Self {
        Self {
            label: label.into(),
            record,
            related: BTreeMap::new(),
        }
    }

    /// Related records attached under `label`, if any.
    pub fn related(&self, label: &str) -> Option<&[Record]> {
        self.related.get(label).map(Vec::as_slice)
    }
}

impl Serialize for ShapedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.related.len()))?;
        map.serialize_entry(&self.label, &self.record)?;
        for (label, records) in &self.related {
            map.serialize_entry(label, records)?;
        }
        map.end()
    }
}

/// One attribute of a raw entry with all of its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    /// Attribute name as returned by the server.
    pub name: String,
    /// Values in server order.
    pub values: Vec<String>,
}

impl RawAttribute {
    /// Create a raw attribute.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Value count reported for this attribute.
    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// The server's reply for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished name.
    pub dn: String,
    /// Attributes in server order.
    pub attributes: Vec<RawAttribute>,
}

impl RawEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute using builder pattern.
    #[must_use]
    pub fn with<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.push(RawAttribute::new(name, values));
        self
    }

    /// Values of an attribute by (case-insensitive) name.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.values.as_slice())
    }
}

/// The full reply of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntrySet {
    /// Entries in server order.
    pub entries: Vec<RawEntry>,
}

impl RawEntrySet {
    /// Create a result set.
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self { entries }
    }

    /// Entry count reported by the search.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Check if the search matched nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_push_promotes_scalar() {
        let mut value = Value::from("a");
        value.push("b");
        assert_eq!(value, Value::Multi(vec!["a".to_string(), "b".to_string()]));

        value.push("c");
        assert_eq!(value.values(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_value_from_vec() {
        assert_eq!(Value::from(vec!["only"]), Value::Single("only".to_string()));
        assert!(Value::from(vec!["a", "b"]).is_multi_valued());
    }

    #[test]
    fn test_record_lookup_is_case_insensitive() {
        let record = Record::new("uid=jdoe,ou=People,dc=example,dc=com")
            .with("UID", "jdoe")
            .with("mail", vec!["a@example.com", "b@example.com"]);

        assert_eq!(record.get_str("uid"), Some("jdoe"));
        assert_eq!(record.get_str("Uid"), Some("jdoe"));
        assert!(record.get_str("mail").is_none());
        assert_eq!(record.get("MAIL").unwrap().values().len(), 2);
        assert_eq!(
            record.get("dn"),
            Some(Value::Single(
                "uid=jdoe,ou=People,dc=example,dc=com".to_string()
            ))
        );
    }

    #[test]
    fn test_shaped_record_serialization() {
        let mut shaped = ShapedRecord::new(
            "Person",
            Record::new("uid=jdoe,dc=example,dc=com").with("uid", "jdoe"),
        );
        shaped.related.insert(
            "Group".to_string(),
            vec![Record::new("cn=staff,dc=example,dc=com").with("cn", "staff")],
        );

        let json = serde_json::to_value(&shaped).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Person": {"dn": "uid=jdoe,dc=example,dc=com", "uid": "jdoe"},
                "Group": [{"dn": "cn=staff,dc=example,dc=com", "cn": "staff"}],
            })
        );
    }

    #[test]
    fn test_raw_entry_values() {
        let entry = RawEntry::new("cn=x")
            .with("objectClass", ["top", "person"])
            .with("cn", ["x"]);

        assert_eq!(entry.values("objectclass").map(<[String]>::len), Some(2));
        assert!(entry.values("mail").is_none());
        assert_eq!(entry.attributes[1].count(), 1);
    }
}
