//! Raw search result normalization.
//!
//! Attribute names are lower-cased, single values collapse to scalars and
//! multiple values keep their order. Each entry is wrapped under the
//! title-cased label of the queried object class.

use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::record::{RawEntry, RawEntrySet, Record, ShapedRecord, Value};

/// Normalize a search reply into shaped records labelled with `base_label`.
///
/// Returns [`MapperError::NoResults`] when the reply holds no entries.
pub fn normalize(raw: &RawEntrySet, base_label: &str) -> MapperResult<Vec<ShapedRecord>> {
    let label = title_case(base_label);

    let shaped: Vec<ShapedRecord> = raw
        .entries
        .iter()
        .map(|entry| ShapedRecord::new(label.clone(), normalize_entry(entry)))
        .collect();

    if shaped.is_empty() {
        return Err(MapperError::NoResults);
    }

    debug!(label = %label, count = shaped.len(), "Normalized search results");
    Ok(shaped)
}

/// Normalize a single raw entry.
pub fn normalize_entry(entry: &RawEntry) -> Record {
    let mut record = Record::new(entry.dn.clone());

    for attribute in &entry.attributes {
        if attribute.name.eq_ignore_ascii_case("dn") {
            continue;
        }
        let value = match attribute.count() {
            0 => continue,
            1 => Value::Single(attribute.values[0].clone()),
            _ => Value::Multi(attribute.values.clone()),
        };
        record.attributes.insert(attribute.name.to_lowercase(), value);
    }

    record
}

/// Capitalize the first letter of each whitespace-separated word, leaving
/// the rest untouched ("person" → "Person", "posix group" → "Posix Group").
pub fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut at_word_start = true;

    for ch in s.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            result.push(ch);
        } else if at_word_start {
            result.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jdoe() -> RawEntry {
        RawEntry::new("uid=jdoe,ou=People,dc=example,dc=com")
            .with("uid", ["jdoe"])
            .with("cn", ["John Doe"])
            .with("mail", ["jdoe@example.com", "john@example.com", "j@example.com"])
    }

    #[test]
    fn test_single_value_becomes_scalar() {
        let record = normalize_entry(&jdoe());
        assert_eq!(record.get_str("uid"), Some("jdoe"));
        assert_eq!(record.get_str("cn"), Some("John Doe"));
    }

    #[test]
    fn test_multiple_values_become_sequence() {
        let record = normalize_entry(&jdoe());
        let mail = record.attributes.get("mail").unwrap();

        assert!(mail.is_multi_valued());
        assert_eq!(
            mail.values(),
            vec!["jdoe@example.com", "john@example.com", "j@example.com"]
        );
        assert!(!record.has("count"));
    }

    #[test]
    fn test_dn_copied_verbatim_and_names_lower_cased() {
        let entry = RawEntry::new("CN=Admins,OU=Groups,DC=corp")
            .with("objectClass", ["top", "groupOfNames"])
            .with("CN", ["Admins"]);
        let record = normalize_entry(&entry);

        assert_eq!(record.dn, "CN=Admins,OU=Groups,DC=corp");
        assert!(record.attributes.contains_key("objectclass"));
        assert!(record.attributes.contains_key("cn"));
        assert!(!record.attributes.contains_key("CN"));
    }

    #[test]
    fn test_dn_attribute_not_duplicated() {
        let entry = RawEntry::new("uid=x,dc=com")
            .with("DN", ["uid=x,dc=com"])
            .with("uid", ["x"]);
        let record = normalize_entry(&entry);

        assert!(!record.has("dn"));
        assert_eq!(record.dn, "uid=x,dc=com");

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json.matches("\"dn\"").count(), 1);
    }

    #[test]
    fn test_empty_attributes_are_dropped() {
        let entry = RawEntry::new("cn=x").with("description", Vec::<String>::new());
        assert!(normalize_entry(&entry).is_empty());
    }

    #[test]
    fn test_normalize_wraps_under_label() {
        let shaped = normalize(&RawEntrySet::new(vec![jdoe()]), "person").unwrap();

        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].label, "Person");
        assert_eq!(shaped[0].record.get_str("uid"), Some("jdoe"));
        assert!(shaped[0].related.is_empty());
    }

    #[test]
    fn test_normalize_preserves_entry_order() {
        let raw = RawEntrySet::new(vec![
            RawEntry::new("uid=b").with("uid", ["b"]),
            RawEntry::new("uid=a").with("uid", ["a"]),
        ]);
        let shaped = normalize(&raw, "person").unwrap();
        let uids: Vec<_> = shaped.iter().map(|s| s.record.dn.as_str()).collect();
        assert_eq!(uids, vec!["uid=b", "uid=a"]);
    }

    #[test]
    fn test_normalize_empty_is_no_results() {
        let err = normalize(&RawEntrySet::default(), "person").unwrap_err();
        assert!(err.is_no_results());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("person"), "Person");
        assert_eq!(title_case("posix group"), "Posix Group");
        assert_eq!(title_case("inetOrgPerson"), "InetOrgPerson");
        assert_eq!(title_case(""), "");
    }
}
