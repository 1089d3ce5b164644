//! In-memory directory.
//!
//! Holds entries in a flat list and evaluates the filter subset the
//! compiler produces: equality, presence, `*` substrings, `&`, `|` and `!`.
//! Every call is recorded so callers can assert which lookups were issued.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{MapperError, MapperResult};
use crate::record::{RawAttribute, RawEntry, RawEntrySet};
use crate::schema::SchemaAttributeMap;
use crate::traits::Directory;

/// A directory operation recorded by [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Search {
        base_dn: String,
        filter: String,
        attributes: Vec<String>,
        limit: Option<u32>,
    },
    ReadOne {
        dn: String,
    },
    Add {
        dn: String,
    },
    ModifyReplace {
        dn: String,
    },
    Delete {
        dn: String,
    },
    FetchSchema,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<RawEntry>,
    schema: SchemaAttributeMap,
    calls: Vec<DirectoryCall>,
    schema_fetches: usize,
    fail_schema: bool,
    fail_searches: bool,
}

/// A [`Directory`] backed by process memory.
#[derive(Debug)]
pub struct MemoryDirectory {
    identity: String,
    state: Mutex<State>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::with_identity("memory://default")
    }

    /// Create an empty directory with a specific connection identity.
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add an entry using builder pattern.
    #[must_use]
    pub fn with_entry(self, entry: RawEntry) -> Self {
        self.state().entries.push(entry);
        self
    }

    /// Set the schema returned by `fetch_schema`.
    #[must_use]
    pub fn with_schema(self, schema: SchemaAttributeMap) -> Self {
        self.state().schema = schema;
        self
    }

    /// Make `fetch_schema` fail (or succeed again).
    pub fn fail_schema(&self, fail: bool) {
        self.state().fail_schema = fail;
    }

    /// Make searches and reads fail (or succeed again).
    pub fn fail_searches(&self, fail: bool) {
        self.state().fail_searches = fail;
    }

    /// Calls issued so far, in order.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of schema fetches performed.
    pub fn schema_fetches(&self) -> usize {
        self.state().schema_fetches
    }

    /// Copy of a stored entry by DN.
    pub fn entry(&self, dn: &str) -> Option<RawEntry> {
        self.state()
            .entries
            .iter()
            .find(|e| e.dn.eq_ignore_ascii_case(dn))
            .cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
        limit: Option<u32>,
    ) -> MapperResult<RawEntrySet> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::Search {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
            attributes: attributes.to_vec(),
            limit,
        });

        if state.fail_searches {
            return Err(MapperError::search_failed("directory unavailable"));
        }

        let parsed = FilterNode::parse(filter)?;
        let limit = limit.map_or(usize::MAX, |l| l as usize);

        let entries = state
            .entries
            .iter()
            .filter(|e| in_subtree(&e.dn, base_dn) && parsed.matches(e))
            .take(limit)
            .map(|e| project(e, attributes))
            .collect();

        Ok(RawEntrySet::new(entries))
    }

    async fn read_one(
        &self,
        dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> MapperResult<Option<RawEntry>> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::ReadOne { dn: dn.to_string() });

        if state.fail_searches {
            return Err(MapperError::read_failed(dn, "directory unavailable"));
        }

        let parsed = FilterNode::parse(filter)?;
        Ok(state
            .entries
            .iter()
            .find(|e| e.dn.eq_ignore_ascii_case(dn) && parsed.matches(e))
            .map(|e| project(e, attributes)))
    }

    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> MapperResult<()> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::Add { dn: dn.to_string() });

        if state.entries.iter().any(|e| e.dn.eq_ignore_ascii_case(dn)) {
            return Err(MapperError::ObjectAlreadyExists { dn: dn.to_string() });
        }

        let entry = RawEntry {
            dn: dn.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, values)| RawAttribute::new(name.clone(), values.clone()))
                .collect(),
        };
        state.entries.push(entry);
        Ok(())
    }

    async fn modify_replace(
        &self,
        dn: &str,
        attributes: &[(String, Vec<String>)],
    ) -> MapperResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(DirectoryCall::ModifyReplace { dn: dn.to_string() });

        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.dn.eq_ignore_ascii_case(dn))
            .ok_or_else(|| MapperError::ObjectNotFound { dn: dn.to_string() })?;

        for (name, values) in attributes {
            entry
                .attributes
                .retain(|a| !a.name.eq_ignore_ascii_case(name));
            if !values.is_empty() {
                entry
                    .attributes
                    .push(RawAttribute::new(name.clone(), values.clone()));
            }
        }
        Ok(())
    }

    async fn delete(&self, dn: &str) -> MapperResult<()> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::Delete { dn: dn.to_string() });

        let before = state.entries.len();
        state.entries.retain(|e| !e.dn.eq_ignore_ascii_case(dn));
        if state.entries.len() == before {
            return Err(MapperError::ObjectNotFound { dn: dn.to_string() });
        }
        Ok(())
    }

    async fn fetch_schema(&self) -> MapperResult<SchemaAttributeMap> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::FetchSchema);
        state.schema_fetches += 1;

        if state.fail_schema {
            return Err(MapperError::SchemaFetchFailed {
                message: "subschema entry not readable".to_string(),
            });
        }
        Ok(state.schema.clone())
    }
}

fn in_subtree(dn: &str, base_dn: &str) -> bool {
    if base_dn.is_empty() {
        return true;
    }
    let dn = dn.to_lowercase();
    let base = base_dn.to_lowercase();
    dn == base || dn.ends_with(&format!(",{base}"))
}

fn project(entry: &RawEntry, attributes: &[String]) -> RawEntry {
    let wants_all = attributes.is_empty() || attributes.iter().any(|a| a == "*");
    RawEntry {
        dn: entry.dn.clone(),
        attributes: entry
            .attributes
            .iter()
            .filter(|a| wants_all || attributes.iter().any(|w| w.eq_ignore_ascii_case(&a.name)))
            .cloned()
            .collect(),
    }
}

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Present(String),
    Equals(String, String),
    Substring(String, Vec<String>),
}

impl FilterNode {
    fn parse(filter: &str) -> MapperResult<Self> {
        let chars: Vec<char> = filter.trim().chars().collect();
        let mut pos = 0;
        let node = parse_filter(&chars, &mut pos)
            .ok_or_else(|| MapperError::search_failed(format!("bad search filter: {filter}")))?;
        if pos != chars.len() {
            return Err(MapperError::search_failed(format!(
                "bad search filter: {filter}"
            )));
        }
        Ok(node)
    }

    fn matches(&self, entry: &RawEntry) -> bool {
        match self {
            FilterNode::And(nodes) => nodes.iter().all(|n| n.matches(entry)),
            FilterNode::Or(nodes) => nodes.iter().any(|n| n.matches(entry)),
            FilterNode::Not(node) => !node.matches(entry),
            // Every directory entry carries an objectClass.
            FilterNode::Present(attribute) if attribute.eq_ignore_ascii_case("objectClass") => {
                true
            }
            FilterNode::Present(attribute) => entry
                .values(attribute)
                .is_some_and(|values| !values.is_empty()),
            FilterNode::Equals(attribute, value) => entry
                .values(attribute)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
            FilterNode::Substring(attribute, parts) => entry
                .values(attribute)
                .is_some_and(|values| values.iter().any(|v| substring_match(v, parts))),
        }
    }
}

fn parse_filter(chars: &[char], pos: &mut usize) -> Option<FilterNode> {
    if chars.get(*pos) != Some(&'(') {
        return None;
    }
    *pos += 1;

    let node = match chars.get(*pos)? {
        '&' => {
            *pos += 1;
            FilterNode::And(parse_list(chars, pos)?)
        }
        '|' => {
            *pos += 1;
            FilterNode::Or(parse_list(chars, pos)?)
        }
        '!' => {
            *pos += 1;
            FilterNode::Not(Box::new(parse_filter(chars, pos)?))
        }
        // Redundant wrapping: "((cn=x))"
        '(' => parse_filter(chars, pos)?,
        _ => parse_item(chars, pos)?,
    };

    if chars.get(*pos) != Some(&')') {
        return None;
    }
    *pos += 1;
    Some(node)
}

fn parse_list(chars: &[char], pos: &mut usize) -> Option<Vec<FilterNode>> {
    let mut nodes = Vec::new();
    while chars.get(*pos) == Some(&'(') {
        nodes.push(parse_filter(chars, pos)?);
    }
    Some(nodes)
}

fn parse_item(chars: &[char], pos: &mut usize) -> Option<FilterNode> {
    let start = *pos;
    while *pos < chars.len() && chars[*pos] != ')' {
        *pos += 1;
    }
    let item: String = chars[start..*pos].iter().collect();
    let (attribute, value) = item.split_once('=')?;
    let attribute = attribute.trim().to_string();

    if value == "*" {
        return Some(FilterNode::Present(attribute));
    }
    if value.contains('*') {
        let parts = value.split('*').map(unescape).collect();
        return Some(FilterNode::Substring(attribute, parts));
    }
    Some(FilterNode::Equals(attribute, unescape(value)))
}

fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('\\') {
        result.push_str(&rest[..idx]);
        let hex = rest.get(idx + 1..idx + 3);
        match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
            Some(byte) => {
                result.push(char::from(byte));
                rest = &rest[idx + 3..];
            }
            None => {
                result.push('\\');
                rest = &rest[idx + 1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn substring_match(value: &str, parts: &[String]) -> bool {
    let value = value.to_lowercase();
    let last = parts.len().saturating_sub(1);
    let mut offset = 0;

    for (i, part) in parts.iter().enumerate() {
        let part = part.to_lowercase();
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !value.starts_with(&part) {
                return false;
            }
            offset = part.len();
        } else if i == last {
            return value.len() >= offset + part.len() && value[offset..].ends_with(&part);
        } else {
            match value[offset..].find(&part) {
                Some(found) => offset += found + part.len(),
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_entry(
                RawEntry::new("uid=jdoe,ou=People,dc=example,dc=com")
                    .with("objectClass", ["top", "person"])
                    .with("uid", ["jdoe"])
                    .with("cn", ["John Doe"])
                    .with("mail", ["jdoe@example.com"]),
            )
            .with_entry(
                RawEntry::new("uid=asmith,ou=People,dc=example,dc=com")
                    .with("objectClass", ["top", "person"])
                    .with("uid", ["asmith"])
                    .with("cn", ["Alice Smith"]),
            )
            .with_entry(
                RawEntry::new("cn=staff,ou=Group,dc=example,dc=com")
                    .with("objectClass", ["top", "groupOfNames"])
                    .with("cn", ["staff"]),
            )
    }

    async fn dns(directory: &MemoryDirectory, base: &str, filter: &str) -> Vec<String> {
        directory
            .search(base, filter, &[], None)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.dn)
            .collect()
    }

    #[tokio::test]
    async fn test_search_scopes_to_subtree() {
        let directory = directory();
        let found = dns(&directory, "ou=People,dc=example,dc=com", "(objectClass=*)").await;
        assert_eq!(found.len(), 2);

        let found = dns(&directory, "dc=example,dc=com", "(objectClass=*)").await;
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_search_filters() {
        let directory = directory();
        let base = "dc=example,dc=com";

        assert_eq!(dns(&directory, base, "(uid=JDOE)").await.len(), 1);
        assert_eq!(dns(&directory, base, "(|(uid=jdoe)(uid=asmith))").await.len(), 2);
        assert_eq!(
            dns(&directory, base, "(&(objectClass=person)(cn=Alice*))").await,
            vec!["uid=asmith,ou=People,dc=example,dc=com"]
        );
        assert_eq!(dns(&directory, base, "(mail=*)").await.len(), 1);
        assert_eq!(dns(&directory, base, "(!(objectClass=person))").await.len(), 1);
        assert_eq!(dns(&directory, base, "((uid=jdoe))").await.len(), 1);
        assert_eq!(dns(&directory, base, "(cn=*Smi*)").await.len(), 1);
    }

    #[tokio::test]
    async fn test_search_unescapes_values() {
        let directory = MemoryDirectory::new()
            .with_entry(RawEntry::new("cn=Acme (EMEA),dc=com").with("cn", ["Acme (EMEA)"]));
        assert_eq!(dns(&directory, "dc=com", "(cn=Acme \\28EMEA\\29)").await.len(), 1);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_filter() {
        let directory = directory();
        let err = directory
            .search("dc=example,dc=com", "(uid=jdoe", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "SEARCH_FAILED");
    }

    #[tokio::test]
    async fn test_search_limit_and_projection() {
        let directory = directory();
        let set = directory
            .search(
                "ou=People,dc=example,dc=com",
                "(objectClass=*)",
                &["UID".to_string()],
                Some(1),
            )
            .await
            .unwrap();

        assert_eq!(set.count(), 1);
        assert_eq!(set.entries[0].attributes.len(), 1);
        assert_eq!(set.entries[0].attributes[0].name, "uid");
    }

    #[tokio::test]
    async fn test_read_one() {
        let directory = directory();
        let entry = directory
            .read_one("CN=staff,ou=Group,dc=example,dc=com", "(objectClass=*)", &[])
            .await
            .unwrap();
        assert!(entry.is_some());

        let missing = directory
            .read_one("cn=nobody,dc=example,dc=com", "(objectClass=*)", &[])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_writes() {
        let directory = directory();
        let dn = "uid=bjensen,ou=People,dc=example,dc=com";
        let attrs = vec![("uid".to_string(), vec!["bjensen".to_string()])];

        directory.add(dn, &attrs).await.unwrap();
        assert!(matches!(
            directory.add(dn, &attrs).await,
            Err(MapperError::ObjectAlreadyExists { .. })
        ));

        directory
            .modify_replace(dn, &[("cn".to_string(), vec!["Babs Jensen".to_string()])])
            .await
            .unwrap();
        assert_eq!(
            directory.entry(dn).unwrap().values("cn").unwrap(),
            ["Babs Jensen".to_string()]
        );

        directory.delete(dn).await.unwrap();
        assert!(matches!(
            directory.delete(dn).await,
            Err(MapperError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_substring_match() {
        let parts = |p: &str| p.split('*').map(str::to_string).collect::<Vec<_>>();
        assert!(substring_match("John Doe", &parts("john*")));
        assert!(substring_match("John Doe", &parts("*doe")));
        assert!(substring_match("John Doe", &parts("j*n*e")));
        assert!(!substring_match("John Doe", &parts("*smith*")));
        assert!(!substring_match("ab", &parts("ab*b")));
    }
}
