//! Directory client trait
//!
//! The primitives the mapper consumes from a directory-protocol client.
//! Implementations own connection, bind and transport concerns.

use async_trait::async_trait;

use crate::error::MapperResult;
use crate::record::{RawEntry, RawEntrySet};
use crate::schema::SchemaAttributeMap;

/// A connected directory the mapper can query and write to.
///
/// The mapper issues at most one operation at a time against an
/// implementation and awaits each before issuing the next.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Identity of the underlying connection (used to key per-connection
    /// caches), e.g. `ldap://host:389 as cn=admin,dc=example,dc=com`.
    fn identity(&self) -> String;

    /// Subtree search below `base_dn`.
    ///
    /// An empty `attributes` slice requests all user attributes. `limit`
    /// caps the number of returned entries.
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
        limit: Option<u32>,
    ) -> MapperResult<RawEntrySet>;

    /// Read a single entry by DN. Returns `Ok(None)` if it does not exist
    /// or does not match `filter`.
    async fn read_one(
        &self,
        dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> MapperResult<Option<RawEntry>>;

    /// Sort entries in place by the first value of `attribute`.
    ///
    /// No-op when `attribute` is `None`. Entries missing the attribute sort
    /// as if the value were empty.
    fn sort_entries(&self, entries: &mut RawEntrySet, attribute: Option<&str>) {
        let Some(attribute) = attribute else {
            return;
        };

        entries.entries.sort_by(|a, b| {
            let key_a = a.values(attribute).and_then(|v| v.first());
            let key_b = b.values(attribute).and_then(|v| v.first());
            key_a
                .map(String::as_str)
                .unwrap_or("")
                .cmp(key_b.map(String::as_str).unwrap_or(""))
        });
    }

    /// Add a new entry.
    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> MapperResult<()>;

    /// Replace the values of the given attributes on an existing entry.
    async fn modify_replace(
        &self,
        dn: &str,
        attributes: &[(String, Vec<String>)],
    ) -> MapperResult<()>;

    /// Delete an entry.
    async fn delete(&self, dn: &str) -> MapperResult<()>;

    /// Read the attribute type definitions of the directory schema.
    async fn fetch_schema(&self) -> MapperResult<SchemaAttributeMap>;
}
