//! LDAP directory implementation
//!
//! Implements the `Directory` trait on top of the `ldap3` async client.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use dirmap::error::{MapperError, MapperResult};
use dirmap::record::{RawAttribute, RawEntry, RawEntrySet};
use dirmap::schema::SchemaAttributeMap;
use dirmap::traits::Directory;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry, SearchOptions};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::LdapConfig;
use crate::schema::parse_attribute_types;

const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ALREADY_EXISTS: u32 = 68;

const MATCH_ALL: &str = "(objectClass=*)";

/// A directory reached over LDAP.
pub struct LdapDirectory {
    /// Configuration.
    config: LdapConfig,

    /// Cached LDAP connection (lazily initialized).
    connection: Arc<RwLock<Option<Ldap>>>,

    /// Whether the directory has been disposed.
    disposed: Arc<RwLock<bool>>,
}

impl LdapDirectory {
    /// Create a new LDAP directory with the given configuration.
    pub fn new(config: LdapConfig) -> MapperResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            disposed: Arc::new(RwLock::new(false)),
        })
    }

    /// The connection configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Connect and bind now instead of on first use.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> MapperResult<()> {
        self.get_connection().await.map(|_| ())
    }

    /// Unbind and drop the cached connection. Later calls fail.
    pub async fn dispose(&self) -> MapperResult<()> {
        *self.disposed.write().await = true;

        let mut conn_guard = self.connection.write().await;
        if let Some(mut ldap) = conn_guard.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
        }

        info!(identity = %self.config.identity(), "LDAP directory disposed");
        Ok(())
    }

    /// Get an LDAP connection, creating one if necessary.
    async fn get_connection(&self) -> MapperResult<Ldap> {
        if *self.disposed.read().await {
            return Err(MapperError::InvalidConfiguration {
                message: "directory has been disposed".to_string(),
            });
        }

        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        {
            let mut conn_guard = self.connection.write().await;
            *conn_guard = Some(conn.clone());
        }

        Ok(conn)
    }

    /// Create a new LDAP connection and bind.
    async fn create_connection(&self) -> MapperResult<Ldap> {
        let url = self.config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connection_timeout_secs))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                MapperError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                MapperError::connection_failed_with_source(
                    format!("LDAP bind failed for {bind_dn}"),
                    e,
                )
            })?;

        if result.rc != RC_SUCCESS {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(MapperError::AuthenticationFailed);
            }
            return Err(MapperError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "LDAP connection established successfully");

        Ok(ldap)
    }

    fn search_options(&self, limit: Option<u32>) -> SearchOptions {
        let timelimit = i32::try_from(self.config.search_timeout_secs).unwrap_or(i32::MAX);
        let options = SearchOptions::new().timelimit(timelimit);
        match limit {
            Some(limit) => options.sizelimit(i32::try_from(limit).unwrap_or(i32::MAX)),
            None => options,
        }
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    fn identity(&self) -> String {
        self.config.identity()
    }

    #[instrument(skip(self, attributes))]
    async fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
        limit: Option<u32>,
    ) -> MapperResult<RawEntrySet> {
        let mut ldap = self.get_connection().await?;
        let base_dn = self.config.qualify(base_dn);

        debug!(filter = %filter, base_dn = %base_dn, attributes = ?attributes, "Searching LDAP");

        let ldap3::SearchResult(entries, result) = ldap
            .with_search_options(self.search_options(limit))
            .search(&base_dn, Scope::Subtree, filter, requested_attributes(attributes))
            .await
            .map_err(|e| MapperError::search_failed_with_source("LDAP search failed", e))?;

        match result.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => {}
            RC_NO_SUCH_OBJECT => {
                debug!(base_dn = %base_dn, "Search base does not exist");
                return Ok(RawEntrySet::default());
            }
            _ => return Err(MapperError::search_failed(describe(&result))),
        }

        let entries: Vec<RawEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(raw_entry_from_search)
            .collect();

        info!(
            returned = entries.len(),
            truncated = result.rc == RC_SIZE_LIMIT_EXCEEDED,
            "LDAP search completed"
        );

        Ok(RawEntrySet::new(entries))
    }

    #[instrument(skip(self, attributes))]
    async fn read_one(
        &self,
        dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> MapperResult<Option<RawEntry>> {
        let mut ldap = self.get_connection().await?;

        let ldap3::SearchResult(entries, result) = ldap
            .search(dn, Scope::Base, filter, requested_attributes(attributes))
            .await
            .map_err(|e| MapperError::read_failed_with_source(dn, "LDAP read failed", e))?;

        match result.rc {
            RC_SUCCESS => {}
            RC_NO_SUCH_OBJECT => return Ok(None),
            _ => return Err(MapperError::read_failed(dn, describe(&result))),
        }

        Ok(entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .map(raw_entry_from_search))
    }

    #[instrument(skip(self, attributes))]
    async fn add(&self, dn: &str, attributes: &[(String, Vec<String>)]) -> MapperResult<()> {
        let mut ldap = self.get_connection().await?;

        debug!(dn = %dn, "Creating LDAP entry");

        let ldap_attrs: Vec<(&str, HashSet<&str>)> = attributes
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name.as_str(), values.iter().map(String::as_str).collect()))
            .collect();

        let result = ldap.add(dn, ldap_attrs).await.map_err(|e| {
            MapperError::write_failed_with_source("add", dn, "LDAP add failed", e)
        })?;

        match result.rc {
            RC_SUCCESS => {}
            RC_ALREADY_EXISTS => {
                return Err(MapperError::ObjectAlreadyExists { dn: dn.to_string() });
            }
            _ => return Err(MapperError::write_failed("add", dn, describe(&result))),
        }

        info!(dn = %dn, "LDAP entry created successfully");
        Ok(())
    }

    #[instrument(skip(self, attributes))]
    async fn modify_replace(
        &self,
        dn: &str,
        attributes: &[(String, Vec<String>)],
    ) -> MapperResult<()> {
        let mut ldap = self.get_connection().await?;

        debug!(dn = %dn, "Updating LDAP entry");

        let mods: Vec<Mod<&str>> = attributes
            .iter()
            .map(|(name, values)| {
                Mod::Replace(name.as_str(), values.iter().map(String::as_str).collect())
            })
            .collect();

        if mods.is_empty() {
            return Ok(());
        }

        let result = ldap.modify(dn, mods).await.map_err(|e| {
            MapperError::write_failed_with_source("modify", dn, "LDAP modify failed", e)
        })?;

        match result.rc {
            RC_SUCCESS => {}
            RC_NO_SUCH_OBJECT => return Err(MapperError::ObjectNotFound { dn: dn.to_string() }),
            _ => return Err(MapperError::write_failed("modify", dn, describe(&result))),
        }

        info!(dn = %dn, "LDAP entry updated successfully");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, dn: &str) -> MapperResult<()> {
        let mut ldap = self.get_connection().await?;

        debug!(dn = %dn, "Deleting LDAP entry");

        let result = ldap.delete(dn).await.map_err(|e| {
            MapperError::write_failed_with_source("delete", dn, "LDAP delete failed", e)
        })?;

        match result.rc {
            RC_SUCCESS => {}
            RC_NO_SUCH_OBJECT => return Err(MapperError::ObjectNotFound { dn: dn.to_string() }),
            _ => return Err(MapperError::write_failed("delete", dn, describe(&result))),
        }

        info!(dn = %dn, "LDAP entry deleted successfully");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_schema(&self) -> MapperResult<SchemaAttributeMap> {
        let mut ldap = self.get_connection().await?;

        // Root DSE names the subschema entry
        let root = ldap
            .search("", Scope::Base, MATCH_ALL, vec!["subschemaSubentry"])
            .await
            .map_err(|e| MapperError::SchemaFetchFailed {
                message: format!("Failed to read root DSE: {e}"),
            })?;

        let (entries, _) = root.success().map_err(|e| MapperError::SchemaFetchFailed {
            message: format!("Root DSE search failed: {e}"),
        })?;

        let schema_dn = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .and_then(|entry| {
                entry
                    .attrs
                    .get("subschemaSubentry")
                    .and_then(|v| v.first().cloned())
            })
            .unwrap_or_else(|| "cn=schema".to_string());

        let result = ldap
            .search(
                &schema_dn,
                Scope::Base,
                "(objectClass=subschema)",
                vec!["attributeTypes"],
            )
            .await
            .map_err(|e| MapperError::SchemaFetchFailed {
                message: format!("Failed to read schema: {e}"),
            })?;

        let (entries, _) = result.success().map_err(|e| MapperError::SchemaFetchFailed {
            message: format!("Schema search failed: {e}"),
        })?;

        let schema_entry = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| MapperError::SchemaFetchFailed {
                message: format!("Schema entry '{schema_dn}' not found"),
            })?;

        let map = schema_entry
            .attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("attributeTypes"))
            .map(|(_, definitions)| parse_attribute_types(definitions))
            .unwrap_or_default();

        info!(
            schema_dn = %schema_dn,
            attribute_count = map.len(),
            "Schema attribute types read"
        );

        Ok(map)
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Attribute list for a search request. Empty asks for all user attributes.
fn requested_attributes(attributes: &[String]) -> Vec<&str> {
    if attributes.is_empty() {
        vec!["*"]
    } else {
        attributes.iter().map(String::as_str).collect()
    }
}

fn describe(result: &LdapResult) -> String {
    format!("LDAP error code {}: {}", result.rc, result.text)
}

/// Convert an ldap3 search entry into a raw entry.
///
/// Attributes are ordered by name. Binary values are base64 encoded.
pub fn raw_entry_from_search(entry: SearchEntry) -> RawEntry {
    let mut attributes: Vec<RawAttribute> = entry
        .attrs
        .into_iter()
        .map(|(name, values)| RawAttribute::new(name, values))
        .collect();

    for (name, values) in entry.bin_attrs {
        let encoded = values
            .iter()
            .map(|v| base64::engine::general_purpose::STANDARD.encode(v));
        attributes.push(RawAttribute::new(name, encoded));
    }

    attributes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    RawEntry {
        dn: entry.dn,
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_directory() -> LdapDirectory {
        LdapDirectory::new(
            LdapConfig::new(
                "ldap.example.com",
                "dc=example,dc=com",
                "cn=admin,dc=example,dc=com",
            )
            .with_password("secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        let err = LdapDirectory::new(LdapConfig::new("", "dc=example,dc=com", "")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_identity() {
        assert_eq!(
            test_directory().identity(),
            "ldap://ldap.example.com:389 as cn=admin,dc=example,dc=com"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let output = format!("{:?}", test_directory());
        assert!(output.contains("ldap.example.com"));
        assert!(!output.contains("secret"));
    }

    #[tokio::test]
    async fn test_disposed_directory_rejects_operations() {
        let directory = test_directory();
        directory.dispose().await.unwrap();

        let err = directory
            .search("dc=example,dc=com", MATCH_ALL, &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_requested_attributes() {
        assert_eq!(requested_attributes(&[]), vec!["*"]);
        assert_eq!(
            requested_attributes(&["cn".to_string(), "mail".to_string()]),
            vec!["cn", "mail"]
        );
    }

    #[test]
    fn test_raw_entry_from_search() {
        let entry = SearchEntry {
            dn: "uid=jdoe,ou=People,dc=example,dc=com".to_string(),
            attrs: HashMap::from([
                ("uid".to_string(), vec!["jdoe".to_string()]),
                (
                    "mail".to_string(),
                    vec!["a@example.com".to_string(), "b@example.com".to_string()],
                ),
            ]),
            bin_attrs: HashMap::from([("jpegPhoto".to_string(), vec![vec![0xff, 0xd8, 0xff]])]),
        };

        let raw = raw_entry_from_search(entry);

        assert_eq!(raw.dn, "uid=jdoe,ou=People,dc=example,dc=com");
        let names: Vec<_> = raw.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["jpegPhoto", "mail", "uid"]);
        assert_eq!(raw.values("mail").unwrap().len(), 2);
        assert_eq!(raw.values("jpegphoto").unwrap(), ["/9j/"]);
    }
}
