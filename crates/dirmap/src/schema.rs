//! Directory schema attribute map and its per-connection cache.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::MapperResult;
use crate::traits::Directory;

/// Attribute name (lower-cased) → syntax OID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaAttributeMap {
    syntaxes: HashMap<String, String>,
}

impl SchemaAttributeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute definition using builder pattern.
    #[must_use]
    pub fn with(mut self, name: &str, syntax: impl Into<String>) -> Self {
        self.insert(name, syntax);
        self
    }

    /// Add an attribute definition.
    pub fn insert(&mut self, name: &str, syntax: impl Into<String>) {
        self.syntaxes.insert(name.to_lowercase(), syntax.into());
    }

    /// Syntax OID of an attribute, by case-insensitive name.
    pub fn syntax(&self, name: &str) -> Option<&str> {
        self.syntaxes.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Check if an attribute is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.syntaxes.contains_key(&name.to_lowercase())
    }

    /// Get the number of defined attributes.
    pub fn len(&self) -> usize {
        self.syntaxes.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.syntaxes.is_empty()
    }

    /// Iterate over (name, syntax) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.syntaxes
            .iter()
            .map(|(name, syntax)| (name.as_str(), syntax.as_str()))
    }
}

impl FromIterator<(String, String)> for SchemaAttributeMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, syntax) in iter {
            map.insert(&name, syntax);
        }
        map
    }
}

static SCHEMA_CACHE: LazyLock<RwLock<HashMap<String, Arc<SchemaAttributeMap>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Process-wide schema cache keyed by connection identity.
///
/// The map for a connection is fetched on first use and kept for the rest
/// of the process. Failed fetches are not cached.
pub struct SchemaCache;

impl SchemaCache {
    /// Get the schema map for `directory`, fetching it on first use.
    pub async fn get_or_fetch(directory: &dyn Directory) -> MapperResult<Arc<SchemaAttributeMap>> {
        let identity = directory.identity();

        {
            let cache = SCHEMA_CACHE.read().await;
            if let Some(schema) = cache.get(&identity) {
                return Ok(Arc::clone(schema));
            }
        }

        debug!(identity = %identity, "Fetching directory schema");
        let schema = Arc::new(directory.fetch_schema().await?);

        let mut cache = SCHEMA_CACHE.write().await;
        let schema = cache.entry(identity.clone()).or_insert(schema);
        info!(
            identity = %identity,
            attribute_count = schema.len(),
            "Directory schema cached"
        );
        Ok(Arc::clone(schema))
    }

    /// Drop the cached map for a connection identity.
    pub async fn invalidate(identity: &str) {
        SCHEMA_CACHE.write().await.remove(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let map = SchemaAttributeMap::new().with("givenName", "1.3.6.1.4.1.1466.115.121.1.15");
        assert!(map.contains("givenname"));
        assert!(map.contains("GIVENNAME"));
        assert_eq!(
            map.syntax("GivenName"),
            Some("1.3.6.1.4.1.1466.115.121.1.15")
        );
        assert!(!map.contains("sn"));
    }

    #[tokio::test]
    async fn test_cache_fetches_once_per_identity() {
        let directory = MemoryDirectory::with_identity("memory://schema-cache-once")
            .with_schema(SchemaAttributeMap::new().with("cn", "1.3.6.1.4.1.1466.115.121.1.15"));

        let first = SchemaCache::get_or_fetch(&directory).await.unwrap();
        let second = SchemaCache::get_or_fetch(&directory).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(directory.schema_fetches(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let directory = MemoryDirectory::with_identity("memory://schema-cache-failing");
        directory.fail_schema(true);

        assert!(SchemaCache::get_or_fetch(&directory).await.is_err());

        directory.fail_schema(false);
        assert!(SchemaCache::get_or_fetch(&directory).await.is_ok());
        assert_eq!(directory.schema_fetches(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let directory = MemoryDirectory::with_identity("memory://schema-cache-invalidate");

        SchemaCache::get_or_fetch(&directory).await.unwrap();
        SchemaCache::invalidate("memory://schema-cache-invalidate").await;
        SchemaCache::get_or_fetch(&directory).await.unwrap();

        assert_eq!(directory.schema_fetches(), 2);
    }
}
