//! Query orchestration and the write path.

use std::ops::Index;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument, warn};

use crate::dn;
use crate::error::{MapperError, MapperResult};
use crate::fields;
use crate::filter::{self, Conditions};
use crate::model::Model;
use crate::normalize::normalize;
use crate::query::{Query, QueryType};
use crate::record::{Record, ShapedRecord};
use crate::relation::{resolve_belongs_to, resolve_has_many};
use crate::schema::{SchemaAttributeMap, SchemaCache};
use crate::traits::Directory;

/// Outcome of [`Mapper::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindResult {
    /// `first` with a match.
    First(ShapedRecord),
    /// `all` with at least one match.
    All(Vec<ShapedRecord>),
    /// `count`, including zero.
    Count(usize),
    /// `list` with at least one match.
    List(OptionList),
    /// Nothing matched.
    Empty,
}

impl FindResult {
    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        matches!(self, FindResult::Empty)
    }

    /// The first record of a `first` or `all` result.
    pub fn into_first(self) -> Option<ShapedRecord> {
        match self {
            FindResult::First(record) => Some(record),
            FindResult::All(records) => records.into_iter().next(),
            _ => None,
        }
    }

    /// Every record of a `first` or `all` result.
    pub fn into_all(self) -> Vec<ShapedRecord> {
        match self {
            FindResult::First(record) => vec![record],
            FindResult::All(records) => records,
            _ => Vec::new(),
        }
    }

    /// The count of a `count` result.
    pub fn count(&self) -> Option<usize> {
        match self {
            FindResult::Count(count) => Some(*count),
            _ => None,
        }
    }

    /// The option list of a `list` result.
    pub fn into_list(self) -> OptionList {
        match self {
            FindResult::List(list) => list,
            _ => OptionList::default(),
        }
    }
}

/// Key → display value pairs in result order.
///
/// A repeated key overwrites the earlier value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    entries: Vec<(String, String)>,
}

impl OptionList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Display value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Keys in result order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for OptionList {
    type Output = String;

    fn index(&self, key: &str) -> &String {
        match self.entries.iter().find(|(k, _)| k == key) {
            Some((_, value)) => value,
            None => panic!("no option list entry for key '{key}'"),
        }
    }
}

impl FromIterator<(String, String)> for OptionList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut list = OptionList::new();
        for (key, value) in iter {
            list.insert(key, value);
        }
        list
    }
}

impl Serialize for OptionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for FindResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FindResult::First(record) => record.serialize(serializer),
            FindResult::All(records) => records.serialize(serializer),
            FindResult::Count(count) => serializer.serialize_u64(*count as u64),
            FindResult::List(list) => list.serialize(serializer),
            FindResult::Empty => serializer.serialize_bool(false),
        }
    }
}

/// Maps one object class of a directory into records.
pub struct Mapper {
    directory: Arc<dyn Directory>,
    model: Model,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("directory", &self.directory.identity())
            .field("model", &self.model)
            .finish()
    }
}

impl Mapper {
    /// Create a mapper after validating the model.
    pub fn new(directory: Arc<dyn Directory>, model: Model) -> MapperResult<Self> {
        model.validate()?;
        Ok(Self { directory, model })
    }

    /// The mapped model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The directory this mapper reads and writes.
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Run a query.
    ///
    /// An empty search yields [`FindResult::Empty`] (or `Count(0)`); directory
    /// failures are returned as errors.
    #[instrument(
        skip(self, query),
        fields(model = %self.model.name, query_type = %query.query_type())
    )]
    pub async fn find(&self, query: Query) -> MapperResult<FindResult> {
        let query_type = query.query_type();
        let filter = filter::compile(query.conditions());
        let requested = query.fields().clone().into_names();
        let mut attributes = fields::select(requested.clone(), &self.model.default_fields);

        let list_key = self.model.list_key();
        if query_type == QueryType::List {
            ensure_projected(&mut attributes, list_key);
        }
        if let Some(order) = query.order() {
            ensure_projected(&mut attributes, order);
        }

        let limit = query.effective_limit();
        debug!(
            base_dn = %self.model.base_dn,
            filter = %filter,
            attributes = ?attributes,
            limit = ?limit,
            "Executing find"
        );

        let mut raw = self
            .directory
            .search(&self.model.base_dn, &filter, &attributes, limit)
            .await?;

        if query_type == QueryType::Count {
            debug!(count = raw.count(), "Count query complete");
            return Ok(FindResult::Count(raw.count()));
        }

        self.directory.sort_entries(&mut raw, query.order());

        let mut shaped = match normalize(&raw, &self.model.name) {
            Ok(shaped) => shaped,
            Err(e) if e.is_no_results() => {
                debug!("Find matched nothing");
                return Ok(FindResult::Empty);
            }
            Err(e) => return Err(e),
        };

        if query_type == QueryType::List {
            let display = requested.first().map_or(list_key, String::as_str);
            return Ok(FindResult::List(build_list(&shaped, list_key, display)));
        }

        if let Some(relation) = query.belongs_to_relation() {
            shaped = resolve_belongs_to(self.directory(), shaped, relation).await?;
        }
        if let Some(relation) = query.has_many_relation() {
            shaped = resolve_has_many(self.directory(), shaped, relation).await?;
        }

        debug!(count = shaped.len(), "Find complete");
        Ok(match query_type {
            QueryType::First => shaped
                .into_iter()
                .next()
                .map_or(FindResult::Empty, FindResult::First),
            _ => FindResult::All(shaped),
        })
    }

    /// First record whose `attribute` equals `value`.
    pub async fn find_by(&self, attribute: &str, value: &str) -> MapperResult<Option<ShapedRecord>> {
        let query = Query::first().with_conditions(Conditions::eq(attribute, value));
        Ok(self.find(query).await?.into_first())
    }

    /// Every record whose `attribute` equals `value`.
    pub async fn find_all_by(&self, attribute: &str, value: &str) -> MapperResult<Vec<ShapedRecord>> {
        let query = Query::all().with_conditions(Conditions::eq(attribute, value));
        Ok(self.find(query).await?.into_all())
    }

    /// Schema attribute map of the underlying directory.
    pub async fn describe(&self) -> MapperResult<Arc<SchemaAttributeMap>> {
        SchemaCache::get_or_fetch(self.directory()).await
    }

    /// Add a new entry and return its DN.
    ///
    /// When `record.dn` is empty the DN is built from the model's naming
    /// attribute and base DN. The model's object classes are written unless
    /// the record carries its own.
    #[instrument(skip(self, record), fields(model = %self.model.name))]
    pub async fn create(&self, record: Record) -> MapperResult<String> {
        let dn = if record.dn.trim().is_empty() {
            self.derive_dn(&record)?
        } else {
            record.dn.clone()
        };

        self.validate_attributes(record.attributes.keys()).await?;

        let mut attributes: Vec<(String, Vec<String>)> = Vec::new();
        if !record.has("objectclass") {
            attributes.push((
                "objectClass".to_string(),
                self.model.creation_object_classes(),
            ));
        }
        attributes.extend(
            record
                .attributes
                .into_iter()
                .map(|(name, value)| (name, value.into_strings())),
        );

        self.directory.add(&dn, &attributes).await?;
        info!(dn = %dn, "Entry created");
        Ok(dn)
    }

    /// Replace the given attributes on the entry at `record.dn`.
    #[instrument(skip(self, record), fields(model = %self.model.name, dn = %record.dn))]
    pub async fn update(&self, record: Record) -> MapperResult<()> {
        if record.dn.trim().is_empty() {
            return Err(MapperError::InvalidData {
                message: "update requires a DN".to_string(),
            });
        }
        if record.is_empty() {
            debug!("No attributes to update");
            return Ok(());
        }

        self.validate_attributes(record.attributes.keys()).await?;

        let attributes: Vec<(String, Vec<String>)> = record
            .attributes
            .into_iter()
            .map(|(name, value)| (name, value.into_strings()))
            .collect();

        self.directory.modify_replace(&record.dn, &attributes).await?;
        info!(dn = %record.dn, attributes = attributes.len(), "Entry updated");
        Ok(())
    }

    /// Delete the entry at `dn`.
    #[instrument(skip(self), fields(model = %self.model.name))]
    pub async fn delete(&self, dn: &str) -> MapperResult<()> {
        self.directory.delete(dn).await?;
        info!(dn = %dn, "Entry deleted");
        Ok(())
    }

    fn derive_dn(&self, record: &Record) -> MapperResult<String> {
        let naming = self.model.naming_attribute();
        let value = record
            .get(naming)
            .and_then(|v| v.first().map(str::to_string))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MapperError::InvalidData {
                message: format!("missing naming attribute '{naming}'"),
            })?;

        Ok(dn::build(
            format!("{naming}={}", dn::escape_value(&value)),
            &self.model.base_dn,
        ))
    }

    async fn validate_attributes<'a>(
        &self,
        names: impl Iterator<Item = &'a String>,
    ) -> MapperResult<()> {
        let schema = match SchemaCache::get_or_fetch(self.directory()).await {
            Ok(schema) => schema,
            Err(MapperError::SchemaFetchFailed { message }) => {
                warn!(error = %message, "Schema unavailable, skipping attribute validation");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if schema.is_empty() {
            debug!("Directory publishes no attribute types, skipping attribute validation");
            return Ok(());
        }

        for name in names {
            if !schema.contains(name) {
                return Err(MapperError::UnknownAttribute {
                    attribute: name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Append `attribute` to an explicit projection that lacks it.
fn ensure_projected(attributes: &mut Vec<String>, attribute: &str) {
    if !attributes.is_empty() && !attributes.iter().any(|a| a.eq_ignore_ascii_case(attribute)) {
        attributes.push(attribute.to_string());
    }
}

fn build_list(records: &[ShapedRecord], key: &str, display: &str) -> OptionList {
    records
        .iter()
        .filter_map(|shaped| {
            let key = shaped.record.get(key)?.first()?.to_string();
            let value = shaped
                .record
                .get(display)
                .and_then(|v| v.first().map(str::to_string))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect()
}
