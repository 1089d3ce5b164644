//! Relationship resolution.
//!
//! A relation names one local attribute and the remote attribute it matches
//! in another subtree. For every value of the local attribute a secondary
//! lookup is issued: a by-DN read when the remote attribute is `dn`, a
//! subtree search otherwise. Lookups run one at a time in record order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dn;
use crate::error::MapperResult;
use crate::filter::{self, Conditions, MATCH_ALL};
use crate::normalize::normalize_entry;
use crate::record::{Record, ShapedRecord};
use crate::traits::Directory;

/// A declared relationship to records in another subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Attribute of the local record holding the match values.
    pub local_key: String,

    /// Attribute of the related records to match against (`dn` for by-DN
    /// lookups).
    pub remote_attribute: String,

    /// Base DN of the related subtree. Its first component value labels the
    /// attached records.
    pub base: String,

    /// Attributes to fetch for related records (empty = all).
    #[serde(default)]
    pub fields: Vec<String>,
}

impl RelationSpec {
    /// Create a relation.
    pub fn new(
        local_key: impl Into<String>,
        remote_attribute: impl Into<String>,
        base: impl Into<String>,
    ) -> Self {
        Self {
            local_key: local_key.into(),
            remote_attribute: remote_attribute.into(),
            base: base.into(),
            fields: Vec::new(),
        }
    }

    /// Set the attributes fetched for related records.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn by_dn(&self) -> bool {
        self.remote_attribute.eq_ignore_ascii_case("dn")
    }
}

/// How matches from several local values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Matches from every local value accumulate.
    BelongsTo,
    /// Only the matches of the last local value with any result are kept.
    HasMany,
}

/// Attach records the local records belong to.
pub async fn resolve_belongs_to(
    directory: &dyn Directory,
    results: Vec<ShapedRecord>,
    spec: &RelationSpec,
) -> MapperResult<Vec<ShapedRecord>> {
    resolve(directory, results, spec, RelationKind::BelongsTo).await
}

/// Attach records the local records have many of.
pub async fn resolve_has_many(
    directory: &dyn Directory,
    results: Vec<ShapedRecord>,
    spec: &RelationSpec,
) -> MapperResult<Vec<ShapedRecord>> {
    resolve(directory, results, spec, RelationKind::HasMany).await
}

/// Resolve `spec` for every record in `results`.
///
/// Records without a value for the local key, or whose lookups match
/// nothing, are returned unchanged. Related records are not expanded
/// further.
pub async fn resolve(
    directory: &dyn Directory,
    mut results: Vec<ShapedRecord>,
    spec: &RelationSpec,
    kind: RelationKind,
) -> MapperResult<Vec<ShapedRecord>> {
    let local_key = spec.local_key.to_lowercase();
    let label = dn::leaf_label(&spec.base)?;

    debug!(
        local_key = %local_key,
        remote_attribute = %spec.remote_attribute,
        base = %spec.base,
        kind = ?kind,
        "Resolving relation"
    );

    for shaped in &mut results {
        let Some(local_value) = shaped.record.get(&local_key) else {
            continue;
        };

        let mut found: Vec<Record> = Vec::new();
        for value in local_value.values() {
            let matches = lookup(directory, spec, value).await?;
            if matches.is_empty() {
                continue;
            }
            match kind {
                RelationKind::BelongsTo => found.extend(matches),
                RelationKind::HasMany => found = matches,
            }
        }

        if !found.is_empty() {
            shaped.related.insert(label.clone(), found);
        }
    }

    Ok(results)
}

async fn lookup(
    directory: &dyn Directory,
    spec: &RelationSpec,
    value: &str,
) -> MapperResult<Vec<Record>> {
    if spec.by_dn() {
        let entry = directory.read_one(value, MATCH_ALL, &spec.fields).await?;
        return Ok(entry.iter().map(normalize_entry).collect());
    }

    let filter = filter::compile(&Conditions::eq(spec.remote_attribute.as_str(), value));
    let raw = directory
        .search(&spec.base, &filter, &spec.fields, None)
        .await?;
    Ok(raw.entries.iter().map(normalize_entry).collect())
}
