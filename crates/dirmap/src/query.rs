//! Query intents.
//!
//! [`Query`] is an immutable builder: every `with_*` call consumes the
//! query and returns a new one.

use std::fmt;
use std::str::FromStr;

use crate::error::MapperError;
use crate::fields::FieldList;
use crate::filter::Conditions;
use crate::relation::RelationSpec;

/// Shape of a find result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// The first matching record.
    First,
    /// Every matching record.
    All,
    /// The number of matching entries.
    Count,
    /// Key → display value pairs for option lists.
    List,
}

impl QueryType {
    /// Get the type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::First => "first",
            QueryType::All => "all",
            QueryType::Count => "count",
            QueryType::List => "list",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(QueryType::First),
            "all" => Ok(QueryType::All),
            "count" => Ok(QueryType::Count),
            "list" => Ok(QueryType::List),
            _ => Err(MapperError::InvalidQueryType {
                value: s.to_string(),
            }),
        }
    }
}

/// A find request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    query_type: QueryType,
    conditions: Conditions,
    fields: FieldList,
    limit: Option<u32>,
    order: Option<String>,
    belongs_to: Option<RelationSpec>,
    has_many: Option<RelationSpec>,
}

impl Query {
    /// Create a query of the given type matching everything.
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            conditions: Conditions::default(),
            fields: FieldList::None,
            limit: None,
            order: None,
            belongs_to: None,
            has_many: None,
        }
    }

    /// Create a query from a type name, failing on unknown names.
    pub fn parse(query_type: &str) -> Result<Self, MapperError> {
        Ok(Self::new(query_type.parse()?))
    }

    /// A `first` query.
    pub fn first() -> Self {
        Self::new(QueryType::First)
    }

    /// An `all` query.
    pub fn all() -> Self {
        Self::new(QueryType::All)
    }

    /// A `count` query.
    pub fn count() -> Self {
        Self::new(QueryType::Count)
    }

    /// A `list` query.
    pub fn list() -> Self {
        Self::new(QueryType::List)
    }

    /// Replace the match conditions.
    #[must_use]
    pub fn with_conditions(self, conditions: impl Into<Conditions>) -> Self {
        Self {
            conditions: conditions.into(),
            ..self
        }
    }

    /// Request specific attributes instead of all of them.
    #[must_use]
    pub fn with_fields(self, fields: impl Into<FieldList>) -> Self {
        Self {
            fields: fields.into(),
            ..self
        }
    }

    /// Cap the number of entries. Zero means no cap.
    #[must_use]
    pub fn with_limit(self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    /// Sort by the first value of an attribute.
    #[must_use]
    pub fn with_order(self, attribute: impl Into<String>) -> Self {
        Self {
            order: Some(attribute.into()),
            ..self
        }
    }

    /// Attach records this record points to.
    #[must_use]
    pub fn belongs_to(self, relation: RelationSpec) -> Self {
        Self {
            belongs_to: Some(relation),
            ..self
        }
    }

    /// Attach records pointing back at this record.
    #[must_use]
    pub fn has_many(self, relation: RelationSpec) -> Self {
        Self {
            has_many: Some(relation),
            ..self
        }
    }

    /// Query type.
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Match conditions.
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Requested attributes.
    pub fn fields(&self) -> &FieldList {
        &self.fields
    }

    /// Sort attribute, if any.
    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    /// The belongsTo relation, if any.
    pub fn belongs_to_relation(&self) -> Option<&RelationSpec> {
        self.belongs_to.as_ref()
    }

    /// The hasMany relation, if any.
    pub fn has_many_relation(&self) -> Option<&RelationSpec> {
        self.has_many.as_ref()
    }

    /// Size limit sent to the directory. `first` always uses 1.
    pub fn effective_limit(&self) -> Option<u32> {
        match self.query_type {
            QueryType::First => Some(1),
            _ => self.limit.filter(|limit| *limit > 0),
        }
    }
}
