//! # Directory Data Mapper
//!
//! Maps directory-protocol entries into flat, application-friendly records.
//!
//! A [`Mapper`](mapper::Mapper) turns a [`Query`](query::Query) into a
//! directory filter, runs it against a [`Directory`](traits::Directory),
//! flattens the multi-valued results and optionally expands declared
//! relationships with secondary lookups.
//!
//! ## Example
//!
//! ```ignore
//! use dirmap::prelude::*;
//!
//! let model = Model::new("person", "ou=People,dc=example,dc=com");
//! let mapper = Mapper::new(directory, model)?;
//!
//! let result = mapper
//!     .find(
//!         Query::first()
//!             .with_conditions("uid=jdoe")
//!             .belongs_to(RelationSpec::new("memberOf", "dn", "ou=Group,dc=example,dc=com")),
//!     )
//!     .await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`filter`] - Condition to filter compilation
//! - [`fields`] - Attribute projection
//! - [`dn`] - Distinguished-name parsing and building
//! - [`normalize`] - Raw result flattening
//! - [`relation`] - Relationship resolution
//! - [`query`] - Query builder
//! - [`mapper`] - Query orchestration and writes
//! - [`schema`] - Schema attribute map and cache
//! - [`traits`] - Directory client trait
//! - [`memory`] - In-memory directory

pub mod dn;
pub mod error;
pub mod fields;
pub mod filter;
pub mod mapper;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod query;
pub mod record;
pub mod relation;
pub mod schema;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use dirmap::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{MapperError, MapperResult};

    // Records
    pub use crate::record::{RawAttribute, RawEntry, RawEntrySet, Record, ShapedRecord, Value};

    // Queries
    pub use crate::fields::FieldList;
    pub use crate::filter::{Combine, Conditions};
    pub use crate::query::{Query, QueryType};
    pub use crate::relation::{RelationKind, RelationSpec};

    // Orchestration
    pub use crate::mapper::{FindResult, Mapper, OptionList};
    pub use crate::model::{Model, ObjectKind};

    // Directory access
    pub use crate::memory::{DirectoryCall, MemoryDirectory};
    pub use crate::schema::{SchemaAttributeMap, SchemaCache};
    pub use crate::traits::Directory;
}

// Re-export async_trait for directory implementors
pub use async_trait::async_trait;
