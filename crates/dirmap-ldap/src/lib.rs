//! # LDAP Directory
//!
//! LDAP binding for the dirmap data-mapping core.
//!
//! This crate implements [`dirmap::traits::Directory`] with the `ldap3`
//! async client so a `Mapper` can run against a real directory server.
//!
//! ## Features
//!
//! - LDAP v3 protocol support
//! - SSL/TLS and STARTTLS
//! - Lazily established, cached connection with simple bind
//! - Size-limited subtree search and base-scope reads
//! - Add, modify-replace and delete
//! - Schema attribute types from the subschema entry
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dirmap::prelude::*;
//! use dirmap_ldap::{LdapConfig, LdapDirectory};
//!
//! let config = LdapConfig::from_env()?;
//! let directory = Arc::new(LdapDirectory::new(config)?);
//! directory.connect().await?;
//!
//! let people = Mapper::new(directory, Model::new("person", "ou=People,dc=example,dc=com"))?;
//! let jdoe = people.find_by("uid", "jdoe").await?;
//! ```

pub mod config;
pub mod directory;
pub mod schema;

// Re-exports
pub use config::{ConfigError, LdapConfig};
pub use directory::LdapDirectory;
