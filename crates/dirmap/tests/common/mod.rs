//! Integration test helpers for dirmap.
//!
//! Provides a seeded in-memory directory and mapper constructors.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use dirmap::prelude::*;

static INIT: Once = Once::new();

pub const BASE_DN: &str = "dc=example,dc=com";
pub const PEOPLE_DN: &str = "ou=People,dc=example,dc=com";
pub const GROUP_DN: &str = "ou=Group,dc=example,dc=com";

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Directory with three people and two groups.
///
/// `identity` keys the process-wide schema cache, so every test passes its own.
pub fn seeded_directory(identity: &str) -> Arc<MemoryDirectory> {
    init_test_logging();

    Arc::new(
        MemoryDirectory::with_identity(identity)
            .with_entry(
                RawEntry::new("uid=jdoe,ou=People,dc=example,dc=com")
                    .with("objectClass", ["top", "person", "inetOrgPerson"])
                    .with("uid", ["jdoe"])
                    .with("cn", ["John Doe"])
                    .with("sn", ["Doe"])
                    .with("manager", ["uid=asmith,ou=People,dc=example,dc=com"])
                    .with(
                        "memberOf",
                        [
                            "cn=staff,ou=Group,dc=example,dc=com",
                            "cn=admins,ou=Group,dc=example,dc=com",
                        ],
                    ),
            )
            .with_entry(
                RawEntry::new("uid=asmith,ou=People,dc=example,dc=com")
                    .with("objectClass", ["top", "person", "inetOrgPerson"])
                    .with("uid", ["asmith"])
                    .with("cn", ["Alice Smith"])
                    .with("sn", ["Smith"])
                    .with("mail", ["alice@example.com"]),
            )
            .with_entry(
                RawEntry::new("uid=bjensen,ou=People,dc=example,dc=com")
                    .with("objectClass", ["top", "person", "inetOrgPerson"])
                    .with("uid", ["bjensen"])
                    .with("cn", ["Babs Jensen"])
                    .with("sn", ["Jensen"])
                    .with("mail", ["bjensen@example.com", "babs@example.com"]),
            )
            .with_entry(
                RawEntry::new("cn=staff,ou=Group,dc=example,dc=com")
                    .with("objectClass", ["top", "groupOfNames"])
                    .with("cn", ["staff"])
                    .with(
                        "member",
                        [
                            "uid=jdoe,ou=People,dc=example,dc=com",
                            "uid=asmith,ou=People,dc=example,dc=com",
                        ],
                    )
                    .with("owner", ["asmith"]),
            )
            .with_entry(
                RawEntry::new("cn=admins,ou=Group,dc=example,dc=com")
                    .with("objectClass", ["top", "groupOfNames"])
                    .with("cn", ["admins"])
                    .with("member", ["uid=jdoe,ou=People,dc=example,dc=com"])
                    .with("owner", ["asmith"]),
            ),
    )
}

pub fn person_mapper(directory: &Arc<MemoryDirectory>) -> Mapper {
    Mapper::new(directory.clone(), Model::new("person", PEOPLE_DN)).unwrap()
}

pub fn group_mapper(directory: &Arc<MemoryDirectory>) -> Mapper {
    Mapper::new(
        directory.clone(),
        Model::new("group", GROUP_DN).with_object_class("groupOfNames"),
    )
    .unwrap()
}
