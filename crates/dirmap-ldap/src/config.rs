//! LDAP directory configuration
//!
//! Connection settings for an LDAP server, loadable from serde sources or
//! from `DIRMAP_LDAP_*` environment variables.

use std::env::VarError;

use dirmap::error::{MapperError, MapperResult};
use serde::{Deserialize, Serialize};

const REDACTED: &str = "***REDACTED***";

/// Configuration for an LDAP directory connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN of the directory (e.g., "dc=example,dc=com").
    pub base_dn: String,

    /// Bind DN for authentication. Empty binds anonymously.
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connect timeout in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-search time limit in seconds, sent to the server.
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| REDACTED))
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_connection_timeout_secs() -> u64 {
    30
}

fn default_search_timeout_secs() -> u64 {
    30
}

impl LdapConfig {
    /// Create a new LDAP config with required fields.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            search_timeout_secs: default_search_timeout_secs(),
        }
    }

    /// Set the bind password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable LDAPS, moving the port to 636 if it is still the default.
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        if self.port == default_ldap_port() {
            self.port = 636;
        }
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Resolve a search base against [`base_dn`](Self::base_dn).
    ///
    /// An empty DN becomes the base DN. A DN already inside the base DN is
    /// returned unchanged; anything else is treated as relative and has the
    /// base DN appended ("ou=People" → "ou=People,dc=example,dc=com").
    #[must_use]
    pub fn qualify(&self, dn: &str) -> String {
        let dn = dn.trim();
        let base = self.base_dn.trim();
        let lower = dn.to_ascii_lowercase();
        let lower_base = base.to_ascii_lowercase();

        if lower == lower_base || lower.ends_with(&format!(",{lower_base}")) {
            dn.to_string()
        } else {
            dirmap::dn::build(dn, base)
        }
    }

    /// Connection identity used to key per-connection caches.
    #[must_use]
    pub fn identity(&self) -> String {
        if self.bind_dn.is_empty() {
            format!("{} as anonymous", self.url())
        } else {
            format!("{} as {}", self.url(), self.bind_dn)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MapperResult<()> {
        if self.host.is_empty() {
            return Err(MapperError::InvalidConfiguration {
                message: "host is required".to_string(),
            });
        }

        if self.base_dn.is_empty() {
            return Err(MapperError::InvalidConfiguration {
                message: "base_dn is required".to_string(),
            });
        }

        if self.use_ssl && self.use_starttls {
            return Err(MapperError::InvalidConfiguration {
                message: "cannot use both SSL and STARTTLS".to_string(),
            });
        }

        Ok(())
    }

    /// Copy of the configuration with the password masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some(REDACTED.to_string());
        }
        config
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let host = reader("DIRMAP_LDAP_HOST")
            .map_err(|_| ConfigError::MissingVar("DIRMAP_LDAP_HOST".into()))?;

        let base_dn = reader("DIRMAP_LDAP_BASE_DN")
            .map_err(|_| ConfigError::MissingVar("DIRMAP_LDAP_BASE_DN".into()))?;

        let use_ssl = parse_bool(&reader, "DIRMAP_LDAP_USE_SSL")?;
        let use_starttls = parse_bool(&reader, "DIRMAP_LDAP_USE_STARTTLS")?;

        let port = match reader("DIRMAP_LDAP_PORT") {
            Ok(port) => port
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue("DIRMAP_LDAP_PORT".into(), e.to_string()))?,
            Err(_) if use_ssl => 636,
            Err(_) => default_ldap_port(),
        };

        let connection_timeout_secs = reader("DIRMAP_LDAP_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| default_connection_timeout_secs().to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("DIRMAP_LDAP_CONNECT_TIMEOUT_SECS".into(), e.to_string())
            })?;

        let search_timeout_secs = reader("DIRMAP_LDAP_SEARCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| default_search_timeout_secs().to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("DIRMAP_LDAP_SEARCH_TIMEOUT_SECS".into(), e.to_string())
            })?;

        Ok(Self {
            host,
            port,
            use_ssl,
            use_starttls,
            base_dn,
            bind_dn: reader("DIRMAP_LDAP_BIND_DN").unwrap_or_default(),
            bind_password: reader("DIRMAP_LDAP_BIND_PASSWORD").ok(),
            connection_timeout_secs,
            search_timeout_secs,
        })
    }
}

fn parse_bool<F>(reader: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
