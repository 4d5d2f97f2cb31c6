//! Session store configuration

use std::time::Duration;

use cookie::time::{Duration as TimeDuration, OffsetDateTime};

use crate::codec::{KeyPair, DEFAULT_MAX_AGE};
use crate::error::SessionError;

/// Default database name
pub const DEFAULT_DATABASE: &str = "sessions";

/// Default table (collection) name
pub const DEFAULT_TABLE: &str = "sessions";

/// Cookie attributes applied when a session is saved.
///
/// Every new session gets a copy of the store's defaults, which handlers may
/// then change per session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    /// Cookie path (default: "/")
    pub path: String,

    /// Cookie domain (default: None - current domain only)
    pub domain: Option<String>,

    /// Max age in seconds (default: 30 days).
    /// None makes a browser-session cookie.
    pub max_age: Option<u64>,

    /// Secure flag for cookie (default: false)
    pub secure: bool,

    /// HttpOnly flag for cookie (default: true)
    pub http_only: bool,

    /// SameSite attribute for cookie (default: Lax)
    pub same_site: SameSite,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: Some(DEFAULT_MAX_AGE),
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

/// SameSite cookie attribute
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

/// How session values are laid out in a stored document.
///
/// Chosen once per store; records written with one shape cannot be read
/// with the other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordShape {
    /// `{id, name, values}` - values stored as native fields, string keys only
    #[default]
    Transparent,
    /// `{id, encoded}` - the whole value map signed (and optionally encrypted)
    /// by the codec
    Opaque,
}

/// Configuration for the session store
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Key pairs for the cookie codec.
    /// The first pair is used for encoding new tokens.
    /// All pairs are tried when decoding (for key rotation).
    pub key_pairs: Vec<KeyPair>,

    /// Database name (default: "sessions")
    pub database: String,

    /// Table / collection name (default: "sessions")
    pub table: String,

    /// Stored record layout (default: Transparent)
    pub shape: RecordShape,

    /// Maximum age of a codec token in seconds (default: 30 days).
    /// None disables the timestamp check.
    pub token_max_age: Option<u64>,

    /// Cookie options copied into every new session
    pub options: SessionOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_pairs: Vec::new(),
            database: DEFAULT_DATABASE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            shape: RecordShape::default(),
            token_max_age: Some(DEFAULT_MAX_AGE),
            options: SessionOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with a single signing key
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self::with_key_pairs([KeyPair::new(hash_key)])
    }

    /// Create a new configuration with multiple key pairs for rotation
    pub fn with_key_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = KeyPair>,
    {
        Self {
            key_pairs: pairs.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Set the database name
    pub fn with_database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = database.into();
        self
    }

    /// Set the table (collection) name
    pub fn with_table<S: Into<String>>(mut self, table: S) -> Self {
        self.table = table.into();
        self
    }

    /// Set the stored record layout
    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.options.path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.options.domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.options.http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.options.same_site = same_site;
        self
    }

    /// Set the max age in seconds for both the cookie and codec tokens.
    /// Pass None for a browser-session cookie whose token never expires.
    pub fn with_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        let max_age = max_age.into();
        self.options.max_age = max_age;
        self.token_max_age = max_age;
        self
    }

    /// Set max age from Duration
    pub fn with_max_age_duration(self, duration: impl Into<Option<Duration>>) -> Self {
        self.with_max_age(duration.into().map(|d| d.as_secs()))
    }

    /// Set the maximum codec token age independently of the cookie max age
    pub fn with_token_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        self.token_max_age = max_age.into();
        self
    }

    /// Check the configured ages.
    ///
    /// The cookie max age must yield a representable `Expires` date, and the
    /// token max age must fit in a signed timestamp.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.database.is_empty() || self.table.is_empty() {
            return Err(SessionError::Config(
                "database and table names must not be empty".to_string(),
            ));
        }
        if let Some(max_age) = self.options.max_age {
            let expires = i64::try_from(max_age)
                .ok()
                .and_then(|secs| OffsetDateTime::now_utc().checked_add(TimeDuration::seconds(secs)));
            if expires.is_none() {
                return Err(SessionError::Config(format!(
                    "cookie max age of {} seconds is out of range",
                    max_age
                )));
            }
        }
        if let Some(max_age) = self.token_max_age {
            if i64::try_from(max_age).is_err() {
                return Err(SessionError::Config(format!(
                    "token max age of {} seconds is out of range",
                    max_age
                )));
            }
        }
        Ok(())
    }
}
