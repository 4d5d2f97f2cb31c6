//! Session data structure

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::config::{SameSite, SessionOptions};
use crate::error::SessionError;

/// A key in the session value map.
///
/// Only string keys can be stored in the transparent record shape; the
/// opaque shape accepts all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionKey {
    /// A string key
    Str(String),
    /// An integer key
    Int(i64),
    /// A boolean key
    Bool(bool),
}

impl SessionKey {
    /// Get the key as a string slice, if it is a string key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SessionKey::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Str(s) => f.write_str(s),
            SessionKey::Int(i) => write!(f, "{}", i),
            SessionKey::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        SessionKey::Str(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        SessionKey::Str(key)
    }
}

impl From<i64> for SessionKey {
    fn from(key: i64) -> Self {
        SessionKey::Int(key)
    }
}

impl From<bool> for SessionKey {
    fn from(key: bool) -> Self {
        SessionKey::Bool(key)
    }
}

/// Session values keyed by [`SessionKey`]
pub type SessionValues = HashMap<SessionKey, Value>;

/// A named session owned by the current request.
///
/// A session with an empty [`id`](Session::id) has never been persisted;
/// the document store assigns the id on the first save.
#[derive(Clone)]
pub struct Session {
    id: String,
    name: String,
    is_new: bool,
    values: SessionValues,
    options: SessionOptions,
    modified: bool,
    destroyed: bool,
}

impl Session {
    /// Create a new, empty session with the given name and cookie options
    pub fn new<S: Into<String>>(name: S, options: SessionOptions) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            is_new: true,
            values: HashMap::new(),
            options,
            modified: false,
            destroyed: false,
        }
    }

    /// Get the session ID ("" until the session is first persisted)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Get the session (and cookie) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this session was not loaded from the store
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn set_is_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    /// Check if the session has been modified since it was loaded or saved
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the session for saving without changing any value
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Cookie options used when the session is saved
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Mutable cookie options
    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    /// All session values
    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable access to all values; marks the session as modified
    pub fn values_mut(&mut self) -> &mut SessionValues {
        self.modified = true;
        &mut self.values
    }

    pub(crate) fn replace_values(&mut self, values: SessionValues) {
        self.values = values;
    }

    /// Get a value from the session
    pub fn get<T: DeserializeOwned>(&self, key: impl Into<SessionKey>) -> Option<T> {
        self.values
            .get(&key.into())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&mut self, key: impl Into<SessionKey>, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        self.modified = true;
        Ok(())
    }

    /// Remove a value from the session
    pub fn remove(&mut self, key: impl Into<SessionKey>) -> Option<Value> {
        let result = self.values.remove(&key.into());
        if result.is_some() {
            self.modified = true;
        }
        result
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: impl Into<SessionKey>) -> bool {
        self.values.contains_key(&key.into())
    }

    /// Clear all session values
    pub fn clear(&mut self) {
        self.values.clear();
        self.modified = true;
    }

    /// Check if the session holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Destroy the session: on the next save its record is deleted and the
    /// cookie is expired in the browser.
    ///
    /// Values set after this call are not stored.
    pub fn destroy(&mut self) {
        self.values.clear();
        self.destroyed = true;
        self.modified = true;
    }

    /// Check if the session has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Build the cookie carrying `token` with this session's options
    pub(crate) fn cookie(&self, token: String) -> cookie::Cookie<'static> {
        let options = &self.options;
        let mut builder = cookie::Cookie::build((self.name.clone(), token))
            .path(options.path.clone())
            .http_only(options.http_only)
            .secure(options.secure);

        if let Some(domain) = &options.domain {
            builder = builder.domain(domain.clone());
        }

        if let Some(max_age) = options.max_age {
            let max_age = cookie::time::Duration::seconds(i64::try_from(max_age).unwrap_or(i64::MAX));
            builder = builder.max_age(max_age);
            // Expires is omitted when it falls outside the calendar range
            if let Some(expires) = cookie::time::OffsetDateTime::now_utc().checked_add(max_age) {
                builder = builder.expires(expires);
            }
        }

        builder = match options.same_site {
            SameSite::Strict => builder.same_site(cookie::SameSite::Strict),
            SameSite::Lax => builder.same_site(cookie::SameSite::Lax),
            SameSite::None => builder.same_site(cookie::SameSite::None),
        };

        builder.build()
    }

    /// Build a cookie telling the browser to drop this session's cookie
    pub(crate) fn removal_cookie(&self) -> cookie::Cookie<'static> {
        let mut builder = cookie::Cookie::build((self.name.clone(), ""))
            .path(self.options.path.clone())
            .max_age(cookie::time::Duration::ZERO)
            .expires(cookie::time::OffsetDateTime::UNIX_EPOCH);
        if let Some(domain) = &self.options.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_new", &self.is_new)
            .field("modified", &self.modified)
            .field("destroyed", &self.destroyed)
            .field("values", &self.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = Session::new("sid", SessionOptions::default());
        assert_eq!(session.id(), "");
        assert_eq!(session.name(), "sid");
        assert!(session.is_new());
        assert!(session.is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_values_track_modification() {
        let mut session = Session::new("sid", SessionOptions::default());
        session.set("count", 1).unwrap();
        assert!(session.is_modified());
        assert_eq!(session.get::<i32>("count"), Some(1));
        assert!(session.contains("count"));

        session.mark_saved();
        assert!(session.remove("missing").is_none());
        assert!(!session.is_modified());
        assert_eq!(session.remove("count"), Some(Value::from(1)));
        assert!(session.is_modified());
    }

    #[test]
    fn test_non_string_keys() {
        let mut session = Session::new("sid", SessionOptions::default());
        session.set(7i64, "seven").unwrap();
        session.set(true, "yes").unwrap();
        assert_eq!(session.get::<String>(7i64), Some("seven".to_string()));
        assert_eq!(session.get::<String>(true), Some("yes".to_string()));
        assert_eq!(SessionKey::from(7i64).as_str(), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let mut options = SessionOptions::default();
        options.domain = Some("example.com".to_string());
        options.secure = true;
        let session = Session::new("sid", options);
        let cookie = session.cookie("token".to_string());

        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(86400 * 30)));
    }

    #[test]
    fn test_browser_session_cookie() {
        let mut session = Session::new("sid", SessionOptions::default());
        session.options_mut().max_age = None;
        let cookie = session.cookie("token".to_string());
        assert_eq!(cookie.max_age(), None);
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    fn test_huge_max_age_does_not_overflow() {
        let mut session = Session::new("sid", SessionOptions::default());
        session.options_mut().max_age = Some(u64::MAX);
        let cookie = session.cookie("token".to_string());
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(i64::MAX)));
        assert_eq!(cookie.expires(), None);

        session.options_mut().max_age = Some(1_000_000_000_000_000);
        let cookie = session.cookie("token".to_string());
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(1_000_000_000_000_000)));
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    fn test_destroy() {
        let mut options = SessionOptions::default();
        options.domain = Some("example.com".to_string());
        let mut session = Session::new("sid", options);
        session.set("user", "alice").unwrap();
        session.mark_saved();

        session.destroy();
        assert!(session.is_destroyed());
        assert!(session.is_modified());
        assert!(session.is_empty());

        let cookie = session.removal_cookie();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
        assert_eq!(cookie.expires_datetime(), Some(cookie::time::OffsetDateTime::UNIX_EPOCH));
    }
}
