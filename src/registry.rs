//! Per-request session registry
//!
//! Resolving a session decodes a cookie and fetches a document, so the
//! registry caches the outcome by session name for the rest of the request.

use cookie::CookieJar;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::SessionError;
use crate::session::Session;
use crate::session_store::SessionStore;

struct Resolved {
    session: Session,
    error: Option<SessionError>,
}

/// Sessions resolved during one request, keyed by name
pub struct SessionRegistry {
    store: SessionStore,
    cookies: CookieJar,
    sessions: HashMap<String, Resolved>,
}

impl SessionRegistry {
    /// Create a registry for a request carrying `cookies`
    pub fn new(store: SessionStore, cookies: CookieJar) -> Self {
        Self {
            store,
            cookies,
            sessions: HashMap::new(),
        }
    }

    /// The store sessions are loaded from
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Get the session named `name`, loading it on first use.
    ///
    /// A failed lookup is cached too: later calls return the same error, and
    /// the fresh session produced by the lookup stays reachable through
    /// [`session_mut`](Self::session_mut).
    pub async fn get(&mut self, name: &str) -> Result<&mut Session, SessionError> {
        let resolved = match self.sessions.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let resolved = match self.store.load(&self.cookies, name).await {
                    Ok(session) => Resolved {
                        session,
                        error: None,
                    },
                    Err(err) => {
                        let (session, error) = err.into_parts();
                        Resolved {
                            session,
                            error: Some(error),
                        }
                    }
                };
                entry.insert(resolved)
            }
        };

        if let Some(error) = &resolved.error {
            return Err(error.clone());
        }
        Ok(&mut resolved.session)
    }

    /// Get the session named `name`, starting a new one when the cookie is
    /// invalid or its record no longer exists.
    ///
    /// Store failures are still returned.
    pub async fn get_or_new(&mut self, name: &str) -> Result<&mut Session, SessionError> {
        let outcome = self.get(name).await.map(|_| ());
        if let Err(error) = outcome {
            if !error.is_recoverable() {
                return Err(error);
            }
            let session = self.store.new_session(name);
            self.sessions.insert(
                name.to_string(),
                Resolved {
                    session,
                    error: None,
                },
            );
        }
        self.get(name).await
    }

    /// A session already resolved in this request, whether or not its
    /// lookup failed
    pub fn session_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.get_mut(name).map(|resolved| &mut resolved.session)
    }

    /// Names of the sessions resolved in this request
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Consume the registry, yielding every resolved session
    pub fn into_sessions(self) -> impl Iterator<Item = Session> {
        self.sessions.into_values().map(|resolved| resolved.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::MemoryDocumentStore;
    use cookie::Cookie;

    fn store() -> SessionStore {
        SessionStore::new(MemoryDocumentStore::new(), SessionConfig::new("hash-key")).unwrap()
    }

    #[tokio::test]
    async fn test_caches_by_name() {
        let mut registry = SessionRegistry::new(store(), CookieJar::new());

        let session = registry.get("a").await.unwrap();
        assert!(session.is_new());
        session.set("count", 1).unwrap();

        // The same session comes back, with the change
        let session = registry.get("a").await.unwrap();
        assert_eq!(session.get::<i32>("count"), Some(1));

        let other = registry.get("b").await.unwrap();
        assert!(other.is_empty());

        let mut names: Vec<_> = registry.names().collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cached_error_and_recovery() {
        let store = store();
        let token = store.codecs().encode_id("a", "gone").unwrap();
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new("a", token));
        let mut registry = SessionRegistry::new(store, jar);

        let err = registry.get("a").await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("gone".to_string()));
        assert_eq!(registry.get("a").await.unwrap_err(), err);
        assert_eq!(registry.session_mut("a").map(|s| s.id().to_string()), Some("gone".to_string()));

        // A missing record is replaced by a brand new session
        let session = registry.get_or_new("a").await.unwrap();
        assert!(session.is_new());
        assert_eq!(session.id(), "");
        assert!(registry.get("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_into_sessions() {
        let mut registry = SessionRegistry::new(store(), CookieJar::new());
        registry.get("a").await.unwrap().set("x", 1).unwrap();
        registry.get("b").await.unwrap();

        let modified: Vec<_> = registry.into_sessions().filter(Session::is_modified).collect();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].name(), "a");
    }
}
