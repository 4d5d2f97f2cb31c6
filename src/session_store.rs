//! Session persistence on top of a document store
//!
//! [`SessionStore`] ties the cookie codec to a [`DocumentStore`]:
//!
//! - [`load`](SessionStore::load): cookie → session id → stored document → session values
//! - [`persist`](SessionStore::persist): session values → document → update, or insert on a miss
//! - [`save`](SessionStore::save): persist, then encode the id into the outgoing cookie
//! - [`remove`](SessionStore::remove): delete the record of a destroyed session
//!
//! The store keeps no per-request state; all durable state lives in the
//! document store.

use std::sync::Arc;

use cookie::{Cookie, CookieJar};
use salvo_core::Response;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::Codecs;
use crate::config::{RecordShape, SessionConfig, SessionOptions};
use crate::error::SessionError;
use crate::session::{Session, SessionKey, SessionValues};
use crate::store::{Collection, Document, DocumentStore, ID_FIELD};

/// Field holding the session name in transparent records
pub const NAME_FIELD: &str = "name";

/// Field holding the value map in transparent records
pub const VALUES_FIELD: &str = "values";

/// Field holding the encoded value map in opaque records
pub const ENCODED_FIELD: &str = "encoded";

/// A failed lookup, carrying the fresh session the caller may continue with
#[derive(Debug, Error)]
#[error("session lookup failed: {error}")]
pub struct LookupError {
    session: Session,
    #[source]
    error: SessionError,
}

impl LookupError {
    /// The underlying error
    pub fn error(&self) -> &SessionError {
        &self.error
    }

    /// The session produced despite the failure
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Take the session, discarding the error
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Split into the session and the error
    pub fn into_parts(self) -> (Session, SessionError) {
        (self.session, self.error)
    }
}

impl From<LookupError> for SessionError {
    fn from(err: LookupError) -> Self {
        err.error
    }
}

/// Session store persisting session values to a document database
///
/// Cloning is cheap; the document store and codecs are shared.
#[derive(Clone)]
pub struct SessionStore {
    documents: Arc<dyn DocumentStore>,
    collection: Collection,
    codecs: Arc<Codecs>,
    record_codecs: Arc<Codecs>,
    shape: RecordShape,
    options: SessionOptions,
}

impl SessionStore {
    /// Create a new session store over the given document store
    pub fn new<D: DocumentStore>(documents: D, config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_shared(Arc::new(documents), config)
    }

    /// Create a new session store over a shared document store
    pub fn with_shared(documents: Arc<dyn DocumentStore>, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let codecs = Codecs::from_pairs(&config.key_pairs)?.with_max_age(config.token_max_age);
        // Stored blobs are not cookies, so they are not length limited
        let record_codecs = codecs.clone().with_max_length(0);

        Ok(Self {
            documents,
            collection: Collection::new(config.database, config.table),
            codecs: Arc::new(codecs),
            record_codecs: Arc::new(record_codecs),
            shape: config.shape,
            options: config.options,
        })
    }

    /// The collection sessions are stored in
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// The configured record layout
    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    /// Default cookie options for new sessions
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Cookie codecs
    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    /// Create a fresh, empty session with the default options
    pub fn new_session(&self, name: &str) -> Session {
        Session::new(name, self.options.clone())
    }

    /// Look up the session named `name` from the request cookies.
    ///
    /// A missing cookie is not an error: a new session is returned. When the
    /// cookie fails to decode, or its record cannot be loaded, the error is
    /// returned together with a session holding no values.
    pub async fn load(&self, cookies: &CookieJar, name: &str) -> Result<Session, LookupError> {
        let mut session = self.new_session(name);
        let Some(cookie) = cookies.get(name) else {
            return Ok(session);
        };

        let id = match self.codecs.decode_id(name, cookie.value()) {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                let error = SessionError::Decode("invalid session id".to_string());
                return Err(LookupError { session, error });
            }
            Err(error) => return Err(LookupError { session, error }),
        };

        session.set_id(id);
        session.set_is_new(false);
        match self.fetch_values(&session).await {
            Ok(values) => {
                session.replace_values(values);
                Ok(session)
            }
            Err(error) => Err(LookupError { session, error }),
        }
    }

    /// Write the session values to the document store.
    ///
    /// A session with an id is updated in place. When it has no id, or the
    /// update found no document, a new document is inserted and the id the
    /// store reports is assigned to the session.
    pub async fn persist(&self, session: &mut Session) -> Result<(), SessionError> {
        let mut document = self.serialize(session)?;

        if !session.id().is_empty() {
            let write = self
                .documents
                .update(&self.collection, session.id(), document.clone())
                .await?;
            if write.matched() > 0 {
                return Ok(());
            }
            // The record is gone; recreate it under the same id
            document.insert(ID_FIELD.to_string(), Value::String(session.id().to_string()));
        }

        let write = self.documents.insert(&self.collection, document).await?;
        if let Some(id) = write.generated_keys.into_iter().next() {
            session.set_id(id);
        }
        if session.id().is_empty() {
            return Err(SessionError::Store(
                "insert did not report a generated key".to_string(),
            ));
        }
        Ok(())
    }

    /// Delete the session's record and forget its id.
    ///
    /// A record that is already gone is not an error.
    pub async fn remove(&self, session: &mut Session) -> Result<(), SessionError> {
        if !session.id().is_empty() {
            self.documents.delete(&self.collection, session.id()).await?;
            session.set_id(String::new());
        }
        Ok(())
    }

    /// Persist the session and build the cookie referencing it.
    ///
    /// A [destroyed](Session::destroy) session is removed instead, and the
    /// returned cookie expires the browser's copy.
    ///
    /// Nothing is returned on failure, so no cookie can be set for a
    /// session that was not stored.
    pub async fn save(&self, session: &mut Session) -> Result<Cookie<'static>, SessionError> {
        if session.is_destroyed() {
            self.remove(session).await?;
            session.mark_saved();
            return Ok(session.removal_cookie());
        }
        self.persist(session).await?;
        let token = self.codecs.encode_id(session.name(), session.id())?;
        session.mark_saved();
        Ok(session.cookie(token))
    }

    /// Persist the session and add its cookie to the response
    pub async fn save_to_response(&self, res: &mut Response, session: &mut Session) -> Result<(), SessionError> {
        let cookie = self.save(session).await?;
        res.add_cookie(cookie);
        Ok(())
    }

    async fn fetch_values(&self, session: &Session) -> Result<SessionValues, SessionError> {
        let document = self
            .documents
            .get(&self.collection, session.id())
            .await?
            .ok_or_else(|| SessionError::NotFound(session.id().to_string()))?;
        self.deserialize(session.name(), &document)
    }

    fn serialize(&self, session: &Session) -> Result<Document, SessionError> {
        let mut document = Map::new();
        match self.shape {
            RecordShape::Transparent => {
                let mut values = Map::new();
                for (key, value) in session.values() {
                    let SessionKey::Str(key) = key else {
                        return Err(SessionError::Serialization(format!(
                            "cannot serialize non-string value key `{}`",
                            key
                        )));
                    };
                    values.insert(key.clone(), value.clone());
                }
                document.insert(NAME_FIELD.to_string(), Value::String(session.name().to_string()));
                document.insert(VALUES_FIELD.to_string(), Value::Object(values));
            }
            RecordShape::Opaque => {
                let pairs: Vec<(&SessionKey, &Value)> = session.values().iter().collect();
                let encoded = self.record_codecs.encode(session.name(), &pairs)?;
                document.insert(ENCODED_FIELD.to_string(), Value::String(encoded));
            }
        }
        Ok(document)
    }

    fn deserialize(&self, name: &str, document: &Document) -> Result<SessionValues, SessionError> {
        let values = match self.shape {
            RecordShape::Transparent => match document.get(VALUES_FIELD) {
                Some(Value::Object(values)) => values
                    .iter()
                    .map(|(k, v)| (SessionKey::Str(k.clone()), v.clone()))
                    .collect(),
                _ => return Err(corrupt_record()),
            },
            RecordShape::Opaque => match document.get(ENCODED_FIELD) {
                Some(Value::String(encoded)) => {
                    let pairs: Vec<(SessionKey, Value)> = self.record_codecs.decode(name, encoded)?;
                    pairs.into_iter().collect()
                }
                _ => return Err(corrupt_record()),
            },
        };
        Ok(values)
    }
}

fn corrupt_record() -> SessionError {
    SessionError::Decode("corrupt session record".to_string())
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("collection", &self.collection)
            .field("shape", &self.shape)
            .field("options", &self.options)
            .finish()
    }
}
