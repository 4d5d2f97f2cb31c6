//! Redis document store
//!
//! Each document is stored as a JSON string:
//! - Key: `database:table:id`
//! - Value: JSON serialized document, including its `id` field
//!
//! Inserts use `SET NX`, so a duplicate id is reported instead of
//! overwriting an existing document. Deletes use `DEL`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::traits::{document_id, merge_fields};
use super::{Collection, Document, DocumentStore, WriteSummary, ID_FIELD};
use crate::error::SessionError;

/// Redis document store
///
/// # Example
///
/// ```rust,ignore
/// use salvo_document_session::RedisDocumentStore;
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let store = RedisDocumentStore::new(client).await?;
/// ```
pub struct RedisDocumentStore {
    conn: Arc<ConnectionManager>,
}

impl RedisDocumentStore {
    /// Create a new Redis store
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Create a new Redis store from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionError::Store(format!("Failed to create Redis client: {}", e)))?;
        Self::new(client).await
    }

    /// Create a new Redis store from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
        }
    }

    /// Make a storage key from collection and document id
    fn make_key(&self, collection: &Collection, id: &str) -> String {
        format!("{}:{}:{}", collection.database(), collection.table(), id)
    }

    async fn read(&self, key: &str) -> Result<Option<Document>, SessionError> {
        let mut conn = (*self.conn).clone();
        let data: Option<String> = conn.get(key).await?;
        data.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| SessionError::Decode(format!("corrupt document `{}`: {}", key, e)))
        })
        .transpose()
    }
}

impl Clone for RedisDocumentStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Document>, SessionError> {
        self.read(&self.make_key(collection, id)).await
    }

    async fn insert(&self, collection: &Collection, mut document: Document) -> Result<WriteSummary, SessionError> {
        let (id, generated) = match document_id(&document)? {
            Some(id) => (id, false),
            None => (Uuid::new_v4().to_string(), true),
        };
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let key = self.make_key(collection, &id);
        let json = serde_json::to_string(&document)?;
        let mut conn = (*self.conn).clone();

        // SET NX replies nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&json)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        if reply.is_none() {
            return Err(SessionError::Store(format!(
                "duplicate primary key `{}` in {}",
                id, collection
            )));
        }

        Ok(WriteSummary {
            inserted: 1,
            generated_keys: if generated { vec![id] } else { Vec::new() },
            ..Default::default()
        })
    }

    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        document: Document,
    ) -> Result<WriteSummary, SessionError> {
        let key = self.make_key(collection, id);
        let Some(mut existing) = self.read(&key).await? else {
            return Ok(WriteSummary::default());
        };
        if !merge_fields(&mut existing, document) {
            return Ok(WriteSummary {
                unchanged: 1,
                ..Default::default()
            });
        }

        let json = serde_json::to_string(&existing)?;
        let mut conn = (*self.conn).clone();

        // SET XX replies nil when the key disappeared in the meantime
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&json)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        Ok(WriteSummary {
            updated: u64::from(reply.is_some()),
            ..Default::default()
        })
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<WriteSummary, SessionError> {
        let key = self.make_key(collection, id);
        let mut conn = (*self.conn).clone();
        let deleted: u64 = conn.del(&key).await?;
        Ok(WriteSummary {
            deleted,
            ..Default::default()
        })
    }
}
