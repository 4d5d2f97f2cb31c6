//! In-memory document store
//!
//! This is primarily for development and testing.
//! For production, use RedisDocumentStore or another persistent store.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::traits::{document_id, merge_fields};
use super::{Collection, Document, DocumentStore, WriteSummary, ID_FIELD};
use crate::error::SessionError;

type Table = HashMap<String, Document>;

/// In-memory document store
///
/// Warning: This store is not suitable for production use because:
/// - Documents are lost on server restart
/// - Documents are not shared across multiple server instances
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<Collection, Table>>>,
}

impl MemoryDocumentStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &Collection) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// Check if a collection holds no documents
    pub fn is_empty(&self, collection: &Collection) -> bool {
        self.len(collection) == 0
    }

    /// Replace or add a document as-is, bypassing insert/update rules
    pub fn put(&self, collection: &Collection, id: &str, mut document: Document) {
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.collections
            .write()
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), document);
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryDocumentStore {
    fn clone(&self) -> Self {
        Self {
            collections: Arc::clone(&self.collections),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Document>, SessionError> {
        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|table| table.get(id)).cloned())
    }

    async fn insert(&self, collection: &Collection, mut document: Document) -> Result<WriteSummary, SessionError> {
        let (id, generated) = match document_id(&document)? {
            Some(id) => (id, false),
            None => (Uuid::new_v4().to_string(), true),
        };

        let mut collections = self.collections.write();
        let table = collections.entry(collection.clone()).or_default();
        if table.contains_key(&id) {
            return Err(SessionError::Store(format!(
                "duplicate primary key `{}` in {}",
                id, collection
            )));
        }

        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        table.insert(id.clone(), document);

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
        let mut collections = self.collections.write();
        let Some(existing) = collections.get_mut(collection).and_then(|table| table.get_mut(id)) else {
            return Ok(WriteSummary::default());
        };

        if merge_fields(existing, document) {
            Ok(WriteSummary {
                updated: 1,
                ..Default::default()
            })
        } else {
            Ok(WriteSummary {
                unchanged: 1,
                ..Default::default()
            })
        }
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<WriteSummary, SessionError> {
        let mut collections = self.collections.write();
        let removed = collections
            .get_mut(collection)
            .and_then(|table| table.remove(id))
            .is_some();
        Ok(WriteSummary {
            deleted: u64::from(removed),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryDocumentStore::new();
        let sessions = Collection::new("app", "sessions");

        // Insert generates a key
        let write = store.insert(&sessions, doc(json!({"name": "sid"}))).await.unwrap();
        assert_eq!(write.inserted, 1);
        assert_eq!(write.generated_keys.len(), 1);
        let id = write.generated_keys[0].clone();

        // Get returns the document with its id
        let found = store.get(&sessions, &id).await.unwrap().unwrap();
        assert_eq!(found, doc(json!({"id": id.clone(), "name": "sid"})));

        // Update merges fields
        let write = store.update(&sessions, &id, doc(json!({"name": "other"}))).await.unwrap();
        assert_eq!(write.updated, 1);
        let write = store.update(&sessions, &id, doc(json!({"name": "other"}))).await.unwrap();
        assert_eq!(write.unchanged, 1);
        assert_eq!(write.matched(), 1);

        // Unknown ids match nothing
        let write = store.update(&sessions, "missing", doc(json!({"name": "x"}))).await.unwrap();
        assert_eq!(write.matched(), 0);
        assert!(store.get(&sessions, "missing").await.unwrap().is_none());

        // Delete removes the document once
        let write = store.delete(&sessions, &id).await.unwrap();
        assert_eq!(write.deleted, 1);
        assert!(store.get(&sessions, &id).await.unwrap().is_none());
        let write = store.delete(&sessions, &id).await.unwrap();
        assert_eq!(write.deleted, 0);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_id() {
        let store = MemoryDocumentStore::new();
        let sessions = Collection::new("app", "sessions");

        let write = store.insert(&sessions, doc(json!({"id": "fixed"}))).await.unwrap();
        assert!(write.generated_keys.is_empty());

        let err = store.insert(&sessions, doc(json!({"id": "fixed"}))).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(store.len(&sessions), 1);
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = MemoryDocumentStore::new();
        let a = Collection::new("app", "a");
        let b = Collection::new("app", "b");

        store.insert(&a, doc(json!({"id": "same"}))).await.unwrap();
        store.insert(&b, doc(json!({"id": "same"}))).await.unwrap();
        assert_eq!(store.len(&a), 1);
        assert_eq!(store.len(&b), 1);
        assert!(store.is_empty(&Collection::new("other", "a")));
    }
}
