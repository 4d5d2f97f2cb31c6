//! Document store trait

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::SessionError;

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Name of the primary key field of every document
pub const ID_FIELD: &str = "id";

/// A database + table pair addressing a set of documents
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Collection {
    database: String,
    table: String,
}

impl Collection {
    /// Create a collection reference
    pub fn new<D: Into<String>, T: Into<String>>(database: D, table: T) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Outcome of a write
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Number of documents inserted
    pub inserted: u64,
    /// Number of documents whose content changed
    pub updated: u64,
    /// Number of documents matched but left as they were
    pub unchanged: u64,
    /// Number of documents deleted
    pub deleted: u64,
    /// Primary keys generated by the store on insert
    pub generated_keys: Vec<String>,
}

impl WriteSummary {
    /// Documents an update found, changed or not
    pub fn matched(&self) -> u64 {
        self.updated + self.unchanged
    }
}

/// Trait for document database backends
///
/// Documents are addressed by the string primary key stored in their
/// [`ID_FIELD`]. Implementations must reject an insert whose id already
/// exists instead of overwriting the document.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Get a document by primary key
    ///
    /// Returns None if the document doesn't exist
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Document>, SessionError>;

    /// Insert a new document
    ///
    /// When the document has no id field the store generates one and
    /// reports it in [`WriteSummary::generated_keys`].
    async fn insert(&self, collection: &Collection, document: Document) -> Result<WriteSummary, SessionError>;

    /// Update the document with the given id
    ///
    /// Top-level fields of `document` replace those of the stored document.
    /// A missing document is not an error; the summary then matches nothing.
    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        document: Document,
    ) -> Result<WriteSummary, SessionError>;

    /// Delete the document with the given id
    ///
    /// A missing document is not an error; the summary then deletes nothing.
    async fn delete(&self, collection: &Collection, id: &str) -> Result<WriteSummary, SessionError>;
}

/// Read the string primary key of a document
pub(crate) fn document_id(document: &Document) -> Result<Option<String>, SessionError> {
    match document.get(ID_FIELD) {
        None => Ok(None),
        Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        Some(other) => Err(SessionError::Store(format!("invalid primary key: {}", other))),
    }
}

/// Merge `changes` into `existing`, returning whether anything changed
pub(crate) fn merge_fields(existing: &mut Document, changes: Document) -> bool {
    let mut changed = false;
    for (field, value) in changes {
        if field == ID_FIELD {
            continue;
        }
        if existing.get(&field) != Some(&value) {
            existing.insert(field, value);
            changed = true;
        }
    }
    changed
}
