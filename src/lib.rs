//! # salvo-document-session
//!
//! Document-database backed session store for the Salvo web framework.
//!
//! Session values live in a document store; the client only carries a
//! signed (and optionally encrypted) cookie holding the session id.
//!
//! ## Features
//!
//! - **Authenticated id cookies**: HMAC-SHA256 signed, timestamped tokens
//!   bound to the cookie name, with optional AES-GCM encryption and key rotation
//! - **Two record shapes**: values as native document fields, or as one
//!   opaque encoded blob
//! - **Update-or-insert persistence**: the store assigns ids on first insert
//! - **Pluggable document stores**: Redis, Memory, or custom stores
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_document_session::{
//!     MemoryDocumentStore, SessionConfig, SessionDepotExt, SessionHandler, SessionStore,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SessionConfig::new("your-hash-key")
//!         .with_database("app")
//!         .with_table("sessions");
//!     let store = SessionStore::new(MemoryDocumentStore::new(), config).unwrap();
//!
//!     let router = Router::new()
//!         .hoop(SessionHandler::new(store))
//!         .get(index);
//!
//!     let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
//!     Server::new(acceptor).serve(router).await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let registry = depot.sessions_mut().unwrap();
//!     let session = registry.get_or_new("visits").await.unwrap();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1).unwrap();
//!     format!("{} views", views + 1)
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod session;
pub mod session_store;
pub mod store;

pub use codec::{Codec, Codecs, KeyPair};
pub use config::{RecordShape, SameSite, SessionConfig, SessionOptions};
pub use error::SessionError;
pub use handler::SessionHandler;
pub use registry::SessionRegistry;
pub use session::{Session, SessionKey, SessionValues};
pub use session_store::{LookupError, SessionStore};
pub use store::{Collection, Document, DocumentStore, MemoryDocumentStore, WriteSummary};

#[cfg(feature = "redis-store")]
pub use store::RedisDocumentStore;

/// Extension trait for Depot to easily access sessions
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
