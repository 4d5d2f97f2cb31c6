//! Session middleware handler for Salvo

use async_trait::async_trait;
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};

use crate::registry::SessionRegistry;
use crate::session_store::SessionStore;

pub(crate) const REGISTRY_KEY: &str = "salvo.document.session";

/// Session middleware for Salvo
///
/// Installs a [`SessionRegistry`] in the depot before calling the next
/// handler. Sessions are loaded lazily by name through the registry, and
/// every session modified during the request is saved afterwards, with its
/// cookie added to the response.
pub struct SessionHandler {
    store: SessionStore,
}

impl SessionHandler {
    /// Create a new session handler
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// The store backing this handler
    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

impl Clone for SessionHandler {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

#[async_trait]
impl Handler for SessionHandler {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        let registry = SessionRegistry::new(self.store.clone(), req.cookies().clone());
        depot.insert(REGISTRY_KEY, registry);

        // Continue with the request
        ctrl.call_next(req, depot, res).await;

        // After request processing, save what the handlers changed
        let registry = match depot.remove::<SessionRegistry>(REGISTRY_KEY) {
            Ok(registry) => registry,
            Err(_) => {
                tracing::warn!("Session registry was removed from the depot");
                return;
            }
        };

        for mut session in registry.into_sessions() {
            if !session.is_modified() {
                continue;
            }
            match self.store.save_to_response(res, &mut session).await {
                Ok(()) => tracing::debug!(name = session.name(), id = session.id(), "Session saved"),
                Err(e) => tracing::error!(name = session.name(), error = %e, "Failed to save session"),
            }
        }
    }
}
