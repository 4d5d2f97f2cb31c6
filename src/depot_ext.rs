//! Extension trait for Depot to easily access sessions

use salvo_core::Depot;

use crate::handler::REGISTRY_KEY;
use crate::registry::SessionRegistry;

/// Extension trait for Salvo's Depot to provide easy session access
pub trait SessionDepotExt {
    /// Get the session registry installed by [`SessionHandler`](crate::SessionHandler)
    fn sessions(&self) -> Option<&SessionRegistry>;

    /// Get the mutable session registry, to load and change sessions
    fn sessions_mut(&mut self) -> Option<&mut SessionRegistry>;
}

impl SessionDepotExt for Depot {
    fn sessions(&self) -> Option<&SessionRegistry> {
        self.get::<SessionRegistry>(REGISTRY_KEY).ok()
    }

    fn sessions_mut(&mut self) -> Option<&mut SessionRegistry> {
        self.get_mut::<SessionRegistry>(REGISTRY_KEY).ok()
    }
}
