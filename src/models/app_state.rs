use std::sync::Arc;
use std::time::Duration;

use crate::cache::SessionCache;
use crate::store::SessionStore;
use crate::websocket::Groups;

/// Application state shared between connections
pub struct AppState {
    pub cache: SessionCache,
    pub groups: Groups,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        AppState {
            cache: SessionCache::new(store.clone(), store_timeout),
            groups: Groups::new(),
            store,
        }
    }
}
