//! Application state shared across request handlers.

use crm_storage::MemoryStore;

pub(crate) struct AppState {
    /// Record source behind the dashboard endpoints.
    pub(crate) store: MemoryStore,
    /// Rows requested per page when walking the store.
    pub(crate) page_size: usize,
}
