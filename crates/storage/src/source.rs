use async_trait::async_trait;

use crm_core::Scope;

use crate::error::StorageError;

/// A backend table that can be read one page at a time.
///
/// ## Paging contract
///
/// `fetch_page(scope, offset, limit)` returns at most `limit` rows visible
/// under `scope`, starting at the `offset`-th visible row, in a stable
/// order. A page shorter than `limit` means there are no further rows.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to live in axum
/// application state.
#[async_trait]
pub trait RecordSource<T>: Send + Sync + 'static {
    async fn fetch_page(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<T>, StorageError>;
}
