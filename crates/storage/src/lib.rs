//! Record fetching for the CRM rollup engine.
//!
//! The backend caps every query at [`MAX_PAGE_SIZE`] rows, so callers never
//! ask for "all rows"; they walk a [`Paginator`] over a [`RecordSource`].
//! Ownership scoping is applied by the source, so the engine only ever
//! sees rows the principal may read.

mod error;
mod memory;
mod paginate;
mod source;

pub use error::StorageError;
pub use memory::{Dataset, MemoryStore};
pub use paginate::{Paginator, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use source::RecordSource;
