//! Lazy, restartable batch iteration over a [`RecordSource`].

use std::marker::PhantomData;

use crm_core::Scope;

use crate::error::StorageError;
use crate::source::RecordSource;

/// Rows the backend returns per query, at most.
pub const MAX_PAGE_SIZE: usize = 1000;

pub const DEFAULT_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// Walks a source page by page until a short or empty page comes back.
pub struct Paginator<'s, S, T> {
    source: &'s S,
    scope: Scope,
    page_size: usize,
    offset: usize,
    done: bool,
    _rows: PhantomData<fn() -> T>,
}

impl<'s, S, T> Paginator<'s, S, T>
where
    S: RecordSource<T>,
{
    pub fn new(source: &'s S, scope: Scope, page_size: usize) -> Result<Self, StorageError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                requested: page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(Paginator {
            source,
            scope,
            page_size,
            offset: 0,
            done: false,
            _rows: PhantomData,
        })
    }

    /// Next batch, or `None` once the source is exhausted.
    ///
    /// A failed fetch leaves the position unchanged, so the same page is
    /// requested again on the next call.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<T>>, StorageError> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .source
            .fetch_page(&self.scope, self.offset, self.page_size)
            .await?;
        tracing::trace!(offset = self.offset, rows = page.len(), "fetched page");
        self.offset += page.len();
        if page.len() < self.page_size {
            self.done = true;
        }
        if page.is_empty() {
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Start over from the first row.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.done = false;
    }

    /// Drain every remaining batch into one vector.
    pub async fn collect_all(&mut self) -> Result<Vec<T>, StorageError> {
        let mut rows = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            rows.extend(batch);
        }
        tracing::debug!(rows = rows.len(), "collected all pages");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Numbers `0..len`, counting how often it is asked.
    struct Numbers {
        len: usize,
        calls: AtomicUsize,
    }

    impl Numbers {
        fn new(len: usize) -> Self {
            Numbers {
                len,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSource<usize> for Numbers {
        async fn fetch_page(
            &self,
            _scope: &Scope,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<usize>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((offset..self.len).take(limit).collect())
        }
    }

    #[tokio::test]
    async fn batches_until_short_page() {
        let src = Numbers::new(25);
        let mut pages = Paginator::<_, usize>::new(&src, Scope::All, 10).unwrap();
        assert_eq!(pages.next_batch().await.unwrap().map(|b| b.len()), Some(10));
        assert_eq!(pages.next_batch().await.unwrap().map(|b| b.len()), Some(10));
        assert_eq!(pages.next_batch().await.unwrap(), Some((20..25).collect()));
        assert_eq!(pages.next_batch().await.unwrap(), None);
        // The short page ended it; no fourth query.
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let src = Numbers::new(20);
        let mut pages = Paginator::<_, usize>::new(&src, Scope::All, 10).unwrap();
        assert_eq!(pages.collect_all().await.unwrap().len(), 20);
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_source() {
        let src = Numbers::new(0);
        let mut pages = Paginator::<_, usize>::new(&src, Scope::All, 10).unwrap();
        assert!(pages.next_batch().await.unwrap().is_none());
        assert!(pages.next_batch().await.unwrap().is_none());
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_restarts() {
        let src = Numbers::new(15);
        let mut pages = Paginator::<_, usize>::new(&src, Scope::All, 10).unwrap();
        let first = pages.collect_all().await.unwrap();
        pages.reset();
        let again = pages.collect_all().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first, (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn page_size_bounds() {
        let src = Numbers::new(1);
        assert!(matches!(
            Paginator::<_, usize>::new(&src, Scope::All, 0),
            Err(StorageError::InvalidPageSize { requested: 0, .. })
        ));
        assert!(Paginator::<_, usize>::new(&src, Scope::All, MAX_PAGE_SIZE + 1).is_err());
        assert!(Paginator::<_, usize>::new(&src, Scope::All, MAX_PAGE_SIZE).is_ok());
    }
}
