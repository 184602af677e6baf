//! Cursor-based pagination exposed as a single lazy stream.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use super::error::{Result, SourceError};

/// One page of a cursor-paginated GraphQL connection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor to pass when requesting the following page.
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// A page with no successors.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            end_cursor: None,
            has_next_page: false,
        }
    }
}

enum PageState {
    Start,
    Next(String),
    Done,
}

/// Turn a page fetcher into a stream over every item of every page.
///
/// `fetch` is called with `None` for the first page and with the previous
/// page's `end_cursor` afterwards. A page is only requested once the items of
/// the one before it have all been consumed, and a failed fetch is yielded at
/// that point. Nothing is retried here.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> BoxStream<'a, Result<T>>
where
    T: Send + 'a,
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
    stream::try_unfold((PageState::Start, fetch), |(state, mut fetch)| async move {
        let cursor = match state {
            PageState::Start => None,
            PageState::Next(cursor) => Some(cursor),
            PageState::Done => return Ok::<_, SourceError>(None),
        };

        let page = fetch(cursor).await?;
        let next = match (page.has_next_page, page.end_cursor) {
            (true, Some(cursor)) => PageState::Next(cursor),
            _ => PageState::Done,
        };

        let items = stream::iter(page.items.into_iter().map(Ok::<T, SourceError>));
        Ok(Some((items, (next, fetch))))
    })
    .try_flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn three_pages(
        requested: Arc<Mutex<Vec<Option<String>>>>,
    ) -> impl FnMut(Option<String>) -> futures::future::Ready<Result<Page<u32>>> {
        move |cursor: Option<String>| {
            requested
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(cursor.clone());
            let page = match cursor.as_deref() {
                None => Page {
                    items: vec![1, 2],
                    end_cursor: Some("c1".to_string()),
                    has_next_page: true,
                },
                Some("c1") => Page {
                    items: vec![3],
                    end_cursor: Some("c2".to_string()),
                    has_next_page: true,
                },
                _ => Page::last(vec![4]),
            };
            futures::future::ready(Ok(page))
        }
    }

    #[tokio::test]
    async fn yields_items_across_all_pages() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let items: Vec<u32> = paginate(three_pages(Arc::clone(&requested)))
            .try_collect()
            .await
            .expect("pages should load");

        assert_eq!(items, vec![1, 2, 3, 4]);
        let requested = requested.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(
            *requested,
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn fetches_next_page_only_after_current_is_drained() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let mut items = paginate(three_pages(Arc::clone(&requested)));

        assert_eq!(items.next().await.map(|r| r.ok()), Some(Some(1)));
        assert_eq!(items.next().await.map(|r| r.ok()), Some(Some(2)));
        assert_eq!(requested.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);

        assert_eq!(items.next().await.map(|r| r.ok()), Some(Some(3)));
        assert_eq!(requested.lock().unwrap_or_else(|e| e.into_inner()).len(), 2);
    }

    #[tokio::test]
    async fn stops_when_cursor_is_missing() {
        let mut calls = 0;
        let items: Vec<u32> = paginate(move |_cursor| {
            calls += 1;
            futures::future::ready(Ok(Page {
                items: vec![calls],
                end_cursor: None,
                has_next_page: true,
            }))
        })
        .try_collect()
        .await
        .expect("page should load");

        assert_eq!(items, vec![1]);
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_after_current_page() {
        let mut items = paginate(|cursor: Option<String>| {
            futures::future::ready(match cursor {
                None => Ok(Page {
                    items: vec![1u32],
                    end_cursor: Some("next".to_string()),
                    has_next_page: true,
                }),
                Some(_) => Err(SourceError::Transport("connection reset".to_string())),
            })
        });

        assert!(matches!(items.next().await, Some(Ok(1))));
        assert!(matches!(
            items.next().await,
            Some(Err(SourceError::Transport(_)))
        ));
    }
}
