//! Offset/limit pagination for the v2 listing endpoints.

use serde::{Deserialize, Serialize};
use std::future::Future;

use super::ClientError;

/// One page of a v2 listing response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

/// Window requested from a listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            offset: 0,
        }
    }

    pub(crate) fn query(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ]
    }
}

/// Walk pages from offset 0, accumulating results until the listing is
/// exhausted or `max_items` have been collected.
///
/// The offset advances by the number of results actually received, so a
/// server that caps `limit` below the requested value is still walked
/// correctly. An empty page always ends the walk.
pub async fn collect_all<T, F, Fut>(
    limit: u32,
    max_items: usize,
    mut fetch: F,
) -> Result<Vec<T>, ClientError>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, ClientError>>,
{
    let mut request = PageRequest::first(limit);
    let mut items = Vec::new();
    while items.len() < max_items {
        let page = fetch(request).await?;
        let received = page.results.len();
        if received == 0 {
            break;
        }
        items.extend(page.results);
        request.offset += received as u64;

        let more = match (&page.next, page.count) {
            (Some(_), _) => true,
            (None, Some(count)) => request.offset < count,
            (None, None) => received as u32 >= request.limit,
        };
        if !more {
            break;
        }
    }
    items.truncate(max_items);
    tracing::debug!(collected = items.len(), "pagination finished");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn page(range: std::ops::Range<u32>, count: Option<u64>, next: bool) -> Page<u32> {
        Page {
            results: range.collect(),
            count,
            limit: None,
            offset: None,
            next: next.then(|| "https://api.typefully.com/v2/next".to_string()),
            previous: None,
        }
    }

    #[tokio::test]
    async fn follows_next_links_until_exhausted() {
        let seen = Mutex::new(Vec::new());
        let items = collect_all(2, 100, |req| {
            seen.lock().expect("lock").push(req.offset);
            async move {
                Ok(match req.offset {
                    0 => page(0..2, None, true),
                    2 => page(2..4, None, true),
                    _ => page(4..5, None, false),
                })
            }
        })
        .await
        .expect("collect");
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(*seen.lock().expect("lock"), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn stops_at_count_without_next() {
        let items = collect_all(3, 100, |req| async move {
            Ok(if req.offset == 0 {
                page(0..3, Some(3), false)
            } else {
                panic!("no further page expected")
            })
        })
        .await
        .expect("collect");
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn truncates_to_max_items() {
        let items = collect_all(4, 6, |req| async move {
            let start = req.offset as u32;
            Ok(page(start..start + 4, None, true))
        })
        .await
        .expect("collect");
        assert_eq!(items, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn empty_page_ends_walk_even_with_next() {
        let items = collect_all(10, 100, |_| async { Ok(page(0..0, None, true)) })
            .await
            .expect("collect");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn short_page_without_metadata_is_last() {
        let calls = Mutex::new(0);
        let items = collect_all(5, 100, |_| {
            *calls.lock().expect("lock") += 1;
            async { Ok(page(0..3, None, false)) }
        })
        .await
        .expect("collect");
        assert_eq!(items.len(), 3);
        assert_eq!(*calls.lock().expect("lock"), 1);
    }
}
