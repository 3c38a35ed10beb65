//! Bounded concurrent lookups against a collaborator.
//!
//! Per-cell calls (neighbors, parent, children, centroid) are independent,
//! so they run concurrently, but never more than `limit` at a time.

use std::future::Future;

use futures_util::{stream, StreamExt, TryStreamExt};

use crate::Result;

/// Run `f` over `items` with at most `limit` calls in flight. Results come
/// back in input order, so neighbor enumeration order survives.
pub async fn ordered<'a, I, T, F, Fut>(items: &'a [I], limit: usize, f: F) -> Result<Vec<T>>
where
    F: FnMut(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items).map(f).buffered(limit.max(1)).try_collect().await
}

/// Like [`ordered`], but results arrive in completion order. Only for
/// callers that merge through a set or a sum.
pub async fn unordered<'a, I, T, F, Fut>(items: &'a [I], limit: usize, f: F) -> Result<Vec<T>>
where
    F: FnMut(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items).map(f).buffer_unordered(limit.max(1)).try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_ordered_keeps_input_order() {
        let items = [3u64, 1, 2];
        let out = ordered(&items, 2, |&n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(n * 5)).await;
            Ok(n)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let items = [1, 2, 3];
        let res: Result<Vec<i32>> = unordered(&items, 8, |&n| async move {
            if n == 2 { Err(Error::UpstreamFailure("boom".into())) } else { Ok(n) }
        })
        .await;
        assert!(matches!(res, Err(Error::UpstreamFailure(_))));
    }
}
