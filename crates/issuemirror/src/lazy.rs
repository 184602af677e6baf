//! Pull-based sequence combinators over `futures` streams.
//!
//! Streams returned here are lazy: nothing is pulled from an input until the
//! consumer asks for the next item. Restarting a sequence means asking its
//! producer for a fresh stream.

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};

/// Apply `f` to every successful item, passing errors through untouched.
///
/// `f` may itself fail, in which case its error takes the item's place.
pub fn map_items<S, T, U, E, F>(input: S, mut f: F) -> impl Stream<Item = Result<U, E>>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> Result<U, E>,
{
    input.map(move |item| item.and_then(&mut f))
}

/// Drop `Ok(None)` items and unwrap `Ok(Some(_))` ones. Errors are kept.
pub fn compact<S, T, E>(input: S) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<Option<T>, E>>,
{
    input.try_filter_map(|item| futures::future::ready(Ok(item)))
}

struct MergeInput<'a, T, E> {
    stream: BoxStream<'a, Result<T, E>>,
    head: Option<T>,
    exhausted: bool,
}

/// Merge already-ordered streams into one stream ordered by `less_than`.
///
/// Holds at most one pending item per input. On ties the input that comes
/// first in `inputs` wins, so the merge is stable. An error from any input is
/// yielded as soon as it is pulled.
pub fn merge_ordered<'a, T, E, F>(
    inputs: Vec<BoxStream<'a, Result<T, E>>>,
    less_than: F,
) -> BoxStream<'a, Result<T, E>>
where
    T: Send + 'a,
    E: Send + 'a,
    F: Fn(&T, &T) -> bool + Send + 'a,
{
    let inputs: Vec<MergeInput<'a, T, E>> = inputs
        .into_iter()
        .map(|stream| MergeInput {
            stream,
            head: None,
            exhausted: false,
        })
        .collect();

    stream::unfold((inputs, less_than), |(mut inputs, less_than)| async move {
        for input in inputs.iter_mut() {
            if input.head.is_none() && !input.exhausted {
                match input.stream.next().await {
                    Some(Ok(item)) => input.head = Some(item),
                    Some(Err(e)) => return Some((Err(e), (inputs, less_than))),
                    None => input.exhausted = true,
                }
            }
        }

        let mut least: Option<(usize, &T)> = None;
        for (index, input) in inputs.iter().enumerate() {
            let Some(head) = input.head.as_ref() else {
                continue;
            };
            let replace = match least {
                Some((_, current)) => less_than(head, current),
                None => true,
            };
            if replace {
                least = Some((index, head));
            }
        }

        let index = least.map(|(index, _)| index)?;
        let item = inputs[index].head.take()?;
        Some((Ok(item), (inputs, less_than)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(
        items: Vec<Result<u32, String>>,
        pulls: Arc<AtomicUsize>,
    ) -> BoxStream<'static, Result<u32, String>> {
        stream::iter(items)
            .inspect(move |_| {
                pulls.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }

    fn ok(items: &[u32]) -> BoxStream<'static, Result<u32, String>> {
        stream::iter(items.iter().copied().map(Ok).collect::<Vec<_>>()).boxed()
    }

    #[tokio::test]
    async fn map_items_preserves_order_and_errors() {
        let input = stream::iter(vec![Ok(1), Err("boom".to_string()), Ok(3)]);
        let out: Vec<Result<u32, String>> = map_items(input, |x: u32| Ok(x * 10)).collect().await;
        assert_eq!(out, vec![Ok(10), Err("boom".to_string()), Ok(30)]);
    }

    #[tokio::test]
    async fn map_items_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_capture = Arc::clone(&calls);
        let mut out = Box::pin(map_items(ok(&[1, 2, 3]), move |x| {
            calls_capture.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(x)
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first = out.next().await;
        assert_eq!(first, Some(Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compact_drops_none_but_keeps_errors() {
        let input = stream::iter(vec![
            Ok(Some(1)),
            Ok(None),
            Err("bad".to_string()),
            Ok(Some(4)),
        ]);
        let out: Vec<Result<u32, String>> = compact(input).collect().await;
        assert_eq!(out, vec![Ok(1), Err("bad".to_string()), Ok(4)]);
    }

    #[tokio::test]
    async fn merge_ordered_interleaves_sorted_inputs() {
        let merged = merge_ordered(vec![ok(&[1, 4, 7]), ok(&[2, 3, 9]), ok(&[])], |a, b| a < b);
        let out: Vec<u32> = merged.try_collect().await.expect("no errors");
        assert_eq!(out, vec![1, 2, 3, 4, 7, 9]);
    }

    #[tokio::test]
    async fn merge_ordered_breaks_ties_by_input_order() {
        let left = stream::iter(vec![Ok::<_, String>((1, "left")), Ok((2, "left"))]).boxed();
        let right = stream::iter(vec![Ok((1, "right")), Ok((2, "right"))]).boxed();
        let merged = merge_ordered(vec![left, right], |a, b| a.0 < b.0);
        let out: Vec<(u32, &str)> = merged.try_collect().await.expect("no errors");
        assert_eq!(
            out,
            vec![(1, "left"), (1, "right"), (2, "left"), (2, "right")]
        );
    }

    #[tokio::test]
    async fn merge_ordered_looks_ahead_one_item_per_input() {
        let left_pulls = Arc::new(AtomicUsize::new(0));
        let right_pulls = Arc::new(AtomicUsize::new(0));
        let left = counted(vec![Ok(1), Ok(2), Ok(3)], Arc::clone(&left_pulls));
        let right = counted(vec![Ok(10), Ok(11)], Arc::clone(&right_pulls));

        let mut merged = merge_ordered(vec![left, right], |a, b| a < b);
        assert_eq!(merged.next().await, Some(Ok(1)));
        assert_eq!(left_pulls.load(Ordering::SeqCst), 1);
        assert_eq!(right_pulls.load(Ordering::SeqCst), 1);

        assert_eq!(merged.next().await, Some(Ok(2)));
        assert_eq!(left_pulls.load(Ordering::SeqCst), 2);
        assert_eq!(right_pulls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merge_ordered_surfaces_errors_when_pulled() {
        let left = stream::iter(vec![Ok(1), Err("page failed".to_string())]).boxed();
        let right = ok(&[5]);
        let mut merged = merge_ordered(vec![left, right], |a, b| a < b);

        assert_eq!(merged.next().await, Some(Ok(1)));
        assert_eq!(merged.next().await, Some(Err("page failed".to_string())));
    }
}
