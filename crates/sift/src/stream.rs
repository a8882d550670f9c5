//! Filtering asynchronous sources.
//!
//! The streamed pipeline pulls lazily. Without ordering it stops pulling as
//! soon as `skip + top` elements have matched. With ordering it must see the
//! whole source, but keeps at most `skip + top` candidates in memory when a
//! `Top` is present.

use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{Executor, Plan};
use crate::error::ExecutionError;
use crate::filter::Filter;
use crate::record::Record;

impl Executor {
    /// Applies `filter` to an asynchronous source.
    ///
    /// The token is checked before every pull and raced against a pull that
    /// is waiting on the source; once cancelled the stream yields
    /// [`ExecutionError::Cancelled`] and ends. Any other error also
    /// ends the stream after being yielded.
    ///
    /// # Example
    ///
    /// ```
    /// use futures::{stream, StreamExt};
    /// use sift::{param, Executor, Filter, Lambda};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let filter = Filter::builder()
    ///     .filter(Lambda::of(param().gt(10)))
    ///     .top(2)
    ///     .build()
    ///     .unwrap();
    ///
    /// let exec = Executor::new();
    /// let results: Vec<_> = exec
    ///     .stream(&filter, stream::iter(0..1_000), CancellationToken::new())
    ///     .collect()
    ///     .await;
    /// let values: Vec<i32> = results.into_iter().map(Result::unwrap).collect();
    /// assert_eq!(values, vec![11, 12]);
    /// # }
    /// ```
    pub fn stream<'s, T, S>(
        &'s self,
        filter: &'s Filter,
        source: S,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T, ExecutionError>> + 's
    where
        T: Record + 's,
        S: Stream<Item = T> + 's,
    {
        async_stream::stream! {
            if let Err(e) = self.check(filter) {
                yield Err(e);
                return;
            }
            let plan = Plan::new(filter.operations());
            let mut source = Box::pin(source);
            let mut pulled = 0usize;

            if !plan.is_ordered() {
                let mut skipped = 0usize;
                let mut emitted = 0usize;
                loop {
                    if plan.top.is_some_and(|top| emitted >= top) {
                        break;
                    }
                    if cancel.is_cancelled() {
                        yield Err(ExecutionError::Cancelled);
                        return;
                    }
                    let item = match cancel.run_until_cancelled(source.next()).await {
                        Some(Some(item)) => item,
                        Some(None) => break,
                        None => {
                            yield Err(ExecutionError::Cancelled);
                            return;
                        }
                    };
                    pulled += 1;
                    match plan.matches(&item) {
                        Ok(false) => continue,
                        Ok(true) if skipped < plan.skip => skipped += 1,
                        Ok(true) => {
                            emitted += 1;
                            yield Ok(item);
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
                debug!(pulled, emitted, "streamed filter finished");
                return;
            }

            let mut buffer = Buffer::new(plan.bound());
            loop {
                if cancel.is_cancelled() {
                    yield Err(ExecutionError::Cancelled);
                    return;
                }
                let item = match cancel.run_until_cancelled(source.next()).await {
                    Some(Some(item)) => item,
                    Some(None) => break,
                    None => {
                        yield Err(ExecutionError::Cancelled);
                        return;
                    }
                };
                pulled += 1;
                let kept = match plan.matches(&item) {
                    Ok(true) => buffer.push(item, &plan),
                    Ok(false) => Ok(()),
                    Err(e) => Err(e),
                };
                if let Err(e) = kept {
                    yield Err(e);
                    return;
                }
            }

            let sorted = match buffer.finish(&plan) {
                Ok(sorted) => sorted,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            debug!(pulled, "streamed filter sorted");
            for item in plan.page(sorted.into_iter()) {
                yield Ok(item);
            }
        }
    }
}

/// Candidates for an ordered stream.
///
/// When bounded, the buffer is compacted back to `bound` elements whenever
/// it doubles, so memory stays proportional to `skip + top`.
struct Buffer<T> {
    items: Vec<T>,
    bound: Option<usize>,
}

impl<T: Record> Buffer<T> {
    fn new(bound: Option<usize>) -> Self {
        Buffer {
            items: Vec::new(),
            bound,
        }
    }

    fn push(&mut self, item: T, plan: &Plan<'_>) -> Result<(), ExecutionError> {
        if self.bound == Some(0) {
            return Ok(());
        }
        self.items.push(item);
        if let Some(bound) = self.bound {
            if self.items.len() >= bound.saturating_mul(2) {
                self.compact(plan, bound)?;
            }
        }
        Ok(())
    }

    /// Keeps the `bound` best candidates. Arrival order breaks ties because
    /// the sort is stable and earlier arrivals sit earlier in the buffer.
    fn compact(&mut self, plan: &Plan<'_>, bound: usize) -> Result<(), ExecutionError> {
        let items = std::mem::take(&mut self.items);
        let mut sorted = plan.sort(items)?;
        sorted.truncate(bound);
        self.items = sorted;
        Ok(())
    }

    fn finish(self, plan: &Plan<'_>) -> Result<Vec<T>, ExecutionError> {
        plan.sort(self.items)
    }
}
