//! Deferred queries.
//!
//! A [`Queryable`] pairs a source with the operations composed onto it so
//! far. Composing never runs anything; the pipeline runs once, when a
//! terminal method such as [`execute`](Queryable::execute) is called.

use crate::engine::{Executor, Group};
use crate::error::ExecutionError;
use crate::expr::Lambda;
use crate::filter::Filter;
use crate::record::Record;
use crate::value::Datum;

/// A query over a slice that has not run yet.
///
/// # Example
///
/// ```
/// use sift::{param, Filter, Lambda, Queryable};
///
/// let numbers = vec![4, 8, 15, 16, 23, 42];
///
/// let large = Filter::builder()
///     .filter(Lambda::of(param().gt(5)))
///     .build()
///     .unwrap();
/// let paging = Filter::builder().skip(1).top(2).build().unwrap();
///
/// let query = paging.apply_to(large.apply_to(Queryable::new(&numbers)));
/// assert_eq!(query.filter().len(), 3);
/// assert_eq!(query.execute().unwrap(), vec![&15, &16]);
/// ```
#[derive(Debug, Clone)]
pub struct Queryable<'a, T> {
    source: &'a [T],
    filter: Filter,
    executor: Executor,
}

impl<'a, T: Record> Queryable<'a, T> {
    pub fn new(source: &'a [T]) -> Self {
        Self::with_executor(source, Executor::new())
    }

    pub fn with_executor(source: &'a [T], executor: Executor) -> Self {
        Queryable {
            source,
            filter: Filter::new(),
            executor,
        }
    }

    /// The operations composed so far, in composition order.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn source(&self) -> &'a [T] {
        self.source
    }

    /// Appends `filter`'s operations. Nothing runs.
    pub(crate) fn compose(mut self, filter: &Filter) -> Self {
        self.filter = self.filter.merge(filter);
        self
    }

    pub fn execute(&self) -> Result<Vec<&'a T>, ExecutionError> {
        self.executor.apply(&self.filter, self.source)
    }

    pub fn count(&self) -> Result<usize, ExecutionError> {
        self.executor.count(&self.filter, self.source)
    }

    pub fn first(&self) -> Result<Option<&'a T>, ExecutionError> {
        self.executor.first(&self.filter, self.source)
    }

    /// Projects with the first composed `Select`.
    pub fn select(&self) -> Result<Vec<Datum>, ExecutionError> {
        self.executor.select(&self.filter, self.source, None)
    }

    /// Groups by the first composed `GroupBy`.
    pub fn group(&self) -> Result<Vec<Group<&'a T>>, ExecutionError> {
        self.executor.group(&self.filter, self.source, None)
    }

    /// Projects with an explicit lambda instead of a composed `Select`.
    pub fn select_with(&self, projection: &Lambda) -> Result<Vec<Datum>, ExecutionError> {
        self.executor.select(&self.filter, self.source, Some(projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::param;
    use crate::operation::OperationKinds;
    use crate::options::ExecutorOptions;

    #[test]
    fn composing_preserves_order_and_defers_execution() {
        let numbers: Vec<i64> = (0..10).collect();
        let top = Filter::builder().top(3).build().unwrap();
        let above_four = Filter::builder()
            .filter(Lambda::of(param().gt(4)))
            .build()
            .unwrap();

        let query = above_four.apply_to(top.apply_to(Queryable::new(&numbers)));
        let kinds = query.filter().kinds();
        assert_eq!(kinds, OperationKinds::TOP | OperationKinds::WHERE);
        assert_eq!(query.execute().unwrap(), vec![&5, &6, &7]);
        assert_eq!(query.count().unwrap(), 3);
        assert_eq!(query.first().unwrap(), Some(&5));
        assert_eq!(query.source().len(), 10);
    }

    #[test]
    fn executor_options_apply_at_execution() {
        let numbers = vec![1i64, 2, 3];
        let exec = Executor::with_options(ExecutorOptions::default().with_allowed(OperationKinds::WHERE));
        let query = Filter::builder()
            .top(1)
            .build()
            .unwrap()
            .apply_to(Queryable::with_executor(&numbers, exec));
        assert!(matches!(
            query.execute(),
            Err(ExecutionError::KindNotAllowed(_))
        ));
    }

    #[test]
    fn derived_queries_use_composed_defaults() {
        let numbers = vec![3i64, 1, 3, 2];
        let query = Filter::builder()
            .group_by(Lambda::of(param()))
            .build()
            .unwrap()
            .apply_to(Queryable::new(&numbers));
        let groups = query.group().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].items, vec![&3, &3]);
        assert!(matches!(query.select(), Err(ExecutionError::NoProjection)));
        assert_eq!(
            query.select_with(&Lambda::of(param())).unwrap()[3],
            Datum::from(2i64)
        );
    }
}
