//! In-memory execution of filters.
//!
//! Every entry point runs the same fixed pipeline, whatever order the
//! operations were declared in:
//!
//! ```text
//! Where (all, conjunctive) → OrderBy/ThenBy (stable) → Skip → Top → Select | GroupBy
//! ```
//!
//! Ordering reads like repeated stable sorts: the first `OrderBy*` is the
//! primary key only until another `OrderBy*` follows, at which point the
//! later chain becomes primary and the earlier one breaks its ties.
//!
//! Errors abort the whole call; a filter never produces a partial result.

use std::collections::{hash_map, HashMap};

use tracing::{debug, trace};

use crate::error::ExecutionError;
use crate::eval;
use crate::expr::Lambda;
use crate::filter::Filter;
use crate::operation::{Operation, OperationKind};
use crate::options::{ExecutorOptions, MAX_TREE_HEIGHT};
use crate::ordering::{compare_keys, sort_plan, SortKey};
use crate::record::{Entry, Record};
use crate::value::{Datum, Number, Value};

/// Runs filters against in-memory sources.
///
/// Executors are cheap, immutable and stateless between calls.
///
/// # Example
///
/// ```
/// use sift::{param, Executor, Filter, Lambda};
///
/// let filter = Filter::builder()
///     .filter(Lambda::of(param().gt(2)))
///     .order_by_descending(Lambda::of(param()))
///     .top(2)
///     .build()
///     .unwrap();
///
/// let numbers = vec![1, 5, 3, 4, 2];
/// let out = Executor::new().apply(&filter, &numbers).unwrap();
/// assert_eq!(out, vec![&5, &4]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    options: ExecutorOptions,
}

/// Elements sharing one grouping key, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<E> {
    pub key: Datum,
    pub items: Vec<E>,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::DEFAULT
    }
}

impl Executor {
    /// An executor with [`ExecutorOptions::DEFAULT`].
    pub const DEFAULT: Executor = Executor {
        options: ExecutorOptions::DEFAULT,
    };

    pub fn new() -> Self {
        Executor::default()
    }

    pub fn with_options(options: ExecutorOptions) -> Self {
        Executor { options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Checks that a filter may run here: every kind is allowed and no
    /// expression nests deeper than the configured limit or grows taller
    /// than [`MAX_TREE_HEIGHT`].
    pub fn check(&self, filter: &Filter) -> Result<(), ExecutionError> {
        filter.validate_kinds(self.options.allowed)?;
        for lambda in filter.operations().iter().filter_map(Operation::expression) {
            let body = lambda.body();
            if body.height() > MAX_TREE_HEIGHT {
                return Err(ExecutionError::TooDeep(MAX_TREE_HEIGHT));
            }
            if body.depth() > self.options.max_depth {
                return Err(ExecutionError::TooDeep(self.options.max_depth));
            }
        }
        Ok(())
    }

    /// Filters, orders and pages a slice, returning references into it.
    pub fn apply<'a, T: Record>(
        &self,
        filter: &Filter,
        items: &'a [T],
    ) -> Result<Vec<&'a T>, ExecutionError> {
        self.run(filter, items.iter())
    }

    /// Like [`apply`](Self::apply), but clones the results.
    pub fn apply_cloned<T: Record + Clone>(
        &self,
        filter: &Filter,
        items: &[T],
    ) -> Result<Vec<T>, ExecutionError> {
        Ok(self
            .apply(filter, items)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Runs the pipeline over an owned sequence.
    pub fn apply_iter<T, I>(&self, filter: &Filter, items: I) -> Result<Vec<T>, ExecutionError>
    where
        T: Record,
        I: IntoIterator<Item = T>,
    {
        self.run(filter, items)
    }

    /// Runs the pipeline over key/value pairs.
    ///
    /// Expressions see the value; the reserved root member `key` resolves to
    /// the key. Accepts anything that iterates `(&K, &V)`, such as a map's
    /// `iter()`.
    pub fn apply_entries<'a, K, V, I>(
        &self,
        filter: &Filter,
        entries: I,
    ) -> Result<Vec<(&'a K, &'a V)>, ExecutionError>
    where
        K: Record + 'a,
        V: Record + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let entries = entries.into_iter().map(|(key, value)| Entry { key, value });
        Ok(self
            .run(filter, entries)?
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect())
    }

    /// Runs the pipeline and projects each result.
    ///
    /// Falls back to the filter's first `Select` when `projection` is `None`.
    pub fn select<T: Record>(
        &self,
        filter: &Filter,
        items: &[T],
        projection: Option<&Lambda>,
    ) -> Result<Vec<Datum>, ExecutionError> {
        let projection = projection
            .or_else(|| filter.default_projection())
            .ok_or(ExecutionError::NoProjection)?;
        self.apply(filter, items)?
            .into_iter()
            .map(|item| eval::datum(projection, item))
            .collect()
    }

    /// Runs the pipeline and groups the results by key.
    ///
    /// Falls back to the filter's first `GroupBy` when `key` is `None`.
    /// Groups appear in the order their first element does.
    pub fn group<'a, T: Record>(
        &self,
        filter: &Filter,
        items: &'a [T],
        key: Option<&Lambda>,
    ) -> Result<Vec<Group<&'a T>>, ExecutionError> {
        let key = key
            .or_else(|| filter.default_grouping())
            .ok_or(ExecutionError::NoGrouping)?;
        group_by(self.apply(filter, items)?, key)
    }

    /// Projects key/value pairs. Expressions see the value, and the root
    /// member `key` resolves to the key, as in
    /// [`apply_entries`](Self::apply_entries).
    pub fn select_entries<'a, K, V, I>(
        &self,
        filter: &Filter,
        entries: I,
        projection: Option<&Lambda>,
    ) -> Result<Vec<Datum>, ExecutionError>
    where
        K: Record + 'a,
        V: Record + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let projection = projection
            .or_else(|| filter.default_projection())
            .ok_or(ExecutionError::NoProjection)?;
        let entries = entries.into_iter().map(|(key, value)| Entry { key, value });
        self.run(filter, entries)?
            .iter()
            .map(|entry| eval::datum(projection, entry))
            .collect()
    }

    /// Groups key/value pairs, which may be keyed by `key` or by members of
    /// the value.
    pub fn group_entries<'a, K, V, I>(
        &self,
        filter: &Filter,
        entries: I,
        key: Option<&Lambda>,
    ) -> Result<Vec<Group<(&'a K, &'a V)>>, ExecutionError>
    where
        K: Record + 'a,
        V: Record + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let key = key
            .or_else(|| filter.default_grouping())
            .ok_or(ExecutionError::NoGrouping)?;
        let entries = entries.into_iter().map(|(key, value)| Entry { key, value });
        Ok(group_by(self.run(filter, entries)?, key)?
            .into_iter()
            .map(|group| Group {
                key: group.key,
                items: group.items.into_iter().map(|e| (e.key, e.value)).collect(),
            })
            .collect())
    }

    /// Number of results the filter yields, paging included.
    pub fn count<T: Record>(&self, filter: &Filter, items: &[T]) -> Result<usize, ExecutionError> {
        Ok(self.apply(filter, items)?.len())
    }

    /// Returns `true` if the filter yields at least one result.
    pub fn any<T: Record>(&self, filter: &Filter, items: &[T]) -> Result<bool, ExecutionError> {
        Ok(self.first(filter, items)?.is_some())
    }

    /// Returns the first result.
    pub fn first<'a, T: Record>(
        &self,
        filter: &Filter,
        items: &'a [T],
    ) -> Result<Option<&'a T>, ExecutionError> {
        Ok(self.apply(filter, items)?.into_iter().next())
    }

    fn run<E, I>(&self, filter: &Filter, items: I) -> Result<Vec<E>, ExecutionError>
    where
        E: Record,
        I: IntoIterator<Item = E>,
    {
        self.check(filter)?;
        let plan = Plan::new(filter.operations());

        let mut input = 0usize;
        let mut matched = Vec::new();
        for item in items {
            input += 1;
            if plan.matches(&item)? {
                matched.push(item);
            }
        }
        let matched_count = matched.len();

        let sorted = plan.sort(matched)?;
        let out: Vec<E> = plan.page(sorted.into_iter()).collect();

        debug!(
            input,
            matched = matched_count,
            output = out.len(),
            operations = filter.len(),
            "filter applied"
        );
        Ok(out)
    }
}

/// The operations of a filter, arranged by pipeline stage.
pub(crate) struct Plan<'f> {
    predicates: Vec<&'f Lambda>,
    sort: Vec<SortKey<'f>>,
    pub skip: usize,
    pub top: Option<usize>,
}

impl<'f> Plan<'f> {
    /// Multiple `Skip`s add up; multiple `Top`s keep the smallest. A `None`
    /// payload leaves that stage unbounded.
    pub fn new(operations: &'f [Operation]) -> Self {
        let mut predicates = Vec::new();
        let mut skip = 0usize;
        let mut top: Option<usize> = None;

        for op in operations {
            match op.kind() {
                OperationKind::Where => predicates.extend(op.expression()),
                OperationKind::Skip => {
                    if let Some(n) = op.value() {
                        skip = skip.saturating_add(to_count(n));
                    }
                }
                OperationKind::Top => {
                    if let Some(n) = op.value() {
                        let n = to_count(n);
                        top = Some(top.map_or(n, |t| t.min(n)));
                    }
                }
                _ => {}
            }
        }

        let plan = Plan {
            predicates,
            sort: sort_plan(operations),
            skip,
            top,
        };
        trace!(
            predicates = plan.predicates.len(),
            sort_keys = plan.sort.len(),
            skip = plan.skip,
            top = ?plan.top,
            "planned filter"
        );
        plan
    }

    pub fn is_ordered(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Most elements any later stage can emit, counting skipped ones.
    pub fn bound(&self) -> Option<usize> {
        self.top.map(|t| t.saturating_add(self.skip))
    }

    pub fn matches(&self, item: &dyn Record) -> Result<bool, ExecutionError> {
        for predicate in &self.predicates {
            if !eval::predicate(predicate, item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Stable sort by the plan's keys. Keys are computed once per element.
    pub fn sort<E: Record>(&self, items: Vec<E>) -> Result<Vec<E>, ExecutionError> {
        if self.sort.is_empty() || items.len() < 2 {
            return Ok(items);
        }

        let order = {
            let keys = items
                .iter()
                .map(|item| self.sort_key(item))
                .collect::<Result<Vec<_>, _>>()?;
            let mut order: Vec<usize> = (0..items.len()).collect();
            order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b], &self.sort));
            order
        };

        let mut slots: Vec<Option<E>> = items.into_iter().map(Some).collect();
        Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
    }

    fn sort_key<'a>(&'a self, item: &'a dyn Record) -> Result<Vec<Value<'a>>, ExecutionError> {
        self.sort
            .iter()
            .map(|key| eval::eval(key.lambda, item))
            .collect()
    }

    pub fn page<E>(&self, items: impl Iterator<Item = E>) -> impl Iterator<Item = E> {
        items.skip(self.skip).take(self.top.unwrap_or(usize::MAX))
    }
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn group_by<E: Record>(items: Vec<E>, key: &Lambda) -> Result<Vec<Group<E>>, ExecutionError> {
    let mut groups: Vec<Group<E>> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for item in items {
        let datum = eval::datum(key, &item)?;
        match index.entry(GroupKey::of(&datum)) {
            hash_map::Entry::Occupied(slot) => groups[*slot.get()].items.push(item),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(Group {
                    key: datum,
                    items: vec![item],
                });
            }
        }
    }

    debug!(groups = groups.len(), "grouped results");
    Ok(groups)
}

/// Hashable form of a grouping key. Numbers that compare equal share a key
/// whatever their representation, and every NaN falls in one group.
#[derive(Debug, PartialEq, Eq, Hash)]
enum GroupKey {
    Null,
    Bool(bool),
    Int(i128),
    Float(u64),
    NaN,
    Str(String),
    Row(Vec<(String, GroupKey)>),
}

impl GroupKey {
    fn of(datum: &Datum) -> GroupKey {
        match datum {
            Datum::Null => GroupKey::Null,
            Datum::Bool(b) => GroupKey::Bool(*b),
            Datum::Number(Number::I64(n)) => GroupKey::Int(i128::from(*n)),
            Datum::Number(Number::U64(n)) => GroupKey::Int(i128::from(*n)),
            Datum::Number(Number::F64(f)) if f.is_nan() => GroupKey::NaN,
            // Integral floats within i64/u64 range meet their integer twins.
            Datum::Number(Number::F64(f)) if f.fract() == 0.0 && f.abs() < 2e19 => {
                GroupKey::Int(*f as i128)
            }
            Datum::Number(Number::F64(f)) => GroupKey::Float(f.to_bits()),
            Datum::String(s) => GroupKey::Str(s.clone()),
            Datum::Row(columns) => GroupKey::Row(
                columns
                    .iter()
                    .map(|(name, value)| (name.clone(), GroupKey::of(value)))
                    .collect(),
            ),
        }
    }
}
