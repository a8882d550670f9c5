//! The filter container.
//!
//! A [`Filter`] is an ordered list of [`Operation`]s. Declaration order is
//! kept through serialization and decoding; execution order is fixed by the
//! engine (see [`Executor`]).

use futures::stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::codec::{encode_operation, WireFilter};
use crate::engine::{Executor, Group};
use crate::error::{BuildError, CodecError, ExecutionError, TranslateError};
use crate::expr::Lambda;
use crate::operation::{ExpressionOperation, Operation, OperationKind, OperationKinds, ValueOperation};
use crate::queryable::Queryable;
use crate::record::Record;
use crate::translate::Translator;
use crate::value::Datum;

/// An ordered list of filter operations.
///
/// Orderings follow re-sort semantics: each `OrderBy*` starts a chain that
/// `ThenBy*` operations extend, and a later chain outranks an earlier one,
/// which then only breaks its ties. `.order_by(a).order_by(b)` therefore
/// sorts by `b`, then `a`. Translators should keep this reading.
///
/// # Example
///
/// ```
/// use sift::{field, Filter, Lambda};
///
/// let filter = Filter::builder()
///     .filter(Lambda::of(field("priority").ge(3)))
///     .order_by_descending(Lambda::of(field("priority")))
///     .then_by(Lambda::of(field("name")))
///     .skip(20)
///     .top(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(filter.len(), 5);
/// assert!(filter.default_projection().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    operations: Vec<Operation>,
}

impl Filter {
    /// Creates an empty filter, which matches everything.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Starts a fluent builder.
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    pub(crate) fn from_operations(operations: Vec<Operation>) -> Self {
        Filter { operations }
    }

    /// Appends an operation.
    pub fn add(mut self, operation: impl Into<Operation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    /// Appends every operation of `other`, after this filter's own.
    pub fn merge(mut self, other: &Filter) -> Self {
        self.operations.extend(other.operations.iter().cloned());
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The set of kinds this filter uses.
    pub fn kinds(&self) -> OperationKinds {
        self.operations
            .iter()
            .fold(OperationKinds::empty(), |set, op| set | op.kind().flag())
    }

    /// Serializes to the wire form.
    ///
    /// Fails with [`CodecError::EncodingUnsupported`] if any expression
    /// cannot be written in the grammar.
    pub fn serialize(&self) -> Result<WireFilter, CodecError> {
        let operations = self
            .operations
            .iter()
            .map(encode_operation)
            .collect::<Result<_, _>>()?;
        Ok(WireFilter { operations })
    }

    /// Returns a string that identifies this filter, for caching.
    ///
    /// Equal operations in equal order give equal keys; any reordering gives
    /// a different key. Each value is length-prefixed, so no two filters
    /// share a key by concatenation accident.
    pub fn to_key(&self) -> Result<String, CodecError> {
        let mut key = String::new();
        for op in &self.operations {
            let wire = encode_operation(op)?;
            let part = match &wire.value {
                Some(value) => format!("{}:{}:{};", wire.kind.code(), value.len(), value),
                None => format!("{}:~;", wire.kind.code()),
            };
            key.push_str(&part);
        }
        Ok(key)
    }

    /// The first declared `Select` that carries an expression.
    pub fn default_projection(&self) -> Option<&Lambda> {
        self.first_expression(OperationKind::Select)
    }

    /// The first declared `GroupBy` that carries an expression.
    pub fn default_grouping(&self) -> Option<&Lambda> {
        self.first_expression(OperationKind::GroupBy)
    }

    fn first_expression(&self, kind: OperationKind) -> Option<&Lambda> {
        self.operations
            .iter()
            .filter(|op| op.kind() == kind)
            .find_map(Operation::expression)
    }

    /// Hands this filter to a backend translator.
    pub fn translate<T: Translator + ?Sized>(&self, translator: &T) -> Result<T::Output, TranslateError> {
        translator.translate(self)
    }

    /// Fails with [`ExecutionError::KindNotAllowed`] for the first operation
    /// whose kind is not in `allowed`. `Select` and `GroupBy` always pass.
    pub fn validate_kinds(&self, allowed: OperationKinds) -> Result<(), ExecutionError> {
        match self
            .operations
            .iter()
            .map(Operation::kind)
            .find(|kind| !kind.is_derived() && !allowed.allows(*kind))
        {
            Some(kind) => Err(ExecutionError::KindNotAllowed(kind)),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Execution shortcuts (default executor)
    // ========================================================================

    pub fn apply<'a, T: Record>(&self, items: &'a [T]) -> Result<Vec<&'a T>, ExecutionError> {
        Executor::new().apply(self, items)
    }

    pub fn apply_cloned<T: Record + Clone>(&self, items: &[T]) -> Result<Vec<T>, ExecutionError> {
        Executor::new().apply_cloned(self, items)
    }

    pub fn apply_iter<T: Record>(
        &self,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, ExecutionError> {
        Executor::new().apply_iter(self, items)
    }

    pub fn apply_entries<'a, K: Record + 'a, V: Record + 'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a K, &'a V)>,
    ) -> Result<Vec<(&'a K, &'a V)>, ExecutionError> {
        Executor::new().apply_entries(self, entries)
    }

    pub fn select<T: Record>(
        &self,
        items: &[T],
        projection: Option<&Lambda>,
    ) -> Result<Vec<Datum>, ExecutionError> {
        Executor::new().select(self, items, projection)
    }

    pub fn select_entries<'a, K: Record + 'a, V: Record + 'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a K, &'a V)>,
        projection: Option<&Lambda>,
    ) -> Result<Vec<Datum>, ExecutionError> {
        Executor::new().select_entries(self, entries, projection)
    }

    pub fn group_entries<'a, K: Record + 'a, V: Record + 'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a K, &'a V)>,
        key: Option<&Lambda>,
    ) -> Result<Vec<Group<(&'a K, &'a V)>>, ExecutionError> {
        Executor::new().group_entries(self, entries, key)
    }

    pub fn group<'a, T: Record>(
        &self,
        items: &'a [T],
        key: Option<&Lambda>,
    ) -> Result<Vec<Group<&'a T>>, ExecutionError> {
        Executor::new().group(self, items, key)
    }

    pub fn count<T: Record>(&self, items: &[T]) -> Result<usize, ExecutionError> {
        Executor::new().count(self, items)
    }

    pub fn any<T: Record>(&self, items: &[T]) -> Result<bool, ExecutionError> {
        Executor::new().any(self, items)
    }

    pub fn first<'a, T: Record>(&self, items: &'a [T]) -> Result<Option<&'a T>, ExecutionError> {
        Executor::new().first(self, items)
    }

    /// Streams results from an asynchronous source.
    pub fn stream<'s, T, S>(
        &'s self,
        source: S,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T, ExecutionError>> + 's
    where
        T: Record + 's,
        S: Stream<Item = T> + 's,
    {
        static DEFAULT: Executor = Executor::DEFAULT;
        DEFAULT.stream(self, source, cancel)
    }

    /// Composes this filter onto a deferred query without running it.
    pub fn apply_to<'a, T: Record>(&self, query: Queryable<'a, T>) -> Queryable<'a, T> {
        query.compose(self)
    }
}

/// Fluent construction of a [`Filter`].
///
/// Construction errors are deferred to [`build`](FilterBuilder::build),
/// which reports the first one.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    operations: Vec<Operation>,
    error: Option<BuildError>,
}

impl FilterBuilder {
    fn push(mut self, operation: Result<Operation, BuildError>) -> Self {
        match operation {
            Ok(op) => self.operations.push(op),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    fn expression(self, kind: OperationKind, lambda: Lambda) -> Self {
        self.push(ExpressionOperation::new(kind, Some(lambda)).map(Operation::from))
    }

    fn value(self, kind: OperationKind, value: Option<i64>) -> Self {
        self.push(ValueOperation::new(kind, value).map(Operation::from))
    }

    /// Adds a `Where` predicate. All predicates must hold.
    pub fn filter(self, predicate: Lambda) -> Self {
        self.expression(OperationKind::Where, predicate)
    }

    pub fn order_by(self, key: Lambda) -> Self {
        self.expression(OperationKind::OrderBy, key)
    }

    pub fn order_by_descending(self, key: Lambda) -> Self {
        self.expression(OperationKind::OrderByDescending, key)
    }

    pub fn then_by(self, key: Lambda) -> Self {
        self.expression(OperationKind::ThenBy, key)
    }

    pub fn then_by_descending(self, key: Lambda) -> Self {
        self.expression(OperationKind::ThenByDescending, key)
    }

    /// Keeps at most `n` results. Negative counts fail at [`build`](Self::build).
    pub fn top(self, n: i64) -> Self {
        self.value(OperationKind::Top, Some(n))
    }

    /// Drops the first `n` results. Negative counts fail at [`build`](Self::build).
    pub fn skip(self, n: i64) -> Self {
        self.value(OperationKind::Skip, Some(n))
    }

    /// `None` records an unbounded `Top`.
    pub fn top_opt(self, n: Option<i64>) -> Self {
        self.value(OperationKind::Top, n)
    }

    /// `None` records an unbounded `Skip`.
    pub fn skip_opt(self, n: Option<i64>) -> Self {
        self.value(OperationKind::Skip, n)
    }

    /// Records a grouping key; see [`Filter::default_grouping`].
    pub fn group_by(self, key: Lambda) -> Self {
        self.expression(OperationKind::GroupBy, key)
    }

    /// Records a projection; see [`Filter::default_projection`].
    pub fn select(self, projection: Lambda) -> Self {
        self.expression(OperationKind::Select, projection)
    }

    /// Appends an already constructed operation.
    pub fn operation(self, operation: impl Into<Operation>) -> Self {
        self.push(Ok(operation.into()))
    }

    pub fn build(self) -> Result<Filter, BuildError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Filter {
                operations: self.operations,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{field, native, Expr};
    use crate::value::Datum;

    fn sample() -> Filter {
        Filter::builder()
            .filter(Lambda::of(field("a").gt(1)))
            .skip(10)
            .top(5)
            .build()
            .unwrap()
    }

    #[test]
    fn add_appends_in_order() {
        let filter = Filter::new()
            .add(ValueOperation::new(OperationKind::Top, Some(1)).unwrap())
            .add(ExpressionOperation::new(OperationKind::Where, None).unwrap());
        let kinds: Vec<_> = filter.operations().iter().map(Operation::kind).collect();
        assert_eq!(kinds, [OperationKind::Top, OperationKind::Where]);
    }

    #[test]
    fn builder_reports_first_error() {
        let err = Filter::builder()
            .top(-1)
            .filter(Lambda::with_params(["a", "b"], Expr::Param("a".into())))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::NegativePagingValue {
                kind: OperationKind::Top,
                value: -1
            }
        ));
    }

    #[test]
    fn key_is_length_prefixed() {
        assert_eq!(
            sample().to_key().unwrap(),
            "1:14:x => (x.a > 1);64:2:10;32:1:5;"
        );
        let empty = Filter::new().add(ValueOperation::new(OperationKind::Top, None).unwrap());
        assert_eq!(empty.to_key().unwrap(), "32:~;");
    }

    #[test]
    fn key_depends_on_order() {
        let reordered = Filter::builder()
            .filter(Lambda::of(field("a").gt(1)))
            .top(5)
            .skip(10)
            .build()
            .unwrap();
        assert_ne!(sample().to_key().unwrap(), reordered.to_key().unwrap());
        assert_eq!(sample().to_key().unwrap(), sample().to_key().unwrap());
    }

    #[test]
    fn native_expressions_cannot_be_serialized() {
        let filter = Filter::builder()
            .filter(Lambda::of(native("always", |_| Datum::Bool(true))))
            .build()
            .unwrap();
        assert!(matches!(
            filter.serialize(),
            Err(CodecError::EncodingUnsupported(_))
        ));
        assert!(filter.to_key().is_err());
    }

    #[test]
    fn defaults_are_first_declared() {
        let first = Lambda::of(field("a"));
        let filter = Filter::builder()
            .select(first.clone())
            .select(Lambda::of(field("b")))
            .group_by(Lambda::of(field("c")))
            .build()
            .unwrap();
        assert_eq!(filter.default_projection(), Some(&first));
        assert_eq!(filter.default_grouping(), Some(&Lambda::of(field("c"))));
        assert_eq!(sample().default_grouping(), None);
    }

    #[test]
    fn defaults_skip_operations_without_payload() {
        let projection = Lambda::of(field("b"));
        let filter = Filter::new()
            .add(ExpressionOperation::new(OperationKind::Select, None).unwrap())
            .add(ExpressionOperation::new(OperationKind::Select, Some(projection.clone())).unwrap());
        assert_eq!(filter.default_projection(), Some(&projection));
        assert_eq!(filter.to_key().unwrap(), "256:~;256:8:x => x.b;");
    }

    #[test]
    fn kinds_and_validation() {
        let filter = sample();
        assert_eq!(
            filter.kinds(),
            OperationKinds::WHERE | OperationKinds::SKIP | OperationKinds::TOP
        );
        assert!(filter.validate_kinds(OperationKinds::DEFAULT).is_ok());
        assert!(matches!(
            filter.validate_kinds(OperationKinds::WHERE | OperationKinds::TOP),
            Err(ExecutionError::KindNotAllowed(OperationKind::Skip))
        ));

        let projected = filter.add(
            ExpressionOperation::new(OperationKind::Select, Some(Lambda::of(field("a")))).unwrap(),
        );
        assert!(projected.validate_kinds(OperationKinds::DEFAULT).is_ok());
    }

    #[test]
    fn merge_appends_other_operations() {
        let merged = sample().merge(&sample());
        assert_eq!(merged.len(), 6);
        assert!(!merged.is_empty());
    }

    #[test]
    fn serialize_keeps_declaration_order() {
        let wire = sample().serialize().unwrap();
        let kinds: Vec<_> = wire.operations.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            [OperationKind::Where, OperationKind::Skip, OperationKind::Top]
        );
        assert_eq!(wire.decode_untyped().unwrap(), sample());
    }
}
