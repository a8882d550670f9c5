//! Backend translation.
//!
//! A [`Translator`] turns a [`Filter`] into whatever a backend runs: a SQL
//! fragment, a search request, or (for [`IdentityTranslator`]) an in-memory
//! query. Translators must keep operation order and semantics exactly, and
//! refuse kinds they cannot express with
//! [`TranslateError::UnsupportedOperation`] rather than dropping them.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::engine::Executor;
use crate::error::{ExecutionError, TranslateError};
use crate::filter::Filter;
use crate::operation::{Operation, OperationKinds};
use crate::record::Record;

/// Converts filters into a backend's query representation.
///
/// # Example
///
/// ```
/// use sift::{field, Filter, Lambda, OperationKind, OperationKinds, TranslateError, Translator};
///
/// struct CountOnly;
///
/// impl Translator for CountOnly {
///     type Output = usize;
///
///     fn supported(&self) -> OperationKinds {
///         OperationKinds::WHERE
///     }
///
///     fn translate(&self, filter: &Filter) -> Result<usize, TranslateError> {
///         self.check(filter)?;
///         Ok(filter.len())
///     }
/// }
///
/// let filter = Filter::builder()
///     .filter(Lambda::of(field("a").eq(1)))
///     .top(5)
///     .build()
///     .unwrap();
///
/// assert!(matches!(
///     filter.translate(&CountOnly),
///     Err(TranslateError::UnsupportedOperation(OperationKind::Top))
/// ));
/// ```
pub trait Translator {
    type Output;

    /// Kinds this translator can express.
    fn supported(&self) -> OperationKinds;

    fn translate(&self, filter: &Filter) -> Result<Self::Output, TranslateError>;

    /// Fails with the first operation whose kind is not [`supported`](Self::supported).
    fn check(&self, filter: &Filter) -> Result<(), TranslateError> {
        let supported = self.supported();
        match filter
            .operations()
            .iter()
            .map(Operation::kind)
            .find(|kind| !supported.contains(kind.flag()))
        {
            Some(kind) => Err(TranslateError::UnsupportedOperation(kind)),
            None => Ok(()),
        }
    }
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    type Output = T::Output;

    fn supported(&self) -> OperationKinds {
        (**self).supported()
    }

    fn translate(&self, filter: &Filter) -> Result<Self::Output, TranslateError> {
        (**self).translate(filter)
    }

    fn check(&self, filter: &Filter) -> Result<(), TranslateError> {
        (**self).check(filter)
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Translates a filter into a query that runs in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator {
    executor: Executor,
}

impl IdentityTranslator {
    pub fn new() -> Self {
        IdentityTranslator::default()
    }

    pub fn with_executor(executor: Executor) -> Self {
        IdentityTranslator { executor }
    }
}

impl Translator for IdentityTranslator {
    type Output = PreparedQuery;

    fn supported(&self) -> OperationKinds {
        OperationKinds::all()
    }

    fn translate(&self, filter: &Filter) -> Result<PreparedQuery, TranslateError> {
        self.executor.check(filter)?;
        Ok(PreparedQuery {
            filter: filter.clone(),
            executor: self.executor,
        })
    }
}

/// A checked filter bound to an executor.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    filter: Filter,
    executor: Executor,
}

impl PreparedQuery {
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn apply<'a, T: Record>(&self, items: &'a [T]) -> Result<Vec<&'a T>, ExecutionError> {
        self.executor.apply(&self.filter, items)
    }

    pub fn apply_iter<T: Record>(
        &self,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, ExecutionError> {
        self.executor.apply_iter(&self.filter, items)
    }

    pub fn count<T: Record>(&self, items: &[T]) -> Result<usize, ExecutionError> {
        self.executor.count(&self.filter, items)
    }
}

// ============================================================================
// Registry
// ============================================================================

type BoxedTranslator<O> = Box<dyn Translator<Output = O> + Send + Sync>;

/// Named translators sharing one output type.
///
/// Built once through [`TranslatorRegistry::builder`] and immutable after.
///
/// ```
/// use sift::{Filter, IdentityTranslator, TranslateError, TranslatorRegistry};
///
/// let registry = TranslatorRegistry::builder()
///     .register("memory", IdentityTranslator::new())
///     .build();
///
/// let query = registry.translate("memory", &Filter::new()).unwrap();
/// assert_eq!(query.apply(&[1, 2, 3]).unwrap().len(), 3);
///
/// assert!(matches!(
///     registry.get("postgres"),
///     Err(TranslateError::UnknownTranslator(_))
/// ));
/// ```
pub struct TranslatorRegistry<O> {
    translators: HashMap<String, BoxedTranslator<O>>,
}

impl<O> TranslatorRegistry<O> {
    pub fn builder() -> TranslatorRegistryBuilder<O> {
        TranslatorRegistryBuilder {
            translators: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&(dyn Translator<Output = O> + Send + Sync), TranslateError> {
        self.translators
            .get(name)
            .map(|t| &**t)
            .ok_or_else(|| TranslateError::UnknownTranslator(name.to_string()))
    }

    /// Looks up `name` and translates `filter` with it.
    pub fn translate(&self, name: &str, filter: &Filter) -> Result<O, TranslateError> {
        let translator = self.get(name)?;
        debug!(translator = name, operations = filter.len(), "translating filter");
        translator.translate(filter)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.translators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.translators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.translators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }
}

impl<O> fmt::Debug for TranslatorRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("translators", &self.names())
            .finish()
    }
}

/// Collects translators for a [`TranslatorRegistry`].
pub struct TranslatorRegistryBuilder<O> {
    translators: HashMap<String, BoxedTranslator<O>>,
}

impl<O> TranslatorRegistryBuilder<O> {
    /// Registers `translator` under `name`. A later registration replaces an
    /// earlier one with the same name.
    pub fn register<T>(mut self, name: impl Into<String>, translator: T) -> Self
    where
        T: Translator<Output = O> + Send + Sync + 'static,
    {
        self.translators.insert(name.into(), Box::new(translator));
        self
    }

    pub fn build(self) -> TranslatorRegistry<O> {
        TranslatorRegistry {
            translators: self.translators,
        }
    }
}
