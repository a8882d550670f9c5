//! Error types for the sift crate.
//!
//! Each stage reports its own enum so callers can tell a bad filter apart
//! from a bad payload or a backend limitation. [`SiftError`] wraps all of
//! them for callers that only want to propagate.

use thiserror::Error;

use crate::operation::OperationKind;

/// Errors raised while constructing operations or filters.
#[derive(Debug, Error)]
pub enum BuildError {
    /// `Top` and `Skip` only accept non-negative counts.
    #[error("{kind} value must not be negative, got {value}")]
    NegativePagingValue { kind: OperationKind, value: i64 },

    /// The lambda is not a closed, single-parameter expression.
    #[error("unsupported expression shape: {0}")]
    UnsupportedExpressionShape(String),

    /// The operation kind does not take this payload.
    #[error("{kind} does not take {expected} payload")]
    KindShapeMismatch {
        kind: OperationKind,
        expected: &'static str,
    },

    /// Invalid regular expression pattern.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// Errors raised at the wire boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The expression cannot be written in the string grammar.
    #[error("expression cannot be encoded: {0}")]
    EncodingUnsupported(String),

    /// The wire value violates the grammar.
    #[error("malformed expression at offset {position}: {message}")]
    DecodingMalformed { position: usize, message: String },

    /// The target type has no member with this name.
    #[error("type '{type_name}' has no member '{member}'")]
    DecodingTypeMismatch { member: String, type_name: String },

    /// The envelope itself is not valid JSON.
    #[error("invalid wire envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// A decoded operation failed construction rules.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl CodecError {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        CodecError::DecodingMalformed {
            position,
            message: message.into(),
        }
    }
}

/// Errors raised while applying a filter to a source.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A member path does not resolve on the concrete element.
    #[error("cannot bind member '{member}' on {target}")]
    Binding { member: String, target: String },

    /// An operand has the wrong runtime type.
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The method is not in the supported set.
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// The operation kind is not allowed in this execution context.
    #[error("operation {0} is not allowed here")]
    KindNotAllowed(OperationKind),

    /// No projection was passed and the filter records none.
    #[error("no projection supplied and filter has no Select operation")]
    NoProjection,

    /// No grouping key was passed and the filter records none.
    #[error("no grouping key supplied and filter has no GroupBy operation")]
    NoGrouping,

    /// A nested record cannot be turned into an owned datum.
    #[error("value of type {0} cannot be projected")]
    NotProjectable(&'static str),

    /// The expression is nested deeper than the configured limit.
    #[error("expression depth exceeds maximum of {0}")]
    TooDeep(usize),

    /// The caller cancelled a streamed execution.
    #[error("execution cancelled")]
    Cancelled,
}

/// Errors raised by translators.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The backend cannot express this operation kind.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(OperationKind),

    /// No translator is registered under this name.
    #[error("no translator registered as '{0}'")]
    UnknownTranslator(String),

    /// Backend-specific translation failure.
    #[error("backend translation failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum SiftError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

/// Result type for sift operations.
pub type Result<T> = std::result::Result<T, SiftError>;
