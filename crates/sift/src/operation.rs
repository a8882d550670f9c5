//! Filter operations as data.
//!
//! An [`Operation`] is either an [`ExpressionOperation`] (predicate, sort key,
//! grouping key or projection) or a [`ValueOperation`] (paging count). The
//! [`OperationKind`] tag decides which payload is legal; constructors reject
//! any other combination.

use std::fmt;

use bitflags::bitflags;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::BuildError;
use crate::expr::Lambda;

/// The kind of a single operation. Codes are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OperationKind {
    Where = 1,
    OrderBy = 2,
    OrderByDescending = 4,
    ThenBy = 8,
    ThenByDescending = 16,
    Top = 32,
    Skip = 64,
    /// Reserved for grouping; only consulted by grouped execution.
    GroupBy = 128,
    /// Reserved for projection; only consulted by projected execution.
    Select = 256,
}

impl OperationKind {
    /// Every kind, in code order.
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Where,
        OperationKind::OrderBy,
        OperationKind::OrderByDescending,
        OperationKind::ThenBy,
        OperationKind::ThenByDescending,
        OperationKind::Top,
        OperationKind::Skip,
        OperationKind::GroupBy,
        OperationKind::Select,
    ];

    /// Returns the stable wire code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Resolves a wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Returns the stable wire name.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Where => "Where",
            OperationKind::OrderBy => "OrderBy",
            OperationKind::OrderByDescending => "OrderByDescending",
            OperationKind::ThenBy => "ThenBy",
            OperationKind::ThenByDescending => "ThenByDescending",
            OperationKind::Top => "Top",
            OperationKind::Skip => "Skip",
            OperationKind::GroupBy => "GroupBy",
            OperationKind::Select => "Select",
        }
    }

    /// Resolves a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Returns the single-bit set for this kind.
    pub fn flag(self) -> OperationKinds {
        OperationKinds::from_bits_retain(self.code())
    }

    /// Returns `true` for kinds that carry a paging count.
    pub fn is_paging(self) -> bool {
        matches!(self, OperationKind::Top | OperationKind::Skip)
    }

    /// Returns `true` for the four ordering kinds.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            OperationKind::OrderBy
                | OperationKind::OrderByDescending
                | OperationKind::ThenBy
                | OperationKind::ThenByDescending
        )
    }

    /// Returns `true` for the reserved grouping/projection markers.
    pub fn is_derived(self) -> bool {
        matches!(self, OperationKind::GroupBy | OperationKind::Select)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for OperationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for OperationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KindVisitor)
    }
}

struct KindVisitor;

impl Visitor<'_> for KindVisitor {
    type Value = OperationKind;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an operation kind code or name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<OperationKind, E> {
        u32::try_from(v)
            .ok()
            .and_then(OperationKind::from_code)
            .ok_or_else(|| E::custom(format!("unknown operation kind code {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<OperationKind, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("unknown operation kind code {v}")))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OperationKind, E> {
        OperationKind::from_name(v).ok_or_else(|| E::unknown_variant(v, KIND_NAMES))
    }
}

const KIND_NAMES: &[&str] = &[
    "Where",
    "OrderBy",
    "OrderByDescending",
    "ThenBy",
    "ThenByDescending",
    "Top",
    "Skip",
    "GroupBy",
    "Select",
];

bitflags! {
    /// A set of operation kinds, used to restrict what an execution
    /// context or a translator accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OperationKinds: u32 {
        const WHERE = 1;
        const ORDER_BY = 2;
        const ORDER_BY_DESCENDING = 4;
        const THEN_BY = 8;
        const THEN_BY_DESCENDING = 16;
        const TOP = 32;
        const SKIP = 64;
        const GROUP_BY = 128;
        const SELECT = 256;
    }
}

impl OperationKinds {
    /// The kinds accepted when nothing else is configured.
    pub const DEFAULT: Self = Self::WHERE
        .union(Self::ORDER_BY)
        .union(Self::ORDER_BY_DESCENDING)
        .union(Self::THEN_BY)
        .union(Self::THEN_BY_DESCENDING)
        .union(Self::TOP)
        .union(Self::SKIP);

    /// Returns `true` if `kind` is in this set.
    pub fn allows(self, kind: OperationKind) -> bool {
        self.contains(kind.flag())
    }
}

impl Default for OperationKinds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An operation carrying an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionOperation {
    kind: OperationKind,
    expression: Option<Lambda>,
}

impl ExpressionOperation {
    /// Creates an expression operation.
    ///
    /// Fails if `kind` is a paging kind or the lambda is not a closed,
    /// single-parameter expression.
    pub fn new(kind: OperationKind, expression: Option<Lambda>) -> Result<Self, BuildError> {
        if kind.is_paging() {
            return Err(BuildError::KindShapeMismatch {
                kind,
                expected: "an expression",
            });
        }
        if let Some(lambda) = &expression {
            lambda.validate()?;
        }
        Ok(ExpressionOperation { kind, expression })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The expression, or `None` for a no-op.
    pub fn expression(&self) -> Option<&Lambda> {
        self.expression.as_ref()
    }
}

/// An operation carrying a paging count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueOperation {
    kind: OperationKind,
    value: Option<i64>,
}

impl ValueOperation {
    /// Creates a paging operation.
    ///
    /// `None` means unbounded. Negative counts are rejected here rather
    /// than at execution.
    pub fn new(kind: OperationKind, value: Option<i64>) -> Result<Self, BuildError> {
        if !kind.is_paging() {
            return Err(BuildError::KindShapeMismatch {
                kind,
                expected: "a paging value",
            });
        }
        if let Some(v) = value.filter(|v| *v < 0) {
            return Err(BuildError::NegativePagingValue { kind, value: v });
        }
        Ok(ValueOperation { kind, value })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }
}

/// A single filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Expression(ExpressionOperation),
    Value(ValueOperation),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Expression(op) => op.kind(),
            Operation::Value(op) => op.kind(),
        }
    }

    /// The expression payload, if this is an expression operation.
    pub fn expression(&self) -> Option<&Lambda> {
        match self {
            Operation::Expression(op) => op.expression(),
            Operation::Value(_) => None,
        }
    }

    /// The paging payload, if this is a value operation.
    pub fn value(&self) -> Option<i64> {
        match self {
            Operation::Value(op) => op.value(),
            Operation::Expression(_) => None,
        }
    }
}

impl From<ExpressionOperation> for Operation {
    fn from(op: ExpressionOperation) -> Self {
        Operation::Expression(op)
    }
}

impl From<ValueOperation> for Operation {
    fn from(op: ValueOperation) -> Self {
        Operation::Value(op)
    }
}
