//! Execution and decoding limits.
//!
//! Both option types deserialize with defaults for missing fields, so a host
//! application can embed them in its own configuration file:
//!
//! ```
//! use sift::{DecodeOptions, ExecutorOptions, OperationKinds};
//!
//! let exec: ExecutorOptions = serde_json::from_str(r#"{ "max_depth": 8 }"#).unwrap();
//! assert_eq!(exec.max_depth, 8);
//! assert_eq!(exec.allowed, OperationKinds::DEFAULT);
//!
//! let decode = DecodeOptions::default().with_max_value_len(1024);
//! assert_eq!(decode.max_depth, 32);
//! ```

use serde::Deserialize;

use crate::operation::OperationKinds;

/// Default nesting limit for expressions.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Tallest expression tree the decoder will build, counting every node.
///
/// Unlike the depth limits this is not configurable: it bounds the recursion
/// of every walk over a decoded tree.
pub const MAX_TREE_HEIGHT: usize = 512;

/// Default size limit for a single encoded expression.
pub const DEFAULT_MAX_VALUE_LEN: usize = 64 * 1024;

/// Options for [`Executor`](crate::Executor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Operation kinds this executor accepts. `Select` and `GroupBy` are
    /// always accepted.
    pub allowed: OperationKinds,
    /// Deepest expression tree the evaluator will walk.
    pub max_depth: usize,
}

impl ExecutorOptions {
    pub const DEFAULT: Self = Self {
        allowed: OperationKinds::DEFAULT,
        max_depth: DEFAULT_MAX_DEPTH,
    };

    pub fn with_allowed(mut self, allowed: OperationKinds) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Limits applied while decoding a [`WireFilter`](crate::WireFilter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Deepest expression tree accepted.
    pub max_depth: usize,
    /// Longest encoded expression accepted, in bytes.
    pub max_value_len: usize,
}

impl DecodeOptions {
    pub const DEFAULT: Self = Self {
        max_depth: DEFAULT_MAX_DEPTH,
        max_value_len: DEFAULT_MAX_VALUE_LEN,
    };

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}
