//! Sift - storage-agnostic filter expressions.
//!
//! Sift describes what to fetch from a collection independently of where the
//! collection lives. A [`Filter`] is an ordered list of operations that can be:
//!
//! - built fluently from typed expressions
//! - serialized to a compact JSON wire format and decoded back
//! - executed directly against slices, iterators, maps and async streams
//! - translated into a backend's own query form by a pluggable [`Translator`]
//!
//! # Quick Start
//!
//! ```rust
//! use sift::{field, Filter, Lambda, Record};
//!
//! #[derive(Record)]
//! struct Task {
//!     #[sift(String)]
//!     name: String,
//!     #[sift(Number)]
//!     priority: i64,
//!     #[sift(Bool)]
//!     archived: bool,
//! }
//!
//! let tasks = vec![
//!     Task { name: "Write docs".into(), priority: 3, archived: false },
//!     Task { name: "Fix bug".into(), priority: 5, archived: false },
//!     Task { name: "Old task".into(), priority: 1, archived: true },
//! ];
//!
//! let filter = Filter::builder()
//!     .filter(Lambda::of(field(Task::PRIORITY).ge(3)))
//!     .filter(Lambda::of(field(Task::ARCHIVED).eq(false)))
//!     .order_by_descending(Lambda::of(field(Task::PRIORITY)))
//!     .build()
//!     .unwrap();
//!
//! let results = filter.apply(&tasks).unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0].name, "Fix bug");
//! ```
//!
//! # Execution Order
//!
//! Declaration order is preserved on the wire, but execution always follows
//! one fixed pipeline:
//!
//! ```text
//! Where* → OrderBy / ThenBy → Skip → Top → Select | GroupBy
//! ```
//!
//! - **Where**: every predicate must hold; a `null` result counts as false
//! - **Ordering**: stable; `ThenBy*` breaks ties of the preceding `OrderBy*`
//! - **Paging**: skips are summed, the smallest top wins, skip runs first
//! - **Select / GroupBy**: recorded defaults for derived queries
//!
//! # Operation Kinds
//!
//! | Kind | Code | Payload |
//! |------|------|---------|
//! | `Where` | 1 | lambda |
//! | `OrderBy` | 2 | lambda |
//! | `OrderByDescending` | 4 | lambda |
//! | `ThenBy` | 8 | lambda |
//! | `ThenByDescending` | 16 | lambda |
//! | `Top` | 32 | count |
//! | `Skip` | 64 | count |
//! | `GroupBy` | 128 | lambda |
//! | `Select` | 256 | lambda |
//!
//! # Wire Format
//!
//! ```text
//! { "operations": [ { "kind": 1, "value": "x => (x.priority >= 3)" }, { "kind": 32, "value": "10" } ] }
//! ```
//!
//! Decoding is typed: [`WireFilter::decode`] checks every member path against
//! the target's [`Schema`] before anything runs.

mod codec;
mod engine;
mod error;
mod eval;
mod expr;
mod filter;
mod op;
mod operation;
mod options;
mod ordering;
mod queryable;
mod record;
mod stream;
mod translate;
mod value;

// Re-export public API
pub use codec::{WireFilter, WireOperation};
pub use engine::{Executor, Group};
pub use error::{BuildError, CodecError, ExecutionError, Result, SiftError, TranslateError};
pub use expr::{field, lit, native, param, row, Expr, Lambda, NativeFn, Pattern};
pub use filter::{Filter, FilterBuilder};
pub use op::{BinaryOp, Method};
pub use operation::{ExpressionOperation, Operation, OperationKind, OperationKinds, ValueOperation};
pub use options::{DecodeOptions, ExecutorOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VALUE_LEN};
pub use ordering::{compare_values, Dir};
pub use queryable::Queryable;
pub use record::{Described, Entry, FieldDef, FieldKind, Record, Schema, KEY_MEMBER};
pub use translate::{IdentityTranslator, PreparedQuery, Translator, TranslatorRegistry, TranslatorRegistryBuilder};
pub use value::{Datum, Number, Value};

// Re-export derive macro
pub use sift_macros::Record;
