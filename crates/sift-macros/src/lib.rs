//! Proc macros for sift.
//!
//! # Derive Macros
//!
//! - [`Record`] - Generate `Record` and `Described` impls plus member name
//!   constants from struct field annotations
//!
//! For working examples, see `sift/tests/derive.rs`.

mod record;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `sift::Record` and `sift::Described` for a struct.
///
/// Only annotated fields are visible to filter expressions.
///
/// # Field Attributes
///
/// | Attribute | Field type | Member kind |
/// |-----------|------------|-------------|
/// | `#[sift(String)]` | `String`, `&str` | string |
/// | `#[sift(Number)]` | any integer or float | number |
/// | `#[sift(Bool)]` | `bool` | bool |
/// | `#[sift(Record)]` | a type that derives `Record` | nested record |
///
/// Modifiers, combined with a kind:
///
/// - `nullable` - the field is an `Option<_>` of the kind; `None` reads as null
/// - `rename = "..."` - member name used in expressions (default: field name)
///
/// `#[sift(skip)]` hides an annotated field again.
///
/// # Generated Code
///
/// ```ignore
/// impl Task {
///     pub const NAME: &'static str = "name";
///     pub const PRIORITY: &'static str = "priority";
/// }
///
/// impl sift::Record for Task { /* member lookup by name */ }
/// impl sift::Described for Task { /* static Schema */ }
/// ```
///
/// # Example
///
/// ```ignore
/// use sift::{field, Filter, Lambda, Record};
///
/// #[derive(Record)]
/// struct Task {
///     #[sift(String)]
///     name: String,
///     #[sift(Number)]
///     priority: u8,
///     #[sift(String, nullable, rename = "owner")]
///     assignee: Option<String>,
///     internal_id: u64, // not visible to expressions
/// }
///
/// let filter = Filter::builder()
///     .filter(Lambda::of(field(Task::PRIORITY).ge(3)))
///     .order_by(Lambda::of(field(Task::OWNER)))
///     .build()?;
/// ```
#[proc_macro_derive(Record, attributes(sift))]
pub fn record_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::record_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
