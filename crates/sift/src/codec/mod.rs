//! Wire format for filters.
//!
//! A [`Filter`] serializes to a [`WireFilter`]: an ordered list of
//! `{ kind, value }` pairs where `kind` is the operation code and `value` is
//! either a paging count or a lambda in the expression grammar:
//!
//! ```text
//! lambda   := params "=>" expr
//! params   := IDENT | "(" IDENT ("," IDENT)* ")"
//! expr     := or
//! or       := and ("||" and)*
//! and      := cmp ("&&" cmp)*
//! cmp      := unary (("=="|"!="|"<"|"<="|">"|">=") unary)?
//! unary    := "!" unary | postfix
//! postfix  := primary ("." IDENT ("(" args? ")")?)*
//! primary  := IDENT | literal | "(" expr ")" | "new" "{" IDENT ":" expr ("," ...)* "}"
//! literal  := NUMBER | STRING | "true" | "false" | "null"
//! ```
//!
//! Decoding takes the target element type so member paths are checked once,
//! at the boundary, instead of on every element.
//!
//! ```
//! use sift::{field, Filter, Lambda, WireFilter};
//!
//! let filter = Filter::builder()
//!     .filter(Lambda::of(field("a").gt(1)))
//!     .skip(10)
//!     .build()
//!     .unwrap();
//!
//! let json = filter.serialize().unwrap().to_json().unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"operations":[{"kind":1,"value":"x => (x.a > 1)"},{"kind":64,"value":"10"}]}"#
//! );
//!
//! let decoded = WireFilter::from_json(&json).unwrap().decode_untyped().unwrap();
//! assert_eq!(decoded, filter);
//! ```

mod lexer;
mod parser;
mod printer;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub(crate) use parser::{parse_lambda, parse_lambda_with};
pub(crate) use printer::{display_lambda, encode_lambda};

use crate::error::CodecError;
use crate::expr::{Expr, Lambda};
use crate::filter::Filter;
use crate::operation::{ExpressionOperation, Operation, OperationKind, ValueOperation};
use crate::options::DecodeOptions;
use crate::record::{Described, FieldKind, Schema, KEY_MEMBER};

/// One serialized operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOperation {
    pub kind: OperationKind,
    #[serde(default)]
    pub value: Option<String>,
}

/// A serialized filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFilter {
    pub operations: Vec<WireOperation>,
}

impl WireFilter {
    /// Parses the JSON form.
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the JSON form.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes against `T`, rejecting member paths `T` does not have.
    pub fn decode<T: Described>(&self) -> Result<Filter, CodecError> {
        self.decode_with::<T>(&DecodeOptions::default())
    }

    pub fn decode_with<T: Described>(&self, options: &DecodeOptions) -> Result<Filter, CodecError> {
        self.decode_inner(Some(T::schema()), false, options)
    }

    /// Decodes for key/value sources whose values are `V`. The reserved
    /// root member `key` is accepted in addition to the members of `V`.
    pub fn decode_entries<V: Described>(&self) -> Result<Filter, CodecError> {
        self.decode_inner(Some(V::schema()), true, &DecodeOptions::default())
    }

    /// Decodes without a target type. Member paths are resolved when the
    /// filter runs.
    pub fn decode_untyped(&self) -> Result<Filter, CodecError> {
        self.decode_untyped_with(&DecodeOptions::default())
    }

    pub fn decode_untyped_with(&self, options: &DecodeOptions) -> Result<Filter, CodecError> {
        self.decode_inner(None, false, options)
    }

    fn decode_inner(
        &self,
        schema: Option<&'static Schema>,
        allow_key: bool,
        options: &DecodeOptions,
    ) -> Result<Filter, CodecError> {
        let mut operations = Vec::with_capacity(self.operations.len());
        for (index, wire) in self.operations.iter().enumerate() {
            let operation = decode_operation(wire, options).map_err(|e| at_operation(index, e))?;
            if let (Some(schema), Some(lambda)) = (schema, operation.expression()) {
                bind_lambda(lambda, schema, allow_key)?;
            }
            operations.push(operation);
        }
        trace!(count = operations.len(), typed = schema.is_some(), "decoded filter");
        Ok(Filter::from_operations(operations))
    }
}

fn at_operation(index: usize, err: CodecError) -> CodecError {
    match err {
        CodecError::DecodingMalformed { position, message } => CodecError::DecodingMalformed {
            position,
            message: format!("operations[{index}]: {message}"),
        },
        other => other,
    }
}

fn decode_operation(wire: &WireOperation, options: &DecodeOptions) -> Result<Operation, CodecError> {
    let kind = wire.kind;
    if kind.is_paging() {
        let value = match wire.value.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<i64>().map_err(|_| {
                CodecError::malformed(0, format!("{kind} value '{text}' is not an integer"))
            })?),
        };
        return Ok(ValueOperation::new(kind, value)?.into());
    }

    let expression = match wire.value.as_deref() {
        None => None,
        Some(text) => Some(parse_lambda_with(text, options)?),
    };
    Ok(ExpressionOperation::new(kind, expression)?.into())
}

pub(crate) fn encode_operation(operation: &Operation) -> Result<WireOperation, CodecError> {
    let value = match operation {
        Operation::Expression(op) => op.expression().map(Lambda::encode).transpose()?,
        Operation::Value(op) => op.value().map(|v| v.to_string()),
    };
    Ok(WireOperation {
        kind: operation.kind(),
        value,
    })
}

/// Checks every member path rooted at the parameter against `schema`.
fn bind_lambda(lambda: &Lambda, schema: &'static Schema, allow_key: bool) -> Result<(), CodecError> {
    bind_expr(lambda.body(), lambda.param(), schema, allow_key)
}

fn bind_expr(
    expr: &Expr,
    param: &str,
    schema: &'static Schema,
    allow_key: bool,
) -> Result<(), CodecError> {
    match expr {
        Expr::Member(..) => {
            if let Some(path) = member_path(expr, param) {
                return bind_path(&path, schema, allow_key);
            }
            // Member of a computed value; check whatever it is built from.
            let mut inner = expr;
            while let Expr::Member(target, _) = inner {
                inner = target;
            }
            bind_expr(inner, param, schema, allow_key)
        }
        Expr::Param(_) | Expr::Literal(_) | Expr::Native(_) => Ok(()),
        Expr::Binary(_, left, right) => {
            bind_expr(left, param, schema, allow_key)?;
            bind_expr(right, param, schema, allow_key)
        }
        Expr::Not(operand) => bind_expr(operand, param, schema, allow_key),
        Expr::Matches { target, .. } => bind_expr(target, param, schema, allow_key),
        Expr::Call { target, args, .. } => {
            bind_expr(target, param, schema, allow_key)?;
            args.iter()
                .try_for_each(|arg| bind_expr(arg, param, schema, allow_key))
        }
        Expr::New(fields) => fields
            .iter()
            .try_for_each(|(_, value)| bind_expr(value, param, schema, allow_key)),
    }
}

/// Returns `["a", "b"]` for `x.a.b`, or `None` when the chain is not rooted
/// at the parameter.
fn member_path<'e>(expr: &'e Expr, param: &str) -> Option<Vec<&'e str>> {
    match expr {
        Expr::Param(name) if name == param => Some(Vec::new()),
        Expr::Member(target, name) => {
            let mut path = member_path(target, param)?;
            path.push(name);
            Some(path)
        }
        _ => None,
    }
}

fn bind_path(path: &[&str], root: &'static Schema, allow_key: bool) -> Result<(), CodecError> {
    if allow_key && path.first() == Some(&KEY_MEMBER) {
        return Ok(());
    }

    let mut schema = root;
    for (i, name) in path.iter().enumerate() {
        let mismatch = || CodecError::DecodingTypeMismatch {
            member: path[..=i].join("."),
            type_name: schema.name.to_string(),
        };
        let field = schema.field(name).ok_or_else(mismatch)?;
        match field.kind {
            FieldKind::Record(nested) => schema = nested(),
            FieldKind::Any => return Ok(()),
            FieldKind::String | FieldKind::Number | FieldKind::Bool => {
                if i + 1 < path.len() {
                    return Err(CodecError::DecodingTypeMismatch {
                        member: path[..=i + 1].join("."),
                        type_name: format!("{:?}", field.kind),
                    });
                }
            }
        }
    }
    Ok(())
}
