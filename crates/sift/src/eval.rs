//! Expression evaluation against a single element.

use std::borrow::Cow;

use crate::error::ExecutionError;
use crate::expr::{Expr, Lambda};
use crate::op::{BinaryOp, Method};
use crate::ordering::compare_values;
use crate::record::Record;
use crate::value::{Datum, Number, Value};

/// Evaluates `lambda` with its parameter bound to `record`.
pub(crate) fn eval<'a>(lambda: &'a Lambda, record: &'a dyn Record) -> Result<Value<'a>, ExecutionError> {
    Scope {
        param: lambda.param(),
        record,
    }
    .eval(lambda.body())
}

/// Evaluates a predicate. `null` counts as `false`; any other non-boolean
/// result is a type mismatch.
pub(crate) fn predicate(lambda: &Lambda, record: &dyn Record) -> Result<bool, ExecutionError> {
    match eval(lambda, record)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(ExecutionError::TypeMismatch {
            context: format!("predicate `{lambda}`"),
            expected: "bool",
            actual: other.type_name(),
        }),
    }
}

/// Evaluates a selector into an owned value.
pub(crate) fn datum(lambda: &Lambda, record: &dyn Record) -> Result<Datum, ExecutionError> {
    eval(lambda, record)?.to_datum()
}

struct Scope<'a> {
    param: &'a str,
    record: &'a dyn Record,
}

impl<'a> Scope<'a> {
    fn eval(&self, expr: &'a Expr) -> Result<Value<'a>, ExecutionError> {
        match expr {
            Expr::Param(name) if name == self.param => Ok(self.record.value()),
            Expr::Param(name) => Err(ExecutionError::Binding {
                member: name.clone(),
                target: "lambda".to_string(),
            }),
            Expr::Member(target, name) => self.member(target, name),
            Expr::Literal(datum) => Ok(datum.as_value()),
            Expr::Binary(op, left, right) => self.binary(*op, left, right),
            Expr::Not(operand) => match self.eval(operand)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(mismatch("'!' operand", "bool", &other)),
            },
            Expr::Call {
                target,
                method,
                args,
            } => {
                let method = Method::from_name(method)
                    .filter(|m| m.arity() == args.len())
                    .ok_or_else(|| ExecutionError::UnknownMethod(method.clone()))?;
                let target = self.eval(target)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call(method, target, &args)
            }
            Expr::Matches { target, pattern } => match self.eval(target)? {
                Value::Str(s) => Ok(Value::Bool(pattern.is_match(&s))),
                Value::Null => Ok(Value::Null),
                other => Err(mismatch("matches() target", "string", &other)),
            },
            Expr::New(fields) => {
                let columns = fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.eval(value)?.to_datum()?)))
                    .collect::<Result<Vec<_>, ExecutionError>>()?;
                Ok(Value::Row(Cow::Owned(columns)))
            }
            Expr::Native(native) => Ok(native.call(self.record).into_value()),
        }
    }

    fn member(&self, target: &'a Expr, name: &str) -> Result<Value<'a>, ExecutionError> {
        // Members of the parameter go straight to the record, which lets
        // key/value entries expose `key` even when the value is a scalar.
        if matches!(target, Expr::Param(p) if p == self.param) {
            return self
                .record
                .field_value(name)
                .ok_or_else(|| binding(name, self.record.type_label()));
        }

        match self.eval(target)? {
            Value::Record(record) => record
                .field_value(name)
                .ok_or_else(|| binding(name, record.type_label())),
            Value::Row(Cow::Borrowed(columns)) => columns
                .iter()
                .find(|(column, _)| column == name)
                .map(|(_, d)| d.as_value())
                .ok_or_else(|| binding(name, "row")),
            Value::Row(Cow::Owned(columns)) => columns
                .into_iter()
                .find(|(column, _)| column == name)
                .map(|(_, d)| d.into_value())
                .ok_or_else(|| binding(name, "row")),
            Value::Null => Ok(Value::Null),
            other => Err(binding(name, other.type_name())),
        }
    }

    fn binary(&self, op: BinaryOp, left: &'a Expr, right: &'a Expr) -> Result<Value<'a>, ExecutionError> {
        if op.is_logical() {
            let l = self.condition(op, left)?;
            // Short-circuit.
            match (op, l) {
                (BinaryOp::And, false) => return Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
                _ => {}
            }
            return Ok(Value::Bool(self.condition(op, right)?));
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let result = match op {
            BinaryOp::Eq => l == r,
            BinaryOp::Ne => l != r,
            _ if l.is_null() || r.is_null() => false,
            _ => match compare_values(&l, &r) {
                Some(ordering) => op.eval_ordering(ordering),
                // NaN never orders.
                None if matches!((&l, &r), (Value::Number(_), Value::Number(_))) => false,
                None => {
                    return Err(ExecutionError::TypeMismatch {
                        context: format!("'{op}' comparison"),
                        expected: l.type_name(),
                        actual: r.type_name(),
                    })
                }
            },
        };
        Ok(Value::Bool(result))
    }

    fn condition(&self, op: BinaryOp, expr: &'a Expr) -> Result<bool, ExecutionError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(mismatch(&format!("'{op}' operand"), "bool", &other)),
        }
    }
}

fn call<'a>(method: Method, target: Value<'a>, args: &[Value<'a>]) -> Result<Value<'a>, ExecutionError> {
    if method == Method::IsNull {
        return Ok(Value::Bool(target.is_null()));
    }
    let text = match &target {
        Value::Null => return Ok(Value::Null),
        Value::Str(s) => s.as_ref(),
        other => {
            return Err(mismatch(&format!("{method}() target"), "string", other));
        }
    };

    let arg = match args.first() {
        None => None,
        Some(Value::Null) => return Ok(Value::Null),
        Some(Value::Str(s)) => Some(s.as_ref()),
        Some(other) => return Err(mismatch(&format!("{method}() argument"), "string", other)),
    };

    Ok(match (method, arg) {
        (Method::Contains, Some(needle)) => Value::Bool(text.contains(needle)),
        (Method::StartsWith, Some(prefix)) => Value::Bool(text.starts_with(prefix)),
        (Method::EndsWith, Some(suffix)) => Value::Bool(text.ends_with(suffix)),
        (Method::ToLower, _) => Value::Str(Cow::Owned(text.to_lowercase())),
        (Method::ToUpper, _) => Value::Str(Cow::Owned(text.to_uppercase())),
        (Method::Length, _) => Value::Number(Number::from(text.chars().count())),
        // Arity is checked before dispatch.
        _ => return Err(ExecutionError::UnknownMethod(method.name().to_string())),
    })
}

fn binding(member: &str, target: &str) -> ExecutionError {
    ExecutionError::Binding {
        member: member.to_string(),
        target: target.to_string(),
    }
}

fn mismatch(context: &str, expected: &'static str, actual: &Value<'_>) -> ExecutionError {
    ExecutionError::TypeMismatch {
        context: context.to_string(),
        expected,
        actual: actual.type_name(),
    }
}
