//! Runtime value types for expression evaluation.
//!
//! [`Value`] is what evaluation works with: it borrows from the element being
//! examined wherever it can. [`Datum`] is the owned counterpart used for
//! literals inside expressions, projected rows and group keys.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ExecutionError;
use crate::record::Record;

/// Runtime value, borrowed from the source element where possible.
///
/// # Example
///
/// ```
/// use std::borrow::Cow;
/// use sift::{Number, Record, Value};
///
/// struct Task {
///     name: String,
///     priority: u8,
/// }
///
/// impl Record for Task {
///     fn value(&self) -> Value<'_> {
///         Value::Record(self)
///     }
///
///     fn field_value(&self, name: &str) -> Option<Value<'_>> {
///         match name {
///             "name" => Some(Value::Str(Cow::Borrowed(&self.name))),
///             "priority" => Some(Value::Number(Number::from(self.priority))),
///             _ => None,
///         }
///     }
/// }
/// ```
#[derive(Clone)]
pub enum Value<'a> {
    /// Absent or null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(Number),
    /// String value, borrowed from the element or produced by a method call.
    Str(Cow<'a, str>),
    /// A row of named values, produced by projections.
    Row(Cow<'a, [(String, Datum)]>),
    /// A nested record whose members can be accessed further.
    Record(&'a dyn Record),
}

impl<'a> Value<'a> {
    /// Returns `true` if this is a `Null` value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extracts the string value, if present.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the number value, if present.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the boolean value, if present.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Row(_) => "row",
            Value::Record(_) => "record",
        }
    }

    /// Converts to an owned [`Datum`].
    ///
    /// Nested records have no owned form and fail with
    /// [`ExecutionError::NotProjectable`].
    pub fn to_datum(&self) -> Result<Datum, ExecutionError> {
        Ok(match self {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => Datum::Number(*n),
            Value::Str(s) => Datum::String(s.to_string()),
            Value::Row(r) => Datum::Row(r.to_vec()),
            Value::Record(_) => return Err(ExecutionError::NotProjectable("record")),
        })
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Row(r) => f.debug_tuple("Row").field(r).finish(),
            Value::Record(_) => write!(f, "Record(..)"),
        }
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.compare(*b) == Some(Ordering::Equal),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Row(a), Value::Row(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => std::ptr::addr_eq(*a, *b),
            _ => false,
        }
    }
}

/// Numeric value supporting all common numeric types.
///
/// Numbers are stored in one of three variants to preserve precision:
/// - `I64` for signed integers
/// - `U64` for unsigned integers
/// - `F64` for floating point
///
/// Comparisons between different numeric types are handled by converting
/// to the appropriate common type.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts the number to f64 for comparison.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed types.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),

            // Integers of different signedness compare exactly.
            (Number::I64(a), Number::U64(b)) => Some(compare_signed_unsigned(a, b)),
            (Number::U64(a), Number::I64(b)) => Some(compare_signed_unsigned(b, a).reverse()),

            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    /// Total order over numbers, for sorting.
    ///
    /// Agrees with [`compare`](Number::compare) wherever that is defined,
    /// compares floats against integers exactly, and ranks NaN after every
    /// other number.
    pub fn total_cmp(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::F64(a), Number::F64(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
            (Number::F64(f), int) => compare_float_int(f, int.to_i128()),
            (int, Number::F64(f)) => compare_float_int(f, int.to_i128()).reverse(),
            (a, b) => a.to_i128().cmp(&b.to_i128()),
        }
    }

    fn to_i128(self) -> i128 {
        match self {
            Number::I64(n) => i128::from(n),
            Number::U64(n) => i128::from(n),
            Number::F64(n) => n as i128,
        }
    }

    /// Returns `true` for NaN and infinite floats.
    pub fn is_non_finite(self) -> bool {
        matches!(self, Number::F64(n) if !n.is_finite())
    }
}

// Exact float/integer comparison. Rounding the integer to f64 decides every
// case except a tie, where the float is integral and fits in i128.
fn compare_float_int(f: f64, i: i128) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    match f.partial_cmp(&(i as f64)) {
        Some(Ordering::Equal) | None => (f as i128).cmp(&i),
        Some(other) => other,
    }
}

fn compare_signed_unsigned(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

/// Integers are equal when their values are, whatever their width; floats
/// only equal floats, so equality survives an encode/decode round trip.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::F64(a), Number::F64(b)) => a == b,
            (Number::F64(_), _) | (_, Number::F64(_)) => false,
            (a, b) => a.to_i128() == b.to_i128(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{n}"),
            Number::U64(n) => write!(f, "{n}"),
            // `{:?}` keeps the decimal point ("1.0") so the value re-parses as a float.
            Number::F64(n) => write!(f, "{n:?}"),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Number::I64(n) => serializer.serialize_i64(*n),
            Number::U64(n) => serializer.serialize_u64(*n),
            Number::F64(n) => serializer.serialize_f64(*n),
        }
    }
}

macro_rules! number_from {
    ($variant:ident as $target:ty: $($source:ty),*) => {
        $(
            impl From<$source> for Number {
                fn from(n: $source) -> Self {
                    Number::$variant(n as $target)
                }
            }
        )*
    };
}

number_from!(I64 as i64: i8, i16, i32, i64, isize);
number_from!(U64 as u64: u8, u16, u32, u64, usize);
number_from!(F64 as f64: f32, f64);

/// Owned value: expression literals, projected rows and group keys.
///
/// Rows serialize as JSON objects with their columns in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Row(Vec<(String, Datum)>),
}

impl Datum {
    /// Borrows this datum as a runtime [`Value`].
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Number(n) => Value::Number(*n),
            Datum::String(s) => Value::Str(Cow::Borrowed(s)),
            Datum::Row(r) => Value::Row(Cow::Borrowed(r)),
        }
    }

    /// Converts this datum into an owned runtime [`Value`].
    pub fn into_value(self) -> Value<'static> {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(b),
            Datum::Number(n) => Value::Number(n),
            Datum::String(s) => Value::Str(Cow::Owned(s)),
            Datum::Row(r) => Value::Row(Cow::Owned(r)),
        }
    }

    /// Looks up a column of a row by name.
    pub fn get(&self, column: &str) -> Option<&Datum> {
        match self {
            Datum::Row(columns) => columns
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Extracts the string value, if present.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the number value, if present.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Datum::Null => serializer.serialize_unit(),
            Datum::Bool(b) => serializer.serialize_bool(*b),
            Datum::Number(n) => n.serialize(serializer),
            Datum::String(s) => serializer.serialize_str(s),
            Datum::Row(columns) => {
                let mut map = serializer.serialize_map(Some(columns.len()))?;
                for (name, value) in columns {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<Number> for Datum {
    fn from(n: Number) -> Self {
        Datum::Number(n)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(v: Option<T>) -> Self {
        v.map_or(Datum::Null, Into::into)
    }
}

macro_rules! datum_from_number {
    ($($source:ty),*) => {
        $(
            impl From<$source> for Datum {
                fn from(n: $source) -> Self {
                    Datum::Number(Number::from(n))
                }
            }
        )*
    };
}

datum_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
