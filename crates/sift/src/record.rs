//! Element access for filter evaluation.
//!
//! [`Record`] is the runtime view the engine evaluates expressions against;
//! [`Described`] adds the static [`Schema`] the decoder checks member paths
//! against. Both are normally generated by `#[derive(Record)]`.

use std::borrow::Cow;

use crate::value::{Number, Value};

/// Trait for types that can be filtered, ordered and projected.
///
/// This trait is typically derived using `#[derive(Record)]`, but can also
/// be implemented manually.
///
/// # Derive Usage
///
/// ```
/// use sift::{field, Filter, Lambda, Record};
///
/// #[derive(Record)]
/// struct Task {
///     #[sift(String)]
///     name: String,
///     #[sift(Number)]
///     priority: u8,
///     #[sift(Bool)]
///     done: bool,
/// }
///
/// let tasks = vec![
///     Task { name: "Write docs".into(), priority: 3, done: false },
///     Task { name: "Fix bug".into(), priority: 5, done: true },
/// ];
///
/// let filter = Filter::builder()
///     .filter(Lambda::of(field(Task::PRIORITY).ge(3).and(field(Task::DONE).eq(false))))
///     .build()
///     .unwrap();
///
/// let results = filter.apply(&tasks).unwrap();
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].name, "Write docs");
/// ```
pub trait Record {
    /// Returns the element itself as a value.
    ///
    /// Structs return `Value::Record(self)` so members can be accessed;
    /// primitives return their scalar value.
    fn value(&self) -> Value<'_>;

    /// Returns the value of a member, or `None` if the member does not exist.
    ///
    /// A member that exists but holds no value returns `Some(Value::Null)`.
    fn field_value(&self, name: &str) -> Option<Value<'_>>;

    /// Name used in binding errors.
    fn type_label(&self) -> &'static str {
        "record"
    }
}

/// Static type metadata for a [`Record`].
pub trait Described: Record {
    /// Returns the schema of this type.
    fn schema() -> &'static Schema;
}

/// Member list of a record type.
#[derive(Debug)]
pub struct Schema {
    /// Type name, used in error messages.
    pub name: &'static str,
    /// The members that expressions may reference.
    pub fields: &'static [FieldDef],
}

impl Schema {
    /// Creates a schema for a type without members.
    pub const fn scalar(name: &'static str) -> Self {
        Schema { name, fields: &[] }
    }

    /// Looks up a member by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single member of a [`Schema`].
#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// The value type a member holds.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    /// A nested record; the function returns its schema.
    Record(fn() -> &'static Schema),
    /// Not statically known.
    Any,
}

// ============================================================================
// Primitive implementations
// ============================================================================

macro_rules! number_record {
    ($($ty:ty),*) => {
        $(
            impl Record for $ty {
                fn value(&self) -> Value<'_> {
                    Value::Number(Number::from(*self))
                }

                fn field_value(&self, _name: &str) -> Option<Value<'_>> {
                    None
                }

                fn type_label(&self) -> &'static str {
                    stringify!($ty)
                }
            }

            impl Described for $ty {
                fn schema() -> &'static Schema {
                    static SCHEMA: Schema = Schema::scalar(stringify!($ty));
                    &SCHEMA
                }
            }
        )*
    };
}

number_record!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Record for bool {
    fn value(&self) -> Value<'_> {
        Value::Bool(*self)
    }

    fn field_value(&self, _name: &str) -> Option<Value<'_>> {
        None
    }

    fn type_label(&self) -> &'static str {
        "bool"
    }
}

impl Described for bool {
    fn schema() -> &'static Schema {
        static SCHEMA: Schema = Schema::scalar("bool");
        &SCHEMA
    }
}

impl Record for String {
    fn value(&self) -> Value<'_> {
        Value::Str(Cow::Borrowed(self))
    }

    fn field_value(&self, _name: &str) -> Option<Value<'_>> {
        None
    }

    fn type_label(&self) -> &'static str {
        "String"
    }
}

impl Described for String {
    fn schema() -> &'static Schema {
        static SCHEMA: Schema = Schema::scalar("String");
        &SCHEMA
    }
}

impl Record for str {
    fn value(&self) -> Value<'_> {
        Value::Str(Cow::Borrowed(self))
    }

    fn field_value(&self, _name: &str) -> Option<Value<'_>> {
        None
    }

    fn type_label(&self) -> &'static str {
        "str"
    }
}

impl<T: Record> Record for Option<T> {
    fn value(&self) -> Value<'_> {
        match self {
            Some(inner) => inner.value(),
            None => Value::Null,
        }
    }

    fn field_value(&self, name: &str) -> Option<Value<'_>> {
        match self {
            Some(inner) => inner.field_value(name),
            None => Some(Value::Null),
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Some(inner) => inner.type_label(),
            None => "None",
        }
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn value(&self) -> Value<'_> {
        (**self).value()
    }

    fn field_value(&self, name: &str) -> Option<Value<'_>> {
        (**self).field_value(name)
    }

    fn type_label(&self) -> &'static str {
        (**self).type_label()
    }
}

impl<T: Record + ?Sized> Record for Box<T> {
    fn value(&self) -> Value<'_> {
        (**self).value()
    }

    fn field_value(&self, name: &str) -> Option<Value<'_>> {
        (**self).field_value(name)
    }

    fn type_label(&self) -> &'static str {
        (**self).type_label()
    }
}

impl<T: Described> Described for Box<T> {
    fn schema() -> &'static Schema {
        T::schema()
    }
}

impl<T: Described> Described for Option<T> {
    fn schema() -> &'static Schema {
        T::schema()
    }
}

// ============================================================================
// Key/value entries
// ============================================================================

/// Reserved root member that targets the key half of a key/value pair.
pub const KEY_MEMBER: &str = "key";

/// View of a key/value pair.
///
/// Expressions see the value half, except the reserved member `key`, which
/// resolves to the key.
pub struct Entry<'a, K, V> {
    pub key: &'a K,
    pub value: &'a V,
}

impl<K: Record, V: Record> Record for Entry<'_, K, V> {
    fn value(&self) -> Value<'_> {
        match self.value.value() {
            // Keep member lookups on the entry so `key` stays reachable.
            Value::Record(_) => Value::Record(self),
            scalar => scalar,
        }
    }

    fn field_value(&self, name: &str) -> Option<Value<'_>> {
        if name == KEY_MEMBER {
            Some(self.key.value())
        } else {
            self.value.field_value(name)
        }
    }

    fn type_label(&self) -> &'static str {
        self.value.type_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestItem {
        name: String,
        count: i32,
    }

    impl Record for TestItem {
        fn value(&self) -> Value<'_> {
            Value::Record(self)
        }

        fn field_value(&self, name: &str) -> Option<Value<'_>> {
            match name {
                "name" => Some(Value::Str(Cow::Borrowed(&self.name))),
                "count" => Some(Value::Number(Number::from(self.count))),
                _ => None,
            }
        }
    }

    #[test]
    fn record_manual_impl() {
        let item = TestItem {
            name: "test".to_string(),
            count: 42,
        };

        assert_eq!(
            item.field_value("name"),
            Some(Value::Str(Cow::Borrowed("test")))
        );
        assert_eq!(
            item.field_value("count"),
            Some(Value::Number(Number::I64(42)))
        );
        assert_eq!(item.field_value("unknown"), None);
    }

    #[test]
    fn primitives_are_their_own_value() {
        assert_eq!(7u8.value(), Value::Number(Number::U64(7)));
        assert_eq!(true.value(), Value::Bool(true));
        assert_eq!("s".value(), Value::Str(Cow::Borrowed("s")));
        assert_eq!(None::<i64>.value(), Value::Null);
        assert_eq!(3i64.field_value("anything"), None);
        assert_eq!(<i64 as Described>::schema().name, "i64");
    }

    #[test]
    fn entry_exposes_key_member() {
        let key = "k1".to_string();
        let value = 10i64;
        let entry = Entry {
            key: &key,
            value: &value,
        };

        assert_eq!(entry.value(), Value::Number(Number::I64(10)));
        assert_eq!(
            entry.field_value(KEY_MEMBER),
            Some(Value::Str(Cow::Borrowed("k1")))
        );
    }

    #[test]
    fn entry_delegates_members_to_value() {
        let key = 1u32;
        let value = TestItem {
            name: "v".to_string(),
            count: 2,
        };
        let entry = Entry {
            key: &key,
            value: &value,
        };

        assert!(matches!(entry.value(), Value::Record(_)));
        assert_eq!(
            entry.field_value("count"),
            Some(Value::Number(Number::I64(2)))
        );
        assert_eq!(entry.field_value("key"), Some(Value::Number(Number::U64(1))));
    }
}
