//! Operators and methods available inside expressions.
//!
//! [`BinaryOp`] covers comparison and logical operators. [`Method`] is the
//! closed allow-list of method calls the codec can encode and the engine can
//! execute.

use std::cmp::Ordering;
use std::fmt;

/// Binary operator of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Equal (`==`).
    Eq,
    /// Not equal (`!=`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Logical conjunction (`&&`), short-circuit.
    And,
    /// Logical disjunction (`||`), short-circuit.
    Or,
}

impl BinaryOp {
    /// Returns `true` for the comparison operators.
    pub fn is_comparison(self) -> bool {
        !self.is_logical()
    }

    /// Returns `true` for `&&` and `||`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Evaluates a comparison given an ordering result.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::Ne => ordering != Ordering::Equal,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::And | BinaryOp::Or => false,
        }
    }

    /// Returns the grammar symbol of this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Allow-listed method calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `s.contains(sub)` for strings.
    Contains,
    /// `s.startsWith(prefix)`.
    StartsWith,
    /// `s.endsWith(suffix)`.
    EndsWith,
    /// `s.toLower()`.
    ToLower,
    /// `s.toUpper()`.
    ToUpper,
    /// `s.length()`, character count.
    Length,
    /// `v.isNull()`.
    IsNull,
}

impl Method {
    /// Resolves a method by its grammar name.
    pub fn from_name(name: &str) -> Option<Method> {
        Some(match name {
            "contains" => Method::Contains,
            "startsWith" => Method::StartsWith,
            "endsWith" => Method::EndsWith,
            "toLower" => Method::ToLower,
            "toUpper" => Method::ToUpper,
            "length" => Method::Length,
            "isNull" => Method::IsNull,
            _ => return None,
        })
    }

    /// Returns the grammar name of this method.
    pub fn name(self) -> &'static str {
        match self {
            Method::Contains => "contains",
            Method::StartsWith => "startsWith",
            Method::EndsWith => "endsWith",
            Method::ToLower => "toLower",
            Method::ToUpper => "toUpper",
            Method::Length => "length",
            Method::IsNull => "isNull",
        }
    }

    /// Number of arguments the method takes.
    pub fn arity(self) -> usize {
        match self {
            Method::Contains | Method::StartsWith | Method::EndsWith => 1,
            Method::ToLower | Method::ToUpper | Method::Length | Method::IsNull => 0,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_eval_ordering() {
        assert!(BinaryOp::Eq.eval_ordering(Ordering::Equal));
        assert!(!BinaryOp::Eq.eval_ordering(Ordering::Less));

        assert!(!BinaryOp::Ne.eval_ordering(Ordering::Equal));
        assert!(BinaryOp::Ne.eval_ordering(Ordering::Greater));

        assert!(BinaryOp::Gt.eval_ordering(Ordering::Greater));
        assert!(!BinaryOp::Gt.eval_ordering(Ordering::Equal));

        assert!(BinaryOp::Ge.eval_ordering(Ordering::Equal));
        assert!(!BinaryOp::Ge.eval_ordering(Ordering::Less));

        assert!(BinaryOp::Lt.eval_ordering(Ordering::Less));
        assert!(!BinaryOp::Lt.eval_ordering(Ordering::Equal));

        assert!(BinaryOp::Le.eval_ordering(Ordering::Equal));
        assert!(!BinaryOp::Le.eval_ordering(Ordering::Greater));

        // Logical operators never answer an ordering question
        assert!(!BinaryOp::And.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn op_classes() {
        assert!(BinaryOp::Lt.is_comparison());
        assert!(BinaryOp::Or.is_logical());
        assert!(!BinaryOp::Or.is_comparison());
    }

    #[test]
    fn method_names_round_trip() {
        for method in [
            Method::Contains,
            Method::StartsWith,
            Method::EndsWith,
            Method::ToLower,
            Method::ToUpper,
            Method::Length,
            Method::IsNull,
        ] {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert_eq!(Method::from_name("exec"), None);
    }

    #[test]
    fn op_display() {
        assert_eq!(BinaryOp::Ge.to_string(), ">=");
        assert_eq!(Method::StartsWith.to_string(), "startsWith");
    }
}
