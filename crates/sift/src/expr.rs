//! Expression trees for predicates and selectors.
//!
//! An [`Expr`] is plain data: member paths, literals, operators and a closed
//! set of method calls, so it can be printed to the wire grammar and parsed
//! back. A [`Lambda`] binds an expression to its single input parameter.
//!
//! # Example
//!
//! ```
//! use sift::{field, Lambda};
//!
//! // x => ((x.priority >= 3) && x.name.startsWith("fix"))
//! let predicate = Lambda::of(
//!     field("priority").ge(3).and(field("name").starts_with("fix")),
//! );
//! assert_eq!(
//!     predicate.to_string(),
//!     r#"x => ((x.priority >= 3) && x.name.startsWith("fix"))"#
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::codec;
use crate::error::{BuildError, CodecError};
use crate::op::{BinaryOp, Method};
use crate::record::Record;
use crate::value::{Datum, Number};

/// Parameter name used by [`field`], [`param`] and [`Lambda::of`].
pub const DEFAULT_PARAM: &str = "x";

/// A node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a lambda parameter.
    Param(String),
    /// Member access on the target.
    Member(Box<Expr>, String),
    /// Literal constant.
    Literal(Datum),
    /// Comparison or logical operator.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// Method call. Only names in [`Method`] can be encoded or executed.
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// Regular expression match against a string target.
    Matches { target: Box<Expr>, pattern: Pattern },
    /// Anonymous row, for projections and composite grouping keys.
    New(Vec<(String, Expr)>),
    /// In-process function. Executable, but never encodable.
    Native(NativeFn),
}

impl Expr {
    /// Accesses a member of this expression.
    pub fn member(self, name: impl Into<String>) -> Expr {
        Expr::Member(Box::new(self), name.into())
    }

    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Expr {
        Expr::Binary(op, Box::new(self), Box::new(right.into()))
    }

    /// `self == right`
    pub fn eq(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    /// `self != right`
    pub fn ne(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ne, right)
    }

    /// `self < right`
    pub fn lt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    /// `self <= right`
    pub fn le(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Le, right)
    }

    /// `self > right`
    pub fn gt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    /// `self >= right`
    pub fn ge(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ge, right)
    }

    /// `self && right`
    pub fn and(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    /// `self || right`
    pub fn or(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    /// `!self`
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Calls a method by name. Names outside [`Method`] are accepted here
    /// and rejected when the expression is encoded or executed.
    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            target: Box::new(self),
            method: method.into(),
            args,
        }
    }

    fn method(self, method: Method, args: Vec<Expr>) -> Expr {
        self.call(method.name(), args)
    }

    /// `self.contains(needle)`
    pub fn contains(self, needle: impl Into<Expr>) -> Expr {
        self.method(Method::Contains, vec![needle.into()])
    }

    /// `self.startsWith(prefix)`
    pub fn starts_with(self, prefix: impl Into<Expr>) -> Expr {
        self.method(Method::StartsWith, vec![prefix.into()])
    }

    /// `self.endsWith(suffix)`
    pub fn ends_with(self, suffix: impl Into<Expr>) -> Expr {
        self.method(Method::EndsWith, vec![suffix.into()])
    }

    /// `self.toLower()`
    pub fn to_lower(self) -> Expr {
        self.method(Method::ToLower, Vec::new())
    }

    /// `self.toUpper()`
    pub fn to_upper(self) -> Expr {
        self.method(Method::ToUpper, Vec::new())
    }

    /// `self.length()`
    pub fn length(self) -> Expr {
        self.method(Method::Length, Vec::new())
    }

    /// `self.isNull()`
    pub fn is_null(self) -> Expr {
        self.method(Method::IsNull, Vec::new())
    }

    /// `self.matches(pattern)`
    ///
    /// Returns an error if the pattern is invalid.
    pub fn matches(self, pattern: &str) -> Result<Expr, BuildError> {
        Ok(Expr::Matches {
            target: Box::new(self),
            pattern: Pattern::new(pattern)?,
        })
    }

    /// Nesting depth of this tree.
    ///
    /// A left-folded run of one logical operator, such as `a || b || c`,
    /// counts as a single level, the way it is written.
    pub fn depth(&self) -> usize {
        1 + match self {
            Expr::Param(_) | Expr::Literal(_) | Expr::Native(_) => 0,
            Expr::Member(target, _) | Expr::Not(target) => target.depth(),
            Expr::Matches { target, .. } => target.depth(),
            Expr::Binary(op, ..) if op.is_logical() => self.chain_depth(*op),
            Expr::Binary(_, left, right) => left.depth().max(right.depth()),
            Expr::Call { target, args, .. } => args
                .iter()
                .map(Expr::depth)
                .fold(target.depth(), usize::max),
            Expr::New(fields) => fields.iter().map(|(_, e)| e.depth()).max().unwrap_or(0),
        }
    }

    /// Deepest operand of the run of `op` rooted here.
    fn chain_depth(&self, op: BinaryOp) -> usize {
        match self {
            Expr::Binary(inner, left, right) if *inner == op => {
                left.chain_depth(op).max(right.depth())
            }
            other => other.depth(),
        }
    }

    /// Height of this tree, counting every node.
    pub fn height(&self) -> usize {
        1 + match self {
            Expr::Param(_) | Expr::Literal(_) | Expr::Native(_) => 0,
            Expr::Member(target, _) | Expr::Not(target) => target.height(),
            Expr::Matches { target, .. } => target.height(),
            Expr::Binary(_, left, right) => left.height().max(right.height()),
            Expr::Call { target, args, .. } => args
                .iter()
                .map(Expr::height)
                .fold(target.height(), usize::max),
            Expr::New(fields) => fields.iter().map(|(_, e)| e.height()).max().unwrap_or(0),
        }
    }

    /// Calls `f` on every parameter name referenced in this tree.
    pub(crate) fn visit_params<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Param(name) => f(name),
            Expr::Literal(_) | Expr::Native(_) => {}
            Expr::Member(target, _) | Expr::Not(target) => target.visit_params(f),
            Expr::Matches { target, .. } => target.visit_params(f),
            Expr::Binary(_, left, right) => {
                left.visit_params(f);
                right.visit_params(f);
            }
            Expr::Call { target, args, .. } => {
                target.visit_params(f);
                args.iter().for_each(|a| a.visit_params(f));
            }
            Expr::New(fields) => fields.iter().for_each(|(_, e)| e.visit_params(f)),
        }
    }
}

/// References the default lambda parameter `x`.
pub fn param() -> Expr {
    Expr::Param(DEFAULT_PARAM.to_string())
}

/// Builds a member path on the default parameter.
///
/// `field("owner.name")` is `x.owner.name`.
pub fn field(path: &str) -> Expr {
    path.split('.').fold(param(), Expr::member)
}

/// Builds a literal.
pub fn lit(value: impl Into<Datum>) -> Expr {
    Expr::Literal(value.into())
}

/// Builds an anonymous row from named expressions.
pub fn row<N: Into<String>>(fields: impl IntoIterator<Item = (N, Expr)>) -> Expr {
    Expr::New(fields.into_iter().map(|(n, e)| (n.into(), e)).collect())
}

/// Wraps a Rust closure as an expression.
///
/// Native expressions run in memory but cannot cross the wire.
pub fn native<F>(name: impl Into<String>, f: F) -> Expr
where
    F: Fn(&dyn Record) -> Datum + Send + Sync + 'static,
{
    Expr::Native(NativeFn {
        name: name.into(),
        func: Arc::new(f),
    })
}

macro_rules! expr_from_literal {
    ($($source:ty),*) => {
        $(
            impl From<$source> for Expr {
                fn from(v: $source) -> Self {
                    Expr::Literal(Datum::from(v))
                }
            }
        )*
    };
}

expr_from_literal!(
    &str, String, bool, Number, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64
);

impl From<Datum> for Expr {
    fn from(d: Datum) -> Self {
        Expr::Literal(d)
    }
}

/// Compiled regular expression. Equality compares the pattern text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern.
    pub fn new(pattern: &str) -> Result<Self, BuildError> {
        Ok(Pattern(Regex::new(pattern)?))
    }

    /// Returns the source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Tests a string against the pattern.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Named in-process function over a record.
#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    func: Arc<dyn Fn(&dyn Record) -> Datum + Send + Sync>,
}

impl NativeFn {
    /// Runs the function.
    pub fn call(&self, record: &dyn Record) -> Datum {
        (self.func)(record)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish()
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// An expression bound to its input parameter(s).
///
/// Operations only accept closed, single-parameter lambdas; see
/// [`Lambda::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    params: Vec<String>,
    body: Expr,
}

impl Lambda {
    /// Creates a lambda with one parameter.
    pub fn new(param: impl Into<String>, body: Expr) -> Self {
        Lambda {
            params: vec![param.into()],
            body,
        }
    }

    /// Creates a lambda over the default parameter `x`.
    pub fn of(body: Expr) -> Self {
        Lambda::new(DEFAULT_PARAM, body)
    }

    /// Creates a lambda with any number of parameters.
    ///
    /// Only single-parameter lambdas pass validation; this exists so decoded
    /// or hand-built multi-parameter shapes can be reported precisely.
    pub fn with_params<P: Into<String>>(params: impl IntoIterator<Item = P>, body: Expr) -> Self {
        Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body,
        }
    }

    /// Parses the wire grammar without checking members against a type.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        codec::parse_lambda(text)
    }

    /// Returns the parameter names.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Returns the single parameter name.
    pub fn param(&self) -> &str {
        self.params.first().map_or(DEFAULT_PARAM, String::as_str)
    }

    /// Returns the body.
    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Checks that this lambda has exactly one parameter and that the body
    /// references no other.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.params.len() != 1 {
            return Err(BuildError::UnsupportedExpressionShape(format!(
                "expected exactly one parameter, found {}",
                self.params.len()
            )));
        }

        let param = self.param();
        let mut stray = None;
        self.body.visit_params(&mut |name| {
            if name != param && stray.is_none() {
                stray = Some(name.to_string());
            }
        });

        match stray {
            Some(name) => Err(BuildError::UnsupportedExpressionShape(format!(
                "reference to unbound parameter '{name}'"
            ))),
            None => Ok(()),
        }
    }

    /// Writes the lambda in the wire grammar.
    pub fn encode(&self) -> Result<String, CodecError> {
        codec::encode_lambda(self)
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::display_lambda(self))
    }
}
