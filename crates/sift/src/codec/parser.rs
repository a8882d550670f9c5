use super::lexer::{tokenize, Token, TokenKind};
use crate::error::CodecError;
use crate::expr::{Expr, Lambda, Pattern};
use crate::op::{BinaryOp, Method};
use crate::options::{DecodeOptions, MAX_TREE_HEIGHT};
use crate::value::Datum;

const MATCHES: &str = "matches";

/// A parsed subtree and its height.
type Node = (Expr, usize);

/// Parses a lambda in the wire grammar.
///
/// The result is syntactically valid and single-parameter; member paths are
/// not checked against any type.
pub(crate) fn parse_lambda_with(text: &str, options: &DecodeOptions) -> Result<Lambda, CodecError> {
    if text.len() > options.max_value_len {
        return Err(CodecError::malformed(
            options.max_value_len,
            format!(
                "value is {} bytes, limit is {}",
                text.len(),
                options.max_value_len
            ),
        ));
    }

    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth: options.max_depth,
    };
    let lambda = parser.lambda()?;
    parser.expect(TokenKind::Eof)?;

    if lambda.body().depth() > options.max_depth {
        return Err(CodecError::malformed(
            0,
            format!("expression nests deeper than {}", options.max_depth),
        ));
    }
    lambda.validate()?;
    Ok(lambda)
}

pub(crate) fn parse_lambda(text: &str) -> Result<Lambda, CodecError> {
    parse_lambda_with(text, &DecodeOptions::default())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        // The token list always ends with Eof, and Eof is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CodecError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> CodecError {
        CodecError::malformed(
            self.offset(),
            format!("expected {wanted}, found {}", self.peek().describe()),
        )
    }

    fn ident(&mut self) -> Result<String, CodecError> {
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn enter(&mut self) -> Result<(), CodecError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(CodecError::malformed(
                self.offset(),
                format!("expression nests deeper than {}", self.max_depth),
            ));
        }
        Ok(())
    }

    /// Wraps a freshly built node, rejecting trees taller than
    /// [`MAX_TREE_HEIGHT`] before they grow any further.
    fn node(&self, at: usize, expr: Expr, tallest_child: usize) -> Result<Node, CodecError> {
        let height = tallest_child + 1;
        if height > MAX_TREE_HEIGHT {
            return Err(CodecError::malformed(
                at,
                format!("expression is taller than {MAX_TREE_HEIGHT} nodes"),
            ));
        }
        Ok((expr, height))
    }

    fn lambda(&mut self) -> Result<Lambda, CodecError> {
        let params = if self.eat(&TokenKind::LParen) {
            let mut params = vec![self.ident()?];
            while self.eat(&TokenKind::Comma) {
                params.push(self.ident()?);
            }
            self.expect(TokenKind::RParen)?;
            params
        } else {
            vec![self.ident()?]
        };
        self.expect(TokenKind::Arrow)?;
        let (body, _) = self.expr()?;
        Ok(Lambda::with_params(params, body))
    }

    fn expr(&mut self) -> Result<Node, CodecError> {
        self.enter()?;
        let expr = self.or();
        self.depth -= 1;
        expr
    }

    fn or(&mut self) -> Result<Node, CodecError> {
        let (mut left, mut height) = self.and()?;
        while self.eat(&TokenKind::OrOr) {
            let at = self.offset();
            let (right, right_height) = self.and()?;
            (left, height) = self.node(at, left.or(right), height.max(right_height))?;
        }
        Ok((left, height))
    }

    fn and(&mut self) -> Result<Node, CodecError> {
        let (mut left, mut height) = self.comparison()?;
        while self.eat(&TokenKind::AndAnd) {
            let at = self.offset();
            let (right, right_height) = self.comparison()?;
            (left, height) = self.node(at, left.and(right), height.max(right_height))?;
        }
        Ok((left, height))
    }

    fn comparison(&mut self) -> Result<Node, CodecError> {
        let (left, left_height) = self.unary()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok((left, left_height)),
        };
        let at = self.offset();
        self.advance();
        let (right, right_height) = self.unary()?;
        self.node(
            at,
            Expr::Binary(op, Box::new(left), Box::new(right)),
            left_height.max(right_height),
        )
    }

    fn unary(&mut self) -> Result<Node, CodecError> {
        let at = self.offset();
        if self.eat(&TokenKind::Bang) {
            self.enter()?;
            let operand = self.unary();
            self.depth -= 1;
            let (operand, height) = operand?;
            return self.node(at, operand.not(), height);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, CodecError> {
        let (mut expr, mut height) = self.primary()?;
        while self.eat(&TokenKind::Dot) {
            let at = self.offset();
            let name = self.ident()?;
            if !self.eat(&TokenKind::LParen) {
                (expr, height) = self.node(at, expr.member(name), height)?;
                continue;
            }

            let mut args = Vec::new();
            let mut tallest = height;
            if !self.eat(&TokenKind::RParen) {
                loop {
                    let (arg, arg_height) = self.expr()?;
                    tallest = tallest.max(arg_height);
                    args.push(arg);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            (expr, height) = self.node(at, call(expr, name, args, at)?, tallest)?;
        }
        Ok((expr, height))
    }

    fn primary(&mut self) -> Result<Node, CodecError> {
        let at = self.offset();
        let leaf = match self.advance() {
            TokenKind::Ident(name) => Expr::Param(name),
            TokenKind::Number(n) => Expr::Literal(Datum::Number(n)),
            TokenKind::Str(s) => Expr::Literal(Datum::String(s)),
            TokenKind::True => Expr::Literal(Datum::Bool(true)),
            TokenKind::False => Expr::Literal(Datum::Bool(false)),
            TokenKind::Null => Expr::Literal(Datum::Null),
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::New => return self.new_row(at),
            other => {
                return Err(CodecError::malformed(
                    at,
                    format!("expected an expression, found {}", other.describe()),
                ))
            }
        };
        Ok((leaf, 1))
    }

    fn new_row(&mut self, at: usize) -> Result<Node, CodecError> {
        self.expect(TokenKind::LBrace)?;
        let mut fields: Vec<(String, Expr)> = Vec::new();
        let mut tallest = 0;
        if !self.eat(&TokenKind::RBrace) {
            loop {
                let column_at = self.offset();
                let name = self.ident()?;
                if fields.iter().any(|(existing, _)| *existing == name) {
                    return Err(CodecError::malformed(
                        column_at,
                        format!("duplicate column '{name}'"),
                    ));
                }
                self.expect(TokenKind::Colon)?;
                let (value, height) = self.expr()?;
                tallest = tallest.max(height);
                fields.push((name, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        }
        self.node(at, Expr::New(fields), tallest)
    }
}

fn call(target: Expr, name: String, mut args: Vec<Expr>, at: usize) -> Result<Expr, CodecError> {
    if name == MATCHES {
        return match (args.pop(), args.is_empty()) {
            (Some(Expr::Literal(Datum::String(pattern))), true) => Ok(Expr::Matches {
                target: Box::new(target),
                pattern: Pattern::new(&pattern)?,
            }),
            _ => Err(CodecError::malformed(
                at,
                "matches takes a single string literal",
            )),
        };
    }

    let Some(method) = Method::from_name(&name) else {
        return Err(CodecError::malformed(at, format!("unknown method '{name}'")));
    };
    if method.arity() != args.len() {
        return Err(CodecError::malformed(
            at,
            format!(
                "method '{name}' takes {} argument(s), got {}",
                method.arity(),
                args.len()
            ),
        ));
    }
    Ok(target.call(name, args))
}
