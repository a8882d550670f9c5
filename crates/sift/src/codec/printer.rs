use super::lexer::is_ident;
use crate::error::CodecError;
use crate::expr::{Expr, Lambda};
use crate::op::{BinaryOp, Method};
use crate::options::{DecodeOptions, MAX_TREE_HEIGHT};
use crate::value::{Datum, Number};

/// Writes a lambda in canonical wire form, rejecting anything the parser
/// could not read back under [`DecodeOptions::DEFAULT`].
pub(crate) fn encode_lambda(lambda: &Lambda) -> Result<String, CodecError> {
    let limits = DecodeOptions::DEFAULT;
    let body = lambda.body();
    if body.height() > MAX_TREE_HEIGHT {
        return Err(CodecError::EncodingUnsupported(format!(
            "expression is taller than {MAX_TREE_HEIGHT} nodes"
        )));
    }
    if body.depth() > limits.max_depth {
        return Err(CodecError::EncodingUnsupported(format!(
            "expression nests deeper than {}",
            limits.max_depth
        )));
    }

    let mut printer = Printer {
        strict: true,
        out: String::new(),
    };
    printer.lambda(lambda)?;
    if printer.out.len() > limits.max_value_len {
        return Err(CodecError::EncodingUnsupported(format!(
            "encoded expression is {} bytes, limit is {}",
            printer.out.len(),
            limits.max_value_len
        )));
    }
    Ok(printer.out)
}

/// Writes a lambda for humans. Never fails; unencodable nodes are shown in
/// angle brackets.
pub(crate) fn display_lambda(lambda: &Lambda) -> String {
    let mut printer = Printer {
        strict: false,
        out: String::new(),
    };
    // Lenient mode has no error paths.
    let _ = printer.lambda(lambda);
    printer.out
}

struct Printer {
    strict: bool,
    out: String,
}

impl Printer {
    fn unsupported(&self, what: String) -> Result<(), CodecError> {
        if self.strict {
            Err(CodecError::EncodingUnsupported(what))
        } else {
            Ok(())
        }
    }

    fn ident(&mut self, name: &str) -> Result<(), CodecError> {
        if !is_ident(name) {
            self.unsupported(format!("'{name}' is not a valid identifier"))?;
        }
        self.out.push_str(name);
        Ok(())
    }

    fn lambda(&mut self, lambda: &Lambda) -> Result<(), CodecError> {
        match lambda.params() {
            [] => {
                self.unsupported("lambda without parameters".to_string())?;
                self.out.push_str("()");
            }
            [single] => self.ident(single)?,
            many => {
                self.out.push('(');
                for (i, name) in many.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.ident(name)?;
                }
                self.out.push(')');
            }
        }
        self.out.push_str(" => ");
        self.expr(lambda.body())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CodecError> {
        match expr {
            Expr::Param(name) => self.ident(name),
            Expr::Member(target, name) => {
                self.postfix_target(target)?;
                self.out.push('.');
                self.ident(name)
            }
            Expr::Literal(datum) => self.datum(datum),
            Expr::Binary(op, left, right) => {
                self.out.push('(');
                self.operands(*op, left, right)?;
                self.out.push(')');
                Ok(())
            }
            Expr::Not(operand) => {
                self.out.push('!');
                self.expr(operand)
            }
            Expr::Call {
                target,
                method,
                args,
            } => {
                match Method::from_name(method) {
                    None => self.unsupported(format!("method '{method}' is not allow-listed"))?,
                    Some(m) if m.arity() != args.len() => self.unsupported(format!(
                        "method '{method}' takes {} argument(s), got {}",
                        m.arity(),
                        args.len()
                    ))?,
                    Some(_) => {}
                }
                self.postfix_target(target)?;
                self.out.push_str(&format!(".{method}("));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(arg)?;
                }
                self.out.push(')');
                Ok(())
            }
            Expr::Matches { target, pattern } => {
                self.postfix_target(target)?;
                self.out.push_str(".matches(");
                self.string(pattern.as_str());
                self.out.push(')');
                Ok(())
            }
            Expr::New(fields) => {
                self.out.push_str("new {");
                for (i, (name, value)) in fields.iter().enumerate() {
                    self.out.push_str(if i > 0 { ", " } else { " " });
                    self.ident(name)?;
                    self.out.push_str(": ");
                    self.expr(value)?;
                }
                self.out.push_str(" }");
                Ok(())
            }
            Expr::Native(native) => {
                self.unsupported(format!(
                    "native function '{}' has no wire form",
                    native.name
                ))?;
                self.out.push_str(&format!("<native {}>", native.name));
                Ok(())
            }
        }
    }

    /// Writes `left op right`. A left operand continuing the same logical
    /// run loses its parentheses, so `a || b || c` reads back as one level.
    fn operands(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<(), CodecError> {
        match left {
            Expr::Binary(inner, l, r) if *inner == op && op.is_logical() => {
                self.operands(op, l, r)?
            }
            _ => self.expr(left)?,
        }
        self.out.push_str(&format!(" {op} "));
        self.expr(right)
    }

    /// A negation would otherwise swallow the postfix chain.
    fn postfix_target(&mut self, target: &Expr) -> Result<(), CodecError> {
        if matches!(target, Expr::Not(_)) {
            self.out.push('(');
            self.expr(target)?;
            self.out.push(')');
            Ok(())
        } else {
            self.expr(target)
        }
    }

    fn datum(&mut self, datum: &Datum) -> Result<(), CodecError> {
        match datum {
            Datum::Null => self.out.push_str("null"),
            Datum::Bool(b) => {
                self.out.push_str(if *b { "true" } else { "false" });
            }
            Datum::Number(n) => self.number(*n)?,
            Datum::String(s) => self.string(s),
            Datum::Row(columns) => {
                self.out.push_str("new {");
                for (i, (name, value)) in columns.iter().enumerate() {
                    self.out.push_str(if i > 0 { ", " } else { " " });
                    self.ident(name)?;
                    self.out.push_str(": ");
                    self.datum(value)?;
                }
                self.out.push_str(" }");
            }
        }
        Ok(())
    }

    fn number(&mut self, n: Number) -> Result<(), CodecError> {
        if n.is_non_finite() {
            self.unsupported(format!("non-finite number {n}"))?;
        }
        self.out.push_str(&n.to_string());
        Ok(())
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if c.is_control() => {
                    self.out.push_str(&format!("\\u{{{:x}}}", c as u32));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{field, lit, native, param, row};

    fn encode(body: Expr) -> Result<String, CodecError> {
        encode_lambda(&Lambda::of(body))
    }

    #[test]
    fn every_binary_is_parenthesized() {
        let body = field("a").eq(1).or(field("b").ne("z").and(field("c").lt(2.5)));
        assert_eq!(
            encode(body).unwrap(),
            r#"x => ((x.a == 1) || ((x.b != "z") && (x.c < 2.5)))"#
        );
    }

    #[test]
    fn logical_runs_print_flat() {
        let run = param().eq(1).or(param().eq(2)).or(param().eq(3));
        assert_eq!(encode(run).unwrap(), "x => ((x == 1) || (x == 2) || (x == 3))");

        let right = param().eq(1).or(param().eq(2).or(param().eq(3)));
        assert_eq!(encode(right).unwrap(), "x => ((x == 1) || ((x == 2) || (x == 3)))");
    }

    #[test]
    fn encoding_refuses_what_decoding_would() {
        let deep = (0..40).fold(param(), |acc, _| acc.not());
        assert!(matches!(encode(deep), Err(CodecError::EncodingUnsupported(_))));

        let long = lit("a".repeat(DecodeOptions::DEFAULT.max_value_len));
        assert!(matches!(encode(long), Err(CodecError::EncodingUnsupported(_))));
    }

    #[test]
    fn methods_and_negation() {
        assert_eq!(
            encode(field("name").to_lower().contains("ab").not()).unwrap(),
            r#"x => !x.name.toLower().contains("ab")"#
        );
        assert_eq!(
            encode(field("a").not().member("b")).unwrap(),
            "x => (!x.a).b"
        );
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(
            encode(lit("q\"\\\n\u{1}")).unwrap(),
            r#"x => "q\"\\\n\u{1}""#
        );
    }

    #[test]
    fn floats_keep_their_marker() {
        assert_eq!(encode(lit(2.0)).unwrap(), "x => 2.0");
        assert_eq!(encode(lit(-7i64)).unwrap(), "x => -7");
    }

    #[test]
    fn rows_and_patterns() {
        let body = row([("n", field("name")), ("p", lit(Datum::Null))]);
        assert_eq!(encode(body).unwrap(), "x => new { n: x.name, p: null }");
        assert_eq!(
            encode(field("name").matches("^a.*").unwrap()).unwrap(),
            r#"x => x.name.matches("^a.*")"#
        );
    }

    #[test]
    fn unsupported_shapes_fail_in_strict_mode() {
        let cases = [
            native("f", |_| Datum::Null),
            param().call("exec", vec![]),
            field("a").call("contains", vec![]),
            lit(f64::NAN),
            param().member("not an ident"),
        ];
        for body in cases {
            assert!(matches!(
                encode(body),
                Err(CodecError::EncodingUnsupported(_))
            ));
        }
    }

    #[test]
    fn display_never_fails() {
        let lambda = Lambda::of(native("score", |_| Datum::Null).gt(1));
        assert_eq!(display_lambda(&lambda), "x => (<native score> > 1)");
    }
}
