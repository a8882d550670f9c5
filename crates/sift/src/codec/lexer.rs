use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::CodecError;
use crate::value::Number;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(Number),
    Str(String),
    True,
    False,
    Null,
    New,

    Arrow,    // =>
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    Le,       // <=
    Gt,       // >
    Ge,       // >=
    AndAnd,   // &&
    OrOr,     // ||
    Bang,     // !
    Dot,      // .
    Comma,    // ,
    Colon,    // :
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }

    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::True => "'true'".to_string(),
            TokenKind::False => "'false'".to_string(),
            TokenKind::Null => "'null'".to_string(),
            TokenKind::New => "'new'".to_string(),
            TokenKind::Arrow => "'=>'".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Le => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Ge => "'>='".to_string(),
            TokenKind::AndAnd => "'&&'".to_string(),
            TokenKind::OrOr => "'||'".to_string(),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Words that cannot be used as identifiers.
pub(crate) const KEYWORDS: &[&str] = &["true", "false", "null", "new"];

pub(crate) fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&name)
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, CodecError> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Token, CodecError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, ch)) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset: self.input.len(),
            });
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' if self.eat('>') => TokenKind::Arrow,
            '=' if self.eat('=') => TokenKind::EqEq,
            '!' if self.eat('=') => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '<' if self.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            '"' => TokenKind::Str(self.string(offset)?),
            '-' if self.peek_is(|c| c.is_ascii_digit()) => self.number(offset)?,
            c if c.is_ascii_digit() => self.number(offset)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.word(offset),
            other => {
                return Err(CodecError::malformed(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        };

        Ok(Token { kind, offset })
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn peek_is(&mut self, pred: impl Fn(char) -> bool) -> bool {
        self.chars.peek().is_some_and(|(_, c)| pred(*c))
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn eat_digits(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
    }

    fn word(&mut self, start: usize) -> TokenKind {
        while self
            .chars
            .next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
            .is_some()
        {}
        match &self.input[start..self.position()] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "new" => TokenKind::New,
            name => TokenKind::Ident(name.to_string()),
        }
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, CodecError> {
        self.eat_digits();
        let mut float = false;

        // A '.' belongs to the number only when a digit follows; otherwise it
        // is member access on the literal.
        let mut lookahead = self.chars.clone();
        if matches!(lookahead.next(), Some((_, '.')))
            && lookahead.peek().is_some_and(|(_, c)| c.is_ascii_digit())
        {
            self.chars.next();
            self.eat_digits();
            float = true;
        }

        if self.peek_is(|c| c == 'e' || c == 'E') {
            self.chars.next();
            if !self.eat('+') {
                self.eat('-');
            }
            if !self.peek_is(|c| c.is_ascii_digit()) {
                let at = self.position();
                return Err(CodecError::malformed(at, "expected digits in exponent"));
            }
            self.eat_digits();
            float = true;
        }

        let text = &self.input[start..self.position()];
        let number = if float {
            text.parse::<f64>().ok().map(Number::F64)
        } else {
            text.parse::<i64>()
                .map(Number::I64)
                .or_else(|_| text.parse::<u64>().map(Number::U64))
                .ok()
        };

        number
            .map(TokenKind::Number)
            .ok_or_else(|| CodecError::malformed(start, format!("number '{text}' is out of range")))
    }

    fn string(&mut self, start: usize) -> Result<String, CodecError> {
        let mut out = String::new();
        loop {
            let Some((at, ch)) = self.chars.next() else {
                return Err(CodecError::malformed(start, "unterminated string literal"));
            };
            match ch {
                '"' => return Ok(out),
                '\\' => out.push(self.escape(at)?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, at: usize) -> Result<char, CodecError> {
        match self.chars.next() {
            Some((_, '"')) => Ok('"'),
            Some((_, '\\')) => Ok('\\'),
            Some((_, 'n')) => Ok('\n'),
            Some((_, 'r')) => Ok('\r'),
            Some((_, 't')) => Ok('\t'),
            Some((_, 'u')) => self.unicode_escape(at),
            Some((_, other)) => Err(CodecError::malformed(
                at,
                format!("unknown escape sequence '\\{other}'"),
            )),
            None => Err(CodecError::malformed(at, "unterminated escape sequence")),
        }
    }

    fn unicode_escape(&mut self, at: usize) -> Result<char, CodecError> {
        if !self.eat('{') {
            return Err(CodecError::malformed(at, "expected '{' after '\\u'"));
        }
        let mut hex = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_hexdigit()) {
            hex.push(c);
        }
        if !self.eat('}') || hex.is_empty() || hex.len() > 6 {
            return Err(CodecError::malformed(at, "malformed unicode escape"));
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| CodecError::malformed(at, format!("invalid code point U+{hex}")))
    }
}
