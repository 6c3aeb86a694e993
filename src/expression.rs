use crate::{
    ast::MAX_DEPTH,
    chunk::SourceLoc,
    context::{Context, Thunk},
    error::{InterpreterError, ParseError, ParseErrorKind},
    value::Value,
};

type ParseResult<T> = Result<T, ParseError>;

/// A parsed object or filter-argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A top-level name looked up in the context.
    Variable(String),
    /// `target.name`
    Property {
        target: Box<Expression>,
        name: String,
    },
    /// `target[index]`
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    /// `receiver | name: args...`
    Filter {
        receiver: Box<Expression>,
        name: String,
        args: Vec<Expression>,
        /// Start of the enclosing object; locates errors in lazy arguments.
        loc: SourceLoc,
    },
}

impl Expression {
    /// Evaluates against `ctx`. Undefined variables and missing properties
    /// are nil; only filter application can fail.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, InterpreterError> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => Ok(ctx.get(name).cloned().unwrap_or_default()),
            Expression::Property { target, name } => {
                let target = target.evaluate(ctx)?;
                Ok(target.property_value(&Value::String(name.clone())))
            }
            Expression::Index { target, index } => {
                let target = target.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                Ok(target.index_value(&index))
            }
            Expression::Filter {
                receiver,
                name,
                args,
                loc,
            } => {
                let params: Vec<&dyn Thunk> = args.iter().map(|arg| arg as &dyn Thunk).collect();
                ctx.apply_filter(name, receiver.as_ref(), &params)
                    .map_err(|err| err.located(*loc))
            }
        }
    }
}

impl Thunk for Expression {
    fn evaluate(&self, ctx: &Context) -> Result<Value, InterpreterError> {
        Expression::evaluate(self, ctx)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Where errors are reported; the start of the enclosing chunk.
    loc: SourceLoc,
    /// Accessors and filters applied so far; bounds the tree depth.
    depth: usize,
}

#[allow(
    clippy::string_slice,
    clippy::arithmetic_side_effects,
    reason = "offsets come from searches over the same input"
)]
impl<'a> Parser<'a> {
    fn new(input: &'a str, loc: SourceLoc) -> Self {
        Parser {
            input,
            pos: 0,
            loc,
            depth: 0,
        }
    }

    /// Counts one more level of nesting.
    fn nest(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.make_error(ParseErrorKind::TooDeep { limit: MAX_DEPTH }));
        }
        Ok(())
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.loc, kind)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Peek if the remaining input starts with `s`
    fn peek(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Consume `s` if the remaining input starts with it.
    fn consume(&mut self, s: &str) -> bool {
        if self.peek(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn consume_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn expect(&mut self, s: &str) -> ParseResult<()> {
        if self.consume(s) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{s}'")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.eof() {
            self.make_error(ParseErrorKind::unexpected_eof(Some(expected)))
        } else {
            self.make_error(ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("'{}'", self.rest()),
            })
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<&'a str> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => return Err(self.unexpected("identifier")),
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '?'))
            .unwrap_or(rest.len());
        self.pos += len;
        Ok(&rest[..len])
    }

    /// `primary ('|' filter)*`
    fn parse_filtered(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            self.consume_whitespace();
            if !self.consume("|") {
                return Ok(expr);
            }
            self.nest()?;
            self.consume_whitespace();
            let name = self.parse_identifier()?.to_string();
            self.consume_whitespace();
            let mut args = Vec::new();
            if self.consume(":") {
                loop {
                    self.consume_whitespace();
                    args.push(self.parse_primary()?);
                    self.consume_whitespace();
                    if !self.consume(",") {
                        break;
                    }
                }
            }
            expr = Expression::Filter {
                receiver: Box::new(expr),
                name,
                args,
                loc: self.loc,
            };
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.peek_char() {
            Some(quote @ ('\'' | '"')) => self.parse_string(quote),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            _ => {
                let name = self.parse_identifier()?;
                let base = match name {
                    "nil" | "null" => return Ok(Expression::Literal(Value::Nil)),
                    "true" => return Ok(Expression::Literal(Value::Bool(true))),
                    "false" => return Ok(Expression::Literal(Value::Bool(false))),
                    _ => Expression::Variable(name.to_string()),
                };
                self.parse_accessors(base)
            }
        }
    }

    /// `('.' identifier | '[' expr ']')*`
    fn parse_accessors(&mut self, mut expr: Expression) -> ParseResult<Expression> {
        loop {
            if self.consume(".") {
                self.nest()?;
                let name = self.parse_identifier()?.to_string();
                expr = Expression::Property {
                    target: Box::new(expr),
                    name,
                };
            } else if self.consume("[") {
                self.nest()?;
                self.consume_whitespace();
                let index = self.parse_filtered()?;
                self.consume_whitespace();
                self.expect("]")?;
                expr = Expression::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> ParseResult<Expression> {
        self.pos += quote.len_utf8();
        let Some(len) = self.rest().find(quote) else {
            let closing = quote.to_string();
            return Err(self.make_error(ParseErrorKind::unexpected_eof(Some(&closing))));
        };
        let text = self.rest()[..len].to_string();
        self.pos += len + quote.len_utf8();
        Ok(Expression::Literal(Value::String(text)))
    }

    fn parse_number(&mut self) -> ParseResult<Expression> {
        let rest = self.rest();
        let mut len = usize::from(rest.starts_with('-'));
        let digits = |s: &str| s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        len += digits(&rest[len..]);
        let is_float = rest[len..].starts_with('.')
            && rest[len + 1..].starts_with(|c: char| c.is_ascii_digit());
        if is_float {
            len += 1 + digits(&rest[len + 1..]);
        }

        let text = &rest[..len];
        let value = if is_float {
            text.parse().map(Value::Float).ok()
        } else {
            text.parse().map(Value::Int).ok()
        };
        match value {
            Some(value) => {
                self.pos += len;
                Ok(Expression::Literal(value))
            }
            None => Err(self.unexpected("number")),
        }
    }
}

/// Parses expression text, reporting errors at `loc`.
///
/// # Errors
/// Returns a [`ParseError`] if the text is empty, malformed, or has
/// trailing input.
pub fn parse_at(text: &str, loc: SourceLoc) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(text, loc);
    parser.consume_whitespace();
    let expr = parser.parse_filtered()?;
    parser.consume_whitespace();
    if !parser.eof() {
        return Err(parser.make_error(ParseErrorKind::UnexpectedToken {
            expected: "end of expression".to_string(),
            found: format!("'{}'", parser.rest()),
        }));
    }
    Ok(expr)
}

/// Parses expression text that has no source position of its own, such as
/// a lazily evaluated filter argument.
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    parse_at(text, SourceLoc::default())
}
