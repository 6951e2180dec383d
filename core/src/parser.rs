use crate::error::{Result, TallyError};
use crate::lexer::{Lexer, TokenKind};
use crate::operators::OperatorType;
use crate::value::Value;

/// Push-based sink for parser events. The shunting-yard AST builder is the
/// shipped implementation; anything that understands the event stream
/// (printers, direct evaluators) can be plugged in instead.
pub trait ParseListener {
    fn push_value(&mut self, value: Value) -> Result<()>;
    fn push_identifier(&mut self, name: String) -> Result<()>;
    fn push_operator(&mut self, op: OperatorType) -> Result<()>;
    fn push_function_invocation(&mut self, name: String) -> Result<()>;
    fn push_opening_parens(&mut self) -> Result<()>;
    fn push_closing_parens(&mut self) -> Result<()>;
    fn push_argument_delimiter(&mut self) -> Result<()>;
    fn push_expression_delimiter(&mut self) -> Result<()>;
}

/// Expression parser over the lexer token stream. Precedence is not
/// resolved here; operators are forwarded to the listener in source order
/// and the shunting yard does the rest.
///
/// Failed alternatives record an error with the current lexer offset; the
/// alternative that made it furthest into the input wins the final report.
pub struct ExpressionParser {
    last_error_offset: isize,
    last_error_msg: Option<String>,
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionParser {
    pub fn new() -> Self {
        Self {
            last_error_offset: -1,
            last_error_msg: None,
        }
    }

    pub fn parse(&mut self, lexer: &mut Lexer, listener: &mut dyn ParseListener) -> Result<()> {
        self.last_error_offset = -1;
        self.last_error_msg = None;

        if !self.evaluate(lexer, listener)? {
            let offset = self.last_error_offset.max(0) as usize;
            let message = self
                .last_error_msg
                .take()
                .unwrap_or_else(|| "Invalid expression".to_string());
            tracing::debug!(offset, message = %message, "parse failed");
            return Err(TallyError::parse(message, offset));
        }
        Ok(())
    }

    fn evaluate(&mut self, lexer: &mut Lexer, listener: &mut dyn ParseListener) -> Result<bool> {
        let mut result = true;
        while !lexer.eof() && result {
            result = self.expression(lexer, listener)?;
        }
        Ok(result)
    }

    fn expression(&mut self, lexer: &mut Lexer, listener: &mut dyn ParseListener) -> Result<bool> {
        if self.consume(lexer, TokenKind::Semicolon)? {
            self.listener_event(lexer, listener.push_expression_delimiter())?;
            return Ok(true);
        }

        // Every operator requires a trailing atom, so a failed atom after a
        // pushed operator fails the whole expression; the recorded furthest
        // offset then points at the missing operand.
        let mut success = false;
        if self.parse_atom(lexer, listener)? {
            success = true;
            while lexer.peek_kind(TokenKind::Operator) {
                self.push_next_operator(lexer, listener)?;
                if !self.parse_atom(lexer, listener)? {
                    return Ok(false);
                }
            }
        } else if lexer.peek_kind(TokenKind::Operator) {
            // Leading operator (unary `not`).
            success = true;
            loop {
                self.push_next_operator(lexer, listener)?;
                if !self.parse_atom(lexer, listener)? {
                    return Ok(false);
                }
                if !lexer.peek_kind(TokenKind::Operator) {
                    break;
                }
            }
        }
        Ok(success)
    }

    fn push_next_operator(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<()> {
        let token = lexer.expect(TokenKind::Operator)?;
        let op = OperatorType::exact_match(&token.text).ok_or_else(|| {
            TallyError::parse(format!("Unknown operator '{}'", token.text), token.offset)
        })?;
        self.listener_event(lexer, listener.push_operator(op))
    }

    fn parse_atom(&mut self, lexer: &mut Lexer, listener: &mut dyn ParseListener) -> Result<bool> {
        if self.parse_function_or_identifier(lexer, listener)? {
            return Ok(true);
        }
        if self.parse_boolean(lexer, listener)?
            || self.parse_number(lexer, listener)?
            || self.parse_string(lexer, listener)?
        {
            return Ok(true);
        }

        if self.consume(lexer, TokenKind::ParensOpen)? {
            self.listener_event(lexer, listener.push_opening_parens())?;
            if self.expression(lexer, listener)? && self.consume(lexer, TokenKind::ParensClose)? {
                self.listener_event(lexer, listener.push_closing_parens())?;
                return Ok(true);
            }
            return Ok(false);
        }
        self.error_later(
            lexer,
            "Expected a number, a string, a boolean, a function invocation or opening parens",
        )
    }

    /// An identifier followed by `(` is a function call (zero or more
    /// comma-separated arguments); otherwise a variable reference.
    fn parse_function_or_identifier(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<bool> {
        if !self.peek(lexer, TokenKind::Identifier)? {
            return Ok(false);
        }
        let name = lexer.expect(TokenKind::Identifier)?.text;

        if self.consume(lexer, TokenKind::ParensOpen)? {
            self.listener_event(lexer, listener.push_function_invocation(name))?;
            self.listener_event(lexer, listener.push_opening_parens())?;

            if self.consume(lexer, TokenKind::ParensClose)? {
                self.listener_event(lexer, listener.push_closing_parens())?;
                return Ok(true);
            }
            if self.parse_argument_list(lexer, listener)?
                && self.consume(lexer, TokenKind::ParensClose)?
            {
                self.listener_event(lexer, listener.push_closing_parens())?;
                return Ok(true);
            }
            return Ok(false);
        }
        self.listener_event(lexer, listener.push_identifier(name))?;
        Ok(true)
    }

    fn parse_argument_list(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<bool> {
        if !self.expression(lexer, listener)? {
            return Ok(false);
        }
        while self.consume(lexer, TokenKind::Comma)? {
            self.listener_event(lexer, listener.push_argument_delimiter())?;
            if !self.expression(lexer, listener)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn parse_boolean(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<bool> {
        if self.consume(lexer, TokenKind::True)? {
            self.listener_event(lexer, listener.push_value(Value::Bool(true)))?;
            return Ok(true);
        }
        if self.consume(lexer, TokenKind::False)? {
            self.listener_event(lexer, listener.push_value(Value::Bool(false)))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Digits, optionally a dot and more digits. A dot without trailing
    /// digits is a malformed floating point literal.
    fn parse_number(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<bool> {
        if !self.peek(lexer, TokenKind::Number)? {
            return Ok(false);
        }
        let integral = lexer.expect(TokenKind::Number)?;

        if self.peek(lexer, TokenKind::Dot)? {
            lexer.expect(TokenKind::Dot)?;
            if !self.peek(lexer, TokenKind::Number)? {
                return self.error(lexer, "Invalid floating point number");
            }
            let fractional = lexer.expect(TokenKind::Number)?;
            let text = format!("{}.{}", integral.text, fractional.text);
            match text.parse::<f64>() {
                Ok(value) => {
                    self.listener_event(lexer, listener.push_value(Value::F64(value)))?;
                    Ok(true)
                }
                Err(_) => self.error(lexer, "Invalid floating point number"),
            }
        } else {
            match integral.text.parse::<i32>() {
                Ok(value) => {
                    self.listener_event(lexer, listener.push_value(Value::I32(value)))?;
                    Ok(true)
                }
                Err(_) => self.error(lexer, "Number out of range"),
            }
        }
    }

    /// String literals re-lex their body with whitespace skipping disabled
    /// so raw whitespace survives. The opening delimiter's exact text
    /// terminates the literal; `\` takes the next character literally.
    /// Whichever way the body parse ends, the previous whitespace mode is
    /// restored.
    fn parse_string(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
    ) -> Result<bool> {
        if !self.peek(lexer, TokenKind::StringDelimiter)? {
            return Ok(false);
        }
        let delimiter = lexer.expect(TokenKind::StringDelimiter)?.text;
        let old_skip = lexer.is_skip_whitespace();
        if old_skip {
            lexer.set_skip_whitespace(false);
        }
        let result = self.parse_string_body(lexer, listener, &delimiter);
        lexer.set_skip_whitespace(old_skip);
        result
    }

    fn parse_string_body(
        &mut self,
        lexer: &mut Lexer,
        listener: &mut dyn ParseListener,
        delimiter: &str,
    ) -> Result<bool> {
        let mut buffer = String::new();
        let mut quoted = false;
        while !lexer.eof() {
            if !quoted && self.consume(lexer, TokenKind::EscapeCharacter)? {
                quoted = true;
                continue;
            }
            let terminates = {
                let tok = lexer.peek().expect("not at eof");
                !quoted && tok.has_kind(TokenKind::StringDelimiter) && tok.text == delimiter
            };
            if terminates {
                break;
            }
            buffer.push_str(&lexer.next().expect("not at eof").text);
            quoted = false;
        }
        if lexer.eof() {
            return self.error(lexer, "Unterminated string");
        }
        lexer.expect(TokenKind::StringDelimiter)?;
        self.listener_event(lexer, listener.push_value(Value::Str(buffer)))?;
        Ok(true)
    }

    fn peek(&mut self, lexer: &mut Lexer, kind: TokenKind) -> Result<bool> {
        if lexer.peek_kind(kind) {
            return Ok(true);
        }
        self.error(lexer, format!("Expected token kind {:?}", kind))
    }

    fn consume(&mut self, lexer: &mut Lexer, kind: TokenKind) -> Result<bool> {
        if lexer.peek_kind(kind) {
            lexer.expect(kind)?;
            return Ok(true);
        }
        self.error(lexer, format!("Expected token kind {:?}", kind))
    }

    /// Record a failure at the current offset, keeping the furthest one
    /// (later messages at the same offset overwrite earlier ones).
    fn error(&mut self, lexer: &mut Lexer, message: impl Into<String>) -> Result<bool> {
        let offset = lexer.offset() as isize;
        if offset >= self.last_error_offset {
            self.last_error_offset = offset;
            self.last_error_msg = Some(message.into());
        }
        Ok(false)
    }

    /// Like `error` but only records strictly-later failures; used for the
    /// generic "expected an atom" message so specific errors at the same
    /// offset win.
    fn error_later(&mut self, lexer: &mut Lexer, message: impl Into<String>) -> Result<bool> {
        let offset = lexer.offset() as isize;
        if offset > self.last_error_offset {
            self.last_error_offset = offset;
            self.last_error_msg = Some(message.into());
        }
        Ok(false)
    }

    /// Listener failures (mismatched parens, misplaced delimiters) carry
    /// no position of their own; attach the current lexer offset.
    fn listener_event(&mut self, lexer: &mut Lexer, result: Result<()>) -> Result<()> {
        result.map_err(|e| match e {
            TallyError::ParseError { message, offset: 0 } => {
                TallyError::parse(message, lexer.offset())
            }
            other => other,
        })
    }
}
