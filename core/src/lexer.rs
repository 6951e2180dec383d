use std::collections::VecDeque;
use std::fmt;

use crate::error::{Result, TallyError};
use crate::operators::OperatorType;

/// Raw character cursor over the input text. `reset` rewinds the cursor and
/// is what makes speculative lexing (whitespace-mode changes, saved states)
/// possible.
#[derive(Debug)]
pub struct Scanner {
    chars: Vec<char>,
    offset: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn reset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn eof(&self) -> bool {
        self.offset >= self.chars.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.offset).copied();
        if c.is_some() {
            self.offset += 1;
        }
        c
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Operator,
    Identifier,
    Number,
    Comma,
    Dot,
    ParensOpen,
    ParensClose,
    StringDelimiter,
    EscapeCharacter,
    Semicolon,
    Text,
    True,
    False,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    pub fn has_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [ {:?} ({}) ]", self.text, self.kind, self.offset)
    }
}

pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone)]
struct LexerState {
    scanner_offset: usize,
    tokens: VecDeque<Token>,
}

/// Lazily classifies the character stream into tokens, one lookahead token
/// at a time. Horizontal whitespace skipping can be toggled off (string
/// literal bodies need raw whitespace); doing so rewinds the scanner to the
/// start of the buffered token and rescans.
#[derive(Debug)]
pub struct Lexer {
    scanner: Scanner,
    tokens: VecDeque<Token>,
    skip_whitespace: bool,
    saved: Vec<LexerState>,
}

impl Lexer {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            tokens: VecDeque::new(),
            skip_whitespace: true,
            saved: Vec::new(),
        }
    }

    pub fn from_source(input: &str) -> Self {
        Lexer::new(Scanner::new(input))
    }

    pub fn eof(&mut self) -> bool {
        self.maybe_parse_tokens();
        self.tokens.is_empty()
    }

    pub fn offset(&mut self) -> usize {
        self.maybe_parse_tokens();
        match self.tokens.front() {
            Some(tok) => tok.offset,
            None => self.scanner.offset(),
        }
    }

    pub fn peek(&mut self) -> Option<&Token> {
        self.maybe_parse_tokens();
        self.tokens.front()
    }

    pub fn peek_kind(&mut self, kind: TokenKind) -> bool {
        self.maybe_parse_tokens();
        self.tokens.front().is_some_and(|t| t.has_kind(kind))
    }

    pub fn next(&mut self) -> Option<Token> {
        self.maybe_parse_tokens();
        let tok = self.tokens.pop_front();
        if let Some(ref tok) = tok {
            tracing::trace!(token = %tok, "lexer next");
        }
        tok
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let offset = self.offset();
        match self.peek() {
            Some(tok) if tok.has_kind(kind) => Ok(self.tokens.pop_front().expect("peeked")),
            Some(tok) => Err(TallyError::parse(
                format!("Found {} but expected token kind {:?}", tok, kind),
                offset,
            )),
            None => Err(TallyError::parse(
                format!("Unexpected end of input while looking for {:?}", kind),
                offset,
            )),
        }
    }

    pub fn is_skip_whitespace(&self) -> bool {
        self.skip_whitespace
    }

    /// Changing the mode invalidates the lookahead buffer: the scanner is
    /// rewound to the buffered token's start offset and the buffer cleared
    /// so the next request rescans under the new mode.
    pub fn set_skip_whitespace(&mut self, skip: bool) {
        if self.skip_whitespace == skip {
            return;
        }
        if let Some(tok) = self.tokens.front() {
            tracing::debug!(
                skip_whitespace = skip,
                reset_to = tok.offset,
                "rescanning buffered token"
            );
            self.scanner.reset(tok.offset);
            self.tokens.clear();
        }
        self.skip_whitespace = skip;
    }

    /// Snapshot the lexer position for speculative parsing.
    pub fn save_state(&mut self) {
        self.saved.push(LexerState {
            scanner_offset: self.scanner.offset(),
            tokens: self.tokens.clone(),
        });
    }

    /// Restore the most recently saved snapshot (speculation failed).
    pub fn recall_state(&mut self) {
        let state = self.saved.pop().expect("recall_state without save_state");
        self.scanner.reset(state.scanner_offset);
        self.tokens = state.tokens;
    }

    /// Discard the most recently saved snapshot (speculation succeeded).
    pub fn drop_state(&mut self) {
        self.saved.pop().expect("drop_state without save_state");
    }

    fn is_whitespace(c: char) -> bool {
        c == ' ' || c == '\t'
    }

    fn is_eol(c: char) -> bool {
        c == '\r' || c == '\n'
    }

    fn maybe_parse_tokens(&mut self) {
        if !self.tokens.is_empty() || self.scanner.eof() {
            return;
        }

        // EOL is always skipped, horizontal whitespace only in skip mode.
        while let Some(c) = self.scanner.peek() {
            if !(Self::is_eol(c) || (self.skip_whitespace && Self::is_whitespace(c))) {
                break;
            }
            self.scanner.next();
        }

        let parse_start = self.scanner.offset();
        let mut buffer = String::new();

        while let Some(c) = self.scanner.peek() {
            if Self::is_eol(c) {
                break;
            }
            if self.skip_whitespace && Self::is_whitespace(c) {
                break;
            }
            self.scanner.next();

            if OperatorType::may_be_operator(&c.to_string()) {
                // Greedy longest-match operator scan: keep extending while
                // the text is still a prefix of some operator symbol.
                let op_start = self.scanner.offset() - 1;
                let mut candidate = String::new();
                candidate.push(c);
                while let Some(next) = self.scanner.peek() {
                    let mut extended = candidate.clone();
                    extended.push(next);
                    if !OperatorType::may_be_operator(&extended) {
                        break;
                    }
                    candidate.push(next);
                    self.scanner.next();
                }
                if OperatorType::exact_match(&candidate).is_some() {
                    self.flush_buffer(&mut buffer, parse_start);
                    self.push_token(Token::new(TokenKind::Operator, candidate, op_start));
                    return;
                }
                buffer.push_str(&candidate);
                continue;
            }

            let punctuation = match c {
                '\\' => Some(TokenKind::EscapeCharacter),
                '.' => Some(TokenKind::Dot),
                '(' => Some(TokenKind::ParensOpen),
                ')' => Some(TokenKind::ParensClose),
                ',' => Some(TokenKind::Comma),
                ';' => Some(TokenKind::Semicolon),
                '\'' | '"' => Some(TokenKind::StringDelimiter),
                _ => None,
            };
            if let Some(kind) = punctuation {
                let offset = self.scanner.offset() - 1;
                self.flush_buffer(&mut buffer, parse_start);
                self.push_token(Token::new(kind, c, offset));
                return;
            }
            buffer.push(c);
        }
        self.flush_buffer(&mut buffer, parse_start);
    }

    fn flush_buffer(&mut self, buffer: &mut String, offset: usize) {
        if buffer.is_empty() {
            return;
        }
        let text = std::mem::take(buffer);
        let kind = if text.eq_ignore_ascii_case("true") {
            TokenKind::True
        } else if text.eq_ignore_ascii_case("false") {
            TokenKind::False
        } else if text.chars().all(|c| c.is_ascii_digit()) {
            TokenKind::Number
        } else if is_valid_identifier(&text) {
            TokenKind::Identifier
        } else {
            TokenKind::Text
        };
        self.push_token(Token::new(kind, text, offset));
    }

    fn push_token(&mut self, token: Token) {
        tracing::trace!(token = %token, "lexer produced");
        self.tokens.push_back(token);
    }
}
