use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use tracing::trace;

use crate::ast::{Fragment, Span, Token, TokenType};
use crate::registry::WordRegistry;
use crate::value::Value;

/// Whether comments reach the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexMode {
    #[default]
    SkipComments,
    RetainComments,
}

/// `${}` inside `${}` deeper than this lexes as an `Unknown` token.
const MAX_INTERPOLATION_DEPTH: usize = 32;

/// Converts source text into tokens.
///
/// Lexing never fails: characters that do not start any token come back as
/// `Unknown` tokens so the parser can report them with a position.
pub struct Lexer<'a> {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    mode: LexMode,
    words: Option<&'a WordRegistry>,
    replacements: Option<&'a HashMap<String, String>>,
    interpolation_depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            mode: LexMode::default(),
            words: None,
            replacements: None,
            interpolation_depth: 0,
        }
    }

    pub fn with_mode(mut self, mode: LexMode) -> Self {
        self.mode = mode;
        self
    }

    /// Identifiers matching a registered word lex as `Word` tokens.
    pub fn with_words(mut self, words: &'a WordRegistry) -> Self {
        self.words = Some(words);
        self
    }

    /// Identifiers spelled like a key are rewritten to the mapped text before
    /// keyword classification.
    pub fn with_replacements(mut self, replacements: &'a HashMap<String, String>) -> Self {
        self.replacements = Some(replacements);
        self
    }

    /// Lex the whole input. The result always ends with an `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is(TokenType::Eof);
            tokens.push(token);
            if done {
                break;
            }
        }
        trace!(count = tokens.len(), "tokenized source");
        tokens
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn span_from(&self, start: usize, line: usize, column: usize) -> Span {
        Span::new(start, self.position, line, column)
    }

    fn text_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> Token {
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = self.text_from(start);
        let span = self.span_from(start, line, column);
        let value = if is_float {
            text.parse::<f64>().ok().map(Value::Float)
        } else {
            text.parse::<i64>().ok().map(Value::Integer)
        };

        match value {
            Some(value) => Token::literal(TokenType::LiteralNumber, text, value, span),
            None => Token::new(TokenType::Unknown, text, span),
        }
    }

    /// Read a quoted string. Double-quoted strings containing `${...}` become
    /// `Interpolated` tokens whose fragments alternate text and code.
    fn read_string(&mut self, quote: char, start: usize, line: usize, column: usize) -> Token {
        let mut fragments = Vec::new();
        let mut text = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    let raw = self.text_from(start);
                    let span = self.span_from(start, line, column);
                    if fragments.is_empty() {
                        return Token::literal(
                            TokenType::LiteralString,
                            raw,
                            Value::String(text),
                            span,
                        );
                    }
                    if !text.is_empty() {
                        fragments.push(Fragment::Text(text));
                    }
                    let mut token = Token::new(TokenType::Interpolated, raw, span);
                    token.fragments = fragments;
                    return token;
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some(other) => text.push(other),
                        None => break,
                    }
                    self.advance();
                }
                '$' if quote == '"' && self.peek_char(1) == Some('{') => {
                    self.advance_by(2);
                    if !text.is_empty() {
                        fragments.push(Fragment::Text(std::mem::take(&mut text)));
                    }
                    match self.read_interpolation() {
                        Some(tokens) => fragments.push(Fragment::Code(tokens)),
                        None => break,
                    }
                }
                _ => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        Token::new(
            TokenType::Unknown,
            self.text_from(start),
            self.span_from(start, line, column),
        )
    }

    /// Lex an embedded expression up to its closing brace. `None` when the
    /// input ends first.
    fn read_interpolation(&mut self) -> Option<Vec<Token>> {
        if self.interpolation_depth >= MAX_INTERPOLATION_DEPTH {
            return None;
        }
        self.interpolation_depth += 1;
        let tokens = self.read_interpolation_tokens();
        self.interpolation_depth -= 1;
        tokens
    }

    fn read_interpolation_tokens(&mut self) -> Option<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let token = self.next_token();
            match token.ty {
                TokenType::Eof => return None,
                TokenType::LBrace => depth += 1,
                TokenType::RBrace if depth == 0 => {
                    tokens.push(Token::new(TokenType::Eof, "", token.span));
                    return Some(tokens);
                }
                TokenType::RBrace => depth -= 1,
                _ => {}
            }
            tokens.push(token);
        }
    }

    /// `#2024-03-01#` dates and `#14:30#` / `#14:30:15#` times.
    fn read_hash_literal(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance(); // opening '#'
        let mut body = String::new();
        let mut closed = false;
        while let Some(ch) = self.current_char() {
            if ch == '#' {
                self.advance();
                closed = true;
                break;
            }
            if !(ch.is_ascii_digit() || ch == '-' || ch == ':') {
                break;
            }
            body.push(ch);
            self.advance();
        }

        let text = self.text_from(start);
        let span = self.span_from(start, line, column);
        if !closed {
            return Token::new(TokenType::Unknown, text, span);
        }

        if let Ok(date) = NaiveDate::parse_from_str(&body, "%Y-%m-%d") {
            return Token::literal(TokenType::LiteralDate, text, Value::Date(date), span);
        }
        let time = NaiveTime::parse_from_str(&body, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&body, "%H:%M"));
        match time {
            Ok(time) => Token::literal(TokenType::LiteralTime, text, Value::Time(time), span),
            Err(_) => Token::new(TokenType::Unknown, text, span),
        }
    }

    /// Returns `Some` only when comments are retained.
    fn read_comment(&mut self, start: usize, line: usize, column: usize) -> Option<Token> {
        if self.peek_char(1) == Some('/') {
            while let Some(ch) = self.current_char() {
                if ch == '\n' {
                    break;
                }
                self.advance();
            }
        } else {
            self.advance_by(2);
            while self.current_char().is_some() {
                if self.current_char() == Some('*') && self.peek_char(1) == Some('/') {
                    self.advance_by(2);
                    break;
                }
                self.advance();
            }
        }

        match self.mode {
            LexMode::RetainComments => Some(Token::new(
                TokenType::Comment,
                self.text_from(start),
                self.span_from(start, line, column),
            )),
            LexMode::SkipComments => None,
        }
    }

    fn classify_identifier(&self, ident: String, span: Span) -> Token {
        let text = match self.replacements.and_then(|r| r.get(&ident)) {
            Some(replacement) => replacement.clone(),
            None => ident,
        };

        if let Some(ty) = TokenType::keyword(&text) {
            return match ty {
                TokenType::True => Token::literal(ty, text, Value::Boolean(true), span),
                TokenType::False => Token::literal(ty, text, Value::Boolean(false), span),
                TokenType::Null => Token::literal(ty, text, Value::Null, span),
                _ => Token::new(ty, text, span),
            };
        }

        if let Some(value) = self.words.and_then(|w| w.get(&text)) {
            return Token::literal(TokenType::Word, text, value.clone(), span);
        }

        Token::new(TokenType::Identifier, text, span)
    }

    /// Emit a symbol of `len` characters.
    fn symbol(&mut self, ty: TokenType, len: usize) -> Token {
        let (start, line, column) = (self.position, self.line, self.column);
        self.advance_by(len);
        Token::new(ty, self.text_from(start), self.span_from(start, line, column))
    }

    /// Pick between a two-character operator and its one-character prefix.
    fn one_or_two(&mut self, second: char, long: TokenType, short: TokenType) -> Token {
        if self.peek_char(1) == Some(second) {
            self.symbol(long, 2)
        } else {
            self.symbol(short, 1)
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let (start, line, column) = (self.position, self.line, self.column);

            let ch = match self.current_char() {
                None => return Token::new(TokenType::Eof, "", self.span_from(start, line, column)),
                Some(ch) => ch,
            };

            let token = match ch {
                '/' if matches!(self.peek_char(1), Some('/') | Some('*')) => {
                    match self.read_comment(start, line, column) {
                        Some(comment) => comment,
                        None => continue,
                    }
                }
                '+' => match self.peek_char(1) {
                    Some('+') => self.symbol(TokenType::Increment, 2),
                    Some('=') => self.symbol(TokenType::IncrementAdd, 2),
                    _ => self.symbol(TokenType::Plus, 1),
                },
                '-' => match self.peek_char(1) {
                    Some('-') => self.symbol(TokenType::Decrement, 2),
                    Some('=') => self.symbol(TokenType::IncrementSubtract, 2),
                    _ => self.symbol(TokenType::Minus, 1),
                },
                '*' => self.one_or_two('=', TokenType::IncrementMultiply, TokenType::Star),
                '/' => self.one_or_two('=', TokenType::IncrementDivide, TokenType::Slash),
                '%' => self.symbol(TokenType::Percent, 1),
                '=' => self.one_or_two('=', TokenType::EqEq, TokenType::Assignment),
                '!' => self.one_or_two('=', TokenType::NotEq, TokenType::Not),
                '<' => self.one_or_two('=', TokenType::LtEq, TokenType::Lt),
                '>' => self.one_or_two('=', TokenType::GtEq, TokenType::Gt),
                '&' => self.one_or_two('&', TokenType::And, TokenType::Unknown),
                '|' => self.one_or_two('|', TokenType::Or, TokenType::Unknown),
                '(' => self.symbol(TokenType::LParen, 1),
                ')' => self.symbol(TokenType::RParen, 1),
                '[' => self.symbol(TokenType::LBracket, 1),
                ']' => self.symbol(TokenType::RBracket, 1),
                '{' => self.symbol(TokenType::LBrace, 1),
                '}' => self.symbol(TokenType::RBrace, 1),
                ',' => self.symbol(TokenType::Comma, 1),
                ';' => self.symbol(TokenType::Semicolon, 1),
                ':' => self.symbol(TokenType::Colon, 1),
                '.' => self.symbol(TokenType::Dot, 1),
                '"' | '\'' => self.read_string(ch, start, line, column),
                '#' => self.read_hash_literal(start, line, column),
                c if c.is_ascii_digit() => self.read_number(start, line, column),
                c if c.is_alphabetic() || c == '_' => {
                    let ident = self.read_identifier();
                    let span = self.span_from(start, line, column);
                    self.classify_identifier(ident, span)
                }
                _ => self.symbol(TokenType::Unknown, 1),
            };
            return token;
        }
    }
}

#[cfg(test)]
fn types(source: &str) -> Vec<TokenType> {
    Lexer::new(source).tokenize().iter().map(|t| t.ty).collect()
}

#[test]
fn test_keywords() {
    assert_eq!(
        types("var if else while for in function return"),
        vec![
            TokenType::Var,
            TokenType::If,
            TokenType::Else,
            TokenType::While,
            TokenType::For,
            TokenType::In,
            TokenType::Function,
            TokenType::Return,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_keywords_are_case_sensitive() {
    assert_eq!(types("If"), vec![TokenType::Identifier, TokenType::Eof]);
}

#[test]
fn test_compound_assignment_is_one_token() {
    assert_eq!(
        types("a+=1"),
        vec![
            TokenType::Identifier,
            TokenType::IncrementAdd,
            TokenType::LiteralNumber,
            TokenType::Eof,
        ]
    );
}

#[test]
fn test_positions() {
    let tokens = Lexer::new("a\n  b").tokenize();
    assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 3));
}

#[test]
fn test_runaway_interpolation_nesting_stays_total() {
    let depth = 5_000;
    let source = format!("{}1{}", "\"${".repeat(depth), "}\"".repeat(depth));
    let tokens = Lexer::new(&source).tokenize();
    assert_eq!(tokens.last().map(|t| t.ty), Some(TokenType::Eof));

    assert_eq!(
        types("\"a${\"b${1}\"}\""),
        vec![TokenType::Interpolated, TokenType::Eof]
    );
}
