use std::fmt;

use crate::value::Value;

/// Location of a token in the source text.
///
/// Offsets count characters, not bytes. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Coarse category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Symbol,
    Identifier,
    Comment,
    /// Interpolated string built from text and embedded expression fragments
    Composite,
    LiteralString,
    LiteralNumber,
    LiteralDate,
    LiteralBool,
    LiteralTime,
    /// `null` and host-registered words
    LiteralOther,
}

/// Fine-grained identity of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Keywords
    Var,
    If,
    Else,
    Break,
    Continue,
    For,
    While,
    Function,
    Return,
    New,
    Try,
    Catch,
    Throw,
    In,
    Run,
    Then,

    // Arithmetic
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,

    // Assignment
    /// `=`
    Assignment,
    /// `+=`
    IncrementAdd,
    /// `-=`
    IncrementSubtract,
    /// `*=`
    IncrementMultiply,
    /// `/=`
    IncrementDivide,
    /// `++`
    Increment,
    /// `--`
    Decrement,

    // Comparison
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    // Logical
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,

    // Literals
    LiteralNumber,
    LiteralString,
    LiteralDate,
    LiteralTime,
    True,
    False,
    Null,
    /// Host-registered named constant
    Word,
    /// String containing `${...}` fragments
    Interpolated,

    Identifier,
    Comment,

    /// Character sequence the lexer could not classify
    Unknown,

    /// End of input
    Eof,
}

impl TokenType {
    /// Look up a reserved word. Matching is case-sensitive.
    pub fn keyword(text: &str) -> Option<TokenType> {
        use TokenType::*;
        let ty = match text {
            "var" => Var,
            "if" => If,
            "else" => Else,
            "break" => Break,
            "continue" => Continue,
            "for" => For,
            "while" => While,
            "function" => Function,
            "return" => Return,
            "new" => New,
            "try" => Try,
            "catch" => Catch,
            "throw" => Throw,
            "in" => In,
            "run" => Run,
            "then" => Then,
            "true" => True,
            "false" => False,
            "null" => Null,
            _ => return None,
        };
        Some(ty)
    }

    pub fn kind(self) -> TokenKind {
        use TokenType::*;
        match self {
            Var | If | Else | Break | Continue | For | While | Function | Return | New | Try
            | Catch | Throw | In | Run | Then => TokenKind::Keyword,
            LiteralNumber => TokenKind::LiteralNumber,
            LiteralString => TokenKind::LiteralString,
            LiteralDate => TokenKind::LiteralDate,
            LiteralTime => TokenKind::LiteralTime,
            True | False => TokenKind::LiteralBool,
            Null | Word => TokenKind::LiteralOther,
            Interpolated => TokenKind::Composite,
            Identifier => TokenKind::Identifier,
            Comment => TokenKind::Comment,
            _ => TokenKind::Symbol,
        }
    }

    /// Source spelling used in error messages.
    pub fn describe(self) -> &'static str {
        use TokenType::*;
        match self {
            Var => "var",
            If => "if",
            Else => "else",
            Break => "break",
            Continue => "continue",
            For => "for",
            While => "while",
            Function => "function",
            Return => "return",
            New => "new",
            Try => "try",
            Catch => "catch",
            Throw => "throw",
            In => "in",
            Run => "run",
            Then => "then",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Assignment => "=",
            IncrementAdd => "+=",
            IncrementSubtract => "-=",
            IncrementMultiply => "*=",
            IncrementDivide => "/=",
            Increment => "++",
            Decrement => "--",
            EqEq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            And => "&&",
            Or => "||",
            Not => "!",
            LParen => "(",
            RParen => ")",
            LBracket => "[",
            RBracket => "]",
            LBrace => "{",
            RBrace => "}",
            Comma => ",",
            Semicolon => ";",
            Colon => ":",
            Dot => ".",
            LiteralNumber => "number",
            LiteralString => "string",
            LiteralDate => "date",
            LiteralTime => "time",
            True => "true",
            False => "false",
            Null => "null",
            Word => "word",
            Interpolated => "interpolated string",
            Identifier => "identifier",
            Comment => "comment",
            Unknown => "unknown token",
            Eof => "end of input",
        }
    }
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Literal text between interpolations
    Text(String),
    /// Tokens of an embedded `${...}` expression, terminated by `Eof`
    Code(Vec<Token>),
}

/// A lexical token.
///
/// # Examples
/// ```text
/// total += 1      // Identifier, IncrementAdd, LiteralNumber
/// "Hi ${name}"    // Interpolated, with Text and Code fragments
/// #2024-03-01#    // LiteralDate
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub ty: TokenType,
    /// Text as it appeared in the source (after lexical replacement)
    pub text: String,
    /// Decoded value for literal tokens
    pub literal: Option<Value>,
    pub span: Span,
    /// Ordered children of a `Composite` token; empty otherwise
    pub fragments: Vec<Fragment>,
}

impl Token {
    pub fn new(ty: TokenType, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind: ty.kind(),
            ty,
            text: text.into(),
            literal: None,
            span,
            fragments: Vec::new(),
        }
    }

    pub fn literal(ty: TokenType, text: impl Into<String>, value: Value, span: Span) -> Self {
        Token {
            literal: Some(value),
            ..Token::new(ty, text, span)
        }
    }

    pub fn is(&self, ty: TokenType) -> bool {
        self.ty == ty
    }
}
