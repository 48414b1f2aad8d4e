use crate::ast::TokenType;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Comparison
    /// Equal (`==`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,

    // Logical, short-circuiting
    /// Logical AND (`&&`)
    And,
    /// Logical OR (`||`)
    Or,
}

impl BinOp {
    pub fn from_token(ty: TokenType) -> Option<BinOp> {
        let op = match ty {
            TokenType::EqEq => BinOp::Equal,
            TokenType::NotEq => BinOp::NotEqual,
            TokenType::Lt => BinOp::LessThan,
            TokenType::Gt => BinOp::GreaterThan,
            TokenType::LtEq => BinOp::LessEqual,
            TokenType::GtEq => BinOp::GreaterEqual,
            TokenType::Plus => BinOp::Add,
            TokenType::Minus => BinOp::Subtract,
            TokenType::Star => BinOp::Multiply,
            TokenType::Slash => BinOp::Divide,
            TokenType::Percent => BinOp::Modulo,
            TokenType::And => BinOp::And,
            TokenType::Or => BinOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Binding power; higher binds tighter. All binary operators are left associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Equal | BinOp::NotEqual => 4,
            BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => 5,
            BinOp::Add | BinOp::Subtract => 6,
            BinOp::Multiply | BinOp::Divide | BinOp::Modulo => 7,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::LessThan => "<",
            BinOp::GreaterThan => ">",
            BinOp::LessEqual => "<=",
            BinOp::GreaterEqual => ">=",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Binding power of assignment, the loosest level.
pub const ASSIGNMENT_PRECEDENCE: u8 = 1;

/// Binding power of prefix operators.
pub const UNARY_PRECEDENCE: u8 = 8;

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (`-x`)
    Negate,
    /// Logical not (`!x`)
    Not,
}

/// Assignment operators. `Set` is plain `=`, the rest combine with a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl AssignOp {
    pub fn from_token(ty: TokenType) -> Option<AssignOp> {
        let op = match ty {
            TokenType::Assignment => AssignOp::Set,
            TokenType::IncrementAdd => AssignOp::Add,
            TokenType::IncrementSubtract => AssignOp::Subtract,
            TokenType::IncrementMultiply => AssignOp::Multiply,
            TokenType::IncrementDivide => AssignOp::Divide,
            _ => return None,
        };
        Some(op)
    }

    /// The binary operator a compound assignment applies, `None` for `=`.
    pub fn binary(self) -> Option<BinOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Subtract => Some(BinOp::Subtract),
            AssignOp::Multiply => Some(BinOp::Multiply),
            AssignOp::Divide => Some(BinOp::Divide),
        }
    }
}
