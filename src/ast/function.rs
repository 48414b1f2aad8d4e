use crate::ast::{Expr, Stmt};
use crate::registry::{Arg, FunctionMetaData};

/// A formal parameter of a script function.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Default used when the caller omits the argument
    pub default: Option<Expr>,
}

/// Script-defined function, either declared by name or written as a lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for lambdas
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<lambda>")
    }

    /// Call-site binding metadata. Defaults are script expressions, so they are
    /// evaluated by the caller rather than stored here; parameters with a default
    /// are simply marked optional.
    pub fn metadata(&self) -> FunctionMetaData {
        self.params.iter().fold(
            FunctionMetaData::new(self.display_name()),
            |meta, param| {
                let arg = if param.default.is_some() {
                    Arg::optional_any(&param.name)
                } else {
                    Arg::any(&param.name)
                };
                meta.arg(arg)
            },
        )
    }
}
