use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

/// Short-circuiting operators; they yield an operand, not a boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Short source-like name used in error messages (`items.length`).
    pub fn label(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Member(object, prop) => format!("{}.{prop}", object.label()),
            Expr::Index(object, _) => format!("{}[...]", object.label()),
            Expr::Call(callee, _) => format!("{}(...)", callee.label()),
            Expr::Literal(v) => v.to_string(),
            _ => "(expression)".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

/// Statements allowed in the init and step parts of a `{#for}` header.
#[derive(Clone, Debug)]
pub enum Stmt {
    Declare(String, Expr),
    Assign(String, AssignOp, Expr),
    /// `x++` / `x--` / `++x` / `--x`
    Step(String, f64),
    Expr(Expr),
}

#[derive(Clone, Debug, Default)]
pub struct LoopHeader {
    pub init: Option<Stmt>,
    pub test: Option<Expr>,
    pub step: Option<Stmt>,
}

/// One node of a parsed directive template.
#[derive(Clone, Debug)]
pub enum Segment {
    Text(String),
    /// `{{ E }}`
    Escaped(Expr),
    /// `{#html E}`
    Raw(Expr),
    If {
        branches: Vec<(Expr, Vec<Segment>)>,
        otherwise: Option<Vec<Segment>>,
    },
    For {
        header: LoopHeader,
        body: Vec<Segment>,
    },
    /// `{#each C as item, index}`; up to three bindings (item, index, collection).
    Each {
        collection: Expr,
        bindings: Vec<String>,
        body: Vec<Segment>,
    },
}
