//! Typed syntax tree. Every node carries a span; spans of parents cover
//! their children.

use smol_str::SmolStr;

use crate::compiler::span::Span;

/// Top-level compilation unit. The chunk compiles into an implicit vararg
/// function.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub name: SmolStr,
    pub span: Span,
}

/// A function literal's parameters and body. Method declarations have the
/// implicit `self` prepended by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub params: Vec<Name>,
    pub is_vararg: bool,
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Local {
        names: Vec<Name>,
        values: Vec<Expr>,
    },
    LocalFunc {
        name: Name,
        body: FuncBody,
    },
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    /// `function a.b.c(...)` / `function a.b:m(...)`.
    FuncDecl {
        path: Vec<Name>,
        is_method: bool,
        body: FuncBody,
    },
    If {
        cond: Expr,
        then_block: Block,
        elseifs: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
    ForNum {
        var: Name,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },
    ForIn {
        vars: Vec<Name>,
        exprs: Vec<Expr>,
        body: Block,
    },
    Do {
        body: Block,
    },
    /// A call in statement position; the inner expression is always a
    /// `Call` or `MethodCall`.
    Call(Expr),
    Return {
        values: Vec<Expr>,
    },
    Break,
    Goto(Name),
    Label(Name),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    Len,
    BNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// Array-style `exp` field.
    List(Expr),
    /// `name = exp` and `[exp] = exp`; the parser lowers the name form to
    /// a string-literal key.
    Record { key: Expr, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nil,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    Vararg,
    Var(SmolStr),
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnOp {
        op: UnOp,
        operand: Box<Expr>,
    },
    Table(Vec<TableField>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        object: Box<Expr>,
        method: Name,
        args: Vec<Expr>,
    },
    Index {
        table: Box<Expr>,
        key: Box<Expr>,
    },
    Property {
        table: Box<Expr>,
        field: Name,
    },
    Function(FuncBody),
    /// Parenthesized expression; truncates a multi-value to one.
    Paren(Box<Expr>),
}

impl Expr {
    /// Whether the expression can produce multiple values in a multi-return
    /// position.
    pub fn is_multi(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } | ExprKind::Vararg
        )
    }
}
