//! Syntax tree produced by the parser.

use crate::value::{Value, ValueType};

/// Source position of a node (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    /// Line
    pub line: usize,
    /// Column
    pub column: usize,
}

/// A parsed compilation unit.
#[derive(Debug, Clone, Default)]
pub struct SourceUnit {
    /// Top-level declarations in textual order
    pub items: Vec<Item>,
}

/// Top-level declaration.
#[derive(Debug, Clone)]
pub enum Item {
    /// `contract Name { ... }`
    Contract(ContractDecl),
    /// `func Name(...) { ... }` outside any contract
    Function(FunctionDecl),
}

/// `contract Name { tx { ... } func ... }`
#[derive(Debug, Clone)]
pub struct ContractDecl {
    /// Contract name
    pub name: String,
    /// Declared transaction fields, in order
    pub fields: Vec<FieldDecl>,
    /// Nested functions, in order
    pub functions: Vec<FunctionDecl>,
    /// Position of the name
    pub pos: Pos,
}

/// One line of a `tx { ... }` block: `Name type ["optional"]`.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Type name as written
    pub ty: String,
    /// Trailing tag string, if any
    pub tag: Option<String>,
    /// Position of the field name
    pub pos: Pos,
}

/// `func name(a int, b string) int { ... }`
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Function name
    pub name: String,
    /// Parameters
    pub params: Vec<ParamDecl>,
    /// Declared result type
    pub result: Option<ValueType>,
    /// Body statements
    pub body: Vec<Stmt>,
    /// Position of the name
    pub pos: Pos,
}

/// A typed parameter or variable declaration.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// Name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Position of the name
    pub pos: Pos,
}

/// Statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `var a int, b string`
    Var(Vec<ParamDecl>),
    /// `name = expr`
    Assign {
        /// Local variable
        name: String,
        /// Assigned value
        value: Expr,
        /// Position of the name
        pos: Pos,
    },
    /// `$name = expr`
    AssignExtend {
        /// Extend map key
        name: String,
        /// Assigned value
        value: Expr,
    },
    /// `if cond { ... } else { ... }`; `else if` nests in `otherwise`
    If {
        /// Condition
        cond: Expr,
        /// Taken branch
        then: Vec<Stmt>,
        /// Fallback branch, empty when absent
        otherwise: Vec<Stmt>,
    },
    /// `while cond { ... }`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// `return [expr]`
    Return(Option<Expr>),
    /// `error expr`
    Raise(Expr),
    /// Expression evaluated for its side effects
    Expr(Expr),
}

/// Expression with its source position.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Node
    pub kind: ExprKind,
    /// Position of the first token
    pub pos: Pos,
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal constant
    Literal(Value),
    /// Local variable, parameter or host value
    Name(String),
    /// `$name`
    Extend(String),
    /// `name(args)`
    Call {
        /// Callee name
        name: String,
        /// Arguments, left to right
        args: Vec<Expr>,
    },
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Infix operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`, short-circuit
    And,
    /// `||`, short-circuit
    Or,
}
