/// AST node types for the `OpenSCAD` language.
///
/// The tree is a set of closed tagged unions, one per syntactic category
/// (statements, modular instantiations, expressions, list-comprehension
/// elements). Each union is wrapped in a struct that hoists the shared
/// [`Position`] field, so consumers get exhaustive matching on the kind and
/// uniform access to source locations.
///
/// All types serialize with serde: the kind tag appears as `"_type"` and the
/// position as `"_position"`, which is the wire format used by
/// [`crate::serialize`].
use serde::{Deserialize, Serialize};

/// A resolved location in an original source, before include expansion.
///
/// `offset` is a byte offset into the origin's own text; `line` and `column`
/// are 1-indexed. Nodes parsed from spliced `include` content report the
/// included file as their origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub origin: String,
    #[serde(default)]
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub fn new(origin: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            origin: origin.into(),
            offset,
            line,
            column,
        }
    }

    /// Placeholder used for trees rebuilt from serialized form without
    /// position data.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            origin: String::new(),
            offset: 0,
            line: 0,
            column: 0,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.origin.is_empty() && self.line == 0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.origin, self.line, self.column)
        }
    }
}

/// A complete `OpenSCAD` source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub statements: Vec<Statement>,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(flatten)]
    pub kind: StatementKind,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

impl Statement {
    #[must_use]
    pub const fn new(kind: StatementKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// Statement kinds at the top level of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum StatementKind {
    /// `use <path>`. Never expanded; the path text is opaque.
    Use { path: String },
    /// `include <path>`. Only present when include expansion is disabled.
    Include { path: String },
    /// `name = expr;`
    Assignment { name: String, value: Expr },
    /// `module name(params) { body }`
    ///
    /// The body grammar accepts any statement, but only modular
    /// instantiations are retained in the tree.
    ModuleDeclaration {
        name: String,
        parameters: Vec<Parameter>,
        body: Vec<Instantiation>,
    },
    /// `function name(params) = expr;`
    FunctionDeclaration {
        name: String,
        parameters: Vec<Parameter>,
        body: Expr,
    },
    /// A modular instantiation used as a statement.
    Instantiation { instantiation: Instantiation },
    /// `// text`, emitted only with comment preservation on.
    CommentLine { text: String },
    /// `/* text */`, emitted only with comment preservation on.
    CommentBlock { text: String },
}

/// A statement-level construct that produces or wraps geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instantiation {
    #[serde(flatten)]
    pub kind: InstantiationKind,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

impl Instantiation {
    #[must_use]
    pub const fn new(kind: InstantiationKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum InstantiationKind {
    /// `name(args);` or `name(args) { children }`
    Call {
        name: String,
        arguments: Vec<Argument>,
        children: Vec<Instantiation>,
    },
    /// `for (bindings) child`
    For {
        assignments: Vec<Assignment>,
        children: Vec<Instantiation>,
    },
    /// C-style `for (init; cond; update) child`
    CFor {
        init: Vec<Assignment>,
        condition: Expr,
        update: Vec<Assignment>,
        children: Vec<Instantiation>,
    },
    /// `intersection_for (bindings) child`
    IntersectionFor {
        assignments: Vec<Assignment>,
        children: Vec<Instantiation>,
    },
    /// C-style `intersection_for (init; cond; update) child`
    IntersectionCFor {
        init: Vec<Assignment>,
        condition: Expr,
        update: Vec<Assignment>,
        children: Vec<Instantiation>,
    },
    /// `let (bindings) child`
    Let {
        assignments: Vec<Assignment>,
        children: Vec<Instantiation>,
    },
    /// `echo(args) child` at statement level.
    Echo {
        arguments: Vec<Argument>,
        children: Vec<Instantiation>,
    },
    /// `assert(args) child` at statement level.
    Assert {
        arguments: Vec<Argument>,
        children: Vec<Instantiation>,
    },
    /// `if (cond) child`
    If {
        condition: Expr,
        children: Vec<Instantiation>,
    },
    /// `if (cond) child else child`
    IfElse {
        condition: Expr,
        then_children: Vec<Instantiation>,
        else_children: Vec<Instantiation>,
    },
    /// `!` — show only this subtree.
    ShowOnly { child: Box<Instantiation> },
    /// `#` — highlight/debug.
    Highlight { child: Box<Instantiation> },
    /// `%` — background/transparent.
    Background { child: Box<Instantiation> },
    /// `*` — disable.
    Disable { child: Box<Instantiation> },
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

impl Expr {
    #[must_use]
    pub const fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum ExprKind {
    /// Numeric literal
    Number { value: f64 },
    /// String literal (already unescaped)
    String { value: String },
    /// `true` / `false`
    Boolean { value: bool },
    /// `undef`
    Undef,
    /// Variable reference
    Identifier { name: String },

    /// Unary operation: `-x`, `!x`, `~x`
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Ternary: `cond ? then : else`
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    /// Function call: `name(args)` or `expr(args)`
    Call {
        callee: Box<Expr>,
        arguments: Vec<Argument>,
    },
    /// Index access: `expr[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// Member access: `expr.member`
    Member { object: Box<Expr>, member: String },

    /// Vector literal without comprehension fragments: `[a, b, c]`
    Vector { elements: Vec<Expr> },
    /// Bracketed literal with at least one comprehension fragment at the top
    /// level: `[for (i = r) i * i]`, `[1, each v, 2]`, …
    ListComprehension { elements: Vec<ListCompElement> },
    /// Range: `[start : end]` or `[start : step : end]`.
    ///
    /// A missing step stays `None`; it is never defaulted.
    Range {
        start: Box<Expr>,
        step: Option<Box<Expr>>,
        end: Box<Expr>,
    },

    /// `let (bindings) expr`
    Let {
        assignments: Vec<Assignment>,
        body: Box<Expr>,
    },
    /// `echo(args) expr`, the value-bearing expression form.
    Echo {
        arguments: Vec<Argument>,
        body: Option<Box<Expr>>,
    },
    /// `assert(args) expr`
    Assert {
        arguments: Vec<Argument>,
        body: Option<Box<Expr>>,
    },

    /// Anonymous function: `function(params) expr`
    FunctionLiteral {
        parameters: Vec<Parameter>,
        body: Box<Expr>,
    },
}

/// An element of a bracketed literal that contains comprehension fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListCompElement {
    #[serde(flatten)]
    pub kind: ListCompElementKind,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

impl ListCompElement {
    #[must_use]
    pub const fn new(kind: ListCompElementKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum ListCompElementKind {
    /// A plain expression element.
    Expr { expr: Expr },
    /// `for (bindings) element`
    For {
        assignments: Vec<Assignment>,
        body: Box<ListCompElement>,
    },
    /// C-style `for (init; cond; update) element`
    CFor {
        init: Vec<Assignment>,
        condition: Expr,
        update: Vec<Assignment>,
        body: Box<ListCompElement>,
    },
    /// `if (cond) element`
    If {
        condition: Expr,
        body: Box<ListCompElement>,
    },
    /// `if (cond) element else element`
    IfElse {
        condition: Expr,
        then_body: Box<ListCompElement>,
        else_body: Box<ListCompElement>,
    },
    /// `let (bindings) element`
    Let {
        assignments: Vec<Assignment>,
        body: Box<ListCompElement>,
    },
    /// `each element`
    Each { body: Box<ListCompElement> },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    BitwiseNot,
}

/// Binary operators (ordered by precedence, lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Logical
    LogicalOr,
    LogicalAnd,
    // Equality
    Equal,
    NotEqual,
    // Comparison
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Bitwise
    BitwiseOr,
    BitwiseAnd,
    // Shift
    ShiftLeft,
    ShiftRight,
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Exponent
    Exponent,
}

/// A function/module parameter: `name` or `name = default`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expr>,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

/// A function/module argument: positional `expr` or named `name = expr`.
///
/// Named and positional arguments may interleave freely; the builder does not
/// enforce name uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
    #[serde(rename = "_position", default)]
    pub position: Position,
}

/// A `name = expr` binding, as used in `let`/`for` heads and in C-style
/// `for` init/update lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
    #[serde(rename = "_position", default)]
    pub position: Position,
}
