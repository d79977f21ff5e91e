//! The Ace abstract syntax tree.
//!
//! Per the design notes, node *data* lives here as a tagged sum
//! (`StmtKind` / `ExprKind`); the three traversals (`Visit`, `Build`,
//! `Optimize`) are implemented in `ace-compiler` as free functions that
//! pattern-match over these enums and take the compilation unit as an
//! explicit context argument, rather than as methods with process-wide
//! state. This keeps the AST crate a pure data crate with no dependency on
//! the compiler, and avoids inheritance-flavored node hierarchies.

use ace_diagnostics::SourceLocation;
use serde::{Deserialize, Serialize};

/// Root of the AST: an ordered sequence of top-level statements.
pub type Program = Vec<Stmt>;

/// A block is an ordered sequence of statements sharing a lexical scope.
pub type Block = Vec<Stmt>;

/// Wraps a node's data with the source location it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    pub kind: T,
    pub location: SourceLocation,
}

impl<T> Node<T> {
    pub fn new(kind: T, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

pub type Stmt = Node<StmtKind>;
pub type Expr = Node<ExprKind>;

/// A parsed (pre-resolution) type annotation, e.g. `Array(Int)` or `Any`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    Named(String),
    Generic { base: String, args: Vec<TypeSpec> },
}

impl TypeSpec {
    pub fn display_name(&self) -> String {
        match self {
            TypeSpec::Named(name) => name.clone(),
            TypeSpec::Generic { base, args } => {
                let arg_names: Vec<String> = args.iter().map(TypeSpec::display_name).collect();
                format!("{}({})", base, arg_names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

/// A function parameter: name, declared type, and whether it is the
/// trailing variadic parameter (`...rest: Args(T)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_spec: Option<TypeSpec>,
    pub is_variadic: bool,
}

/// A call argument, named or positional (spec §4.2 argument substitution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

/// A member of a prototype (object type) definition: name, declared type,
/// optional default-value expression (spec §3.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeMember {
    pub name: String,
    pub type_spec: Option<TypeSpec>,
    pub default_value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import "std/io";` — a module import, spliced into the module tree.
    Module,
    /// `use "./helpers.ace";` — a local (same-compilation-unit) import.
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `let x: Int = 1;` / `const y = 2;`
    VariableDecl {
        name: String,
        is_const: bool,
        type_spec: Option<TypeSpec>,
        value: Option<Expr>,
    },
    /// `type Pair { a: Int, b: Int = 0 }` — a user-defined (prototype) type.
    PrototypeDecl {
        name: String,
        type_params: Vec<String>,
        base: Option<String>,
        members: Vec<PrototypeMember>,
    },
    /// `type Id = Int;`
    TypeAlias { name: String, aliasee: TypeSpec },
    ModuleDecl { name: String, body: Vec<Stmt> },
    Import { kind: ImportKind, path: String, alias: Option<String> },
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While { condition: Expr, body: Block },
    TryCatch {
        try_block: Block,
        catch_var: Option<String>,
        catch_block: Block,
    },
    Return(Option<Expr>),
    Yield(Option<Expr>),
    Block(Block),
    /// A compile-time meta-block: its statements run during analysis, not
    /// at VM runtime (spec §3.7).
    MetaBlock(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nil,
    Identifier(String),
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnOp, operand: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Argument> },
    MemberAccess { object: Box<Expr>, member: String },
    /// `obj has member` — always compiles (to a by-hash probe), may throw
    /// at runtime only when used outside an `if` guard.
    Has { object: Box<Expr>, member: String },
    ArrayAccess { object: Box<Expr>, index: Box<Expr> },
    ArrayLiteral(Vec<Expr>),
    TupleLiteral(Vec<Expr>),
    ObjectLiteral {
        type_name: Option<TypeSpec>,
        fields: Vec<(String, Expr)>,
    },
    /// `new Point(1, 2)` — instantiate a prototype.
    New { type_spec: TypeSpec, args: Vec<Argument> },
    Function {
        name: Option<String>,
        params: Vec<Param>,
        return_type: Option<TypeSpec>,
        body: Block,
        is_generator: bool,
    },
}

impl Expr {
    pub fn int(value: i64, location: SourceLocation) -> Self {
        Node::new(ExprKind::Int(value), location)
    }

    pub fn identifier(name: impl Into<String>, location: SourceLocation) -> Self {
        Node::new(ExprKind::Identifier(name.into()), location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_spec_display_name_nests_generics() {
        let spec = TypeSpec::Generic {
            base: "Array".to_string(),
            args: vec![TypeSpec::Named("Int".to_string())],
        };
        assert_eq!(spec.display_name(), "Array(Int)");
    }

    #[test]
    fn nodes_serialize_round_trip() {
        let expr = Expr::int(7, SourceLocation::new("t.ace", 1, 1));
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }
}
