//! The ternary syntax tree.
//!
//! Every node has up to three children (left, middle, right). List shapes
//! (statement lists, parameter lists, print lists) are right-nested chains.
//! Nodes reference symbols by handle; the symbol table owns them.

use std::fmt;

use crate::frontend::lexer::Pos;
use crate::ir::symbols::{SemType, Symbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Program,
    Globals,
    ConstList,
    ConstInit,
    Funcs,
    MainBody,
    MainDeclList,
    TypeList,
    StructType,
    ArrayType,
    FieldList,
    SimpleDecl,
    ArrayDeclList,
    ArrayDecl,
    FuncDecl,
    ParamList,
    ConstArrayParam,
    DeclList,
    StatList,
    For,
    Repeat,
    AssignList,
    IfThen,
    IfElse,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Input,
    Output,
    OutputLine,
    Call,
    Return,
    VarList,
    SimpleVar,
    /// `arr[i].field` — a scalar field of a struct element
    FieldAccess,
    /// `arr[i]` — a whole struct element
    ArrayElem,
    ExprList,
    BoolOp,
    NotRel,
    And,
    Or,
    Xor,
    Eq,
    NotEq,
    Greater,
    Less,
    LessEq,
    GreaterEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    IntLit,
    RealLit,
    True,
    False,
    FuncCall,
    PrintList,
    StringLit,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    pub pos: Pos,
    pub ty: SemType,
    pub symbol: Option<Symbol>,
    pub left: Option<Box<AstNode>>,
    pub middle: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    pub fn new(kind: NodeKind, pos: Pos) -> Self {
        Self {
            kind,
            pos,
            ty: SemType::None,
            symbol: None,
            left: None,
            middle: None,
            right: None,
        }
    }

    pub fn with_symbol(kind: NodeKind, pos: Pos, symbol: Symbol) -> Self {
        let mut node = Self::new(kind, pos);
        node.symbol = Some(symbol);
        node
    }

    pub fn with_type(kind: NodeKind, pos: Pos, ty: SemType) -> Self {
        let mut node = Self::new(kind, pos);
        node.ty = ty;
        node
    }

    pub fn set_left(&mut self, child: AstNode) {
        self.left = Some(Box::new(child));
    }

    pub fn set_middle(&mut self, child: AstNode) {
        self.middle = Some(Box::new(child));
    }

    pub fn set_right(&mut self, child: AstNode) {
        self.right = Some(Box::new(child));
    }

    // By the time lowering runs, type resolution has proven these children
    // exist; a missing one is an internal-consistency failure.

    pub fn lhs(&self) -> &AstNode {
        self.left.as_deref().expect("node missing left child")
    }

    pub fn mid(&self) -> &AstNode {
        self.middle.as_deref().expect("node missing middle child")
    }

    pub fn rhs(&self) -> &AstNode {
        self.right.as_deref().expect("node missing right child")
    }

    pub fn sym(&self) -> Symbol {
        self.symbol.expect("node missing symbol")
    }
}

/// Parser output: the tree, the table it interned into, and the validity
/// flag that gates emission.
#[derive(Debug)]
pub struct Ast {
    pub root: Option<AstNode>,
    pub table: SymbolTable,
    pub is_valid: bool,
}

impl Ast {
    /// Indented tree rendering for the `-A` debugging flag.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            render_node(root, &self.table, 0, &mut out);
        }
        out
    }
}

fn render_node(node: &AstNode, table: &SymbolTable, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&node.kind.to_string());
    if let Some(sym) = node.symbol {
        out.push_str(&format!(" '{}'", table.text(sym)));
    }
    if node.ty != SemType::None {
        out.push_str(&format!(" : {}", node.ty));
    }
    out.push('\n');
    for child in [&node.left, &node.middle, &node.right].into_iter().flatten() {
        render_node(child, table, depth + 1, out);
    }
}
