pub mod ast;
pub mod sema;
pub mod symbols;
pub mod tac;
pub mod tac_generator;

pub use ast::{Ast, AstNode, NodeKind};
pub use symbols::{Attribute, LexemeId, Scope, SemType, Symbol, SymbolTable};
pub use tac::{Adr, Line, Op, Tac};
