//! AST to three-address-code lowering.
//!
//! Consumes a type-resolved tree and a populated attribute table; produces
//! the flat [`Tac`] program. Anything the type-resolution walk should have
//! rejected is treated as an internal-consistency failure here and panics.

mod context;
mod expr;
mod stmt;

pub use context::Gen;

use crate::ir::ast::Ast;
use crate::ir::tac::Tac;

/// Lower a valid, type-resolved tree. Callers gate on `is_valid`; handing an
/// invalid tree to emission is a bug in the caller.
pub fn lower(ast: &mut Ast) -> Tac {
    assert!(ast.is_valid, "TAC emission invoked on an invalid tree");
    let Ast { root, table, .. } = ast;
    let root = root.as_ref().expect("valid tree has no root");
    let mut gen = Gen::new(table);
    gen.lower_program(root);
    gen.finish()
}
