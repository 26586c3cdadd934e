//! CD25 compiler: lexer, parser, semantic analysis, three-address-code
//! lowering, and the x86-64 / SM25 backends.
//!
//! The pipeline is strictly sequential: intern -> attribute -> type-resolve
//! -> emit. Backends consume only the lowered [`ir::Tac`]; they never see
//! the tree or the symbol table.

pub mod backend;
pub mod diag;
pub mod frontend;
pub mod ir;

use thiserror::Error;

use diag::{Diagnostic, Lister};
use ir::Ast;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("source contains errors:\n{}", diag::render_diagnostics(.0))]
    Invalid(Vec<Diagnostic>),
}

/// Parse and analyse, returning the (possibly invalid) tree together with
/// the collected diagnostics. Callers that go on to emission must gate on
/// `Ast::is_valid`.
pub fn parse_and_analyse(source: &str) -> (Ast, Lister) {
    let mut lister = Lister::new();
    let mut ast = frontend::parser::parse(source, &mut lister);
    log::debug!(
        "parse finished: root = {}, {} diagnostics",
        ast.root.is_some(),
        lister.diagnostics().len()
    );
    ir::sema::analyse(&mut ast, &mut lister);
    (ast, lister)
}

/// Compile source text to the three-address-code program.
pub fn compile_to_tac(source: &str) -> Result<ir::Tac, CompileError> {
    let (mut ast, lister) = parse_and_analyse(source);
    if !ast.is_valid {
        return Err(CompileError::Invalid(lister.into_diagnostics()));
    }
    Ok(ir::tac_generator::lower(&mut ast))
}

/// Compile source text to x86-64 assembly (NASM syntax). When `source_name`
/// is given, `%line` debugging directives are embedded.
pub fn compile_to_x86(source: &str, source_name: Option<&str>) -> Result<String, CompileError> {
    let tac = compile_to_tac(source)?;
    Ok(backend::x86::emit(&tac, source_name))
}

/// Compile source text to an SM25 stack-machine module file.
pub fn compile_to_sm25(source: &str) -> Result<String, CompileError> {
    let tac = compile_to_tac(source)?;
    Ok(backend::sm25::emit_module(&tac))
}

/// Compile source text to a readable SM25 mnemonic listing.
pub fn compile_to_sm25_listing(source: &str) -> Result<String, CompileError> {
    let tac = compile_to_tac(source)?;
    Ok(backend::sm25::emit_listing(&tac))
}
