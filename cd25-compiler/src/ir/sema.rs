//! Type resolution and semantic checking.
//!
//! Two walks over the tree. The first is a post-order pass that fills in
//! every node's semantic type from its children and its symbol's attribute;
//! unresolved names become `Error` types so resolution can keep going and
//! surface as many genuine faults as possible. The second walk applies the
//! language rules, suppressing any check whose operands are already `Error`
//! to avoid cascading false positives.
//!
//! Promotion (`int` -> `real`) is only *recorded* here via result types;
//! conversion instructions are inserted during TAC emission.

use crate::diag::Lister;
use crate::ir::ast::{Ast, AstNode, NodeKind};
use crate::ir::symbols::{Attribute, SemType, Symbol, SymbolTable};

pub fn analyse(ast: &mut Ast, lister: &mut Lister) {
    let Ast {
        root,
        table,
        is_valid,
    } = ast;
    let Some(root) = root.as_mut() else {
        *is_valid = false;
        return;
    };
    let mut sema = Sema {
        table,
        lister,
        valid: *is_valid,
    };
    sema.update(root);
    sema.check(root);
    *is_valid = sema.valid;
    log::debug!("semantic analysis finished, valid = {}", *is_valid);
}

struct Sema<'a> {
    table: &'a mut SymbolTable,
    lister: &'a mut Lister,
    valid: bool,
}

impl<'a> Sema<'a> {
    fn error(&mut self, node: &AstNode, message: impl Into<String>) {
        self.lister
            .sem_error(node.pos.row, node.pos.col, message.into());
        self.valid = false;
    }

    // ── Pass 1: fill node types, children before parents ─────────────────

    fn update(&mut self, node: &mut AstNode) {
        if let Some(left) = node.left.as_mut() {
            self.update(left);
        }
        if let Some(middle) = node.middle.as_mut() {
            self.update(middle);
        }
        if let Some(right) = node.right.as_mut() {
            self.update(right);
        }
        match node.kind {
            NodeKind::ConstInit => {
                let ty = node.lhs().ty;
                let sym = node.sym();
                if self.table.add_attribute(sym, Attribute::Scalar(ty)).is_err() {
                    self.error(node, "redefinition of a constant already defined in scope");
                }
            }
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div => {
                let left = node.lhs().ty;
                let right = node.rhs().ty;
                node.ty = if !left.is_numeric() || !right.is_numeric() {
                    SemType::Error
                } else if left == SemType::Real || right == SemType::Real {
                    SemType::Real
                } else {
                    SemType::Int
                };
            }
            NodeKind::Mod | NodeKind::Pow => {
                let left = node.lhs().ty;
                let right = node.rhs().ty;
                node.ty = if left == SemType::Int && right == SemType::Int {
                    SemType::Int
                } else {
                    SemType::Error
                };
            }
            NodeKind::FuncCall => {
                node.ty = self
                    .table
                    .attribute(node.sym())
                    .map(|e| e.attr.sem_type())
                    .unwrap_or(SemType::Error);
            }
            NodeKind::SimpleVar => {
                node.ty = self
                    .table
                    .attribute(node.sym())
                    .map(|e| e.attr.sem_type())
                    .unwrap_or(SemType::Error);
            }
            NodeKind::ArrayElem => {
                let arr_sym = node.lhs().sym();
                let is_array = matches!(
                    self.table.attribute(arr_sym).map(|e| &e.attr),
                    Some(Attribute::Array { .. })
                );
                node.ty = if is_array {
                    SemType::Struct
                } else {
                    SemType::Error
                };
            }
            NodeKind::FieldAccess => {
                node.ty = self.field_type(node).unwrap_or(SemType::Error);
            }
            _ => {}
        }
    }

    /// Resolve `arr[i].field` to the field's type: array variable ->
    /// array type -> struct type -> field list, then a linear scan matching
    /// the field name by unscoped equality.
    fn field_type(&self, node: &AstNode) -> Option<SemType> {
        let arr_entry = self.table.attribute(node.lhs().sym())?;
        let Attribute::Array { elem } = &arr_entry.attr else {
            return None;
        };
        let type_entry = self.table.attribute(*elem)?;
        let Attribute::Struct { fields } = &type_entry.attr else {
            return None;
        };
        let fields_entry = self.table.attribute(*fields)?;
        let Attribute::Fields(elements) = &fields_entry.attr else {
            return None;
        };
        let target = node.sym();
        elements
            .iter()
            .find(|e| e.name.same_name(target))
            .map(|e| e.ty)
    }

    // ── Pass 2: rule checks ──────────────────────────────────────────────

    fn check(&mut self, node: &AstNode) {
        match node.kind {
            NodeKind::Program => {
                if !node.sym().same_name(node.rhs().sym()) {
                    self.error(node, "program name mismatch");
                }
            }
            NodeKind::ConstInit => {
                // the type check also rejects forward references between
                // constants: those resolve to Error during the update pass
                let init = node.lhs();
                if !init.ty.is_numeric() || !self.const_scalar_expr(init) {
                    self.error(init, "constant value is not known at compile time");
                }
            }
            NodeKind::ArrayType => {
                if !self.const_int_expr(node.lhs()) {
                    self.error(node, "array size contains variables or non-integers");
                }
                let elem_ok = match self.table.attribute(node.sym()).map(|e| e.attr.clone())
                {
                    Some(Attribute::Struct { fields }) => matches!(
                        self.table.attribute(fields).map(|e| &e.attr),
                        Some(Attribute::Fields(_))
                    ),
                    _ => false,
                };
                if !elem_ok {
                    self.error(node, "the element type is not a struct type");
                }
            }
            NodeKind::FuncDecl => {
                if !has_return(node.rhs()) {
                    self.error(node, "function does not return");
                }
                if let Some(locals) = node.middle.as_deref() {
                    self.check_locals(locals);
                }
            }
            NodeKind::ArrayDecl => {
                self.check_arrdecl(node);
            }
            NodeKind::FuncCall => {
                self.check_fncall(node);
            }
            NodeKind::Call => {
                self.check_callstat(node);
            }
            NodeKind::SimpleVar => {
                self.check_simple_var(node);
            }
            NodeKind::ArrayElem => {
                let arr = node.lhs();
                let is_array = matches!(
                    self.table.attribute(arr.sym()).map(|e| &e.attr),
                    Some(Attribute::Array { .. })
                );
                if !is_array && arr.ty != SemType::Error {
                    self.error(node, "variable is not an array");
                }
            }
            NodeKind::FieldAccess => {
                if node.ty == SemType::Error {
                    self.check_field_access(node);
                }
            }
            NodeKind::Assign => {
                self.check_assign(node);
            }
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div => {
                let left = node.lhs().ty;
                let right = node.rhs().ty;
                if left != SemType::Error
                    && right != SemType::Error
                    && (!left.is_numeric() || !right.is_numeric())
                {
                    self.error(node, "arithmetic requires numeric operands");
                }
            }
            NodeKind::Mod => {
                self.check_int_only(node, "modulus is only valid for integers");
            }
            NodeKind::Pow => {
                self.check_int_only(node, "exponentiation is an integer-only operation");
            }
            NodeKind::BoolOp => {
                for side in [node.lhs(), node.rhs()] {
                    if side.ty != SemType::Bool && side.ty != SemType::Error {
                        self.error(side, "logical operator requires boolean operands");
                    }
                }
            }
            NodeKind::NotRel => {
                let left = node.lhs().ty;
                let right = node.rhs().ty;
                if left != SemType::Error
                    && right != SemType::Error
                    && (!left.is_numeric() || !right.is_numeric())
                {
                    self.error(node, "relational operator requires numeric operands");
                }
            }
            NodeKind::IfThen | NodeKind::IfElse => {
                self.check_condition(node.lhs());
            }
            NodeKind::For => {
                self.check_condition(node.mid());
            }
            NodeKind::Repeat => {
                self.check_condition(node.rhs());
            }
            NodeKind::Output | NodeKind::OutputLine => {
                if let Some(prlist) = node.left.as_deref() {
                    self.check_prlist(prlist);
                }
            }
            NodeKind::Eq
            | NodeKind::NotEq
            | NodeKind::Greater
            | NodeKind::Less
            | NodeKind::LessEq
            | NodeKind::GreaterEq => {
                // a relop appearing as the middle child of `not` has no
                // children of its own
                if node.left.is_some() {
                    self.check_relop(node);
                }
            }
            _ => {}
        }
        for child in [&node.left, &node.middle, &node.right].into_iter().flatten() {
            self.check(child);
        }
    }

    fn check_locals(&mut self, node: &AstNode) {
        let mut cur = node;
        loop {
            let (item, rest) = if cur.kind == NodeKind::DeclList {
                (cur.lhs(), Some(cur.rhs()))
            } else {
                (cur, None)
            };
            if item.kind == NodeKind::ArrayDecl {
                self.error(
                    item,
                    "array variables must be declared in the global arrays section",
                );
            }
            match rest {
                Some(r) => cur = r,
                None => return,
            }
        }
    }

    fn check_arrdecl(&mut self, node: &AstNode) {
        let Some(entry) = self.table.attribute(node.sym()) else {
            return;
        };
        let Attribute::Array { elem } = entry.attr.clone() else {
            return;
        };
        let ok = matches!(
            self.table.attribute(elem).map(|e| &e.attr),
            Some(Attribute::Struct { .. })
        );
        if !ok {
            self.error(node, "the array type does not exist");
        }
    }

    fn check_simple_var(&mut self, node: &AstNode) {
        match self.table.attribute(node.sym()) {
            None => self.error(node, "undeclared variable"),
            Some(entry) if entry.attr.is_func() => {
                self.error(node, "name does not refer to a variable")
            }
            Some(_) => {}
        }
    }

    fn check_field_access(&mut self, node: &AstNode) {
        // distinguish "not an array" from "no such field" for the message
        let arr_ok = matches!(
            self.table.attribute(node.lhs().sym()).map(|e| &e.attr),
            Some(Attribute::Array { .. })
        );
        if arr_ok {
            self.error(node, "struct field does not exist");
        } else {
            self.error(node, "variable is not an array");
        }
    }

    fn check_fncall(&mut self, node: &AstNode) {
        let sym = node.sym();
        match self.table.attribute(sym).map(|e| e.attr.clone()) {
            Some(Attribute::Func { ret, params }) => {
                if ret == SemType::Void {
                    self.error(node, "void function is not an expression");
                    return;
                }
                self.check_args(node, &params);
            }
            _ => self.error(node, "called a function that does not exist"),
        }
    }

    fn check_callstat(&mut self, node: &AstNode) {
        let sym = node.sym();
        match self.table.attribute(sym).map(|e| e.attr.clone()) {
            Some(Attribute::Func { ret, params }) => {
                if ret != SemType::Void {
                    self.error(node, "non-void function is not a statement");
                    return;
                }
                self.check_args(node, &params);
            }
            _ => self.error(node, "called a function that does not exist"),
        }
    }

    fn check_args(&mut self, call: &AstNode, formals: &[Attribute]) {
        let mut args = call.left.as_deref();
        for formal in formals {
            let Some(list) = args else {
                self.error(call, "too few function arguments");
                return;
            };
            self.compare_arg(formal, list.lhs());
            args = list.right.as_deref();
        }
        if args.is_some() {
            self.error(call, "too many function arguments");
        }
    }

    fn compare_arg(&mut self, formal: &Attribute, arg: &AstNode) {
        if arg.ty == SemType::Error {
            return;
        }
        match formal {
            Attribute::Scalar(SemType::Real) => {
                if !arg.ty.is_numeric() {
                    self.error(arg, "expected real argument");
                }
            }
            Attribute::Scalar(SemType::Int) => {
                if arg.ty != SemType::Int {
                    self.error(arg, "expected integer argument");
                }
            }
            Attribute::Scalar(SemType::Bool) => {
                if arg.ty != SemType::Bool {
                    self.error(arg, "expected boolean argument");
                }
            }
            Attribute::Array { elem } => {
                if arg.ty != SemType::Array {
                    self.error(arg, "expected array argument");
                    return;
                }
                if let Some(arg_elem) = self.array_elem_type(arg) {
                    if !arg_elem.same_name(*elem) {
                        self.error(arg, "arrays are of different types");
                    }
                }
            }
            _ => {}
        }
    }

    /// The array-type symbol behind an array variable or `arr[i]` element.
    fn array_elem_type(&self, node: &AstNode) -> Option<Symbol> {
        let var = match node.kind {
            NodeKind::SimpleVar => node,
            NodeKind::ArrayElem => node.lhs(),
            _ => return None,
        };
        match self.table.attribute(var.sym()).map(|e| &e.attr) {
            Some(Attribute::Array { elem }) => Some(*elem),
            _ => None,
        }
    }

    fn check_assign(&mut self, node: &AstNode) {
        let left = node.lhs();
        let right = node.rhs();
        if left.ty != right.ty {
            // Promotion on assignment is deliberately not allowed: a `real`
            // target does not accept an `integer` source.
            if left.ty != SemType::Error && right.ty != SemType::Error {
                self.error(node, "incorrect type assignment");
            }
            return;
        }
        if left.ty == SemType::Array || left.ty == SemType::Struct {
            let lhs_elem = self.array_elem_type(left);
            let rhs_elem = self.array_elem_type(right);
            if let (Some(l), Some(r)) = (lhs_elem, rhs_elem) {
                if !l.same_name(r) {
                    self.error(node, "assignment between different array types");
                }
            }
        }
    }

    fn check_int_only(&mut self, node: &AstNode, message: &str) {
        let left = node.lhs().ty;
        let right = node.rhs().ty;
        if left != SemType::Int || right != SemType::Int {
            if left != SemType::Error && right != SemType::Error {
                self.error(node, message);
            }
        }
    }

    fn check_condition(&mut self, cond: &AstNode) {
        if cond.ty != SemType::Bool && cond.ty != SemType::Error {
            self.error(cond, "condition must be a boolean expression");
        }
    }

    fn check_relop(&mut self, node: &AstNode) {
        let left = node.lhs().ty;
        let right = node.rhs().ty;
        if left == SemType::Error || right == SemType::Error {
            return;
        }
        if !left.is_numeric() || !right.is_numeric() {
            self.error(node, "relational operator requires numeric operands");
        }
    }

    fn check_prlist(&mut self, node: &AstNode) {
        let mut cur = node;
        loop {
            let (item, rest) = if cur.kind == NodeKind::PrintList {
                (cur.lhs(), Some(cur.rhs()))
            } else {
                (cur, None)
            };
            match item.ty {
                SemType::Int | SemType::Real | SemType::Str | SemType::Error => {}
                _ => self.error(item, "only integers, reals or strings can be printed"),
            }
            match rest {
                Some(r) => cur = r,
                None => return,
            }
        }
    }

    /// Constant initialisers: literals, earlier numeric constants, and
    /// arithmetic over them only.
    fn const_scalar_expr(&self, node: &AstNode) -> bool {
        if node.left.is_none() && node.middle.is_none() && node.right.is_none() {
            return match node.kind {
                NodeKind::IntLit | NodeKind::RealLit => true,
                NodeKind::SimpleVar => {
                    let global = node.sym().at_global();
                    matches!(
                        self.table.attribute(global).map(|e| &e.attr),
                        Some(Attribute::Scalar(SemType::Int | SemType::Real))
                    )
                }
                _ => false,
            };
        }
        if !matches!(
            node.kind,
            NodeKind::Add
                | NodeKind::Sub
                | NodeKind::Mul
                | NodeKind::Div
                | NodeKind::Mod
                | NodeKind::Pow
        ) {
            return false;
        }
        [&node.left, &node.middle, &node.right]
            .into_iter()
            .flatten()
            .all(|c| self.const_scalar_expr(c))
    }

    /// Array sizes: integer literals, global integer constants, and
    /// arithmetic over them only.
    fn const_int_expr(&self, node: &AstNode) -> bool {
        if node.left.is_none() && node.middle.is_none() && node.right.is_none() {
            return match node.kind {
                NodeKind::IntLit => true,
                NodeKind::SimpleVar => {
                    let global = node.sym().at_global();
                    matches!(
                        self.table.attribute(global).map(|e| &e.attr),
                        Some(Attribute::Scalar(SemType::Int))
                    )
                }
                _ => false,
            };
        }
        if matches!(
            node.kind,
            NodeKind::FuncCall | NodeKind::FieldAccess | NodeKind::ArrayElem
        ) {
            return false;
        }
        [&node.left, &node.middle, &node.right]
            .into_iter()
            .flatten()
            .all(|c| self.const_int_expr(c))
    }
}

fn has_return(node: &AstNode) -> bool {
    if node.kind == NodeKind::Return {
        return true;
    }
    [&node.left, &node.middle, &node.right]
        .into_iter()
        .flatten()
        .any(|c| has_return(c))
}
