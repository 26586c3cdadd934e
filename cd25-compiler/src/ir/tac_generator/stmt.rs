//! Statement and program-structure lowering: globals, functions, control
//! flow, assignment and I/O.

use super::context::{ConstSlot, Gen};
use crate::ir::ast::{AstNode, NodeKind};
use crate::ir::symbols::{Attribute, SemType};
use crate::ir::tac::{Adr, Line, Op};

/// Flatten a right-nested list into its items. Handles both chain shapes:
/// bare chains (the last item is not a chain node) and wrapped chains (every
/// element is wrapped, the last with no tail).
fn chain_items<'n>(kind: NodeKind, node: &'n AstNode) -> Vec<&'n AstNode> {
    let mut out = Vec::new();
    let mut cur = node;
    loop {
        if cur.kind == kind {
            out.push(cur.lhs());
            match cur.right.as_deref() {
                Some(rest) => cur = rest,
                None => return out,
            }
        } else {
            out.push(cur);
            return out;
        }
    }
}

fn ends_with_return(stats: &AstNode) -> bool {
    chain_items(NodeKind::StatList, stats)
        .last()
        .map(|s| s.kind == NodeKind::Return)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
enum ConstValue {
    Int(i64),
    Real(f64),
}

impl Gen<'_> {
    pub fn lower_program(&mut self, root: &AstNode) {
        if let Some(globals) = root.left.as_deref() {
            self.gen_globals(globals);
        }
        if let Some(funcs) = root.middle.as_deref() {
            for func in chain_items(NodeKind::Funcs, funcs) {
                self.gen_func(func);
            }
        }
        self.reset_locals();
        let main_name = self.adr_of_str("main");
        self.emit(Line::unary(Op::Func, main_name, 0));
        self.gen_main(root.rhs());
        log::debug!(
            "lowered {} lines, pools: {} ints, {} floats, {} strings, {} arrays",
            self.out.lines.len(),
            self.out.ints.len(),
            self.out.floats.len(),
            self.out.strings.len(),
            self.out.arrays.len()
        );
    }

    // ── Globals: constants, array types, array declarations ─────────────

    fn gen_globals(&mut self, node: &AstNode) {
        if let Some(consts) = node.left.as_deref() {
            for item in chain_items(NodeKind::ConstList, consts) {
                self.gen_const(item);
            }
        }
        if let Some(types) = node.middle.as_deref() {
            for item in chain_items(NodeKind::TypeList, types) {
                if item.kind == NodeKind::ArrayType {
                    self.gen_arrtype(item);
                }
            }
        }
        if let Some(arrays) = node.right.as_deref() {
            for item in chain_items(NodeKind::ArrayDeclList, arrays) {
                self.gen_array(item);
            }
        }
    }

    /// Fold a constant initialiser into the int or float pool.
    fn gen_const(&mut self, node: &AstNode) {
        let slot = match self.const_value(node.lhs()) {
            ConstValue::Int(v) => {
                let Adr::IntLit(idx) = self.adr_of_int(v) else {
                    unreachable!()
                };
                ConstSlot::Int(idx)
            }
            ConstValue::Real(v) => {
                let Adr::FloatLit(idx) = self.adr_of_float(v) else {
                    unreachable!()
                };
                ConstSlot::Real(idx)
            }
        };
        self.consts.insert(node.sym().lexeme, slot);
    }

    /// Evaluate a compile-time expression over literals and earlier
    /// constants. Semantic analysis has already rejected anything else.
    fn const_value(&self, node: &AstNode) -> ConstValue {
        match node.kind {
            NodeKind::IntLit => ConstValue::Int(self.sym_int(node.sym())),
            NodeKind::RealLit => ConstValue::Real(self.sym_float(node.sym())),
            NodeKind::SimpleVar => match self.consts.get(&node.sym().lexeme) {
                Some(ConstSlot::Int(idx)) => ConstValue::Int(self.out.ints[*idx as usize]),
                Some(ConstSlot::Real(idx)) => {
                    ConstValue::Real(self.out.floats[*idx as usize])
                }
                None => unreachable!("constant initialiser references a non-constant"),
            },
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div
            | NodeKind::Mod | NodeKind::Pow => {
                let left = self.const_value(node.lhs());
                let right = self.const_value(node.rhs());
                fold_const(node.kind, left, right)
            }
            other => unreachable!("constant evaluation on {:?}", other),
        }
    }

    /// Record the stride and total byte length of an array type. The stride
    /// is the element struct's field count times 8 bytes.
    fn gen_arrtype(&mut self, node: &AstNode) {
        let type_sym = node.sym();
        let field_count = {
            let Some(Attribute::Struct { fields }) =
                self.table.attribute(type_sym).map(|e| &e.attr)
            else {
                unreachable!("array type without a struct attribute")
            };
            let Some(Attribute::Fields(elements)) =
                self.table.attribute(*fields).map(|e| &e.attr)
            else {
                unreachable!("struct type without a field list")
            };
            elements.len() as u32
        };
        let stride = 8 * field_count;
        let count = match self.const_value(node.lhs()) {
            ConstValue::Int(v) => v.max(0) as u32,
            ConstValue::Real(_) => unreachable!("array size folded to a real"),
        };
        self.array_stride.insert(type_sym.lexeme, stride);
        self.array_len.insert(type_sym.lexeme, stride * count);
    }

    /// Allocate a global array's base slot and record its byte length in
    /// the array pool.
    fn gen_array(&mut self, node: &AstNode) {
        let sym = node.sym();
        let base = self.next_array_base();
        self.table.set_offset(sym, base);
        let elem = {
            let Some(Attribute::Array { elem }) =
                self.table.attribute(sym).map(|e| &e.attr)
            else {
                unreachable!("array declaration without an array attribute")
            };
            *elem
        };
        let len = *self
            .array_len
            .get(&elem.lexeme)
            .expect("array declared with an unsized type");
        self.out.arrays.push(len);
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn gen_func(&mut self, node: &AstNode) {
        self.reset_locals();
        let name = self.text(node.sym());
        log::debug!("lowering function '{}'", name);
        let fname = self.adr_of_str(&name);
        self.emit(Line::unary(Op::Func, fname, 0));
        if let Some(plist) = node.left.as_deref() {
            self.gen_plist(plist);
        }
        if let Some(locals) = node.middle.as_deref() {
            self.gen_decls(NodeKind::DeclList, locals);
        }
        self.gen_stats(node.rhs());
        if !ends_with_return(node.rhs()) {
            self.emit(Line::nonary(Op::Retn, 0));
        }
    }

    /// Parameters form their own contiguous zero-based slot range.
    fn gen_plist(&mut self, plist: &AstNode) {
        let mut slot = 0u16;
        for item in chain_items(NodeKind::ParamList, plist) {
            let leaf = if item.kind == NodeKind::ConstArrayParam {
                item.lhs()
            } else {
                item
            };
            let sym = leaf.sym();
            self.table.set_offset(sym, slot);
            self.table.mark_param(sym);
            slot += 1;
        }
    }

    /// Declared variables: assign slots, then zero-initialise each one.
    fn gen_decls(&mut self, chain: NodeKind, node: &AstNode) {
        let items = chain_items(chain, node);
        let mut decls = Vec::with_capacity(items.len());
        for (slot, item) in items.iter().enumerate() {
            self.table.set_offset(item.sym(), slot as u16);
            decls.push((slot as u16, item.ty));
        }
        for (slot, ty) in decls {
            match ty {
                SemType::Int => {
                    let zero = self.adr_of_int(0);
                    self.emit(Line::binary(Op::Asign, Adr::Var(slot), zero, 0));
                }
                SemType::Real => {
                    let zero = self.adr_of_float(0.0);
                    self.emit(Line::binary(Op::Asign, Adr::Var(slot), zero, 0));
                }
                SemType::Bool => {
                    self.emit(Line::unary(Op::False, Adr::Var(slot), 0));
                }
                other => unreachable!("zero-initialisation of {:?}", other),
            }
        }
    }

    fn gen_main(&mut self, node: &AstNode) {
        self.gen_decls(NodeKind::MainDeclList, node.lhs());
        self.gen_stats(node.rhs());
    }

    // ── Statements ───────────────────────────────────────────────────────

    pub fn gen_stats(&mut self, node: &AstNode) {
        for stat in chain_items(NodeKind::StatList, node) {
            self.gen_stat(stat);
        }
    }

    fn gen_stat(&mut self, node: &AstNode) {
        match node.kind {
            NodeKind::Output => self.gen_output(node),
            NodeKind::OutputLine => self.gen_output_line(node),
            NodeKind::Input => self.gen_input(node),
            NodeKind::IfThen => self.gen_if(node),
            NodeKind::IfElse => self.gen_ifelse(node),
            NodeKind::Repeat => self.gen_repeat(node),
            NodeKind::For => self.gen_for(node),
            NodeKind::Assign => self.gen_assign(node),
            NodeKind::AddAssign
            | NodeKind::SubAssign
            | NodeKind::MulAssign
            | NodeKind::DivAssign => self.gen_assign_op(node),
            NodeKind::Call => self.gen_callstat(node),
            NodeKind::Return => self.gen_return(node),
            other => unreachable!("statement lowering on {:?}", other),
        }
    }

    fn gen_assign(&mut self, node: &AstNode) {
        let lhs = self.get_adr(node.lhs());
        match node.rhs().ty {
            SemType::Int | SemType::Real => {
                let rhs = self.resolve_numeric(node.rhs());
                self.emit_write(node, lhs, rhs);
            }
            SemType::Bool => {
                let rhs = self.resolve_boolean(node.rhs());
                self.emit_write(node, lhs, rhs);
            }
            SemType::Array => {
                // whole-array copy, unrolled: length is statically known
                let rhs = self.get_adr(node.rhs());
                let bytes = self.array_bytes(node.lhs());
                self.copy_block(lhs, rhs, bytes, node.pos.row);
            }
            SemType::Struct => {
                // whole-element copy, one word per field
                let rhs = self.get_adr(node.rhs());
                let stride = self.elem_stride(node.lhs());
                self.copy_block(lhs, rhs, stride, node.pos.row);
            }
            other => unreachable!("assignment lowering on type {:?}", other),
        }
    }

    /// Scalar write: a plain slot takes `ASIGN`, a computed element address
    /// takes `STORE`.
    fn emit_write(&mut self, node: &AstNode, lhs: Adr, rhs: Adr) {
        if node.lhs().kind == NodeKind::FieldAccess {
            self.emit(Line::binary(Op::Store, lhs, rhs, node.pos.row));
        } else {
            self.emit(Line::binary(Op::Asign, lhs, rhs, node.pos.row));
        }
    }

    /// Total byte length of the array behind an array-typed variable.
    fn array_bytes(&self, var: &AstNode) -> u32 {
        let Some(Attribute::Array { elem }) =
            self.table.attribute(var.sym()).map(|e| &e.attr)
        else {
            unreachable!("array copy through a non-array attribute")
        };
        *self
            .array_len
            .get(&elem.lexeme)
            .expect("array type without a recorded length")
    }

    /// Element stride of the array behind an `arr[i]` node.
    fn elem_stride(&self, elem_node: &AstNode) -> u32 {
        let Some(Attribute::Array { elem }) = self
            .table
            .attribute(elem_node.lhs().sym())
            .map(|e| &e.attr)
        else {
            unreachable!("struct copy through a non-array attribute")
        };
        *self
            .array_stride
            .get(&elem.lexeme)
            .expect("array type without a recorded stride")
    }

    fn copy_block(&mut self, dst: Adr, src: Adr, bytes: u32, row: u32) {
        let mut off = 0;
        while off < bytes {
            let off_adr = self.adr_of_int(off as i64);
            let d = self.new_temp();
            self.emit(Line::ternary(Op::AddI, d, dst, off_adr, row));
            let s = self.new_temp();
            self.emit(Line::ternary(Op::AddI, s, src, off_adr, row));
            let word = self.new_temp();
            self.emit(Line::binary(Op::Deref, word, s, row));
            self.emit(Line::binary(Op::Store, d, word, row));
            off += 8;
        }
    }

    fn gen_assign_op(&mut self, node: &AstNode) {
        let lhs = self.get_adr(node.lhs());
        let mut rhs = self.resolve_numeric(node.rhs());
        let int = node.lhs().ty == SemType::Int;
        let op = match node.kind {
            NodeKind::AddAssign => {
                if int {
                    Op::AddI
                } else {
                    Op::AddF
                }
            }
            NodeKind::SubAssign => {
                if int {
                    Op::SubI
                } else {
                    Op::SubF
                }
            }
            NodeKind::MulAssign => {
                if int {
                    Op::MulI
                } else {
                    Op::MulF
                }
            }
            NodeKind::DivAssign => {
                if int {
                    Op::DivI
                } else {
                    Op::DivF
                }
            }
            other => unreachable!("compound assignment lowering on {:?}", other),
        };
        if node.lhs().ty == SemType::Real && node.rhs().ty == SemType::Int {
            rhs = self.emit_itof(rhs, node.pos.row);
        }
        if node.lhs().kind == NodeKind::FieldAccess {
            let current = self.new_temp();
            self.emit(Line::binary(Op::Deref, current, lhs, node.pos.row));
            let result = self.new_temp();
            self.emit(Line::ternary(op, result, current, rhs, node.pos.row));
            self.emit(Line::binary(Op::Store, lhs, result, node.pos.row));
        } else {
            self.emit(Line::ternary(op, lhs, lhs, rhs, node.pos.row));
        }
    }

    // ── Control flow ─────────────────────────────────────────────────────

    fn gen_if(&mut self, node: &AstNode) {
        let end = self.new_label();
        let cond = self.resolve_boolean(node.lhs());
        self.emit(Line::binary(Op::GotoF, end, cond, 0));
        self.gen_stats(node.rhs());
        self.emit(Line::unary(Op::Label, end, 0));
    }

    fn gen_ifelse(&mut self, node: &AstNode) {
        let end = self.new_label();
        let else_label = self.new_label();
        let cond = self.resolve_boolean(node.lhs());
        self.emit(Line::binary(Op::GotoF, else_label, cond, 0));
        self.gen_stats(node.mid());
        self.emit(Line::unary(Op::Goto, end, 0));
        self.emit(Line::unary(Op::Label, else_label, 0));
        self.gen_stats(node.rhs());
        self.emit(Line::unary(Op::Label, end, 0));
    }

    fn gen_for(&mut self, node: &AstNode) {
        if let Some(init) = node.left.as_deref() {
            self.gen_asgnlist(init);
        }
        let start = self.new_label();
        let end = self.new_label();
        self.emit(Line::unary(Op::Label, start, 0));
        let cond = self.resolve_boolean(node.mid());
        self.emit(Line::binary(Op::GotoF, end, cond, 0));
        self.gen_stats(node.rhs());
        self.emit(Line::unary(Op::Goto, start, 0));
        self.emit(Line::unary(Op::Label, end, 0));
    }

    /// `repeat ... until`: branch back while the condition is false.
    fn gen_repeat(&mut self, node: &AstNode) {
        if let Some(init) = node.left.as_deref() {
            self.gen_asgnlist(init);
        }
        let start = self.new_label();
        self.emit(Line::unary(Op::Label, start, 0));
        self.gen_stats(node.mid());
        let cond = self.resolve_boolean(node.rhs());
        self.emit(Line::binary(Op::GotoF, start, cond, 0));
    }

    fn gen_asgnlist(&mut self, node: &AstNode) {
        for item in chain_items(NodeKind::AssignList, node) {
            self.gen_stat(item);
        }
    }

    // ── I/O ──────────────────────────────────────────────────────────────

    fn gen_input(&mut self, node: &AstNode) {
        for var in chain_items(NodeKind::VarList, node.lhs()) {
            let adr = self.get_adr(var);
            let op = if var.ty == SemType::Real {
                Op::ReadF
            } else {
                Op::ReadI
            };
            if var.kind == NodeKind::FieldAccess {
                let tmp = self.new_temp();
                self.emit(Line::unary(op, tmp, var.pos.row));
                self.emit(Line::binary(Op::Store, adr, tmp, var.pos.row));
            } else {
                self.emit(Line::unary(op, adr, var.pos.row));
            }
        }
    }

    fn gen_output(&mut self, node: &AstNode) {
        for item in chain_items(NodeKind::PrintList, node.lhs()) {
            self.gen_printitem(item);
        }
    }

    fn gen_output_line(&mut self, node: &AstNode) {
        if let Some(prlist) = node.left.as_deref() {
            for item in chain_items(NodeKind::PrintList, prlist) {
                self.gen_printitem(item);
            }
        }
        self.emit(Line::nonary(Op::PrintLn, node.pos.row));
    }

    fn gen_printitem(&mut self, item: &AstNode) {
        if item.kind == NodeKind::StringLit {
            let text = self.text(item.sym());
            let adr = self.adr_of_str(&text);
            self.emit(Line::unary(Op::PrintStr, adr, item.pos.row));
            return;
        }
        self.emit(Line::nonary(Op::PrintSpc, item.pos.row));
        let mut value = self.get_adr(item);
        if item.kind == NodeKind::FieldAccess {
            let tmp = self.new_temp();
            self.emit(Line::binary(Op::Deref, tmp, value, item.pos.row));
            value = tmp;
        }
        let op = if item.ty == SemType::Int {
            Op::PrintI
        } else {
            Op::PrintF
        };
        self.emit(Line::unary(op, value, item.pos.row));
    }

    // ── Calls and returns ────────────────────────────────────────────────

    /// Emit `PARAM` lines in left-to-right source order; a backend maps each
    /// one to a register by looking ahead to the matching call.
    fn gen_parameters(&mut self, elist: Option<&AstNode>) -> i64 {
        let mut count = 0;
        let Some(elist) = elist else { return 0 };
        for arg in chain_items(NodeKind::ExprList, elist) {
            let value = self.resolve_expr(arg);
            self.emit(Line::unary(Op::Param, value, arg.pos.row));
            count += 1;
        }
        count
    }

    fn gen_callstat(&mut self, node: &AstNode) {
        let count = self.gen_parameters(node.left.as_deref());
        let pcount = self.adr_of_int(count);
        let name = self.text(node.sym());
        let fname = self.adr_of_str(&name);
        self.emit(Line::binary(Op::Call, fname, pcount, node.pos.row));
    }

    pub(super) fn gen_fncall(&mut self, node: &AstNode) -> Adr {
        let count = self.gen_parameters(node.left.as_deref());
        let pcount = self.adr_of_int(count);
        let name = self.text(node.sym());
        let fname = self.adr_of_str(&name);
        let tmp = self.new_temp();
        self.emit(Line::ternary(Op::CallVal, tmp, fname, pcount, node.pos.row));
        tmp
    }

    fn gen_return(&mut self, node: &AstNode) {
        if let Some(value) = node.left.as_deref() {
            let adr = self.resolve_expr(value);
            self.emit(Line::unary(Op::RVal, adr, node.pos.row));
        } else {
            self.emit(Line::nonary(Op::Retn, node.pos.row));
        }
    }
}

fn fold_const(kind: NodeKind, left: ConstValue, right: ConstValue) -> ConstValue {
    use ConstValue::{Int, Real};
    match (left, right) {
        (Int(a), Int(b)) => match kind {
            NodeKind::Add => Int(a.wrapping_add(b)),
            NodeKind::Sub => Int(a.wrapping_sub(b)),
            NodeKind::Mul => Int(a.wrapping_mul(b)),
            NodeKind::Div => Int(a.checked_div(b).unwrap_or(0)),
            NodeKind::Mod => Int(a.checked_rem(b).unwrap_or(0)),
            NodeKind::Pow => Int(a.checked_pow(b.clamp(0, u32::MAX as i64) as u32).unwrap_or(0)),
            other => unreachable!("constant folding on {:?}", other),
        },
        (l, r) => {
            let a = match l {
                Int(v) => v as f64,
                Real(v) => v,
            };
            let b = match r {
                Int(v) => v as f64,
                Real(v) => v,
            };
            match kind {
                NodeKind::Add => Real(a + b),
                NodeKind::Sub => Real(a - b),
                NodeKind::Mul => Real(a * b),
                NodeKind::Div => Real(a / b),
                other => unreachable!("constant folding on {:?}", other),
            }
        }
    }
}
