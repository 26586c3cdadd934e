//! Expression lowering: numeric and boolean resolution plus lvalue/address
//! computation.

use super::context::{ConstSlot, Gen};
use crate::ir::ast::{AstNode, NodeKind};
use crate::ir::symbols::{Attribute, SemType, Symbol};
use crate::ir::tac::{Adr, Line, Op};

impl Gen<'_> {
    /// Lower a numeric expression to an operand. Literals and simple
    /// variables become operands directly; each binary node emits one
    /// ternary line into a fresh temporary, inserting an `ITOF` on
    /// whichever child is still `integer` when the node itself is `real`.
    pub fn resolve_numeric(&mut self, node: &AstNode) -> Adr {
        let op = match node.kind {
            NodeKind::Add => {
                if node.ty == SemType::Int {
                    Op::AddI
                } else {
                    Op::AddF
                }
            }
            NodeKind::Sub => {
                if node.ty == SemType::Int {
                    Op::SubI
                } else {
                    Op::SubF
                }
            }
            NodeKind::Mul => {
                if node.ty == SemType::Int {
                    Op::MulI
                } else {
                    Op::MulF
                }
            }
            NodeKind::Div => {
                if node.ty == SemType::Int {
                    Op::DivI
                } else {
                    Op::DivF
                }
            }
            NodeKind::Mod => Op::Mod,
            NodeKind::Pow => Op::Pow,
            NodeKind::FuncCall => return self.gen_fncall(node),
            NodeKind::FieldAccess => {
                // the address computation leaves an address; read through it
                let adr = self.get_adr(node);
                let tmp = self.new_temp();
                self.emit(Line::binary(Op::Deref, tmp, adr, node.pos.row));
                return tmp;
            }
            _ => return self.get_adr(node),
        };

        let promote_left = node.ty == SemType::Real && node.lhs().ty == SemType::Int;
        let promote_right = node.ty == SemType::Real && node.rhs().ty == SemType::Int;

        let mut lhs = self.resolve_numeric(node.lhs());
        if promote_left {
            lhs = self.emit_itof(lhs, node.pos.row);
        }
        let mut rhs = self.resolve_numeric(node.rhs());
        if promote_right {
            rhs = self.emit_itof(rhs, node.pos.row);
        }
        let tmp = self.new_temp();
        self.emit(Line::ternary(op, tmp, lhs, rhs, node.pos.row));
        tmp
    }

    /// Integer or real comparison opcode for a relational node kind.
    fn relop_op(kind: NodeKind, real: bool) -> Op {
        match (kind, real) {
            (NodeKind::Greater, false) => Op::GtI,
            (NodeKind::Greater, true) => Op::GtF,
            (NodeKind::GreaterEq, false) => Op::GteI,
            (NodeKind::GreaterEq, true) => Op::GteF,
            (NodeKind::Less, false) => Op::LtI,
            (NodeKind::Less, true) => Op::LtF,
            (NodeKind::LessEq, false) => Op::LteI,
            (NodeKind::LessEq, true) => Op::LteF,
            (NodeKind::Eq, false) => Op::EqI,
            (NodeKind::Eq, true) => Op::EqF,
            (NodeKind::NotEq, false) => Op::NeqI,
            (NodeKind::NotEq, true) => Op::NeqF,
            (other, _) => unreachable!("relop lowering on {:?}", other),
        }
    }

    /// Both relational operands, promoted to `real` if either side is.
    fn relop_operands(&mut self, node: &AstNode) -> (Adr, Adr) {
        let promotion =
            node.lhs().ty == SemType::Real || node.rhs().ty == SemType::Real;
        let mut lhs = self.resolve_numeric(node.lhs());
        if promotion && node.lhs().ty == SemType::Int {
            lhs = self.emit_itof(lhs, node.pos.row);
        }
        let mut rhs = self.resolve_numeric(node.rhs());
        if promotion && node.rhs().ty == SemType::Int {
            rhs = self.emit_itof(rhs, node.pos.row);
        }
        (lhs, rhs)
    }

    pub fn resolve_boolean(&mut self, node: &AstNode) -> Adr {
        match node.kind {
            NodeKind::False => {
                let tmp = self.new_temp();
                self.emit(Line::unary(Op::False, tmp, node.pos.row));
                tmp
            }
            NodeKind::True => {
                let tmp = self.new_temp();
                self.emit(Line::unary(Op::True, tmp, node.pos.row));
                tmp
            }
            NodeKind::SimpleVar => self.get_adr(node),
            NodeKind::FieldAccess => {
                let adr = self.get_adr(node);
                let tmp = self.new_temp();
                self.emit(Line::binary(Op::Deref, tmp, adr, node.pos.row));
                tmp
            }
            NodeKind::NotRel => {
                // `not a <relop> b`: compute the relation, then negate it
                let (lhs, rhs) = self.relop_operands(node);
                let real =
                    node.lhs().ty == SemType::Real || node.rhs().ty == SemType::Real;
                let op = Self::relop_op(node.mid().kind, real);
                let tmp = self.new_temp();
                self.emit(Line::ternary(op, tmp, lhs, rhs, node.pos.row));
                let negated = self.new_temp();
                self.emit(Line::binary(Op::Not, negated, tmp, node.pos.row));
                negated
            }
            NodeKind::BoolOp => {
                let lhs = self.resolve_boolean(node.lhs());
                let rhs = self.resolve_boolean(node.rhs());
                let op = match node.mid().kind {
                    NodeKind::And => Op::And,
                    NodeKind::Or => Op::Or,
                    NodeKind::Xor => Op::Xor,
                    other => unreachable!("boolean combinator lowering on {:?}", other),
                };
                let tmp = self.new_temp();
                self.emit(Line::ternary(op, tmp, lhs, rhs, node.pos.row));
                tmp
            }
            NodeKind::Eq
            | NodeKind::NotEq
            | NodeKind::Greater
            | NodeKind::Less
            | NodeKind::LessEq
            | NodeKind::GreaterEq => {
                let (lhs, rhs) = self.relop_operands(node);
                let real =
                    node.lhs().ty == SemType::Real || node.rhs().ty == SemType::Real;
                let op = Self::relop_op(node.kind, real);
                let tmp = self.new_temp();
                self.emit(Line::ternary(op, tmp, lhs, rhs, node.pos.row));
                tmp
            }
            NodeKind::FuncCall => self.gen_fncall(node),
            other => unreachable!("boolean lowering on {:?}", other),
        }
    }

    /// Dispatch on the resolved type of an expression node.
    pub fn resolve_expr(&mut self, node: &AstNode) -> Adr {
        match node.ty {
            SemType::Bool => self.resolve_boolean(node),
            SemType::Int | SemType::Real => self.resolve_numeric(node),
            SemType::Array => self.get_adr(node),
            other => unreachable!("expression lowering on type {:?}", other),
        }
    }

    /// Resolve a name or element access to an operand. Simple variables map
    /// straight to their slot; folded constants map to their pool slot;
    /// element accesses compute `base + index*stride (+ field offset)` and
    /// yield an *address* the caller must `DEREF`/`STORE` through.
    pub fn get_adr(&mut self, node: &AstNode) -> Adr {
        match node.kind {
            NodeKind::SimpleVar => {
                let sym = node.sym();
                if let Some(&slot) = self.consts.get(&sym.lexeme) {
                    return match slot {
                        ConstSlot::Int(idx) => Adr::IntLit(idx),
                        ConstSlot::Real(idx) => Adr::FloatLit(idx),
                    };
                }
                let offset = self.table.offset(sym);
                if self.table.is_param(sym) {
                    Adr::Param(offset)
                } else if node.ty == SemType::Array {
                    Adr::ArrayBase(offset)
                } else {
                    Adr::Var(offset)
                }
            }
            NodeKind::IntLit => {
                let val = self.sym_int(node.sym());
                self.adr_of_int(val)
            }
            NodeKind::RealLit => {
                let val = self.sym_float(node.sym());
                self.adr_of_float(val)
            }
            NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Div
            | NodeKind::Mod
            | NodeKind::Pow => self.resolve_numeric(node),
            NodeKind::True
            | NodeKind::False
            | NodeKind::BoolOp
            | NodeKind::NotRel
            | NodeKind::Eq
            | NodeKind::NotEq
            | NodeKind::Greater
            | NodeKind::Less
            | NodeKind::LessEq
            | NodeKind::GreaterEq => self.resolve_boolean(node),
            NodeKind::ArrayElem => {
                let (base, stride) = self.array_access_base(node.lhs());
                let index = self.resolve_numeric(node.rhs());
                let stride_adr = self.adr_of_int(stride as i64);
                let scaled = self.new_temp();
                self.emit(Line::ternary(
                    Op::MulI,
                    scaled,
                    index,
                    stride_adr,
                    node.pos.row,
                ));
                let addr = self.new_temp();
                self.emit(Line::ternary(Op::AddI, addr, base, scaled, node.pos.row));
                addr
            }
            NodeKind::FieldAccess => {
                let (base, stride) = self.array_access_base(node.lhs());
                let index = self.resolve_numeric(node.rhs());
                let stride_adr = self.adr_of_int(stride as i64);
                let scaled = self.new_temp();
                self.emit(Line::ternary(
                    Op::MulI,
                    scaled,
                    index,
                    stride_adr,
                    node.pos.row,
                ));
                let elem_addr = self.new_temp();
                self.emit(Line::ternary(
                    Op::AddI,
                    elem_addr,
                    base,
                    scaled,
                    node.pos.row,
                ));
                let field_off = self.field_offset(node.lhs().sym(), node.sym());
                let off_adr = self.adr_of_int(field_off as i64);
                let addr = self.new_temp();
                self.emit(Line::ternary(
                    Op::AddI,
                    addr,
                    elem_addr,
                    off_adr,
                    node.pos.row,
                ));
                addr
            }
            NodeKind::FuncCall => self.gen_fncall(node),
            other => unreachable!("address resolution on {:?}", other),
        }
    }

    /// Base operand and element stride for an access through `arr_var`.
    fn array_access_base(&mut self, arr_var: &AstNode) -> (Adr, u32) {
        let sym = arr_var.sym();
        let (elem, is_param) = {
            let entry = self
                .table
                .attribute(sym)
                .expect("array access through unregistered symbol");
            let Attribute::Array { elem } = &entry.attr else {
                unreachable!("array access through a non-array attribute")
            };
            (*elem, entry.is_param)
        };
        let offset = self.table.offset(sym);
        let base = if is_param {
            Adr::Param(offset)
        } else {
            Adr::ArrayBase(offset)
        };
        let stride = *self
            .array_stride
            .get(&elem.lexeme)
            .expect("array type without a recorded stride");
        (base, stride)
    }

    /// Byte offset of `field` inside the struct behind `arr_sym`, found by a
    /// linear scan matching names by unscoped equality.
    fn field_offset(&self, arr_sym: Symbol, field: Symbol) -> u32 {
        let Some(Attribute::Array { elem }) =
            self.table.attribute(arr_sym).map(|e| &e.attr)
        else {
            unreachable!("field access through a non-array attribute")
        };
        let Some(Attribute::Struct { fields }) =
            self.table.attribute(*elem).map(|e| &e.attr)
        else {
            unreachable!("array type without a struct attribute")
        };
        let Some(Attribute::Fields(elements)) =
            self.table.attribute(*fields).map(|e| &e.attr)
        else {
            unreachable!("struct type without a field list")
        };
        let position = elements
            .iter()
            .position(|e| e.name.same_name(field))
            .expect("field vanished between resolution and emission");
        (position as u32) * 8
    }
}
