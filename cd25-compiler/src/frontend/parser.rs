//! Recursive-descent parser for CD25.
//!
//! Follows the language's productions one function per nonterminal. On a
//! syntax error the current production records one diagnostic and bails;
//! statement lists then synchronise on `;` / `end` / section keywords and
//! keep parsing, so one bad statement does not hide the rest of the file.
//!
//! While parsing, identifiers are interned into the symbol table and
//! declarations register their attributes; the at-most-once registration
//! contract is what detects same-scope redefinitions.

use std::mem::discriminant;

use crate::diag::Lister;
use crate::frontend::lexer::{self, Pos, Token};
use crate::ir::ast::{Ast, AstNode, NodeKind};
use crate::ir::symbols::{Attribute, Element, Scope, SemType, SymbolTable};

pub fn parse(source: &str, lister: &mut Lister) -> Ast {
    let tokens = lexer::lex(source, lister);
    let mut parser = Parser {
        tokens,
        pos: 0,
        table: SymbolTable::new(),
        lister,
        scope: Scope::GLOBAL,
        valid: true,
    };
    let root = parser.program();
    let is_valid = parser.valid && root.is_some() && !parser.lister.has_errors();
    Ast {
        root,
        table: parser.table,
        is_valid,
    }
}

struct Parser<'a> {
    tokens: Vec<(Token, Pos)>,
    pos: usize,
    table: SymbolTable,
    lister: &'a mut Lister,
    scope: Scope,
    valid: bool,
}

impl<'a> Parser<'a> {
    // ── Token plumbing ───────────────────────────────────────────────────

    fn cur(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn cur_pos(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or_default()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at(&self, token: &Token) -> bool {
        self.cur()
            .map(|t| discriminant(t) == discriminant(token))
            .unwrap_or(false)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: String) {
        let pos = self.cur_pos();
        self.lister.syn_error(pos.row, pos.col, message);
        self.valid = false;
    }

    fn expect(&mut self, token: Token) -> Option<()> {
        if self.at(&token) {
            self.bump();
            Some(())
        } else {
            let saw = match self.cur() {
                Some(t) => t.to_string(),
                None => "end of file".to_string(),
            };
            self.error(format!("expected to see {}, but saw {}", token, saw));
            None
        }
    }

    fn expect_ident(&mut self) -> Option<(String, Pos)> {
        let pos = self.cur_pos();
        match self.cur() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.bump();
                Some((name, pos))
            }
            other => {
                let saw = match other {
                    Some(t) => t.to_string(),
                    None => "end of file".to_string(),
                };
                self.error(format!("expected an identifier, but saw {}", saw));
                None
            }
        }
    }

    fn redefinition_error(&mut self, pos: Pos, name: &str) {
        self.lister.sem_error(
            pos.row,
            pos.col,
            format!("redefinition of '{}' within the same scope", name),
        );
        self.valid = false;
    }

    // ── List shapes ──────────────────────────────────────────────────────

    /// Right-nest `items` so the chain node appears only between elements
    /// (a single item stays bare).
    fn chain(kind: NodeKind, mut items: Vec<AstNode>) -> AstNode {
        let mut node = items.pop().expect("chain of zero items");
        while let Some(prev) = items.pop() {
            let mut list = AstNode::new(kind, prev.pos);
            list.set_left(prev);
            list.set_right(node);
            node = list;
        }
        node
    }

    /// Right-nest `items` wrapping every element, the last with no tail.
    fn wrapped_chain(kind: NodeKind, mut items: Vec<AstNode>) -> AstNode {
        let last = items.pop().expect("chain of zero items");
        let mut node = AstNode::new(kind, last.pos);
        node.set_left(last);
        while let Some(prev) = items.pop() {
            let mut list = AstNode::new(kind, prev.pos);
            list.set_left(prev);
            list.set_right(node);
            node = list;
        }
        node
    }

    // ── Program structure ────────────────────────────────────────────────

    fn program(&mut self) -> Option<AstNode> {
        self.expect(Token::Cd25)?;
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, Scope::GLOBAL);
        let mut prog = AstNode::with_symbol(NodeKind::Program, pos, sym);
        if matches!(
            self.cur(),
            Some(Token::Constants | Token::Types | Token::Arrays)
        ) {
            prog.set_left(self.globals()?);
        }
        if self.at(&Token::Func) {
            prog.set_middle(self.funcs()?);
        }
        prog.set_right(self.mainbody()?);
        if self.cur().is_some() {
            let saw = self.cur().unwrap().to_string();
            self.error(format!("expected end of file, but saw {}", saw));
        }
        Some(prog)
    }

    fn globals(&mut self) -> Option<AstNode> {
        let mut globs = AstNode::new(NodeKind::Globals, self.cur_pos());
        if self.eat(&Token::Constants) {
            globs.set_left(self.initlist()?);
        }
        if self.eat(&Token::Types) {
            globs.set_middle(self.typelist()?);
        }
        if self.eat(&Token::Arrays) {
            globs.set_right(self.arrdecls()?);
        }
        Some(globs)
    }

    fn initlist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.init()?];
        while self.eat(&Token::Comma) {
            items.push(self.init()?);
        }
        Some(Self::chain(NodeKind::ConstList, items))
    }

    fn init(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        let mut node = AstNode::with_symbol(NodeKind::ConstInit, pos, sym);
        self.expect(Token::Is)?;
        node.set_left(self.expr()?);
        // the attribute is registered during type resolution, once the
        // initialiser's type is known
        Some(node)
    }

    fn typelist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.type_decl()?];
        while matches!(self.cur(), Some(Token::Ident(_))) {
            items.push(self.type_decl()?);
        }
        Some(Self::chain(NodeKind::TypeList, items))
    }

    fn type_decl(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let name_sym = self.table.intern(&name, Scope::GLOBAL);
        self.expect(Token::Is)?;
        if self.at(&Token::Array) {
            // <name> is array [ <expr> ] of <structtype> end
            self.bump();
            let mut node = AstNode::with_symbol(NodeKind::ArrayType, pos, name_sym);
            self.expect(Token::LBracket)?;
            node.set_left(self.expr()?);
            self.expect(Token::RBracket)?;
            self.expect(Token::Of)?;
            let (elem, elem_pos) = self.expect_ident()?;
            let elem_sym = self.table.intern(&elem, Scope::GLOBAL);
            if self
                .table
                .add_attribute(name_sym, Attribute::Struct { fields: elem_sym })
                .is_err()
            {
                self.redefinition_error(elem_pos, &name);
            }
            self.expect(Token::End)?;
            Some(node)
        } else {
            // <name> is <field> , ... end
            let mut node = AstNode::with_symbol(NodeKind::StructType, pos, name_sym);
            let fields = self.fields()?;
            let elements = self.collect_fields(&fields);
            if self
                .table
                .add_attribute(name_sym, Attribute::Fields(elements))
                .is_err()
            {
                self.redefinition_error(pos, &name);
            }
            node.set_left(fields);
            self.expect(Token::End)?;
            Some(node)
        }
    }

    fn fields(&mut self) -> Option<AstNode> {
        let mut items = vec![self.sdecl()?];
        while self.eat(&Token::Comma) {
            items.push(self.sdecl()?);
        }
        Some(Self::chain(NodeKind::FieldList, items))
    }

    fn collect_fields(&self, node: &AstNode) -> Vec<Element> {
        let mut out = Vec::new();
        let mut cur = node;
        loop {
            if cur.kind == NodeKind::FieldList {
                let field = cur.lhs();
                out.push(Element {
                    name: field.sym(),
                    ty: field.ty,
                });
                cur = cur.rhs();
            } else {
                out.push(Element {
                    name: cur.sym(),
                    ty: cur.ty,
                });
                return out;
            }
        }
    }

    /// `<name> : integer|real|boolean` — struct fields (global scope, no
    /// registration) and main-body declarations (registered).
    fn sdecl(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        self.expect(Token::Colon)?;
        let ty = self.scalar_type()?;
        if !self.scope.is_global() && self.table.add_attribute(sym, Attribute::Scalar(ty)).is_err()
        {
            self.redefinition_error(pos, &name);
        }
        let mut node = AstNode::with_symbol(NodeKind::SimpleDecl, pos, sym);
        node.ty = ty;
        Some(node)
    }

    fn scalar_type(&mut self) -> Option<SemType> {
        let ty = match self.cur() {
            Some(Token::Integer) => SemType::Int,
            Some(Token::Real) => SemType::Real,
            Some(Token::Boolean) => SemType::Bool,
            _ => {
                self.error("expected integer, real or boolean".to_string());
                return None;
            }
        };
        self.bump();
        Some(ty)
    }

    fn arrdecls(&mut self) -> Option<AstNode> {
        let mut items = vec![self.arrdecl()?];
        while self.eat(&Token::Comma) {
            items.push(self.arrdecl()?);
        }
        Some(Self::chain(NodeKind::ArrayDeclList, items))
    }

    /// `<name> : <typeid>` — a global array, or a `const` array parameter.
    fn arrdecl(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let var_sym = self.table.intern(&name, self.scope);
        self.expect(Token::Colon)?;
        let (type_name, _) = self.expect_ident()?;
        let type_sym = self.table.intern(&type_name, Scope::GLOBAL);
        if self
            .table
            .add_attribute(var_sym, Attribute::Array { elem: type_sym })
            .is_err()
        {
            self.redefinition_error(pos, &name);
        }
        let mut node = AstNode::with_symbol(NodeKind::ArrayDecl, pos, var_sym);
        node.ty = SemType::Array;
        Some(node)
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn funcs(&mut self) -> Option<AstNode> {
        let mut items = Vec::new();
        while self.at(&Token::Func) {
            items.push(self.func()?);
        }
        Some(Self::wrapped_chain(NodeKind::Funcs, items))
    }

    fn func(&mut self) -> Option<AstNode> {
        self.scope = Scope(self.scope.0 + 1);
        let pos = self.cur_pos();
        self.expect(Token::Func)?;
        let (name, name_pos) = self.expect_ident()?;
        // functions live in the global scope
        let fsym = self.table.intern(&name, Scope::GLOBAL);
        let mut node = AstNode::with_symbol(NodeKind::FuncDecl, pos, fsym);
        self.expect(Token::LParen)?;
        if !self.at(&Token::RParen) {
            node.set_left(self.params()?);
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Colon)?;
        let ret = match self.cur() {
            Some(Token::Integer) => SemType::Int,
            Some(Token::Real) => SemType::Real,
            Some(Token::Boolean) => SemType::Bool,
            Some(Token::Void) => SemType::Void,
            _ => {
                self.error("invalid return type".to_string());
                return None;
            }
        };
        self.bump();
        if matches!(self.cur(), Some(Token::Ident(_))) {
            node.set_middle(self.dlist()?);
        }
        self.expect(Token::Begin)?;
        node.set_right(self.stats()?);
        self.expect(Token::End)?;
        let params = node
            .left
            .as_deref()
            .map(|p| self.collect_params(p))
            .unwrap_or_default();
        if self
            .table
            .add_attribute(fsym, Attribute::Func { ret, params })
            .is_err()
        {
            self.redefinition_error(name_pos, &name);
        }
        Some(node)
    }

    fn params(&mut self) -> Option<AstNode> {
        let mut items = vec![self.param()?];
        while self.eat(&Token::Comma) {
            items.push(self.param()?);
        }
        Some(Self::chain(NodeKind::ParamList, items))
    }

    fn param(&mut self) -> Option<AstNode> {
        if self.at(&Token::Const) {
            let pos = self.cur_pos();
            self.bump();
            let mut node = AstNode::new(NodeKind::ConstArrayParam, pos);
            node.set_left(self.arrdecl()?);
            Some(node)
        } else {
            self.decl()
        }
    }

    fn collect_params(&self, plist: &AstNode) -> Vec<Attribute> {
        let mut out = Vec::new();
        let mut cur = plist;
        loop {
            let (item, rest) = if cur.kind == NodeKind::ParamList {
                (cur.lhs(), Some(cur.rhs()))
            } else {
                (cur, None)
            };
            let leaf = if item.kind == NodeKind::ConstArrayParam {
                item.lhs()
            } else {
                item
            };
            let attr = if leaf.kind == NodeKind::ArrayDecl {
                self.table
                    .attribute(leaf.sym())
                    .map(|e| e.attr.clone())
                    .unwrap_or(Attribute::Scalar(SemType::Error))
            } else {
                Attribute::Scalar(leaf.ty)
            };
            out.push(attr);
            match rest {
                Some(r) => cur = r,
                None => return out,
            }
        }
    }

    fn dlist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.decl()?];
        while self.eat(&Token::Comma) {
            items.push(self.decl()?);
        }
        Some(Self::chain(NodeKind::DeclList, items))
    }

    /// Function parameter or local: scalar or array-typed.
    fn decl(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        self.expect(Token::Colon)?;
        if matches!(self.cur(), Some(Token::Ident(_))) {
            let (type_name, _) = self.expect_ident()?;
            // array type declarations are global
            let type_sym = self.table.intern(&type_name, Scope::GLOBAL);
            if self
                .table
                .add_attribute(sym, Attribute::Array { elem: type_sym })
                .is_err()
            {
                self.redefinition_error(pos, &name);
            }
            let mut node = AstNode::with_symbol(NodeKind::ArrayDecl, pos, sym);
            node.ty = SemType::Array;
            Some(node)
        } else {
            let ty = self.scalar_type()?;
            if self.table.add_attribute(sym, Attribute::Scalar(ty)).is_err() {
                self.redefinition_error(pos, &name);
            }
            let mut node = AstNode::with_symbol(NodeKind::SimpleDecl, pos, sym);
            node.ty = ty;
            Some(node)
        }
    }

    // ── Main ─────────────────────────────────────────────────────────────

    fn mainbody(&mut self) -> Option<AstNode> {
        self.scope = Scope(self.scope.0 + 1);
        let pos = self.cur_pos();
        self.expect(Token::Main)?;
        let slist = self.slist()?;
        self.expect(Token::Begin)?;
        let stats = self.stats()?;
        self.expect(Token::End)?;
        self.expect(Token::Cd25)?;
        let (name, _) = self.expect_ident()?;
        let progname = self.table.intern(&name, self.scope);
        let mut node = AstNode::with_symbol(NodeKind::MainBody, pos, progname);
        node.set_left(slist);
        node.set_right(stats);
        Some(node)
    }

    fn slist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.sdecl()?];
        while self.eat(&Token::Comma) {
            items.push(self.sdecl()?);
        }
        Some(Self::chain(NodeKind::MainDeclList, items))
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn starts_stat(&self) -> bool {
        matches!(
            self.cur(),
            Some(
                Token::For
                    | Token::If
                    | Token::Repeat
                    | Token::In
                    | Token::Out
                    | Token::Return
                    | Token::Ident(_)
            )
        )
    }

    /// Panic-mode synchronisation: discard tokens until just past a `;` or
    /// just before a closer/section keyword.
    fn sync_stat(&mut self) {
        loop {
            match self.cur() {
                None => return,
                Some(Token::Semicolon) => {
                    self.bump();
                    return;
                }
                Some(
                    Token::End | Token::Else | Token::Until | Token::Func | Token::Main,
                ) => return,
                _ => self.bump(),
            }
        }
    }

    fn stats(&mut self) -> Option<AstNode> {
        let mut items = Vec::new();
        let mut had_error = false;
        while self.starts_stat() {
            match self.stat() {
                Some(s) => items.push(s),
                None => {
                    had_error = true;
                    self.sync_stat();
                }
            }
        }
        if items.is_empty() {
            if !had_error {
                let saw = match self.cur() {
                    Some(t) => t.to_string(),
                    None => "end of file".to_string(),
                };
                self.error(format!("expected statement, but saw {}", saw));
            }
            return None;
        }
        Some(Self::wrapped_chain(NodeKind::StatList, items))
    }

    fn stat(&mut self) -> Option<AstNode> {
        match self.cur() {
            Some(Token::For) => self.forstat(),
            Some(Token::If) => self.ifstat(),
            Some(Token::Repeat) => {
                let node = self.repstat()?;
                self.expect(Token::Semicolon)?;
                Some(node)
            }
            Some(Token::In | Token::Out) => {
                let node = self.iostat()?;
                self.expect(Token::Semicolon)?;
                Some(node)
            }
            Some(Token::Return) => {
                let node = self.returnstat()?;
                self.expect(Token::Semicolon)?;
                Some(node)
            }
            Some(Token::Ident(_)) => {
                let node = if matches!(self.peek(), Some(Token::LParen)) {
                    self.callstat()?
                } else {
                    self.asgnstat()?
                };
                self.expect(Token::Semicolon)?;
                Some(node)
            }
            _ => {
                self.error("expected statement".to_string());
                None
            }
        }
    }

    fn forstat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;
        let mut node = AstNode::new(NodeKind::For, pos);
        if let Some(init) = self.asgnlist()? {
            node.set_left(init);
        }
        self.expect(Token::Semicolon)?;
        node.set_middle(self.bool_expr()?);
        self.expect(Token::RParen)?;
        node.set_right(self.stats()?);
        self.expect(Token::End)?;
        Some(node)
    }

    fn repstat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        self.expect(Token::Repeat)?;
        self.expect(Token::LParen)?;
        let mut node = AstNode::new(NodeKind::Repeat, pos);
        if let Some(init) = self.asgnlist()? {
            node.set_left(init);
        }
        self.expect(Token::RParen)?;
        node.set_middle(self.stats()?);
        self.expect(Token::Until)?;
        node.set_right(self.bool_expr()?);
        Some(node)
    }

    /// Possibly-empty comma-separated assignment list (loop headers).
    fn asgnlist(&mut self) -> Option<Option<AstNode>> {
        if !matches!(self.cur(), Some(Token::Ident(_))) {
            return Some(None);
        }
        let mut items = vec![self.asgnstat()?];
        while self.eat(&Token::Comma) {
            items.push(self.asgnstat()?);
        }
        Some(Some(Self::chain(NodeKind::AssignList, items)))
    }

    fn ifstat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let predicate = self.bool_expr()?;
        self.expect(Token::RParen)?;
        let then_stats = self.stats()?;
        let else_stats = if self.eat(&Token::Else) {
            Some(self.stats()?)
        } else {
            None
        };
        self.expect(Token::End)?;
        if let Some(else_stats) = else_stats {
            let mut node = AstNode::new(NodeKind::IfElse, pos);
            node.set_left(predicate);
            node.set_middle(then_stats);
            node.set_right(else_stats);
            Some(node)
        } else {
            let mut node = AstNode::new(NodeKind::IfThen, pos);
            node.set_left(predicate);
            node.set_right(then_stats);
            Some(node)
        }
    }

    fn asgnstat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        let var = self.var()?;
        let kind = match self.cur() {
            Some(Token::Assign) => NodeKind::Assign,
            Some(Token::PlusEq) => NodeKind::AddAssign,
            Some(Token::MinusEq) => NodeKind::SubAssign,
            Some(Token::StarEq) => NodeKind::MulAssign,
            Some(Token::SlashEq) => NodeKind::DivAssign,
            _ => {
                self.error("expected an assignment operator".to_string());
                return None;
            }
        };
        self.bump();
        let mut node = AstNode::new(kind, pos);
        node.set_left(var);
        node.set_right(self.bool_expr()?);
        Some(node)
    }

    fn iostat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        if self.eat(&Token::In) {
            self.expect(Token::GreaterGreater)?;
            let mut node = AstNode::new(NodeKind::Input, pos);
            node.set_left(self.vlist()?);
            return Some(node);
        }
        self.expect(Token::Out)?;
        self.expect(Token::LessLess)?;
        if self.eat(&Token::Line) {
            return Some(AstNode::new(NodeKind::OutputLine, pos));
        }
        let prlist = self.prlist()?;
        if self.eat(&Token::LessLess) {
            self.expect(Token::Line)?;
            let mut node = AstNode::new(NodeKind::OutputLine, pos);
            node.set_left(prlist);
            Some(node)
        } else {
            let mut node = AstNode::new(NodeKind::Output, pos);
            node.set_left(prlist);
            Some(node)
        }
    }

    fn callstat(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        let mut node = AstNode::with_symbol(NodeKind::Call, pos, sym);
        self.expect(Token::LParen)?;
        if !self.at(&Token::RParen) {
            node.set_left(self.elist()?);
        }
        self.expect(Token::RParen)?;
        Some(node)
    }

    fn returnstat(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        self.expect(Token::Return)?;
        let mut node = AstNode::new(NodeKind::Return, pos);
        if self.eat(&Token::Void) {
            return Some(node);
        }
        node.set_left(self.expr()?);
        Some(node)
    }

    fn vlist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.var()?];
        while self.eat(&Token::Comma) {
            items.push(self.var()?);
        }
        Some(Self::chain(NodeKind::VarList, items))
    }

    /// `x`, `arr[i]` (whole struct element) or `arr[i].field`.
    fn var(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        let simple = AstNode::with_symbol(NodeKind::SimpleVar, pos, sym);
        if !self.at(&Token::LBracket) {
            return Some(simple);
        }
        self.bump();
        let index = self.expr()?;
        self.expect(Token::RBracket)?;
        if self.eat(&Token::Dot) {
            let (field, field_pos) = self.expect_ident()?;
            let field_sym = self.table.intern(&field, self.scope);
            let mut node = AstNode::with_symbol(NodeKind::FieldAccess, field_pos, field_sym);
            node.set_left(simple);
            node.set_right(index);
            Some(node)
        } else {
            let mut node = AstNode::with_type(NodeKind::ArrayElem, pos, SemType::Struct);
            node.set_left(simple);
            node.set_right(index);
            Some(node)
        }
    }

    fn elist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.bool_expr()?];
        while self.eat(&Token::Comma) {
            items.push(self.bool_expr()?);
        }
        Some(Self::wrapped_chain(NodeKind::ExprList, items))
    }

    fn prlist(&mut self) -> Option<AstNode> {
        let mut items = vec![self.printitem()?];
        while self.eat(&Token::Comma) {
            items.push(self.printitem()?);
        }
        Some(Self::chain(NodeKind::PrintList, items))
    }

    fn printitem(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        if let Some(Token::StringLit(text)) = self.cur() {
            let text = text.clone();
            self.bump();
            let sym = self.table.intern(&text, self.scope);
            let mut node = AstNode::with_symbol(NodeKind::StringLit, pos, sym);
            node.ty = SemType::Str;
            return Some(node);
        }
        self.expr()
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn bool_expr(&mut self) -> Option<AstNode> {
        let mut node = self.rel()?;
        loop {
            let op_kind = match self.cur() {
                Some(Token::And) => NodeKind::And,
                Some(Token::Or) => NodeKind::Or,
                Some(Token::Xor) => NodeKind::Xor,
                _ => return Some(node),
            };
            let pos = self.cur_pos();
            self.bump();
            let op = AstNode::with_type(op_kind, pos, SemType::Bool);
            let rhs = self.rel()?;
            let mut combined = AstNode::with_type(NodeKind::BoolOp, pos, SemType::Bool);
            combined.set_left(node);
            combined.set_middle(op);
            combined.set_right(rhs);
            node = combined;
        }
    }

    fn rel(&mut self) -> Option<AstNode> {
        if self.at(&Token::Not) {
            // not <expr> <relop> <expr>: compute the relation, then negate
            let pos = self.cur_pos();
            self.bump();
            let mut node = AstNode::with_type(NodeKind::NotRel, pos, SemType::Bool);
            node.set_left(self.expr()?);
            node.set_middle(self.relop()?);
            node.set_right(self.expr()?);
            return Some(node);
        }
        let left = self.expr()?;
        if matches!(
            self.cur(),
            Some(
                Token::EqEq
                    | Token::NotEq
                    | Token::Greater
                    | Token::Less
                    | Token::LessEq
                    | Token::GreaterEq
            )
        ) {
            let mut op = self.relop()?;
            let right = self.rel()?;
            op.set_left(left);
            op.set_right(right);
            Some(op)
        } else {
            Some(left)
        }
    }

    fn relop(&mut self) -> Option<AstNode> {
        let kind = match self.cur() {
            Some(Token::EqEq) => NodeKind::Eq,
            Some(Token::NotEq) => NodeKind::NotEq,
            Some(Token::Greater) => NodeKind::Greater,
            Some(Token::Less) => NodeKind::Less,
            Some(Token::LessEq) => NodeKind::LessEq,
            Some(Token::GreaterEq) => NodeKind::GreaterEq,
            _ => {
                self.error("expected a relational operator".to_string());
                return None;
            }
        };
        let pos = self.cur_pos();
        self.bump();
        Some(AstNode::with_type(kind, pos, SemType::Bool))
    }

    fn expr(&mut self) -> Option<AstNode> {
        let mut node = self.term()?;
        loop {
            let kind = match self.cur() {
                Some(Token::Plus) => NodeKind::Add,
                Some(Token::Minus) => NodeKind::Sub,
                _ => return Some(node),
            };
            let pos = self.cur_pos();
            self.bump();
            let rhs = self.term()?;
            let mut bin = AstNode::new(kind, pos);
            bin.set_left(node);
            bin.set_right(rhs);
            node = bin;
        }
    }

    fn term(&mut self) -> Option<AstNode> {
        let mut node = self.fact()?;
        loop {
            let kind = match self.cur() {
                Some(Token::Star) => NodeKind::Mul,
                Some(Token::Slash) => NodeKind::Div,
                Some(Token::Percent) => NodeKind::Mod,
                _ => return Some(node),
            };
            let pos = self.cur_pos();
            self.bump();
            let rhs = self.fact()?;
            let mut bin = AstNode::new(kind, pos);
            bin.set_left(node);
            bin.set_right(rhs);
            node = bin;
        }
    }

    fn fact(&mut self) -> Option<AstNode> {
        let mut node = self.exponent()?;
        while self.at(&Token::Caret) {
            let pos = self.cur_pos();
            self.bump();
            let rhs = self.exponent()?;
            let mut bin = AstNode::new(NodeKind::Pow, pos);
            bin.set_left(node);
            bin.set_right(rhs);
            node = bin;
        }
        Some(node)
    }

    fn exponent(&mut self) -> Option<AstNode> {
        let pos = self.cur_pos();
        match self.cur() {
            Some(Token::IntLit(text)) => {
                let text = text.clone();
                self.bump();
                let sym = self.table.intern(&text, self.scope);
                let mut node = AstNode::with_symbol(NodeKind::IntLit, pos, sym);
                node.ty = SemType::Int;
                Some(node)
            }
            Some(Token::RealLit(text)) => {
                let text = text.clone();
                self.bump();
                let sym = self.table.intern(&text, self.scope);
                let mut node = AstNode::with_symbol(NodeKind::RealLit, pos, sym);
                node.ty = SemType::Real;
                Some(node)
            }
            Some(Token::True) => {
                self.bump();
                Some(AstNode::with_type(NodeKind::True, pos, SemType::Bool))
            }
            Some(Token::False) => {
                self.bump();
                Some(AstNode::with_type(NodeKind::False, pos, SemType::Bool))
            }
            Some(Token::LParen) => {
                self.bump();
                let node = self.bool_expr()?;
                self.expect(Token::RParen)?;
                Some(node)
            }
            Some(Token::Ident(_)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.fncall()
                } else {
                    self.var()
                }
            }
            other => {
                let saw = match other {
                    Some(t) => t.to_string(),
                    None => "end of file".to_string(),
                };
                self.error(format!("expected a value, but saw {}", saw));
                None
            }
        }
    }

    fn fncall(&mut self) -> Option<AstNode> {
        let (name, pos) = self.expect_ident()?;
        let sym = self.table.intern(&name, self.scope);
        let mut node = AstNode::with_symbol(NodeKind::FuncCall, pos, sym);
        self.expect(Token::LParen)?;
        if !self.at(&Token::RParen) {
            node.set_left(self.elist()?);
        }
        self.expect(Token::RParen)?;
        Some(node)
    }
}
