//! Printing the tree back as source.
//!
//! Output is equivalent to the input modulo whitespace, comments, and the
//! parse-time desugarings (split multi-name declarations, expanded
//! multi-dimension subscripts, collapsed single-statement compounds).
//! Synthetic nodes (end markers, dummy types) do not print.

use super::{Ast, BodyKind, CommOp, NodeFlags, NodeId, NodeKind};
use crate::intern::Interner;
use crate::lexer::{quote_char, quote_string};
use crate::token::{TokenKind, TokenValue};

pub struct Printer<'a> {
    ast: &'a Ast,
    interner: &'a Interner,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    pub fn new(ast: &'a Ast, interner: &'a Interner) -> Self {
        Printer {
            ast,
            interner,
            out: String::new(),
            indent: 0,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn w(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn nl(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn name(&mut self, s: crate::intern::Symbol) {
        let t = self.interner.resolve(s).to_string();
        self.w(&t);
    }

    // ----- expressions -----

    pub fn expr(&mut self, x: NodeId) {
        if self.ast[x].flags.contains(NodeFlags::PARENTHESIZED) {
            self.w("(");
            self.expr_bare(x);
            self.w(")");
        } else {
            self.expr_bare(x);
        }
    }

    fn expr_bare(&mut self, x: NodeId) {
        match &self.ast[x].kind {
            NodeKind::Literal { t, v } => self.literal(*t, v.clone()),
            NodeKind::Name { id, .. } => self.name(*id),
            NodeKind::Binary { op, l, r } => {
                let (op, l, r) = (*op, *l, *r);
                self.expr(l);
                self.w(" ");
                self.w(op.name());
                self.w(" ");
                self.expr(r);
            }
            NodeKind::Prefix { op, r } => {
                let (op, r) = (*op, *r);
                self.w(op.name());
                self.expr(r);
            }
            NodeKind::Subscript { x: a, idx } => {
                let (a, idx) = (*a, *idx);
                self.expr(a);
                self.w("[");
                self.expr(idx);
                self.w("]");
            }
            NodeKind::Subrange { x: a, l, h } => {
                let (a, l, h) = (*a, *l, *h);
                self.expr(a);
                self.w("[");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w("]");
            }
            NodeKind::FieldOf { x: a, id, .. } => {
                let (a, id) = (*a, *id);
                self.expr(a);
                self.w(".");
                self.name(id);
            }
            NodeKind::Call { id, args, .. } => {
                let (id, args) = (*id, args.clone());
                self.name(id);
                self.w("(");
                self.comma_exprs(&args);
                self.w(")");
            }
            NodeKind::ArrayCons { l } => {
                let l = l.clone();
                self.w("[");
                self.comma_exprs(&l);
                self.w("]");
            }
            NodeKind::RecordCons { l } => {
                let l = l.clone();
                self.w("{");
                self.comma_exprs(&l);
                self.w("}");
            }
            NodeKind::TypeValue { tps } => {
                let tps = *tps;
                self.w("<");
                self.typ(tps);
                self.w(">");
            }
            NodeKind::ValueProbe { p, b } => {
                let (p, b) = (p.clone(), *b);
                self.w("#{");
                self.comma_exprs(&p);
                self.w(": ");
                self.expr(b);
                self.w("}");
            }
            NodeKind::RepExpr { sym, id, l, h, v, .. } => {
                let (sym, id, l, h, v) = (*sym, *id, *l, *h, *v);
                self.w("<<");
                self.w(sym.name());
                self.w(" ");
                self.name(id);
                self.w(": ");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w(": ");
                self.expr(v);
                self.w(">>");
            }
            _ => self.stmt(x),
        }
    }

    fn literal(&mut self, t: TokenKind, v: TokenValue) {
        match (t, v) {
            (TokenKind::CharConst, TokenValue::Int(i)) => self.w(&quote_char(i)),
            (_, TokenValue::Int(i)) => self.w(&i.to_string()),
            (_, TokenValue::Big(z)) => self.w(&z.to_string()),
            (_, TokenValue::Str(s)) => {
                let q = quote_string(&s);
                self.w(&q);
            }
            (TokenKind::KwTrue, _) => self.w("true"),
            (TokenKind::KwFalse, _) => self.w("false"),
            (_, TokenValue::Sym(s)) => {
                self.w("`");
                self.name(s);
            }
            (_, TokenValue::Float(f)) => self.w(&format!("{:?}", f)),
            _ => {}
        }
    }

    fn comma_exprs(&mut self, l: &[NodeId]) {
        for (i, &e) in l.iter().enumerate() {
            if i > 0 {
                self.w(", ");
            }
            self.expr(e);
        }
    }

    // ----- statements -----

    /// Statements of a list, separated by `;`, skipping synthetic end
    /// markers.
    fn stmt_list(&mut self, l: &[NodeId]) {
        let mut first = true;
        for &s in l {
            if matches!(self.ast[s].kind, NodeKind::EndStmt) {
                continue;
            }
            if !first {
                self.w(";");
                self.nl();
            }
            first = false;
            self.stmt(s);
        }
    }

    pub fn stmt(&mut self, x: NodeId) {
        match &self.ast[x].kind {
            NodeKind::Skip => self.w("skip"),
            NodeKind::EndStmt => {}
            NodeKind::Assign { v, e } => {
                let (v, e) = (*v, *e);
                self.expr(v);
                self.w(" := ");
                self.expr(e);
            }
            NodeKind::BoolSet { v, op } => {
                let (v, op) = (*v, *op);
                self.expr(v);
                self.w(op.name());
            }
            NodeKind::Comm { p, op, e } => {
                let (p, op, e) = (*p, *op, *e);
                self.expr(p);
                match op {
                    CommOp::Send => {
                        self.w("!");
                        self.expr(e);
                    }
                    CommOp::Recv => {
                        self.w("?");
                        self.expr(e);
                    }
                    CommOp::Peek => {
                        self.w("#?");
                        self.expr(e);
                    }
                    CommOp::SendRecv => {
                        self.w("!");
                        self.expr(e);
                        self.w("?");
                    }
                }
            }
            NodeKind::Guarded { g, l } => {
                let (g, l) = (*g, l.clone());
                self.expr(g);
                self.w(" -> ");
                self.guarded_stmts(&l);
            }
            NodeKind::Select { gl, w, mutex } => {
                let (gl, wx, mutex) = (gl.clone(), *w, *mutex);
                self.w("[");
                if let Some(wx) = wx {
                    self.expr(wx);
                } else {
                    self.alternatives(&gl, mutex);
                }
                self.w("]");
            }
            NodeKind::LoopStmt { gl, sl, mutex } => {
                let (gl, sl, mutex) = (gl.clone(), sl.clone(), *mutex);
                self.w("*[");
                if gl.is_empty() {
                    self.guarded_stmts(&sl);
                } else {
                    self.alternatives(&gl, mutex);
                }
                self.w("]");
            }
            NodeKind::Compound { l } => {
                let l = l.clone();
                self.w("{ ");
                self.guarded_stmts(&l);
                self.w(" }");
            }
            NodeKind::Parallel { l } => {
                let l = l.clone();
                for (i, &s) in l.iter().enumerate() {
                    if i > 0 {
                        self.w(", ");
                    }
                    self.stmt(s);
                }
            }
            NodeKind::Connect { a, b } => {
                let (a, b) = (*a, *b);
                self.w("connect ");
                self.expr(a);
                self.w(", ");
                self.expr(b);
            }
            NodeKind::InstanceStmt { d, mb } => {
                let (d, mb) = (*d, *mb);
                let (id, tps) = match &self.ast[d].kind {
                    NodeKind::VarDecl { id, tps, .. } => (*id, *tps),
                    _ => return,
                };
                self.w("instance ");
                self.name(id);
                self.w(": ");
                self.typ(tps);
                if let Some(mb) = mb {
                    if let NodeKind::MetaBinding { a, .. } = &self.ast[mb].kind {
                        let a = a.clone();
                        self.w("(");
                        self.comma_exprs(&a);
                        self.w(")");
                    }
                }
            }
            NodeKind::MetaBinding { x: xe, a } => {
                let (xe, a) = (*xe, a.clone());
                if let Some(xe) = xe {
                    self.expr(xe);
                }
                self.w("(");
                self.comma_exprs(&a);
                self.w(")");
            }
            NodeKind::RepStmt { sym, id, l, h, sl, .. } => {
                let (sym, id, l, h, sl) = (*sym, *id, *l, *h, sl.clone());
                self.w("<<");
                if sym != TokenKind::Nothing {
                    self.w(sym.name());
                    self.w(" ");
                }
                self.name(id);
                self.w(": ");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w(": ");
                match sym {
                    TokenKind::Arb | TokenKind::Mutex => {
                        let join = format!(" {} ", sym.name());
                        for (i, &s) in sl.iter().enumerate() {
                            if i > 0 {
                                self.w(&join);
                            }
                            self.stmt(s);
                        }
                    }
                    TokenKind::Nothing => {
                        for (i, &s) in sl.iter().enumerate() {
                            if i > 0 {
                                self.w(" ");
                            }
                            self.stmt(s);
                        }
                    }
                    _ => self.guarded_stmts(&sl),
                }
                self.w(">>");
            }
            NodeKind::PropertyStmt { id, node, v } => {
                let (id, node, v) = (*id, *node, *v);
                self.name(id);
                self.w("(");
                self.expr(node);
                self.w(") := ");
                self.expr(v);
            }
            NodeKind::Transition { v, op } => {
                let (v, op) = (*v, *op);
                self.expr(v);
                self.w(op.name());
            }
            NodeKind::ProductionRule {
                g,
                v,
                op,
                atomic,
                delay,
            } => {
                let (g, v, op, atomic, delay) = (*g, *v, *op, *atomic, *delay);
                if atomic {
                    self.w("atomic ");
                } else if let Some(dl) = delay {
                    self.w("after(");
                    self.expr(dl);
                    self.w(") ");
                }
                self.expr(g);
                self.w(" -> ");
                self.expr(v);
                self.w(op.name());
            }
            NodeKind::DelayHold { l, c, n } => {
                let (l, c, n) = (l.clone(), *c, *n);
                self.w("{");
                for (i, &t) in l.iter().enumerate() {
                    if i > 0 {
                        self.w(", ");
                    }
                    self.stmt(t);
                }
                self.w("} requires {");
                self.expr(c);
                if let Some(n) = n {
                    self.w(" > ");
                    self.expr(n);
                }
                self.w("}");
            }
            NodeKind::VarDecl { .. } => self.var_decl(x, "var"),
            _ => self.expr_bare(x),
        }
    }

    /// Statements joined by `; ` on one line, skipping end markers.
    fn guarded_stmts(&mut self, l: &[NodeId]) {
        let mut first = true;
        for &s in l {
            if matches!(self.ast[s].kind, NodeKind::EndStmt) {
                continue;
            }
            if !first {
                self.w("; ");
            }
            first = false;
            self.stmt(s);
        }
    }

    fn alternatives(&mut self, gl: &[NodeId], mutex: bool) {
        let join = if mutex { " [:] " } else { " [] " };
        for (i, &g) in gl.iter().enumerate() {
            if i > 0 {
                self.w(join);
            }
            self.stmt(g);
        }
    }

    // ----- types -----

    pub fn typ(&mut self, x: NodeId) {
        match &self.ast[x].kind {
            NodeKind::DummyType { tps } => {
                if let Some(t) = *tps {
                    self.typ(t);
                }
            }
            NodeKind::IntType { l, h } => {
                let (l, h) = (*l, *h);
                self.w("{");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w("}");
            }
            NodeKind::SymType { l } => {
                let l = l.clone();
                self.w("{");
                self.comma_exprs(&l);
                self.w("}");
            }
            NodeKind::ArrayType { l, h, tps } => {
                let (l, h, tps) = (*l, *h, *tps);
                self.w("array [");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w("] of ");
                self.typ(tps);
            }
            NodeKind::RecordType { l } => {
                let l = l.clone();
                self.w("record { ");
                for (i, &f) in l.iter().enumerate() {
                    if i > 0 {
                        self.w("; ");
                    }
                    if let NodeKind::RecordField { id, tps } = &self.ast[f].kind {
                        let (id, tps) = (*id, *tps);
                        self.name(id);
                        self.w(": ");
                        self.typ(tps);
                    }
                }
                self.w(" }");
            }
            NodeKind::UnionType { l, def } => {
                let (l, def) = (l.clone(), *def);
                self.w("union { ");
                for &f in &l {
                    self.union_field(f);
                    self.w("; ");
                }
                if let Some(def) = def {
                    self.w("default: ");
                    self.typ(def);
                }
                self.w(" }");
            }
            NodeKind::NamedType { id, .. } => self.name(*id),
            NodeKind::GenericType { sym } => match sym {
                TokenKind::KwBool => self.w("bool"),
                TokenKind::KwInt => self.w("int"),
                TokenKind::KwSymbol => self.w("symbol"),
                TokenKind::KwType => self.w("type"),
                _ => {}
            },
            NodeKind::WiredType { li, lo } => {
                let (li, lo) = (li.clone(), lo.clone());
                self.w("(");
                for (i, &wd) in li.iter().enumerate() {
                    if i > 0 {
                        self.w(", ");
                    }
                    self.wire_decl(wd);
                }
                self.w("; ");
                for (i, &wd) in lo.iter().enumerate() {
                    if i > 0 {
                        self.w(", ");
                    }
                    self.wire_decl(wd);
                }
                self.w(")");
            }
            _ => {}
        }
    }

    fn union_field(&mut self, f: NodeId) {
        if let NodeKind::UnionField {
            id,
            dnid,
            dnmb,
            upid,
            upmb,
            tps,
            ..
        } = &self.ast[f].kind
        {
            let (id, dnid, dnmb, upid, upmb, tps) = (*id, *dnid, *dnmb, *upid, *upmb, *tps);
            self.name(id);
            self.w(" {");
            self.name(dnid);
            if let Some(mb) = dnmb {
                self.stmt(mb);
            }
            self.w(", ");
            self.name(upid);
            if let Some(mb) = upmb {
                self.stmt(mb);
            }
            self.w("}: ");
            self.typ(tps);
        }
    }

    fn wire_decl(&mut self, wd: NodeId) {
        match &self.ast[wd].kind {
            NodeKind::WireDecl {
                id,
                tps,
                init_sym,
                z,
            } => {
                let (id, tps, init_sym, z) = (*id, *tps, *init_sym, *z);
                self.name(id);
                self.inline_dims(tps);
                if let Some(sym) = init_sym {
                    self.w(sym.name());
                } else if let Some(z) = z {
                    self.w(" = ");
                    self.expr(z);
                }
            }
            NodeKind::VarDecl {
                id, tps, z_sym, z, ..
            } => {
                let (id, tps, z_sym, z) = (*id, *tps, *z_sym, *z);
                self.name(id);
                self.inline_dims(tps);
                if let Some(sym) = z_sym {
                    self.w(sym.name());
                } else if let Some(z) = z {
                    self.w(" = ");
                    self.expr(z);
                }
            }
            _ => {}
        }
    }

    /// Inline array dimensions of a wire or counter declaration.
    fn inline_dims(&mut self, mut tps: NodeId) {
        let mut dims = Vec::new();
        loop {
            match &self.ast[tps].kind {
                NodeKind::ArrayType { l, h, tps: t } => {
                    dims.push((*l, *h));
                    tps = *t;
                }
                NodeKind::DummyType { tps: Some(t) } => tps = *t,
                _ => break,
            }
        }
        if dims.is_empty() {
            return;
        }
        self.w("[");
        for (i, (l, h)) in dims.into_iter().enumerate() {
            if i > 0 {
                self.w(", ");
            }
            self.expr(l);
            self.w("..");
            self.expr(h);
        }
        self.w("]");
    }

    // ----- declarations -----

    fn var_decl(&mut self, x: NodeId, kw: &str) {
        let (id, tps, z, z_sym) = match &self.ast[x].kind {
            NodeKind::VarDecl { id, tps, z, z_sym, .. } => (*id, *tps, *z, *z_sym),
            _ => return,
        };
        if self.ast[x].flags.contains(NodeFlags::VOLATILE) {
            self.w("volatile ");
        }
        self.w(kw);
        self.w(" ");
        self.name(id);
        if let Some(sym) = z_sym {
            self.inline_dims(tps);
            self.w(sym.name());
            self.w(";");
            return;
        }
        if self.bool_wire_form(tps) {
            self.inline_dims(tps);
            if let Some(z) = z {
                self.w(" = ");
                self.expr(z);
            }
            self.w(";");
            return;
        }
        self.w(": ");
        self.typ(tps);
        if let Some(z) = z {
            self.w(" = ");
            self.expr(z);
        }
        self.w(";");
    }

    /// Wire and counter declarations carry an implicit generic type that
    /// does not print.
    fn bool_wire_form(&self, mut tps: NodeId) -> bool {
        loop {
            match &self.ast[tps].kind {
                NodeKind::GenericType {
                    sym: TokenKind::KwBool,
                }
                | NodeKind::GenericType {
                    sym: TokenKind::KwInt,
                } => return true,
                NodeKind::ArrayType { tps: t, .. } => tps = *t,
                _ => return false,
            }
        }
    }

    pub fn definition(&mut self, x: NodeId) {
        if self.ast[x].flags.contains(NodeFlags::EXPORT)
            && !matches!(self.ast[x].kind, NodeKind::PropertyDecl { .. })
        {
            self.w("export ");
        }
        match &self.ast[x].kind {
            NodeKind::TypeDef { id, tps } => {
                let (id, tps) = (*id, *tps);
                self.w("type ");
                self.name(id);
                self.w(" = ");
                self.typ(tps);
                self.w(";");
            }
            NodeKind::ConstDef { id, tps, z } => {
                let (id, tps, z) = (*id, *tps, *z);
                self.w("const ");
                self.name(id);
                if let Some(tps) = tps {
                    self.w(": ");
                    self.typ(tps);
                }
                self.w(" = ");
                self.expr(z);
                self.w(";");
            }
            NodeKind::FieldDef { id, l, h } => {
                let (id, l, h) = (*id, *l, *h);
                self.w("field ");
                self.name(id);
                self.w(" = [");
                self.expr(l);
                self.w("..");
                self.expr(h);
                self.w("];");
            }
            NodeKind::PropertyDecl { id, z } => {
                let (id, z) = (*id, *z);
                self.w("property ");
                self.name(id);
                if let Some(z) = z {
                    self.w(" = ");
                    self.expr(z);
                }
                self.w(";");
            }
            NodeKind::VarDecl { .. } => self.var_decl(x, "var"),
            NodeKind::FunctionDef { .. } => self.function_def(x),
            NodeKind::ProcessDef { .. } => self.process_def(x),
            _ => self.stmt(x),
        }
    }

    fn parameter(&mut self, p: NodeId) {
        if let NodeKind::Parameter { par_sym, d } = &self.ast[p].kind {
            let (par_sym, d) = (*par_sym, *d);
            self.w(par_sym.name());
            self.w(" ");
            if let NodeKind::VarDecl { id, tps, .. } = &self.ast[d].kind {
                let (id, tps) = (*id, *tps);
                self.name(id);
                self.w(": ");
                self.typ(tps);
            }
        }
    }

    fn function_def(&mut self, x: NodeId) {
        let (id, pl, ret, b) = match &self.ast[x].kind {
            NodeKind::FunctionDef { id, pl, ret, b, .. } => (*id, pl.clone(), *ret, *b),
            _ => return,
        };
        self.w(if ret.is_some() { "function " } else { "procedure " });
        self.name(id);
        self.w("(");
        for (i, &p) in pl.iter().enumerate() {
            if i > 0 {
                self.w("; ");
            }
            self.parameter(p);
        }
        if self.ast[x].flags.contains(NodeFlags::VARARGS) {
            if !pl.is_empty() {
                self.w("; ");
            }
            self.w("...");
        }
        self.w(")");
        if let Some(ret) = ret {
            if let NodeKind::VarDecl { tps, .. } = &self.ast[ret].kind {
                let tps = *tps;
                self.w(": ");
                self.typ(tps);
            }
        }
        if self.ast[x].flags.contains(NodeFlags::BUILTIN) {
            self.w(" builtin");
            return;
        }
        if let Some(b) = b {
            self.w(" ");
            self.body(b);
        }
    }

    fn port(&mut self, p: NodeId) {
        if let NodeKind::VarDecl { id, tps, .. } = &self.ast[p].kind {
            let (id, tps) = (*id, *tps);
            let flags = self.ast[p].flags;
            self.name(id);
            if flags.contains(NodeFlags::WIRE) {
                self.typ(tps);
            } else if flags.contains(NodeFlags::INPORT) {
                self.w("?: ");
                self.typ(tps);
            } else if flags.contains(NodeFlags::OUTPORT) {
                self.w("!: ");
                self.typ(tps);
            }
            // sync ports have no type
        }
    }

    fn process_def(&mut self, x: NodeId) {
        let (id, ml, pl, bodies) = match &self.ast[x].kind {
            NodeKind::ProcessDef {
                id,
                ml,
                pl,
                mb,
                cb,
                hb,
                pb,
                db,
                ppb,
                ..
            } => (*id, ml.clone(), pl.clone(), [*mb, *hb, *pb, *cb, *db, *ppb]),
            _ => return,
        };
        self.w("process ");
        self.name(id);
        self.w("(");
        for (i, &m) in ml.iter().enumerate() {
            if i > 0 {
                self.w("; ");
            }
            if let NodeKind::MetaParameter { id, tps, .. } = &self.ast[m].kind {
                let (id, tps) = (*id, *tps);
                self.name(id);
                self.w(": ");
                self.typ(tps);
            }
        }
        self.w(")(");
        let def_wires: Vec<NodeId> = pl
            .iter()
            .copied()
            .filter(|&p| self.ast[p].flags.contains(NodeFlags::DEF_WIRE))
            .collect();
        if def_wires.is_empty() {
            for (i, &p) in pl.iter().enumerate() {
                if i > 0 {
                    self.w("; ");
                }
                self.port(p);
            }
        } else {
            self.w("(");
            let mut first = true;
            for &p in def_wires
                .iter()
                .filter(|&&p| !self.ast[p].flags.contains(NodeFlags::WRITABLE))
            {
                if !first {
                    self.w(", ");
                }
                first = false;
                self.wire_decl(p);
            }
            self.w("; ");
            first = true;
            for &p in def_wires
                .iter()
                .filter(|&&p| self.ast[p].flags.contains(NodeFlags::WRITABLE))
            {
                if !first {
                    self.w(", ");
                }
                first = false;
                self.wire_decl(p);
            }
            self.w(")");
        }
        self.w(")");
        for b in bodies.into_iter().flatten() {
            self.nl();
            self.body(b);
        }
    }

    fn body(&mut self, b: NodeId) {
        let (kind, dl, sl) = match &self.ast[b].kind {
            NodeKind::Body { kind, dl, sl, .. } => (*kind, dl.clone(), sl.clone()),
            _ => return,
        };
        self.w(kind.name());
        self.w(" {");
        self.indent += 1;
        for &d in &dl {
            self.nl();
            let is_var = matches!(self.ast[d].kind, NodeKind::VarDecl { .. });
            if is_var && kind == BodyKind::Delay && self.counter_form(d) {
                self.var_decl(d, "counter");
            } else if is_var {
                self.var_decl(d, "var");
            } else {
                self.definition(d);
            }
        }
        if !sl.is_empty() {
            self.nl();
            if kind == BodyKind::Prs || kind == BodyKind::Delay {
                let mut first = true;
                for &s in &sl {
                    if !first {
                        self.nl();
                    }
                    first = false;
                    self.stmt(s);
                }
            } else {
                self.stmt_list(&sl);
            }
        }
        self.indent -= 1;
        self.nl();
        self.w("}");
    }

    fn counter_form(&self, d: NodeId) -> bool {
        if let NodeKind::VarDecl { tps, .. } = &self.ast[d].kind {
            let mut t = *tps;
            loop {
                match &self.ast[t].kind {
                    NodeKind::GenericType {
                        sym: TokenKind::KwInt,
                    } => return true,
                    NodeKind::ArrayType { tps, .. } => t = *tps,
                    _ => return false,
                }
            }
        }
        false
    }

    /// Print a whole module: requires, then definitions. The implicit
    /// built-in requirement does not print.
    pub fn module(&mut self, x: NodeId) {
        let (rl, dl) = match &self.ast[x].kind {
            NodeKind::ModuleDef { rl, dl, .. } => (rl.clone(), dl.clone()),
            _ => return,
        };
        for &r in &rl {
            if self.ast[r].flags.contains(NodeFlags::BUILTIN) {
                continue;
            }
            if let NodeKind::RequiredModule { s, .. } = &self.ast[r].kind {
                let s = s.clone();
                self.w("requires ");
                self.w(&quote_string(&s));
                self.w(";");
                self.nl();
            }
        }
        for &d in &dl {
            self.definition(d);
            self.nl();
        }
    }
}

/// Render one module as source.
pub fn print_module(ast: &Ast, interner: &Interner, module_node: NodeId) -> String {
    let mut p = Printer::new(ast, interner);
    p.module(module_node);
    p.finish()
}
