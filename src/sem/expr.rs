//! Expression typing, reference linking, and constant folding.
//!
//! Every expression gets a reduced type. An expression whose leaves are
//! all literals or constants folds to a stored value (`CONST_FOLDED`);
//! anything touching a variable, parameter, port, probe, or call is
//! marked `UNCONST`. Machine-word arithmetic promotes to big integers on
//! overflow instead of wrapping.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Pow, Signed, ToPrimitive, Zero};

use super::Analyzer;
use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::error::Result;
use crate::exec::Value;
use crate::intern::Symbol;
use crate::token::{TokenKind, TokenValue};
use crate::types::{assignable, Type};

impl<'d> Analyzer<'d> {
    pub fn sem_expr(&mut self, x: NodeId) -> Result<()> {
        let kind = self.d.ast[x].kind.clone();
        match kind {
            NodeKind::Literal { t, v } => self.sem_literal(x, t, v),
            NodeKind::Name { id, .. } => self.sem_name(x, id),
            NodeKind::Binary { op, l, r } => self.sem_binary(x, op, l, r),
            NodeKind::Prefix { op, r } => self.sem_prefix(x, op, r),
            NodeKind::Subscript { x: a, idx } => self.sem_subscript(x, a, idx),
            NodeKind::Subrange { x: a, l, h } => self.sem_subrange(x, a, l, h),
            NodeKind::FieldOf { x: a, id, .. } => self.sem_field_of(x, a, id),
            NodeKind::Call { id, args, .. } => self.sem_call(x, id, &args),
            NodeKind::ArrayCons { l } => self.sem_array_cons(x, &l),
            NodeKind::RecordCons { l } => self.sem_record_cons(x, &l),
            NodeKind::TypeValue { tps } => {
                let tp = self.sem_type(tps)?;
                self.d.ast[x].tp = Type::Generic { meta_idx: None };
                self.d.ast[x].val = Value::Type(Rc::new(tp));
                self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
                Ok(())
            }
            NodeKind::ValueProbe { p, b } => self.sem_value_probe(x, &p, b),
            NodeKind::RepExpr {
                sym, id, l, h, v, cxt,
            } => self.sem_rep_expr(x, sym, id, l, h, v, cxt),
            _ => Err(self.d.node_error(x, "Expected an expression".into())),
        }
    }

    fn sem_literal(&mut self, x: NodeId, t: TokenKind, v: TokenValue) -> Result<()> {
        let (tp, val) = match (t, v) {
            (TokenKind::IntConst, TokenValue::Int(i)) => (Type::Int, Value::Int(i)),
            (TokenKind::BigConst, TokenValue::Big(z)) => (Type::Int, Value::Big(z)),
            (TokenKind::CharConst, TokenValue::Int(i)) => (Type::IntRange(0, 255), Value::Int(i)),
            (TokenKind::StringConst, TokenValue::Str(s)) => (Type::String, Value::Str(s)),
            (TokenKind::SymbolConst, TokenValue::Sym(s)) => (Type::Symbol, Value::Symbol(s)),
            (TokenKind::KwTrue, _) => (Type::Bool, Value::Bool(true)),
            (TokenKind::KwFalse, _) => (Type::Bool, Value::Bool(false)),
            (TokenKind::FloatConst, TokenValue::Float(f)) => (Type::None, Value::Float(f)),
            _ => (Type::None, Value::None),
        };
        self.d.ast[x].tp = tp;
        self.d.ast[x].val = val;
        self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
        Ok(())
    }

    fn sem_name(&mut self, x: NodeId, id: Symbol) -> Result<()> {
        let b = self.find_id(id, x)?;
        let crossed = self.rep_crossed();
        let mut depth = 0;
        let (tp, val, unconst) = match &self.d.ast[b].kind {
            NodeKind::RepExpr { .. } | NodeKind::RepStmt { .. } => {
                depth = self.find_level(id);
                (Type::Int, Value::None, true)
            }
            NodeKind::VarDecl { .. }
            | NodeKind::Parameter { .. }
            | NodeKind::MetaParameter { .. }
            | NodeKind::WireDecl { .. } => {
                depth = crossed;
                (self.d.ast[b].tp.clone(), Value::None, true)
            }
            NodeKind::ConstDef { .. } => {
                (self.d.ast[b].tp.clone(), self.d.ast[b].val.clone(), false)
            }
            NodeKind::FunctionDef { .. } => (self.d.ast[b].tp.clone(), Value::None, true),
            NodeKind::ProcessDef { .. } => (Type::None, Value::None, true),
            NodeKind::InstanceStmt { .. } => (Type::None, Value::None, true),
            NodeKind::PropertyDecl { .. } => {
                if !self.flags.contains(super::SemFlags::PROP) {
                    return Err(self.d.node_error(
                        x,
                        format!(
                            "Property {} cannot be referenced here",
                            self.d.interner.resolve(id)
                        ),
                    ));
                }
                (Type::Int, Value::None, true)
            }
            NodeKind::TypeDef { .. } => {
                return Err(self.d.node_error(
                    x,
                    format!(
                        "Type {} cannot be used as an expression",
                        self.d.interner.resolve(id)
                    ),
                ))
            }
            NodeKind::FieldDef { .. } => {
                return Err(self.d.node_error(
                    x,
                    format!(
                        "Field {} can only select from an expression",
                        self.d.interner.resolve(id)
                    ),
                ))
            }
            _ => (Type::None, Value::None, true),
        };
        if let NodeKind::Name {
            binding, depth: ds, ..
        } = &mut self.d.ast[x].kind
        {
            *binding = Some(b);
            *ds = depth;
        }
        self.d.ast[x].tp = tp;
        if unconst {
            self.d.ast[x].flags |= NodeFlags::UNCONST;
        } else {
            self.d.ast[x].val = val;
            self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
        }
        Ok(())
    }

    fn both_folded(&self, l: NodeId, r: NodeId) -> bool {
        self.d.ast[l].flags.contains(NodeFlags::CONST_FOLDED)
            && self.d.ast[r].flags.contains(NodeFlags::CONST_FOLDED)
    }

    fn propagate_unconst(&mut self, x: NodeId, parts: &[NodeId]) {
        if parts
            .iter()
            .any(|&p| self.d.ast[p].flags.contains(NodeFlags::UNCONST))
        {
            self.d.ast[x].flags |= NodeFlags::UNCONST;
        }
    }

    fn sem_binary(&mut self, x: NodeId, op: TokenKind, l: NodeId, r: NodeId) -> Result<()> {
        use TokenKind::*;
        self.sem_expr(l)?;
        self.sem_expr(r)?;
        self.propagate_unconst(x, &[l, r]);
        let lt = self.d.ast[l].tp.clone();
        let rt = self.d.ast[r].tp.clone();
        let tp = match op {
            Plus | Minus | Star | Slash | Percent | KwMod | Caret => {
                if !lt.is_integer() || !rt.is_integer() {
                    return Err(self.d.node_error(
                        x,
                        format!("Operands of '{}' must be integers", op.name()),
                    ));
                }
                Type::Int
            }
            Concat => match (&lt, &rt) {
                (Type::String, Type::String)
                | (Type::String, Type::Array { .. })
                | (Type::Array { .. }, Type::String) => Type::String,
                (Type::Array { l: al, elem, .. }, Type::Array { .. }) => {
                    let len = lt.array_len().unwrap_or(0) + rt.array_len().unwrap_or(0);
                    Type::Array {
                        l: *al,
                        h: *al + len - 1,
                        elem: elem.clone(),
                    }
                }
                (Type::None, _) | (_, Type::None) => Type::None,
                _ => {
                    return Err(self
                        .d
                        .node_error(x, "Operands of '++' must be arrays or strings".into()))
                }
            },
            Eq | Neq => {
                if !assignable(&lt, &rt) && !assignable(&rt, &lt) {
                    return Err(self
                        .d
                        .node_error(x, "Comparison of incompatible types".into()));
                }
                Type::Bool
            }
            Lt | Gt | Lte | Gte => {
                if !lt.is_integer() || !rt.is_integer() {
                    return Err(self.d.node_error(
                        x,
                        format!("Operands of '{}' must be integers", op.name()),
                    ));
                }
                Type::Bool
            }
            Amp | Or | KwXor => {
                if lt.is_bool() && rt.is_bool() {
                    Type::Bool
                } else if lt.is_integer() && rt.is_integer() {
                    Type::Int
                } else {
                    return Err(self.d.node_error(
                        x,
                        format!("Operands of '{}' must both be boolean or integer", op.name()),
                    ));
                }
            }
            _ => Type::None,
        };
        self.d.ast[x].tp = tp;
        if !self.d.ast[x].flags.contains(NodeFlags::UNCONST) && self.both_folded(l, r) {
            let lv = self.d.ast[l].val.clone();
            let rv = self.d.ast[r].val.clone();
            match fold_binary(op, &lv, &rv) {
                Ok(Value::None) => {}
                Ok(v) => {
                    self.d.ast[x].val = v;
                    self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
                }
                Err(msg) => return Err(self.d.node_error(x, msg)),
            }
        }
        Ok(())
    }

    fn sem_prefix(&mut self, x: NodeId, op: TokenKind, r: NodeId) -> Result<()> {
        use TokenKind::*;
        if op == Hash {
            self.sem_expr(r)?;
            self.port_base(r)?;
            self.d.ast[x].tp = Type::Bool;
            self.d.ast[x].flags |= NodeFlags::UNCONST;
            return Ok(());
        }
        self.sem_expr(r)?;
        self.propagate_unconst(x, &[r]);
        let rt = self.d.ast[r].tp.clone();
        let tp = match op {
            Plus | Minus => {
                if !rt.is_integer() {
                    return Err(self.d.node_error(
                        x,
                        format!("Operand of unary '{}' must be an integer", op.name()),
                    ));
                }
                Type::Int
            }
            Tilde => {
                if rt.is_bool() {
                    Type::Bool
                } else if rt.is_integer() {
                    Type::Int
                } else {
                    return Err(self
                        .d
                        .node_error(x, "Operand of '~' must be boolean or integer".into()));
                }
            }
            _ => Type::None,
        };
        self.d.ast[x].tp = tp;
        if !self.d.ast[x].flags.contains(NodeFlags::UNCONST)
            && self.d.ast[r].flags.contains(NodeFlags::CONST_FOLDED)
        {
            let rv = self.d.ast[r].val.clone();
            match fold_prefix(op, &rv) {
                Ok(Value::None) => {}
                Ok(v) => {
                    self.d.ast[x].val = v;
                    self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
                }
                Err(msg) => return Err(self.d.node_error(x, msg)),
            }
        }
        Ok(())
    }

    fn sem_subscript(&mut self, x: NodeId, a: NodeId, idx: NodeId) -> Result<()> {
        self.sem_expr(a)?;
        self.sem_expr(idx)?;
        self.propagate_unconst(x, &[a, idx]);
        if !self.d.ast[idx].tp.is_integer() {
            return Err(self.d.node_error(idx, "Array index must be an integer".into()));
        }
        let tp = match &self.d.ast[a].tp {
            Type::Array { elem, .. } => (**elem).clone(),
            Type::String => Type::IntRange(0, 255),
            Type::None => Type::None,
            _ => return Err(self.d.node_error(x, "Subscript of a non-array".into())),
        };
        self.d.ast[x].tp = tp;
        if !self.d.ast[x].flags.contains(NodeFlags::UNCONST) && self.both_folded(a, idx) {
            let av = self.d.ast[a].val.clone();
            let iv = self.d.ast[idx].val.clone();
            if let (Value::Array(items), Value::Int(i)) = (&av, &iv) {
                let base = match &self.d.ast[a].tp {
                    Type::Array { l, .. } => *l,
                    _ => 0,
                };
                let off = i - base;
                if off < 0 || off as usize >= items.len() {
                    return Err(self.d.node_error(x, "Array index out of range".into()));
                }
                self.d.ast[x].val = items[off as usize].clone();
                self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
            }
        }
        Ok(())
    }

    fn sem_subrange(&mut self, x: NodeId, a: NodeId, l: NodeId, h: NodeId) -> Result<()> {
        self.sem_expr(a)?;
        let lv = self.const_int_bound(l, "Lower bound of a subrange")?;
        let hv = self.const_int_bound(h, "Upper bound of a subrange")?;
        self.propagate_unconst(x, &[a]);
        let tp = match &self.d.ast[a].tp {
            Type::Array { elem, .. } => Type::Array {
                l: lv,
                h: hv,
                elem: elem.clone(),
            },
            Type::String => Type::String,
            Type::None => Type::None,
            _ => return Err(self.d.node_error(x, "Subrange of a non-array".into())),
        };
        self.d.ast[x].tp = tp;
        Ok(())
    }

    fn sem_field_of(&mut self, x: NodeId, a: NodeId, id: Symbol) -> Result<()> {
        self.sem_expr(a)?;
        self.propagate_unconst(x, &[a]);
        let at = self.d.ast[a].tp.clone();
        let tp = match &at {
            Type::Record(fields) => match fields.iter().find(|(n, _)| *n == id) {
                Some((_, t)) => t.clone(),
                None => {
                    return Err(self.d.node_error(
                        x,
                        format!("Record has no field {}", self.d.interner.resolve(id)),
                    ))
                }
            },
            Type::Wired { li, lo } => {
                match li
                    .iter()
                    .chain(lo.iter())
                    .find(|(n, _)| *n == id)
                {
                    Some((_, t)) => t.clone(),
                    None => {
                        return Err(self.d.node_error(
                            x,
                            format!("Wired type has no wire {}", self.d.interner.resolve(id)),
                        ))
                    }
                }
            }
            Type::Union(u) => match u.fields.iter().find(|arm| arm.id == id) {
                Some(arm) => arm.tp.clone(),
                None => {
                    return Err(self.d.node_error(
                        x,
                        format!("Union has no field {}", self.d.interner.resolve(id)),
                    ))
                }
            },
            Type::Int | Type::IntRange(..) => {
                // a declared bit-field alias
                let f = self.find_id(id, x)?;
                if !matches!(self.d.ast[f].kind, NodeKind::FieldDef { .. }) {
                    return Err(self.d.node_error(
                        x,
                        format!("{} is not a field", self.d.interner.resolve(id)),
                    ));
                }
                if let NodeKind::FieldOf { field, .. } = &mut self.d.ast[x].kind {
                    *field = Some(f);
                }
                Type::Int
            }
            Type::None => match self.instance_port_type(a, id)? {
                Some(t) => t,
                None => Type::None,
            },
            _ => {
                return Err(self
                    .d
                    .node_error(x, "Field selection on a non-record".into()))
            }
        };
        self.d.ast[x].tp = tp;
        Ok(())
    }

    /// `u.r` where `u` is a process instance selects the port `r` of the
    /// instantiated process.
    fn instance_port_type(&mut self, a: NodeId, id: Symbol) -> Result<Option<Type>> {
        let b = match &self.d.ast[a].kind {
            NodeKind::Name {
                binding: Some(b), ..
            } => *b,
            _ => return Ok(None),
        };
        let mut t = match &self.d.ast[b].kind {
            NodeKind::VarDecl { tps, .. } => *tps,
            _ => return Ok(None),
        };
        loop {
            match &self.d.ast[t].kind {
                NodeKind::DummyType { tps: Some(n) } => t = *n,
                NodeKind::ArrayType { tps: n, .. } => t = *n,
                NodeKind::NamedType {
                    binding: Some(p), ..
                } => {
                    let pl = match &self.d.ast[*p].kind {
                        NodeKind::ProcessDef { pl, .. } => pl.clone(),
                        _ => return Ok(None),
                    };
                    let port = pl
                        .into_iter()
                        .find(|&q| self.d.ast.name_of(q) == Some(id));
                    return match port {
                        Some(q) => Ok(Some(self.d.ast[q].tp.clone())),
                        None => Err(self.d.node_error(
                            a,
                            format!("Process has no port {}", self.d.interner.resolve(id)),
                        )),
                    };
                }
                _ => return Ok(None),
            }
        }
    }

    fn sem_call(&mut self, x: NodeId, id: Symbol, args: &[NodeId]) -> Result<()> {
        let b = self.find_id(id, x)?;
        if !matches!(self.d.ast[b].kind, NodeKind::FunctionDef { .. }) {
            return Err(self.d.node_error(
                x,
                format!("{} is not a function or procedure", self.d.interner.resolve(id)),
            ));
        }
        for &a in args {
            self.sem_expr(a)?;
        }
        let (pl, varargs) = match &self.d.ast[b].kind {
            NodeKind::FunctionDef { pl, .. } => {
                (pl.clone(), self.d.ast[b].flags.contains(NodeFlags::VARARGS))
            }
            _ => unreachable!(),
        };
        if args.len() < pl.len() || (!varargs && args.len() > pl.len()) {
            return Err(self.d.node_error(
                x,
                format!(
                    "{} takes {} argument(s), not {}",
                    self.d.interner.resolve(id),
                    pl.len(),
                    args.len()
                ),
            ));
        }
        for (&p, &a) in pl.iter().zip(args.iter()) {
            let ptp = self.d.ast[p].tp.clone();
            if !assignable(&ptp, &self.d.ast[a].tp) {
                return Err(self
                    .d
                    .node_error(a, "Argument type does not match parameter".into()));
            }
            let par_sym = match &self.d.ast[p].kind {
                NodeKind::Parameter { par_sym, .. } => *par_sym,
                _ => TokenKind::KwVal,
            };
            if par_sym == TokenKind::KwRes || par_sym == TokenKind::KwValres {
                self.check_lvalue(a)?;
            }
        }
        if let NodeKind::Call { binding, .. } = &mut self.d.ast[x].kind {
            *binding = Some(b);
        }
        self.d.ast[x].tp = self.d.ast[b].tp.clone();
        self.d.ast[x].flags |= NodeFlags::UNCONST;
        Ok(())
    }

    fn sem_array_cons(&mut self, x: NodeId, l: &[NodeId]) -> Result<()> {
        let mut elem = Type::None;
        for &e in l {
            self.sem_expr(e)?;
            let et = self.d.ast[e].tp.clone();
            if matches!(elem, Type::None) {
                elem = et;
            } else if !assignable(&elem, &et) {
                return Err(self
                    .d
                    .node_error(e, "Array elements have incompatible types".into()));
            }
        }
        self.propagate_unconst(x, l);
        self.d.ast[x].tp = Type::Array {
            l: 0,
            h: l.len() as i64 - 1,
            elem: Rc::new(elem),
        };
        if !self.d.ast[x].flags.contains(NodeFlags::UNCONST)
            && l.iter()
                .all(|&e| self.d.ast[e].flags.contains(NodeFlags::CONST_FOLDED))
        {
            let items: Vec<Value> = l.iter().map(|&e| self.d.ast[e].val.clone()).collect();
            self.d.ast[x].val = Value::Array(items);
            self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
        }
        Ok(())
    }

    fn sem_record_cons(&mut self, x: NodeId, l: &[NodeId]) -> Result<()> {
        let mut fields = Vec::new();
        for &e in l {
            self.sem_expr(e)?;
            fields.push((Symbol::EMPTY, self.d.ast[e].tp.clone()));
        }
        self.propagate_unconst(x, l);
        self.d.ast[x].tp = Type::Record(Rc::new(fields));
        if !self.d.ast[x].flags.contains(NodeFlags::UNCONST)
            && l.iter()
                .all(|&e| self.d.ast[e].flags.contains(NodeFlags::CONST_FOLDED))
        {
            let items: Vec<Value> = l.iter().map(|&e| self.d.ast[e].val.clone()).collect();
            self.d.ast[x].val = Value::Record(items);
            self.d.ast[x].flags |= NodeFlags::CONST_FOLDED;
        }
        Ok(())
    }

    fn sem_value_probe(&mut self, x: NodeId, p: &[NodeId], b: NodeId) -> Result<()> {
        for &port in p {
            self.sem_expr(port)?;
            let flags = self.port_base(port)?;
            if !flags.contains(NodeFlags::INPORT) {
                return Err(self
                    .d
                    .node_error(port, "A value probe needs an input port".into()));
            }
        }
        let saved = self.flags;
        self.flags |= super::SemFlags::VALUE_PROBE;
        self.sem_expr(b)?;
        self.flags = saved;
        if !self.d.ast[b].tp.is_bool() {
            return Err(self
                .d
                .node_error(b, "The condition of a value probe must be boolean".into()));
        }
        self.d.ast[x].tp = Type::Bool;
        self.d.ast[x].flags |= NodeFlags::UNCONST;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn sem_rep_expr(
        &mut self,
        x: NodeId,
        sym: TokenKind,
        id: Symbol,
        l: NodeId,
        h: NodeId,
        v: NodeId,
        cxt: Option<crate::scope::CtxId>,
    ) -> Result<()> {
        use TokenKind::*;
        self.sem_rep_common(l, h)?;
        let c = self.enter_sublevel(x, id, cxt);
        if let NodeKind::RepExpr { cxt, .. } = &mut self.d.ast[x].kind {
            *cxt = Some(c);
        }
        self.sem_expr(v)?;
        let vt = self.d.ast[v].tp.clone();
        self.leave_level();
        let tp = match sym {
            Plus | Star | Caret => {
                if !vt.is_integer() {
                    return Err(self
                        .d
                        .node_error(v, "Replicated arithmetic needs an integer body".into()));
                }
                Type::Int
            }
            Concat => vt,
            Amp | Or | KwXor => {
                if !vt.is_bool() {
                    return Err(self
                        .d
                        .node_error(v, "Replicated boolean operator needs a boolean body".into()));
                }
                Type::Bool
            }
            Eq | Neq => Type::Bool,
            _ => Type::None,
        };
        self.d.ast[x].tp = tp;
        self.d.ast[x].flags |= NodeFlags::UNCONST;
        Ok(())
    }

    /// The base declaration flags of a port expression (a port name,
    /// possibly subscripted). Errors when the expression is not a port.
    pub(super) fn port_base(&mut self, x: NodeId) -> Result<NodeFlags> {
        let mut cur = x;
        loop {
            match &self.d.ast[cur].kind {
                NodeKind::Subscript { x, .. } | NodeKind::Subrange { x, .. } => cur = *x,
                NodeKind::Name {
                    binding: Some(b), ..
                } => {
                    let f = self.d.ast[*b].flags;
                    if f.intersects(NodeFlags::INPORT | NodeFlags::OUTPORT | NodeFlags::PORT) {
                        return Ok(f);
                    }
                    return Err(self.d.node_error(x, "Expected a port".into()));
                }
                _ => return Err(self.d.node_error(x, "Expected a port".into())),
            }
        }
    }

    /// Verify that `x` can be assigned to: a variable, a non-const
    /// parameter, or the return slot of the routine being analyzed,
    /// possibly behind subscripts and field selections.
    pub(super) fn check_lvalue(&mut self, x: NodeId) -> Result<()> {
        match &self.d.ast[x].kind {
            NodeKind::Subscript { x: a, .. }
            | NodeKind::Subrange { x: a, .. }
            | NodeKind::FieldOf { x: a, .. } => {
                let a = *a;
                self.check_lvalue(a)
            }
            NodeKind::Name {
                binding: Some(b), ..
            } => {
                let b = *b;
                match &self.d.ast[b].kind {
                    NodeKind::VarDecl { .. } | NodeKind::WireDecl { .. } => Ok(()),
                    NodeKind::Parameter { par_sym, .. } => {
                        if *par_sym == TokenKind::KwConst {
                            Err(self
                                .d
                                .node_error(x, "Cannot assign to a const parameter".into()))
                        } else {
                            Ok(())
                        }
                    }
                    NodeKind::FunctionDef { ret, .. } => {
                        if Some(b) == self.curr_routine() && ret.is_some() {
                            Ok(())
                        } else {
                            Err(self.d.node_error(x, "Expression is not assignable".into()))
                        }
                    }
                    NodeKind::RepExpr { .. } | NodeKind::RepStmt { .. } => Err(self
                        .d
                        .node_error(x, "Cannot assign to a replication variable".into())),
                    _ => Err(self.d.node_error(x, "Expression is not assignable".into())),
                }
            }
            _ => Err(self.d.node_error(x, "Expression is not assignable".into())),
        }
    }

    pub(super) fn curr_routine(&self) -> Option<NodeId> {
        self.curr_routine
    }
}

// ----- constant folding -----

fn to_big(v: &Value) -> Option<BigInt> {
    match v {
        Value::Int(i) => Some(BigInt::from(*i)),
        Value::Big(z) => Some(z.clone()),
        _ => None,
    }
}

/// Shrink a big result back into a machine word when it fits.
fn norm_int(z: BigInt) -> Value {
    match z.to_i64() {
        Some(i) => Value::Int(i),
        None => Value::Big(z),
    }
}

/// Fold a binary operator over two constant values. `Value::None` means
/// "not foldable here" (not an error).
fn fold_binary(op: TokenKind, l: &Value, r: &Value) -> std::result::Result<Value, String> {
    use TokenKind::*;
    if let (Some(a), Some(b)) = (to_big(l), to_big(r)) {
        return match op {
            Plus => Ok(norm_int(a + b)),
            Minus => Ok(norm_int(a - b)),
            Star => Ok(norm_int(a * b)),
            Slash => {
                if b.is_zero() {
                    Err("Division by zero".into())
                } else {
                    Ok(norm_int(a / b))
                }
            }
            Percent | KwMod => {
                if b.is_zero() {
                    Err("Division by zero".into())
                } else {
                    Ok(norm_int(a % b))
                }
            }
            Caret => {
                if b.is_negative() {
                    Err("Negative exponent".into())
                } else {
                    match b.to_u32() {
                        Some(e) => Ok(norm_int(a.pow(e))),
                        None => Err("Exponent too large".into()),
                    }
                }
            }
            Eq => Ok(Value::Bool(a == b)),
            Neq => Ok(Value::Bool(a != b)),
            Lt => Ok(Value::Bool(a < b)),
            Gt => Ok(Value::Bool(a > b)),
            Lte => Ok(Value::Bool(a <= b)),
            Gte => Ok(Value::Bool(a >= b)),
            Amp => Ok(norm_int(a & b)),
            Or => Ok(norm_int(a | b)),
            KwXor => Ok(norm_int(a ^ b)),
            _ => Ok(Value::None),
        };
    }
    match (op, l, r) {
        (Amp, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        (KwXor, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a != b)),
        (Eq, a, b) => Ok(Value::Bool(a == b)),
        (Neq, a, b) => Ok(Value::Bool(a != b)),
        (Concat, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Concat, Value::Array(a), Value::Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(Value::Array(out))
        }
        _ => Ok(Value::None),
    }
}

fn fold_prefix(op: TokenKind, r: &Value) -> std::result::Result<Value, String> {
    use TokenKind::*;
    match (op, r) {
        (Plus, _) => match to_big(r) {
            Some(z) => Ok(norm_int(z)),
            None => Ok(Value::None),
        },
        (Minus, _) => match to_big(r) {
            Some(z) => Ok(norm_int(-z)),
            None => Ok(Value::None),
        },
        (Tilde, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (Tilde, Value::Int(i)) => Ok(Value::Int(!i)),
        (Tilde, Value::Big(z)) => Ok(norm_int(!z.clone())),
        _ => Ok(Value::None),
    }
}
