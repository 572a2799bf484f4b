//! Statement and production-rule analysis.

use super::{Analyzer, SemFlags};
use crate::ast::{CommOp, NodeFlags, NodeId, NodeKind};
use crate::error::Result;
use crate::intern::Symbol;
use crate::scope::CtxId;
use crate::token::TokenKind;
use crate::types::{assignable, type_compatible};

impl<'d> Analyzer<'d> {
    /// Semantic analysis of a statement. Bare expressions are legal
    /// statements too: procedure calls and synchronizations.
    pub(super) fn sem_stmt(&mut self, x: NodeId) -> Result<()> {
        let kind = self.d.ast[x].kind.clone();
        match kind {
            NodeKind::Skip | NodeKind::EndStmt => Ok(()),
            NodeKind::Assign { v, e } => self.sem_assign(x, v, e),
            NodeKind::BoolSet { v, .. } => self.sem_bool_set(x, v),
            NodeKind::Comm { p, op, e } => self.sem_comm(x, p, op, e),
            NodeKind::Guarded { g, l } => self.sem_guarded(g, &l),
            NodeKind::Select { gl, w, .. } => self.sem_select(x, &gl, w),
            NodeKind::LoopStmt { gl, sl, .. } => {
                for &g in &gl {
                    self.sem(g)?;
                }
                for &s in &sl {
                    self.sem(s)?;
                }
                Ok(())
            }
            NodeKind::Compound { l } | NodeKind::Parallel { l } => {
                for &s in &l {
                    self.sem(s)?;
                }
                Ok(())
            }
            NodeKind::Connect { a, b } => self.sem_connect(x, a, b),
            NodeKind::InstanceStmt { d, mb } => self.sem_instance(x, d, mb),
            NodeKind::MetaBinding { x: xe, a } => self.sem_meta_binding(x, xe, &a),
            NodeKind::RepStmt {
                id, l, h, sl, cxt, ..
            } => self.sem_rep_stmt(x, id, l, h, &sl, cxt),
            NodeKind::PropertyStmt { id, node, v } => self.sem_property_stmt(x, id, node, v),
            NodeKind::ProductionRule { g, v, delay, .. } => self.sem_production_rule(g, v, delay),
            NodeKind::Transition { v, .. } => {
                self.sem_bool_wire(v)?;
                Ok(())
            }
            NodeKind::DelayHold { l, c, n } => self.sem_delay_hold(&l, c, n),
            _ => self.sem_expr_stmt(x),
        }
    }

    /// A bare expression as a statement: only a procedure call or a
    /// synchronization on a dataless port stands.
    fn sem_expr_stmt(&mut self, x: NodeId) -> Result<()> {
        self.sem_expr(x)?;
        match &self.d.ast[x].kind {
            NodeKind::Call { .. } => Ok(()),
            NodeKind::Name { .. } | NodeKind::Subscript { .. } => {
                if let Ok(f) = self.port_base(x) {
                    if f.contains(NodeFlags::PORT) {
                        return Ok(());
                    }
                }
                Err(self
                    .d
                    .node_error(x, "Only a sync port can stand alone as a statement".into()))
            }
            NodeKind::Binary {
                op: TokenKind::Eq, ..
            } => Err(self.d.node_error(x, "Maybe you mean ':=' ?".into())),
            _ => Err(self.d.node_error(x, "Expression is not a statement".into())),
        }
    }

    fn sem_assign(&mut self, x: NodeId, v: NodeId, e: NodeId) -> Result<()> {
        self.sem_expr(v)?;
        self.check_lvalue(v)?;
        self.sem_expr(e)?;
        let vt = self.d.ast[v].tp.clone();
        let et = self.d.ast[e].tp.clone();
        if !assignable(&vt, &et) {
            return Err(self.d.node_error(x, "Type mismatch in assignment".into()));
        }
        Ok(())
    }

    fn sem_bool_set(&mut self, x: NodeId, v: NodeId) -> Result<()> {
        self.sem_expr(v)?;
        self.check_lvalue(v)?;
        if !self.d.ast[v].tp.is_bool() {
            return Err(self
                .d
                .node_error(x, "A '+' or '-' statement needs a boolean variable".into()));
        }
        Ok(())
    }

    fn sem_comm(&mut self, x: NodeId, p: NodeId, op: CommOp, e: NodeId) -> Result<()> {
        if self.flags.contains(SemFlags::FUNC_DEF) {
            return Err(self.d.node_error(
                x,
                "Communication cannot occur in a function or procedure".into(),
            ));
        }
        self.sem_expr(p)?;
        let pflags = self.port_base(p)?;
        match op {
            CommOp::Send => {
                if !pflags.contains(NodeFlags::OUTPORT) {
                    return Err(self.d.node_error(p, "Sending requires an output port".into()));
                }
            }
            CommOp::Recv | CommOp::Peek => {
                if !pflags.contains(NodeFlags::INPORT) {
                    return Err(self.d.node_error(p, "Receiving requires an input port".into()));
                }
            }
            CommOp::SendRecv => {
                if !pflags.intersects(NodeFlags::INPORT | NodeFlags::OUTPORT) {
                    return Err(self.d.node_error(p, "Expected a directed port".into()));
                }
            }
        }
        self.sem_expr(e)?;
        let ptp = self.d.ast[p].tp.clone();
        let etp = self.d.ast[e].tp.clone();
        match op {
            CommOp::Send => {
                if !assignable(&ptp, &etp) {
                    return Err(self
                        .d
                        .node_error(e, "Sent value does not match the port's type".into()));
                }
            }
            CommOp::Recv | CommOp::Peek | CommOp::SendRecv => {
                self.check_lvalue(e)?;
                if !assignable(&etp, &ptp) {
                    return Err(self
                        .d
                        .node_error(e, "Received value does not match the port's type".into()));
                }
            }
        }
        Ok(())
    }

    fn sem_guarded(&mut self, g: NodeId, l: &[NodeId]) -> Result<()> {
        self.sem_expr(g)?;
        if !self.d.ast[g].tp.is_bool() {
            return Err(self.d.node_error(g, "A guard must be a boolean expression".into()));
        }
        for &s in l {
            self.sem(s)?;
        }
        Ok(())
    }

    fn sem_select(&mut self, x: NodeId, gl: &[NodeId], w: Option<NodeId>) -> Result<()> {
        for &g in gl {
            self.sem(g)?;
        }
        if let Some(w) = w {
            self.sem_expr(w)?;
            if !self.d.ast[w].tp.is_bool() {
                return Err(self
                    .d
                    .node_error(w, "A wait must be a boolean expression".into()));
            }
        } else if gl.is_empty() {
            self.d
                .node_warning(x, "Selection without guarded commands");
            self.d.ast[x].flags |= NodeFlags::ERROR;
        }
        Ok(())
    }

    fn sem_connect(&mut self, x: NodeId, a: NodeId, b: NodeId) -> Result<()> {
        if !self.flags.contains(SemFlags::META) {
            return Err(self.d.node_error(
                x,
                "A connection statement can only occur in a meta process".into(),
            ));
        }
        let saved = self.flags;
        self.flags |= SemFlags::CONNECT;
        self.sem_expr(a)?;
        self.sem_expr(b)?;
        self.flags = saved;
        let at = self.d.ast[a].tp.clone();
        let bt = self.d.ast[b].tp.clone();
        if !type_compatible(&at, &bt) {
            return Err(self
                .d
                .node_error(x, "Connected ports have incompatible types".into()));
        }
        Ok(())
    }

    /// `instance x: P(args);` — declares the instance and checks the meta
    /// binding against the process's meta parameters.
    fn sem_instance(&mut self, x: NodeId, d: NodeId, mb: Option<NodeId>) -> Result<()> {
        if !self.flags.contains(SemFlags::META) {
            return Err(self.d.node_error(
                x,
                "An instance declaration can only occur in a meta process".into(),
            ));
        }
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let saved = self.flags;
        self.flags |= SemFlags::INSTANCE_DECL;
        let (id, tps) = match &self.d.ast[d].kind {
            NodeKind::VarDecl { id, tps, .. } => (*id, *tps),
            _ => unreachable!(),
        };
        self.declare_id(id, d)?;
        let proc = self.instance_process(tps)?;
        let idx = self.var_idx;
        self.var_idx += 1;
        if let NodeKind::VarDecl { var_idx, .. } = &mut self.d.ast[d].kind {
            *var_idx = idx;
        }
        self.d.ast[d].flags |= NodeFlags::FORWARD;
        self.flags = saved;
        if let Some(mb) = mb {
            if !self.d.ast[mb].flags.contains(NodeFlags::FORWARD) {
                let args = match &self.d.ast[mb].kind {
                    NodeKind::MetaBinding { a, .. } => a.clone(),
                    _ => Vec::new(),
                };
                self.check_meta_args(mb, proc, &args)?;
                self.d.ast[mb].flags |= NodeFlags::FORWARD;
            }
        }
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    /// Resolve the process named by an instance declaration's type,
    /// through any inline array dimensions.
    fn instance_process(&mut self, tps: NodeId) -> Result<NodeId> {
        match self.d.ast[tps].kind.clone() {
            NodeKind::DummyType { tps: Some(t) } => self.instance_process(t),
            NodeKind::ArrayType { l, h, tps: t } => {
                self.const_int_bound(l, "Lower bound of an instance array")?;
                self.const_int_bound(h, "Upper bound of an instance array")?;
                self.instance_process(t)
            }
            NodeKind::NamedType { id, .. } => {
                let b = self.find_id(id, tps)?;
                if !matches!(self.d.ast[b].kind, NodeKind::ProcessDef { .. }) {
                    return Err(self.d.node_error(
                        tps,
                        format!("{} is not a process", self.d.interner.resolve(id)),
                    ));
                }
                if let NodeKind::NamedType { binding, .. } = &mut self.d.ast[tps].kind {
                    *binding = Some(b);
                }
                Ok(b)
            }
            _ => Err(self.d.node_error(tps, "Expected a process name".into())),
        }
    }

    /// `x(a1,...,an)` as a statement: apply meta arguments to an already
    /// declared instance.
    fn sem_meta_binding(&mut self, x: NodeId, xe: Option<NodeId>, args: &[NodeId]) -> Result<()> {
        if !self.flags.contains(SemFlags::META) {
            return Err(self
                .d
                .node_error(x, "A meta binding can only occur in a meta process".into()));
        }
        let Some(xe) = xe else {
            // argument-only bindings are checked at their use site
            for &a in args {
                self.sem_expr(a)?;
            }
            return Ok(());
        };
        self.sem_expr(xe)?;
        let mut proc = None;
        if let NodeKind::Name {
            binding: Some(b), ..
        } = self.d.ast[xe].kind
        {
            if let NodeKind::VarDecl { tps, .. } = self.d.ast[b].kind {
                if let Ok(p) = self.instance_process(tps) {
                    proc = Some(p);
                }
            }
        }
        let Some(proc) = proc else {
            return Err(self
                .d
                .node_error(xe, "A meta binding needs a process instance".into()));
        };
        self.check_meta_args(x, proc, args)
    }

    fn check_meta_args(&mut self, at: NodeId, proc: NodeId, args: &[NodeId]) -> Result<()> {
        for &a in args {
            self.sem_expr(a)?;
        }
        let ml = match &self.d.ast[proc].kind {
            NodeKind::ProcessDef { ml, .. } => ml.clone(),
            _ => return Ok(()),
        };
        if args.len() != ml.len() {
            return Err(self.d.node_error(
                at,
                format!(
                    "Process takes {} meta parameter(s), not {}",
                    ml.len(),
                    args.len()
                ),
            ));
        }
        for (&m, &a) in ml.iter().zip(args.iter()) {
            let mtp = self.d.ast[m].tp.clone();
            if !assignable(&mtp, &self.d.ast[a].tp) {
                return Err(self
                    .d
                    .node_error(a, "Meta argument type does not match parameter".into()));
            }
        }
        Ok(())
    }

    fn sem_rep_stmt(
        &mut self,
        x: NodeId,
        id: Symbol,
        l: NodeId,
        h: NodeId,
        sl: &[NodeId],
        cxt: Option<CtxId>,
    ) -> Result<()> {
        self.sem_rep_common(l, h)?;
        let c = self.enter_sublevel(x, id, cxt);
        if let NodeKind::RepStmt { cxt, .. } = &mut self.d.ast[x].kind {
            *cxt = Some(c);
        }
        for &s in sl {
            self.sem(s)?;
        }
        self.leave_level();
        Ok(())
    }

    fn sem_property_stmt(&mut self, x: NodeId, id: Symbol, node: NodeId, v: NodeId) -> Result<()> {
        let b = self.find_id(id, x)?;
        if !matches!(self.d.ast[b].kind, NodeKind::PropertyDecl { .. }) {
            return Err(self.d.node_error(
                x,
                format!("{} is not a property", self.d.interner.resolve(id)),
            ));
        }
        let saved = self.flags;
        self.flags |= SemFlags::PROP;
        self.sem_expr(node)?;
        self.sem_expr(v)?;
        self.flags = saved;
        if !self.d.ast[v].tp.is_integer() {
            return Err(self
                .d
                .node_error(v, "A property value must be an integer".into()));
        }
        Ok(())
    }

    fn sem_production_rule(&mut self, g: NodeId, v: NodeId, delay: Option<NodeId>) -> Result<()> {
        self.sem_expr(g)?;
        if !self.d.ast[g].tp.is_bool() {
            return Err(self
                .d
                .node_error(g, "A production rule guard must be boolean".into()));
        }
        self.sem_bool_wire(v)?;
        if let Some(delay) = delay {
            self.sem_expr(delay)?;
            if !self.d.ast[delay].tp.is_integer() {
                return Err(self.d.node_error(delay, "A delay must be an integer".into()));
            }
        }
        Ok(())
    }

    /// The target of a transition: a boolean wire or variable.
    fn sem_bool_wire(&mut self, v: NodeId) -> Result<()> {
        self.sem_expr(v)?;
        self.check_lvalue(v)?;
        if !self.d.ast[v].tp.is_bool() {
            return Err(self
                .d
                .node_error(v, "The target of a transition must be boolean".into()));
        }
        Ok(())
    }

    fn sem_delay_hold(&mut self, l: &[NodeId], c: NodeId, n: Option<NodeId>) -> Result<()> {
        for &t in l {
            self.sem(t)?;
        }
        self.sem_expr(c)?;
        if !self.d.ast[c].tp.is_bool() && !self.d.ast[c].tp.is_integer() {
            return Err(self
                .d
                .node_error(c, "A delay condition must be boolean or a counter".into()));
        }
        if let Some(n) = n {
            self.sem_expr(n)?;
        }
        Ok(())
    }
}
