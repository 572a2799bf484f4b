//! Statement, body, and production-rule parsing.

use super::{ParseFlags, Parser};
use crate::ast::{BodyKind, CommOp, NodeFlags, NodeId, NodeKind};
use crate::error::Result;
use crate::token::{TokenKind, TokenValue};

impl<'l, 'i> Parser<'l, 'i> {
    /// Parse a guarded command whose guard may itself turn out to be a
    /// guard replicator. `sym` is the selection separator already in use
    /// (`[]` or `[:]`); a replicator with the other separator is an error.
    pub fn parse_guard_aux(&mut self, sym: TokenKind) -> Result<NodeId> {
        self.pflags.insert(ParseFlags::GC);
        let tmp = self.parse_expr()?;
        self.pflags.remove(ParseFlags::GC);
        if let NodeKind::RepStmt { sym: rsym, .. } = self.ast[tmp].kind {
            if rsym != sym {
                return Err(self.lex.parse_err("You cannot combine [] and [:]".into()));
            }
            return Ok(tmp);
        }
        self.lex.must_be(TokenKind::Arrow)?;
        let mut l = Vec::new();
        loop {
            l.push(self.parse_parallel_statement()?);
            if !self.separator(TokenKind::Semi, self.starts_parallel_statement())? {
                break;
            }
            if !self.starts_parallel_statement() {
                break;
            }
        }
        Ok(self.mk_like(tmp, NodeKind::Guarded { g: tmp, l }))
    }

    fn parse_guarded_command(&mut self) -> Result<NodeId> {
        let sym = self.lex.prev.kind;
        self.parse_guard_aux(sym)
    }

    /// Parse a selection `[...]` or a loop `*[...]`. A loop body gets a
    /// shared end-of-iteration marker appended to every guarded command so
    /// breakpoints on the last command of an iteration trigger correctly.
    fn parse_selection_statement(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let is_select = self.lex.have(Lbracket);
        if is_select {
            self.lex.next()?;
        } else {
            self.lex.must_be(Loop)?;
        }
        let loc = self.prev_loc();
        let mut gl: Vec<NodeId> = Vec::new();
        let mut sl: Vec<NodeId> = Vec::new();
        let mut w: Option<NodeId> = None;
        let mut mutex = false;
        self.pflags.insert(ParseFlags::GC);
        let g = self.parse_parallel_statement()?;
        self.pflags.remove(ParseFlags::GC);
        let guard_rep = match self.ast[g].kind {
            NodeKind::RepStmt { sym, .. } => sym == Arb || sym == Mutex,
            _ => false,
        };
        if matches!(self.ast[g].kind, NodeKind::Guarded { .. }) {
            gl.push(g);
            if self.lex.have(Mutex) {
                while self.lex.have_next(Mutex)? {
                    gl.push(self.parse_guarded_command()?);
                }
                mutex = true;
            } else {
                while self.lex.have_next(Arb)? {
                    gl.push(self.parse_guarded_command()?);
                }
            }
            if self.lex.have(Mutex) || self.lex.have(Arb) {
                return Err(self.lex.parse_err("You cannot combine [] and [:]".into()));
            }
        } else if guard_rep {
            let rsym = match self.ast[g].kind {
                NodeKind::RepStmt { sym, .. } => sym,
                _ => unreachable!(),
            };
            gl.push(g);
            if rsym == Mutex {
                while self.lex.have_next(Mutex)? {
                    gl.push(self.parse_guarded_command()?);
                }
                mutex = true;
            } else {
                while self.lex.have_next(Arb)? {
                    gl.push(self.parse_guarded_command()?);
                }
            }
            if self.lex.have(Mutex) || self.lex.have(Arb) {
                return Err(self.lex.parse_err("You cannot combine [] and [:]".into()));
            }
        } else if is_select {
            // a wait: [e]
            w = Some(g);
        } else {
            // unguarded loop body: *[ s1; s2 ]
            sl.push(g);
            if self.lex.have(Semi) || self.starts_parallel_statement() {
                loop {
                    if !self.separator(Semi, self.starts_parallel_statement())? {
                        break;
                    }
                    if !self.starts_parallel_statement() {
                        break;
                    }
                    sl.push(self.parse_parallel_statement()?);
                }
            }
        }
        self.lex.must_be(Rbracket)?;
        if is_select {
            return Ok(self.mk_at(loc, NodeKind::Select { gl, w, mutex }));
        }
        let e = self.mk_prev(NodeKind::EndStmt);
        if gl.is_empty() {
            sl.push(e);
        } else {
            // e is shared among the guarded commands: only the last one
            // can carry the line number a breakpoint would name
            for &gid in &gl {
                if let NodeKind::Guarded { l, .. } = &mut self.ast[gid].kind {
                    l.push(e);
                }
            }
        }
        Ok(self.mk_at(loc, NodeKind::LoopStmt { gl, sl, mutex }))
    }

    /// `instance x, y: T(args);` — one instance statement per name, all
    /// sharing the parsed type and meta binding.
    pub fn parse_instance_stmt(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
        self.lex.must_be(KwInstance)?;
        if !self.pflags.contains(ParseFlags::META) {
            return Err(self
                .lex
                .parse_err("An instance declaration can only occur in a meta process".into()));
        }
        let first = l.len();
        loop {
            self.lex.must_be(Id)?;
            let id = self.lex.prev.val.as_sym();
            let loc = self.prev_loc();
            let tps = if self.lex.have_next(Lbracket)? {
                self.parse_inline_array(end)?
            } else {
                end
            };
            let d = self.mk_at(
                loc,
                NodeKind::VarDecl {
                    id,
                    tps,
                    z: None,
                    z_sym: None,
                    var_idx: 0,
                },
            );
            l.push(self.mk_at(loc, NodeKind::InstanceStmt { d, mb: None }));
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        let mut mb = None;
        if self.lex.have_next(Lparen)? {
            let loc = self.prev_loc();
            let mut a = Vec::new();
            if self.starts_expr() {
                loop {
                    a.push(self.parse_expr()?);
                    if !self.separator(Comma, self.starts_expr())? {
                        break;
                    }
                }
            }
            self.lex.must_be(Rparen)?;
            mb = Some(self.mk_at(loc, NodeKind::MetaBinding { x: None, a }));
        }
        for &x in &l[first..] {
            if let NodeKind::InstanceStmt { mb: slot, .. } = &mut self.ast[x].kind {
                *slot = mb;
            }
        }
        Ok(())
    }

    fn parse_connection(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if !self.pflags.contains(ParseFlags::META) {
            return Err(self
                .lex
                .parse_err("A connection statement can only occur in a meta process".into()));
        }
        self.lex.must_be(KwConnect)?;
        let cloc = self.prev_loc();
        // connect all i: lo..hi: a, b
        let mut reps = Vec::new();
        while self.lex.have_next(KwAll)? {
            let rloc = self.prev_loc();
            let (id, l, h) = self.parse_rep_common()?;
            reps.push((rloc, id, l, h));
        }
        let a = self.parse_expr()?;
        self.lex.must_be(Comma)?;
        let b = self.parse_expr()?;
        let mut x = self.mk_at(cloc, NodeKind::Connect { a, b });
        for (rloc, id, l, h) in reps {
            x = self.mk_at(
                rloc,
                NodeKind::RepStmt {
                    sym: Semi,
                    id,
                    l,
                    h,
                    sl: vec![x],
                    cxt: None,
                },
            );
        }
        Ok(x)
    }

    /// Statements that start with an expression: assignment, bool-set,
    /// communication, guarded command, meta binding, procedure call, or a
    /// bare synchronization.
    fn parse_statement_2(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let gc_allowed = self.pflags.contains(ParseFlags::GC);
        self.pflags.insert(ParseFlags::STMT);
        let x = self.parse_expr()?;
        self.pflags.remove(ParseFlags::STMT | ParseFlags::GC);
        if matches!(
            self.ast[x].kind,
            NodeKind::BoolSet { .. } | NodeKind::RepStmt { .. }
        ) {
            return Ok(x);
        }
        if self.lex.have_next(Assign)? {
            let e = self.parse_expr()?;
            return Ok(self.mk_like(x, NodeKind::Assign { v: x, e }));
        }
        if self.lex.have(Eq) {
            return Err(self.lex.parse_err("Maybe you mean ':=' ?".into()));
        }
        if self.lex.have_next(Query)? {
            let e = self.parse_expr()?;
            return Ok(self.mk_like(
                x,
                NodeKind::Comm {
                    p: x,
                    op: CommOp::Recv,
                    e,
                },
            ));
        }
        if self.lex.have_next(Peek)? {
            let e = self.parse_expr()?;
            return Ok(self.mk_like(
                x,
                NodeKind::Comm {
                    p: x,
                    op: CommOp::Peek,
                    e,
                },
            ));
        }
        if self.lex.have_next(Bang)? {
            let e = self.parse_expr()?;
            let op = if self.lex.have_next(Query)? {
                CommOp::SendRecv
            } else {
                CommOp::Send
            };
            return Ok(self.mk_like(x, NodeKind::Comm { p: x, op, e }));
        }
        if self.lex.have_next(Arrow)? {
            if !gc_allowed {
                return Err(self.lex.parse_err(
                    "You cannot have a guarded command here (missing [] symbol?)".into(),
                ));
            }
            self.pflags.remove(ParseFlags::GC);
            if !self.starts_parallel_statement() {
                return Err(self.lex.parse_err("Guarded command without statement".into()));
            }
            let mut l = Vec::new();
            loop {
                l.push(self.parse_parallel_statement()?);
                if !self.separator(Semi, self.starts_parallel_statement())? {
                    break;
                }
                if !self.starts_parallel_statement() {
                    break;
                }
            }
            return Ok(self.mk_like(x, NodeKind::Guarded { g: x, l }));
        }
        if self.lex.have_next(Lparen)? {
            if !self.pflags.contains(ParseFlags::META) {
                return Err(self
                    .lex
                    .parse_err("Is this a meta-binding? You cannot have that here".into()));
            }
            let mut a = Vec::new();
            if self.starts_expr() {
                loop {
                    a.push(self.parse_expr()?);
                    if !self.separator(Comma, self.starts_expr())? {
                        break;
                    }
                }
            }
            self.lex.must_be(Rparen)?;
            return Ok(self.mk_like(x, NodeKind::MetaBinding { x: Some(x), a }));
        }
        // sync statement or procedure call
        Ok(x)
    }

    fn parse_statement(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if self.lex.have_next(KwSkip)? {
            return Ok(self.mk_prev(NodeKind::Skip));
        }
        if self.lex.have(Lbracket) || self.lex.have(Loop) {
            return self.parse_selection_statement();
        }
        if self.lex.have_next(Lbrace)? {
            let loc = self.prev_loc();
            let mut l = Vec::new();
            loop {
                l.push(self.parse_parallel_statement()?);
                if !self.separator(Semi, self.starts_parallel_statement())? {
                    break;
                }
                if !self.starts_parallel_statement() {
                    break;
                }
            }
            self.lex.must_be(Rbrace)?;
            // a single-statement compound collapses to that statement
            if l.len() == 1 {
                return Ok(l[0]);
            }
            return Ok(self.mk_at(loc, NodeKind::Compound { l }));
        }
        if self.lex.have(KwInstance) {
            let loc = self.curr_loc();
            let mut l = Vec::new();
            self.parse_instance_stmt(&mut l)?;
            if l.len() == 1 {
                return Ok(l[0]);
            }
            return Ok(self.mk_at(loc, NodeKind::Compound { l }));
        }
        if self.lex.have(KwConnect) {
            return self.parse_connection();
        }
        if self.starts_expr() {
            return self.parse_statement_2();
        }
        Err(self.lex.parse_err("Expected a statement".into()))
    }

    pub fn parse_parallel_statement(&mut self) -> Result<NodeId> {
        let y = self.parse_statement()?;
        if let NodeKind::RepStmt { sym, .. } = self.ast[y].kind {
            if sym != TokenKind::Semi && sym != TokenKind::Comma {
                return Ok(y);
            }
        }
        if !self.lex.have_next(TokenKind::Comma)? {
            return Ok(y);
        }
        let mut l = vec![y];
        loop {
            l.push(self.parse_statement()?);
            if !self.lex.have_next(TokenKind::Comma)? {
                break;
            }
        }
        Ok(self.mk_like(y, NodeKind::Parallel { l }))
    }

    /// Shared shape of `chp`, `meta`, and `hse` bodies: local definitions
    /// and declarations, then statements. A non-empty statement list gets
    /// an end-of-body marker.
    fn parse_body_common(&mut self, kind: BodyKind) -> Result<NodeId> {
        use TokenKind::*;
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut dl = Vec::new();
        let mut sl = Vec::new();
        loop {
            if self.starts_definition() {
                dl.push(self.parse_definition()?);
            } else if self.starts_var_declaration() {
                self.parse_var_declaration(&mut dl)?;
            } else if self.lex.have(KwInstance) {
                self.parse_instance_stmt(&mut sl)?;
                self.lex.must_be(Semi)?;
            } else {
                break;
            }
        }
        while self.starts_parallel_statement() {
            sl.push(self.parse_parallel_statement()?);
            if !self.separator(Semi, self.starts_parallel_statement())? {
                break;
            }
        }
        self.lex.must_be(Rbrace)?;
        if !sl.is_empty() {
            let e = self.mk_prev(NodeKind::EndStmt);
            self.ast[e].flags |= NodeFlags::END_BODY;
            sl.push(e);
        }
        Ok(self.mk_at(
            loc,
            NodeKind::Body {
                kind,
                dl,
                sl,
                cxt: None,
            },
        ))
    }

    pub fn parse_chp_body(&mut self) -> Result<NodeId> {
        let pflags = self.pflags;
        self.lex.must_be(TokenKind::KwChp)?;
        self.pflags.remove(ParseFlags::META);
        let x = self.parse_body_common(BodyKind::Chp)?;
        self.pflags = pflags;
        Ok(x)
    }

    pub fn parse_meta_body(&mut self) -> Result<NodeId> {
        let pflags = self.pflags;
        self.lex.must_be(TokenKind::KwMeta)?;
        self.pflags.insert(ParseFlags::META);
        let x = self.parse_body_common(BodyKind::Meta)?;
        self.pflags = pflags;
        Ok(x)
    }

    pub fn parse_hse_body(&mut self) -> Result<NodeId> {
        let pflags = self.pflags;
        self.lex.must_be(TokenKind::KwHse)?;
        self.pflags.remove(ParseFlags::META);
        let x = self.parse_body_common(BodyKind::Hse)?;
        self.pflags = pflags;
        Ok(x)
    }

    pub fn parse_prs_body(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let pflags = self.pflags;
        self.lex.must_be(KwPrs)?;
        self.pflags.remove(ParseFlags::META);
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut dl = Vec::new();
        let mut sl = Vec::new();
        loop {
            if self.starts_definition() {
                dl.push(self.parse_definition()?);
            } else if self.lex.have_next(KwVar)? {
                loop {
                    dl.push(self.parse_prs_var_decl()?);
                    if !self.lex.have_next(Comma)? {
                        break;
                    }
                }
                self.lex.must_be(Semi)?;
            } else {
                break;
            }
        }
        while self.starts_production_rule() {
            sl.push(self.parse_production_rule()?);
        }
        self.lex.must_be(Rbrace)?;
        self.pflags = pflags;
        Ok(self.mk_at(
            loc,
            NodeKind::Body {
                kind: BodyKind::Prs,
                dl,
                sl,
                cxt: None,
            },
        ))
    }

    pub fn parse_delay_body(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let pflags = self.pflags;
        self.lex.must_be(KwDelay)?;
        self.pflags.remove(ParseFlags::META);
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut dl = Vec::new();
        let mut sl = Vec::new();
        loop {
            if self.starts_definition() {
                dl.push(self.parse_definition()?);
            } else if self.lex.have_next(KwCounter)? {
                loop {
                    dl.push(self.parse_counter_decl()?);
                    if !self.lex.have_next(Comma)? {
                        break;
                    }
                }
                self.lex.must_be(Semi)?;
            } else if self.starts_var_declaration() {
                self.parse_var_declaration(&mut dl)?;
            } else {
                break;
            }
        }
        self.pflags.insert(ParseFlags::HOLD);
        while self.lex.have(Lbrace) || self.starts_production_rule() {
            sl.push(self.parse_production_rule()?);
        }
        self.pflags.remove(ParseFlags::HOLD);
        self.lex.must_be(Rbrace)?;
        self.pflags = pflags;
        Ok(self.mk_at(
            loc,
            NodeKind::Body {
                kind: BodyKind::Delay,
                dl,
                sl,
                cxt: None,
            },
        ))
    }

    fn parse_transition(&mut self) -> Result<NodeId> {
        let loc = self.curr_loc();
        let v = self.parse_prefix_expr()?;
        let i = self
            .lex
            .must_be_one_of(&[TokenKind::Plus, TokenKind::Minus])?;
        let op = if i == 0 { TokenKind::Plus } else { TokenKind::Minus };
        Ok(self.mk_at(loc, NodeKind::Transition { v, op }))
    }

    fn parse_delay_hold(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Lbrace)?;
        let loc = self.prev_loc();
        let mut l = Vec::new();
        loop {
            l.push(self.parse_transition()?);
            if !self.separator(Comma, self.starts_expr())? {
                break;
            }
        }
        self.lex.must_be(Rbrace)?;
        self.lex.must_be(KwRequires)?;
        self.lex.must_be(Lbrace)?;
        let c = self.parse_prefix_expr()?;
        let mut n = None;
        if self.lex.have_next(Gt)? {
            n = Some(self.parse_expr()?);
        }
        self.lex.must_be(Rbrace)?;
        if self.lex.have(Comma) || self.lex.have(Semi) {
            return Err(self.lex.parse_err(format!(
                "Delay holds cannot be separated by '{}'",
                self.lex.curr.kind.name()
            )));
        }
        Ok(self.mk_at(loc, NodeKind::DelayHold { l, c, n }))
    }

    /// Parse one production rule; with the `HOLD` flag set, delay holds
    /// are allowed too.
    pub fn parse_production_rule(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if self.pflags.contains(ParseFlags::HOLD) && self.lex.have(Lbrace) {
            return self.parse_delay_hold();
        }
        let mut atomic = false;
        let mut delay = None;
        if self.lex.have_next(KwAtomic)? {
            atomic = true;
        } else if self.lex.have_next(KwAfter)? {
            self.lex.must_be(Lparen)?;
            delay = Some(self.parse_expr()?);
            self.lex.must_be(Rparen)?;
        } else {
            self.pflags.insert(ParseFlags::PR);
        }
        let g = self.parse_expr()?;
        self.pflags.remove(ParseFlags::PR);
        if matches!(self.ast[g].kind, NodeKind::RepStmt { .. }) {
            return Ok(g);
        }
        self.lex.must_be(Arrow)?;
        let v = self.parse_prefix_expr()?;
        let i = self.lex.must_be_one_of(&[Plus, Minus])?;
        let op = if i == 0 { Plus } else { Minus };
        if self.lex.have(Comma) || self.lex.have(Semi) {
            return Err(self.lex.parse_err(format!(
                "Production rules cannot be separated by '{}'",
                self.lex.curr.kind.name()
            )));
        }
        Ok(self.mk_like(
            g,
            NodeKind::ProductionRule {
                g,
                v,
                op,
                atomic,
                delay,
            },
        ))
    }

    fn parse_property_stmt(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let loc = self.prev_loc();
        self.lex.must_be(Lparen)?;
        let node = self.parse_expr()?;
        self.lex.must_be(Rparen)?;
        self.lex.must_be(Assign)?;
        let v = self.parse_expr()?;
        Ok(self.mk_at(loc, NodeKind::PropertyStmt { id, node, v }))
    }

    pub fn parse_property_body(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwProperty)?;
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut sl = Vec::new();
        while self.lex.have(Id) {
            sl.push(self.parse_property_stmt()?);
            if !self.separator(Semi, self.lex.have(Id))? {
                break;
            }
        }
        self.lex.must_be(Rbrace)?;
        Ok(self.mk_at(
            loc,
            NodeKind::Body {
                kind: BodyKind::Property,
                dl: Vec::new(),
                sl,
                cxt: None,
            },
        ))
    }

    /// Counter declaration in a delay body; the initial value defaults to
    /// zero.
    fn parse_counter_decl(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let loc = self.prev_loc();
        let generic = self.mk_at(loc, NodeKind::GenericType { sym: KwInt });
        let tps = if self.lex.have_next(Lbracket)? {
            self.parse_inline_array(generic)?
        } else {
            generic
        };
        let z = if self.lex.have_next(Eq)? {
            Some(self.parse_expr()?)
        } else {
            Some(self.mk_at(
                loc,
                NodeKind::Literal {
                    t: IntConst,
                    v: TokenValue::Int(0),
                },
            ))
        };
        Ok(self.mk_at(
            loc,
            NodeKind::VarDecl {
                id,
                tps,
                z,
                z_sym: None,
                var_idx: 0,
            },
        ))
    }
}
