//! Expression parsing.
//!
//! `parse_expr` recurses blindly into the right child of a binary
//! expression and `resolve_precedence` then rotates the tree so the final
//! structure honors precedence and left-associativity. Parenthesized
//! subtrees are frozen against rotation.

use super::{ParseFlags, Parser};
use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::error::Result;
use crate::token::TokenKind;

/// Binding strength of a binary operator; higher binds tighter.
pub fn precedence(op: TokenKind) -> u8 {
    use TokenKind::*;
    match op {
        Or | Amp | KwXor => 1,
        Eq | Neq | Lt | Gt | Lte | Gte => 2,
        Concat => 3,
        Plus | Minus => 4,
        Star | Slash | Percent | KwMod => 5,
        Caret => 6,
        _ => 7,
    }
}

fn is_binary_op(op: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        op,
        Plus | Minus
            | Star
            | Slash
            | Percent
            | KwMod
            | Caret
            | Concat
            | Eq
            | Neq
            | Lt
            | Gt
            | Lte
            | Gte
            | Amp
            | Or
            | KwXor
    )
}

impl<'l, 'i> Parser<'l, 'i> {
    fn parse_array_constructor(&mut self) -> Result<NodeId> {
        self.lex.must_be(TokenKind::Lbracket)?;
        let loc = self.prev_loc();
        let mut l = Vec::new();
        loop {
            l.push(self.parse_expr()?);
            if !self.separator(TokenKind::Comma, self.starts_expr())? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Rbracket)?;
        Ok(self.mk_at(loc, NodeKind::ArrayCons { l }))
    }

    fn parse_record_constructor(&mut self) -> Result<NodeId> {
        self.lex.must_be(TokenKind::Lbrace)?;
        let loc = self.prev_loc();
        let mut l = Vec::new();
        loop {
            l.push(self.parse_expr()?);
            if !self.separator(TokenKind::Comma, self.starts_expr())? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Rbrace)?;
        Ok(self.mk_at(loc, NodeKind::RecordCons { l }))
    }

    fn parse_type_value(&mut self) -> Result<NodeId> {
        self.lex.must_be(TokenKind::Lt)?;
        let loc = self.prev_loc();
        let tps = self.parse_type()?;
        self.lex.must_be(TokenKind::Gt)?;
        Ok(self.mk_at(loc, NodeKind::TypeValue { tps }))
    }

    fn parse_atom(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if self.lex.have_next(Id)? {
            let id = self.lex.prev.val.as_sym();
            let loc = self.prev_loc();
            if self.lex.have(Lparen) {
                // procedure call, function call, or meta binding by name
                self.lex.next()?;
                let mut args = Vec::new();
                if self.starts_expr() {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.separator(Comma, self.starts_expr())? {
                            break;
                        }
                    }
                }
                self.lex.must_be(Rparen)?;
                Ok(self.mk_at(
                    loc,
                    NodeKind::Call {
                        id,
                        args,
                        binding: None,
                    },
                ))
            } else {
                Ok(self.mk_at(
                    loc,
                    NodeKind::Name {
                        id,
                        binding: None,
                        depth: 0,
                    },
                ))
            }
        } else if self.lex.have_next(Lparen)? {
            let x = self.parse_expr()?;
            self.ast[x].flags |= NodeFlags::PARENTHESIZED;
            self.lex.must_be(Rparen)?;
            Ok(x)
        } else if self.lex.have(Lbracket) {
            self.parse_array_constructor()
        } else if self.lex.have(Lbrace) {
            self.parse_record_constructor()
        } else if self.lex.have(Lt) {
            self.parse_type_value()
        } else if self.starts_literal() {
            let t = self.lex.curr.kind;
            let v = self.lex.curr.val.clone();
            let x = self.mk_curr(NodeKind::Literal { t, v });
            self.lex.next()?;
            Ok(x)
        } else if self.lex.have_next(Rep)? {
            self.parse_replicator()
        } else {
            Err(self.lex.parse_err("Expected an expression".into()))
        }
    }

    pub fn parse_postfix_expr(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let mut x = self.parse_atom()?;
        if matches!(self.ast[x].kind, NodeKind::RepStmt { .. }) {
            return Ok(x);
        }
        while self.lex.have(Lbracket) || self.lex.have(Dot) {
            if self.lex.have_next(Lbracket)? {
                let tmp = self.parse_expr()?;
                if self.lex.have_next(Dots)? {
                    let h = self.parse_expr()?;
                    x = self.mk_like(x, NodeKind::Subrange { x, l: tmp, h });
                } else {
                    x = self.mk_like(x, NodeKind::Subscript { x, idx: tmp });
                    // x[i, j] is x[i][j]
                    if self.lex.have(Comma) || self.starts_expr() {
                        loop {
                            if !self.separator(Comma, self.starts_expr())? {
                                break;
                            }
                            let idx = self.parse_expr()?;
                            x = self.mk_like(x, NodeKind::Subscript { x, idx });
                        }
                    }
                }
                self.lex.must_be(Rbracket)?;
            } else if self.lex.have_next(Dot)? {
                self.lex.must_be(Id)?;
                let id = self.lex.prev.val.as_sym();
                x = self.mk_like(x, NodeKind::FieldOf { x, id, field: None });
            }
        }
        Ok(x)
    }

    pub fn parse_prefix_expr(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        // '+' is not dropped: it carries a type requirement
        if self.lex.have_next(Plus)? || self.lex.have_next(Minus)? || self.lex.have_next(Tilde)? {
            let op = self.lex.prev.kind;
            let loc = self.prev_loc();
            let r = self.parse_prefix_expr()?;
            Ok(self.mk_at(loc, NodeKind::Prefix { op, r }))
        } else if self.lex.have_next(Hash)? {
            let loc = self.prev_loc();
            if self.lex.have(Lbrace) {
                self.lex.next()?;
                let mut p = Vec::new();
                loop {
                    p.push(self.parse_postfix_expr()?);
                    if !self.separator(Comma, self.starts_postfix_expr())? {
                        break;
                    }
                }
                self.lex.must_be(Colon)?;
                let b = self.parse_expr()?;
                self.lex.must_be(Rbrace)?;
                Ok(self.mk_at(loc, NodeKind::ValueProbe { p, b }))
            } else {
                let r = self.parse_prefix_expr()?;
                Ok(self.mk_at(loc, NodeKind::Prefix { op: Hash, r }))
            }
        } else {
            self.parse_postfix_expr()
        }
    }

    /// Rotate a freshly built binary expression so the lower-precedence
    /// (or equally bound, left-associative) operator becomes the root.
    /// Pre: the left child is not an unparenthesized binary expression;
    /// the right child was itself parsed (and rotated) correctly.
    fn resolve_precedence(&mut self, x: NodeId) -> NodeId {
        let (x_op, r) = match self.ast[x].kind {
            NodeKind::Binary { op, r, .. } => (op, r),
            _ => unreachable!("resolve_precedence on non-binary node"),
        };
        let (r_op, r_l) = match self.ast[r].kind {
            NodeKind::Binary { op, l, .. } => (op, l),
            _ => return x,
        };
        if self.ast[r].flags.contains(NodeFlags::PARENTHESIZED) {
            return x;
        }
        if precedence(x_op) < precedence(r_op) {
            return x;
        }
        // x binds tighter (or binds equally and is left-associative):
        // make r the root and push x down its left spine
        self.ast[r].lnr = self.ast[x].lnr;
        self.ast[r].lpos = self.ast[x].lpos;
        if let NodeKind::Binary { r: xr, .. } = &mut self.ast[x].kind {
            *xr = r_l;
        }
        let new_l = self.resolve_precedence(x);
        if let NodeKind::Binary { l: rl, .. } = &mut self.ast[r].kind {
            *rl = new_l;
        }
        r
    }

    /// Parse a (binary) expression. When the `STMT` flag was set just
    /// before the call this can also produce a bool-set statement (`x+`,
    /// `x-`) or a statement replicator.
    pub fn parse_expr(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let stmt_allowed = self.pflags.contains(ParseFlags::STMT);
        if !self.lex.have(Rep) {
            self.pflags
                .remove(ParseFlags::STMT | ParseFlags::GC | ParseFlags::PR);
        }
        let x = self.parse_prefix_expr()?;
        if matches!(self.ast[x].kind, NodeKind::RepStmt { .. }) {
            return Ok(x);
        }
        self.pflags
            .remove(ParseFlags::STMT | ParseFlags::GC | ParseFlags::PR);
        let op = self.lex.curr.kind;
        if is_binary_op(op) {
            self.lex.next()?;
            if stmt_allowed && (op == Plus || op == Minus) && !self.starts_expr() {
                return Ok(self.mk_like(x, NodeKind::BoolSet { v: x, op }));
            }
            let r = self.parse_expr()?;
            let b = self.mk_like(x, NodeKind::Binary { op, l: x, r });
            return Ok(self.resolve_precedence(b));
        }
        Ok(x)
    }

    /// `id: lo..hi:` — the common part of every replicator form.
    pub fn parse_rep_common(&mut self) -> Result<(crate::intern::Symbol, NodeId, NodeId)> {
        self.lex.must_be(TokenKind::Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(TokenKind::Colon)?;
        let l = self.parse_expr()?;
        self.lex.must_be(TokenKind::Dots)?;
        let h = self.parse_expr()?;
        self.lex.must_be(TokenKind::Colon)?;
        Ok((id, l, h))
    }

    fn rep_flag_name(flags: ParseFlags) -> &'static str {
        if flags.contains(ParseFlags::STMT) {
            "statement"
        } else if flags.contains(ParseFlags::GC) {
            "guard"
        } else if flags.contains(ParseFlags::PR) {
            "production rule"
        } else {
            "expression"
        }
    }

    /// Parse a replicator; `<<` has already been consumed. The allowed
    /// separator set depends on where the replicator occurs, which the
    /// parse flags carried into this call record: `,`/`;` for statements,
    /// `[]`/`[:]` for guards, nothing for production rules, and an
    /// associative operator for plain expressions.
    pub fn parse_replicator(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        let loc = self.prev_loc();
        let flags = self.pflags;
        self.pflags
            .remove(ParseFlags::STMT | ParseFlags::GC | ParseFlags::PR);
        let mut is_stmt = false;
        let mut is_gc = false;
        let mut is_pr = false;
        if self.lex.have_next(Comma)? || self.lex.have_next(Semi)? {
            if flags.contains(ParseFlags::STMT) {
                is_stmt = true;
            } else {
                return Err(self.lex.parse_err(format!(
                    "Expected {}, found statement replicator",
                    Self::rep_flag_name(flags)
                )));
            }
        } else if self.lex.have_next(Arb)? || self.lex.have_next(Mutex)? {
            if flags.contains(ParseFlags::GC) {
                is_gc = true;
            } else {
                return Err(self.lex.parse_err(format!(
                    "Expected {}, found guard replicator",
                    Self::rep_flag_name(flags)
                )));
            }
        } else if self.lex.have(Id) {
            if flags.contains(ParseFlags::PR) {
                is_pr = true;
            } else {
                return Err(self.lex.parse_err(format!(
                    "Expected {}, found production rule replicator",
                    Self::rep_flag_name(flags)
                )));
            }
        } else if !(self.lex.have_next(Plus)?
            || self.lex.have_next(Star)?
            || self.lex.have_next(Concat)?
            || self.lex.have_next(Amp)?
            || self.lex.have_next(Or)?
            || self.lex.have_next(KwXor)?
            || self.lex.have_next(Eq)?
            || self.lex.have_next(Neq)?)
        {
            return Err(self.lex.parse_err("Illegal operator in replicator".into()));
        }
        let sym = self.lex.prev.kind;
        let (id, l, h) = self.parse_rep_common()?;
        let r;
        if is_stmt || is_gc || is_pr {
            let rep_sym = if is_pr { Nothing } else { sym };
            let mut sl = Vec::new();
            if is_stmt {
                loop {
                    sl.push(self.parse_parallel_statement()?);
                    if !self.separator(Semi, self.starts_parallel_statement())? {
                        break;
                    }
                    if !self.starts_parallel_statement() {
                        break;
                    }
                }
            } else if is_gc {
                loop {
                    sl.push(self.parse_guard_aux(sym)?);
                    if !self.separator(sym, self.starts_expr())? {
                        break;
                    }
                    if !self.starts_expr() {
                        break;
                    }
                }
            } else {
                loop {
                    sl.push(self.parse_production_rule()?);
                    if self.lex.have(RepEnd) || self.lex.have(Rbrace) {
                        break;
                    }
                }
            }
            r = self.mk_at(
                loc,
                NodeKind::RepStmt {
                    sym: rep_sym,
                    id,
                    l,
                    h,
                    sl,
                    cxt: None,
                },
            );
        } else {
            let v = self.parse_expr()?;
            r = self.mk_at(
                loc,
                NodeKind::RepExpr {
                    sym,
                    id,
                    l,
                    h,
                    v,
                    cxt: None,
                },
            );
        }
        self.lex.must_be(RepEnd)?;
        self.pflags = flags;
        Ok(r)
    }
}
