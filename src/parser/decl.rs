//! Definitions, parameters, ports, and type syntax.

use super::{ParseFlags, Parser};
use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::error::Result;
use crate::token::{TokenKind, TokenValue};

/// Port parameter grouping; mixing groups within one `,` list is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortGroup {
    None,
    Dir,
    Sync,
    Wire,
}

impl<'l, 'i> Parser<'l, 'i> {
    /// `[l1..h1, l2..h2]` after a declared name: inline array dimensions
    /// wrapping the (possibly not yet parsed) element type `end`.
    pub fn parse_inline_array(&mut self, end: NodeId) -> Result<NodeId> {
        let loc = self.prev_loc();
        let l = self.parse_expr()?;
        self.lex.must_be(TokenKind::Dots)?;
        let h = self.parse_expr()?;
        let tps = if self.lex.have_next(TokenKind::Comma)? {
            self.parse_inline_array(end)?
        } else {
            self.lex.must_be(TokenKind::Rbracket)?;
            end
        };
        Ok(self.mk_at(loc, NodeKind::ArrayType { l, h, tps }))
    }

    fn parse_initializer(&mut self) -> Result<NodeId> {
        self.lex.must_be(TokenKind::Eq)?;
        self.parse_expr()
    }

    /// `var x, y: t = e;` splits into one declaration per name sharing the
    /// parsed type and initializer.
    pub fn parse_var_declaration(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        let volatl = self.lex.have_next(KwVolatile)?;
        self.lex.must_be(KwVar)?;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
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
            let x = self.mk_at(
                loc,
                NodeKind::VarDecl {
                    id,
                    tps,
                    z: None,
                    z_sym: None,
                    var_idx: 0,
                },
            );
            if volatl {
                self.ast[x].flags |= NodeFlags::VOLATILE;
            }
            l.push(x);
            // no separator recovery: a missing ':' is likelier than a
            // missing ','
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        let z = if self.lex.have(Eq) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        self.lex.must_be(Semi)?;
        for &x in &l[first..] {
            if let NodeKind::VarDecl { z: slot, .. } = &mut self.ast[x].kind {
                *slot = z;
            }
        }
        Ok(())
    }

    /// Boolean wire declaration in a `prs` body or wired type: optional
    /// inline array, optional `+`/`-` initial state or `=` initializer.
    pub fn parse_prs_var_decl(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let loc = self.prev_loc();
        let generic = self.mk_at(loc, NodeKind::GenericType { sym: KwBool });
        let tps = if self.lex.have_next(Lbracket)? {
            self.parse_inline_array(generic)?
        } else {
            generic
        };
        let mut z_sym = None;
        let mut z = None;
        if self.lex.have_next(Plus)? || self.lex.have_next(Minus)? {
            z_sym = Some(self.lex.prev.kind);
        } else if self.lex.have_next(Eq)? {
            z = Some(self.parse_expr()?);
        }
        Ok(self.mk_at(
            loc,
            NodeKind::VarDecl {
                id,
                tps,
                z,
                z_sym,
                var_idx: 0,
            },
        ))
    }

    fn parse_wire_decl(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let loc = self.prev_loc();
        let generic = self.mk_at(loc, NodeKind::GenericType { sym: KwBool });
        let tps = if self.lex.have_next(Lbracket)? {
            self.parse_inline_array(generic)?
        } else {
            generic
        };
        let mut init_sym = None;
        let mut z = None;
        if self.lex.have_next(Plus)? || self.lex.have_next(Minus)? {
            init_sym = Some(self.lex.prev.kind);
        } else if self.lex.have_next(Eq)? {
            z = Some(self.parse_expr()?);
        }
        Ok(self.mk_at(
            loc,
            NodeKind::WireDecl {
                id,
                tps,
                init_sym,
                z,
            },
        ))
    }

    /// `(i1, i2; o1, o2)` — a wired type; the opening `(` has been parsed.
    pub fn parse_wired_type(&mut self) -> Result<NodeId> {
        let loc = self.prev_loc();
        let mut li = Vec::new();
        loop {
            li.push(self.parse_wire_decl()?);
            if !self.lex.have_next(TokenKind::Comma)? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Semi)?;
        let mut lo = Vec::new();
        loop {
            lo.push(self.parse_wire_decl()?);
            if !self.lex.have_next(TokenKind::Comma)? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Rparen)?;
        Ok(self.mk_at(loc, NodeKind::WiredType { li, lo }))
    }

    fn parse_default_wire_decl(&mut self) -> Result<NodeId> {
        self.parse_prs_var_decl()
    }

    /// `((li; lo))` port form: boolean wires declared directly in the
    /// port list. The opening `(` has been parsed.
    fn parse_default_wired_port(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        loop {
            let v = self.parse_default_wire_decl()?;
            self.ast[v].flags |= NodeFlags::DEF_WIRE | NodeFlags::WIRE;
            l.push(v);
            if !self.lex.have_next(TokenKind::Comma)? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Semi)?;
        loop {
            let v = self.parse_default_wire_decl()?;
            self.ast[v].flags |= NodeFlags::DEF_WIRE | NodeFlags::WIRE | NodeFlags::WRITABLE;
            l.push(v);
            if !self.lex.have_next(TokenKind::Comma)? {
                break;
            }
        }
        self.lex.must_be(TokenKind::Rparen)?;
        Ok(())
    }

    /// One `,`-separated group of port parameters. Directed ports take
    /// `?`/`!` and a type; sync ports take neither; wired ports a wired
    /// type.
    pub fn parse_port_parameter(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        if self.lex.have_next(Lparen)? {
            return self.parse_default_wired_port(l);
        }
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
        let mut old = PortGroup::None;
        loop {
            self.lex.must_be(Id)?;
            let id = self.lex.prev.val.as_sym();
            let loc = self.prev_loc();
            let tps = if self.lex.have_next(Lbracket)? {
                self.parse_inline_array(end)?
            } else {
                end
            };
            let x = self.mk_at(
                loc,
                NodeKind::VarDecl {
                    id,
                    tps,
                    z: None,
                    z_sym: None,
                    var_idx: 0,
                },
            );
            let curr;
            if self.lex.have_next(Lparen)? {
                self.ast[x].flags |= NodeFlags::WIRE;
                curr = PortGroup::Wire;
                let w = self.parse_wired_type()?;
                if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
                    *slot = Some(w);
                }
            } else if self.lex.have_next(Query)? {
                self.ast[x].flags |= NodeFlags::INPORT;
                curr = PortGroup::Dir;
            } else if self.lex.have_next(Bang)? {
                self.ast[x].flags |= NodeFlags::OUTPORT;
                curr = PortGroup::Dir;
            } else {
                self.ast[x].flags |= NodeFlags::PORT;
                curr = PortGroup::Sync;
            }
            if old != PortGroup::None {
                if old == PortGroup::Wire || curr == PortGroup::Wire {
                    return Err(self
                        .lex
                        .parse_err("Wired ports must be separated by ';'".into()));
                }
                if old == PortGroup::Sync || curr == PortGroup::Sync {
                    return Err(self.lex.parse_err(
                        "Sync ports must be separated by ';' (may be missing ? or !)".into(),
                    ));
                }
            }
            l.push(x);
            old = curr;
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        if old == PortGroup::Sync {
            if self.lex.have(Colon) {
                return Err(self
                    .lex
                    .parse_err("Sync ports have no type (may be missing ? or !)".into()));
            }
            let g = self.mk_prev(NodeKind::GenericType { sym: Nothing });
            if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
                *slot = Some(g);
            }
        } else if old == PortGroup::Dir {
            if self.lex.have(Semi) || self.lex.have(Rparen) {
                return Err(self.lex.parse_err("Directed ports must have a type".into()));
            }
            self.lex.must_be(Colon)?;
            let tps = self.parse_type()?;
            if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
                *slot = Some(tps);
            }
        }
        Ok(())
    }

    /// One `,`-separated group of meta parameters; `x, y: t` splits into
    /// one parameter per name.
    fn parse_meta_parameter(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
        let mut have_array = false;
        loop {
            self.lex.must_be(Id)?;
            let id = self.lex.prev.val.as_sym();
            let loc = self.prev_loc();
            let tps = if self.lex.have_next(Lbracket)? {
                have_array = true;
                self.parse_inline_array(end)?
            } else {
                end
            };
            l.push(self.mk_at(
                loc,
                NodeKind::MetaParameter {
                    id,
                    tps,
                    meta_idx: 0,
                },
            ));
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = if self.lex.have_next(KwType)? {
            // an array of `type` makes no sense
            if have_array {
                return Err(self.lex.parse_err("Expected a type".into()));
            }
            self.mk_prev(NodeKind::GenericType { sym: KwType })
        } else {
            self.parse_type()?
        };
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        Ok(())
    }

    fn parse_value_parameter(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        let sym = if self.lex.have_next(KwConst)? {
            KwConst
        } else {
            KwVal
        };
        self.lex.have_next(KwVal)?;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
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
            l.push(self.mk_at(loc, NodeKind::Parameter { par_sym: sym, d }));
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        Ok(())
    }

    fn parse_result_parameter(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        if !(self.lex.have_next(KwRes)? || self.lex.have_next(KwValres)?) {
            return Err(self.lex.parse_err("Expected 'res' or 'valres'".into()));
        }
        let sym = self.lex.prev.kind;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
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
            l.push(self.mk_at(loc, NodeKind::Parameter { par_sym: sym, d }));
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        Ok(())
    }

    fn parse_process_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwProcess)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(Lparen)?;
        let mut ml = Vec::new();
        if self.starts_meta_parameter() {
            loop {
                self.parse_meta_parameter(&mut ml)?;
                if !self.separator(Semi, self.starts_meta_parameter())? {
                    break;
                }
                if !self.starts_meta_parameter() {
                    break;
                }
            }
        }
        let sep = self.lex.must_be_one_of(&[Semi, Rparen])?;
        // `P(; ports)` abbreviates `P()(ports)` when there are no meta
        // parameters
        if sep == 1 || self.lex.have(Lparen) {
            self.lex.must_be(Lparen)?;
        }
        let mut pl = Vec::new();
        if self.starts_port_parameter() {
            loop {
                self.parse_port_parameter(&mut pl)?;
                if !self.separator(Semi, self.starts_port_parameter())? {
                    break;
                }
                if !self.starts_port_parameter() {
                    break;
                }
            }
        }
        self.lex.must_be_one_of(&[Semi, Rparen])?;
        let mut mb = None;
        let mut cb = None;
        let mut hb = None;
        let mut pb = None;
        let mut db = None;
        let mut ppb = None;
        loop {
            if self.lex.have(KwMeta) {
                if mb.is_some() {
                    return Err(self.lex.parse_err("Multiple meta bodies encountered".into()));
                }
                mb = Some(self.parse_meta_body()?);
            } else if self.lex.have(KwHse) {
                if hb.is_some() {
                    return Err(self.lex.parse_err("Multiple hse bodies encountered".into()));
                }
                hb = Some(self.parse_hse_body()?);
            } else if self.lex.have(KwPrs) {
                if pb.is_some() {
                    return Err(self.lex.parse_err("Multiple prs bodies encountered".into()));
                }
                pb = Some(self.parse_prs_body()?);
            } else if self.lex.have(KwChp) {
                if cb.is_some() {
                    return Err(self.lex.parse_err("Multiple chp bodies encountered".into()));
                }
                cb = Some(self.parse_chp_body()?);
            } else if self.lex.have(KwDelay) {
                if db.is_some() {
                    return Err(self.lex.parse_err("Multiple delay bodies encountered".into()));
                }
                db = Some(self.parse_delay_body()?);
            } else if self.lex.have(KwProperty) {
                if ppb.is_some() {
                    return Err(self
                        .lex
                        .parse_err("Multiple property bodies encountered".into()));
                }
                ppb = Some(self.parse_property_body()?);
            } else {
                break;
            }
        }
        if mb.is_none() && cb.is_none() && hb.is_none() && pb.is_none() {
            return Err(self.lex.parse_err("Expected a process body".into()));
        }
        Ok(self.mk_at(
            loc,
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
                cxt: None,
                nr_meta: 0,
                nr_var: 0,
            },
        ))
    }

    fn parse_procedure_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwProcedure)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(Lparen)?;
        let mut pl = Vec::new();
        let mut flags = NodeFlags::empty();
        if self.starts_value_parameter()
            || self.starts_result_parameter()
            || self.lex.have(Varargs)
        {
            loop {
                if self.starts_value_parameter() {
                    self.parse_value_parameter(&mut pl)?;
                } else if self.starts_result_parameter() {
                    self.parse_result_parameter(&mut pl)?;
                } else if self.lex.have_next(Varargs)? {
                    flags |= NodeFlags::VARARGS;
                    break;
                } else {
                    return Err(self.lex.parse_err("Expected a parameter".into()));
                }
                let cont = self.starts_value_parameter()
                    || self.starts_result_parameter()
                    || self.lex.have(Varargs);
                if !self.separator(Semi, cont)? {
                    break;
                }
            }
        } else if !self.lex.have(Rparen) {
            return Err(self.lex.parse_err("Expected a parameter list".into()));
        }
        self.lex.must_be_one_of(&[Semi, Rparen])?;
        let mut b = None;
        if self.lex.have_next(KwBuiltin)? {
            flags |= NodeFlags::BUILTIN;
        } else {
            b = Some(self.parse_chp_body()?);
        }
        let x = self.mk_at(
            loc,
            NodeKind::FunctionDef {
                id,
                pl,
                ret: None,
                b,
                cxt: None,
                nr_var: 0,
            },
        );
        self.ast[x].flags |= flags;
        Ok(x)
    }

    fn parse_function_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwFunction)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(Lparen)?;
        let mut pl = Vec::new();
        let mut flags = NodeFlags::empty();
        while !self.lex.have(Rparen) {
            if self.lex.have_next(Varargs)? {
                flags |= NodeFlags::VARARGS;
                break;
            }
            self.parse_value_parameter(&mut pl)?;
            let cont = self.starts_value_parameter() || self.lex.have(Varargs);
            if !self.separator(Semi, cont)? {
                break;
            }
        }
        self.lex.must_be_one_of(&[Semi, Rparen])?;
        self.lex.must_be(Colon)?;
        let ret_tps = self.parse_type()?;
        // the function name doubles as the return slot inside the body
        let ret = self.mk_at(
            loc,
            NodeKind::VarDecl {
                id,
                tps: ret_tps,
                z: None,
                z_sym: None,
                var_idx: 0,
            },
        );
        let mut b = None;
        if self.lex.have_next(KwBuiltin)? {
            flags |= NodeFlags::BUILTIN;
        } else {
            b = Some(self.parse_chp_body()?);
        }
        let x = self.mk_at(
            loc,
            NodeKind::FunctionDef {
                id,
                pl,
                ret: Some(ret),
                b,
                cxt: None,
                nr_var: 0,
            },
        );
        self.ast[x].flags |= flags;
        Ok(x)
    }

    fn parse_const_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwConst)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let mut tps = None;
        if self.lex.have_next(Lbracket)? {
            let end = self.mk_prev(NodeKind::DummyType { tps: None });
            tps = Some(self.parse_inline_array(end)?);
            self.lex.must_be(Colon)?;
            let t = self.parse_type()?;
            if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
                *slot = Some(t);
            }
        } else if self.lex.have_next(Colon)? {
            tps = Some(self.parse_type()?);
        }
        let z = self.parse_initializer()?;
        self.lex.must_be(Semi)?;
        Ok(self.mk_at(loc, NodeKind::ConstDef { id, tps, z }))
    }

    fn parse_field_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwField)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(Eq)?;
        self.lex.must_be(Lbracket)?;
        let l = self.parse_expr()?;
        self.lex.must_be(Dots)?;
        let h = self.parse_expr()?;
        self.lex.must_be(Rbracket)?;
        self.lex.must_be(Semi)?;
        Ok(self.mk_at(loc, NodeKind::FieldDef { id, l, h }))
    }

    fn parse_record_field(&mut self, l: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        let end = self.mk_prev(NodeKind::DummyType { tps: None });
        loop {
            self.lex.must_be(Id)?;
            let id = self.lex.prev.val.as_sym();
            let loc = self.prev_loc();
            let tps = if self.lex.have_next(Lbracket)? {
                self.parse_inline_array(end)?
            } else {
                end
            };
            l.push(self.mk_at(loc, NodeKind::RecordField { id, tps }));
            if !self.lex.have_next(Comma)? {
                break;
            }
        }
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        if let NodeKind::DummyType { tps: slot } = &mut self.ast[end].kind {
            *slot = Some(tps);
        }
        Ok(())
    }

    fn parse_record_type(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwRecord)?;
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut l = Vec::new();
        loop {
            self.parse_record_field(&mut l)?;
            if !self.separator(Semi, self.starts_record_field())? {
                break;
            }
            if !self.starts_record_field() {
                break;
            }
        }
        self.lex.must_be(Rbrace)?;
        Ok(self.mk_at(loc, NodeKind::RecordType { l }))
    }

    fn parse_union_field(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        self.lex.must_be(Id)?;
        let dnid = self.lex.prev.val.as_sym();
        let mut dnmb = None;
        if self.lex.have_next(Lparen)? {
            let mloc = self.prev_loc();
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
            dnmb = Some(self.mk_at(mloc, NodeKind::MetaBinding { x: None, a }));
        }
        self.lex.must_be(Comma)?;
        self.lex.must_be(Id)?;
        let upid = self.lex.prev.val.as_sym();
        let mut upmb = None;
        if self.lex.have_next(Lparen)? {
            let mloc = self.prev_loc();
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
            upmb = Some(self.mk_at(mloc, NodeKind::MetaBinding { x: None, a }));
        }
        self.lex.must_be(Rbrace)?;
        self.lex.must_be(Colon)?;
        let tps = self.parse_type()?;
        Ok(self.mk_at(
            loc,
            NodeKind::UnionField {
                id,
                dnid,
                dnmb,
                upid,
                upmb,
                tps,
                dn: None,
                up: None,
            },
        ))
    }

    fn parse_union_type(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwUnion)?;
        let loc = self.prev_loc();
        self.lex.must_be(Lbrace)?;
        let mut l = Vec::new();
        let mut def = None;
        loop {
            if self.lex.have_next(KwDefault)? {
                if def.is_some() {
                    return Err(self.lex.parse_err("Multiple default fields".into()));
                }
                self.lex.must_be(Colon)?;
                def = Some(self.parse_type()?);
            } else {
                l.push(self.parse_union_field()?);
            }
            if !self.separator(Semi, self.starts_union_field())? {
                break;
            }
            if !self.starts_union_field() {
                break;
            }
        }
        self.lex.must_be(Rbrace)?;
        if def.is_none() {
            return Err(self.lex.parse_err("No default field".into()));
        }
        Ok(self.mk_at(loc, NodeKind::UnionType { l, def }))
    }

    /// `array [l1..h1, l2..h2] of T` desugars to nested single-dimension
    /// arrays.
    fn parse_array_type(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwArray)?;
        let loc = self.prev_loc();
        self.lex.must_be(Lbracket)?;
        let mut dims = Vec::new();
        loop {
            let l = self.parse_expr()?;
            self.lex.must_be(Dots)?;
            let h = self.parse_expr()?;
            dims.push((l, h));
            if !self.separator(Comma, self.starts_expr())? {
                break;
            }
        }
        self.lex.must_be(Rbracket)?;
        self.lex.must_be(KwOf)?;
        let mut tps = self.parse_type()?;
        for (l, h) in dims.into_iter().rev() {
            tps = self.mk_at(loc, NodeKind::ArrayType { l, h, tps });
        }
        Ok(tps)
    }

    pub fn parse_type(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if self.lex.have_next(Lbrace)? {
            // integer range {l..h} or symbol enumeration {a, b, c}
            let loc = self.prev_loc();
            let t = self.parse_expr()?;
            let x;
            if self.lex.have_next(Dots)? {
                let h = self.parse_expr()?;
                x = self.mk_at(loc, NodeKind::IntType { l: t, h });
            } else if self.symbol_type_head(t) {
                let mut l = vec![self.as_sym_name(t)];
                loop {
                    let cont = self.lex.have(Id) || self.lex.have(SymbolConst);
                    if !self.separator(Comma, cont)? {
                        break;
                    }
                    // encourage symbol literals over identifiers
                    if !self.lex.have_next(Id)? {
                        self.lex.must_be(SymbolConst)?;
                    }
                    let id = self.lex.prev.val.as_sym();
                    let nloc = self.prev_loc();
                    l.push(self.mk_at(
                        nloc,
                        NodeKind::Name {
                            id,
                            binding: None,
                            depth: 0,
                        },
                    ));
                }
                x = self.mk_at(loc, NodeKind::SymType { l });
            } else {
                return Err(self.lex.parse_err("Expected '..'".into()));
            }
            self.lex.must_be(Rbrace)?;
            Ok(x)
        } else if self.lex.have_next(Lparen)? {
            self.parse_wired_type()
        } else if self.lex.have(KwArray) {
            self.parse_array_type()
        } else if self.lex.have(KwRecord) {
            self.parse_record_type()
        } else if self.lex.have(KwUnion) {
            self.parse_union_type()
        } else if self.lex.have_next(Id)? {
            let id = self.lex.prev.val.as_sym();
            Ok(self.mk_prev(NodeKind::NamedType { id, binding: None }))
        } else if self.lex.have_next(KwBool)?
            || self.lex.have_next(KwInt)?
            || self.lex.have_next(KwSymbol)?
        {
            let sym = self.lex.prev.kind;
            Ok(self.mk_prev(NodeKind::GenericType { sym }))
        } else {
            Err(self.lex.parse_err("Expected a type".into()))
        }
    }

    /// Can the already-parsed expression open a symbol enumeration?
    fn symbol_type_head(&self, t: NodeId) -> bool {
        if self.ast[t].flags.contains(NodeFlags::PARENTHESIZED) {
            return false;
        }
        matches!(
            self.ast[t].kind,
            NodeKind::Name { .. }
                | NodeKind::Literal {
                    t: TokenKind::SymbolConst,
                    ..
                }
        )
    }

    /// Reuse a parsed head expression as a symbol-enumeration member.
    fn as_sym_name(&mut self, t: NodeId) -> NodeId {
        match self.ast[t].kind {
            NodeKind::Name { .. } => t,
            NodeKind::Literal {
                v: TokenValue::Sym(id),
                ..
            } => self.mk_like(
                t,
                NodeKind::Name {
                    id,
                    binding: None,
                    depth: 0,
                },
            ),
            _ => t,
        }
    }

    fn parse_type_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwType)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        self.lex.must_be(Eq)?;
        let tps = self.parse_type()?;
        self.lex.must_be(Semi)?;
        Ok(self.mk_at(loc, NodeKind::TypeDef { id, tps }))
    }

    pub fn parse_definition(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        if self.lex.have(KwType) {
            self.parse_type_definition()
        } else if self.lex.have(KwConst) {
            self.parse_const_definition()
        } else if self.lex.have(KwFunction) {
            self.parse_function_definition()
        } else if self.lex.have(KwProcedure) {
            self.parse_procedure_definition()
        } else if self.lex.have(KwProcess) {
            self.parse_process_definition()
        } else if self.lex.have(KwField) {
            self.parse_field_definition()
        } else {
            Err(self.lex.parse_err("Expected a definition".into()))
        }
    }

    fn parse_property_declaration(&mut self) -> Result<NodeId> {
        use TokenKind::*;
        self.lex.must_be(KwProperty)?;
        let loc = self.prev_loc();
        self.lex.must_be(Id)?;
        let id = self.lex.prev.val.as_sym();
        let mut z = None;
        if self.lex.have_next(Eq)? {
            z = Some(self.parse_expr()?);
        }
        self.lex.must_be(Semi)?;
        Ok(self.mk_at(loc, NodeKind::PropertyDecl { id, z }))
    }

    pub fn parse_global_definition(&mut self) -> Result<NodeId> {
        let export = self.lex.have_next(TokenKind::KwExport)?;
        let x;
        if self.lex.have(TokenKind::KwProperty) {
            x = self.parse_property_declaration()?;
            // property declarations are implicitly exported
            self.ast[x].flags |= NodeFlags::EXPORT;
        } else {
            x = self.parse_definition()?;
            if export {
                self.ast[x].flags |= NodeFlags::EXPORT;
            }
        }
        Ok(x)
    }

    pub fn parse_required_module(&mut self, rl: &mut Vec<NodeId>) -> Result<()> {
        use TokenKind::*;
        self.lex.must_be(KwRequires)?;
        loop {
            self.lex.must_be(StringConst)?;
            let s = match &self.lex.prev.val {
                TokenValue::Str(s) => s.clone(),
                _ => String::new(),
            };
            rl.push(self.mk_prev(NodeKind::RequiredModule { s, m: None }));
            if !self.separator(Comma, self.lex.have(StringConst))? {
                break;
            }
        }
        self.lex.must_be(Semi)?;
        Ok(())
    }
}
