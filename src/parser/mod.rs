//! Recursive-descent parser.
//!
//! One token of lookahead over the lexer. Binary expressions are parsed
//! blindly right-recursive and then rotated into precedence/left-assoc
//! shape (`resolve_precedence` in `expr.rs`). A small set of context flags
//! rides on the parser so the replicator construct and the meta-only
//! statements can be diagnosed precisely.

mod decl;
mod expr;
mod stmt;

use bitflags::bitflags;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Result;
use crate::intern::Symbol;
use crate::lexer::Lexer;
use crate::token::TokenKind;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParseFlags: u32 {
        /// Parsing a statement.
        const STMT = 1 << 0;
        /// A guarded command is allowed here.
        const GC = 1 << 1;
        /// Inside a meta body.
        const META = 1 << 2;
        /// Parsing a production rule.
        const PR = 1 << 3;
        /// Delay holds are allowed in the production-rule parse.
        const HOLD = 1 << 4;
    }
}

/// Source position of a node: line and column.
#[derive(Debug, Clone, Copy)]
pub struct Loc {
    pub lnr: u32,
    pub lpos: usize,
}

pub struct Parser<'l, 'i> {
    pub lex: &'l mut Lexer<'i>,
    pub ast: &'l mut Ast,
    pub pflags: ParseFlags,
    /// Interned name of the file being parsed, stamped on every node.
    pub src: Symbol,
}

impl<'l, 'i> Parser<'l, 'i> {
    pub fn new(lex: &'l mut Lexer<'i>, ast: &'l mut Ast) -> Self {
        let nm = lex.fin_nm.clone();
        let src = lex.interner.intern(&nm);
        Parser {
            lex,
            ast,
            pflags: ParseFlags::empty(),
            src,
        }
    }

    pub fn curr_loc(&self) -> Loc {
        Loc {
            lnr: self.lex.curr.lnr,
            lpos: self.lex.curr.start,
        }
    }

    pub fn prev_loc(&self) -> Loc {
        Loc {
            lnr: self.lex.prev.lnr,
            lpos: self.lex.prev.start,
        }
    }

    pub fn node_loc(&self, x: NodeId) -> Loc {
        Loc {
            lnr: self.ast[x].lnr,
            lpos: self.ast[x].lpos,
        }
    }

    pub fn mk_at(&mut self, loc: Loc, kind: NodeKind) -> NodeId {
        self.ast.alloc(kind, self.src, loc.lnr, loc.lpos)
    }

    /// New node at the position of the just-consumed token.
    pub fn mk_prev(&mut self, kind: NodeKind) -> NodeId {
        let loc = self.prev_loc();
        self.mk_at(loc, kind)
    }

    /// New node at the position of the current token.
    pub fn mk_curr(&mut self, kind: NodeKind) -> NodeId {
        let loc = self.curr_loc();
        self.mk_at(loc, kind)
    }

    /// New node sharing the position of an existing node.
    pub fn mk_like(&mut self, x: NodeId, kind: NodeKind) -> NodeId {
        let loc = self.node_loc(x);
        self.mk_at(loc, kind)
    }

    /// Separator handling inside a list: if the separator is present,
    /// absorb it and return true. If it is missing but a valid list
    /// element follows (`cont`), report "Missing X". Otherwise the list
    /// ends; return false.
    pub fn separator(&mut self, t: TokenKind, cont: bool) -> Result<bool> {
        if self.lex.have_next(t)? {
            return Ok(true);
        }
        if cont {
            return Err(self.lex.parse_err(format!("Missing {}", t.name())));
        }
        Ok(false)
    }

    // ----- start-set predicates -----

    pub fn starts_literal(&self) -> bool {
        use TokenKind::*;
        matches!(
            self.lex.curr.kind,
            IntConst | BigConst | StringConst | CharConst | Id | SymbolConst | FloatConst
        ) || self.lex.have(KwTrue)
            || self.lex.have(KwFalse)
    }

    pub fn starts_atom(&self) -> bool {
        self.lex.have(TokenKind::Lbracket)
            || self.lex.have(TokenKind::Lbrace)
            || self.lex.have(TokenKind::Lt)
            || self.starts_literal()
    }

    pub fn starts_postfix_expr(&self) -> bool {
        self.lex.have(TokenKind::Id) || self.lex.have(TokenKind::Lparen) || self.starts_atom()
    }

    pub fn starts_prefix_expr(&self) -> bool {
        use TokenKind::*;
        self.lex.have(Plus)
            || self.lex.have(Minus)
            || self.lex.have(Tilde)
            || self.lex.have(Hash)
            || self.starts_postfix_expr()
    }

    pub fn starts_expr(&self) -> bool {
        self.starts_prefix_expr() || self.lex.have(TokenKind::Rep)
    }

    pub fn starts_statement(&self) -> bool {
        use TokenKind::*;
        self.lex.have(KwSkip)
            || self.starts_expr()
            || self.lex.have(Loop)
            || self.lex.have(Lbracket)
            || self.lex.have(Lbrace)
            || self.lex.have(KwConnect)
            || self.lex.have(KwInstance)
    }

    pub fn starts_parallel_statement(&self) -> bool {
        self.starts_statement()
    }

    pub fn starts_definition(&self) -> bool {
        use TokenKind::*;
        self.lex.have(KwType)
            || self.lex.have(KwConst)
            || self.lex.have(KwFunction)
            || self.lex.have(KwProcedure)
            || self.lex.have(KwProcess)
            || self.lex.have(KwField)
    }

    pub fn starts_global_definition(&self) -> bool {
        self.lex.have(TokenKind::KwExport)
            || self.starts_definition()
            || self.lex.have(TokenKind::KwProperty)
    }

    pub fn starts_var_declaration(&self) -> bool {
        self.lex.have(TokenKind::KwVar) || self.lex.have(TokenKind::KwVolatile)
    }

    pub fn starts_production_rule(&self) -> bool {
        self.lex.have(TokenKind::KwAfter)
            || self.lex.have(TokenKind::KwAtomic)
            || self.starts_expr()
    }

    pub fn starts_value_parameter(&self) -> bool {
        use TokenKind::*;
        self.lex.have(KwVal) || self.lex.have(KwConst) || self.lex.have(Id)
    }

    pub fn starts_result_parameter(&self) -> bool {
        self.lex.have(TokenKind::KwRes) || self.lex.have(TokenKind::KwValres)
    }

    pub fn starts_port_parameter(&self) -> bool {
        self.lex.have(TokenKind::Id) || self.lex.have(TokenKind::Lparen)
    }

    pub fn starts_meta_parameter(&self) -> bool {
        self.lex.have(TokenKind::Id)
    }

    pub fn starts_record_field(&self) -> bool {
        self.lex.have(TokenKind::Id)
    }

    pub fn starts_union_field(&self) -> bool {
        self.lex.have(TokenKind::Id) || self.lex.have(TokenKind::KwDefault)
    }

    /// Parse one source file: `requires` declarations followed by global
    /// definitions. Returns the module node.
    pub fn parse_source_file(&mut self) -> Result<NodeId> {
        let loc = self.curr_loc();
        let mut rl = Vec::new();
        let mut dl = Vec::new();
        if self.lex.have(TokenKind::KwRequires) || self.starts_global_definition() {
            while self.lex.have(TokenKind::KwRequires) {
                self.parse_required_module(&mut rl)?;
            }
            while self.starts_global_definition() {
                dl.push(self.parse_global_definition()?);
            }
        } else if self.lex.have(TokenKind::Eof) {
            self.lex.warning("Empty source file");
        } else {
            return Err(self
                .lex
                .parse_err("Expected a required_module or global_definition".into()));
        }
        if !self.lex.have(TokenKind::Eof) {
            return Err(self.lex.parse_err("Expected a global_definition".into()));
        }
        Ok(self.mk_at(loc, NodeKind::ModuleDef { m: None, rl, dl }))
    }
}
