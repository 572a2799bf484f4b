//! The parse tree.
//!
//! Nodes live in one arena per load (`Ast`); cross-references are `NodeId`
//! indices, so shared sub-structure (a loop's end marker appended to every
//! guarded command, the type shared by a multi-name declaration) is just a
//! repeated id. Every node carries its variant, source position, a flag
//! set, and two slots filled in by semantic analysis: the reduced type and
//! the folded constant value.

pub mod print;

use bitflags::bitflags;

use crate::exec::Value;
use crate::intern::Symbol;
use crate::modules::ModuleId;
use crate::scope::CtxId;
use crate::token::{TokenKind, TokenValue};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        /// Definition is visible to importing modules.
        const EXPORT = 1 << 0;
        /// Expression was written in parentheses; frozen against
        /// precedence rotation.
        const PARENTHESIZED = 1 << 1;
        const VOLATILE = 1 << 2;
        /// Dataless synchronization port.
        const PORT = 1 << 3;
        const INPORT = 1 << 4;
        const OUTPORT = 1 << 5;
        const WIRE = 1 << 6;
        const WRITABLE = 1 << 7;
        /// First semantic pass has run on this node.
        const FORWARD = 1 << 8;
        const VARARGS = 1 << 9;
        /// `val` slot holds the folded constant.
        const CONST_FOLDED = 1 << 10;
        /// Expression is not a compile-time constant.
        const UNCONST = 1 << 11;
        /// Wire declared through a default wired port.
        const DEF_WIRE = 1 << 12;
        /// Routine body is provided by the simulator.
        const BUILTIN = 1 << 13;
        /// End marker closes a routine body rather than a loop iteration.
        const END_BODY = 1 << 14;
        /// Something is wrong with this node; analysis continued.
        const ERROR = 1 << 15;
    }
}

/// Communication statement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommOp {
    /// `p!e`
    Send,
    /// `p?v`
    Recv,
    /// `p#?v`
    Peek,
    /// `p!e?` — send, then receive on the same port
    SendRecv,
}

/// Kinds of process sub-bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Chp,
    Meta,
    Hse,
    Prs,
    Delay,
    Property,
}

impl BodyKind {
    pub fn name(self) -> &'static str {
        match self {
            BodyKind::Chp => "chp",
            BodyKind::Meta => "meta",
            BodyKind::Hse => "hse",
            BodyKind::Prs => "prs",
            BodyKind::Delay => "delay",
            BodyKind::Property => "property",
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // ----- expressions -----
    /// Literal constant: int, bigint, char, string, symbol, bool, float.
    Literal { t: TokenKind, v: TokenValue },
    /// Name reference. `binding` is filled in by analysis; `depth` counts
    /// the replicator sub-scopes between the reference and its binding.
    Name {
        id: Symbol,
        binding: Option<NodeId>,
        depth: u32,
    },
    Binary { op: TokenKind, l: NodeId, r: NodeId },
    Prefix { op: TokenKind, r: NodeId },
    Subscript { x: NodeId, idx: NodeId },
    Subrange { x: NodeId, l: NodeId, h: NodeId },
    FieldOf {
        x: NodeId,
        id: Symbol,
        field: Option<NodeId>,
    },
    /// Function call, procedure call, or meta binding written by name.
    Call {
        id: Symbol,
        args: Vec<NodeId>,
        binding: Option<NodeId>,
    },
    ArrayCons { l: Vec<NodeId> },
    RecordCons { l: Vec<NodeId> },
    /// `<T>` — a type as a value, for generic meta parameters.
    TypeValue { tps: NodeId },
    /// `#{p1,...,pn : b}`
    ValueProbe { p: Vec<NodeId>, b: NodeId },
    /// `<<op i: l..h: v>>`
    RepExpr {
        sym: TokenKind,
        id: Symbol,
        l: NodeId,
        h: NodeId,
        v: NodeId,
        cxt: Option<CtxId>,
    },

    // ----- statements -----
    Skip,
    /// Shared end-of-iteration (or end-of-body) marker.
    EndStmt,
    Assign { v: NodeId, e: NodeId },
    /// `v+` / `v-`
    BoolSet { v: NodeId, op: TokenKind },
    Comm { p: NodeId, op: CommOp, e: NodeId },
    Guarded { g: NodeId, l: Vec<NodeId> },
    /// `[g1 -> s1 [] g2 -> s2]`, or the wait `[e]` when `gl` is empty.
    Select {
        gl: Vec<NodeId>,
        w: Option<NodeId>,
        mutex: bool,
    },
    /// `*[ ... ]`
    LoopStmt {
        gl: Vec<NodeId>,
        sl: Vec<NodeId>,
        mutex: bool,
    },
    Compound { l: Vec<NodeId> },
    Parallel { l: Vec<NodeId> },
    Connect { a: NodeId, b: NodeId },
    InstanceStmt { d: NodeId, mb: Option<NodeId> },
    /// `x(a1,...,an)` applying meta arguments to an instance.
    MetaBinding { x: Option<NodeId>, a: Vec<NodeId> },
    /// `<<sym i: l..h: s1; s2>>`; `sym` is `Nothing` for production-rule
    /// replicators.
    RepStmt {
        sym: TokenKind,
        id: Symbol,
        l: NodeId,
        h: NodeId,
        sl: Vec<NodeId>,
        cxt: Option<CtxId>,
    },
    PropertyStmt { id: Symbol, node: NodeId, v: NodeId },

    // ----- production rules -----
    /// `v+` or `v-` inside a delay hold.
    Transition { v: NodeId, op: TokenKind },
    ProductionRule {
        g: NodeId,
        v: NodeId,
        op: TokenKind,
        atomic: bool,
        delay: Option<NodeId>,
    },
    /// `{t1,...,tn} requires {c > n}`
    DelayHold {
        l: Vec<NodeId>,
        c: NodeId,
        n: Option<NodeId>,
    },

    // ----- declarations -----
    VarDecl {
        id: Symbol,
        tps: NodeId,
        z: Option<NodeId>,
        z_sym: Option<TokenKind>,
        var_idx: u32,
    },
    /// `val`/`valres`/`res`/`const` routine parameter wrapping a
    /// declaration.
    Parameter { par_sym: TokenKind, d: NodeId },
    MetaParameter {
        id: Symbol,
        tps: NodeId,
        meta_idx: u32,
    },
    RecordField { id: Symbol, tps: NodeId },
    WireDecl {
        id: Symbol,
        tps: NodeId,
        init_sym: Option<TokenKind>,
        z: Option<NodeId>,
    },
    TypeDef { id: Symbol, tps: NodeId },
    ConstDef {
        id: Symbol,
        tps: Option<NodeId>,
        z: NodeId,
    },
    /// `field f = [l..h];` — a bit-range alias.
    FieldDef { id: Symbol, l: NodeId, h: NodeId },
    PropertyDecl { id: Symbol, z: Option<NodeId> },
    RequiredModule { s: String, m: Option<ModuleId> },
    ProcessDef {
        id: Symbol,
        ml: Vec<NodeId>,
        pl: Vec<NodeId>,
        mb: Option<NodeId>,
        cb: Option<NodeId>,
        hb: Option<NodeId>,
        pb: Option<NodeId>,
        db: Option<NodeId>,
        ppb: Option<NodeId>,
        cxt: Option<CtxId>,
        nr_meta: u32,
        nr_var: u32,
    },
    /// Function or procedure; functions have a return declaration.
    FunctionDef {
        id: Symbol,
        pl: Vec<NodeId>,
        ret: Option<NodeId>,
        b: Option<NodeId>,
        cxt: Option<CtxId>,
        nr_var: u32,
    },
    /// One `chp`/`meta`/`hse`/`prs`/`delay`/`property` body.
    Body {
        kind: BodyKind,
        dl: Vec<NodeId>,
        sl: Vec<NodeId>,
        cxt: Option<CtxId>,
    },
    /// Top of a source file: requires then global definitions.
    ModuleDef {
        m: Option<ModuleId>,
        rl: Vec<NodeId>,
        dl: Vec<NodeId>,
    },

    // ----- type syntax -----
    /// `{l..h}`
    IntType { l: NodeId, h: NodeId },
    /// `{a, b, c}` — names or symbol literals.
    SymType { l: Vec<NodeId> },
    /// `array [l..h] of tps`
    ArrayType { l: NodeId, h: NodeId, tps: NodeId },
    RecordType { l: Vec<NodeId> },
    UnionType { l: Vec<NodeId>, def: Option<NodeId> },
    /// One union arm with its down/up coercion routines.
    UnionField {
        id: Symbol,
        dnid: Symbol,
        dnmb: Option<NodeId>,
        upid: Symbol,
        upmb: Option<NodeId>,
        tps: NodeId,
        dn: Option<NodeId>,
        up: Option<NodeId>,
    },
    NamedType {
        id: Symbol,
        binding: Option<NodeId>,
    },
    /// `bool`, `int`, `symbol`, or `type` (for meta parameters).
    GenericType { sym: TokenKind },
    /// `(in1, in2; out1, out2)`
    WiredType { li: Vec<NodeId>, lo: Vec<NodeId> },
    /// Placeholder shared by the names of a multi-name declaration until
    /// the real type has been parsed.
    DummyType { tps: Option<NodeId> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Source file the node came from.
    pub src: Symbol,
    pub lnr: u32,
    pub lpos: usize,
    pub flags: NodeFlags,
    /// Reduced type, filled in by semantic analysis.
    pub tp: Type,
    /// Folded constant value, when `CONST_FOLDED` is set.
    pub val: Value,
}

/// Node arena for one load. Kept alive until the end of simulation; a
/// failed load drops the whole arena.
#[derive(Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, kind: NodeKind, src: Symbol, lnr: u32, lpos: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            src,
            lnr,
            lpos,
            flags: NodeFlags::empty(),
            tp: Type::None,
            val: Value::None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The declared name of a definition or declaration node, if it has one.
    pub fn name_of(&self, x: NodeId) -> Option<Symbol> {
        match &self[x].kind {
            NodeKind::VarDecl { id, .. }
            | NodeKind::MetaParameter { id, .. }
            | NodeKind::RecordField { id, .. }
            | NodeKind::WireDecl { id, .. }
            | NodeKind::TypeDef { id, .. }
            | NodeKind::ConstDef { id, .. }
            | NodeKind::FieldDef { id, .. }
            | NodeKind::PropertyDecl { id, .. }
            | NodeKind::ProcessDef { id, .. }
            | NodeKind::FunctionDef { id, .. }
            | NodeKind::UnionField { id, .. } => Some(*id),
            NodeKind::Parameter { d, .. } => self.name_of(*d),
            _ => None,
        }
    }

    /// True for declarations whose visibility stops at routine-body
    /// boundaries.
    pub fn is_variable(&self, x: NodeId) -> bool {
        matches!(
            self[x].kind,
            NodeKind::VarDecl { .. } | NodeKind::Parameter { .. } | NodeKind::WireDecl { .. }
        )
    }
}

impl std::ops::Index<NodeId> for Ast {
    type Output = Node;
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl std::ops::IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.alloc(NodeKind::Skip, Symbol::EMPTY, 1, 0);
        let b = ast.alloc(NodeKind::Skip, Symbol::EMPTY, 1, 4);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(ast.len(), 2);
    }

    #[test]
    fn nodes_start_untyped_and_unflagged() {
        let mut ast = Ast::new();
        let a = ast.alloc(NodeKind::Skip, Symbol::EMPTY, 3, 7);
        assert_eq!(ast[a].flags, NodeFlags::empty());
        assert_eq!(ast[a].tp, Type::None);
        assert_eq!(ast[a].lnr, 3);
        assert_eq!(ast[a].lpos, 7);
    }

    #[test]
    fn name_of_sees_through_parameters() {
        let mut ast = Ast::new();
        let mut interner = crate::intern::Interner::new();
        let n = interner.intern("n");
        let d = ast.alloc(
            NodeKind::VarDecl {
                id: n,
                tps: NodeId(0),
                z: None,
                z_sym: None,
                var_idx: 0,
            },
            Symbol::EMPTY,
            1,
            0,
        );
        let p = ast.alloc(
            NodeKind::Parameter {
                par_sym: crate::token::TokenKind::KwVal,
                d,
            },
            Symbol::EMPTY,
            1,
            0,
        );
        assert_eq!(ast.name_of(p), Some(n));
        assert!(ast.is_variable(p));
    }

    #[test]
    fn shared_node_ids_alias() {
        let mut ast = Ast::new();
        let end = ast.alloc(NodeKind::EndStmt, Symbol::EMPTY, 9, 0);
        ast[end].flags |= NodeFlags::END_BODY;
        let l1 = vec![end];
        let l2 = vec![end];
        assert!(ast[l1[0]].flags.contains(NodeFlags::END_BODY));
        assert_eq!(l1[0], l2[0]);
    }
}
