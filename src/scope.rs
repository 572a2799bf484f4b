//! Scope contexts.
//!
//! Contexts form a tree with upward parent links, held in one arena per
//! load so cross-links are plain indices. An ordinary context carries a
//! map from identifier to binding; a replicator sub-scope carries just the
//! replicator variable's name. Level 0 (a context with no parent) is the
//! import level of a module: duplicate bindings there are retained and
//! marked as conflicts so lookups can report both locations.

use std::collections::HashMap;

use crate::ast::NodeId;
use crate::intern::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtxId(pub u32);

impl CtxId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What an identifier is bound to in one context.
#[derive(Debug, Clone)]
pub enum Binding {
    One(NodeId),
    /// Multiple imports of the same name; kept only to produce readable
    /// errors. Lookup of a conflicting name fails loudly.
    Conflict(Vec<NodeId>),
}

#[derive(Debug)]
pub enum CtxKind {
    Map(HashMap<Symbol, Binding>),
    /// Replicator sub-scope: binds a single name to the owner node.
    Rep(Symbol),
}

#[derive(Debug)]
pub struct Context {
    pub parent: Option<CtxId>,
    /// The AST node that opened this scope.
    pub owner: NodeId,
    pub kind: CtxKind,
}

#[derive(Default)]
pub struct ScopeArena {
    ctxs: Vec<Context>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena { ctxs: Vec::new() }
    }

    pub fn alloc_map(&mut self, parent: Option<CtxId>, owner: NodeId) -> CtxId {
        self.alloc(Context {
            parent,
            owner,
            kind: CtxKind::Map(HashMap::new()),
        })
    }

    pub fn alloc_rep(&mut self, parent: Option<CtxId>, owner: NodeId, id: Symbol) -> CtxId {
        self.alloc(Context {
            parent,
            owner,
            kind: CtxKind::Rep(id),
        })
    }

    fn alloc(&mut self, c: Context) -> CtxId {
        let id = CtxId(self.ctxs.len() as u32);
        self.ctxs.push(c);
        id
    }

    pub fn len(&self) -> usize {
        self.ctxs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctxs.is_empty()
    }
}

impl std::ops::Index<CtxId> for ScopeArena {
    type Output = Context;
    fn index(&self, id: CtxId) -> &Context {
        &self.ctxs[id.index()]
    }
}

impl std::ops::IndexMut<CtxId> for ScopeArena {
    fn index_mut(&mut self, id: CtxId) -> &mut Context {
        &mut self.ctxs[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn contexts_link_upward() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_map(None, NodeId(0));
        let inner = arena.alloc_map(Some(root), NodeId(1));
        assert_eq!(arena[inner].parent, Some(root));
        assert_eq!(arena[root].parent, None);
        assert_eq!(arena[inner].owner, NodeId(1));
    }

    #[test]
    fn rep_context_carries_only_its_name() {
        let mut arena = ScopeArena::new();
        let mut interner = Interner::new();
        let i = interner.intern("i");
        let c = arena.alloc_rep(None, NodeId(2), i);
        match &arena[c].kind {
            CtxKind::Rep(s) => assert_eq!(*s, i),
            CtxKind::Map(_) => panic!("expected replicator context"),
        }
    }

    #[test]
    fn map_context_stores_bindings() {
        let mut arena = ScopeArena::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let c = arena.alloc_map(None, NodeId(0));
        if let CtxKind::Map(m) = &mut arena[c].kind {
            m.insert(x, Binding::One(NodeId(7)));
        }
        match &arena[c].kind {
            CtxKind::Map(m) => match m.get(&x) {
                Some(Binding::One(n)) => assert_eq!(*n, NodeId(7)),
                _ => panic!("missing binding"),
            },
            _ => unreachable!(),
        }
    }
}
