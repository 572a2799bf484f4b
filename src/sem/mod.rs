//! Semantic analysis.
//!
//! The analyzer walks the resolver's reverse-topological module list
//! twice. The first pass declares every top-level routine, type, and
//! constant and resolves signatures, so routines can be mutually recursive
//! without textual ordering; bodies are skipped. The second pass re-enters
//! every module with complete global visibility, analyzes bodies, types
//! every expression, and links every name reference. Nodes mark the first
//! pass with the `FORWARD` flag, which also makes re-running a pass a
//! no-op.
//!
//! Scope rules: all names share one name space; imported names sit at
//! level 0 and local definitions shadow them silently; duplicate names at
//! any deeper level are errors; variables and parameters are visible only
//! inside the routine that declares them, while types, constants, routines
//! and fields pass through body boundaries.

mod expr;
mod stmt;

use std::rc::Rc;

use bitflags::bitflags;

use crate::ast::{BodyKind, NodeFlags, NodeId, NodeKind};
use crate::error::{Diagnostic, Result};
use crate::exec::Value;
use crate::intern::Symbol;
use crate::modules::{Driver, ModuleId};
use crate::scope::{Binding, CtxId, CtxKind};
use crate::token::TokenKind;
use crate::types::{Type, UnionArm, UnionTp};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SemFlags: u32 {
        /// Inside a function or procedure definition.
        const FUNC_DEF = 1 << 0;
        /// Inside the boolean of a value probe.
        const VALUE_PROBE = 1 << 1;
        /// Inside a meta body.
        const META = 1 << 2;
        /// Inside a prs or delay body.
        const PRS = 1 << 3;
        /// Inside a delay body.
        const DELAY = 1 << 4;
        /// Property references are allowed.
        const PROP = 1 << 5;
        /// Inside an instance declaration.
        const INSTANCE_DECL = 1 << 6;
        /// Inside a connect statement.
        const CONNECT = 1 << 7;
    }
}

struct Frame {
    cxt: Option<CtxId>,
    var_idx: u32,
    curr_routine: Option<NodeId>,
    rv_ref_depth: i32,
}

pub struct Analyzer<'d> {
    pub d: &'d mut Driver,
    cxt: Option<CtxId>,
    pub flags: SemFlags,
    /// Counts meta parameters of the current process.
    meta_idx: u32,
    /// Counts variables of the current scope level.
    var_idx: u32,
    /// Largest replicator depth crossed by a reference, for the
    /// executor's back-references. Negative while not tracking.
    rv_ref_depth: i32,
    curr_routine: Option<NodeId>,
    curr: Option<ModuleId>,
    frames: Vec<Frame>,
    /// Replicator sub-scopes crossed by the most recent successful
    /// lookup; becomes the frame depth of variable references.
    crossed: u32,
}

impl<'d> Analyzer<'d> {
    pub fn new(d: &'d mut Driver) -> Self {
        Analyzer {
            d,
            cxt: None,
            flags: SemFlags::empty(),
            meta_idx: 0,
            var_idx: 0,
            rv_ref_depth: -1,
            curr_routine: None,
            curr: None,
            frames: Vec::new(),
            crossed: 0,
        }
    }

    /// Run both passes over a reverse-topological module order.
    pub fn run(&mut self, order: &[ModuleId]) -> Result<()> {
        for _pass in 0..2 {
            for &m in order {
                self.sem_module(m)?;
            }
        }
        Ok(())
    }

    // ----- scope stack -----

    fn push_frame(&mut self) {
        self.frames.push(Frame {
            cxt: self.cxt,
            var_idx: self.var_idx,
            curr_routine: self.curr_routine,
            rv_ref_depth: self.rv_ref_depth,
        });
    }

    /// Start a nested scope level (resets the variable counter).
    fn enter_level(&mut self, owner: NodeId, existing: Option<CtxId>) -> CtxId {
        self.push_frame();
        let parent = self.cxt;
        let c = existing.unwrap_or_else(|| self.d.scopes.alloc_map(parent, owner));
        self.cxt = Some(c);
        self.var_idx = 0;
        self.rv_ref_depth = -1;
        c
    }

    /// Start a nested scope level that is a routine body (variable
    /// numbering continues from the parameter level).
    fn enter_body(&mut self, owner: NodeId, existing: Option<CtxId>) -> CtxId {
        self.push_frame();
        let parent = self.cxt;
        let c = existing.unwrap_or_else(|| self.d.scopes.alloc_map(parent, owner));
        self.cxt = Some(c);
        self.rv_ref_depth = -1;
        c
    }

    /// Start a replicator sub-scope carrying only the replicator binding.
    fn enter_sublevel(&mut self, owner: NodeId, id: Symbol, existing: Option<CtxId>) -> CtxId {
        self.push_frame();
        let parent = self.cxt;
        let c = existing.unwrap_or_else(|| self.d.scopes.alloc_rep(parent, owner, id));
        self.cxt = Some(c);
        if self.rv_ref_depth >= 0 {
            self.rv_ref_depth += 1;
        }
        c
    }

    fn leave_level(&mut self) {
        let f = self.frames.pop().expect("leave_level without enter");
        self.cxt = f.cxt;
        self.var_idx = f.var_idx;
        self.curr_routine = f.curr_routine;
        self.rv_ref_depth = f.rv_ref_depth - 1;
    }

    // ----- declarations and lookup -----

    /// Bind `id` to `x` in the current scope. At the root (import) level
    /// a duplicate binding becomes a conflict marker instead of an error;
    /// anywhere else it is a duplicate-definition error.
    pub fn declare_id(&mut self, id: Symbol, x: NodeId) -> Result<()> {
        let cxt = self.cxt.expect("declare outside any scope");
        let parent = self.d.scopes[cxt].parent;
        let existing = match &self.d.scopes[cxt].kind {
            CtxKind::Map(m) => m.get(&id).cloned(),
            CtxKind::Rep(_) => None,
        };
        match existing {
            None => {
                if let CtxKind::Map(m) = &mut self.d.scopes[cxt].kind {
                    m.insert(id, Binding::One(x));
                }
                Ok(())
            }
            Some(Binding::Conflict(_)) => Ok(()),
            Some(Binding::One(d0)) if d0 == x => Ok(()),
            Some(Binding::One(d0)) => {
                if parent.is_none() {
                    if let CtxKind::Map(m) = &mut self.d.scopes[cxt].kind {
                        m.insert(id, Binding::Conflict(vec![x, d0]));
                    }
                    return Ok(());
                }
                let what = if self.d.ast.is_variable(d0) {
                    "declared"
                } else {
                    "defined"
                };
                let src = self.d.interner.resolve(self.d.ast[d0].src).to_string();
                let lnr = self.d.ast[d0].lnr;
                Err(self.d.node_error(
                    x,
                    format!(
                        "{} was already {} at {}[{}]",
                        self.d.interner.resolve(id),
                        what,
                        src,
                        lnr
                    ),
                ))
            }
        }
    }

    /// Look `id` up, climbing the scope chain. `at` locates errors.
    /// Crossing a routine-body boundary hides variables and parameters
    /// but not types, constants, routines, or fields.
    pub fn find_id(&mut self, id: Symbol, at: NodeId) -> Result<NodeId> {
        let mut cxt = self.cxt;
        let mut no_var = false;
        let mut crossed = 0;
        let mut found: Option<Binding> = None;
        while let Some(c) = cxt {
            let parent = self.d.scopes[c].parent;
            match &self.d.scopes[c].kind {
                CtxKind::Map(m) => {
                    if let Some(b) = m.get(&id) {
                        found = Some(b.clone());
                        break;
                    }
                    if let Some(p) = parent {
                        if self.d.scopes[p].owner != self.d.scopes[c].owner {
                            no_var = true;
                        }
                    }
                }
                CtxKind::Rep(s) => {
                    if *s == id {
                        self.crossed = crossed;
                        return Ok(self.d.scopes[c].owner);
                    }
                    crossed += 1;
                }
            }
            cxt = parent;
        }
        self.crossed = crossed;
        let Some(found) = found else {
            return Err(self
                .d
                .node_error(at, format!("Unknown name: {}", self.d.interner.resolve(id))));
        };
        match found {
            Binding::Conflict(l) => {
                let mut msg = format!(
                    "{} is not visible due to an import conflict:",
                    self.d.interner.resolve(id)
                );
                for n in l {
                    msg.push_str(&format!(
                        "\n\t{}[{}]",
                        self.d.interner.resolve(self.d.ast[n].src),
                        self.d.ast[n].lnr
                    ));
                }
                Err(self.d.node_error(at, msg))
            }
            Binding::One(d0) => {
                if no_var && self.d.ast.is_variable(d0) {
                    let what = if matches!(self.d.ast[d0].kind, NodeKind::Parameter { .. }) {
                        "Parameter"
                    } else {
                        "Variable"
                    };
                    return Err(self.d.node_error(
                        at,
                        format!("{} {} is not in scope", what, self.d.interner.resolve(id)),
                    ));
                }
                Ok(d0)
            }
        }
    }

    /// Replicator sub-scopes crossed by the most recent lookup.
    pub fn rep_crossed(&self) -> u32 {
        self.crossed
    }

    /// Relative replicator depth of `id`, which `find_id` just resolved
    /// to a replicator binding. Tracks the maximum depth crossed.
    pub fn find_level(&mut self, id: Symbol) -> u32 {
        let mut level: u32 = 0;
        let mut cxt = self.cxt;
        while let Some(c) = cxt {
            if let CtxKind::Rep(s) = &self.d.scopes[c].kind {
                if *s == id {
                    break;
                }
            }
            cxt = self.d.scopes[c].parent;
            level += 1;
        }
        if level as i32 > self.rv_ref_depth {
            self.rv_ref_depth = level as i32;
        }
        level
    }

    // ----- importing -----

    /// Import every exported declaration of module `m` into the current
    /// (import) scope.
    fn import_module(&mut self, m: ModuleId) -> Result<()> {
        debug_assert!(self.d.module(m).flags.contains(NodeFlags::FORWARD));
        self.d.module_mut(m).importer = self.curr;
        let dl = match &self.d.ast[self.d.module(m).node].kind {
            NodeKind::ModuleDef { dl, .. } => dl.clone(),
            _ => Vec::new(),
        };
        for x in dl {
            if !self.d.ast[x].flags.contains(NodeFlags::EXPORT) {
                continue;
            }
            if let Some(id) = self.d.ast.name_of(x) {
                self.declare_id(id, x)?;
            }
        }
        Ok(())
    }

    /// Process one `requires` edge. Within a dependency cycle the first
    /// pass skips the import entirely (only routine names would be
    /// usable, and the first pass does not need them); the second pass
    /// imports in full.
    fn sem_required_module(&mut self, x: NodeId) -> Result<()> {
        let m = match &self.d.ast[x].kind {
            NodeKind::RequiredModule { m: Some(m), .. } => *m,
            NodeKind::RequiredModule { m: None, .. } => {
                return Err(Diagnostic::internal("unresolved required module".into()))
            }
            _ => return Ok(()),
        };
        if !self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            self.d.ast[x].flags |= NodeFlags::FORWARD;
            let dr = self.d.cycle_rep(m);
            let cr = self.d.cycle_rep(self.curr.expect("no current module"));
            if dr == cr {
                return Ok(());
            }
        }
        if self.d.module(m).importer.is_some() && self.d.module(m).importer == self.curr {
            // importing twice would hide all declarations, so don't
            return Ok(());
        }
        self.import_module(m)
    }

    /// One pass over one module: imports, then the declaration list.
    fn sem_module(&mut self, m: ModuleId) -> Result<()> {
        self.curr = Some(m);
        let mod_node = self.d.module(m).node;
        let import_cxt = self.d.module(m).import_cxt;
        let c0 = self.enter_level(mod_node, import_cxt);
        self.d.module_mut(m).import_cxt = Some(c0);
        let rl = match &self.d.ast[mod_node].kind {
            NodeKind::ModuleDef { rl, .. } => rl.clone(),
            _ => Vec::new(),
        };
        for &r in &rl {
            self.sem_required_module(r)?;
        }
        for &r in &rl {
            if let NodeKind::RequiredModule { m: Some(rm), .. } = self.d.ast[r].kind {
                self.d.module_mut(rm).importer = None;
            }
        }
        let cxt = self.d.module(m).cxt;
        let c1 = self.enter_level(mod_node, cxt);
        self.d.module_mut(m).cxt = Some(c1);
        let dl = match &self.d.ast[mod_node].kind {
            NodeKind::ModuleDef { dl, .. } => dl.clone(),
            _ => Vec::new(),
        };
        for x in dl {
            self.sem(x)?;
        }
        self.d.module_mut(m).flags |= NodeFlags::FORWARD;
        if Some(m) == self.d.builtin {
            self.fix_builtin_string();
        }
        self.leave_level();
        self.leave_level();
        self.curr = None;
        Ok(())
    }

    /// Patch the built-in `string` type so string-type equivalence
    /// ignores the internal length parameter.
    fn fix_builtin_string(&mut self) {
        let Some(sym) = self.d.interner.lookup("string") else {
            return;
        };
        let Some(cxt) = self.d.module(self.d.builtin.expect("builtin not loaded")).cxt else {
            return;
        };
        if let CtxKind::Map(m) = &self.d.scopes[cxt].kind {
            if let Some(Binding::One(td)) = m.get(&sym) {
                let td = *td;
                if matches!(self.d.ast[td].kind, NodeKind::TypeDef { .. }) {
                    self.d.ast[td].tp = Type::String;
                }
            }
        }
    }

    // ----- per-node dispatch -----

    /// Semantic analysis of one node. Declarations use the `FORWARD` flag
    /// to distinguish the signature pass from the body pass.
    pub fn sem(&mut self, x: NodeId) -> Result<()> {
        match &self.d.ast[x].kind {
            NodeKind::TypeDef { .. } => self.sem_type_def(x),
            NodeKind::ConstDef { .. } => self.sem_const_def(x),
            NodeKind::FieldDef { .. } => self.sem_field_def(x),
            NodeKind::PropertyDecl { .. } => self.sem_property_decl(x),
            NodeKind::VarDecl { .. } => self.sem_var_decl(x),
            NodeKind::Parameter { .. } => self.sem_parameter(x),
            NodeKind::MetaParameter { .. } => self.sem_meta_parameter(x),
            NodeKind::FunctionDef { .. } => self.sem_function_def(x),
            NodeKind::ProcessDef { .. } => self.sem_process_def(x),
            NodeKind::RequiredModule { .. } => self.sem_required_module(x),
            _ => self.sem_stmt(x),
        }
    }

    fn sem_type_def(&mut self, x: NodeId) -> Result<()> {
        let (id, tps) = match &self.d.ast[x].kind {
            NodeKind::TypeDef { id, tps } => (*id, *tps),
            _ => unreachable!(),
        };
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            // routines may be defined after the type that names them, so
            // union coercions link on the second pass
            return self.link_union_routines(tps);
        }
        self.declare_id(id, x)?;
        let tp = self.sem_type(tps)?;
        self.d.ast[x].tp = tp;
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    /// Resolve the up/down coercion routines of a union type once every
    /// routine of the module is forward-declared.
    fn link_union_routines(&mut self, tps: NodeId) -> Result<()> {
        let mut t = tps;
        loop {
            match &self.d.ast[t].kind {
                NodeKind::DummyType { tps: Some(n) } => t = *n,
                NodeKind::ArrayType { tps: n, .. } => t = *n,
                NodeKind::UnionType { .. } => break,
                _ => return Ok(()),
            }
        }
        let arms = match &self.d.ast[t].kind {
            NodeKind::UnionType { l, .. } => l.clone(),
            _ => return Ok(()),
        };
        for f in arms {
            let (dnid, upid, dn, up) = match &self.d.ast[f].kind {
                NodeKind::UnionField {
                    dnid, upid, dn, up, ..
                } => (*dnid, *upid, *dn, *up),
                _ => continue,
            };
            let dn = match dn {
                Some(d) => d,
                None => self.find_routine(dnid, f)?,
            };
            let up = match up {
                Some(u) => u,
                None => self.find_routine(upid, f)?,
            };
            if let NodeKind::UnionField {
                dn: dslot,
                up: uslot,
                ..
            } = &mut self.d.ast[f].kind
            {
                *dslot = Some(dn);
                *uslot = Some(up);
            }
        }
        Ok(())
    }

    fn sem_const_def(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let (id, tps, z) = match &self.d.ast[x].kind {
            NodeKind::ConstDef { id, tps, z } => (*id, *tps, *z),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        let declared = match tps {
            Some(t) => Some(self.sem_type(t)?),
            None => None,
        };
        self.sem_expr(z)?;
        if self.d.ast[z].flags.contains(NodeFlags::UNCONST) {
            return Err(self.d.node_error(
                z,
                format!(
                    "Initializer of constant {} is not constant",
                    self.d.interner.resolve(id)
                ),
            ));
        }
        if let Some(tp) = &declared {
            if !crate::types::assignable(tp, &self.d.ast[z].tp) {
                return Err(self.d.node_error(
                    z,
                    format!(
                        "Initializer type does not match constant {}",
                        self.d.interner.resolve(id)
                    ),
                ));
            }
        }
        self.d.ast[x].tp = declared.unwrap_or_else(|| self.d.ast[z].tp.clone());
        self.d.ast[x].val = self.d.ast[z].val.clone();
        self.d.ast[x].flags |= NodeFlags::FORWARD | NodeFlags::CONST_FOLDED;
        Ok(())
    }

    fn sem_field_def(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let (id, l, h) = match &self.d.ast[x].kind {
            NodeKind::FieldDef { id, l, h } => (*id, *l, *h),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        self.const_int_bound(l, "Lower bound of a field")?;
        self.const_int_bound(h, "Upper bound of a field")?;
        self.d.ast[x].tp = Type::Int;
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    fn sem_property_decl(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let (id, z) = match &self.d.ast[x].kind {
            NodeKind::PropertyDecl { id, z } => (*id, *z),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        if let Some(z) = z {
            self.sem_expr(z)?;
            if self.d.ast[z].flags.contains(NodeFlags::UNCONST) {
                return Err(self
                    .d
                    .node_error(z, "Default value of a property is not constant".into()));
            }
            self.d.ast[x].val = self.d.ast[z].val.clone();
        }
        self.d.ast[x].tp = Type::Int;
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    pub(super) fn sem_var_decl(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let (id, tps, z) = match &self.d.ast[x].kind {
            NodeKind::VarDecl { id, tps, z, .. } => (*id, *tps, *z),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        let tp = self.sem_type(tps)?;
        self.d.ast[x].tp = tp.clone();
        let idx = self.var_idx;
        self.var_idx += 1;
        if let NodeKind::VarDecl { var_idx, .. } = &mut self.d.ast[x].kind {
            *var_idx = idx;
        }
        if let Some(z) = z {
            self.sem_expr(z)?;
            if self.d.ast[z].flags.contains(NodeFlags::UNCONST) {
                return Err(self
                    .d
                    .node_error(z, "Initializer of a variable is not constant".into()));
            }
            if !crate::types::assignable(&tp, &self.d.ast[z].tp) {
                return Err(self.d.node_error(
                    z,
                    format!(
                        "Initializer type does not match variable {}",
                        self.d.interner.resolve(id)
                    ),
                ));
            }
        }
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    fn sem_parameter(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let d = match &self.d.ast[x].kind {
            NodeKind::Parameter { d, .. } => *d,
            _ => unreachable!(),
        };
        let (id, tps) = match &self.d.ast[d].kind {
            NodeKind::VarDecl { id, tps, .. } => (*id, *tps),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        let tp = self.sem_type(tps)?;
        self.d.ast[d].tp = tp.clone();
        self.d.ast[x].tp = tp;
        let idx = self.var_idx;
        self.var_idx += 1;
        if let NodeKind::VarDecl { var_idx, .. } = &mut self.d.ast[d].kind {
            *var_idx = idx;
        }
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        self.d.ast[d].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    fn sem_meta_parameter(&mut self, x: NodeId) -> Result<()> {
        if self.d.ast[x].flags.contains(NodeFlags::FORWARD) {
            return Ok(());
        }
        let (id, tps) = match &self.d.ast[x].kind {
            NodeKind::MetaParameter { id, tps, .. } => (*id, *tps),
            _ => unreachable!(),
        };
        self.declare_id(id, x)?;
        let idx = self.meta_idx;
        self.meta_idx += 1;
        let generic_type = matches!(
            self.resolve_dummy(tps),
            NodeKind::GenericType {
                sym: TokenKind::KwType
            }
        );
        let tp = if generic_type {
            Type::Generic {
                meta_idx: Some(idx),
            }
        } else {
            self.sem_type(tps)?
        };
        self.d.ast[x].tp = tp;
        if let NodeKind::MetaParameter { meta_idx, .. } = &mut self.d.ast[x].kind {
            *meta_idx = idx;
        }
        self.d.ast[x].flags |= NodeFlags::FORWARD;
        Ok(())
    }

    fn resolve_dummy(&self, mut tps: NodeId) -> &NodeKind {
        loop {
            match &self.d.ast[tps].kind {
                NodeKind::DummyType { tps: Some(t) } => tps = *t,
                k => return k,
            }
        }
    }

    fn sem_function_def(&mut self, x: NodeId) -> Result<()> {
        let forward = self.d.ast[x].flags.contains(NodeFlags::FORWARD);
        let (id, pl, ret, b, cxt, nr_var) = match &self.d.ast[x].kind {
            NodeKind::FunctionDef {
                id,
                pl,
                ret,
                b,
                cxt,
                nr_var,
            } => (*id, pl.clone(), *ret, *b, *cxt, *nr_var),
            _ => unreachable!(),
        };
        if !forward {
            self.declare_id(id, x)?;
            let c = self.enter_level(x, cxt);
            if let Some(ret) = ret {
                // slot 0 is the return value
                self.var_idx = 1;
                let tps = match &self.d.ast[ret].kind {
                    NodeKind::VarDecl { tps, .. } => *tps,
                    _ => unreachable!(),
                };
                let tp = self.sem_type(tps)?;
                self.d.ast[ret].tp = tp.clone();
                self.d.ast[x].tp = tp;
            }
            for &p in &pl {
                self.sem(p)?;
            }
            let count = self.var_idx;
            if let NodeKind::FunctionDef { cxt, nr_var, .. } = &mut self.d.ast[x].kind {
                *cxt = Some(c);
                *nr_var = count;
            }
            self.leave_level();
            self.d.ast[x].flags |= NodeFlags::FORWARD;
            return Ok(());
        }
        if let Some(b) = b {
            if self.d.ast[b].flags.contains(NodeFlags::FORWARD) {
                return Ok(());
            }
            self.enter_level(x, cxt);
            self.var_idx = nr_var;
            self.curr_routine = Some(x);
            let saved = self.flags;
            self.flags |= SemFlags::FUNC_DEF;
            let count = self.sem_body(b, x)?;
            self.flags = saved;
            if let NodeKind::FunctionDef { nr_var, .. } = &mut self.d.ast[x].kind {
                *nr_var = count;
            }
            self.leave_level();
            self.d.ast[b].flags |= NodeFlags::FORWARD;
        }
        Ok(())
    }

    fn sem_process_def(&mut self, x: NodeId) -> Result<()> {
        let forward = self.d.ast[x].flags.contains(NodeFlags::FORWARD);
        let (id, ml, pl, bodies, cxt, nr_var) = match &self.d.ast[x].kind {
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
                cxt,
                nr_var,
                ..
            } => (
                *id,
                ml.clone(),
                pl.clone(),
                [*mb, *cb, *hb, *pb, *db, *ppb],
                *cxt,
                *nr_var,
            ),
            _ => unreachable!(),
        };
        if !forward {
            self.declare_id(id, x)?;
            let c = self.enter_level(x, cxt);
            self.meta_idx = 0;
            for &m in &ml {
                self.sem(m)?;
            }
            let nm = self.meta_idx;
            for &p in &pl {
                self.sem(p)?;
            }
            let nv = self.var_idx;
            if let NodeKind::ProcessDef {
                cxt,
                nr_meta,
                nr_var,
                ..
            } = &mut self.d.ast[x].kind
            {
                *cxt = Some(c);
                *nr_meta = nm;
                *nr_var = nv;
            }
            self.leave_level();
            self.d.ast[x].flags |= NodeFlags::FORWARD;
            return Ok(());
        }
        let done = bodies
            .iter()
            .flatten()
            .all(|&b| self.d.ast[b].flags.contains(NodeFlags::FORWARD));
        if done {
            return Ok(());
        }
        self.enter_level(x, cxt);
        self.var_idx = nr_var;
        self.curr_routine = Some(x);
        for b in bodies.into_iter().flatten() {
            if self.d.ast[b].flags.contains(NodeFlags::FORWARD) {
                continue;
            }
            let saved = self.flags;
            match body_kind(&self.d.ast[b].kind) {
                Some(BodyKind::Meta) => self.flags |= SemFlags::META,
                Some(BodyKind::Prs) => self.flags |= SemFlags::PRS,
                Some(BodyKind::Delay) => self.flags |= SemFlags::PRS | SemFlags::DELAY,
                Some(BodyKind::Property) => self.flags |= SemFlags::PROP,
                _ => {}
            }
            let nv = self.sem_body(b, x)?;
            self.flags = saved;
            self.d.ast[b].flags |= NodeFlags::FORWARD;
            // later bodies continue the numbering
            self.var_idx = nv;
        }
        let nv = self.var_idx;
        if let NodeKind::ProcessDef { nr_var, .. } = &mut self.d.ast[x].kind {
            *nr_var = nv;
        }
        self.leave_level();
        Ok(())
    }

    /// A routine body: local declarations get a signature pass and a full
    /// pass (so local routines may be mutually recursive), then the
    /// statements. Returns the variable count after the body so the owner
    /// can size its frame.
    pub(super) fn sem_body(&mut self, b: NodeId, owner: NodeId) -> Result<u32> {
        let (dl, sl, cxt) = match &self.d.ast[b].kind {
            NodeKind::Body { dl, sl, cxt, .. } => (dl.clone(), sl.clone(), *cxt),
            _ => unreachable!(),
        };
        let c = self.enter_body(owner, cxt);
        if let NodeKind::Body { cxt, .. } = &mut self.d.ast[b].kind {
            *cxt = Some(c);
        }
        for &x in &dl {
            self.sem(x)?;
        }
        for &x in &dl {
            self.sem(x)?;
        }
        for &s in &sl {
            self.sem(s)?;
        }
        let nv = self.var_idx;
        self.leave_level();
        Ok(nv)
    }

    /// Bounds of replicator ranges must be constant integers.
    pub(super) fn sem_rep_common(&mut self, l: NodeId, h: NodeId) -> Result<()> {
        self.sem_expr(l)?;
        self.sem_expr(h)?;
        if !self.d.ast[l].tp.is_integer() {
            return Err(self
                .d
                .node_error(l, "Lower bound of replicator range is not an integer.".into()));
        }
        if !self.d.ast[h].tp.is_integer() {
            return Err(self
                .d
                .node_error(h, "Upper bound of replicator range is not an integer.".into()));
        }
        if self.d.ast[l].flags.contains(NodeFlags::UNCONST) {
            return Err(self
                .d
                .node_error(l, "Lower bound of replicator range is not constant.".into()));
        }
        if self.d.ast[h].flags.contains(NodeFlags::UNCONST) {
            return Err(self
                .d
                .node_error(h, "Upper bound of replicator range is not constant.".into()));
        }
        Ok(())
    }

    pub(super) fn const_int_bound(&mut self, x: NodeId, what: &str) -> Result<i64> {
        self.sem_expr(x)?;
        if !self.d.ast[x].tp.is_integer() {
            return Err(self.d.node_error(x, format!("{} is not an integer", what)));
        }
        if self.d.ast[x].flags.contains(NodeFlags::UNCONST) {
            return Err(self.d.node_error(x, format!("{} is not constant", what)));
        }
        match &self.d.ast[x].val {
            Value::Int(i) => Ok(*i),
            Value::Big(_) => Err(self.d.node_error(x, format!("{} is too large", what))),
            _ => Err(self.d.node_error(x, format!("{} is not constant", what))),
        }
    }

    // ----- type syntax -----

    /// Reduce a syntactic type to a `Type`.
    pub fn sem_type(&mut self, x: NodeId) -> Result<Type> {
        let kind = self.d.ast[x].kind.clone();
        let tp = match kind {
            NodeKind::DummyType { tps } => match tps {
                Some(t) => self.sem_type(t)?,
                None => {
                    return Err(Diagnostic::internal(
                        "dummy type was never completed".into(),
                    ))
                }
            },
            NodeKind::IntType { l, h } => {
                let lv = self.const_int_bound(l, "Lower bound of an integer range")?;
                let hv = self.const_int_bound(h, "Upper bound of an integer range")?;
                Type::IntRange(lv, hv)
            }
            NodeKind::SymType { l } => {
                let mut syms = Vec::new();
                for n in l {
                    if let NodeKind::Name { id, .. } = self.d.ast[n].kind {
                        syms.push(id);
                    }
                }
                Type::Symbols(Rc::new(syms))
            }
            NodeKind::ArrayType { l, h, tps } => {
                let lv = self.const_int_bound(l, "Lower bound of an array")?;
                let hv = self.const_int_bound(h, "Upper bound of an array")?;
                let elem = self.sem_type(tps)?;
                Type::Array {
                    l: lv,
                    h: hv,
                    elem: Rc::new(elem),
                }
            }
            NodeKind::RecordType { l } => {
                let mut fields = Vec::new();
                for f in l {
                    let (id, tps) = match &self.d.ast[f].kind {
                        NodeKind::RecordField { id, tps } => (*id, *tps),
                        _ => continue,
                    };
                    if fields.iter().any(|(n, _)| *n == id) {
                        return Err(self.d.node_error(
                            f,
                            format!("Duplicate field {}", self.d.interner.resolve(id)),
                        ));
                    }
                    let tp = self.sem_type(tps)?;
                    self.d.ast[f].tp = tp.clone();
                    fields.push((id, tp));
                }
                Type::Record(Rc::new(fields))
            }
            NodeKind::UnionType { l, def } => {
                let def_tp = match def {
                    Some(t) => self.sem_type(t)?,
                    None => Type::None,
                };
                let mut arms = Vec::new();
                for f in l {
                    let (id, dnid, upid, tps) = match &self.d.ast[f].kind {
                        NodeKind::UnionField {
                            id, dnid, upid, tps, ..
                        } => (*id, *dnid, *upid, *tps),
                        _ => continue,
                    };
                    let tp = self.sem_type(tps)?;
                    // coercion routines may not be declared yet; the
                    // defining type links them on the second pass
                    let dn = self.find_routine_opt(dnid);
                    let up = self.find_routine_opt(upid);
                    if let NodeKind::UnionField {
                        dn: dslot,
                        up: uslot,
                        ..
                    } = &mut self.d.ast[f].kind
                    {
                        *dslot = dn;
                        *uslot = up;
                    }
                    self.d.ast[f].tp = tp.clone();
                    arms.push(UnionArm { id, tp, dn, up });
                }
                Type::Union(Rc::new(UnionTp {
                    fields: arms,
                    def: def_tp,
                }))
            }
            NodeKind::NamedType { id, .. } => {
                let b = self.find_id(id, x)?;
                if let NodeKind::NamedType { binding, .. } = &mut self.d.ast[x].kind {
                    *binding = Some(b);
                }
                match &self.d.ast[b].kind {
                    NodeKind::TypeDef { .. } => self.d.ast[b].tp.clone(),
                    NodeKind::MetaParameter { .. }
                        if matches!(self.d.ast[b].tp, Type::Generic { .. }) =>
                    {
                        self.d.ast[b].tp.clone()
                    }
                    _ => {
                        return Err(self.d.node_error(
                            x,
                            format!("{} is not a type", self.d.interner.resolve(id)),
                        ))
                    }
                }
            }
            NodeKind::GenericType { sym } => match sym {
                TokenKind::KwBool => Type::Bool,
                TokenKind::KwInt => Type::Int,
                TokenKind::KwSymbol => Type::Symbol,
                TokenKind::KwType => Type::Generic { meta_idx: None },
                // a sync port has no data type
                _ => Type::Port,
            },
            NodeKind::WiredType { li, lo } => {
                let mut ins = Vec::new();
                let mut outs = Vec::new();
                for (list, out) in [(li, &mut ins), (lo, &mut outs)] {
                    for w in list {
                        let (id, tps) = match &self.d.ast[w].kind {
                            NodeKind::WireDecl { id, tps, .. } => (*id, *tps),
                            _ => continue,
                        };
                        let tp = self.sem_type(tps)?;
                        self.d.ast[w].tp = tp.clone();
                        out.push((id, tp));
                    }
                }
                Type::Wired {
                    li: Rc::new(ins),
                    lo: Rc::new(outs),
                }
            }
            _ => return Err(self.d.node_error(x, "Expected a type".into())),
        };
        self.d.ast[x].tp = tp.clone();
        Ok(tp)
    }

    fn find_routine(&mut self, id: Symbol, at: NodeId) -> Result<NodeId> {
        let b = self.find_id(id, at)?;
        if !matches!(self.d.ast[b].kind, NodeKind::FunctionDef { .. }) {
            return Err(self.d.node_error(
                at,
                format!("{} is not a function", self.d.interner.resolve(id)),
            ));
        }
        Ok(b)
    }

    fn find_routine_opt(&mut self, id: Symbol) -> Option<NodeId> {
        let mut cxt = self.cxt;
        while let Some(c) = cxt {
            if let CtxKind::Map(m) = &self.d.scopes[c].kind {
                if let Some(Binding::One(b)) = m.get(&id) {
                    if matches!(self.d.ast[*b].kind, NodeKind::FunctionDef { .. }) {
                        return Some(*b);
                    }
                    return None;
                }
            }
            cxt = self.d.scopes[c].parent;
        }
        None
    }
}

fn body_kind(k: &NodeKind) -> Option<BodyKind> {
    match k {
        NodeKind::Body { kind, .. } => Some(*kind),
        _ => None,
    }
}
