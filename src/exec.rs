//! The hand-off to the executor.
//!
//! `read_source` runs the whole front end: resolve, parse, and analyze in
//! two passes. `find_main` locates the top process and `prepare_exec`
//! builds the initial execution state: one instance at path `/` with its
//! meta and local value slots zero-initialized to `Value::None` and a
//! single control state rooted at the process definition. Scheduling,
//! rendezvous, and value mutation belong to the executor proper.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::{NodeId, NodeKind};
use crate::error::Result;
use crate::intern::Symbol;
use crate::modules::{Driver, ModuleId};
use crate::sem::Analyzer;
use crate::types::Type;

/// A run-time (or folded compile-time) value. `None` is the
/// uninitialized representation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Big(BigInt),
    Bool(bool),
    Symbol(Symbol),
    Str(String),
    Float(f64),
    Array(Vec<Value>),
    Record(Vec<Value>),
    /// A type as a value, bound to a generic meta parameter.
    Type(Rc<Type>),
}

/// Control state: where execution stands inside one process instance.
pub struct CtrlState {
    /// Node the instance is positioned at.
    pub obj: NodeId,
    pub nr_var: u32,
}

/// One process instance, named by its hierarchical path.
pub struct ProcessState {
    pub nm: String,
    /// The process definition.
    pub p: NodeId,
    /// Values of the meta parameters, filled at instantiation.
    pub meta: Vec<Value>,
    /// Local variables and ports.
    pub var: Vec<Value>,
    pub cs: CtrlState,
}

impl ProcessState {
    pub fn new(nm: String, p: NodeId) -> Self {
        ProcessState {
            nm,
            p,
            meta: Vec::new(),
            var: Vec::new(),
            cs: CtrlState { obj: p, nr_var: 0 },
        }
    }
}

/// Everything the executor needs to start running. Dropping it releases
/// the per-run state.
pub struct ExecState {
    pub main: ProcessState,
}

/// End-to-end load: the built-in module, the root file (stdin when
/// `None`), every required module, cycle and order analysis, and both
/// semantic passes. Returns the reverse-topological module list and the
/// root module.
pub fn read_source(d: &mut Driver, path: Option<&str>) -> Result<(Vec<ModuleId>, ModuleId)> {
    d.read_builtin()?;
    let root = d.read_main_module(path)?;
    let order = d.resolve_order(root);
    let mut a = Analyzer::new(d);
    a.run(&order)?;
    Ok((order, root))
}

/// Locate the main process (`main` when no name is given), looking first
/// in the root module, then in every loaded module. Warnings are printed
/// when a requested name is missing or unusable; the result is `None` in
/// those cases.
pub fn find_main(
    d: &Driver,
    root: ModuleId,
    main_id: Option<&str>,
    allow_ports: bool,
) -> Option<NodeId> {
    let warn = main_id.is_some();
    let name = main_id.unwrap_or("main");
    let sym = match d.interner.lookup(name) {
        Some(s) => s,
        None => {
            if warn {
                eprintln!("Warning: main process '{}' not found", name);
            }
            return None;
        }
    };
    let mut hit = find_routine_in(d, root, sym);
    if hit.is_none() {
        for i in 0..d.modules.len() {
            hit = find_routine_in(d, ModuleId(i as u32), sym);
            if hit.is_some() {
                break;
            }
        }
    }
    let dp = match hit {
        Some(dp) => dp,
        None => {
            if warn {
                eprintln!("Warning: main process '{}' not found", name);
            }
            return None;
        }
    };
    let n = &d.ast[dp];
    let loc = format!(
        "{}[{}:{}]",
        d.interner.resolve(n.src),
        n.lnr,
        n.lpos
    );
    match &n.kind {
        NodeKind::ProcessDef { pl, .. } => {
            if !allow_ports && !pl.is_empty() {
                eprintln!("{} main process '{}' has port parameters", loc, name);
                return None;
            }
            Some(dp)
        }
        _ => {
            eprintln!("{} '{}' is not a process", loc, name);
            None
        }
    }
}

fn find_routine_in(d: &Driver, m: ModuleId, sym: Symbol) -> Option<NodeId> {
    let dl = match &d.ast[d.module(m).node].kind {
        NodeKind::ModuleDef { dl, .. } => dl,
        _ => return None,
    };
    dl.iter().copied().find(|&x| {
        matches!(
            &d.ast[x].kind,
            NodeKind::ProcessDef { id, .. } | NodeKind::FunctionDef { id, .. } if *id == sym
        )
    })
}

/// Allocate the top instance (path `/`) of `dp` with meta and local
/// variables zero-initialized and a single control state rooted at the
/// process definition.
pub fn prepare_exec(d: &Driver, dp: NodeId) -> ExecState {
    let (nr_meta, nr_var) = match &d.ast[dp].kind {
        NodeKind::ProcessDef {
            nr_meta, nr_var, ..
        } => (*nr_meta, *nr_var),
        _ => (0, 0),
    };
    let mut ps = ProcessState::new("/".to_string(), dp);
    ps.meta = vec![Value::None; nr_meta as usize];
    ps.var = vec![Value::None; nr_var as usize];
    ps.cs = CtrlState {
        obj: dp,
        nr_var,
    };
    ExecState { main: ps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_default_to_none() {
        assert_eq!(Value::default(), Value::None);
    }

    #[test]
    fn process_state_starts_at_its_definition() {
        let ps = ProcessState::new("/".into(), NodeId(5));
        assert_eq!(ps.cs.obj, NodeId(5));
        assert!(ps.meta.is_empty());
        assert!(ps.var.is_empty());
    }
}
