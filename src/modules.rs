//! Module reading, search paths, and dependency analysis.
//!
//! Modules are keyed by their full path (interned, so identity is symbol
//! equality); a file is read and parsed at most once. A depth-first search
//! assigns DFS numbers, collapses dependency cycles into equivalence
//! classes via `cycle` links (the representative is the member with the
//! smallest DFS number), and emits the modules in reverse topological
//! order for the semantic passes. A distinguished `builtin.chp` module is
//! implicitly required by every other module; when no copy is found on the
//! search path, an embedded one is used.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};

use crate::ast::{Ast, NodeFlags, NodeId, NodeKind};
use crate::error::{warning_plain, DiagKind, Diagnostic, Result};
use crate::intern::{Interner, Symbol};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::scope::{CtxId, ScopeArena};

static STDLIB: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/stdlib");

pub const BUILTIN_MODULE: &str = "builtin.chp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Unseen,
    OnStack,
    Done,
}

pub struct Module {
    /// Full path, interned.
    pub src: Symbol,
    /// The `ModuleDef` node holding requires and definitions.
    pub node: NodeId,
    pub flags: NodeFlags,
    /// DFS number, assigned by `module_cycles`.
    pub module_nr: u32,
    pub visited: Visit,
    /// Link toward the representative of this module's dependency cycle.
    pub cycle: Option<ModuleId>,
    /// Set while importing, to skip duplicate imports into one module.
    pub importer: Option<ModuleId>,
    /// Import scope (level 0) and declaration scope, memoized across the
    /// two semantic passes.
    pub import_cxt: Option<CtxId>,
    pub cxt: Option<CtxId>,
}

/// Per-run front-end state: the search path, the interner, the node and
/// scope arenas, and the interned module set.
pub struct Driver {
    pub path: Vec<PathBuf>,
    pub interner: Interner,
    pub ast: Ast,
    pub scopes: ScopeArena,
    pub modules: Vec<Module>,
    by_src: HashMap<Symbol, ModuleId>,
    pub builtin: Option<ModuleId>,
    /// The implicit `requires "builtin.chp"` node, shared by every module.
    pub builtin_req: Option<NodeId>,
    pub verbose: bool,
    pub strict: bool,
    /// Number of files opened; duplicate loads do not add to it.
    pub files_read: usize,
}

struct CycleState {
    nr: u32,
    ml: Vec<ModuleId>,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Self {
        Driver {
            path: Vec::new(),
            interner: Interner::new(),
            ast: Ast::new(),
            scopes: ScopeArena::new(),
            modules: Vec::new(),
            by_src: HashMap::new(),
            builtin: None,
            builtin_req: None,
            verbose: false,
            strict: false,
            files_read: 0,
        }
    }

    pub fn module(&self, m: ModuleId) -> &Module {
        &self.modules[m.index()]
    }

    pub fn module_mut(&mut self, m: ModuleId) -> &mut Module {
        &mut self.modules[m.index()]
    }

    /// Semantic-style diagnostic located at a node.
    pub fn node_error(&self, x: NodeId, msg: String) -> Diagnostic {
        let n = &self.ast[x];
        Diagnostic::new(
            DiagKind::Sem,
            self.interner.resolve(n.src),
            n.lnr,
            n.lpos,
            msg,
        )
    }

    pub fn node_warning(&self, x: NodeId, msg: &str) {
        let n = &self.ast[x];
        crate::error::warning(self.interner.resolve(n.src), n.lnr, msg);
    }

    /// True if the file exists and is not a directory. With `warn`, access
    /// problems other than non-existence are reported.
    fn file_exists(&self, fnm: &Path, warn: bool) -> bool {
        match std::fs::metadata(fnm) {
            Ok(info) => {
                if info.is_dir() {
                    if warn {
                        warning_plain(&format!("{} is a directory", fnm.display()));
                    }
                    return false;
                }
                true
            }
            Err(e) => {
                if warn && e.kind() != std::io::ErrorKind::NotFound {
                    warning_plain(&format!("While accessing {}: {}", fnm.display(), e));
                }
                false
            }
        }
    }

    /// Search for a required module. The name is used verbatim when
    /// absolute or explicitly relative (`./`, `../`); otherwise the
    /// importing file's directory is tried first, then each entry of the
    /// search path. Paths are not normalized: two spellings of the same
    /// file count as two modules.
    fn search_for_module(&self, fnm: &str, parent_src: Option<&str>) -> Option<String> {
        if fnm.is_empty() {
            warning_plain("Empty file name");
            return None;
        }
        let mut use_search_path = true;
        let default: String;
        if fnm.starts_with('/') {
            use_search_path = false;
            default = fnm.to_string();
        } else {
            if fnm.starts_with("./") || fnm.starts_with("../") {
                use_search_path = false;
            }
            default = match parent_src {
                Some(p) => match p.rfind('/') {
                    Some(i) => format!("{}{}", &p[..i + 1], fnm),
                    None => fnm.to_string(),
                },
                None => fnm.to_string(),
            };
        }
        if self.file_exists(Path::new(&default), true) {
            return Some(default);
        }
        if use_search_path {
            for dir in &self.path {
                let cand = format!("{}/{}", dir.display(), fnm);
                if self.file_exists(Path::new(&cand), true) {
                    return Some(cand);
                }
            }
        }
        None
    }

    /// Read and parse a module, then all the modules it requires.
    /// Already-loaded modules are returned without touching the file
    /// system. `parent` locates "not found" errors; with `builtin` set,
    /// the built-in module is implicitly required.
    fn read_module(
        &mut self,
        fnm: Option<&str>,
        parent: Option<NodeId>,
        builtin: bool,
    ) -> Result<ModuleId> {
        let mut embedded: Option<&str> = None;
        let full_nm: String;
        if let Some(fnm) = fnm {
            match self.search_for_module(fnm, parent.map(|p| {
                let s = self.ast[p].src;
                self.interner.resolve(s)
            })) {
                Some(f) => full_nm = f,
                None => {
                    if fnm == BUILTIN_MODULE {
                        let file = STDLIB.get_file(BUILTIN_MODULE).ok_or_else(|| {
                            Diagnostic::internal("embedded builtin module missing".into())
                        })?;
                        embedded = file.contents_utf8();
                        full_nm = BUILTIN_MODULE.to_string();
                    } else if let Some(p) = parent {
                        return Err(self.node_error(p, format!("Module {} not found", fnm)));
                    } else {
                        return Err(Diagnostic::new(
                            DiagKind::Resolve,
                            fnm,
                            0,
                            0,
                            format!("Module {} not found", fnm),
                        ));
                    }
                }
            }
            let full_sym = self.interner.intern(&full_nm);
            if let Some(&d) = self.by_src.get(&full_sym) {
                return Ok(d);
            }
        } else {
            full_nm = "-".to_string();
        }
        if self.verbose {
            eprintln!("Reading \"{}\"", full_nm);
        }
        let node = {
            let mut lex = Lexer::new(&mut self.interner);
            lex.strict = self.strict;
            if let Some(src) = embedded {
                lex.start_source(BUILTIN_MODULE, src)?;
            } else if fnm.is_some() {
                lex.start_file(Path::new(&full_nm))?;
            } else {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).map_err(|e| {
                    Diagnostic::new(DiagKind::Resolve, "-", 0, 0, format!("Read error: {}", e))
                })?;
                lex.start_source("-", &buf)?;
            }
            let mut p = Parser::new(&mut lex, &mut self.ast);
            p.parse_source_file()?
        };
        self.files_read += 1;
        let full_sym = self.interner.intern(&full_nm);
        let d = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            src: full_sym,
            node,
            flags: NodeFlags::empty(),
            module_nr: 0,
            visited: Visit::Unseen,
            cycle: None,
            importer: None,
            import_cxt: None,
            cxt: None,
        });
        self.by_src.insert(full_sym, d);
        if let NodeKind::ModuleDef { m, .. } = &mut self.ast[node].kind {
            *m = Some(d);
        }
        if builtin {
            let req = self.builtin_req();
            if let NodeKind::ModuleDef { rl, .. } = &mut self.ast[node].kind {
                rl.insert(0, req);
            }
        }
        let rl = match &self.ast[node].kind {
            NodeKind::ModuleDef { rl, .. } => rl.clone(),
            _ => Vec::new(),
        };
        for r in rl {
            let s = match &self.ast[r].kind {
                NodeKind::RequiredModule { s, .. } => s.clone(),
                _ => continue,
            };
            if s.is_empty() {
                return Err(self.node_error(r, "Empty module name".into()));
            }
            let rm = self.read_module(Some(&s), Some(r), true)?;
            if rm == d {
                return Err(self.node_error(r, "A module cannot depend on itself".into()));
            }
            if let NodeKind::RequiredModule { m, .. } = &mut self.ast[r].kind {
                *m = Some(rm);
            }
        }
        Ok(d)
    }

    /// The shared implicit `requires "builtin.chp"` node.
    fn builtin_req(&mut self) -> NodeId {
        if let Some(r) = self.builtin_req {
            return r;
        }
        let src = self.interner.intern(BUILTIN_MODULE);
        let r = self.ast.alloc(
            NodeKind::RequiredModule {
                s: BUILTIN_MODULE.to_string(),
                m: self.builtin,
            },
            src,
            1,
            0,
        );
        self.ast[r].flags |= NodeFlags::BUILTIN;
        self.builtin_req = Some(r);
        r
    }

    /// Read the built-in module. Call before reading other modules.
    pub fn read_builtin(&mut self) -> Result<()> {
        let b = self.read_module(Some(BUILTIN_MODULE), None, false)?;
        self.module_mut(b).flags |= NodeFlags::BUILTIN;
        self.builtin = Some(b);
        Ok(())
    }

    /// Read the main module (stdin when `fnm` is `None`) and everything
    /// it requires.
    pub fn read_main_module(&mut self, fnm: Option<&str>) -> Result<ModuleId> {
        if let Some(f) = fnm {
            if !self.file_exists(Path::new(f), false) {
                return Err(Diagnostic::new(
                    DiagKind::Resolve,
                    f,
                    0,
                    0,
                    format!("No such file: {}", f),
                ));
            }
        }
        self.read_module(fnm, None, true)
    }

    /// Representative of `d`'s dependency-cycle equivalence class.
    pub fn cycle_rep(&self, mut d: ModuleId) -> ModuleId {
        while let Some(c) = self.modules[d.index()].cycle {
            d = c;
        }
        d
    }

    fn merge_cycles(&mut self, x: ModuleId, y: ModuleId) {
        let x = self.cycle_rep(x);
        let y = self.cycle_rep(y);
        if x == y {
            return;
        }
        if self.modules[x.index()].module_nr < self.modules[y.index()].module_nr {
            self.modules[y.index()].cycle = Some(x);
        } else {
            self.modules[x.index()].cycle = Some(y);
        }
    }

    /// Depth-first search from `d`: detects cycles and appends finished
    /// modules to the order. Returns the earliest still-on-stack ancestor
    /// reachable from `d`'s subgraph.
    fn module_cycles(&mut self, d: ModuleId, state: &mut CycleState) -> Option<ModuleId> {
        if self.modules[d.index()].visited != Visit::Unseen {
            let a = self.cycle_rep(d);
            if self.modules[a.index()].visited == Visit::OnStack {
                return Some(a);
            }
            return None;
        }
        self.modules[d.index()].visited = Visit::OnStack;
        self.modules[d.index()].module_nr = state.nr;
        state.nr += 1;
        let rl = match &self.ast[self.modules[d.index()].node].kind {
            NodeKind::ModuleDef { rl, .. } => rl.clone(),
            _ => Vec::new(),
        };
        for r in rl {
            let rm = match &self.ast[r].kind {
                NodeKind::RequiredModule { m: Some(rm), .. } => *rm,
                _ => continue,
            };
            if let Some(a) = self.module_cycles(rm, state) {
                self.merge_cycles(a, d);
            }
        }
        self.modules[d.index()].visited = Visit::Done;
        state.ml.push(d);
        if self.modules[d.index()].cycle.is_some() {
            return Some(self.cycle_rep(d));
        }
        None
    }

    /// The modules reachable from `root`, dependencies first (reverse
    /// topological order, modulo the cycle equivalence classes).
    pub fn resolve_order(&mut self, root: ModuleId) -> Vec<ModuleId> {
        let mut state = CycleState {
            nr: 0,
            ml: Vec::new(),
        };
        self.module_cycles(root, &mut state);
        state.ml
    }

    /// Find a loaded module by file name. With `exact` (or an absolute
    /// name) only full-path matches count; otherwise a path-postfix match
    /// is accepted.
    pub fn find_module(&self, fnm: &str, exact: bool) -> Option<ModuleId> {
        if exact || fnm.starts_with('/') {
            let sym = self.interner.lookup(fnm)?;
            return self.by_src.get(&sym).copied();
        }
        for (i, m) in self.modules.iter().enumerate() {
            let s = self.interner.resolve(m.src);
            if s == fnm
                || (s.ends_with(fnm) && s.as_bytes().get(s.len() - fnm.len() - 1) == Some(&b'/'))
            {
                return Some(ModuleId(i as u32));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_prefers_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("lib");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("cell.chp"), "const n = 1;\n").unwrap();
        std::fs::write(dir.path().join("cell.chp"), "const n = 2;\n").unwrap();
        let mut d = Driver::new();
        d.path.push(sub);
        let parent_src = format!("{}/main.chp", dir.path().display());
        let found = d.search_for_module("cell.chp", Some(&parent_src)).unwrap();
        assert_eq!(found, format!("{}/cell.chp", dir.path().display()));
    }

    #[test]
    fn search_falls_back_to_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("lib");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("cell.chp"), "const n = 1;\n").unwrap();
        let mut d = Driver::new();
        d.path.push(sub.clone());
        let found = d.search_for_module("cell.chp", None).unwrap();
        assert_eq!(found, format!("{}/cell.chp", sub.display()));
    }

    #[test]
    fn explicitly_relative_names_skip_the_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("lib");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("cell.chp"), "const n = 1;\n").unwrap();
        let mut d = Driver::new();
        d.path.push(sub);
        assert!(d.search_for_module("./cell.chp", None).is_none());
    }

    #[test]
    fn directories_are_not_modules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("cell.chp")).unwrap();
        let d = Driver::new();
        assert!(!d.file_exists(&dir.path().join("cell.chp"), false));
    }

    #[test]
    fn builtin_module_loads_from_embedded_copy() {
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let b = d.builtin.unwrap();
        assert!(d.module(b).flags.contains(NodeFlags::BUILTIN));
        assert_eq!(d.interner.resolve(d.module(b).src), BUILTIN_MODULE);
    }

    #[test]
    fn duplicate_loads_are_memoized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.chp"), "const n = 1;\n").unwrap();
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let p = format!("{}/a.chp", dir.path().display());
        let m1 = d.read_main_module(Some(&p)).unwrap();
        let opened = d.files_read;
        let m2 = d.read_main_module(Some(&p)).unwrap();
        assert_eq!(m1, m2);
        assert_eq!(d.files_read, opened, "re-reading opened no files");
    }

    #[test]
    fn self_dependency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.chp"), "requires \"a.chp\";\nconst n = 1;\n").unwrap();
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let p = format!("{}/a.chp", dir.path().display());
        let e = d.read_main_module(Some(&p)).unwrap_err();
        assert!(e.msg.contains("cannot depend on itself"), "{}", e.msg);
    }

    #[test]
    fn cycle_members_share_a_representative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.chp"),
            "requires \"b.chp\";\nexport const na = 1;\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.chp"),
            "requires \"a.chp\";\nexport const nb = 2;\n",
        )
        .unwrap();
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let p = format!("{}/a.chp", dir.path().display());
        let a = d.read_main_module(Some(&p)).unwrap();
        let order = d.resolve_order(a);
        let b = d.find_module("b.chp", false).unwrap();
        assert_eq!(d.cycle_rep(a), d.cycle_rep(b));
        // reverse topological: builtin first, the cycle after it
        let bi = d.builtin.unwrap();
        let pos = |m: ModuleId| order.iter().position(|&x| x == m).unwrap();
        assert!(pos(bi) < pos(a));
        assert!(pos(bi) < pos(b));
    }

    #[test]
    fn order_is_reverse_topological() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leaf.chp"), "export const n = 1;\n").unwrap();
        std::fs::write(
            dir.path().join("mid.chp"),
            "requires \"leaf.chp\";\nexport const m = 2;\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("top.chp"),
            "requires \"mid.chp\";\nconst t = 3;\n",
        )
        .unwrap();
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let p = format!("{}/top.chp", dir.path().display());
        let top = d.read_main_module(Some(&p)).unwrap();
        let order = d.resolve_order(top);
        let leaf = d.find_module("leaf.chp", false).unwrap();
        let mid = d.find_module("mid.chp", false).unwrap();
        let pos = |m: ModuleId| order.iter().position(|&x| x == m).unwrap();
        assert!(pos(leaf) < pos(mid));
        assert!(pos(mid) < pos(top));
        assert_eq!(order.last().copied(), Some(top));
    }

    #[test]
    fn find_module_matches_path_postfix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("adder.chp"), "const n = 1;\n").unwrap();
        let mut d = Driver::new();
        d.read_builtin().unwrap();
        let p = format!("{}/adder.chp", dir.path().display());
        let m = d.read_main_module(Some(&p)).unwrap();
        assert_eq!(d.find_module("adder.chp", false), Some(m));
        assert_eq!(d.find_module(&p, true), Some(m));
        assert_eq!(d.find_module("adder.chp", true), None);
    }
}
