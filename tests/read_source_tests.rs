//! End-to-end loads: resolver, two-pass analysis, and the executor
//! hand-off, exercised over on-disk module trees.

use std::path::Path;

use chpsim::ast::{NodeFlags, NodeId, NodeKind};
use chpsim::exec::{find_main, prepare_exec, read_source, Value};
use chpsim::modules::{Driver, ModuleId};
use chpsim::sem::Analyzer;
use chpsim::types::Type;

fn write(dir: &Path, name: &str, src: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, src).unwrap();
    p.display().to_string()
}

fn load(dir: &Path, root: &str) -> (Driver, Vec<ModuleId>, ModuleId) {
    let mut d = Driver::new();
    let p = format!("{}/{}", dir.display(), root);
    let (order, root) = read_source(&mut d, Some(&p)).unwrap();
    (d, order, root)
}

fn load_err(dir: &Path, root: &str) -> String {
    let mut d = Driver::new();
    let p = format!("{}/{}", dir.display(), root);
    read_source(&mut d, Some(&p)).unwrap_err().to_string()
}

fn module_defs(d: &Driver, m: ModuleId) -> Vec<NodeId> {
    match &d.ast[d.module(m).node].kind {
        NodeKind::ModuleDef { dl, .. } => dl.clone(),
        _ => panic!("not a module"),
    }
}

fn find_def(d: &Driver, m: ModuleId, name: &str) -> NodeId {
    let sym = d.interner.lookup(name).expect("name never seen");
    module_defs(d, m)
        .into_iter()
        .find(|&x| d.ast.name_of(x) == Some(sym))
        .expect("definition not found")
}

#[test]
fn constant_over_a_named_range_folds() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "type T = {0..3};\nconst c: T = 2;\nprocess main()() chp { skip }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let c = find_def(&d, root, "c");
    assert_eq!(d.ast[c].tp, Type::IntRange(0, 3));
    assert_eq!(d.ast[c].val, Value::Int(2));
    assert!(d.ast[c].flags.contains(NodeFlags::CONST_FOLDED));
}

#[test]
fn constant_folding_covers_arithmetic() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "const a = 2 + 3 * 4;\nconst b = a ^ 2;\nconst c = a < b;\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    assert_eq!(d.ast[find_def(&d, root, "a")].val, Value::Int(14));
    assert_eq!(d.ast[find_def(&d, root, "b")].val, Value::Int(196));
    assert_eq!(d.ast[find_def(&d, root, "c")].val, Value::Bool(true));
}

#[test]
fn folding_promotes_on_overflow() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "const big = 9223372036854775807 + 1;\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    match &d.ast[find_def(&d, root, "big")].val {
        Value::Big(z) => assert_eq!(z.to_string(), "9223372036854775808"),
        v => panic!("expected big value, got {:?}", v),
    }
}

#[test]
fn division_by_zero_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.chp", "const c = 1 / 0;\n");
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("Division by zero"), "{}", msg);
}

#[test]
fn ports_resolve_and_loop_carries_end_marker() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process P(; a?: int; b!: int) chp { var x: int; *[ a?x; b!x ] }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let p = find_def(&d, root, "P");
    let (pl, cb) = match &d.ast[p].kind {
        NodeKind::ProcessDef { pl, cb, .. } => (pl.clone(), cb.unwrap()),
        k => panic!("expected process, got {:?}", k),
    };
    assert_eq!(pl.len(), 2);
    // x is an int variable
    let x = d.interner.lookup("x").unwrap();
    let sl = match &d.ast[cb].kind {
        NodeKind::Body { sl, dl, .. } => {
            let xd = dl
                .iter()
                .copied()
                .find(|&v| d.ast.name_of(v) == Some(x))
                .expect("x not declared");
            assert_eq!(d.ast[xd].tp, Type::Int);
            sl.clone()
        }
        _ => panic!(),
    };
    // every name reference in the loop is linked
    let lp = sl
        .iter()
        .copied()
        .find(|&s| matches!(d.ast[s].kind, NodeKind::LoopStmt { .. }))
        .expect("no loop");
    let gl = match &d.ast[lp].kind {
        NodeKind::LoopStmt { sl, .. } => sl.clone(),
        _ => panic!(),
    };
    let last = *gl.last().unwrap();
    assert!(matches!(d.ast[last].kind, NodeKind::EndStmt));
    for i in 0..d.ast.len() {
        if let NodeKind::Name { binding, .. } = &d.ast[NodeId(i as u32)].kind {
            assert!(binding.is_some(), "unlinked reference survived analysis");
        }
    }
}

#[test]
fn main_process_is_found_and_prepared() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process main(t: int)() chp { var x, y: int; skip }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let dp = find_main(&d, root, None, false).expect("main not found");
    let st = prepare_exec(&d, dp);
    assert_eq!(st.main.nm, "/");
    assert_eq!(st.main.meta.len(), 1);
    assert_eq!(st.main.var.len(), 2);
    assert!(st.main.meta.iter().all(|v| *v == Value::None));
    assert!(st.main.var.iter().all(|v| *v == Value::None));
    assert_eq!(st.main.cs.obj, dp);
}

#[test]
fn main_with_ports_is_rejected_unless_allowed() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process main(; a?: int;) chp { var x: int; *[ a?x ] }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    assert!(find_main(&d, root, None, false).is_none());
    assert!(find_main(&d, root, None, true).is_some());
}

#[test]
fn cyclic_modules_see_each_others_routines() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "requires \"b.chp\";\n\
         export function fa(val n: int): int chp {\n\
           [ n > 0 -> fa := fb(n - 1) [] n <= 0 -> fa := 0 ]\n\
         }\n",
    );
    write(
        dir.path(),
        "b.chp",
        "requires \"a.chp\";\n\
         export function fb(val n: int): int chp {\n\
           [ n > 0 -> fb := fa(n - 1) [] n <= 0 -> fb := 1 ]\n\
         }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let b = d.find_module("b.chp", false).unwrap();
    assert_eq!(d.cycle_rep(root), d.cycle_rep(b));
}

#[test]
fn cyclic_type_definitions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "requires \"b.chp\";\nexport type ta = tb;\n",
    );
    write(
        dir.path(),
        "b.chp",
        "requires \"a.chp\";\nexport type tb = ta;\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("Unknown name"), "{}", msg);
}

#[test]
fn imports_are_visible_and_shadowed_by_locals() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.chp", "export const width = 8;\nexport const depth = 2;\n");
    write(
        dir.path(),
        "top.chp",
        "requires \"lib.chp\";\nconst width = 16;\nconst w = width;\nconst d = depth;\n",
    );
    let (d, _, root) = load(dir.path(), "top.chp");
    assert_eq!(d.ast[find_def(&d, root, "w")].val, Value::Int(16));
    assert_eq!(d.ast[find_def(&d, root, "d")].val, Value::Int(2));
}

#[test]
fn import_conflicts_fail_only_at_use() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "m1.chp", "export const size = 1;\n");
    write(dir.path(), "m2.chp", "export const size = 2;\n");
    write(
        dir.path(),
        "ok.chp",
        "requires \"m1.chp\", \"m2.chp\";\nconst other = 3;\n",
    );
    let (_, order, _) = load(dir.path(), "ok.chp");
    assert_eq!(order.len(), 4, "builtin + three modules");

    write(
        dir.path(),
        "bad.chp",
        "requires \"m1.chp\", \"m2.chp\";\nconst u = size;\n",
    );
    let msg = load_err(dir.path(), "bad.chp");
    assert!(msg.contains("import conflict"), "{}", msg);
    assert!(msg.contains("m1.chp"), "{}", msg);
    assert!(msg.contains("m2.chp"), "{}", msg);
}

#[test]
fn duplicate_declaration_reports_original_site() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.chp", "const n = 1;\nconst n = 2;\n");
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("already defined"), "{}", msg);
    assert!(msg.contains("a.chp[1]"), "{}", msg);
}

#[test]
fn variables_stop_at_routine_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp {\n\
           var x: int;\n\
           function f(val n: int): int chp { f := x }\n\
           x := f(1)\n\
         }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("is not in scope"), "{}", msg);
}

#[test]
fn types_remain_visible_through_routine_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "type T = {0..7};\n\
         process p()() chp {\n\
           var x: T;\n\
           function f(val n: T): T chp { f := n }\n\
           x := f(1)\n\
         }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let t = find_def(&d, root, "T");
    assert_eq!(d.ast[t].tp, Type::IntRange(0, 7));
}

#[test]
fn replicator_reference_depth_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp {\n\
           var x: array [0..1] of array [0..1] of int;\n\
           <<; i: 0..1: <<; j: 0..1: x[i][j] := 0 >> >>\n\
         }\n",
    );
    let (d, _, _) = load(dir.path(), "a.chp");
    let isym = d.interner.lookup("i").unwrap();
    let jsym = d.interner.lookup("j").unwrap();
    let mut saw_i = false;
    let mut saw_j = false;
    for n in 0..d.ast.len() {
        if let NodeKind::Name {
            id,
            binding: Some(_),
            depth,
        } = &d.ast[NodeId(n as u32)].kind
        {
            if *id == isym {
                assert_eq!(*depth, 1, "i is one replicator scope out");
                saw_i = true;
            }
            if *id == jsym {
                assert_eq!(*depth, 0, "j is bound by the innermost scope");
                saw_j = true;
            }
        }
    }
    assert!(saw_i && saw_j);
}

#[test]
fn replicator_bounds_must_be_constant() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var n: int; <<; i: 0..n: skip >> }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("not constant"), "{}", msg);
}

#[test]
fn communication_direction_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p(; a?: int;) chp { var x: int; *[ a!x ] }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("output port"), "{}", msg);
}

#[test]
fn assignment_types_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var b: bool; b := 3 }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("Type mismatch"), "{}", msg);
}

#[test]
fn equality_as_a_statement_suggests_assignment() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var x: int; x = 1 }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains(":="), "{}", msg);
}

#[test]
fn guards_must_be_boolean() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var n: int; *[ n + 1 -> skip ] }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("boolean"), "{}", msg);
}

#[test]
fn string_literals_assign_to_builtin_string() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var s: string; s := \"abc\" }\n",
    );
    load(dir.path(), "a.chp");
}

#[test]
fn builtin_routines_are_importable() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { var s: string; var n: int; s := itoa(42); n := length(s) }\n",
    );
    load(dir.path(), "a.chp");
}

#[test]
fn error_format_names_file_line_and_column() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.chp", "const c = missing;\n");
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("a.chp[1:"), "{}", msg);
    assert!(msg.contains("Error"), "{}", msg);
    assert!(msg.contains("Unknown name: missing"), "{}", msg);
}

#[test]
fn rerunning_the_passes_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "type T = {0..3};\nconst c: T = 2;\nprocess main()() chp { skip }\n",
    );
    let (mut d, order, root) = load(dir.path(), "a.chp");
    let opened = d.files_read;
    let mut a = Analyzer::new(&mut d);
    a.run(&order).expect("second run must be a no-op");
    assert_eq!(d.files_read, opened);
    assert_eq!(d.ast[find_def(&d, root, "c")].val, Value::Int(2));
}

#[test]
fn empty_replicator_range_is_legal() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process p()() chp { <<; i: 3..0: skip >> }\n",
    );
    load(dir.path(), "a.chp");
}

#[test]
fn meta_instances_and_connections_analyze() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "type word = {0..255};\n\
         process buf()(l?: word; r!: word) chp { var x: word; *[ l?x; r!x ] }\n\
         process top()()\n\
         meta {\n\
           instance u: buf;\n\
           instance v: buf;\n\
           connect u.r, v.l\n\
         }\n",
    );
    let (d, _, root) = load(dir.path(), "a.chp");
    let top = find_def(&d, root, "top");
    assert!(matches!(
        d.ast[top].kind,
        NodeKind::ProcessDef { mb: Some(_), .. }
    ));
}

#[test]
fn full_feature_program_analyzes() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sys.chp",
        "type word = {0..255};\n\
         const n = 4;\n\
         field lo = [0..3];\n\
         property slack = 2;\n\
         type mix = union { w {wrap, unwrap}: word; default: int };\n\
         function wrap(val x: int): word chp { wrap := x }\n\
         function unwrap(val x: word): int chp { unwrap := x }\n\
         function inc(val x: int): int chp { inc := x + 1 }\n\
         process buf()(l?: word; r!: word)\n\
         chp {\n\
           var x: word;\n\
           *[ l?x; r!inc(x) ]\n\
         }\n\
         process cell()((a, b; c))\n\
         prs {\n\
           a & b -> c+\n\
           ~a & ~b -> c-\n\
         }\n\
         delay {\n\
           counter m;\n\
           { c+ } requires { m > 1 }\n\
         }\n\
         property {\n\
           slack(c) := 1\n\
         }\n\
         process src(k: int)(go; r!: word)\n\
         chp {\n\
           var i: word;\n\
           i := k + 1;\n\
           *[ #go -> go; r!i ]\n\
         }\n\
         process merge()(p?: word; q!: word)\n\
         chp {\n\
           var v: word;\n\
           *[ #{p : p > 0} -> p?v; q!v [] #p -> p?v ]\n\
         }\n\
         process top()()\n\
         meta {\n\
           instance u[0..1]: buf;\n\
           connect u[0].r, u[1].l\n\
         }\n",
    );
    let (d, order, root) = load(dir.path(), "sys.chp");
    assert_eq!(order.len(), 2, "builtin and the program");
    let mix = find_def(&d, root, "mix");
    match &d.ast[mix].tp {
        chpsim::types::Type::Union(u) => {
            assert_eq!(u.fields.len(), 1);
            assert_eq!(u.def, Type::Int);
        }
        t => panic!("expected union, got {:?}", t),
    }
}

#[test]
fn meta_argument_counts_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.chp",
        "process buf(k: int)() chp { skip }\n\
         process top()() meta { instance u: buf(1, 2); }\n",
    );
    let msg = load_err(dir.path(), "a.chp");
    assert!(msg.contains("meta parameter"), "{}", msg);
}
