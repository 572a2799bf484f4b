//! Parser shape tests: precedence fixup, desugarings, and the printer
//! round trip.

use chpsim::ast::print::print_module;
use chpsim::ast::{Ast, NodeFlags, NodeId, NodeKind};
use chpsim::intern::Interner;
use chpsim::lexer::Lexer;
use chpsim::parser::Parser;
use chpsim::token::TokenKind;

fn parse(src: &str) -> (Ast, Interner, NodeId) {
    let mut interner = Interner::new();
    let mut ast = Ast::new();
    let node = {
        let mut lex = Lexer::new(&mut interner);
        lex.start_source("test.chp", src).unwrap();
        let mut p = Parser::new(&mut lex, &mut ast);
        p.parse_source_file().unwrap()
    };
    (ast, interner, node)
}

fn parse_err(src: &str) -> String {
    let mut interner = Interner::new();
    let mut ast = Ast::new();
    let mut lex = Lexer::new(&mut interner);
    match lex.start_source("test.chp", src) {
        Err(e) => return e.msg,
        Ok(()) => {}
    }
    let mut p = Parser::new(&mut lex, &mut ast);
    p.parse_source_file().unwrap_err().msg
}

fn defs(ast: &Ast, module: NodeId) -> Vec<NodeId> {
    match &ast[module].kind {
        NodeKind::ModuleDef { dl, .. } => dl.clone(),
        _ => panic!("not a module"),
    }
}

fn const_init(ast: &Ast, module: NodeId) -> NodeId {
    match &ast[defs(ast, module)[0]].kind {
        NodeKind::ConstDef { z, .. } => *z,
        k => panic!("expected const, got {:?}", k),
    }
}

fn chp_stmts(ast: &Ast, module: NodeId) -> Vec<NodeId> {
    for d in defs(ast, module) {
        if let NodeKind::ProcessDef { cb: Some(cb), .. } = &ast[d].kind {
            if let NodeKind::Body { sl, .. } = &ast[*cb].kind {
                return sl.clone();
            }
        }
    }
    panic!("no chp body");
}

fn name_of(ast: &Ast, interner: &Interner, x: NodeId) -> String {
    match &ast[x].kind {
        NodeKind::Name { id, .. } => interner.resolve(*id).to_string(),
        k => panic!("expected name, got {:?}", k),
    }
}

#[test]
fn precedence_fixup_rotates_left() {
    // a + b * c - d  parses blindly as (+ a (- (* b c) d)) and rotates
    // into (- (+ a (* b c)) d)
    let (ast, interner, m) = parse("const e = a + b * c - d;\n");
    let z = const_init(&ast, m);
    let (op, l, r) = match &ast[z].kind {
        NodeKind::Binary { op, l, r } => (*op, *l, *r),
        k => panic!("expected binary, got {:?}", k),
    };
    assert_eq!(op, TokenKind::Minus);
    assert_eq!(name_of(&ast, &interner, r), "d");
    let (op_l, ll, lr) = match &ast[l].kind {
        NodeKind::Binary { op, l, r } => (*op, *l, *r),
        k => panic!("expected binary, got {:?}", k),
    };
    assert_eq!(op_l, TokenKind::Plus);
    assert_eq!(name_of(&ast, &interner, ll), "a");
    match &ast[lr].kind {
        NodeKind::Binary { op, .. } => assert_eq!(*op, TokenKind::Star),
        k => panic!("expected b * c, got {:?}", k),
    }
}

#[test]
fn parentheses_freeze_rotation() {
    let (ast, _, m) = parse("const e = a * (b + c);\n");
    let z = const_init(&ast, m);
    let (op, r) = match &ast[z].kind {
        NodeKind::Binary { op, r, .. } => (*op, *r),
        k => panic!("expected binary, got {:?}", k),
    };
    assert_eq!(op, TokenKind::Star);
    assert!(ast[r].flags.contains(NodeFlags::PARENTHESIZED));
    match &ast[r].kind {
        NodeKind::Binary { op, .. } => assert_eq!(*op, TokenKind::Plus),
        k => panic!("expected parenthesized sum, got {:?}", k),
    }
}

#[test]
fn left_associativity_within_a_class() {
    // a - b - c  must become (- (- a b) c)
    let (ast, interner, m) = parse("const e = a - b - c;\n");
    let z = const_init(&ast, m);
    let (l, r) = match &ast[z].kind {
        NodeKind::Binary { l, r, .. } => (*l, *r),
        k => panic!("expected binary, got {:?}", k),
    };
    assert_eq!(name_of(&ast, &interner, r), "c");
    match &ast[l].kind {
        NodeKind::Binary { op, .. } => assert_eq!(*op, TokenKind::Minus),
        k => panic!("expected nested difference, got {:?}", k),
    }
}

#[test]
fn multi_subscript_desugars_to_nested() {
    let (ast, _, m) = parse("process p()() chp { x[i, j] := 0 }\n");
    let sl = chp_stmts(&ast, m);
    let v = match &ast[sl[0]].kind {
        NodeKind::Assign { v, .. } => *v,
        k => panic!("expected assignment, got {:?}", k),
    };
    let inner = match &ast[v].kind {
        NodeKind::Subscript { x, .. } => *x,
        k => panic!("expected subscript, got {:?}", k),
    };
    assert!(matches!(ast[inner].kind, NodeKind::Subscript { .. }));
}

#[test]
fn multi_name_declaration_splits_and_shares_type() {
    let (ast, _, m) = parse("process p()() chp { var x, y: int; skip }\n");
    let dl = {
        let mut out = Vec::new();
        for d in defs(&ast, m) {
            if let NodeKind::ProcessDef { cb: Some(cb), .. } = &ast[d].kind {
                if let NodeKind::Body { dl, .. } = &ast[*cb].kind {
                    out = dl.clone();
                }
            }
        }
        out
    };
    assert_eq!(dl.len(), 2);
    let t0 = match &ast[dl[0]].kind {
        NodeKind::VarDecl { tps, .. } => *tps,
        _ => panic!(),
    };
    let t1 = match &ast[dl[1]].kind {
        NodeKind::VarDecl { tps, .. } => *tps,
        _ => panic!(),
    };
    assert_eq!(t0, t1, "split declarations share one parsed type");
}

#[test]
fn single_statement_compound_collapses() {
    let (ast, _, m) = parse("process p()() chp { { skip } }\n");
    let sl = chp_stmts(&ast, m);
    assert!(matches!(ast[sl[0]].kind, NodeKind::Skip));
}

#[test]
fn loop_body_gets_shared_end_marker() {
    let (ast, _, m) = parse("process p()() chp { *[ b -> skip [] c -> x := 0 ] }\n");
    let sl = chp_stmts(&ast, m);
    let gl = match &ast[sl[0]].kind {
        NodeKind::LoopStmt { gl, .. } => gl.clone(),
        k => panic!("expected loop, got {:?}", k),
    };
    assert_eq!(gl.len(), 2);
    let mut ends = Vec::new();
    for g in gl {
        let l = match &ast[g].kind {
            NodeKind::Guarded { l, .. } => l.clone(),
            k => panic!("expected guarded command, got {:?}", k),
        };
        let last = *l.last().unwrap();
        assert!(matches!(ast[last].kind, NodeKind::EndStmt));
        ends.push(last);
    }
    assert_eq!(ends[0], ends[1], "end marker is shared among the commands");
}

#[test]
fn selection_mixing_separators_is_rejected() {
    let msg = parse_err("process p()() chp { [ a -> skip [] b -> skip [:] c -> skip ] }\n");
    assert!(msg.contains("combine [] and [:]"), "{}", msg);
}

#[test]
fn guarded_command_outside_selection_is_rejected() {
    let msg = parse_err("process p()() chp { a -> skip }\n");
    assert!(msg.contains("guarded command"), "{}", msg);
}

#[test]
fn instance_outside_meta_reports_position() {
    let mut interner = Interner::new();
    let mut ast = Ast::new();
    let mut lex = Lexer::new(&mut interner);
    lex.start_source("test.chp", "process p()() chp { instance x: q; skip }\n")
        .unwrap();
    let mut p = Parser::new(&mut lex, &mut ast);
    let e = p.parse_source_file().unwrap_err();
    assert_eq!(
        e.msg,
        "An instance declaration can only occur in a meta process"
    );
    assert_eq!(e.lnr, 1);
}

#[test]
fn connect_outside_meta_is_rejected() {
    let msg = parse_err("process p()() chp { connect a, b }\n");
    assert!(msg.contains("meta process"), "{}", msg);
}

#[test]
fn statement_replicator_in_expression_context_is_rejected() {
    let msg = parse_err("const e = <<; i: 0..3: skip>>;\n");
    assert!(
        msg.contains("Expected expression, found statement replicator"),
        "{}",
        msg
    );
}

#[test]
fn expression_replicator_parses_in_expressions() {
    let (ast, _, m) = parse("const e = <<+ i: 0..3: i * i>>;\n");
    let z = const_init(&ast, m);
    match &ast[z].kind {
        NodeKind::RepExpr { sym, .. } => assert_eq!(*sym, TokenKind::Plus),
        k => panic!("expected replicated sum, got {:?}", k),
    }
}

#[test]
fn guard_replicator_parses_in_selections() {
    let (ast, _, m) = parse("process p()() chp { *[ <<[] i: 0..3: b -> skip>> ] }\n");
    let sl = chp_stmts(&ast, m);
    let gl = match &ast[sl[0]].kind {
        NodeKind::LoopStmt { gl, .. } => gl.clone(),
        k => panic!("expected loop, got {:?}", k),
    };
    assert!(matches!(
        ast[gl[0]].kind,
        NodeKind::RepStmt {
            sym: TokenKind::Arb,
            ..
        }
    ));
}

#[test]
fn empty_source_file_is_a_warning_not_an_error() {
    let (ast, _, m) = parse("");
    assert!(defs(&ast, m).is_empty());
}

#[test]
fn single_group_process_header_parses() {
    let (ast, _, m) = parse("process p(; a?: int; b!: int) chp { skip }\n");
    let dl = defs(&ast, m);
    match &ast[dl[0]].kind {
        NodeKind::ProcessDef { ml, pl, .. } => {
            assert!(ml.is_empty());
            assert_eq!(pl.len(), 2);
        }
        k => panic!("expected process, got {:?}", k),
    }
}

#[test]
fn port_flags_follow_direction_marks() {
    let (ast, _, m) = parse("process p()(a?: int; b!: int; s) chp { skip }\n");
    let dl = defs(&ast, m);
    let pl = match &ast[dl[0]].kind {
        NodeKind::ProcessDef { pl, .. } => pl.clone(),
        _ => panic!(),
    };
    assert!(ast[pl[0]].flags.contains(NodeFlags::INPORT));
    assert!(ast[pl[1]].flags.contains(NodeFlags::OUTPORT));
    assert!(ast[pl[2]].flags.contains(NodeFlags::PORT));
}

#[test]
fn union_type_requires_default_arm() {
    let msg = parse_err("type u = union { n {dn, up}: int };\n");
    assert!(msg.contains("default"), "{}", msg);
}

const ROUND_TRIP_SRC: &str = r#"
export type word = {0..255};
type dir = {`up, `down};
const n = 4;
const msg = "hi\n";
field lo = [0..3];
property slack;
export function inc(val x: int): int chp { inc := x + 1 }
procedure put(val c: {0..255}; res ok: bool) chp { ok := true }
process buf()(l?: word; r!: word)
chp {
  var x: word;
  *[ l?x; r!x ]
}
process cell()((a, b; c))
prs {
  var t+;
  a & b -> t+
  atomic ~a -> t-
}
delay {
  counter m = 0;
  { t+ } requires { m > 2 }
}
process top(k: int)(go)
meta {
  instance u: buf;
  instance v: buf;
  connect u.r, v.l
}
"#;

#[test]
fn printing_then_reparsing_is_idempotent() {
    let (ast, interner, m) = parse(ROUND_TRIP_SRC);
    let p1 = print_module(&ast, &interner, m);
    let (ast2, interner2, m2) = parse(&p1);
    let p2 = print_module(&ast2, &interner2, m2);
    assert_eq!(p1, p2, "print . parse must be idempotent:\n{}", p1);
}

#[test]
fn printed_source_keeps_operators_and_literals() {
    let (ast, interner, m) = parse("const e = (a + 2) * 'x' ++ \"s\";\n");
    let p1 = print_module(&ast, &interner, m);
    assert!(p1.contains("(a + 2)"), "{}", p1);
    assert!(p1.contains("'x'"), "{}", p1);
    assert!(p1.contains("\"s\""), "{}", p1);
}
