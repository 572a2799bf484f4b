//! Reduced types and type equivalence.
//!
//! Semantic analysis assigns every expression a reduced type. Equivalence
//! for compile-time checks is structural, with named types transparent
//! (they reduce away before comparison). A stronger run-time check resolves
//! generic meta-types against the values substituted into a process
//! instance.

use std::rc::Rc;

use crate::ast::NodeId;
use crate::exec::{ProcessState, Value};
use crate::intern::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Not (yet) typed. Compatible with everything so one error does not
    /// cascade.
    None,
    /// Unbounded integer.
    Int,
    /// `{lo..hi}`
    IntRange(i64, i64),
    Bool,
    /// A symbol of no particular enumeration (symbol literals, the
    /// `symbol` generic).
    Symbol,
    /// `{a, b, c}`
    Symbols(Rc<Vec<Symbol>>),
    /// The built-in `string` type after patching: equivalence ignores the
    /// length parameter.
    String,
    Array {
        l: i64,
        h: i64,
        elem: Rc<Type>,
    },
    Record(Rc<Vec<(Symbol, Type)>>),
    Union(Rc<UnionTp>),
    /// Two groups of boolean wires: inputs and outputs.
    Wired {
        li: Rc<Vec<(Symbol, Type)>>,
        lo: Rc<Vec<(Symbol, Type)>>,
    },
    /// Dataless synchronization port.
    Port,
    /// Generic meta-type. `meta_idx` locates the per-instance type value;
    /// `None` for a type-valued expression.
    Generic { meta_idx: Option<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionTp {
    pub fields: Vec<UnionArm>,
    pub def: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionArm {
    pub id: Symbol,
    pub tp: Type,
    /// Coercion routines, linked during analysis.
    pub dn: Option<NodeId>,
    pub up: Option<NodeId>,
}

impl Type {
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int | Type::IntRange(..)) || matches!(self, Type::None)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool | Type::None)
    }

    /// Number of elements of an array type.
    pub fn array_len(&self) -> Option<i64> {
        match self {
            Type::Array { l, h, .. } => Some((h - l + 1).max(0)),
            _ => None,
        }
    }
}

/// True iff the reduced forms of `tp1` and `tp2` are identical
/// (compile-time check). Named types are transparent: callers pass reduced
/// types, so nothing named survives to this point.
pub fn type_compatible(tp1: &Type, tp2: &Type) -> bool {
    use Type::*;
    match (tp1, tp2) {
        (None, _) | (_, None) => true,
        (Generic { .. }, _) | (_, Generic { .. }) => true,
        (Int, Int) => true,
        (IntRange(l1, h1), IntRange(l2, h2)) => l1 == l2 && h1 == h2,
        (Bool, Bool) => true,
        (Symbol, Symbol) => true,
        (Symbol, Symbols(_)) | (Symbols(_), Symbol) => true,
        (Symbols(a), Symbols(b)) => a == b,
        (String, String) => true,
        (String, Array { elem, .. }) | (Array { elem, .. }, String) => elem.is_integer(),
        (
            Array { l: l1, h: h1, elem: e1 },
            Array { l: l2, h: h2, elem: e2 },
        ) => l1 == l2 && h1 == h2 && type_compatible(e1, e2),
        (Record(a), Record(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((n1, t1), (n2, t2))| n1 == n2 && type_compatible(t1, t2))
        }
        (Union(a), Union(b)) => {
            a.fields.len() == b.fields.len()
                && type_compatible(&a.def, &b.def)
                && a.fields
                    .iter()
                    .zip(b.fields.iter())
                    .all(|(x, y)| x.id == y.id && type_compatible(&x.tp, &y.tp))
        }
        (Wired { li: i1, lo: o1 }, Wired { li: i2, lo: o2 }) => {
            wire_list_compatible(i1, i2) && wire_list_compatible(o1, o2)
        }
        (Port, Port) => true,
        _ => false,
    }
}

fn wire_list_compatible(a: &[(Symbol, Type)], b: &[(Symbol, Type)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((_, t1), (_, t2))| type_compatible(t1, t2))
}

/// The looser check used where a value of `rhs` type flows into a slot of
/// `lhs` type: integer refinements are a run-time range matter, a record
/// constructor (anonymous field names) matches positionally.
pub fn assignable(lhs: &Type, rhs: &Type) -> bool {
    use Type::*;
    match (lhs, rhs) {
        (Int | IntRange(..), Int | IntRange(..)) => true,
        (
            Array { l: l1, h: h1, elem: e1 },
            Array { l: l2, h: h2, elem: e2 },
        ) => h1 - l1 == h2 - l2 && assignable(e1, e2),
        (Record(a), Record(b)) => {
            a.len() == b.len()
                && a.iter().zip(b.iter()).all(|((n1, t1), (n2, t2))| {
                    (*n2 == crate::intern::Symbol::EMPTY || n1 == n2) && assignable(t1, t2)
                })
        }
        (Union(u), t) => assignable(&u.def, t) || type_compatible(lhs, rhs),
        (String, Array { elem, .. }) | (Array { elem, .. }, String) => elem.is_integer(),
        _ => type_compatible(lhs, rhs),
    }
}

/// Resolve a generic meta-type against the meta values of a process state.
fn resolve_generic<'t>(tp: &'t Type, ps: &'t ProcessState) -> &'t Type {
    if let Type::Generic {
        meta_idx: Some(i), ..
    } = tp
    {
        if let Some(Value::Type(t)) = ps.meta.get(*i as usize) {
            return t;
        }
    }
    tp
}

/// Execution-time type check: compare reduced types in the context of two
/// process states so generic meta-types take the per-instance type value
/// substituted at instantiation. Union types match through their default.
pub fn type_compatible_exec(
    tp1: &Type,
    ps1: &ProcessState,
    tp2: &Type,
    ps2: &ProcessState,
) -> bool {
    let t1 = resolve_generic(tp1, ps1);
    let t2 = resolve_generic(tp2, ps2);
    match (t1, t2) {
        (Type::Generic { .. }, _) | (_, Type::Generic { .. }) => true,
        (Type::Union(u), t) => type_compatible_exec(&u.def, ps1, t, ps2),
        (t, Type::Union(u)) => type_compatible_exec(t, ps1, &u.def, ps2),
        (Type::Array { l: l1, h: h1, elem: e1 }, Type::Array { l: l2, h: h2, elem: e2 }) => {
            h1 - l1 == h2 - l2 && type_compatible_exec(e1, ps1, e2, ps2)
        }
        _ => type_compatible(t1, t2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    fn sym(i: &mut Interner, s: &str) -> Symbol {
        i.intern(s)
    }

    #[test]
    fn integer_ranges_compare_structurally() {
        assert!(type_compatible(&Type::IntRange(0, 3), &Type::IntRange(0, 3)));
        assert!(!type_compatible(&Type::IntRange(0, 3), &Type::IntRange(0, 7)));
        assert!(type_compatible(&Type::Int, &Type::Int));
        assert!(!type_compatible(&Type::Int, &Type::IntRange(0, 3)));
    }

    #[test]
    fn assignable_bridges_integer_refinements() {
        assert!(assignable(&Type::IntRange(0, 3), &Type::Int));
        assert!(assignable(&Type::Int, &Type::IntRange(0, 3)));
        assert!(!assignable(&Type::Bool, &Type::Int));
    }

    #[test]
    fn symbol_enumerations_match_pairwise() {
        let mut i = Interner::new();
        let a = Rc::new(vec![sym(&mut i, "lo"), sym(&mut i, "hi")]);
        let b = Rc::new(vec![sym(&mut i, "lo"), sym(&mut i, "hi")]);
        let c = Rc::new(vec![sym(&mut i, "hi"), sym(&mut i, "lo")]);
        assert!(type_compatible(&Type::Symbols(a.clone()), &Type::Symbols(b)));
        assert!(!type_compatible(&Type::Symbols(a), &Type::Symbols(c)));
    }

    #[test]
    fn symbol_literal_matches_any_enumeration() {
        let mut i = Interner::new();
        let e = Type::Symbols(Rc::new(vec![sym(&mut i, "ack")]));
        assert!(type_compatible(&Type::Symbol, &e));
    }

    #[test]
    fn arrays_need_equal_ranges_compile_time() {
        let a = Type::Array { l: 0, h: 3, elem: Rc::new(Type::Bool) };
        let b = Type::Array { l: 0, h: 3, elem: Rc::new(Type::Bool) };
        let c = Type::Array { l: 1, h: 4, elem: Rc::new(Type::Bool) };
        assert!(type_compatible(&a, &b));
        assert!(!type_compatible(&a, &c));
        assert!(assignable(&a, &c), "same length arrays are assignable");
    }

    #[test]
    fn records_compare_by_name_and_type() {
        let mut i = Interner::new();
        let x = sym(&mut i, "x");
        let y = sym(&mut i, "y");
        let a = Type::Record(Rc::new(vec![(x, Type::Int), (y, Type::Bool)]));
        let b = Type::Record(Rc::new(vec![(x, Type::Int), (y, Type::Bool)]));
        let c = Type::Record(Rc::new(vec![(y, Type::Int), (x, Type::Bool)]));
        assert!(type_compatible(&a, &b));
        assert!(!type_compatible(&a, &c));
    }

    #[test]
    fn anonymous_record_constructor_assigns_positionally() {
        let mut i = Interner::new();
        let x = sym(&mut i, "x");
        let target = Type::Record(Rc::new(vec![(x, Type::Int)]));
        let cons = Type::Record(Rc::new(vec![(Symbol::EMPTY, Type::Int)]));
        assert!(assignable(&target, &cons));
    }

    #[test]
    fn string_ignores_length() {
        let chars = Type::Array { l: 0, h: 7, elem: Rc::new(Type::IntRange(0, 255)) };
        assert!(type_compatible(&Type::String, &chars));
        assert!(type_compatible(&Type::String, &Type::String));
        let bools = Type::Array { l: 0, h: 7, elem: Rc::new(Type::Bool) };
        assert!(!type_compatible(&Type::String, &bools));
    }

    #[test]
    fn generic_matches_everything_at_compile_time() {
        assert!(type_compatible(&Type::Generic { meta_idx: Some(0) }, &Type::Bool));
        assert!(type_compatible(&Type::Int, &Type::Generic { meta_idx: None }));
    }

    #[test]
    fn exec_check_resolves_generic_from_meta_values() {
        let mut ps1 = ProcessState::new("/".into(), NodeId(0));
        ps1.meta = vec![Value::Type(Rc::new(Type::Bool))];
        let ps2 = ProcessState::new("/sub".into(), NodeId(0));
        let g = Type::Generic { meta_idx: Some(0) };
        assert!(type_compatible_exec(&g, &ps1, &Type::Bool, &ps2));
        assert!(!type_compatible_exec(&g, &ps1, &Type::Int, &ps2));
    }

    #[test]
    fn exec_check_sees_through_unions() {
        let u = Type::Union(Rc::new(UnionTp { fields: vec![], def: Type::Int }));
        let ps = ProcessState::new("/".into(), NodeId(0));
        assert!(type_compatible_exec(&u, &ps, &Type::Int, &ps));
    }
}
