//! Encode a term as the backend would lay it out, evaluate a program that
//! returns the encoding, and check the decoded term is the original.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use kiln_ir::prelude::{self, applied};
use kiln_ir::Term;

use crate::common::{encode, Harness, Program};

fn int_ty() -> Term {
    Term::constant(prelude::PRIM_INT)
}

/// Evaluate `term` at `ty` through a fresh pipeline.
fn round_trip(term: &Term, ty: &Term) -> Term {
    let h = Harness::new();
    let program = Program::returning(encode(&h.env, term));
    h.eval("Top.value", &program, ty).unwrap().term
}

#[test]
fn bool_scenario() {
    let h = Harness::new();
    let ty = Term::ind(prelude::BOOL);
    assert_eq!(
        encode(&h.env, &Term::construct(prelude::BOOL, 1)),
        kiln_native::RuntimeValue::Immediate(1)
    );
    for index in 0..2 {
        let value = Term::construct(prelude::BOOL, index);
        assert_eq!(round_trip(&value, &ty), value);
    }
}

#[test]
fn option_int_scenario() {
    let ty = applied(prelude::OPTION, vec![int_ty()]);
    let none = prelude::option(&int_ty(), None);
    let some = prelude::option(&int_ty(), Some(Term::Int(42)));
    assert_eq!(round_trip(&none, &ty), none);
    assert_eq!(round_trip(&some, &ty), some);
}

#[test]
fn nested_parameters() {
    let pair_ty = applied(
        prelude::PROD,
        vec![Term::ind(prelude::NAT), applied(prelude::LIST, vec![Term::ind(prelude::BOOL)])],
    );
    let value = Term::app(
        Term::construct(prelude::PROD, 0),
        vec![
            Term::ind(prelude::NAT),
            applied(prelude::LIST, vec![Term::ind(prelude::BOOL)]),
            prelude::nat(3),
            prelude::list(
                &Term::ind(prelude::BOOL),
                vec![
                    Term::construct(prelude::BOOL, 0),
                    Term::construct(prelude::BOOL, 1),
                ],
            ),
        ],
    );
    assert_eq!(round_trip(&value, &pair_ty), value);
}

#[test]
fn floats_keep_their_bits() {
    let ty = Term::constant(prelude::PRIM_FLOAT);
    for x in [0.0, -0.0, 1.5, f64::INFINITY, f64::MIN_POSITIVE] {
        let value = Term::float(x);
        assert_eq!(round_trip(&value, &ty), value);
    }
}

fn option_int() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(-(1_i64 << 62)..(1_i64 << 62))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn lists_of_optional_ints(items in prop::collection::vec(option_int(), 0..20)) {
        let elem_ty = applied(prelude::OPTION, vec![int_ty()]);
        let ty = applied(prelude::LIST, vec![elem_ty.clone()]);
        let value = prelude::list(
            &elem_ty,
            items
                .into_iter()
                .map(|item| prelude::option(&int_ty(), item.map(Term::Int)))
                .collect(),
        );
        prop_assert_eq!(round_trip(&value, &ty), value);
    }

    #[test]
    fn naturals(n in 0_u32..200) {
        let value = prelude::nat(n);
        prop_assert_eq!(round_trip(&value, &Term::ind(prelude::NAT)), value);
    }
}
