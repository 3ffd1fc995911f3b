//! A small standard environment: the datatypes every session has, plus the
//! primitive integer, float and array types.
//!
//! Constructor order follows the usual library declarations (`bool` is
//! `true | false`, so `true` is constructor 0).

use crate::env::{ConstructorDecl, Environment, InductiveDecl, PrimitiveKind};
use crate::term::{Sort, Term};

pub const BOOL: &str = "bool";
pub const NAT: &str = "nat";
pub const OPTION: &str = "option";
pub const LIST: &str = "list";
pub const PROD: &str = "prod";
pub const SIGT: &str = "sigT";
pub const PRIM_INT: &str = "PrimInt63.int";
pub const PRIM_FLOAT: &str = "PrimFloat.float";
pub const PRIM_ARRAY: &str = "PArray.array";

fn ty() -> Term {
    Term::Sort(Sort::Type(0))
}

/// Build the prelude environment.
pub fn environment() -> Environment {
    let mut env = Environment::new();

    env.add_inductive(InductiveDecl::new(
        BOOL,
        vec![
            ConstructorDecl::constant("true"),
            ConstructorDecl::constant("false"),
        ],
    ));

    env.add_inductive(InductiveDecl::new(
        NAT,
        vec![
            ConstructorDecl::constant("O"),
            ConstructorDecl::new("S", vec![Term::ind(NAT)]),
        ],
    ));

    // Field contexts: [A] for option/list, [A, B] then [A, B, a] for prod.
    env.add_inductive(
        InductiveDecl::new(
            OPTION,
            vec![
                ConstructorDecl::constant("None"),
                ConstructorDecl::new("Some", vec![Term::Var(0)]),
            ],
        )
        .with_param("A", ty()),
    );

    env.add_inductive(
        InductiveDecl::new(
            LIST,
            vec![
                ConstructorDecl::constant("nil"),
                ConstructorDecl::new(
                    "cons",
                    vec![
                        Term::Var(0),
                        Term::app(Term::ind(LIST), vec![Term::Var(1)]),
                    ],
                ),
            ],
        )
        .with_param("A", ty()),
    );

    env.add_inductive(
        InductiveDecl::new(
            PROD,
            vec![ConstructorDecl::new(
                "pair",
                vec![Term::Var(1), Term::Var(1)],
            )],
        )
        .with_param("A", ty())
        .with_param("B", ty()),
    );

    // existT (x : A) (p : P x); contexts [A, P] and [A, P, x].
    env.add_inductive(
        InductiveDecl::new(
            SIGT,
            vec![ConstructorDecl::new(
                "existT",
                vec![Term::Var(1), Term::app(Term::Var(1), vec![Term::Var(0)])],
            )],
        )
        .with_param("A", ty())
        .with_param("P", Term::arrow(Term::Var(0), &ty())),
    );

    env.register_primitive_type(PRIM_INT, PrimitiveKind::Int);
    env.register_primitive_type(PRIM_FLOAT, PrimitiveKind::Float);
    env.register_primitive_type(PRIM_ARRAY, PrimitiveKind::Array);

    env
}

/// The unary numeral `n`.
pub fn nat(n: u32) -> Term {
    (0..n).fold(Term::construct(NAT, 0), |acc, _| {
        Term::app(Term::construct(NAT, 1), vec![acc])
    })
}

/// `list elem_ty` containing `items` in order.
pub fn list(elem_ty: &Term, items: Vec<Term>) -> Term {
    items
        .into_iter()
        .rev()
        .fold(Term::app(Term::construct(LIST, 0), vec![elem_ty.clone()]), |tail, item| {
            Term::app(Term::construct(LIST, 1), vec![elem_ty.clone(), item, tail])
        })
}

/// `Some value` at type `option elem_ty`, or `None` when `value` is absent.
pub fn option(elem_ty: &Term, value: Option<Term>) -> Term {
    match value {
        Some(value) => Term::app(Term::construct(OPTION, 1), vec![elem_ty.clone(), value]),
        None => Term::app(Term::construct(OPTION, 0), vec![elem_ty.clone()]),
    }
}

/// The type `head args...` for a prelude inductive.
pub fn applied(head: &str, args: Vec<Term>) -> Term {
    Term::app(Term::ind(head), args)
}
