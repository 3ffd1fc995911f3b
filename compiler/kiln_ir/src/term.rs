//! Symbolic terms of the host assistant.
//!
//! Variables are de Bruijn indices: `Var(0)` is the innermost binder.
//! Applications are kept in spine form (`App { head, args }` with a
//! non-application head and at least one argument) so the head of a type or a
//! value can be read without walking nested applications. Build them with
//! [`Term::app`], which maintains that shape.

use std::fmt;

use crate::name::{Instance, Name};

/// Sort of a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sort {
    Prop,
    Set,
    Type(u32),
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Prop => f.write_str("Prop"),
            Sort::Set => f.write_str("Set"),
            Sort::Type(level) => write!(f, "Type@{{{level}}}"),
        }
    }
}

/// A primitive 64-bit float literal, stored as IEEE-754 bits.
///
/// Bit storage gives literals structural equality (including NaN payloads),
/// which is what term comparison in the assistant uses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Float64(u64);

impl Float64 {
    pub const fn from_bits(bits: u64) -> Self {
        Float64(bits)
    }

    pub fn from_f64(value: f64) -> Self {
        Float64(value.to_bits())
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for Float64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_f64())
    }
}

impl fmt::Display for Float64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_f64())
    }
}

/// A host term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Bound variable (de Bruijn index).
    Var(u32),
    Sort(Sort),
    /// Global constant: a definition, an axiom or a primitive type.
    Const { name: Name, instance: Instance },
    /// Inductive type former.
    Ind { name: Name, instance: Instance },
    /// The `index`-th constructor (declaration order, 0-based) of `ind`.
    Construct {
        ind: Name,
        index: u32,
        instance: Instance,
    },
    App { head: Box<Term>, args: Vec<Term> },
    Pi {
        binder: Name,
        domain: Box<Term>,
        codomain: Box<Term>,
    },
    Lambda {
        binder: Name,
        domain: Box<Term>,
        body: Box<Term>,
    },
    Let {
        binder: Name,
        value: Box<Term>,
        ty: Box<Term>,
        body: Box<Term>,
    },
    /// Primitive 63-bit machine integer literal.
    Int(i64),
    /// Primitive 64-bit float literal.
    Float(Float64),
}

impl Term {
    pub fn constant(name: impl Into<Name>) -> Self {
        Term::Const {
            name: name.into(),
            instance: Instance::empty(),
        }
    }

    pub fn ind(name: impl Into<Name>) -> Self {
        Term::Ind {
            name: name.into(),
            instance: Instance::empty(),
        }
    }

    pub fn construct(ind: impl Into<Name>, index: u32) -> Self {
        Term::Construct {
            ind: ind.into(),
            index,
            instance: Instance::empty(),
        }
    }

    pub fn float(value: f64) -> Self {
        Term::Float(Float64::from_f64(value))
    }

    /// Non-dependent function type `domain -> codomain`.
    ///
    /// `codomain` is lifted over the new binder.
    pub fn arrow(domain: Term, codomain: &Term) -> Self {
        Term::Pi {
            binder: Name::new("_"),
            domain: Box::new(domain),
            codomain: Box::new(crate::subst::lift(codomain, 0, 1)),
        }
    }

    /// Apply `head` to `args`, keeping applications in spine form.
    ///
    /// Returns `head` unchanged when `args` is empty; an application head is
    /// extended instead of nested.
    pub fn app(head: Term, args: Vec<Term>) -> Self {
        if args.is_empty() {
            return head;
        }
        match head {
            Term::App {
                head: inner,
                args: mut prefix,
            } => {
                prefix.extend(args);
                Term::App {
                    head: inner,
                    args: prefix,
                }
            }
            head => Term::App {
                head: Box::new(head),
                args,
            },
        }
    }

    /// Split a term into its head and spine arguments.
    pub fn decompose_app(&self) -> (&Term, &[Term]) {
        match self {
            Term::App { head, args } => (head, args),
            other => (other, &[]),
        }
    }

    /// Whether the term has no free de Bruijn variables.
    pub fn is_closed(&self) -> bool {
        crate::subst::is_closed_above(self, 0)
    }
}
