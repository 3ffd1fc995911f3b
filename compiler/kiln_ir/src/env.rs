//! Global environment: inductive declarations, definitions and primitive
//! type constants.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::name::Name;
use crate::term::Term;

/// A constructor signature.
///
/// `fields[k]` is the type of the `k`-th field, valid in the context of the
/// inductive's parameters followed by fields `0..k` (so `Var(0)` is the
/// previous field, or the last parameter for the first field).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub name: Name,
    pub fields: Vec<Term>,
}

impl ConstructorDecl {
    pub fn new(name: impl Into<Name>, fields: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// A constructor with no fields.
    pub fn constant(name: impl Into<Name>) -> Self {
        Self::new(name, Vec::new())
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }
}

/// An inductive type declaration.
///
/// The constructor order is the declaration order. It is the single source
/// of truth for constructor numbering, both when the backend lowers the type
/// and when the evaluator reads values back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InductiveDecl {
    pub name: Name,
    /// Uniform parameters with their types, outermost first.
    pub params: Vec<(Name, Term)>,
    pub constructors: Vec<ConstructorDecl>,
}

impl InductiveDecl {
    pub fn new(name: impl Into<Name>, constructors: Vec<ConstructorDecl>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            constructors,
        }
    }

    #[must_use]
    pub fn with_param(mut self, binder: impl Into<Name>, ty: Term) -> Self {
        self.params.push((binder.into(), ty));
        self
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn constructor(&self, index: u32) -> Option<&ConstructorDecl> {
        self.constructors.get(index as usize)
    }
}

/// A global constant with a type and, for transparent definitions, a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Definition {
    pub name: Name,
    pub ty: Term,
    /// `None` for axioms and opaque constants, which never unfold.
    pub body: Option<Term>,
}

/// Runtime representation class of a registered primitive type constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// 63-bit machine integers.
    Int,
    /// IEEE-754 binary64 floats.
    Float,
    /// Persistent arrays.
    Array,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Array => "array",
        })
    }
}

/// Global environment of the host session.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    inductives: FxHashMap<Name, InductiveDecl>,
    definitions: FxHashMap<Name, Definition>,
    primitive_types: FxHashMap<Name, PrimitiveKind>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an inductive declaration.
    pub fn add_inductive(&mut self, decl: InductiveDecl) {
        self.inductives.insert(decl.name.clone(), decl);
    }

    /// Add a transparent definition.
    pub fn define(&mut self, name: impl Into<Name>, ty: Term, body: Term) {
        let name = name.into();
        self.definitions.insert(
            name.clone(),
            Definition {
                name,
                ty,
                body: Some(body),
            },
        );
    }

    /// Add a constant without a body.
    pub fn add_axiom(&mut self, name: impl Into<Name>, ty: Term) {
        let name = name.into();
        self.definitions.insert(
            name.clone(),
            Definition {
                name,
                ty,
                body: None,
            },
        );
    }

    /// Mark the constant `name` as a primitive type of the given kind.
    pub fn register_primitive_type(&mut self, name: impl Into<Name>, kind: PrimitiveKind) {
        self.primitive_types.insert(name.into(), kind);
    }

    pub fn inductive(&self, name: &Name) -> Option<&InductiveDecl> {
        self.inductives.get(name)
    }

    pub fn definition(&self, name: &Name) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn primitive_type(&self, name: &Name) -> Option<PrimitiveKind> {
        self.primitive_types.get(name).copied()
    }

    /// Render `term` with constructor names resolved against this environment.
    pub fn pretty<'a>(&'a self, term: &'a Term) -> crate::display::Pretty<'a> {
        crate::display::Pretty::new(self, term)
    }
}
