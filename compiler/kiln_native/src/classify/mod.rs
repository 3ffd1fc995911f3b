//! Type classification.
//!
//! Decides, from a static type alone, how values of that type are laid out
//! at runtime: either as an inductive type with a known, ordered constructor
//! list, or as a primitive scalar. The result, [`ReifyableType`], is what the
//! decoder dispatches on.
//!
//! # Constructor layout
//!
//! The runtime numbers constructors in two independent spaces: constructors
//! without fields become immediates numbered `0, 1, ...` in declaration
//! order, constructors with fields become blocks whose tag is their position
//! among the constructors with fields. [`CtorLayout`] records that partition
//! once per inductive and is shared by every classification of that
//! inductive, so the decoder never recomputes it.

use std::cell::RefCell;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use kiln_ir::{whnf, Environment, Fuel, InductiveDecl, Instance, Name, PrimitiveKind, Term};

use crate::error::{TypeError, ValueShape};

/// Number of block tags available to constructors (`0..=250`). Tags from
/// 251 up mark runtime-internal blocks (unscanned data, closures, boxed
/// floats).
pub const MAX_BLOCK_CONSTRUCTORS: usize = 251;

/// One constructor as the runtime sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtorSig {
    /// Position in the declaration (the constructor's identity).
    pub index: u32,
    pub name: Name,
    pub arity: usize,
}

/// Constructors of one inductive, partitioned by runtime shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtorLayout {
    constant: Vec<CtorSig>,
    non_constant: Vec<CtorSig>,
}

impl CtorLayout {
    /// Partition `decl`'s constructors, preserving declaration order inside
    /// each class.
    pub fn of(decl: &InductiveDecl) -> Self {
        let mut constant = Vec::new();
        let mut non_constant = Vec::new();
        for (index, ctor) in (0u32..).zip(&decl.constructors) {
            let sig = CtorSig {
                index,
                name: ctor.name.clone(),
                arity: ctor.arity(),
            };
            if sig.arity == 0 {
                constant.push(sig);
            } else {
                non_constant.push(sig);
            }
        }
        Self {
            constant,
            non_constant,
        }
    }

    /// Constructor represented by immediate `ordinal`.
    pub fn constant(&self, ordinal: usize) -> Option<&CtorSig> {
        self.constant.get(ordinal)
    }

    /// Constructor represented by a block tagged `tag`.
    pub fn block(&self, tag: u8) -> Option<&CtorSig> {
        self.non_constant.get(usize::from(tag))
    }

    pub fn constants(&self) -> &[CtorSig] {
        &self.constant
    }

    pub fn blocks(&self) -> &[CtorSig] {
        &self.non_constant
    }

    /// Shape and in-class number of the constructor declared at `index`.
    pub fn position(&self, index: u32) -> Option<(ValueShape, usize)> {
        if let Some(n) = self.constant.iter().position(|sig| sig.index == index) {
            return Some((ValueShape::Immediate, n));
        }
        self.non_constant
            .iter()
            .position(|sig| sig.index == index)
            .map(|n| (ValueShape::Block, n))
    }
}

/// A type whose values the decoder can read.
#[derive(Clone, Debug, PartialEq)]
pub enum ReifyableType {
    Inductive {
        head: Name,
        instance: Instance,
        params: Vec<Term>,
        layout: Arc<CtorLayout>,
    },
    Primitive {
        head: Name,
        kind: PrimitiveKind,
        instance: Instance,
        params: Vec<Term>,
    },
}

impl ReifyableType {
    /// The classified type as a term.
    pub fn to_term(&self) -> Term {
        match self {
            ReifyableType::Inductive {
                head,
                instance,
                params,
                ..
            } => Term::app(
                Term::Ind {
                    name: head.clone(),
                    instance: instance.clone(),
                },
                params.clone(),
            ),
            ReifyableType::Primitive {
                head,
                instance,
                params,
                ..
            } => Term::app(
                Term::Const {
                    name: head.clone(),
                    instance: instance.clone(),
                },
                params.clone(),
            ),
        }
    }
}

/// Classifies types against one environment.
///
/// Layouts are memoized per inductive for the classifier's lifetime: every
/// nested field type of the same inductive reuses the partition computed the
/// first time.
pub struct TypeClassifier<'env> {
    env: &'env Environment,
    fuel: Fuel,
    layouts: RefCell<FxHashMap<Name, Arc<CtorLayout>>>,
}

impl<'env> TypeClassifier<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Self {
            env,
            fuel: Fuel::default(),
            layouts: RefCell::new(FxHashMap::default()),
        }
    }

    /// Use `fuel` as the step budget for reducing types.
    #[must_use]
    pub fn with_fuel(mut self, fuel: Fuel) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn env(&self) -> &'env Environment {
        self.env
    }

    /// Render a term for error messages.
    pub fn render(&self, term: &Term) -> String {
        self.env.pretty(term).to_string()
    }

    /// Classify `ty`.
    ///
    /// The type is first read as-is; only if its head is not an inductive is
    /// it reduced to weak head-normal form, then read again as an inductive
    /// or as a registered primitive type.
    pub fn classify(&self, ty: &Term) -> Result<ReifyableType, TypeError> {
        if let Some(found) = self.try_inductive(ty)? {
            return Ok(found);
        }

        let reduced = whnf(self.env, ty, self.fuel).map_err(|source| TypeError::Reduce {
            ty: self.render(ty),
            source,
        })?;

        if let Some(found) = self.try_inductive(&reduced)? {
            return Ok(found);
        }

        let (head, args) = reduced.decompose_app();
        if let Term::Const { name, instance } = head {
            if let Some(kind) = self.env.primitive_type(name) {
                return Ok(ReifyableType::Primitive {
                    head: name.clone(),
                    kind,
                    instance: instance.clone(),
                    params: args.to_vec(),
                });
            }
        }

        tracing::debug!(ty = %self.render(ty), "type is not reifyable");
        Err(TypeError::NotReifyable {
            ty: self.render(ty),
        })
    }

    /// Classify the type of an evaluation result.
    ///
    /// Also rejects primitive types whose values are never read back, so a
    /// request at such a type fails before anything is built.
    pub fn classify_result(&self, ty: &Term) -> Result<ReifyableType, TypeError> {
        let class = self.classify(ty)?;
        if let ReifyableType::Primitive {
            kind: kind @ PrimitiveKind::Array,
            ..
        } = class
        {
            return Err(TypeError::UnsupportedPrimitive {
                ty: self.render(&class.to_term()),
                kind,
            });
        }
        Ok(class)
    }

    fn try_inductive(&self, ty: &Term) -> Result<Option<ReifyableType>, TypeError> {
        let (head, args) = ty.decompose_app();
        let Term::Ind { name, instance } = head else {
            return Ok(None);
        };
        let decl = self
            .env
            .inductive(name)
            .ok_or_else(|| TypeError::UnknownInductive { name: name.clone() })?;

        let expected = decl.num_params();
        if args.len() < expected {
            return Err(TypeError::MissingParameters {
                ty: self.render(ty),
                name: name.clone(),
                expected,
                found: args.len(),
            });
        }

        // Arguments past the parameters are indices; they do not affect the
        // layout or the field types.
        Ok(Some(ReifyableType::Inductive {
            head: name.clone(),
            instance: instance.clone(),
            params: args[..expected].to_vec(),
            layout: self.layout(decl)?,
        }))
    }

    fn layout(&self, decl: &InductiveDecl) -> Result<Arc<CtorLayout>, TypeError> {
        if let Some(layout) = self.layouts.borrow().get(&decl.name) {
            return Ok(Arc::clone(layout));
        }

        let layout = CtorLayout::of(decl);
        if layout.blocks().len() > MAX_BLOCK_CONSTRUCTORS {
            return Err(TypeError::UnsupportedLayout {
                name: decl.name.clone(),
                count: layout.blocks().len(),
                max: MAX_BLOCK_CONSTRUCTORS,
            });
        }

        let layout = Arc::new(layout);
        self.layouts
            .borrow_mut()
            .insert(decl.name.clone(), Arc::clone(&layout));
        Ok(layout)
    }
}
