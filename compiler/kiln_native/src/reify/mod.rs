//! Value decoding (reification).
//!
//! Turns a [`RuntimeValue`] back into the host term it represents. Nothing
//! in the value says what type it has; the decoder is driven entirely by the
//! [`ReifyableType`] computed before the build, and descends into fields
//! using each field's own type.
//!
//! For an inductive, the value's shape picks the constructor class and the
//! tag or ordinal indexes into it:
//!
//! | value               | constructor                               |
//! |---------------------|-------------------------------------------|
//! | `Immediate(n)`      | `n`-th constructor without fields         |
//! | `Block { tag: n }`  | `n`-th constructor with fields            |
//!
//! Field `k` of a constructor is typed in the context of the inductive's
//! parameters followed by fields `0..k`, so the decoder instantiates it with
//! the concrete parameters and the fields it has already decoded before
//! classifying it. This is what makes dependent pairs like `existT`
//! decodable.

use kiln_ir::{
    ensure_sufficient_stack, subst, Environment, Float64, Instance, Name, PrimitiveKind, Term,
};

use crate::classify::{CtorLayout, CtorSig, ReifyableType, TypeClassifier};
use crate::error::{EvalError, IllFormedValue, TypeError};
use crate::value::RuntimeValue;

/// Decode `value` at type `ty`.
pub fn reify(env: &Environment, ty: &Term, value: &RuntimeValue) -> Result<Term, EvalError> {
    let classifier = TypeClassifier::new(env);
    let class = classifier.classify_result(ty)?;
    Reifier::new(&classifier).reify(&class, value)
}

/// Decoder bound to a classifier.
///
/// Field types are classified through the same classifier as the top-level
/// type, so constructor layouts are computed once per inductive for the
/// whole value.
pub struct Reifier<'c, 'env> {
    classifier: &'c TypeClassifier<'env>,
}

impl<'c, 'env> Reifier<'c, 'env> {
    pub fn new(classifier: &'c TypeClassifier<'env>) -> Self {
        Self { classifier }
    }

    /// Decode `value` as an inhabitant of `class`.
    pub fn reify(&self, class: &ReifyableType, value: &RuntimeValue) -> Result<Term, EvalError> {
        ensure_sufficient_stack(|| match class {
            ReifyableType::Primitive { kind, .. } => self.primitive(class, *kind, value),
            ReifyableType::Inductive {
                head,
                instance,
                params,
                layout,
            } => {
                let ind = Inductive {
                    head,
                    instance,
                    params,
                    layout,
                };
                match value {
                    RuntimeValue::Immediate(ordinal) => self.constant(class, &ind, *ordinal),
                    RuntimeValue::Block { tag, fields } => self.block(class, &ind, *tag, fields),
                }
            }
        })
    }

    fn primitive(
        &self,
        class: &ReifyableType,
        kind: PrimitiveKind,
        value: &RuntimeValue,
    ) -> Result<Term, EvalError> {
        match kind {
            PrimitiveKind::Int => match value {
                RuntimeValue::Immediate(n) => Ok(Term::Int(*n)),
                RuntimeValue::Block { .. } => Err(self.scalar_shape(class, value)),
            },
            PrimitiveKind::Float => value
                .as_float_bits()
                .map(|bits| Term::Float(Float64::from_bits(u64::from_ne_bytes(bits.to_ne_bytes()))))
                .ok_or_else(|| self.scalar_shape(class, value)),
            PrimitiveKind::Array => Err(TypeError::UnsupportedPrimitive {
                ty: self.render(class),
                kind,
            }
            .into()),
        }
    }

    fn scalar_shape(&self, class: &ReifyableType, value: &RuntimeValue) -> EvalError {
        let raw = match value {
            RuntimeValue::Immediate(n) => *n,
            RuntimeValue::Block { tag, .. } => i64::from(*tag),
        };
        IllFormedValue::ScalarShape {
            ty: self.render(class),
            shape: value.shape(),
            raw,
        }
        .into()
    }

    fn constant(
        &self,
        class: &ReifyableType,
        ind: &Inductive<'_>,
        ordinal: i64,
    ) -> Result<Term, EvalError> {
        let sig = usize::try_from(ordinal)
            .ok()
            .and_then(|n| ind.layout.constant(n))
            .ok_or_else(|| IllFormedValue::ImmediateOrdinal {
                ty: self.render(class),
                ordinal,
                available: ind.layout.constants().len(),
            })?;
        Ok(Term::app(ind.constructor(sig), ind.params.to_vec()))
    }

    fn block(
        &self,
        class: &ReifyableType,
        ind: &Inductive<'_>,
        tag: u8,
        fields: &[RuntimeValue],
    ) -> Result<Term, EvalError> {
        let sig = ind
            .layout
            .block(tag)
            .ok_or_else(|| IllFormedValue::BlockTag {
                ty: self.render(class),
                tag,
                available: ind.layout.blocks().len(),
            })?;
        if fields.len() != sig.arity {
            return Err(IllFormedValue::FieldCount {
                ty: self.render(class),
                constructor: sig.name.clone(),
                tag,
                expected: sig.arity,
                found: fields.len(),
            }
            .into());
        }

        let decl = self
            .classifier
            .env()
            .inductive(ind.head)
            .and_then(|decl| decl.constructor(sig.index))
            .ok_or_else(|| TypeError::UnknownInductive {
                name: ind.head.clone(),
            })?;

        // Context for field k: parameters, then fields 0..k already decoded.
        let mut context = ind.params.to_vec();
        for (field_ty, field) in decl.fields.iter().zip(fields) {
            let field_ty = subst::instantiate(field_ty, &context);
            let field_class = self.classifier.classify(&field_ty)?;
            context.push(self.reify(&field_class, field)?);
        }
        Ok(Term::app(ind.constructor(sig), context))
    }

    fn render(&self, class: &ReifyableType) -> String {
        self.classifier.render(&class.to_term())
    }
}

/// Borrowed view of an inductive classification.
struct Inductive<'a> {
    head: &'a Name,
    instance: &'a Instance,
    params: &'a [Term],
    layout: &'a CtorLayout,
}

impl Inductive<'_> {
    fn constructor(&self, sig: &CtorSig) -> Term {
        Term::Construct {
            ind: self.head.clone(),
            index: sig.index,
            instance: self.instance.clone(),
        }
    }
}
