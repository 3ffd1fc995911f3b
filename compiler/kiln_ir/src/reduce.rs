//! Weak head-normal form.
//!
//! Only the head of a term is reduced: beta, zeta (let) and delta (unfolding
//! transparent definitions). This is what type classification needs to see
//! through aliases such as `Definition N := nat` or `fun A => list A`
//! applied to an argument. Every step consumes one unit of [`Fuel`], so a
//! non-terminating definition fails instead of hanging the caller.

use thiserror::Error;

use crate::env::Environment;
use crate::name::Name;
use crate::subst::instantiate;
use crate::term::Term;

/// Step budget for [`whnf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fuel(pub u32);

impl Default for Fuel {
    fn default() -> Self {
        Fuel(10_000)
    }
}

/// Error from head reduction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("head reduction did not finish within {budget} steps")]
    OutOfFuel { budget: u32 },
    #[error("constant `{name}` is not in the environment")]
    UnknownConstant { name: Name },
}

/// Reduce `term` to weak head-normal form.
pub fn whnf(env: &Environment, term: &Term, fuel: Fuel) -> Result<Term, ReduceError> {
    let Fuel(budget) = fuel;
    let mut remaining = budget;
    let mut current = term.clone();
    loop {
        let Some(next) = step(env, &current)? else {
            return Ok(current);
        };
        if remaining == 0 {
            return Err(ReduceError::OutOfFuel { budget });
        }
        remaining -= 1;
        current = next;
    }
}

/// One head step, or `None` when the head is already normal.
fn step(env: &Environment, term: &Term) -> Result<Option<Term>, ReduceError> {
    let (head, args) = term.decompose_app();
    match head {
        Term::Lambda { body, .. } if !args.is_empty() => {
            let reduced = instantiate(body, &args[..1]);
            Ok(Some(Term::app(reduced, args[1..].to_vec())))
        }
        Term::Let { value, body, .. } => {
            let reduced = instantiate(body, std::slice::from_ref(value.as_ref()));
            Ok(Some(Term::app(reduced, args.to_vec())))
        }
        Term::Const { name, .. } => {
            if env.primitive_type(name).is_some() {
                return Ok(None);
            }
            let definition = env
                .definition(name)
                .ok_or_else(|| ReduceError::UnknownConstant { name: name.clone() })?;
            Ok(definition
                .body
                .as_ref()
                .map(|body| Term::app(body.clone(), args.to_vec())))
        }
        _ => Ok(None),
    }
}
