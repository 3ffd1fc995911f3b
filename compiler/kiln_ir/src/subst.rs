//! De Bruijn lifting and instantiation.

use crate::stack::ensure_sufficient_stack;
use crate::term::Term;

/// Shift every variable with index `>= cutoff` up by `amount`.
pub fn lift(term: &Term, cutoff: u32, amount: u32) -> Term {
    if amount == 0 {
        return term.clone();
    }
    map_vars(term, cutoff, &|index, depth| {
        if index >= depth {
            Term::Var(index + amount)
        } else {
            Term::Var(index)
        }
    })
}

/// Instantiate the outermost `values.len()` binders of `term`.
///
/// `values` is in binding order: `values[0]` is the outermost binder, so the
/// last element replaces `Var(0)`. Variables beyond the instantiated binders
/// are shifted down. Replacements are lifted over any binders crossed on the
/// way to the variable.
pub fn instantiate(term: &Term, values: &[Term]) -> Term {
    if values.is_empty() {
        return term.clone();
    }
    let count = u32::try_from(values.len()).unwrap_or(u32::MAX);
    map_vars(term, 0, &|index, depth| {
        if index < depth {
            Term::Var(index)
        } else if index - depth < count {
            let slot = (count - 1 - (index - depth)) as usize;
            lift(&values[slot], 0, depth)
        } else {
            Term::Var(index - count)
        }
    })
}

/// Whether no variable escapes `depth` enclosing binders.
pub(crate) fn is_closed_above(term: &Term, depth: u32) -> bool {
    ensure_sufficient_stack(|| match term {
        Term::Var(index) => *index < depth,
        Term::Sort(_)
        | Term::Const { .. }
        | Term::Ind { .. }
        | Term::Construct { .. }
        | Term::Int(_)
        | Term::Float(_) => true,
        Term::App { head, args } => {
            is_closed_above(head, depth) && args.iter().all(|a| is_closed_above(a, depth))
        }
        Term::Pi {
            domain, codomain, ..
        } => is_closed_above(domain, depth) && is_closed_above(codomain, depth + 1),
        Term::Lambda { domain, body, .. } => {
            is_closed_above(domain, depth) && is_closed_above(body, depth + 1)
        }
        Term::Let {
            value, ty, body, ..
        } => {
            is_closed_above(value, depth)
                && is_closed_above(ty, depth)
                && is_closed_above(body, depth + 1)
        }
    })
}

/// Rebuild `term`, replacing each variable by `on_var(index, depth)` where
/// `depth` counts binders crossed since the start of the traversal.
fn map_vars(term: &Term, depth: u32, on_var: &dyn Fn(u32, u32) -> Term) -> Term {
    ensure_sufficient_stack(|| match term {
        Term::Var(index) => on_var(*index, depth),
        Term::Sort(_)
        | Term::Const { .. }
        | Term::Ind { .. }
        | Term::Construct { .. }
        | Term::Int(_)
        | Term::Float(_) => term.clone(),
        Term::App { head, args } => Term::app(
            map_vars(head, depth, on_var),
            args.iter().map(|a| map_vars(a, depth, on_var)).collect(),
        ),
        Term::Pi {
            binder,
            domain,
            codomain,
        } => Term::Pi {
            binder: binder.clone(),
            domain: Box::new(map_vars(domain, depth, on_var)),
            codomain: Box::new(map_vars(codomain, depth + 1, on_var)),
        },
        Term::Lambda {
            binder,
            domain,
            body,
        } => Term::Lambda {
            binder: binder.clone(),
            domain: Box::new(map_vars(domain, depth, on_var)),
            body: Box::new(map_vars(body, depth + 1, on_var)),
        },
        Term::Let {
            binder,
            value,
            ty,
            body,
        } => Term::Let {
            binder: binder.clone(),
            value: Box::new(map_vars(value, depth, on_var)),
            ty: Box::new(map_vars(ty, depth, on_var)),
            body: Box::new(map_vars(body, depth + 1, on_var)),
        },
    })
}
