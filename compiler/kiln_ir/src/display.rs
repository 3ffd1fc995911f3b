//! Textual rendering of terms for messages and test output.

use std::fmt;

use crate::env::Environment;
use crate::stack::ensure_sufficient_stack;
use crate::term::Term;

/// Displays a term with constructor names resolved in an environment.
///
/// Constructors of unknown inductives render as `ind#index`.
pub struct Pretty<'a> {
    env: &'a Environment,
    term: &'a Term,
}

impl<'a> Pretty<'a> {
    pub(crate) fn new(env: &'a Environment, term: &'a Term) -> Self {
        Self { env, term }
    }

    fn write_term(&self, f: &mut fmt::Formatter<'_>, term: &Term, parens: bool) -> fmt::Result {
        ensure_sufficient_stack(|| match term {
            Term::Var(index) => write!(f, "#{index}"),
            Term::Sort(sort) => write!(f, "{sort}"),
            Term::Const { name, instance } | Term::Ind { name, instance } => {
                write!(f, "{name}{instance}")
            }
            Term::Construct {
                ind,
                index,
                instance,
            } => match self
                .env
                .inductive(ind)
                .and_then(|decl| decl.constructor(*index))
            {
                Some(ctor) => write!(f, "{}{instance}", ctor.name),
                None => write!(f, "{ind}#{index}{instance}"),
            },
            Term::Int(n) => write!(f, "{n}"),
            Term::Float(x) => write!(f, "{x}"),
            Term::App { head, args } => {
                if parens {
                    f.write_str("(")?;
                }
                self.write_term(f, head, true)?;
                for arg in args {
                    f.write_str(" ")?;
                    self.write_term(f, arg, true)?;
                }
                if parens {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Term::Pi {
                binder,
                domain,
                codomain,
            } => {
                if parens {
                    f.write_str("(")?;
                }
                write!(f, "forall {binder} : ")?;
                self.write_term(f, domain, false)?;
                f.write_str(", ")?;
                self.write_term(f, codomain, false)?;
                if parens {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Term::Lambda {
                binder,
                domain,
                body,
            } => {
                if parens {
                    f.write_str("(")?;
                }
                write!(f, "fun {binder} : ")?;
                self.write_term(f, domain, false)?;
                f.write_str(" => ")?;
                self.write_term(f, body, false)?;
                if parens {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Term::Let {
                binder,
                value,
                ty,
                body,
            } => {
                if parens {
                    f.write_str("(")?;
                }
                write!(f, "let {binder} : ")?;
                self.write_term(f, ty, false)?;
                f.write_str(" := ")?;
                self.write_term(f, value, false)?;
                f.write_str(" in ")?;
                self.write_term(f, body, false)?;
                if parens {
                    f.write_str(")")?;
                }
                Ok(())
            }
        })
    }
}

impl fmt::Display for Pretty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_term(f, self.term, false)
    }
}
