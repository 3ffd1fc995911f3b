//! Kiln IR - the host assistant's term model
//!
//! The native evaluator consumes and produces terms of the proof assistant it
//! runs inside. This crate carries exactly the part of that term language the
//! round trip needs:
//!
//! - [`Term`]: de Bruijn terms with spine-form applications and primitive
//!   integer/float literals
//! - [`Environment`]: inductive declarations (with their constructor order),
//!   transparent definitions and registered primitive type constants
//! - [`subst`]: lifting and instantiation, used to specialize constructor
//!   field types to concrete parameters
//! - [`whnf`]: head reduction with a step budget, used to see through type
//!   aliases
//! - [`prelude`]: the everyday datatypes, for sessions and tests
//!
//! Elaboration and type checking live in the assistant itself; nothing here
//! checks that a term is well typed.

mod display;
mod env;
mod name;
pub mod prelude;
mod reduce;
mod stack;
pub mod subst;
mod term;

pub use display::Pretty;
pub use env::{ConstructorDecl, Definition, Environment, InductiveDecl, PrimitiveKind};
pub use name::{Instance, Name};
pub use reduce::{whnf, Fuel, ReduceError};
pub use stack::ensure_sufficient_stack;
pub use term::{Float64, Sort, Term};
