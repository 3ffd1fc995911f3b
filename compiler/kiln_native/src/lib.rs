//! Kiln native evaluation
//!
//! Evaluates closed definitions of the proof assistant by compiling them to
//! C, building and loading the result, running it, and reading the machine
//! answer back as a term.
//!
//! # Architecture
//!
//! ```text
//! type ──→ classify ──→ ReifyableType ─────────────────────┐
//!                                                           ↓
//! program ─→ Compiler ─→ .c/.h ─→ Toolchain ─→ lib*.so ─→ Loader
//!                                                           ↓
//!                          ArtifactRegistry ←── register ── entry point
//!                                                           ↓
//!                                    RuntimeValue ──→ reify ──→ Term
//! ```
//!
//! - [`classify`]: from a static type, the constructor layout values of that
//!   type have at runtime
//! - [`fresh`]: collision-free native symbols
//! - [`registry`]: built artifacts, keyed by definition, reused across
//!   requests
//! - [`Evaluator`]: the pipeline and its cache-reuse rule
//! - [`reify`]: runtime values back to terms
//!
//! Code generation itself is behind the [`Compiler`] trait; the C toolchain
//! and dynamic loader are behind [`Toolchain`] and [`Loader`], with the
//! `cc` and `libloading` implementations provided.

pub mod classify;
mod compiler;
mod error;
pub mod fresh;
pub mod imports;
mod loader;
pub mod messages;
mod options;
mod pipeline;
pub mod registry;
pub mod reify;
pub mod toolchain;
pub mod value;

pub use classify::{CtorLayout, CtorSig, ReifyableType, TypeClassifier};
pub use compiler::{CompileOutcome, Compiler, Diagnostics, Modules};
pub use error::{EvalError, IllFormedValue, TypeError, ValueShape};
pub use imports::Import;
pub use loader::{DylibLoader, Loader};
pub use options::{
    ArtifactPaths, CallingConvention, DebugFlags, Options, OptionsBuilder, OptionsError,
    PrimitiveRegistration,
};
pub use pipeline::{Emitted, EvalRequest, Evaluation, Evaluator};
pub use registry::{Artifact, ArtifactRegistry, EntryPoint};
pub use reify::{reify, Reifier};
pub use toolchain::{CcToolchain, Toolchain, ToolchainConfig, ToolchainError};
pub use value::RuntimeValue;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=kiln_native=debug`; messages from generated code
/// use the `kiln::host` target. Set `KILN_LOG_TREE=1` for indented,
/// span-structured output.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
        // A subscriber installed by the embedding program wins.
        if std::env::var_os("KILN_LOG_TREE").is_some() {
            let _ = registry
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .try_init();
        } else {
            let _ = registry
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init();
        }
    });
}
