//! Error taxonomy for native evaluation.
//!
//! Every variant is terminal for the evaluation request that raised it;
//! nothing in the pipeline retries.

use std::fmt;
use std::path::PathBuf;

use kiln_ir::{Name, PrimitiveKind, ReduceError};
use thiserror::Error;

use crate::compiler::Diagnostics;
use crate::options::OptionsError;
use crate::toolchain::ToolchainError;

/// Any failure of an evaluation request.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The compiler capability rejected the program. The diagnostics it
    /// produced before failing are kept.
    #[error("compilation failed: {message}")]
    Compile {
        message: String,
        diagnostics: Diagnostics,
    },

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    IllFormedValue(#[from] IllFormedValue),

    #[error("no compiled artifact is registered under `{id}`")]
    NotFound { id: String },

    #[error("failed to load `{}`: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),

    /// Generated code reported a fatal error through the host channel.
    #[error("native code raised a fatal error: {message}")]
    Fatal { message: String },

    /// A stage after a successful compile failed. The compiler's
    /// diagnostics for the program are kept alongside the failure.
    #[error("{source}")]
    Build {
        diagnostics: Diagnostics,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the diagnostics of the compile that preceded this failure.
    ///
    /// Empty diagnostics, and errors that already carry their own, are
    /// returned unchanged.
    #[must_use]
    pub fn with_diagnostics(self, diagnostics: Diagnostics) -> Self {
        if diagnostics.is_empty()
            || matches!(self, EvalError::Compile { .. } | EvalError::Build { .. })
        {
            return self;
        }
        EvalError::Build {
            diagnostics,
            source: Box::new(self),
        }
    }

    /// The failure itself, without the diagnostics wrapper.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::Build { source, .. } => source.root(),
            other => other,
        }
    }

    /// Compiler diagnostics attached to this error, if any.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            EvalError::Compile { diagnostics, .. } | EvalError::Build { diagnostics, .. } => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

/// A type the evaluator cannot read values of.
///
/// Types are carried pre-rendered so the error outlives the environment.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("cannot evaluate at type `{ty}`: it is neither an inductive type nor a primitive type")]
    NotReifyable { ty: String },

    #[error("inductive `{name}` is not declared in the environment")]
    UnknownInductive { name: Name },

    #[error("`{ty}` applies inductive `{name}` to {found} arguments, but it has {expected} parameters")]
    MissingParameters {
        ty: String,
        name: Name,
        expected: usize,
        found: usize,
    },

    #[error(
        "inductive `{name}` has {count} constructors with fields; \
         the runtime distinguishes at most {max}"
    )]
    UnsupportedLayout { name: Name, count: usize, max: usize },

    #[error("values of primitive {kind} type `{ty}` cannot be read back")]
    UnsupportedPrimitive { ty: String, kind: PrimitiveKind },

    #[error("could not reduce `{ty}`: {source}")]
    Reduce {
        ty: String,
        #[source]
        source: ReduceError,
    },
}

/// Whether a runtime value was an immediate or a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Immediate,
    Block,
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueShape::Immediate => "immediate",
            ValueShape::Block => "block",
        })
    }
}

/// A runtime value that does not fit its declared type.
///
/// This means the decoder's model of the backend's data layout no longer
/// matches what the backend produced. Each variant carries the type, the raw
/// tag or ordinal, and the size of the constructor class it was looked up in.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IllFormedValue {
    #[error(
        "block with tag {tag} at type `{ty}`: the type has only {available} \
         constructors with fields"
    )]
    BlockTag {
        ty: String,
        tag: u8,
        available: usize,
    },

    #[error(
        "immediate with ordinal {ordinal} at type `{ty}`: the type has only \
         {available} constructors without fields"
    )]
    ImmediateOrdinal {
        ty: String,
        ordinal: i64,
        available: usize,
    },

    #[error(
        "block with tag {tag} at type `{ty}` has {found} fields, but constructor \
         `{constructor}` takes {expected}"
    )]
    FieldCount {
        ty: String,
        constructor: Name,
        tag: u8,
        expected: usize,
        found: usize,
    },

    /// An integer that is not an immediate, or a float that is not a boxed
    /// double. `raw` is the immediate itself or the block's tag.
    #[error("{shape} value at primitive type `{ty}` (raw {raw}) is not laid out as that type")]
    ScalarShape {
        ty: String,
        shape: ValueShape,
        raw: i64,
    },

    #[error("null pointer where a block was expected")]
    NullBlock,
}
