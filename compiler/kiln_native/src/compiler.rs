//! The code-generation capability.
//!
//! Lowering a quoted program to C is not this crate's business. The
//! pipeline drives whatever implements [`Compiler`]: it asks for a pair of
//! modules (definitions and header), then has the compiler print each one
//! into a file the pipeline opened and prefixed with the `#include` lines.

use std::fmt;
use std::io;

use crate::options::Options;

/// Log text a compiler produced, one entry per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    lines: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// The two modules of one compilation and the names they were built with.
pub struct Modules<C: Compiler + ?Sized> {
    pub definitions: C::Module,
    pub header: C::Module,
    pub names: C::NameEnv,
}

/// Result of a compiler call.
///
/// Diagnostics are returned whether or not compilation succeeded.
pub struct CompileOutcome<C: Compiler + ?Sized> {
    pub result: Result<Modules<C>, String>,
    pub diagnostics: Diagnostics,
}

impl<C: Compiler + ?Sized> CompileOutcome<C> {
    pub fn ok(modules: Modules<C>, diagnostics: Diagnostics) -> Self {
        Self {
            result: Ok(modules),
            diagnostics,
        }
    }

    pub fn failed(message: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self {
            result: Err(message.into()),
            diagnostics,
        }
    }
}

/// Lowers quoted programs to C modules.
pub trait Compiler {
    /// A closed, quoted program.
    type Program;
    /// A generated C module.
    type Module;
    /// Names chosen while compiling, needed to print the modules.
    type NameEnv;
    /// Inductive declarations to generate glue code for.
    type Declarations;

    /// Compile `program` to a definitions module and a header module.
    fn compile(&self, options: &Options, program: &Self::Program) -> CompileOutcome<Self>;

    /// Print `module` into `out`. The `#include` lines are already written.
    fn emit(
        &self,
        module: &Self::Module,
        names: &Self::NameEnv,
        out: &mut dyn io::Write,
    ) -> io::Result<()>;

    /// Constructor/projection helpers for foreign code working with values
    /// of `declarations`.
    fn generate_glue(
        &self,
        options: &Options,
        declarations: &Self::Declarations,
    ) -> CompileOutcome<Self>;

    /// Wrappers exposing `program`'s functions to foreign callers.
    fn generate_ffi(&self, options: &Options, program: &Self::Program) -> CompileOutcome<Self>;
}
