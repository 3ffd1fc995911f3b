//! Backend options.
//!
//! [`Options`] is built once per invocation through [`OptionsBuilder`],
//! validated on [`OptionsBuilder::build`], and never mutated afterwards. Per
//! artifact settings (file stem and entry symbol of an evaluation build) are
//! derived as a new record with [`Options::for_artifact`].

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use kiln_ir::Name;
use thiserror::Error;

bitflags! {
    /// Diagnostic toggles forwarded to the compiler and the orchestrator.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DebugFlags: u8 {
        /// Ask the compiler for debug output in its diagnostics.
        const DEBUG = 1 << 0;
        /// Wall-clock the native entry point.
        const TIMING = 1 << 1;
        /// Ask the compiler to time its intermediate (ANF) passes.
        const TIMING_ANF = 1 << 2;
    }
}

/// Calling convention of the generated code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Continuation-passing style, collected by the heap-only runtime.
    Cps,
    /// Direct style with a shadow stack for GC roots.
    #[default]
    Direct,
}

impl CallingConvention {
    /// Runtime header every generated file includes first.
    pub fn runtime_header(self) -> &'static str {
        match self {
            CallingConvention::Cps => "gc.h",
            CallingConvention::Direct => "gc_stack.h",
        }
    }
}

/// Binding of a host constant to a native symbol the generated code calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimitiveRegistration {
    pub constant: Name,
    pub symbol: String,
}

impl PrimitiveRegistration {
    pub fn new(constant: impl Into<Name>, symbol: impl Into<String>) -> Self {
        Self {
            constant: constant.into(),
            symbol: symbol.into(),
        }
    }
}

/// Invalid option values.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("output directory `{}` does not exist", .0.display())]
    MissingOutputDir(PathBuf),
    #[error("output path `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("optimization level {0} is out of range (0-3)")]
    OptLevel(u8),
    #[error("file-name stem must not be empty")]
    EmptyFileStem,
    #[error("entry symbol must not be empty")]
    EmptyEntrySymbol,
    #[error("`{0}` is not a valid C identifier fragment")]
    InvalidIdentifier(String),
}

/// Validated backend options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    convention: CallingConvention,
    opt_level: u8,
    flags: DebugFlags,
    arg_hint: u32,
    output_dir: PathBuf,
    extension: String,
    prefix: String,
    toplevel_name: String,
    file_stem: String,
    primitives: Vec<PrimitiveRegistration>,
}

impl Options {
    /// Start building options that write into `output_dir`.
    pub fn builder(output_dir: impl Into<PathBuf>) -> OptionsBuilder {
        OptionsBuilder::new(output_dir)
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn opt_level(&self) -> u8 {
        self.opt_level
    }

    pub fn flags(&self) -> DebugFlags {
        self.flags
    }

    pub fn timing(&self) -> bool {
        self.flags.contains(DebugFlags::TIMING)
    }

    /// Hint for how many arguments the backend may pass in registers.
    pub fn arg_hint(&self) -> u32 {
        self.arg_hint
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Tag appended to every generated file name before its suffix.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Prefix prepended to every generated symbol.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the generated entry function.
    pub fn toplevel_name(&self) -> &str {
        &self.toplevel_name
    }

    pub fn file_stem(&self) -> &str {
        &self.file_stem
    }

    pub fn primitives(&self) -> &[PrimitiveRegistration] {
        &self.primitives
    }

    /// Options for one evaluation artifact: same settings, with `stem` as
    /// both file-name stem and entry symbol.
    #[must_use]
    pub fn for_artifact(&self, stem: &str) -> Options {
        Options {
            file_stem: stem.to_string(),
            toplevel_name: stem.to_string(),
            ..self.clone()
        }
    }

    /// Paths of the files generated for `stem` (with this record's
    /// extension tag).
    pub fn paths_for(&self, stem: &str) -> ArtifactPaths {
        let base = format!("{stem}{}", self.extension);
        ArtifactPaths {
            source: self.output_dir.join(format!("{base}.c")),
            header: self.output_dir.join(format!("{base}.h")),
            object: self.output_dir.join(format!("{base}.o")),
            library: self
                .output_dir
                .join(format!("lib{base}.{}", std::env::consts::DLL_EXTENSION)),
        }
    }

    /// Paths of the files generated under this record's own stem.
    pub fn paths(&self) -> ArtifactPaths {
        self.paths_for(&self.file_stem)
    }
}

/// File locations of one generated artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub source: PathBuf,
    pub header: PathBuf,
    pub object: PathBuf,
    pub library: PathBuf,
}

impl ArtifactPaths {
    /// File name of the header, as the definitions file includes it.
    pub fn header_name(&self) -> String {
        self.header
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builder for [`Options`].
#[derive(Clone, Debug)]
pub struct OptionsBuilder {
    convention: CallingConvention,
    opt_level: u8,
    flags: DebugFlags,
    arg_hint: u32,
    output_dir: PathBuf,
    extension: String,
    prefix: String,
    toplevel_name: String,
    file_stem: String,
    primitives: Vec<PrimitiveRegistration>,
}

impl OptionsBuilder {
    fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            convention: CallingConvention::default(),
            opt_level: 1,
            flags: DebugFlags::empty(),
            arg_hint: 5,
            output_dir: output_dir.into(),
            extension: String::new(),
            prefix: String::new(),
            toplevel_name: "body".to_string(),
            file_stem: "program".to_string(),
            primitives: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    #[must_use]
    pub fn with_opt_level(mut self, level: u8) -> Self {
        self.opt_level = level;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: DebugFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_arg_hint(mut self, hint: u32) -> Self {
        self.arg_hint = hint;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_toplevel_name(mut self, name: impl Into<String>) -> Self {
        self.toplevel_name = name.into();
        self
    }

    #[must_use]
    pub fn with_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }

    #[must_use]
    pub fn with_primitive(mut self, registration: PrimitiveRegistration) -> Self {
        self.primitives.push(registration);
        self
    }

    /// Validate and freeze the options.
    pub fn build(self) -> Result<Options, OptionsError> {
        if !self.output_dir.exists() {
            return Err(OptionsError::MissingOutputDir(self.output_dir));
        }
        if !self.output_dir.is_dir() {
            return Err(OptionsError::NotADirectory(self.output_dir));
        }
        if self.opt_level > 3 {
            return Err(OptionsError::OptLevel(self.opt_level));
        }
        if self.file_stem.is_empty() {
            return Err(OptionsError::EmptyFileStem);
        }
        if self.toplevel_name.is_empty() {
            return Err(OptionsError::EmptyEntrySymbol);
        }
        for fragment in [&self.prefix, &self.toplevel_name] {
            if !is_identifier_fragment(fragment) {
                return Err(OptionsError::InvalidIdentifier(fragment.clone()));
            }
        }
        Ok(Options {
            convention: self.convention,
            opt_level: self.opt_level,
            flags: self.flags,
            arg_hint: self.arg_hint,
            output_dir: self.output_dir,
            extension: self.extension,
            prefix: self.prefix,
            toplevel_name: self.toplevel_name,
            file_stem: self.file_stem,
            primitives: self.primitives,
        })
    }
}

fn is_identifier_fragment(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
