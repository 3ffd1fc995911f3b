//! Build orchestration.
//!
//! An evaluation moves through a fixed sequence of stages, each of which can
//! end the request with an error:
//!
//! ```text
//! Quoted ─→ Compiled ─→ Emitted ─→ Built ─→ Loaded ─→ Executed ─→ Decoded
//!   │                                                    ↑
//!   └──────────── identifier already registered ─────────┘
//! ```
//!
//! The type is classified before anything is built, so a value that could
//! never be read back costs no toolchain time. A registered identifier
//! skips straight to execution with the cached entry point; otherwise the
//! program is compiled under a fresh native symbol, emitted, built, loaded
//! and registered before it is first invoked.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use kiln_ir::{Environment, Term};

use crate::classify::{ReifyableType, TypeClassifier};
use crate::compiler::{CompileOutcome, Compiler, Diagnostics};
use crate::error::EvalError;
use crate::fresh::sanitize_symbol;
use crate::imports::{dependency_objects, resolve_imports, Import};
use crate::loader::Loader;
use crate::messages::{self, HostMessage};
use crate::options::{ArtifactPaths, Options};
use crate::registry::{Artifact, ArtifactRegistry};
use crate::reify::Reifier;
use crate::toolchain::{BuildJob, Toolchain};

/// A request to evaluate one closed definition.
pub struct EvalRequest<'a, P> {
    /// Qualified name of the definition; the cache key.
    pub id: &'a str,
    /// The quoted definition body.
    pub program: &'a P,
    /// Its type, which decides how the result is read back.
    pub ty: &'a Term,
    pub imports: &'a [Import],
}

/// The result of an evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub term: Term,
    /// Compiler output for this request; empty on a cache hit.
    pub diagnostics: Diagnostics,
    /// Whether a previously built artifact was reused.
    pub cached: bool,
    /// Wall-clock time of the native call, when timing is enabled.
    pub elapsed: Option<Duration>,
    /// Messages the generated code sent while running.
    pub messages: Vec<HostMessage>,
    /// Native symbol of the entry point that produced the value.
    pub symbol: String,
}

/// Files written by a compile-only request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emitted {
    pub source: PathBuf,
    pub header: PathBuf,
    /// Include lines written at the top of both files, in order.
    pub imports: Vec<Import>,
    pub diagnostics: Diagnostics,
}

/// Drives the native round trip for one configuration.
///
/// Evaluators sharing a registry share its cache: an identifier built by
/// one is reused by all. Builds are serialized through the registry, so
/// concurrent requests for the same identifier build it once even when
/// they arrive through different evaluators.
pub struct Evaluator<C, T, L> {
    compiler: C,
    toolchain: T,
    loader: L,
    options: Options,
    registry: Arc<ArtifactRegistry>,
}

impl<C, T, L> Evaluator<C, T, L>
where
    C: Compiler,
    T: Toolchain,
    L: Loader,
{
    pub fn new(
        compiler: C,
        toolchain: T,
        loader: L,
        options: Options,
        registry: Arc<ArtifactRegistry>,
    ) -> Self {
        Self {
            compiler,
            toolchain,
            loader,
            options,
            registry,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    /// Evaluate `request.program` natively and read the result back at
    /// `request.ty`.
    #[instrument(skip_all, fields(id = request.id), level = "debug")]
    pub fn evaluate(
        &self,
        env: &Environment,
        request: &EvalRequest<'_, C::Program>,
    ) -> Result<Evaluation, EvalError> {
        let classifier = TypeClassifier::new(env);
        let class = classifier.classify_result(request.ty)?;

        let (artifact, diagnostics, cached) = match self.registry.lookup(request.id) {
            Some(artifact) => (artifact, Diagnostics::new(), true),
            None => {
                let _build = self.registry.lock_builds();
                // Another request may have built it while we waited.
                match self.registry.lookup(request.id) {
                    Some(artifact) => (artifact, Diagnostics::new(), true),
                    None => {
                        let (artifact, diagnostics) = self.build(request)?;
                        (artifact, diagnostics, false)
                    }
                }
            }
        };
        if cached {
            tracing::debug!(symbol = artifact.symbol(), "reusing registered artifact");
        }

        self.finish(&classifier, &class, &artifact, diagnostics, cached)
    }

    /// Run the artifact registered under `id` and read its result at `ty`.
    #[instrument(skip(self, env, ty), level = "debug")]
    pub fn run_cached(
        &self,
        env: &Environment,
        id: &str,
        ty: &Term,
    ) -> Result<Evaluation, EvalError> {
        let classifier = TypeClassifier::new(env);
        let class = classifier.classify_result(ty)?;
        let artifact = self
            .registry
            .lookup(id)
            .ok_or_else(|| EvalError::NotFound { id: id.to_string() })?;
        self.finish(&classifier, &class, &artifact, Diagnostics::new(), true)
    }

    /// Compile `program` and write its source and header under the
    /// configured file stem, without building or running it.
    #[instrument(skip_all, level = "debug")]
    pub fn compile_only(
        &self,
        program: &C::Program,
        imports: &[Import],
    ) -> Result<Emitted, EvalError> {
        let outcome = self.compiler.compile(&self.options, program);
        self.emit(outcome, &self.options.paths(), imports)
    }

    /// Generate glue code for `declarations` into `glue.<stem><ext>.{c,h}`.
    #[instrument(skip_all, level = "debug")]
    pub fn generate_glue(
        &self,
        declarations: &C::Declarations,
        imports: &[Import],
    ) -> Result<Emitted, EvalError> {
        let outcome = self.compiler.generate_glue(&self.options, declarations);
        let paths = self
            .options
            .paths_for(&format!("glue.{}", self.options.file_stem()));
        self.emit(outcome, &paths, imports)
    }

    /// Generate foreign-call wrappers for `program` into
    /// `ffi.<stem><ext>.{c,h}`.
    #[instrument(skip_all, level = "debug")]
    pub fn generate_ffi(
        &self,
        program: &C::Program,
        imports: &[Import],
    ) -> Result<Emitted, EvalError> {
        let outcome = self.compiler.generate_ffi(&self.options, program);
        let paths = self
            .options
            .paths_for(&format!("ffi.{}", self.options.file_stem()));
        self.emit(outcome, &paths, imports)
    }

    /// Compile, emit, build, load and register. Caller holds the registry's
    /// build lock.
    fn build(
        &self,
        request: &EvalRequest<'_, C::Program>,
    ) -> Result<(Arc<Artifact>, Diagnostics), EvalError> {
        let base = sanitize_symbol(self.options.prefix(), request.id);
        let symbol = self.registry.reserve_symbol(&base);
        let options = self.options.for_artifact(&symbol);
        let paths = options.paths();
        tracing::debug!(%symbol, "building new artifact");

        let outcome = self.compiler.compile(&options, request.program);
        let emitted = self.emit(outcome, &paths, request.imports)?;

        match self.link_and_load(request.id, &symbol, &options, &paths, &emitted.imports) {
            Ok(artifact) => Ok((artifact, emitted.diagnostics)),
            Err(err) => Err(err.with_diagnostics(emitted.diagnostics)),
        }
    }

    /// Turn emitted files into a registered artifact.
    fn link_and_load(
        &self,
        id: &str,
        symbol: &str,
        options: &Options,
        paths: &ArtifactPaths,
        imports: &[Import],
    ) -> Result<Arc<Artifact>, EvalError> {
        let build_dir = options.output_dir();
        let deps = dependency_objects(imports, build_dir);
        let job = BuildJob {
            build_dir,
            source: &paths.source,
            object: &paths.object,
            library: &paths.library,
            dependency_objects: &deps,
            opt_level: options.opt_level(),
        };
        let start = Instant::now();
        self.toolchain.compile(&job)?;
        self.toolchain.link(&job)?;
        tracing::debug!(
            path = %paths.library.display(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "toolchain finished"
        );

        let entry = self.loader.load(&paths.library, symbol)?;
        Ok(self.registry.insert(Artifact::new(id, symbol, entry)))
    }

    /// Write the modules of a compiler call, or fail with its message.
    fn emit(
        &self,
        outcome: CompileOutcome<C>,
        paths: &ArtifactPaths,
        imports: &[Import],
    ) -> Result<Emitted, EvalError> {
        let CompileOutcome {
            result,
            diagnostics,
        } = outcome;
        for line in diagnostics.lines() {
            tracing::warn!(target: "kiln::compiler", "{line}");
        }
        let modules = match result {
            Ok(modules) => modules,
            Err(message) => {
                tracing::debug!(%message, "compilation failed");
                return Err(EvalError::Compile {
                    message,
                    diagnostics,
                });
            }
        };
        tracing::debug!(path = %paths.source.display(), "compiled");

        let imports = resolve_imports(
            self.options.convention(),
            imports,
            self.options.output_dir(),
        );
        let mut source_includes: Vec<String> = imports.iter().map(ToString::to_string).collect();
        let header_includes = source_includes.clone();
        source_includes.push(Import::Build(paths.header_name()).to_string());

        let written = self
            .write_module(&paths.header, &header_includes, &modules.header, &modules.names)
            .and_then(|()| {
                self.write_module(
                    &paths.source,
                    &source_includes,
                    &modules.definitions,
                    &modules.names,
                )
            });
        if let Err(err) = written {
            return Err(err.with_diagnostics(diagnostics));
        }
        tracing::debug!(
            source = %paths.source.display(),
            header = %paths.header.display(),
            "emitted"
        );

        Ok(Emitted {
            source: paths.source.clone(),
            header: paths.header.clone(),
            imports,
            diagnostics,
        })
    }

    fn write_module(
        &self,
        path: &Path,
        includes: &[String],
        module: &C::Module,
        names: &C::NameEnv,
    ) -> Result<(), EvalError> {
        let write = || -> io::Result<()> {
            let mut out = BufWriter::new(File::create(path)?);
            for line in includes {
                writeln!(out, "{line}")?;
            }
            writeln!(out)?;
            self.compiler.emit(module, names, &mut out)?;
            out.flush()
        };
        write().map_err(|source| EvalError::io(path, source))
    }

    /// Execute `artifact` and decode its result. A failure keeps the
    /// diagnostics of the build that produced the artifact.
    fn finish(
        &self,
        classifier: &TypeClassifier<'_>,
        class: &ReifyableType,
        artifact: &Artifact,
        diagnostics: Diagnostics,
        cached: bool,
    ) -> Result<Evaluation, EvalError> {
        match self.execute(classifier, class, artifact) {
            Ok(Executed {
                term,
                elapsed,
                messages,
            }) => Ok(Evaluation {
                term,
                diagnostics,
                cached,
                elapsed,
                messages,
                symbol: artifact.symbol().to_string(),
            }),
            Err(err) => Err(err.with_diagnostics(diagnostics)),
        }
    }

    fn execute(
        &self,
        classifier: &TypeClassifier<'_>,
        class: &ReifyableType,
        artifact: &Artifact,
    ) -> Result<Executed, EvalError> {
        messages::reset();
        let start = Instant::now();
        let value = artifact.invoke();
        let elapsed = start.elapsed();
        let messages = messages::take_messages();
        if let Some(message) = messages::take_fatal() {
            return Err(EvalError::Fatal { message });
        }
        let value = value?;
        tracing::debug!(symbol = artifact.symbol(), "executed");

        let elapsed = self.options.timing().then(|| {
            tracing::info!(
                id = artifact.id(),
                symbol = artifact.symbol(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "native evaluation finished"
            );
            elapsed
        });

        let term = Reifier::new(classifier).reify(class, &value)?;
        tracing::debug!(symbol = artifact.symbol(), "decoded");

        Ok(Executed {
            term,
            elapsed,
            messages,
        })
    }
}

/// What one run of an entry point produced.
struct Executed {
    term: Term,
    elapsed: Option<Duration>,
    messages: Vec<HostMessage>,
}

