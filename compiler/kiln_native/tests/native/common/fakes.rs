//! In-process stand-ins for the compiler, the C toolchain and the loader.
//!
//! The fake compiler records each compiled [`Program`] under the entry
//! symbol it was asked to generate; the fake loader resolves that symbol
//! back to the program, so the value an entry point returns is whatever the
//! test put in the program. The toolchain writes real (empty) object and
//! library files, and the loader refuses libraries that do not exist, so
//! the paths flowing between stages are checked too.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tempfile::TempDir;

use kiln_ir::{prelude, Environment, Term};
use kiln_native::messages::{self, MessageLevel};
use kiln_native::toolchain::{BuildJob, ProcessStatus, ToolchainStage};
use kiln_native::{
    ArtifactRegistry, CompileOutcome, Compiler, Diagnostics, EntryPoint, EvalError, EvalRequest,
    Evaluation, Evaluator, Import, Loader, Modules, Options, OptionsBuilder, RuntimeValue,
    Toolchain, ToolchainError,
};

/// What the fake compiler compiles: the behavior of the entry point.
#[derive(Clone, Debug)]
pub struct Program {
    value: RuntimeValue,
    failure: Option<String>,
    diagnostics: Vec<String>,
    messages: Vec<(MessageLevel, String)>,
    fatal: Option<String>,
}

impl Program {
    /// An entry point returning `value`.
    pub fn returning(value: RuntimeValue) -> Self {
        Self {
            value,
            failure: None,
            diagnostics: Vec::new(),
            messages: Vec::new(),
            fatal: None,
        }
    }

    /// A program the compiler rejects with `message`.
    #[must_use]
    pub fn rejected(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn with_diagnostic(mut self, line: &str) -> Self {
        self.diagnostics.push(line.to_string());
        self
    }

    /// Send `text` through the host channel when run.
    #[must_use]
    pub fn posting(mut self, level: MessageLevel, text: &str) -> Self {
        self.messages.push((level, text.to_string()));
        self
    }

    /// Raise a fatal error through the host channel when run.
    #[must_use]
    pub fn raising(mut self, message: &str) -> Self {
        self.fatal = Some(message.to_string());
        self
    }

    fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.iter().cloned().collect()
    }
}

/// How many times each stage ran.
#[derive(Debug, Default)]
pub struct Counters {
    compiles: AtomicUsize,
    cc_compiles: AtomicUsize,
    links: AtomicUsize,
    loads: AtomicUsize,
    invocations: AtomicUsize,
}

impl Counters {
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Toolchain process calls, compile and link together.
    pub fn toolchain_calls(&self) -> usize {
        self.cc_compiles.load(Ordering::SeqCst) + self.links.load(Ordering::SeqCst)
    }

    pub fn links(&self) -> usize {
        self.links.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

type Table = Arc<Mutex<FxHashMap<String, Program>>>;

pub struct FakeCompiler {
    table: Table,
    counters: Arc<Counters>,
}

impl FakeCompiler {
    fn modules(&self, program: &Program, symbol: &str, body: String) -> CompileOutcome<Self> {
        bump(&self.counters.compiles);
        if let Some(message) = &program.failure {
            return CompileOutcome::failed(message.clone(), program.diagnostics());
        }
        self.table.lock().insert(symbol.to_string(), program.clone());
        CompileOutcome::ok(
            Modules {
                definitions: body,
                header: format!("value {symbol}(void);"),
                names: symbol.to_string(),
            },
            program.diagnostics(),
        )
    }
}

impl Compiler for FakeCompiler {
    type Program = Program;
    type Module = String;
    type NameEnv = String;
    type Declarations = Vec<String>;

    fn compile(&self, options: &Options, program: &Program) -> CompileOutcome<Self> {
        let symbol = options.toplevel_name();
        self.modules(program, symbol, format!("value {symbol}(void) {{ /* ... */ }}"))
    }

    fn emit(&self, module: &String, names: &String, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "/* names: {names} */")?;
        writeln!(out, "{module}")
    }

    fn generate_glue(&self, options: &Options, declarations: &Vec<String>) -> CompileOutcome<Self> {
        let body = declarations
            .iter()
            .map(|ty| format!("value make_{ty}(void);"))
            .collect::<Vec<_>>()
            .join("\n");
        self.modules(
            &Program::returning(RuntimeValue::Immediate(0)),
            options.file_stem(),
            body,
        )
    }

    fn generate_ffi(&self, options: &Options, program: &Program) -> CompileOutcome<Self> {
        self.modules(program, options.file_stem(), "/* ffi wrappers */".to_string())
    }
}

pub struct FakeToolchain {
    counters: Arc<Counters>,
    failing_link: bool,
    /// Time each object compile takes.
    compile_delay: Option<Duration>,
}

impl FakeToolchain {
    /// Links succeed and compiles return at once.
    fn default_behavior() -> (bool, Option<Duration>) {
        (false, None)
    }

    fn touch(stage: ToolchainStage, path: &Path) -> Result<(), ToolchainError> {
        std::fs::write(path, b"").map_err(|source| ToolchainError::Spawn {
            stage,
            program: "fake-cc".to_string(),
            source,
        })
    }
}

impl Toolchain for FakeToolchain {
    fn compile(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError> {
        bump(&self.counters.cc_compiles);
        assert!(job.source.exists(), "source was not emitted before compiling");
        if let Some(delay) = self.compile_delay {
            std::thread::sleep(delay);
        }
        Self::touch(ToolchainStage::Compile, job.object)
    }

    fn link(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError> {
        bump(&self.counters.links);
        if self.failing_link {
            return Err(ToolchainError::Failed {
                stage: ToolchainStage::Link,
                status: ProcessStatus::Code(1),
                command: format!("fake-cc -shared -o {}", job.library.display()),
                stderr: "undefined reference to `prim_add'".to_string(),
            });
        }
        Self::touch(ToolchainStage::Link, job.library)
    }
}

pub struct FakeLoader {
    table: Table,
    counters: Arc<Counters>,
}

impl Loader for FakeLoader {
    fn load(&self, library: &Path, symbol: &str) -> Result<Box<dyn EntryPoint>, EvalError> {
        bump(&self.counters.loads);
        if !library.exists() {
            return Err(EvalError::Load {
                path: library.to_path_buf(),
                message: "no such file".to_string(),
            });
        }
        let program = self
            .table
            .lock()
            .get(symbol)
            .cloned()
            .ok_or_else(|| EvalError::Load {
                path: library.to_path_buf(),
                message: format!("undefined symbol: {symbol}"),
            })?;
        Ok(Box::new(FakeEntry {
            program,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeEntry {
    program: Program,
    counters: Arc<Counters>,
}

impl EntryPoint for FakeEntry {
    fn invoke(&self) -> Result<RuntimeValue, EvalError> {
        bump(&self.counters.invocations);
        for (level, text) in &self.program.messages {
            messages::post(*level, text);
        }
        if let Some(message) = &self.program.fatal {
            messages::raise_fatal(message);
        }
        Ok(self.program.value.clone())
    }
}

fn fresh_registry() -> Arc<ArtifactRegistry> {
    Arc::new(ArtifactRegistry::new())
}

pub type FakeEvaluator = Evaluator<FakeCompiler, FakeToolchain, FakeLoader>;

/// An evaluator over fakes, a temporary build directory and the prelude.
pub struct Harness {
    pub dir: TempDir,
    pub env: Environment,
    pub counters: Arc<Counters>,
    pub evaluator: FakeEvaluator,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(|options| options, FakeToolchain::default_behavior(), fresh_registry())
    }

    pub fn with_options(configure: impl FnOnce(OptionsBuilder) -> OptionsBuilder) -> Self {
        Self::build(configure, FakeToolchain::default_behavior(), fresh_registry())
    }

    /// A harness whose link step always fails.
    pub fn with_failing_link() -> Self {
        Self::build(|options| options, (true, None), fresh_registry())
    }

    /// A harness sharing `registry` with other evaluators.
    pub fn sharing(registry: Arc<ArtifactRegistry>) -> Self {
        Self::build(|options| options, FakeToolchain::default_behavior(), registry)
    }

    /// A harness sharing `registry` whose object compiles take `delay`.
    pub fn sharing_slow(registry: Arc<ArtifactRegistry>, delay: Duration) -> Self {
        Self::build(|options| options, (false, Some(delay)), registry)
    }

    fn build(
        configure: impl FnOnce(OptionsBuilder) -> OptionsBuilder,
        (failing_link, compile_delay): (bool, Option<Duration>),
        registry: Arc<ArtifactRegistry>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let options = configure(Options::builder(dir.path())).build().unwrap();
        let counters = Arc::new(Counters::default());
        let table = Table::default();
        let evaluator = Evaluator::new(
            FakeCompiler {
                table: Arc::clone(&table),
                counters: Arc::clone(&counters),
            },
            FakeToolchain {
                counters: Arc::clone(&counters),
                failing_link,
                compile_delay,
            },
            FakeLoader {
                table,
                counters: Arc::clone(&counters),
            },
            options,
            registry,
        );
        Self {
            dir,
            env: prelude::environment(),
            counters,
            evaluator,
        }
    }

    /// Evaluate `program` as definition `id` at type `ty`, without imports.
    pub fn eval(&self, id: &str, program: &Program, ty: &Term) -> Result<Evaluation, EvalError> {
        self.eval_with_imports(id, program, ty, &[])
    }

    pub fn eval_with_imports(
        &self,
        id: &str,
        program: &Program,
        ty: &Term,
        imports: &[Import],
    ) -> Result<Evaluation, EvalError> {
        let request = EvalRequest {
            id,
            program,
            ty,
            imports,
        };
        self.evaluator.evaluate(&self.env, &request)
    }

    /// Contents of a file in the build directory.
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap()
    }
}
