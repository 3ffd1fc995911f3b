//! External C toolchain.
//!
//! Every build is two blocking process calls: compile the emitted source to
//! an object, then link that object with the runtime and the imports'
//! objects into a loadable shared library.
//!
//! ```text
//! cc -I <build> -I <runtime> -O<n> -fPIC -c -o <obj> <src>
//! cc -L <build> -L <runtime> -shared -o <lib> <runtime objects> <obj> <deps>
//! ```
//!
//! A failing step is reported with everything needed to reproduce it by
//! hand: stage, exit status, the full command line and captured stderr.
//! Nothing is retried.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

/// Environment variable naming the C compiler.
pub const CC_ENV: &str = "KILN_CC";
/// Environment variable naming the runtime directory.
pub const RUNTIME_DIR_ENV: &str = "KILN_RUNTIME_DIR";

/// Which of the two toolchain calls failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolchainStage {
    Compile,
    Link,
}

impl fmt::Display for ToolchainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolchainStage::Compile => "compile",
            ToolchainStage::Link => "link",
        })
    }
}

/// How a toolchain process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl From<ExitStatus> for ProcessStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ProcessStatus::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ProcessStatus::Signal(signal);
            }
        }
        ProcessStatus::Unknown
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Code(code) => write!(f, "exit code {code}"),
            ProcessStatus::Signal(signal) => write!(f, "killed by signal {signal}"),
            ProcessStatus::Unknown => f.write_str("unknown status"),
        }
    }
}

/// Toolchain failure.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{stage} step failed ({status})\n\ncommand: {command}\n\nstderr:\n{stderr}")]
    Failed {
        stage: ToolchainStage,
        status: ProcessStatus,
        command: String,
        stderr: String,
    },

    #[error("could not run `{program}` for the {stage} step: {source}")]
    Spawn {
        stage: ToolchainStage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runtime directory not found (set KILN_RUNTIME_DIR); searched: {}", display_paths(.searched))]
    RuntimeNotFound { searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compiler program and runtime location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolchainConfig {
    cc: PathBuf,
    runtime_dir: PathBuf,
    runtime_objects: Vec<PathBuf>,
}

impl ToolchainConfig {
    pub fn new(cc: impl Into<PathBuf>, runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            cc: cc.into(),
            runtime_dir: runtime_dir.into(),
            runtime_objects: Vec::new(),
        }
    }

    /// Link `object` into every artifact, before the artifact's own object.
    #[must_use]
    pub fn with_runtime_object(mut self, object: impl Into<PathBuf>) -> Self {
        self.runtime_objects.push(object.into());
        self
    }

    /// Configuration from the environment.
    ///
    /// The compiler is `$KILN_CC`, else `cc`. The runtime directory is
    /// `$KILN_RUNTIME_DIR`, else `../lib/kiln/runtime` next to the running
    /// executable. Every `.o` file in the runtime directory is a runtime
    /// object, linked in file-name order.
    pub fn detect() -> Result<Self, ToolchainError> {
        let cc = std::env::var_os(CC_ENV).map_or_else(|| PathBuf::from("cc"), PathBuf::from);

        let mut searched = Vec::new();
        let runtime_dir = if let Some(dir) = std::env::var_os(RUNTIME_DIR_ENV) {
            Some(PathBuf::from(dir))
        } else {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join("../lib/kiln/runtime")))
        };
        let runtime_dir = match runtime_dir {
            Some(dir) if dir.is_dir() => dir,
            Some(dir) => {
                searched.push(dir);
                return Err(ToolchainError::RuntimeNotFound { searched });
            }
            None => return Err(ToolchainError::RuntimeNotFound { searched }),
        };

        let mut config = Self::new(cc, &runtime_dir);
        config.runtime_objects = runtime_objects_in(&runtime_dir);
        tracing::debug!(
            cc = %config.cc.display(),
            runtime_dir = %config.runtime_dir.display(),
            objects = config.runtime_objects.len(),
            "detected toolchain"
        );
        Ok(config)
    }

    pub fn cc(&self) -> &Path {
        &self.cc
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn runtime_objects(&self) -> &[PathBuf] {
        &self.runtime_objects
    }
}

fn runtime_objects_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot list runtime directory");
        return Vec::new();
    };
    let mut objects: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension() == Some(OsStr::new("o")))
        .collect();
    objects.sort();
    objects
}

/// Inputs and outputs of one build.
#[derive(Clone, Copy, Debug)]
pub struct BuildJob<'a> {
    pub build_dir: &'a Path,
    pub source: &'a Path,
    pub object: &'a Path,
    pub library: &'a Path,
    pub dependency_objects: &'a [PathBuf],
    pub opt_level: u8,
}

/// Turns emitted C into a loadable library.
pub trait Toolchain {
    /// Compile `job.source` to `job.object`.
    fn compile(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError>;

    /// Link `job.object` and its dependencies into `job.library`.
    fn link(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError>;
}

/// A `cc`-compatible driver (gcc, clang).
#[derive(Clone, Debug)]
pub struct CcToolchain {
    config: ToolchainConfig,
}

impl CcToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    pub fn compile_command(&self, job: &BuildJob<'_>) -> Command {
        let mut cmd = Command::new(&self.config.cc);
        cmd.arg("-I")
            .arg(job.build_dir)
            .arg("-I")
            .arg(&self.config.runtime_dir)
            .arg(format!("-O{}", job.opt_level))
            .arg("-fPIC")
            .arg("-c")
            .arg("-o")
            .arg(job.object)
            .arg(job.source);
        cmd
    }

    pub fn link_command(&self, job: &BuildJob<'_>) -> Command {
        let mut cmd = Command::new(&self.config.cc);
        cmd.arg("-L")
            .arg(job.build_dir)
            .arg("-L")
            .arg(&self.config.runtime_dir)
            .arg("-shared")
            .arg("-o")
            .arg(job.library)
            .args(&self.config.runtime_objects)
            .arg(job.object)
            .args(job.dependency_objects);
        cmd
    }

    fn run(stage: ToolchainStage, mut cmd: Command) -> Result<(), ToolchainError> {
        let command = render_command(&cmd);
        tracing::debug!(%stage, %command, "running toolchain");

        let output = cmd.output().map_err(|source| ToolchainError::Spawn {
            stage,
            program: cmd.get_program().to_string_lossy().into_owned(),
            source,
        })?;
        if output.status.success() {
            return Ok(());
        }
        Err(ToolchainError::Failed {
            stage,
            status: output.status.into(),
            command,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Toolchain for CcToolchain {
    fn compile(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError> {
        Self::run(ToolchainStage::Compile, self.compile_command(job))
    }

    fn link(&self, job: &BuildJob<'_>) -> Result<(), ToolchainError> {
        Self::run(ToolchainStage::Link, self.link_command(job))
    }
}

/// A command line as a user would type it.
pub fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
