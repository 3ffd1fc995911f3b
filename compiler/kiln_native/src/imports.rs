//! Header imports of generated code.
//!
//! A generated definitions file includes, in order: the runtime header for
//! the selected calling convention, the caller's imports, then its own
//! header. Imports reach the toolchain build-relative only; an absolute
//! path baked into generated source would not survive being moved to
//! another machine.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::options::CallingConvention;

/// A header the generated code depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Import {
    /// Found on the include path (`#include <name>`), typically from the
    /// runtime directory. Carries no object of its own.
    Library(String),
    /// Relative to the build directory (`#include "name"`). Its `.o`
    /// sibling is linked into the artifact.
    Build(String),
    /// An absolute path, rewritten to [`Import::Build`] before use.
    Absolute(PathBuf),
}

impl Import {
    /// Rewrite an absolute import relative to `build_dir`.
    ///
    /// Paths outside the build directory keep only their file name, which
    /// the build directory is then expected to provide.
    pub fn resolve(&self, build_dir: &Path) -> Import {
        let Import::Absolute(path) = self else {
            return self.clone();
        };
        if let Ok(relative) = path.strip_prefix(build_dir) {
            return Import::Build(relative.to_string_lossy().into_owned());
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::warn!(
            path = %path.display(),
            build_dir = %build_dir.display(),
            "absolute import outside the build directory; using its file name"
        );
        Import::Build(name)
    }

    /// Object file linked for this import, if any.
    ///
    /// Only build-relative headers have one: `foo.h` links `foo.o`.
    pub fn dependency_object(&self, build_dir: &Path) -> Option<PathBuf> {
        match self {
            Import::Build(name) => Some(build_dir.join(Path::new(name).with_extension("o"))),
            Import::Library(_) | Import::Absolute(_) => None,
        }
    }
}

impl fmt::Display for Import {
    /// The `#include` line for this import.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Import::Library(name) => write!(f, "#include <{name}>"),
            Import::Build(name) => write!(f, "#include \"{name}\""),
            Import::Absolute(path) => write!(f, "#include \"{}\"", path.display()),
        }
    }
}

/// The runtime header every generated file starts with.
pub fn runtime_import(convention: CallingConvention) -> Import {
    Import::Library(convention.runtime_header().to_string())
}

/// Runtime header followed by `imports`, each made build-relative.
pub fn resolve_imports(
    convention: CallingConvention,
    imports: &[Import],
    build_dir: &Path,
) -> Vec<Import> {
    std::iter::once(runtime_import(convention))
        .chain(imports.iter().map(|import| import.resolve(build_dir)))
        .collect()
}

/// Objects to link for resolved `imports`.
pub fn dependency_objects(imports: &[Import], build_dir: &Path) -> Vec<PathBuf> {
    imports
        .iter()
        .filter_map(|import| import.dependency_object(build_dir))
        .collect()
}
