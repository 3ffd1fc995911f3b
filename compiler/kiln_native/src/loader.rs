//! Loading built artifacts.

#![allow(
    unsafe_code,
    reason = "loading a shared library and calling into it is inherently unsafe"
)]

use std::path::Path;

use crate::error::EvalError;
use crate::messages;
use crate::registry::EntryPoint;
use crate::value::raw::RawValue;
use crate::value::RuntimeValue;

/// Resolves the entry point of a built library.
pub trait Loader {
    fn load(&self, library: &Path, symbol: &str) -> Result<Box<dyn EntryPoint>, EvalError>;
}

/// Loads artifacts with the platform's dynamic loader.
///
/// The library stays mapped for as long as the returned entry point lives;
/// registered artifacts live for the rest of the process.
#[derive(Clone, Copy, Debug, Default)]
pub struct DylibLoader;

type EntryFn = unsafe extern "C" fn() -> usize;

struct NativeEntry {
    entry: EntryFn,
    // Declared after `entry` so the library is unloaded last.
    _library: libloading::Library,
}

impl Loader for DylibLoader {
    fn load(&self, library: &Path, symbol: &str) -> Result<Box<dyn EntryPoint>, EvalError> {
        let load_error = |err: libloading::Error| EvalError::Load {
            path: library.to_path_buf(),
            message: err.to_string(),
        };

        // SAFETY: the library was just built from generated code; its
        // initializers are the C runtime's and have no preconditions.
        let lib = unsafe { libloading::Library::new(library) }.map_err(load_error)?;
        // SAFETY: the compiler emits the entry symbol as a zero-argument
        // function returning one value word.
        let entry = unsafe { lib.get::<EntryFn>(symbol.as_bytes()) }
            .map(|sym| *sym)
            .map_err(load_error)?;

        tracing::debug!(path = %library.display(), symbol, "loaded artifact");
        Ok(Box::new(NativeEntry {
            entry,
            _library: lib,
        }))
    }
}

impl EntryPoint for NativeEntry {
    fn invoke(&self) -> Result<RuntimeValue, EvalError> {
        // SAFETY: `entry` comes from a library kept alive by `self`.
        let word = unsafe { (self.entry)() };

        // After a fatal error the returned word is meaningless.
        if let Some(message) = messages::take_fatal() {
            return Err(EvalError::Fatal { message });
        }
        // SAFETY: the runtime returned this word, and nothing runs on this
        // thread (so nothing collects) until it has been copied out.
        let raw = unsafe { RawValue::from_word(word) };
        Ok(raw.read()?)
    }
}
