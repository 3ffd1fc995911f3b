//! Compiled-artifact registry.
//!
//! Process-wide, append-only map from a definition's qualified name to the
//! entry point built for it. An identifier is registered at most once and
//! never replaced or removed; the registry also owns the set of native
//! symbol names handed out, so two builds can never share a symbol.
//!
//! The registry is an explicit object, created once and shared through an
//! `Arc` by every [`Evaluator`](crate::Evaluator) that should see the same
//! cache. It also carries the lock that serializes builds, so evaluators
//! sharing a registry never build the same identifier twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::EvalError;
use crate::fresh::freshen_with;
use crate::value::RuntimeValue;

/// A loaded zero-argument native function returning one value.
pub trait EntryPoint: Send + Sync {
    fn invoke(&self) -> Result<RuntimeValue, EvalError>;
}

/// One built and loaded definition.
pub struct Artifact {
    id: String,
    symbol: String,
    entry: Box<dyn EntryPoint>,
    invoked: AtomicBool,
}

impl Artifact {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, entry: Box<dyn EntryPoint>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            entry,
            invoked: AtomicBool::new(false),
        }
    }

    /// The definition's qualified name (the registry key).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The native symbol of the entry point.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::Acquire)
    }

    /// Run the entry point.
    pub fn invoke(&self) -> Result<RuntimeValue, EvalError> {
        self.invoked.store(true, Ordering::Release);
        self.entry.invoke()
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("symbol", &self.symbol)
            .field("invoked", &self.was_invoked())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Inner {
    by_id: FxHashMap<String, Arc<Artifact>>,
    /// Every symbol handed out by `reserve_symbol`, built or not.
    symbols: FxHashSet<String>,
}

impl Inner {
    fn is_used(&self, name: &str) -> bool {
        self.by_id.contains_key(name) || self.symbols.contains(name)
    }
}

/// Registry of loaded artifacts, keyed by definition identifier.
#[derive(Default)]
pub struct ArtifactRegistry {
    inner: RwLock<Inner>,
    builds: Mutex<()>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Artifact>> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Serialize a check-then-build against every other holder of this
    /// registry. Look the identifier up again after acquiring the guard.
    pub fn lock_builds(&self) -> MutexGuard<'_, ()> {
        self.builds.lock()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    /// Register `artifact` unless its identifier is already taken.
    ///
    /// Returns whichever artifact is registered afterwards: the new one, or
    /// the one that was there first.
    pub fn insert(&self, artifact: Artifact) -> Arc<Artifact> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_id.get(&artifact.id) {
            tracing::debug!(id = %artifact.id, "artifact already registered; keeping the first");
            return Arc::clone(existing);
        }
        let artifact = Arc::new(artifact);
        inner.symbols.insert(artifact.symbol.clone());
        inner
            .by_id
            .insert(artifact.id.clone(), Arc::clone(&artifact));
        artifact
    }

    /// Claim a native name derived from `base` that no identifier or symbol
    /// in this registry uses.
    ///
    /// The name is taken even if the build that asked for it fails, so a
    /// half-written artifact on disk is never overwritten by a later build.
    pub fn reserve_symbol(&self, base: &str) -> String {
        let mut inner = self.inner.write();
        let symbol = freshen_with(base, |name| inner.is_used(name));
        inner.symbols.insert(symbol.clone());
        symbol
    }

    /// Whether `name` is a registered identifier or a reserved symbol.
    pub fn is_used(&self, name: &str) -> bool {
        self.inner.read().is_used(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ArtifactRegistry")
            .field("artifacts", &inner.by_id.len())
            .field("symbols", &inner.symbols.len())
            .finish()
    }
}
