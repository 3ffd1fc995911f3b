//! Qualified names of global constants, inductives and binders.

use std::fmt;
use std::sync::Arc;

/// A qualified host name such as `Coq.Init.Datatypes.nat`.
///
/// Cheap to clone: the text is shared behind an `Arc`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(text: impl AsRef<str>) -> Self {
        Name(Arc::from(text.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dot-separated component (`nat` for `Coq.Init.Datatypes.nat`).
    pub fn basename(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Name(Arc::from(text))
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", &*self.0)
    }
}

/// Universe instance attached to a polymorphic reference.
///
/// The evaluator never inspects levels; it only threads the instance from the
/// classified type onto every constructor it rebuilds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Instance(Vec<Name>);

impl Instance {
    pub const fn empty() -> Self {
        Instance(Vec::new())
    }

    pub fn new(levels: Vec<Name>) -> Self {
        Instance(levels)
    }

    pub fn levels(&self) -> &[Name] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str("@{")?;
        for (i, level) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{level}")?;
        }
        f.write_str("}")
    }
}
