#![forbid(unsafe_code)]

//! Candidate source metadata.

use std::collections::BTreeMap;
use std::fmt;

/// Marker naming the external program whose stdout feeds a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsyncSpec {
    /// Program to run (looked up on `PATH` when not a path).
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
}

impl AsyncSpec {
    /// Create a spec from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for AsyncSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

/// Properties a candidate source reports about itself.
///
/// `async_spec` is the only property the orchestrator acts on. `category`
/// and the open `properties` map are passed along untouched for whatever
/// selection UI wants them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Present when the source is backed by a running program.
    pub async_spec: Option<AsyncSpec>,
    /// Opaque classification tag.
    pub category: Option<String>,
    /// Any other named properties.
    pub properties: BTreeMap<String, String>,
}

impl Metadata {
    /// Empty metadata (a synchronous source).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the async marker (builder).
    #[must_use]
    pub fn with_async(mut self, spec: AsyncSpec) -> Self {
        self.async_spec = Some(spec);
        self
    }

    /// Set the category (builder).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add a named property (builder).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Whether the source declared itself asynchronous.
    #[inline]
    pub fn is_async(&self) -> bool {
        self.async_spec.is_some()
    }

    /// Look up a named property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}
