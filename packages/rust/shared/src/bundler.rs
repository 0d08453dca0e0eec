//! The bundler capability contract.
//!
//! A bundler is an externally supplied transformation: it receives the
//! current [`BundleRecord`] plus its own descriptor (for options) and
//! returns a new or updated record. Bundlers may be registered as named
//! capabilities and referenced from profiles by string, or attached to a
//! request as pre-resolved callables.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::BundleRecord;

/// An async transformation step in a bundler chain.
///
/// Implementations must return a record that still satisfies
/// [`BundleRecord::validate`], or the next step fails the stak.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, record: BundleRecord, spec: &BundlerSpec) -> Result<BundleRecord>;
}

/// A bundler reference: either an unresolved name or a resolved callable.
///
/// Resolution is idempotent — once a name has been looked up, the callable
/// is cached back onto the descriptor and later chain steps skip the
/// registry entirely.
#[derive(Clone)]
pub enum BundlerRef {
    /// A capability reference still to be resolved against the registry.
    Named(String),
    /// A resolved (or inline-supplied) callable.
    Resolved(Arc<dyn Bundler>),
}

impl BundlerRef {
    /// Whether this reference has already been resolved to a callable.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl std::fmt::Debug for BundlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Resolved(_) => f.write_str("Resolved(..)"),
        }
    }
}

/// One step of a bundler chain: the capability reference plus its options.
#[derive(Debug, Clone)]
pub struct BundlerSpec {
    /// The capability to invoke.
    pub run: BundlerRef,
    /// Free-form options passed to the capability via this descriptor.
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl BundlerSpec {
    /// A descriptor referencing a registered capability by name.
    pub fn named(reference: impl Into<String>) -> Self {
        Self {
            run: BundlerRef::Named(reference.into()),
            options: serde_json::Map::new(),
        }
    }

    /// A descriptor wrapping a pre-resolved callable.
    pub fn resolved(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            run: BundlerRef::Resolved(bundler),
            options: serde_json::Map::new(),
        }
    }

    /// Attach an options map to this descriptor.
    pub fn with_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }
}

/// Adapter turning a plain synchronous closure into a [`Bundler`].
pub struct FnBundler<F>(F);

impl<F> FnBundler<F>
where
    F: Fn(BundleRecord, &BundlerSpec) -> Result<BundleRecord> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }

    /// Convenience: wrap the closure directly into a resolved descriptor.
    pub fn spec(f: F) -> BundlerSpec
    where
        F: 'static,
    {
        BundlerSpec::resolved(Arc::new(Self(f)))
    }
}

#[async_trait]
impl<F> Bundler for FnBundler<F>
where
    F: Fn(BundleRecord, &BundlerSpec) -> Result<BundleRecord> + Send + Sync,
{
    async fn bundle(&self, record: BundleRecord, spec: &BundlerSpec) -> Result<BundleRecord> {
        (self.0)(record, spec)
    }
}
