//! The bundle record — the mutable state threaded through a stak.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundler::BundlerSpec;
use crate::error::{Result, StakError};

/// Callback applied to computed per-file output paths during fan-out.
///
/// Receives the templated output path and the owning record for context;
/// its return value is the final output path.
#[derive(Clone)]
pub struct RenameHook(pub Arc<dyn Fn(&Path, &BundleRecord) -> PathBuf + Send + Sync>);

impl RenameHook {
    pub fn new(f: impl Fn(&Path, &BundleRecord) -> PathBuf + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, path: &Path, record: &BundleRecord) -> PathBuf {
        (self.0)(path, record)
    }
}

impl std::fmt::Debug for RenameHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RenameHook(..)")
    }
}

/// The state threaded through a single stak execution.
///
/// At least one of `source`/`content` must be non-empty at validation
/// time; both may coexist while bundlers run. Each record is
/// exclusively owned by its own execution chain — fan-out derives fresh
/// records, and no two concurrent staks share one.
#[derive(Debug, Clone, Default)]
pub struct BundleRecord {
    /// Human-readable label for logging and aggregation, derived from the
    /// profile name, output path, or ordinal position.
    pub id: String,
    /// Ordered input locators.
    pub source: Vec<PathBuf>,
    /// Accumulated/transformed text payload.
    pub content: String,
    /// Resolved destination path, or `None` for content-only mode.
    pub output: Option<PathBuf>,
    /// Ordered bundler chain.
    pub bundlers: Vec<BundlerSpec>,
    /// Optional side-channel payload written alongside `output` as
    /// `<output>.map`.
    pub source_map: Option<String>,
    /// Working directory; source paths and relative bundler references are
    /// resolved against it.
    pub cwd: PathBuf,
    /// Base directory for computing relative output paths during fan-out.
    pub root: Option<PathBuf>,
    /// Fan out `source` into one independent stak per input path.
    pub stak_each_file: bool,
    /// Observe source paths and re-run on change.
    pub watch: bool,
    /// Extra paths to observe beyond `source`.
    pub watch_paths: Vec<PathBuf>,
    /// One-shot guard: set on the first watcher `ready` event, suppresses
    /// duplicate startup logging and duplicate watcher attachment.
    pub has_watcher: bool,
    /// Optional output-path rename callback (fan-out only).
    pub rename: Option<RenameHook>,
    /// Free-form side channel for bundlers to pass values down the chain.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl BundleRecord {
    /// Check the record invariants.
    ///
    /// Run before every bundler invocation (a bundler could corrupt the
    /// record) and once at normalization time. A violation is fatal for
    /// the owning stak only.
    ///
    /// A record with an attached watcher may run with both `source` and
    /// `content` empty: the watch loop deliberately clears `content`
    /// before each re-run, and the record already passed validation when
    /// it was normalized.
    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() && self.content.is_empty() && !self.has_watcher {
            return Err(StakError::validation("`source` or `content` is required"));
        }
        if self.bundlers.is_empty() {
            return Err(StakError::validation(
                "`bundlers` is required and must not be empty",
            ));
        }
        Ok(())
    }
}
