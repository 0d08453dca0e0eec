//! Capability registry for named bundler references.
//!
//! Profiles reference bundlers by string. A reference resolves to a
//! registered callable in two ways:
//!
//! - relative references (`./x`, `../x`) are joined against the record's
//!   working directory and looked up under the cleaned joined path;
//! - anything else tries the conventioned installed-package form first
//!   (`stak-bundler-<name>`), then falls back to the literal reference.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use stak_shared::{Bundler, Result, StakError};

/// Namespace segment inserted when trying a short name's installed form.
pub const BUNDLER_NAMESPACE: &str = "stak-bundler-";

/// Maps reference strings to bundler capabilities.
#[derive(Default)]
pub struct BundlerRegistry {
    entries: HashMap<String, Arc<dyn Bundler>>,
}

impl BundlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under a reference string.
    ///
    /// Path-style keys let relative profile references resolve: a bundler
    /// registered under `/project/bundlers/upper` matches the reference
    /// `./bundlers/upper` for a record whose cwd is `/project`.
    pub fn register(&mut self, reference: impl Into<String>, bundler: Arc<dyn Bundler>) {
        let reference = reference.into();
        tracing::debug!(reference = %reference, "registered bundler");
        self.entries.insert(reference, bundler);
    }

    /// Resolve a reference to its callable.
    pub fn resolve(&self, reference: &str, cwd: &Path) -> Result<Arc<dyn Bundler>> {
        if reference.starts_with("./") || reference.starts_with("../") {
            let key = lexical_clean(&cwd.join(reference));
            return self
                .entries
                .get(&key.to_string_lossy().into_owned())
                .cloned()
                .ok_or_else(|| {
                    StakError::resolution(format!(
                        "no bundler registered for `{reference}` (resolved to {})",
                        key.display()
                    ))
                });
        }

        let namespaced = format!("{BUNDLER_NAMESPACE}{reference}");
        self.entries
            .get(&namespaced)
            .or_else(|| self.entries.get(reference))
            .cloned()
            .ok_or_else(|| {
                StakError::resolution(format!(
                    "no bundler registered for `{reference}` (tried `{namespaced}`)"
                ))
            })
    }
}

impl std::fmt::Debug for BundlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("BundlerRegistry")
            .field("entries", &names)
            .finish()
    }
}

/// Lexically remove `.` and `..` components without touching the disk.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(Component::ParentDir);
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}
