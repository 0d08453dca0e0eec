//! The invocation input: one user request, expanded by the profile
//! resolver into one or more runnable profiles.

use std::path::PathBuf;

use stak_shared::{
    BundlerList, BundlerSpec, OneOrMany, RawProfile, RenameHook, Result, StakError,
};

/// A single top-level bundling request.
///
/// Serializable fields participate in the value-level deep merge with a
/// configuration source (user values win). Inline capabilities — resolved
/// bundler specs and the rename hook — cannot be serialized and are
/// re-applied by the normalizer after the merge, also overriding config
/// values when present.
#[derive(Debug, Clone, Default)]
pub struct StakRequest {
    /// Source paths, globs, or a delimited list (CLI positional args).
    pub source: Vec<String>,
    /// Raw content to bundle instead of reading sources.
    pub content: Option<String>,
    /// Output destination; may contain `[name]`/`[ext]` tokens.
    pub output: Option<String>,
    /// Bundler chain given as capability references (`-B "a, b"`).
    pub bundler_refs: Option<String>,
    /// Bundler chain given inline through the API; overrides any chain
    /// from the config source when non-empty.
    pub bundlers: Vec<BundlerSpec>,
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Base directory for relative fan-out output paths.
    pub root: Option<PathBuf>,
    /// Configuration source reference: `path` or `path:selector`.
    pub config: Option<String>,
    /// Profile selector override (`all` or a delimited list of names);
    /// takes precedence over a `:selector` suffix on `config`.
    pub profiles: Option<String>,
    /// Fan out each source file into its own stak. `None` leaves any
    /// config-source value in place.
    pub stak_each_file: Option<bool>,
    /// Watch sources and re-run on change. `None` leaves any config-source
    /// value in place.
    pub watch: Option<bool>,
    /// Extra paths to watch beyond the resolved sources.
    pub watch_paths: Vec<PathBuf>,
    /// Output-path rename callback (API only).
    pub rename: Option<RenameHook>,
}

impl StakRequest {
    /// The serializable overlay merged over configuration-source values.
    ///
    /// Only fields the user actually set appear, so unset request fields
    /// never clobber config values during the deep merge.
    pub(crate) fn overlay_value(&self) -> Result<serde_json::Value> {
        let profile = RawProfile {
            id: None,
            source: if self.source.is_empty() {
                None
            } else {
                Some(OneOrMany::Many(self.source.clone()))
            },
            content: self.content.clone(),
            output: self.output.clone(),
            bundlers: self.bundler_refs.clone().map(BundlerList::Delimited),
            cwd: self.cwd.as_ref().map(|p| p.to_string_lossy().into_owned()),
            root: self.root.as_ref().map(|p| p.to_string_lossy().into_owned()),
            stak_each_file: self.stak_each_file,
            watch: self.watch,
            watch_paths: if self.watch_paths.is_empty() {
                None
            } else {
                Some(
                    self.watch_paths
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                )
            },
        };

        let mut value = serde_json::to_value(&profile)
            .map_err(|e| StakError::config(format!("cannot serialize request: {e}")))?;

        // Null fields would replace config values during the merge.
        if let Some(map) = value.as_object_mut() {
            map.retain(|_, v| !v.is_null());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_omits_unset_fields() {
        let request = StakRequest {
            content: Some("hello".into()),
            bundler_refs: Some("concat".into()),
            ..StakRequest::default()
        };
        let overlay = request.overlay_value().unwrap();
        let map = overlay.as_object().unwrap();
        assert_eq!(map.get("content"), Some(&serde_json::json!("hello")));
        assert!(!map.contains_key("output"));
        assert!(!map.contains_key("watch"));
    }

    #[test]
    fn overlay_carries_positional_sources() {
        let request = StakRequest {
            source: vec!["a.md".into(), "b.md".into()],
            ..StakRequest::default()
        };
        let overlay = request.overlay_value().unwrap();
        assert_eq!(overlay["source"], serde_json::json!(["a.md", "b.md"]));
    }
}
