//! Raw profile schema and configuration-source loading.
//!
//! A configuration source (`stak.toml` or any path given via `--config`)
//! is either a single profile table or a map of named profile tables.
//! Files are parsed into generic JSON values so user overrides can be
//! deep-merged before deserializing into [`RawProfile`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StakError};

// ---------------------------------------------------------------------------
// Raw profile schema
// ---------------------------------------------------------------------------

/// A profile as written by the user (config file table or request fields),
/// before normalization into a `BundleRecord`.
///
/// Field names are snake_case; the original camelCase spellings are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    /// Label for logging; defaults to the config key name, else ordinal.
    pub id: Option<String>,
    /// Source paths: a glob, a delimited string, or a sequence.
    pub source: Option<OneOrMany>,
    /// Raw content to bundle instead of (or before) reading sources.
    pub content: Option<String>,
    /// Output destination; may contain `[name]`/`[ext]` template tokens.
    pub output: Option<String>,
    /// The bundler chain: a delimited string or a sequence of entries.
    pub bundlers: Option<BundlerList>,
    /// Working directory; defaults to the process working directory.
    pub cwd: Option<String>,
    /// Base directory for relative output paths during fan-out.
    pub root: Option<String>,
    /// Treat each source file as its own stak.
    #[serde(alias = "stakEachFile")]
    pub stak_each_file: Option<bool>,
    /// Watch source paths and re-run on change.
    pub watch: Option<bool>,
    /// Extra paths to watch beyond `source`.
    #[serde(alias = "watchPaths")]
    pub watch_paths: Option<Vec<String>>,
}

/// A string-or-sequence field (`source`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// The `bundlers` field: a delimited reference string or a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundlerList {
    Delimited(String),
    List(Vec<BundlerEntry>),
}

/// One entry of a `bundlers` sequence: a bare capability reference or a
/// `{ run, options }` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundlerEntry {
    Reference(String),
    Detailed {
        run: String,
        #[serde(default)]
        options: serde_json::Map<String, Value>,
    },
}

// ---------------------------------------------------------------------------
// Configuration-source loading
// ---------------------------------------------------------------------------

/// Default configuration file name, looked up when `--config` names a
/// directory.
pub const CONFIG_FILE_NAME: &str = "stak.toml";

/// Load a configuration source into a generic value for merging.
///
/// The result is either one profile table or a map of named profile
/// tables; the caller's selector decides which interpretation applies.
pub fn load_profile_source(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StakError::config(format!("cannot read config {}: {e}", path.display()))
    })?;

    let value: Value = toml::from_str(&content).map_err(|e| {
        StakError::config(format!("cannot parse {}: {e}", path.display()))
    })?;

    tracing::debug!(path = %path.display(), "loaded configuration source");
    Ok(value)
}

// ---------------------------------------------------------------------------
// Value merging
// ---------------------------------------------------------------------------

/// Deep-merge `overlay` into `base`.
///
/// Objects merge recursively with overlay values winning; arrays and
/// scalars are replaced wholesale, never concatenated.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(slot) => deep_merge(slot, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Rewrite known camelCase profile keys to their snake_case form so a
/// config file and a request never merge under two spellings of the same
/// field.
pub fn canonicalize_profile_keys(value: &mut Value) {
    const ALIASES: [(&str, &str); 2] = [
        ("stakEachFile", "stak_each_file"),
        ("watchPaths", "watch_paths"),
    ];

    if let Value::Object(map) = value {
        for (alias, canonical) in ALIASES {
            if let Some(v) = map.shift_remove(alias) {
                map.entry(canonical.to_string()).or_insert(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_profile_source() {
        let value: Value = toml::from_str(
            r#"
content = "hello"
output = ".temp/out.md"
bundlers = "concat"
"#,
        )
        .unwrap();
        let profile: RawProfile = serde_json::from_value(value).unwrap();
        assert_eq!(profile.content.as_deref(), Some("hello"));
        assert!(matches!(profile.bundlers, Some(BundlerList::Delimited(_))));
    }

    #[test]
    fn parses_named_profiles_in_order() {
        let value: Value = toml::from_str(
            r#"
[one]
content = "first"
bundlers = ["concat"]

[two]
content = "second"
bundlers = [{ run = "concat", options = { sep = "\n" } }]
"#,
        )
        .unwrap();
        let map = value.as_object().unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["one", "two"]);

        let two: RawProfile = serde_json::from_value(map["two"].clone()).unwrap();
        let Some(BundlerList::List(entries)) = two.bundlers else {
            panic!("expected bundler list");
        };
        assert!(matches!(entries[0], BundlerEntry::Detailed { .. }));
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let profile: RawProfile = serde_json::from_value(json!({
            "content": "x",
            "bundlers": "concat",
            "stakEachFile": true,
            "watchPaths": ["extra.md"],
        }))
        .unwrap();
        assert_eq!(profile.stak_each_file, Some(true));
        assert_eq!(profile.watch_paths.as_deref(), Some(&["extra.md".to_string()][..]));
    }

    #[test]
    fn deep_merge_overrides_win_at_every_level() {
        let mut base = json!({
            "content": "from config",
            "nested": { "keep": 1, "replace": 2 },
            "array": [1, 2, 3],
        });
        let overlay = json!({
            "content": "from user",
            "nested": { "replace": 9 },
            "array": [4],
        });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["content"], "from user");
        assert_eq!(base["nested"]["keep"], 1);
        assert_eq!(base["nested"]["replace"], 9);
        // Arrays are replaced wholesale, not concatenated.
        assert_eq!(base["array"], json!([4]));
    }

    #[test]
    fn canonicalize_rewrites_aliases_without_clobbering() {
        let mut value = json!({ "stakEachFile": true, "watch_paths": ["a"], "watchPaths": ["b"] });
        canonicalize_profile_keys(&mut value);
        let map = value.as_object().unwrap();
        assert_eq!(map.get("stak_each_file"), Some(&json!(true)));
        assert!(!map.contains_key("stakEachFile"));
        // The canonical spelling wins when both are present.
        assert_eq!(map.get("watch_paths"), Some(&json!(["a"])));
    }
}
