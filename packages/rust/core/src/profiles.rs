//! Profile Resolver: expands one user request into an ordered sequence of
//! raw profiles.
//!
//! With a configuration source (`path` or `path:selector`) the selector
//! decides which profile tables run; the request's serializable fields are
//! deep-merged over each selected table (user values win, arrays replaced
//! wholesale). Without one, the request itself is the sole profile.

use std::path::Path;

use tracing::debug;

use stak_shared::{
    CONFIG_FILE_NAME, RawProfile, Result, StakError, canonicalize_profile_keys, deep_merge,
    load_profile_source,
};

use crate::normalize::split_list;
use crate::request::StakRequest;

/// Selector value meaning "every named profile, in key-insertion order".
const SELECT_ALL: &str = "all";

/// Resolve the request into raw profiles, in execution order.
///
/// An unreadable configuration source or a named selector absent from it
/// fails the whole resolution — no partial profile set is returned.
pub fn resolve_profiles(request: &StakRequest) -> Result<Vec<RawProfile>> {
    let overlay = request.overlay_value()?;

    let Some(config_ref) = &request.config else {
        // No configuration source: the request is the sole profile.
        let profile = profile_from_value(overlay, None)?;
        return Ok(vec![profile]);
    };

    let (mut path, suffix_selector) = split_config_ref(config_ref);
    if Path::new(&path).is_dir() {
        path = Path::new(&path)
            .join(CONFIG_FILE_NAME)
            .to_string_lossy()
            .into_owned();
    }
    let selector = request.profiles.clone().or(suffix_selector);
    let source = load_profile_source(Path::new(&path))?;

    let profiles = match selector.as_deref() {
        // No selector: the entire configuration object is one profile.
        None => {
            let mut value = source;
            canonicalize_profile_keys(&mut value);
            deep_merge(&mut value, &overlay);
            vec![profile_from_value(value, None)?]
        }
        Some(SELECT_ALL) => {
            let map = named_profiles(&source, &path)?;
            let mut profiles = Vec::with_capacity(map.len());
            for (name, table) in map {
                profiles.push(merged_profile(table, &overlay, name)?);
            }
            profiles
        }
        Some(list) => {
            let map = named_profiles(&source, &path)?;
            let names = split_list(list);
            let mut profiles = Vec::with_capacity(names.len());
            for name in &names {
                let table = map.get(name).ok_or_else(|| {
                    StakError::config(format!("profile `{name}` not found in {path}"))
                })?;
                profiles.push(merged_profile(table, &overlay, name)?);
            }
            profiles
        }
    };

    debug!(config = %path, count = profiles.len(), "resolved profile set");
    Ok(profiles)
}

/// Split a configuration reference into `(path, selector)`.
fn split_config_ref(config_ref: &str) -> (String, Option<String>) {
    match config_ref.split_once(':') {
        Some((path, selector)) if !selector.is_empty() => {
            (path.to_string(), Some(selector.to_string()))
        }
        _ => (config_ref.to_string(), None),
    }
}

fn named_profiles<'v>(
    source: &'v serde_json::Value,
    path: &str,
) -> Result<&'v serde_json::Map<String, serde_json::Value>> {
    source.as_object().ok_or_else(|| {
        StakError::config(format!("{path} does not contain named profile tables"))
    })
}

fn merged_profile(
    table: &serde_json::Value,
    overlay: &serde_json::Value,
    name: &str,
) -> Result<RawProfile> {
    let mut value = table.clone();
    canonicalize_profile_keys(&mut value);
    deep_merge(&mut value, overlay);
    profile_from_value(value, Some(name))
}

fn profile_from_value(value: serde_json::Value, name: Option<&str>) -> Result<RawProfile> {
    let mut profile: RawProfile = serde_json::from_value(value)
        .map_err(|e| StakError::config(format!("invalid profile shape: {e}")))?;
    if profile.id.is_none() {
        profile.id = name.map(str::to_string);
    }
    Ok(profile)
}
