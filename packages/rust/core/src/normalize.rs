//! Config Normalizer: turns a raw profile into a validated, fully
//! resolved bundle record.
//!
//! Step order matters — later steps depend on earlier ones: working
//! directory, bundler-chain coercion, content defaulting, source
//! expansion (glob/directory/delimited), fan-out detection, validation.

use std::path::{Path, PathBuf};

use tracing::debug;

use stak_shared::{
    BundleRecord, BundlerEntry, BundlerList, BundlerSpec, OneOrMany, RawProfile, Result,
    StakError,
};

use crate::request::StakRequest;

/// Normalize one raw profile.
///
/// `ordinal` is the profile's position within the profile set, used as
/// the id of last resort. Failure is fatal for this profile only, never
/// for the whole batch.
pub fn normalize(raw: RawProfile, request: &StakRequest, ordinal: usize) -> Result<BundleRecord> {
    // 1. Working directory.
    let cwd = match raw.cwd {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    // 2. Bundler chain. Inline request bundlers win over anything the
    // config source provided.
    let bundlers: Vec<BundlerSpec> = if !request.bundlers.is_empty() {
        request.bundlers.clone()
    } else {
        match raw.bundlers {
            Some(BundlerList::Delimited(refs)) => {
                split_list(&refs).into_iter().map(BundlerSpec::named).collect()
            }
            Some(BundlerList::List(entries)) => entries
                .into_iter()
                .map(|entry| match entry {
                    BundlerEntry::Reference(reference) => BundlerSpec::named(reference),
                    BundlerEntry::Detailed { run, options } => {
                        BundlerSpec::named(run).with_options(options)
                    }
                })
                .collect(),
            None => Vec::new(),
        }
    };

    // 3. Content defaults to empty, enabling source-driven bundling.
    let content = raw.content.unwrap_or_default();

    // 4. Source expansion. A single string that is neither a glob nor a
    // directory may still be a delimited list of paths.
    let specs: Vec<String> = match raw.source {
        Some(OneOrMany::One(spec)) => {
            if content.is_empty() && (has_magic(&spec) || names_directory(&spec, &cwd)) {
                vec![spec]
            } else {
                split_list(&spec)
            }
        }
        Some(OneOrMany::Many(paths)) => paths,
        None => Vec::new(),
    };
    let mut source: Vec<PathBuf> = Vec::new();
    for spec in specs {
        if content.is_empty() && has_magic(&spec) {
            source.extend(expand_glob(&spec, &cwd)?);
        } else if content.is_empty() && names_directory(&spec, &cwd) {
            let pattern = format!("{}/**/*", spec.trim_end_matches(['/', '\\']));
            source.extend(expand_glob(&pattern, &cwd)?);
        } else {
            source.push(PathBuf::from(spec));
        }
    }

    // 5. Fan-out detection and output templating.
    let mut stak_each_file = raw.stak_each_file.unwrap_or(false);
    let mut output = raw.output;
    if let Some(out) = &output {
        stak_each_file = stak_each_file || out.contains("[name]") || directory_intent(out, &cwd);
        if stak_each_file && !out.contains("[name]") {
            output = Some(
                Path::new(out)
                    .join("[name].[ext]")
                    .to_string_lossy()
                    .into_owned(),
            );
        }
    }
    let output = output.map(PathBuf::from);

    let id = raw
        .id
        .or_else(|| {
            output
                .as_ref()
                .and_then(|o| o.file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
                // A templated stem like `[name]` is no label at all.
                .filter(|stem| !stem.contains('['))
        })
        .unwrap_or_else(|| ordinal.to_string());

    let record = BundleRecord {
        id,
        source,
        content,
        output,
        bundlers,
        source_map: None,
        cwd,
        root: raw.root.map(PathBuf::from),
        stak_each_file,
        watch: raw.watch.unwrap_or(false),
        watch_paths: raw
            .watch_paths
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        has_watcher: false,
        rename: request.rename.clone(),
        data: serde_json::Map::new(),
    };

    // 6. Validation — fatal for this profile only.
    record.validate()?;

    debug!(
        profile = %record.id,
        sources = record.source.len(),
        bundlers = record.bundlers.len(),
        fan_out = record.stak_each_file,
        "profile normalized"
    );
    Ok(record)
}

/// Split a delimited reference/path list on commas and/or whitespace.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ' ', '\t', '\n'])
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a source string is a glob pattern rather than a literal path.
fn has_magic(value: &str) -> bool {
    value.contains(['*', '?', '['])
}

/// Whether a source string names an existing directory (checked against
/// the working directory when relative).
fn names_directory(value: &str, cwd: &Path) -> bool {
    resolve_against(value, cwd).is_dir()
}

/// Directory-intent heuristic for output paths: a trailing separator
/// signals a directory even when the path does not exist yet; otherwise
/// an on-disk directory check decides.
fn directory_intent(output: &str, cwd: &Path) -> bool {
    output.ends_with(['/', '\\']) || resolve_against(output, cwd).is_dir()
}

fn resolve_against(value: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Expand a glob pattern to the sorted set of matching files, dot-files
/// included. Relative patterns are expanded against `cwd` and reported
/// relative to it.
fn expand_glob(pattern: &str, cwd: &Path) -> Result<Vec<PathBuf>> {
    let absolute = Path::new(pattern).is_absolute();
    let full = if absolute {
        pattern.to_string()
    } else {
        cwd.join(pattern).to_string_lossy().into_owned()
    };

    let entries = glob::glob_with(&full, glob::MatchOptions::new())
        .map_err(|e| StakError::validation(format!("invalid glob `{pattern}`: {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let failed = e.path().to_path_buf();
            StakError::io(failed, e.into())
        })?;
        if !path.is_file() {
            continue;
        }
        let path = if absolute {
            path
        } else {
            path.strip_prefix(cwd).map(Path::to_path_buf).unwrap_or(path)
        };
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_tree(files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stak-normalize-test-{}", Uuid::now_v7()));
        for file in files {
            let path = dir.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("content of {file}")).unwrap();
        }
        dir
    }

    fn raw(cwd: &Path) -> RawProfile {
        RawProfile {
            cwd: Some(cwd.to_string_lossy().into_owned()),
            bundlers: Some(BundlerList::Delimited("concat".into())),
            ..RawProfile::default()
        }
    }

    #[test]
    fn expands_globs_sorted_with_dotfiles() {
        let dir = temp_tree(&["b.md", "a.md", ".hidden.md", "sub/c.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("**/*.md".into()));

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert_eq!(
            record.source,
            vec![
                PathBuf::from(".hidden.md"),
                PathBuf::from("a.md"),
                PathBuf::from("b.md"),
                PathBuf::from("sub/c.md"),
            ]
        );
    }

    #[test]
    fn expands_directory_sources() {
        let dir = temp_tree(&["docs/a.md", "docs/b.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("docs".into()));

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert_eq!(
            record.source,
            vec![PathBuf::from("docs/a.md"), PathBuf::from("docs/b.md")]
        );
    }

    #[test]
    fn splits_delimited_sources_and_bundlers() {
        let dir = temp_tree(&[]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("a.md, b.md c.md".into()));
        profile.bundlers = Some(BundlerList::Delimited("one, two three".into()));

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert_eq!(record.source.len(), 3);
        assert_eq!(record.bundlers.len(), 3);
    }

    #[test]
    fn expands_each_entry_of_a_source_list() {
        let dir = temp_tree(&["css/a.css", "docs/b.md", "docs/c.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::Many(vec!["css/*.css".into(), "docs".into()]));

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert_eq!(
            record.source,
            vec![
                PathBuf::from("css/a.css"),
                PathBuf::from("docs/b.md"),
                PathBuf::from("docs/c.md"),
            ]
        );
    }

    #[test]
    fn content_suppresses_glob_expansion() {
        let dir = temp_tree(&["a.md"]);
        let mut profile = raw(&dir);
        profile.content = Some("inline".into());
        profile.source = Some(OneOrMany::One("*.md".into()));

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        // The pattern is kept as a literal path list, not expanded.
        assert_eq!(record.source, vec![PathBuf::from("*.md")]);
    }

    #[test]
    fn template_token_activates_fan_out() {
        let dir = temp_tree(&["a.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("*.md".into()));
        profile.output = Some("out/[name].[ext]".into());

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert!(record.stak_each_file);
        assert_eq!(record.output, Some(PathBuf::from("out/[name].[ext]")));
    }

    #[test]
    fn trailing_separator_signals_directory_even_when_absent_on_disk() {
        let dir = temp_tree(&["a.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("*.md".into()));
        profile.output = Some("not-yet-created/".into());

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert!(record.stak_each_file);
        assert_eq!(
            record.output,
            Some(PathBuf::from("not-yet-created/[name].[ext]"))
        );
    }

    #[test]
    fn existing_directory_output_activates_fan_out() {
        let dir = temp_tree(&["src/a.md", "dist/.keep"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("src/*.md".into()));
        profile.output = Some(dir.join("dist").to_string_lossy().into_owned());

        let record = normalize(profile, &StakRequest::default(), 0).unwrap();
        assert!(record.stak_each_file);
    }

    #[test]
    fn missing_source_and_content_fails_validation() {
        let dir = temp_tree(&[]);
        let err = normalize(raw(&dir), &StakRequest::default(), 0).unwrap_err();
        assert!(matches!(err, StakError::Validation { .. }));
    }

    #[test]
    fn id_falls_back_to_output_stem_then_ordinal() {
        let dir = temp_tree(&[]);
        let mut profile = raw(&dir);
        profile.content = Some("x".into());
        profile.output = Some("dist/bundle.css".into());
        let record = normalize(profile, &StakRequest::default(), 3).unwrap();
        assert_eq!(record.id, "bundle");

        let mut profile = raw(&dir);
        profile.content = Some("x".into());
        let record = normalize(profile, &StakRequest::default(), 3).unwrap();
        assert_eq!(record.id, "3");
    }

    #[test]
    fn templated_output_stem_is_not_an_id() {
        let dir = temp_tree(&["a.md"]);
        let mut profile = raw(&dir);
        profile.source = Some(OneOrMany::One("*.md".into()));
        profile.output = Some("out/[name].[ext]".into());

        let record = normalize(profile, &StakRequest::default(), 7).unwrap();
        assert_eq!(record.id, "7");
    }

    #[test]
    fn inline_request_bundlers_override_profile_chain() {
        let dir = temp_tree(&[]);
        let mut profile = raw(&dir);
        profile.content = Some("x".into());

        let request = StakRequest {
            bundlers: vec![BundlerSpec::named("inline-a"), BundlerSpec::named("inline-b")],
            ..StakRequest::default()
        };
        let record = normalize(profile, &request, 0).unwrap();
        assert_eq!(record.bundlers.len(), 2);
    }
}
