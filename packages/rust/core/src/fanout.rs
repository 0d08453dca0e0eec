//! Fan-out Controller: expands one profile into per-file stak executions.
//!
//! When `stak_each_file` is set, every source path becomes its own derived
//! record with a templated output path; the derived staks run concurrently
//! and results are collected in input order. Otherwise the profile runs as
//! a single stak.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, instrument};

use stak_shared::{BundleRecord, Result};

use crate::context::RunContext;
use crate::executor;

/// Run one profile through the executor, fanning out per source file when
/// requested. Any branch failing fails the whole profile.
#[instrument(skip_all, fields(profile = %record.id, fan_out = record.stak_each_file))]
pub async fn run_profile(record: BundleRecord, ctx: &RunContext) -> Result<Vec<BundleRecord>> {
    if !record.stak_each_file {
        return Ok(vec![executor::run_stak(record, ctx).await?]);
    }

    let mut staks = Vec::with_capacity(record.source.len());
    for path in &record.source {
        let output = record
            .output
            .as_ref()
            .map(|output| per_file_output(output, path, &record));

        let mut derived = record.clone();
        derived.source = vec![path.clone()];
        derived.output = output;

        debug!(source = %path.display(), output = ?derived.output, "derived per-file stak");
        staks.push(executor::run_stak(derived, ctx));
    }
    try_join_all(staks).await
}

/// Compute the output path for one source file.
///
/// The output directory is `dirname(output)`, joined with the source's
/// containing directory relative to `root` (when set), joined with
/// `basename(output)`; then `[name]`/`[ext]` are substituted exactly once
/// anywhere in the joined path, and the rename hook, if any, gets the
/// final say.
fn per_file_output(output: &Path, source: &Path, record: &BundleRecord) -> PathBuf {
    let out_dir = output.parent().unwrap_or_else(|| Path::new(""));
    let out_base = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source_dir = source.parent().unwrap_or_else(|| Path::new(""));
    let relative = record
        .root
        .as_deref()
        .and_then(|root| source_dir.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(""));

    let name = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Tokens may sit in a directory component (`out/[name]/style.css`),
    // so substitution runs over the whole joined path.
    let joined = out_dir.join(relative).join(out_base);
    let templated = joined
        .to_string_lossy()
        .replacen("[name]", &name, 1)
        .replacen("[ext]", &ext, 1);
    let computed = PathBuf::from(templated);

    match &record.rename {
        Some(hook) => hook.apply(&computed, record),
        None => computed,
    }
}
