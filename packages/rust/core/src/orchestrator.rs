//! Orchestrator: the top-level entry point.
//!
//! Expands a request into its profile set, runs every profile concurrently
//! through the fan-out controller, aggregates per-profile results, and
//! attaches watchers. Errors inside one profile never crash siblings or
//! the host process; only configuration resolution fails the whole
//! invocation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use stak_shared::{BundleRecord, Result, StakError};

use crate::context::RunContext;
use crate::fanout;
use crate::normalize;
use crate::profiles;
use crate::registry::BundlerRegistry;
use crate::request::StakRequest;
use crate::watch::{NotifyBackend, WatchBackend, WatcherHandle};

/// Aggregated outcome of one profile's execution.
#[derive(Debug)]
pub struct RunSummary {
    /// Profile label.
    pub id: String,
    /// The normalized profile record; on success its `content` is updated
    /// to the final result's content. `None` when normalization failed.
    pub record: Option<BundleRecord>,
    /// Every per-stak result, in input order.
    pub all: Vec<BundleRecord>,
    /// Live watcher, when one was attached.
    pub watcher: Option<WatcherHandle>,
    /// True only if at least one result exists and the last result carried
    /// content.
    pub success: bool,
    /// The profile's fatal error, when it had one.
    pub error: Option<StakError>,
    /// Wall-clock time for this profile.
    pub elapsed: Duration,
}

impl RunSummary {
    fn failed(id: String, error: StakError, elapsed: Duration) -> Self {
        Self {
            id,
            record: None,
            all: Vec::new(),
            watcher: None,
            success: false,
            error: Some(error),
            elapsed,
        }
    }
}

/// Result of one `execute` call: a single profile's summary unwrapped, or
/// the whole ordered set.
#[derive(Debug)]
pub enum ExecuteOutcome {
    Single(RunSummary),
    Many(Vec<RunSummary>),
}

impl ExecuteOutcome {
    /// Flatten to a uniform slice regardless of shape.
    pub fn summaries(&self) -> &[RunSummary] {
        match self {
            Self::Single(summary) => std::slice::from_ref(summary),
            Self::Many(summaries) => summaries,
        }
    }

    /// Take ownership of the summaries (e.g. to close watchers).
    pub fn into_summaries(self) -> Vec<RunSummary> {
        match self {
            Self::Single(summary) => vec![summary],
            Self::Many(summaries) => summaries,
        }
    }

    /// True only when every profile succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.summaries().iter().all(|s| s.success)
    }
}

/// Execute a request with the default watch backend.
pub async fn execute(request: StakRequest, registry: Arc<BundlerRegistry>) -> Result<ExecuteOutcome> {
    execute_with_backend(request, registry, &NotifyBackend).await
}

/// Execute a request, injecting the watch backend (tests drive change
/// events by hand through this seam).
#[instrument(skip_all)]
pub async fn execute_with_backend(
    request: StakRequest,
    registry: Arc<BundlerRegistry>,
    backend: &dyn WatchBackend,
) -> Result<ExecuteOutcome> {
    // Config resolution failure is fatal for the whole invocation.
    let raw_profiles = profiles::resolve_profiles(&request)?;
    let single = raw_profiles.len() == 1;

    let ctx = RunContext::new(registry);
    info!(
        invocation = %ctx.invocation_id,
        profiles = raw_profiles.len(),
        "starting bundling run"
    );

    let runs = raw_profiles
        .into_iter()
        .enumerate()
        .map(|(ordinal, raw)| run_one(raw, ordinal, &request, &ctx, backend));
    let summaries = futures::future::join_all(runs).await;

    info!(
        invocation = %ctx.invocation_id,
        elapsed_ms = ctx.elapsed().as_millis(),
        succeeded = summaries.iter().filter(|s| s.success).count(),
        failed = summaries.iter().filter(|s| !s.success).count(),
        "bundling run complete"
    );

    Ok(if single {
        let summary = summaries
            .into_iter()
            .next()
            .unwrap_or_else(|| RunSummary::failed(
                "0".into(),
                StakError::EmptyResult("0".into()),
                ctx.elapsed(),
            ));
        ExecuteOutcome::Single(summary)
    } else {
        ExecuteOutcome::Many(summaries)
    })
}

/// Normalize and run one profile, converting every failure into a
/// summary so sibling profiles are unaffected.
async fn run_one(
    raw: stak_shared::RawProfile,
    ordinal: usize,
    request: &StakRequest,
    ctx: &RunContext,
    backend: &dyn WatchBackend,
) -> RunSummary {
    let profile_ctx = RunContext::new(ctx.registry.clone());
    let fallback_id = raw
        .id
        .clone()
        .unwrap_or_else(|| ordinal.to_string());

    let record = match normalize::normalize(raw, request, ordinal) {
        Ok(record) => record,
        Err(e) => {
            error!(profile = %fallback_id, error = %e, "profile normalization failed");
            return RunSummary::failed(fallback_id, e, profile_ctx.elapsed());
        }
    };

    run_normalized(record, &profile_ctx, backend).await
}

/// Run a normalized profile end to end and aggregate its results.
async fn run_normalized(
    record: BundleRecord,
    ctx: &RunContext,
    backend: &dyn WatchBackend,
) -> RunSummary {
    let mut profile = record.clone();
    let id = profile.id.clone();

    let results = match fanout::run_profile(record, ctx).await {
        Ok(results) => results,
        Err(e) => {
            error!(profile = %id, error = %e, "profile failed");
            return RunSummary::failed(id, e, ctx.elapsed());
        }
    };

    if results.is_empty() {
        let e = StakError::EmptyResult(id.clone());
        error!(profile = %id, error = %e, "profile produced no results");
        return RunSummary::failed(id, e, ctx.elapsed());
    }

    // Success hinges on the last result's content: its absence is a
    // warning, not an error — execution still resolves normally.
    let mut success = false;
    match results.last() {
        Some(last) if !last.content.is_empty() => {
            profile.content = last.content.clone();
            success = true;
        }
        _ => {
            warn!(
                profile = %id,
                "no content was returned; check the profile configuration or its bundlers"
            );
        }
    }

    // Attach a watcher once per profile lifetime.
    let watcher = if profile.watch && !profile.has_watcher {
        match crate::watch::spawn(profile.clone(), ctx.registry.clone(), backend) {
            Ok(handle) => {
                profile.has_watcher = true;
                Some(handle)
            }
            Err(e) => {
                error!(profile = %id, error = %e, "could not start watcher");
                None
            }
        }
    } else {
        None
    };

    info!(
        profile = %id,
        staks = results.len(),
        success,
        elapsed_ms = ctx.elapsed().as_millis(),
        "profile complete"
    );

    RunSummary {
        id,
        record: Some(profile),
        all: results,
        watcher,
        success,
        error: None,
        elapsed: ctx.elapsed(),
    }
}
