//! CLI argument definitions, dispatch, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::info;

use stak_core::{BundlerRegistry, ExecuteOutcome, StakRequest};

use crate::bundlers::ConcatBundler;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// stak — bundle content through a chain of pluggable bundlers.
#[derive(Parser)]
#[command(
    name = "stak",
    version,
    about = "Collect sources, run them through bundlers, write the result.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Source files, globs, or directories to bundle.
    pub source: Vec<String>,

    /// Raw content to bundle instead of reading sources.
    #[arg(long, conflicts_with = "source")]
    pub content: Option<String>,

    /// Output destination; may contain [name] and [ext] tokens.
    #[arg(short = 'O', long)]
    pub output: Option<String>,

    /// Comma-separated bundler chain (defaults to concat).
    #[arg(short = 'B', long)]
    pub bundlers: Option<String>,

    /// Working directory for relative sources.
    #[arg(short = 'R', long)]
    pub cwd: Option<PathBuf>,

    /// Base directory for relative fan-out output paths.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Configuration source: path or path:selector (stak.toml profiles).
    #[arg(short = 'C', long)]
    pub config: Option<String>,

    /// Profile selector: "all" or a comma-separated list of names.
    #[arg(short = 'P', long)]
    pub profiles: Option<String>,

    /// Watch sources and re-bundle on change.
    #[arg(short = 'W', long)]
    pub watch: bool,

    /// Bundle each source file into its own output.
    #[arg(short = 'E', long)]
    pub stak_each_file: bool,

    /// Extra paths to watch beyond the sources.
    #[arg(long)]
    pub watch_path: Vec<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stak=info",
        1 => "stak=debug",
        _ => "stak=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the bundling request described by the CLI arguments.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let request = StakRequest {
        source: cli.source,
        content: cli.content,
        output: cli.output,
        // Without a config source the chain defaults to concat; with one,
        // an unset -B must not clobber the profile's own chain.
        bundler_refs: cli
            .bundlers
            .or_else(|| cli.config.is_none().then(|| "concat".into())),
        cwd: cli.cwd,
        root: cli.root,
        config: cli.config,
        profiles: cli.profiles,
        stak_each_file: cli.stak_each_file.then_some(true),
        watch: cli.watch.then_some(true),
        watch_paths: cli.watch_path,
        ..StakRequest::default()
    };

    let mut registry = BundlerRegistry::new();
    registry.register("concat", Arc::new(ConcatBundler));

    let outcome = stak_core::execute(request, Arc::new(registry))
        .await
        .map_err(|e| eyre!(e))?;

    report(&outcome);

    let summaries = outcome.into_summaries();
    let failed = summaries.iter().filter(|s| !s.success).count();
    let mut watchers: Vec<_> = summaries
        .into_iter()
        .filter_map(|mut summary| summary.watcher.take())
        .collect();

    // Watchers outlive the initial run; a failed sibling profile must not
    // tear them down.
    if !watchers.is_empty() {
        info!("watching; press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| eyre!("cannot listen for shutdown signal: {e}"))?;
        for watcher in &mut watchers {
            watcher.close();
        }
        for watcher in watchers {
            watcher.closed().await;
        }
    }

    if failed > 0 {
        return Err(eyre!("{failed} profile(s) failed"));
    }
    Ok(())
}

/// Print a one-line result per profile.
fn report(outcome: &ExecuteOutcome) {
    for summary in outcome.summaries() {
        match &summary.error {
            Some(e) => println!("  {}: failed ({e})", summary.id),
            None if !summary.success => {
                println!("  {}: finished without content", summary.id)
            }
            None => {
                let outputs = summary
                    .all
                    .iter()
                    .filter_map(|stak| stak.output.as_ref())
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if outputs.is_empty() {
                    println!(
                        "  {}: bundled {} stak(s) in {:.1}s",
                        summary.id,
                        summary.all.len(),
                        summary.elapsed.as_secs_f64()
                    );
                } else {
                    println!(
                        "  {}: wrote {} in {:.1}s",
                        summary.id,
                        outputs,
                        summary.elapsed.as_secs_f64()
                    );
                }
            }
        }
    }
}
