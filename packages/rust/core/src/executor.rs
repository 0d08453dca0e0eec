//! Stak Executor: runs one bundle record through its bundler chain and
//! writes the result.
//!
//! Bundlers run strictly in sequence — each depends on the prior's
//! output. The record is re-validated before every step because a bundler
//! could corrupt it; a violation aborts the stak with no partial output.

use std::path::PathBuf;

use tracing::{debug, instrument};

use stak_shared::{BundleRecord, BundlerRef, Result, StakError};

use crate::context::RunContext;

/// Run a single stak: the bundler chain, then the output write(s).
#[instrument(skip_all, fields(stak = %record.id))]
pub async fn run_stak(record: BundleRecord, ctx: &RunContext) -> Result<BundleRecord> {
    let mut record = record;
    let steps = record.bundlers.len();

    for i in 0..steps {
        record.validate()?;

        // A bundler may have replaced the chain; stop at its new end.
        let Some(spec) = record.bundlers.get(i) else {
            break;
        };

        let runner = match &spec.run {
            BundlerRef::Resolved(bundler) => bundler.clone(),
            BundlerRef::Named(reference) => {
                let resolved = ctx.registry.resolve(reference, &record.cwd)?;
                // Cache the callable back onto the descriptor; resolution
                // is idempotent and happens at most once per descriptor.
                if let Some(slot) = record.bundlers.get_mut(i) {
                    slot.run = BundlerRef::Resolved(resolved.clone());
                }
                resolved
            }
        };

        let spec = record.bundlers[i].clone();
        debug!(step = i, "running bundler");
        record = runner.bundle(record, &spec).await?;
    }

    if let Some(output) = record.output.clone() {
        write_output(&record, &output).await?;
    }
    Ok(record)
}

/// Write `content` to the output path and, concurrently, the source map
/// to `<output>.map` when present. Both writes must succeed before the
/// stak resolves.
async fn write_output(record: &BundleRecord, output: &PathBuf) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StakError::io(parent, e))?;
        }
    }

    let write_content = async {
        tokio::fs::write(output, record.content.as_bytes())
            .await
            .map_err(|e| StakError::io(output, e))
    };
    let write_map = async {
        match &record.source_map {
            Some(map) => {
                let map_path = sibling_map_path(output);
                tokio::fs::write(&map_path, map.as_bytes())
                    .await
                    .map_err(|e| StakError::io(&map_path, e))
            }
            None => Ok(()),
        }
    };
    tokio::try_join!(write_content, write_map)?;

    debug!(output = %output.display(), bytes = record.content.len(), "wrote output");
    Ok(())
}

/// `dist/bundle.css` → `dist/bundle.css.map`.
fn sibling_map_path(output: &PathBuf) -> PathBuf {
    let mut os = output.clone().into_os_string();
    os.push(".map");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use stak_shared::{BundlerSpec, FnBundler};
    use uuid::Uuid;

    use crate::registry::BundlerRegistry;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stak-executor-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(BundlerRegistry::new()))
    }

    fn record(content: &str, bundlers: Vec<BundlerSpec>) -> BundleRecord {
        BundleRecord {
            id: "test".into(),
            content: content.into(),
            bundlers,
            ..BundleRecord::default()
        }
    }

    #[tokio::test]
    async fn bundlers_run_in_order_with_sequential_content() {
        let set_x = FnBundler::spec(|mut r, _| {
            // First bundler sees the original input, untouched by later steps.
            assert_eq!(r.content, "input");
            r.content = "x".into();
            Ok(r)
        });
        let append_y = FnBundler::spec(|mut r, _| {
            r.content.push('y');
            Ok(r)
        });

        let result = run_stak(record("input", vec![set_x, append_y]), &ctx())
            .await
            .unwrap();
        assert_eq!(result.content, "xy");
    }

    #[tokio::test]
    async fn corrupted_record_aborts_before_next_bundler() {
        let corrupt = FnBundler::spec(|mut r, _| {
            r.source.clear();
            r.content.clear();
            Ok(r)
        });
        let never_runs = FnBundler::spec(|_r, _| -> Result<BundleRecord> {
            panic!("second bundler must not run after corruption");
        });

        let err = run_stak(record("input", vec![corrupt, never_runs]), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, StakError::Validation { .. }));
    }

    #[tokio::test]
    async fn failing_first_bundler_writes_no_output() {
        let dir = temp_dir();
        let output = dir.join("out.md");

        let fail = FnBundler::spec(|_r, _| Err(StakError::validation("boom")));
        let mut rec = record("input", vec![fail]);
        rec.output = Some(output.clone());

        assert!(run_stak(rec, &ctx()).await.is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn named_references_resolve_and_cache() {
        let mut registry = BundlerRegistry::new();
        registry.register(
            "upper",
            Arc::new(FnBundler::new(|mut r: BundleRecord, _: &BundlerSpec| {
                r.content = r.content.to_uppercase();
                Ok(r)
            })),
        );
        let ctx = RunContext::new(Arc::new(registry));

        let result = run_stak(record("abc", vec![BundlerSpec::named("upper")]), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "ABC");
        assert!(result.bundlers[0].run.is_resolved());
    }

    #[tokio::test]
    async fn unresolvable_reference_fails_the_stak() {
        let err = run_stak(record("abc", vec![BundlerSpec::named("nope")]), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, StakError::Resolution(_)));
    }

    #[tokio::test]
    async fn writes_output_and_source_map_together() {
        let dir = temp_dir();
        let output = dir.join("nested/deeper/out.css");

        let with_map = FnBundler::spec(|mut r, _| {
            r.source_map = Some("{\"version\":3}".into());
            Ok(r)
        });
        let mut rec = record("body {}", vec![with_map]);
        rec.output = Some(output.clone());

        run_stak(rec, &ctx()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "body {}");
        assert_eq!(
            std::fs::read_to_string(dir.join("nested/deeper/out.css.map")).unwrap(),
            "{\"version\":3}"
        );
    }

    #[tokio::test]
    async fn content_only_stak_skips_writing() {
        let passthrough = FnBundler::spec(|r, _| Ok(r));
        let result = run_stak(record("keep me", vec![passthrough]), &ctx())
            .await
            .unwrap();
        assert_eq!(result.content, "keep me");
        assert_eq!(result.output, None);
    }

    #[test]
    fn map_path_is_sibling_with_suffix() {
        assert_eq!(
            sibling_map_path(&PathBuf::from("dist/bundle.css")),
            Path::new("dist/bundle.css.map")
        );
    }
}
