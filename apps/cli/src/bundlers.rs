//! Built-in bundlers shipped with the CLI.

use async_trait::async_trait;

use stak_shared::{BundleRecord, Bundler, BundlerSpec, Result, StakError};

/// Default bundler: reads every source file and appends its text to the
/// record's content, in source order.
///
/// Accepts a `separator` option placed between concatenated files.
pub(crate) struct ConcatBundler;

#[async_trait]
impl Bundler for ConcatBundler {
    async fn bundle(&self, mut record: BundleRecord, spec: &BundlerSpec) -> Result<BundleRecord> {
        let separator = spec
            .options
            .get("separator")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned();

        for path in record.source.clone() {
            let full = if path.is_absolute() {
                path
            } else {
                record.cwd.join(&path)
            };
            let text = tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| StakError::io(&full, e))?;
            if !record.content.is_empty() && !separator.is_empty() {
                record.content.push_str(&separator);
            }
            record.content.push_str(&text);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stak-cli-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn concatenates_sources_in_order() {
        let dir = temp_dir();
        std::fs::write(dir.join("a.css"), "a{}").unwrap();
        std::fs::write(dir.join("b.css"), "b{}").unwrap();

        let record = BundleRecord {
            id: "t".into(),
            source: vec!["a.css".into(), "b.css".into()],
            cwd: dir,
            ..BundleRecord::default()
        };
        let spec = BundlerSpec::named("concat");
        let result = ConcatBundler.bundle(record, &spec).await.unwrap();
        assert_eq!(result.content, "a{}b{}");
    }

    #[tokio::test]
    async fn separator_option_joins_files() {
        let dir = temp_dir();
        std::fs::write(dir.join("a.md"), "one").unwrap();
        std::fs::write(dir.join("b.md"), "two").unwrap();

        let record = BundleRecord {
            id: "t".into(),
            source: vec!["a.md".into(), "b.md".into()],
            cwd: dir,
            ..BundleRecord::default()
        };
        let spec = BundlerSpec::named("concat").with_options(
            [("separator".to_string(), serde_json::json!("\n"))]
                .into_iter()
                .collect(),
        );
        let result = ConcatBundler.bundle(record, &spec).await.unwrap();
        assert_eq!(result.content, "one\ntwo");
    }

    #[tokio::test]
    async fn missing_source_file_is_an_io_error() {
        let record = BundleRecord {
            id: "t".into(),
            source: vec!["does-not-exist.css".into()],
            cwd: temp_dir(),
            ..BundleRecord::default()
        };
        let spec = BundlerSpec::named("concat");
        let err = ConcatBundler.bundle(record, &spec).await.unwrap_err();
        assert!(matches!(err, StakError::Io { .. }));
    }
}
