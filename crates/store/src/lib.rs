//! Store adapters for `tally-rollup`: local files and a REST document store.
//!
//! Both sides are blocking. The engine sees them only through
//! [`RecordSource`] and [`SummaryStore`].

pub mod encoding;
pub mod file;
pub mod http;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_rollup::config::{PublishConfig, SourceConfig, StoreKind};
use tally_rollup::{RecordSource, StoreError, SummaryStore};

pub use file::{FileDocumentStore, FileSource};
pub use http::HttpDocumentStore;

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Build the configured record source. Relative file paths resolve against
/// `base_dir` (the config file's directory).
pub fn open_source(config: &SourceConfig, base_dir: &Path) -> Result<Box<dyn RecordSource>, StoreError> {
    match config.kind {
        StoreKind::File => {
            let paths = config.files.iter().map(|f| resolve_path(base_dir, f)).collect();
            Ok(Box::new(FileSource::new(paths)))
        }
        StoreKind::Http => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| StoreError::permanent("source.url is not set"))?;
            let collection = config
                .collection
                .as_deref()
                .ok_or_else(|| StoreError::permanent("source.collection is not set"))?;
            let store = HttpDocumentStore::new(url)?
                .with_collection(collection, config.page_size)
                .with_page_delay(Duration::from_millis(config.page_delay_ms))
                .with_token(config.token.as_deref());
            Ok(Box::new(store))
        }
    }
}

/// Build the configured summary destination.
pub fn open_summary_store(config: &PublishConfig, base_dir: &Path) -> Result<Box<dyn SummaryStore>, StoreError> {
    match config.kind {
        StoreKind::File => Ok(Box::new(FileDocumentStore::new(resolve_path(base_dir, &config.dir)))),
        StoreKind::Http => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| StoreError::permanent("publish.url is not set"))?;
            Ok(Box::new(HttpDocumentStore::new(url)?.with_token(config.token.as_deref())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_base_dir() {
        let base = Path::new("/etc/tally");
        assert_eq!(resolve_path(base, "exports/a.csv"), PathBuf::from("/etc/tally/exports/a.csv"));
        assert_eq!(resolve_path(base, "/data/a.csv"), PathBuf::from("/data/a.csv"));
    }

    #[test]
    fn file_source_from_config() {
        let config = SourceConfig {
            files: vec!["a.csv".into(), "b.json".into()],
            ..SourceConfig::default()
        };
        let source = open_source(&config, Path::new("/srv")).unwrap();
        assert_eq!(source.describe(), "2 files");
    }

    #[test]
    fn http_source_needs_url() {
        let config = SourceConfig {
            kind: StoreKind::Http,
            collection: Some("items".into()),
            ..SourceConfig::default()
        };
        assert!(open_source(&config, Path::new(".")).is_err());
    }
}
