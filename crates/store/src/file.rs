//! Local-file adapters: exports in, summary document out.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tally_rollup::source::{load_csv_records_with_delimiter, load_json_records};
use tally_rollup::{RawRecord, RecordSource, StoreError, SummaryStore};

use crate::encoding::{read_file_as_utf8, sniff_delimiter};

/// Reads one or more CSV/JSON exports as a single snapshot.
///
/// Format is chosen by extension: `.json` is parsed as JSON, anything else
/// as delimited text with a sniffed delimiter.
#[derive(Debug, Clone)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn load(path: &Path) -> Result<Vec<RawRecord>, StoreError> {
        let text = read_file_as_utf8(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let records = if is_json {
            load_json_records(&name, &text)
        } else {
            load_csv_records_with_delimiter(&name, &text, sniff_delimiter(&text))
        };
        records.map_err(|e| StoreError::permanent(e.to_string()))
    }
}

impl RecordSource for FileSource {
    fn describe(&self) -> String {
        match self.paths.as_slice() {
            [one] => one.display().to_string(),
            many => format!("{} files", many.len()),
        }
    }

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        if self.paths.is_empty() {
            return Err(StoreError::permanent("no input files configured"));
        }
        let mut all = Vec::new();
        for path in &self.paths {
            let records = Self::load(path)?;
            log::info!("read {} records from {}", records.len(), path.display());
            all.extend(records);
        }
        Ok(all)
    }
}

/// Writes each document to `<dir>/<doc_id>.json`, replacing it whole.
///
/// The body goes to a hidden sibling first and is renamed over the target,
/// so readers see either the previous summary or the new one.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn document_path(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.json"))
    }
}

fn io_error(context: &str, path: &Path, err: std::io::Error) -> StoreError {
    let message = format!("{context} {}: {err}", path.display());
    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            StoreError::transient(message)
        }
        _ => StoreError::permanent(message),
    }
}

impl SummaryStore for FileDocumentStore {
    fn replace_document(&self, doc_id: &str, body: &Value) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("cannot create", &self.dir, e))?;

        let target = self.document_path(doc_id);
        let tmp = self.dir.join(format!(".{doc_id}.json.tmp"));

        let mut text = serde_json::to_string_pretty(body)
            .map_err(|e| StoreError::permanent(format!("cannot serialize {doc_id}: {e}")))?;
        text.push('\n');

        std::fs::write(&tmp, text).map_err(|e| io_error("cannot write", &tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error("cannot replace", &target, e));
        }
        Ok(())
    }
}
