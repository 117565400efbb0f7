//! Record snapshots: the read side of a run.

use serde_json::{Map, Value};

use crate::error::{EngineError, StoreError};
use crate::model::RawRecord;

/// Anything that can hand over a full snapshot of the line-item collection.
///
/// Reads are never retried: a failed read aborts the run before anything
/// is published.
pub trait RecordSource {
    /// Short human-readable name used in logs and errors.
    fn describe(&self) -> String;

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError>;
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        (**self).fetch_all()
    }
}

impl<T: RecordSource + ?Sized> RecordSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        (**self).fetch_all()
    }
}

/// In-memory snapshot, mostly for tests and piping.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    records: Vec<RawRecord>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self { name: name.into(), records }
    }
}

impl RecordSource for MemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self.records.clone())
    }
}

/// Load a CSV export with a comma delimiter. See
/// [`load_csv_records_with_delimiter`].
pub fn load_csv_records(source_name: &str, csv_data: &str) -> Result<Vec<RawRecord>, EngineError> {
    load_csv_records_with_delimiter(source_name, csv_data, b',')
}

/// Load a CSV export into raw records.
///
/// Every cell becomes a JSON string; typing happens later in the value
/// parser. Short rows are allowed, blank rows are skipped. When a header
/// repeats, the first column with that name wins. An `id` column, if
/// present, becomes the record id; otherwise the id is `<source>:<line>`.
pub fn load_csv_records_with_delimiter(
    source_name: &str,
    csv_data: &str,
    delimiter: u8,
) -> Result<Vec<RawRecord>, EngineError> {
    let data = csv_data.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Source(format!("{source_name}: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let id_idx = headers.iter().position(|h| h.eq_ignore_ascii_case("id"));

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Source(format!("{source_name}: {e}")))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut fields = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            if header.is_empty() || fields.contains_key(header) {
                continue;
            }
            fields.insert(header.clone(), Value::String(cell.to_string()));
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let id = id_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{source_name}:{line}"));

        records.push(RawRecord { id: Some(id), fields });
    }

    Ok(records)
}

/// Load a JSON export into raw records.
///
/// Accepted shapes:
/// - an array of documents,
/// - an object mapping document id to document,
/// - `{ "documents": [...] }` as returned by the HTTP store.
///
/// A document may be flat or wrapped as `{ "id": ..., "fields": {...} }`.
pub fn load_json_records(source_name: &str, json_data: &str) -> Result<Vec<RawRecord>, EngineError> {
    let root: Value = serde_json::from_str(json_data.trim_start_matches('\u{feff}'))
        .map_err(|e| EngineError::Source(format!("{source_name}: invalid JSON: {e}")))?;

    let invalid = |what: &str| EngineError::Source(format!("{source_name}: {what}"));

    match root {
        Value::Array(docs) => docs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| document(source_name, None, doc, i).ok_or_else(|| invalid("array entries must be objects")))
            .collect(),
        Value::Object(mut map) => {
            let enveloped = map.get("documents").is_some_and(Value::is_array);
            if let Some(Value::Array(docs)) = enveloped.then(|| map.remove("documents")).flatten() {
                return docs
                    .into_iter()
                    .enumerate()
                    .map(|(i, doc)| {
                        document(source_name, None, doc, i).ok_or_else(|| invalid("documents must be objects"))
                    })
                    .collect();
            }
            map.into_iter()
                .enumerate()
                .map(|(i, (id, doc))| {
                    document(source_name, Some(id), doc, i).ok_or_else(|| invalid("map values must be objects"))
                })
                .collect()
        }
        _ => Err(invalid("expected an array or object of documents")),
    }
}

fn document(source_name: &str, key: Option<String>, doc: Value, index: usize) -> Option<RawRecord> {
    let Value::Object(mut obj) = doc else {
        return None;
    };

    let embedded_id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let fields = match obj.remove("fields") {
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            obj.insert("fields".into(), other);
            obj
        }
        None => obj,
    };

    let id = key
        .or(embedded_id)
        .unwrap_or_else(|| format!("{source_name}:{index}"));
    Some(RawRecord { id: Some(id), fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_cells_become_strings() {
        let csv = "\
Customer,Project Number,Sales
Acme,100,\"$1,200.00\"
Bolt,200,(50)
";
        let records = load_csv_records("export.csv", csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields["Customer"], json!("Acme"));
        assert_eq!(records[0].fields["Sales"], json!("$1,200.00"));
        assert_eq!(records[1].fields["Sales"], json!("(50)"));
        assert_eq!(records[0].id.as_deref(), Some("export.csv:2"));
        assert_eq!(records[1].id.as_deref(), Some("export.csv:3"));
    }

    #[test]
    fn csv_bom_blank_rows_and_short_rows() {
        let csv = "\u{feff}customer, status ,sales\nAcme,Accepted,10\n,,\nBolt\n";
        let records = load_csv_records("x", csv).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].fields.contains_key("customer"));
        assert!(records[0].fields.contains_key("status"));
        assert_eq!(records[1].fields.len(), 1);
    }

    #[test]
    fn csv_id_column_and_duplicate_headers() {
        let csv = "id,customer,customer\ndoc_1,First,Second\n";
        let records = load_csv_records("x", csv).unwrap();
        assert_eq!(records[0].id.as_deref(), Some("doc_1"));
        assert_eq!(records[0].fields["customer"], json!("First"));
    }

    #[test]
    fn csv_semicolon_delimiter() {
        let csv = "customer;sales\nAcme;10\n";
        let records = load_csv_records_with_delimiter("x", csv, b';').unwrap();
        assert_eq!(records[0].fields["sales"], json!("10"));
    }

    #[test]
    fn json_array() {
        let data = r#"[{"id": "a", "customer": "Acme", "sales": 10}, {"customer": "Bolt"}]"#;
        let records = load_json_records("dump.json", data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("a"));
        assert_eq!(records[0].fields["sales"], json!(10));
        assert_eq!(records[1].id.as_deref(), Some("dump.json:1"));
    }

    #[test]
    fn json_id_map() {
        let data = r#"{"doc_2": {"customer": "Bolt"}, "doc_1": {"customer": "Acme"}}"#;
        let records = load_json_records("x", data).unwrap();
        assert_eq!(records.len(), 2);
        let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert!(ids.contains(&"doc_1"));
        assert!(ids.contains(&"doc_2"));
    }

    #[test]
    fn json_documents_envelope_with_fields() {
        let data = r#"{"documents": [{"id": "d1", "fields": {"customer": "Acme"}}], "nextPageToken": null}"#;
        let records = load_json_records("x", data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("d1"));
        assert_eq!(records[0].fields["customer"], json!("Acme"));
        assert!(!records[0].fields.contains_key("id"));
    }

    #[test]
    fn json_rejects_scalars() {
        assert!(matches!(load_json_records("x", "42"), Err(EngineError::Source(_))));
        assert!(matches!(load_json_records("x", "[1, 2]"), Err(EngineError::Source(_))));
        assert!(matches!(load_json_records("x", "not json"), Err(EngineError::Source(_))));
    }

    #[test]
    fn memory_source_returns_snapshot() {
        let source = MemorySource::new("mem", vec![RawRecord::default()]);
        assert_eq!(source.describe(), "mem");
        assert_eq!(source.fetch_all().unwrap().len(), 1);
    }
}
