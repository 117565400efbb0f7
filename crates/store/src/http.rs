//! REST document store client.
//!
//! Blocking reqwest client (no Tokio runtime required). Collection reads
//! page sequentially with a fixed pause between pages; summary writes are a
//! single full-document `PUT`.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tally_rollup::{RawRecord, RecordSource, StoreError, SummaryStore};

pub const TOKEN_ENV: &str = "TALLY_STORE_TOKEN";
const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Document store client (blocking).
#[derive(Clone)]
pub struct HttpDocumentStore {
    http: reqwest::blocking::Client,
    base_url: String,
    collection: Option<String>,
    token: Option<String>,
    page_size: usize,
    page_delay: Duration,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::permanent(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: None,
            token: None,
            page_size: 500,
            page_delay: Duration::ZERO,
        })
    }

    pub fn with_collection(mut self, collection: &str, page_size: usize) -> Self {
        self.collection = Some(collection.to_string());
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Use `token` if given, else `TALLY_STORE_TOKEN` if set.
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token
            .map(str::to_string)
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty());
        self
    }

    fn authorize(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(
        &self,
        what: &str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let response = self
            .authorize(req)
            .send()
            .map_err(|e| StoreError::transient(format!("{what}: network error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().unwrap_or_default();
        let body = body.trim();
        let message = if body.is_empty() {
            format!("{what}: HTTP {code}")
        } else {
            format!("{what}: HTTP {code}: {}", body.chars().take(200).collect::<String>())
        };

        if code == 429 || status.is_server_error() {
            Err(StoreError::transient(message))
        } else {
            Err(StoreError::permanent(message))
        }
    }

    fn fetch_page(&self, collection: &str, page_token: Option<&str>) -> Result<Page, StoreError> {
        let url = format!("{}/collections/{}/documents", self.base_url, collection);
        let mut query = vec![("pageSize", self.page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.send(&format!("list {collection}"), self.http.get(&url).query(&query))?;
        let text = response
            .text()
            .map_err(|e| StoreError::transient(format!("list {collection}: cannot read body: {e}")))?;
        serde_json::from_str(text.trim_start_matches('\u{feff}'))
            .map_err(|e| StoreError::permanent(format!("list {collection}: malformed page: {e}")))
    }
}

impl RecordSource for HttpDocumentStore {
    fn describe(&self) -> String {
        match &self.collection {
            Some(c) => format!("{}/collections/{c}", self.base_url),
            None => self.base_url.clone(),
        }
    }

    fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        let collection = self
            .collection
            .as_deref()
            .ok_or_else(|| StoreError::permanent("no collection configured for reads"))?;

        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = BTreeSet::new();
        let mut pages = 0usize;

        loop {
            if pages > 0 && !self.page_delay.is_zero() {
                thread::sleep(self.page_delay);
            }
            let page = self.fetch_page(collection, page_token.as_deref())?;
            pages += 1;
            log::debug!("{collection}: page {pages}, {} documents", page.documents.len());

            records.extend(
                page.documents
                    .into_iter()
                    .map(|doc| RawRecord::new(doc.id, doc.fields)),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(StoreError::permanent(format!(
                        "list {collection}: server repeated page token {next:?}"
                    )));
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        log::info!("read {} records from {collection} in {pages} pages", records.len());
        Ok(records)
    }
}

impl SummaryStore for HttpDocumentStore {
    fn replace_document(&self, doc_id: &str, body: &Value) -> Result<(), StoreError> {
        let url = format!("{}/documents/{}", self.base_url, doc_id);
        self.send(&format!("write {doc_id}"), self.http.put(&url).json(body))?;
        Ok(())
    }
}
