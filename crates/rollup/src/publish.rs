//! Summary publishing.
//!
//! The summary is one document, fully replaced on every run. Only the write
//! is retried; reads never are.

use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::config::PublishConfig;
use crate::error::{EngineError, StoreError};
use crate::model::DashboardSummary;

/// Destination that can replace a whole document by id.
pub trait SummaryStore {
    fn replace_document(&self, doc_id: &str, body: &Value) -> Result<(), StoreError>;
}

impl<T: SummaryStore + ?Sized> SummaryStore for &T {
    fn replace_document(&self, doc_id: &str, body: &Value) -> Result<(), StoreError> {
        (**self).replace_document(doc_id, body)
    }
}

impl<T: SummaryStore + ?Sized> SummaryStore for Box<T> {
    fn replace_document(&self, doc_id: &str, body: &Value) -> Result<(), StoreError> {
        (**self).replace_document(doc_id, body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub doc_id: String,
    pub attempts: u32,
}

pub struct Publisher<S> {
    store: S,
    doc_id: String,
    policy: RetryPolicy,
}

impl<S: SummaryStore> Publisher<S> {
    pub fn new(store: S, doc_id: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            store,
            doc_id: doc_id.into(),
            policy,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Replace the summary document. Transient failures are retried with a
    /// fixed delay up to `max_attempts`; permanent failures return at once.
    pub fn publish(&self, summary: &DashboardSummary) -> Result<PublishReceipt, EngineError> {
        let body = serde_json::to_value(summary)
            .map_err(|e| EngineError::Serialize(e.to_string()))?;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.replace_document(&self.doc_id, &body) {
                Ok(()) => {
                    log::info!("published {} (attempt {attempt})", self.doc_id);
                    return Ok(PublishReceipt {
                        doc_id: self.doc_id.clone(),
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    log::warn!(
                        "publish {} failed, retry {}/{} in {}ms: {}",
                        self.doc_id,
                        attempt,
                        max_attempts - 1,
                        self.policy.backoff.as_millis(),
                        err.message,
                    );
                    thread::sleep(self.policy.backoff);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(EngineError::Publish {
                        attempts: attempt,
                        message: err.message,
                    });
                }
            }
        }
    }
}
