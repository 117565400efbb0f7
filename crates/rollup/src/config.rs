use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::record::FieldMap;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TallyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub exclusion: ExclusionConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
    /// Extra header spellings per logical field, e.g. `customer = ["Sub"]`.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

fn default_name() -> String {
    "dashboard".into()
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: SourceConfig::default(),
            publish: PublishConfig::default(),
            exclusion: ExclusionConfig::default(),
            resolver: ResolverConfig::default(),
            rollup: RollupConfig::default(),
            fields: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source + Publish targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Local CSV/JSON snapshot files (source) or a directory of JSON documents (publish).
    #[default]
    File,
    /// REST document store.
    Http,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Snapshot files for `kind = "file"`, relative to the config file.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause between page requests, to stay under provider rate limits.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

fn default_page_size() -> usize {
    500
}

fn default_page_delay_ms() -> u64 {
    250
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            files: Vec::new(),
            url: None,
            collection: None,
            token: None,
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Output directory for `kind = "file"`, relative to the config file.
    #[serde(default = "default_publish_dir")]
    pub dir: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_doc_id")]
    pub doc_id: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_publish_dir() -> String {
    ".".into()
}

fn default_doc_id() -> String {
    "dashboard_summary".into()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            dir: default_publish_dir(),
            url: None,
            token: None,
            doc_id: default_doc_id(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Exclusion
// ---------------------------------------------------------------------------

/// Denylists for non-reportable records. Matching is on trimmed, lowercased text.
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default = "default_excluded_statuses")]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub customer_contains: Vec<String>,
    #[serde(default)]
    pub project_name_contains: Vec<String>,
    #[serde(default)]
    pub project_name_equals: Vec<String>,
    #[serde(default)]
    pub project_number_equals: Vec<String>,
    /// Drop records with neither a project number nor a project name.
    #[serde(default = "default_true")]
    pub require_project_identifier: bool,
}

fn default_excluded_statuses() -> Vec<String> {
    vec!["invitations".into(), "to do".into()]
}

fn default_true() -> bool {
    true
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            statuses: default_excluded_statuses(),
            customer_contains: Vec::new(),
            project_name_contains: Vec::new(),
            project_name_equals: Vec::new(),
            project_number_equals: Vec::new(),
            require_project_identifier: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Statuses that mark a won or active project. Case-insensitive.
    #[serde(default = "default_priority_statuses")]
    pub priority_statuses: Vec<String>,
    #[serde(default)]
    pub tie_break: TieBreak,
}

fn default_priority_statuses() -> Vec<String> {
    vec!["Accepted".into(), "In Progress".into(), "Complete".into()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            priority_statuses: default_priority_statuses(),
            tie_break: TieBreak::default(),
        }
    }
}

/// Rule applied when the recency fallback cannot separate customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lexicographically smallest customer name.
    #[default]
    CustomerName,
    /// Largest summed sales, then smallest customer name.
    HighestSales,
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CustomerName => write!(f, "customer_name"),
            Self::HighestSales => write!(f, "highest_sales"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RollupConfig {
    /// Line items with this status feed `laborBreakdown`.
    #[serde(default = "default_bid_status")]
    pub labor_status: String,
    /// Line items with this status feed `pmcGroupHours`.
    #[serde(default = "default_bid_status")]
    pub pmc_status: String,
    /// Categories matching this pattern feed `pmcGroupHours` under any status.
    #[serde(default = "default_pm_pattern")]
    pub pm_category_pattern: String,
    #[serde(default = "default_uncategorized")]
    pub uncategorized_label: String,
    #[serde(default = "default_unknown_status")]
    pub unknown_status_label: String,
}

fn default_bid_status() -> String {
    "Bid Submitted".into()
}

fn default_pm_pattern() -> String {
    r"(?i)^pm\b".into()
}

fn default_uncategorized() -> String {
    "Uncategorized".into()
}

fn default_unknown_status() -> String {
    "Unknown".into()
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            labor_status: default_bid_status(),
            pmc_status: default_bid_status(),
            pm_category_pattern: default_pm_pattern(),
            uncategorized_label: default_uncategorized(),
            unknown_status_label: default_unknown_status(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl TallyConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: TallyConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self
            .resolver
            .priority_statuses
            .iter()
            .any(|s| !s.trim().is_empty())
        {
            return Err(EngineError::ConfigValidation(
                "resolver.priority_statuses must name at least one status".into(),
            ));
        }

        regex::Regex::new(&self.rollup.pm_category_pattern).map_err(|e| {
            EngineError::ConfigValidation(format!("rollup.pm_category_pattern: {e}"))
        })?;

        if self.publish.max_attempts == 0 {
            return Err(EngineError::ConfigValidation(
                "publish.max_attempts must be at least 1".into(),
            ));
        }

        let doc_id = self.publish.doc_id.trim();
        if doc_id.is_empty() || doc_id.contains("..") || doc_id.contains(['/', '\\']) {
            return Err(EngineError::ConfigValidation(format!(
                "publish.doc_id '{}' must be a plain document name",
                self.publish.doc_id
            )));
        }

        if self.source.kind == StoreKind::Http {
            if self.source.url.is_none() {
                return Err(EngineError::ConfigValidation(
                    "source.url is required when source.kind = \"http\"".into(),
                ));
            }
            if self.source.collection.is_none() {
                return Err(EngineError::ConfigValidation(
                    "source.collection is required when source.kind = \"http\"".into(),
                ));
            }
            if self.source.page_size == 0 {
                return Err(EngineError::ConfigValidation(
                    "source.page_size must be at least 1".into(),
                ));
            }
        }

        if self.publish.kind == StoreKind::Http && self.publish.url.is_none() {
            return Err(EngineError::ConfigValidation(
                "publish.url is required when publish.kind = \"http\"".into(),
            ));
        }

        // Unknown field names surface here rather than at run time
        FieldMap::with_extra(&self.fields)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Estimating dashboard"

[source]
kind = "http"
url = "https://store.example.com/v1"
collection = "line_items"
page_size = 200
page_delay_ms = 100

[publish]
kind = "http"
url = "https://store.example.com/v1"
doc_id = "dashboard_summary"
max_attempts = 5
backoff_ms = 250

[exclusion]
statuses = ["Invitations", "To Do"]
customer_contains = ["test account"]
project_name_contains = ["sandbox"]
project_number_equals = ["999-test"]

[resolver]
priority_statuses = ["Accepted", "In Progress", "Complete"]
tie_break = "highest_sales"

[rollup]
labor_status = "Bid Submitted"
pm_category_pattern = "(?i)^pm"

[fields]
customer = ["Subcontractor"]
"#;

    #[test]
    fn parse_full() {
        let config = TallyConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Estimating dashboard");
        assert_eq!(config.source.kind, StoreKind::Http);
        assert_eq!(config.source.page_size, 200);
        assert_eq!(config.publish.max_attempts, 5);
        assert_eq!(config.resolver.tie_break, TieBreak::HighestSales);
        assert_eq!(config.exclusion.customer_contains, vec!["test account"]);
        assert!(config.exclusion.require_project_identifier);
        assert_eq!(config.fields["customer"], vec!["Subcontractor"]);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = TallyConfig::from_toml("").unwrap();
        assert_eq!(config.name, "dashboard");
        assert_eq!(config.source.kind, StoreKind::File);
        assert_eq!(config.publish.doc_id, "dashboard_summary");
        assert_eq!(config.publish.max_attempts, 3);
        assert_eq!(config.exclusion.statuses, vec!["invitations", "to do"]);
        assert_eq!(config.resolver.priority_statuses.len(), 3);
        assert_eq!(config.resolver.tie_break, TieBreak::CustomerName);
        assert_eq!(config.rollup.labor_status, "Bid Submitted");
    }

    #[test]
    fn reject_empty_priority_list() {
        let err = TallyConfig::from_toml("[resolver]\npriority_statuses = [\" \"]\n").unwrap_err();
        assert!(err.to_string().contains("priority_statuses"));
    }

    #[test]
    fn reject_bad_pattern() {
        let err = TallyConfig::from_toml("[rollup]\npm_category_pattern = \"(\"\n").unwrap_err();
        assert!(err.to_string().contains("pm_category_pattern"));
    }

    #[test]
    fn reject_zero_attempts() {
        let err = TallyConfig::from_toml("[publish]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn reject_http_source_without_url() {
        let err = TallyConfig::from_toml("[source]\nkind = \"http\"\ncollection = \"c\"\n").unwrap_err();
        assert!(err.to_string().contains("source.url"));
    }

    #[test]
    fn reject_path_like_doc_id() {
        let err = TallyConfig::from_toml("[publish]\ndoc_id = \"../summary\"\n").unwrap_err();
        assert!(err.to_string().contains("doc_id"));
    }

    #[test]
    fn reject_unknown_tie_break() {
        let err = TallyConfig::from_toml("[resolver]\ntie_break = \"newest\"\n");
        assert!(matches!(err, Err(EngineError::ConfigParse(_))));
    }

    #[test]
    fn reject_unknown_field_synonym() {
        let err = TallyConfig::from_toml("[fields]\nmargin = [\"gp\"]\n").unwrap_err();
        assert!(err.to_string().contains("margin"));
    }
}
