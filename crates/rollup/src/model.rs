use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::resolve::Resolution;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One document exactly as a store or export delivered it. The store makes
/// no type guarantees, so every field stays a JSON value until parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub id: Option<String>,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: Some(id.into()), fields }
    }
}

/// A typed line item: one cost category row of one project.
///
/// Built once from a [`RawRecord`] and never mutated afterwards; every later
/// stage derives new structures from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub source_id: String,
    pub customer: String,
    pub project_number: String,
    pub project_name: String,
    pub status: String,
    pub cost_category: String,
    pub cost_item: String,
    pub sales: f64,
    pub cost: f64,
    pub hours: f64,
    pub estimator: String,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl LineItem {
    /// `project_number` when present, else `project_name`. Used to detect
    /// competing customer claims on the same project.
    pub fn project_identifier(&self) -> &str {
        if self.project_number.is_empty() {
            &self.project_name
        } else {
            &self.project_number
        }
    }
}

// ---------------------------------------------------------------------------
// Per-project aggregate
// ---------------------------------------------------------------------------

/// Summed, de-conflicted totals for one (project, customer) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAggregate {
    pub customer: String,
    pub project_number: String,
    pub project_name: String,
    pub status: String,
    pub sales: f64,
    pub cost: f64,
    pub hours: f64,
    pub line_items: usize,
    #[serde(skip)]
    pub source_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Dashboard summary
// ---------------------------------------------------------------------------

/// Sales/cost/hours/count accumulator used by every dollar rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub sales: f64,
    pub cost: f64,
    pub hours: f64,
    pub count: usize,
}

impl Totals {
    pub fn add(&mut self, project: &ProjectAggregate) {
        self.sales += project.sales;
        self.cost += project.cost;
        self.hours += project.hours;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusGroup {
    #[serde(flatten)]
    pub totals: Totals,
    /// Hours per cost category, from line items (not project aggregates).
    pub labor_by_group: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorTotals {
    #[serde(flatten)]
    pub totals: Totals,
    pub by_status: BTreeMap<String, Totals>,
}

/// The single published rollup document. Always recomputed in full.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_sales: f64,
    pub total_cost: f64,
    pub total_hours: f64,
    pub project_count: usize,
    pub line_item_count: usize,
    pub status_groups: BTreeMap<String, StatusGroup>,
    pub contractors: BTreeMap<String, ContractorTotals>,
    pub pmc_group_hours: BTreeMap<String, f64>,
    pub labor_breakdown: BTreeMap<String, f64>,
    pub last_updated: String,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// Diagnostics for one run: what was dropped and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub config_name: String,
    pub engine_version: String,
    pub records_read: usize,
    pub excluded: usize,
    pub exclusions: BTreeMap<String, usize>,
    pub identifiers: usize,
    pub conflicts: usize,
    pub dropped_records: usize,
    pub resolved_records: usize,
    pub projects: usize,
    pub resolutions: Vec<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub summary: DashboardSummary,
    pub projects: Vec<ProjectAggregate>,
    pub report: RunReport,
}
