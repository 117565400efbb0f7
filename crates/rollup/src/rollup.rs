//! Dashboard rollups.
//!
//! Dollar totals are project-level: they come from [`ProjectAggregate`]s.
//! Hour-by-category breakdowns are line-item-level: they come from the
//! resolved line items, so a project's hours are not collapsed into its
//! representative's category.

use std::collections::BTreeMap;

use regex::Regex;

use crate::config::RollupConfig;
use crate::error::EngineError;
use crate::model::{ContractorTotals, DashboardSummary, LineItem, ProjectAggregate, StatusGroup};

/// Compiled form of [`RollupConfig`].
#[derive(Debug, Clone)]
pub struct RollupRules {
    labor_status: String,
    pmc_status: String,
    pm_category: Regex,
    uncategorized_label: String,
    unknown_status_label: String,
}

impl RollupRules {
    pub fn new(config: &RollupConfig) -> Result<Self, EngineError> {
        let pm_category = Regex::new(&config.pm_category_pattern).map_err(|e| {
            EngineError::ConfigValidation(format!("rollup.pm_category_pattern: {e}"))
        })?;
        Ok(Self {
            labor_status: config.labor_status.trim().to_lowercase(),
            pmc_status: config.pmc_status.trim().to_lowercase(),
            pm_category,
            uncategorized_label: config.uncategorized_label.clone(),
            unknown_status_label: config.unknown_status_label.clone(),
        })
    }

    fn status_key(&self, status: &str) -> String {
        let status = status.trim();
        if status.is_empty() {
            self.unknown_status_label.clone()
        } else {
            status.to_string()
        }
    }

    fn category_key(&self, category: &str) -> String {
        let category = category.trim();
        if category.is_empty() {
            self.uncategorized_label.clone()
        } else {
            category.to_string()
        }
    }

    fn feeds_labor_breakdown(&self, item: &LineItem) -> bool {
        item.status.trim().to_lowercase() == self.labor_status
    }

    fn feeds_pmc_hours(&self, item: &LineItem) -> bool {
        self.pm_category.is_match(item.cost_category.trim())
            || item.status.trim().to_lowercase() == self.pmc_status
    }
}

/// Build the dashboard summary from project aggregates and the resolved
/// line items they were summed from. `last_updated` is stamped verbatim.
pub fn build_summary(
    projects: &[ProjectAggregate],
    items: &[LineItem],
    rules: &RollupRules,
    last_updated: &str,
) -> DashboardSummary {
    let mut total_sales = 0.0;
    let mut total_cost = 0.0;
    let mut total_hours = 0.0;
    let mut status_groups: BTreeMap<String, StatusGroup> = BTreeMap::new();
    let mut contractors: BTreeMap<String, ContractorTotals> = BTreeMap::new();

    for project in projects {
        total_sales += project.sales;
        total_cost += project.cost;
        total_hours += project.hours;

        let status = rules.status_key(&project.status);
        status_groups.entry(status.clone()).or_default().totals.add(project);

        let contractor = contractors.entry(project.customer.clone()).or_default();
        contractor.totals.add(project);
        contractor.by_status.entry(status).or_default().add(project);
    }

    let mut pmc_group_hours: BTreeMap<String, f64> = BTreeMap::new();
    let mut labor_breakdown: BTreeMap<String, f64> = BTreeMap::new();

    for item in items {
        let category = rules.category_key(&item.cost_category);

        *status_groups
            .entry(rules.status_key(&item.status))
            .or_default()
            .labor_by_group
            .entry(category.clone())
            .or_insert(0.0) += item.hours;

        if rules.feeds_pmc_hours(item) {
            *pmc_group_hours.entry(category.clone()).or_insert(0.0) += item.hours;
        }
        if rules.feeds_labor_breakdown(item) {
            *labor_breakdown.entry(category).or_insert(0.0) += item.hours;
        }
    }

    DashboardSummary {
        total_sales,
        total_cost,
        total_hours,
        project_count: projects.len(),
        line_item_count: items.len(),
        status_groups,
        contractors,
        pmc_group_hours,
        labor_breakdown,
        last_updated: last_updated.to_string(),
    }
}
