//! Duplicate-document audit.
//!
//! Stores accumulate copies of the same line item over time (re-imports,
//! double saves). This report finds them; it never edits or deletes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::LineItem;

/// Line items sharing one uniqueness tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub customer: String,
    pub project_number: String,
    pub project_name: String,
    pub cost_category: String,
    pub cost_item: String,
    pub record_ids: Vec<String>,
    pub total_sales: f64,
}

type TupleKey = (String, String, String, String, String);

fn key(item: &LineItem) -> TupleKey {
    let norm = |s: &str| s.trim().to_lowercase();
    (
        norm(&item.customer),
        norm(&item.project_number),
        norm(&item.project_name),
        norm(&item.cost_category),
        norm(&item.cost_item),
    )
}

/// Group items by (customer, project number, project name, cost category,
/// cost item), compared trimmed and case-insensitively. Returns only groups
/// with more than one record, in tuple order. Display values come from the
/// first record of each group.
pub fn find_duplicates(items: &[LineItem]) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<TupleKey, Vec<&LineItem>> = BTreeMap::new();
    for item in items {
        groups.entry(key(item)).or_default().push(item);
    }

    groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|members| {
            let first = members[0];
            DuplicateGroup {
                customer: first.customer.clone(),
                project_number: first.project_number.clone(),
                project_name: first.project_name.clone(),
                cost_category: first.cost_category.clone(),
                cost_item: first.cost_item.clone(),
                record_ids: members.iter().map(|m| m.source_id.clone()).collect(),
                total_sales: members.iter().map(|m| m.sales).sum(),
            }
        })
        .collect()
}
