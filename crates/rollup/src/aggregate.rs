use std::collections::BTreeMap;

use crate::model::{LineItem, ProjectAggregate};

/// Running sums for one (identifier, customer) group.
struct Accumulator<'a> {
    representative: &'a LineItem,
    sales: f64,
    cost: f64,
    hours: f64,
    source_ids: Vec<String>,
}

/// Sum resolved line items into one aggregate per (project, customer).
///
/// The representative line item (status, name) is the one with the smallest
/// `project_name`; the earlier item wins ties. This is deliberately not the
/// resolver's recency rule. Aggregates come out ordered by identifier, then
/// customer.
pub fn aggregate_projects(items: &[LineItem]) -> Vec<ProjectAggregate> {
    let mut groups: BTreeMap<(&str, &str), Accumulator<'_>> = BTreeMap::new();

    for item in items {
        let key = (item.project_identifier(), item.customer.as_str());
        let acc = groups.entry(key).or_insert_with(|| Accumulator {
            representative: item,
            sales: 0.0,
            cost: 0.0,
            hours: 0.0,
            source_ids: Vec::new(),
        });
        if item.project_name < acc.representative.project_name {
            acc.representative = item;
        }
        acc.sales += item.sales;
        acc.cost += item.cost;
        acc.hours += item.hours;
        acc.source_ids.push(item.source_id.clone());
    }

    groups
        .into_values()
        .map(|acc| ProjectAggregate {
            customer: acc.representative.customer.clone(),
            project_number: acc.representative.project_number.clone(),
            project_name: acc.representative.project_name.clone(),
            status: acc.representative.status.clone(),
            sales: acc.sales,
            cost: acc.cost,
            hours: acc.hours,
            line_items: acc.source_ids.len(),
            source_ids: acc.source_ids,
        })
        .collect()
}
