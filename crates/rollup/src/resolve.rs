//! Competing-claim resolution.
//!
//! Line items are grouped by project identifier. When more than one customer
//! claims an identifier, exactly one customer's records survive:
//!
//! 1. **Status priority**: customers are visited in ascending name order;
//!    the first one holding any priority status (won or active work) wins,
//!    regardless of dates.
//! 2. **Recency**: otherwise the customer whose newest dated record is the
//!    latest wins. Undated customers rank below every dated one.
//! 3. **Tie-break**: equal latest dates (or nothing dated at all) fall to the
//!    configured [`TieBreak`] rule.
//!
//! Dropped records are only left out of this run's aggregates. Nothing is
//! deleted from storage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ResolverConfig, TieBreak};
use crate::model::LineItem;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionReason {
    PriorityStatus { status: String },
    MostRecent { date: DateTime<Utc> },
    TieBreak { rule: TieBreak, date: Option<DateTime<Utc>> },
}

impl std::fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PriorityStatus { status } => write!(f, "priority status '{status}'"),
            Self::MostRecent { date } => write!(f, "most recent record {}", date.to_rfc3339()),
            Self::TieBreak { rule, date: Some(date) } => {
                write!(f, "tie on {} broken by {rule}", date.to_rfc3339())
            }
            Self::TieBreak { rule, date: None } => write!(f, "no dated records, broken by {rule}"),
        }
    }
}

/// One resolved competing claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub identifier: String,
    pub winner: String,
    pub dropped: Vec<String>,
    pub dropped_records: usize,
    pub reason: ResolutionReason,
}

/// Resolver output: surviving line items plus what was decided along the way.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    /// Identifiers ascending, each winner's records in input order.
    pub items: Vec<LineItem>,
    pub resolutions: Vec<Resolution>,
    pub identifiers: usize,
    pub dropped_records: usize,
}

/// Customer → indices into the input slice, ordered by customer name.
type Claims = BTreeMap<String, Vec<usize>>;

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    priority: Vec<String>,
    tie_break: TieBreak,
}

impl IdentityResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            priority: config
                .priority_statuses
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            tie_break: config.tie_break,
        }
    }

    pub fn is_priority(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        self.priority.iter().any(|p| *p == status)
    }

    pub fn resolve(&self, items: Vec<LineItem>) -> ResolvedSet {
        let mut groups: BTreeMap<String, Claims> = BTreeMap::new();
        for (idx, item) in items.iter().enumerate() {
            groups
                .entry(item.project_identifier().to_string())
                .or_default()
                .entry(item.customer.clone())
                .or_default()
                .push(idx);
        }

        let mut survivors: Vec<&[usize]> = Vec::with_capacity(groups.len());
        let mut resolutions = Vec::new();
        let mut dropped_records = 0;

        for (identifier, claims) in &groups {
            if claims.len() == 1 {
                survivors.extend(claims.values().map(Vec::as_slice));
                continue;
            }

            let (winner, reason) = self.select(&items, claims);
            let dropped: Vec<String> = claims.keys().filter(|c| *c != winner).cloned().collect();
            let dropped_count: usize = claims
                .iter()
                .filter(|(c, _)| *c != winner)
                .map(|(_, idxs)| idxs.len())
                .sum();

            log::info!(
                "identifier {identifier:?}: kept {winner:?} over {dropped:?} ({reason})"
            );

            survivors.push(claims[winner].as_slice());
            dropped_records += dropped_count;
            resolutions.push(Resolution {
                identifier: identifier.clone(),
                winner: winner.to_string(),
                dropped,
                dropped_records: dropped_count,
                reason,
            });
        }

        let mut slots: Vec<Option<LineItem>> = items.into_iter().map(Some).collect();
        let mut kept = Vec::with_capacity(slots.len() - dropped_records);
        for idxs in survivors {
            for &idx in idxs {
                if let Some(item) = slots[idx].take() {
                    kept.push(item);
                }
            }
        }

        ResolvedSet {
            items: kept,
            resolutions,
            identifiers: groups.len(),
            dropped_records,
        }
    }

    /// Pick the surviving customer among two or more claims.
    fn select<'c>(&self, items: &[LineItem], claims: &'c Claims) -> (&'c str, ResolutionReason) {
        for (customer, idxs) in claims {
            if let Some(item) = idxs.iter().map(|&i| &items[i]).find(|it| self.is_priority(&it.status)) {
                return (
                    customer.as_str(),
                    ResolutionReason::PriorityStatus { status: item.status.clone() },
                );
            }
        }

        let latest: Vec<(&'c str, Option<DateTime<Utc>>)> = claims
            .iter()
            .map(|(customer, idxs)| {
                let newest = idxs.iter().filter_map(|&i| items[i].date_created).max();
                (customer.as_str(), newest)
            })
            .collect();

        // Option ordering ranks None below any date
        let best = latest.iter().map(|(_, d)| *d).max().flatten();
        let contenders: Vec<&'c str> = latest
            .iter()
            .filter(|(_, d)| *d == best)
            .map(|(c, _)| *c)
            .collect();

        if let ([only], Some(date)) = (contenders.as_slice(), best) {
            return (*only, ResolutionReason::MostRecent { date });
        }

        let winner = self.break_tie(items, claims, &contenders);
        (winner, ResolutionReason::TieBreak { rule: self.tie_break, date: best })
    }

    fn break_tie<'c>(&self, items: &[LineItem], claims: &'c Claims, contenders: &[&'c str]) -> &'c str {
        // contenders arrive in name order; the first is the smallest name
        let first = contenders.first().copied().unwrap_or("");
        match self.tie_break {
            TieBreak::CustomerName => first,
            TieBreak::HighestSales => {
                let sales_of = |customer: &str| -> f64 {
                    claims
                        .get(customer)
                        .map(|idxs| idxs.iter().map(|&i| items[i].sales).sum())
                        .unwrap_or(0.0)
                };
                let mut best = first;
                let mut best_sales = sales_of(first);
                for &customer in contenders.iter().skip(1) {
                    let sales = sales_of(customer);
                    if sales > best_sales {
                        best = customer;
                        best_sales = sales;
                    }
                }
                best
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_date;

    fn item(customer: &str, ident: &str, status: &str, sales: f64, date: Option<&str>) -> LineItem {
        LineItem {
            source_id: format!("{customer}-{ident}-{sales}"),
            customer: customer.into(),
            project_number: ident.into(),
            project_name: format!("Project {ident}"),
            status: status.into(),
            cost_category: "General".into(),
            cost_item: String::new(),
            sales,
            cost: 0.0,
            hours: 0.0,
            estimator: String::new(),
            date_created: date.and_then(parse_date),
            date_updated: None,
            archived: false,
        }
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(&ResolverConfig::default())
    }

    fn customers(set: &ResolvedSet) -> Vec<&str> {
        set.items.iter().map(|i| i.customer.as_str()).collect()
    }

    #[test]
    fn single_customer_passes_through() {
        let items = vec![
            item("A", "1", "Estimating", 10.0, None),
            item("A", "1", "Estimating", 20.0, None),
            item("B", "2", "Lost", 5.0, None),
        ];
        let set = resolver().resolve(items);
        assert_eq!(set.items.len(), 3);
        assert!(set.resolutions.is_empty());
        assert_eq!(set.identifiers, 2);
        assert_eq!(set.dropped_records, 0);
    }

    #[test]
    fn priority_status_beats_recency() {
        let items = vec![
            item("B", "X", "In Progress", 2000.0, None),
            item("A", "X", "Bid Submitted", 1000.0, Some("2026-10-18")),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["B"]);
        assert_eq!(set.dropped_records, 1);
        let res = &set.resolutions[0];
        assert_eq!(res.winner, "B");
        assert_eq!(res.dropped, vec!["A"]);
        assert_eq!(
            res.reason,
            ResolutionReason::PriorityStatus { status: "In Progress".into() }
        );
    }

    #[test]
    fn priority_match_is_case_insensitive() {
        let items = vec![
            item("A", "X", "Bid Submitted", 1.0, Some("2026-02-01")),
            item("B", "X", " complete ", 1.0, None),
        ];
        assert_eq!(customers(&resolver().resolve(items)), vec!["B"]);
    }

    #[test]
    fn first_priority_customer_by_name_wins() {
        let items = vec![
            item("Zeta", "X", "Accepted", 1.0, Some("2026-03-01")),
            item("Alpha", "X", "Complete", 1.0, Some("2025-01-01")),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["Alpha"]);
    }

    #[test]
    fn recency_fallback_picks_latest() {
        let items = vec![
            item("A", "Y", "Bid Submitted", 100.0, Some("2026-01-01")),
            item("B", "Y", "Bid Submitted", 50.0, Some("2026-02-01")),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["B"]);
        assert!(matches!(set.resolutions[0].reason, ResolutionReason::MostRecent { .. }));
    }

    #[test]
    fn recency_uses_each_customers_newest_record() {
        let items = vec![
            item("A", "Y", "Estimating", 1.0, Some("2025-06-01")),
            item("A", "Y", "Estimating", 1.0, Some("2026-03-01")),
            item("A", "Y", "Estimating", 1.0, None),
            item("B", "Y", "Estimating", 1.0, Some("2026-02-01")),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["A", "A", "A"]);
    }

    #[test]
    fn undated_customer_loses_to_dated() {
        let items = vec![
            item("A", "Y", "Estimating", 999.0, None),
            item("B", "Y", "Estimating", 1.0, Some("2020-01-01")),
        ];
        assert_eq!(customers(&resolver().resolve(items)), vec!["B"]);
    }

    #[test]
    fn all_undated_picks_first_name() {
        let items = vec![
            item("Charlie", "Y", "Estimating", 1.0, None),
            item("Bravo", "Y", "Estimating", 1.0, None),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["Bravo"]);
        assert_eq!(
            set.resolutions[0].reason,
            ResolutionReason::TieBreak { rule: TieBreak::CustomerName, date: None }
        );
    }

    #[test]
    fn date_tie_by_customer_name() {
        let items = vec![
            item("Beta", "Y", "Estimating", 500.0, Some("2026-02-01")),
            item("Alpha", "Y", "Estimating", 100.0, Some("2026-02-01")),
            item("Gamma", "Y", "Estimating", 900.0, Some("2026-01-01")),
        ];
        let set = resolver().resolve(items);
        assert_eq!(customers(&set), vec!["Alpha"]);
        assert_eq!(set.resolutions[0].dropped, vec!["Beta", "Gamma"]);
    }

    #[test]
    fn date_tie_by_highest_sales() {
        let resolver = IdentityResolver::new(&ResolverConfig {
            tie_break: TieBreak::HighestSales,
            ..ResolverConfig::default()
        });
        let items = vec![
            item("Alpha", "Y", "Estimating", 100.0, Some("2026-02-01")),
            item("Beta", "Y", "Estimating", 300.0, Some("2026-02-01")),
            item("Beta", "Y", "Estimating", 200.0, Some("2026-01-15")),
            item("Gamma", "Y", "Estimating", 9000.0, Some("2026-01-01")),
        ];
        let set = resolver.resolve(items);
        assert_eq!(customers(&set), vec!["Beta", "Beta"]);
    }

    #[test]
    fn highest_sales_tie_falls_back_to_name() {
        let resolver = IdentityResolver::new(&ResolverConfig {
            tie_break: TieBreak::HighestSales,
            ..ResolverConfig::default()
        });
        let items = vec![
            item("Beta", "Y", "Estimating", 100.0, None),
            item("Alpha", "Y", "Estimating", 100.0, None),
        ];
        assert_eq!(customers(&resolver.resolve(items)), vec!["Alpha"]);
    }

    #[test]
    fn empty_customer_is_a_claimant() {
        let items = vec![
            item("", "Z", "Estimating", 1.0, None),
            item("", "Z", "Estimating", 2.0, None),
        ];
        let set = resolver().resolve(items);
        assert_eq!(set.items.len(), 2);

        let items = vec![
            item("", "Z", "Estimating", 1.0, None),
            item("Acme", "Z", "Accepted", 2.0, None),
        ];
        assert_eq!(customers(&resolver().resolve(items)), vec!["Acme"]);
    }

    #[test]
    fn output_is_grouped_by_identifier_in_input_order() {
        let items = vec![
            item("A", "2", "Estimating", 1.0, None),
            item("B", "1", "Estimating", 2.0, None),
            item("A", "2", "Estimating", 3.0, None),
        ];
        let set = resolver().resolve(items);
        let sales: Vec<f64> = set.items.iter().map(|i| i.sales).collect();
        assert_eq!(sales, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn input_order_does_not_change_winner() {
        let a = item("A", "Y", "Estimating", 1.0, Some("2026-02-01"));
        let b = item("B", "Y", "Estimating", 1.0, Some("2026-02-01"));
        let forward = resolver().resolve(vec![a.clone(), b.clone()]);
        let backward = resolver().resolve(vec![b, a]);
        assert_eq!(customers(&forward), customers(&backward));
    }
}
