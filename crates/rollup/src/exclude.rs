use serde::Serialize;

use crate::config::ExclusionConfig;
use crate::model::LineItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Archived,
    Status,
    Customer,
    ProjectName,
    ProjectNumber,
    MissingIdentifier,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archived => write!(f, "archived"),
            Self::Status => write!(f, "status"),
            Self::Customer => write!(f, "customer"),
            Self::ProjectName => write!(f, "project_name"),
            Self::ProjectNumber => write!(f, "project_number"),
            Self::MissingIdentifier => write!(f, "missing_identifier"),
        }
    }
}

/// Pure predicate deciding whether a line item is reportable.
///
/// Denylist entries are lowercased and trimmed once here; blank entries are
/// dropped so an empty substring cannot exclude everything.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    statuses: Vec<String>,
    customer_contains: Vec<String>,
    project_name_contains: Vec<String>,
    project_name_equals: Vec<String>,
    project_number_equals: Vec<String>,
    require_project_identifier: bool,
}

fn normalized(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ExclusionFilter {
    pub fn new(config: &ExclusionConfig) -> Self {
        Self {
            statuses: normalized(&config.statuses),
            customer_contains: normalized(&config.customer_contains),
            project_name_contains: normalized(&config.project_name_contains),
            project_name_equals: normalized(&config.project_name_equals),
            project_number_equals: normalized(&config.project_number_equals),
            require_project_identifier: config.require_project_identifier,
        }
    }

    /// First reason the item is not reportable, if any.
    pub fn explain(&self, item: &LineItem) -> Option<ExclusionReason> {
        if item.archived {
            return Some(ExclusionReason::Archived);
        }

        let status = item.status.trim().to_lowercase();
        if self.statuses.contains(&status) {
            return Some(ExclusionReason::Status);
        }

        let customer = item.customer.to_lowercase();
        if self.customer_contains.iter().any(|s| customer.contains(s.as_str())) {
            return Some(ExclusionReason::Customer);
        }

        let name = item.project_name.trim().to_lowercase();
        if self.project_name_equals.contains(&name)
            || self.project_name_contains.iter().any(|s| name.contains(s.as_str()))
        {
            return Some(ExclusionReason::ProjectName);
        }

        let number = item.project_number.trim().to_lowercase();
        if self.project_number_equals.contains(&number) {
            return Some(ExclusionReason::ProjectNumber);
        }

        if self.require_project_identifier && item.project_identifier().is_empty() {
            return Some(ExclusionReason::MissingIdentifier);
        }

        None
    }

    pub fn is_excluded(&self, item: &LineItem) -> bool {
        self.explain(item).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(customer: &str, number: &str, name: &str, status: &str) -> LineItem {
        LineItem {
            source_id: "t".into(),
            customer: customer.into(),
            project_number: number.into(),
            project_name: name.into(),
            status: status.into(),
            cost_category: String::new(),
            cost_item: String::new(),
            sales: 0.0,
            cost: 0.0,
            hours: 0.0,
            estimator: String::new(),
            date_created: None,
            date_updated: None,
            archived: false,
        }
    }

    fn filter() -> ExclusionFilter {
        ExclusionFilter::new(&ExclusionConfig {
            statuses: vec!["Invitations".into(), " to do ".into()],
            customer_contains: vec!["test account".into(), "".into()],
            project_name_contains: vec!["sandbox".into()],
            project_name_equals: vec!["internal".into()],
            project_number_equals: vec!["999-test".into()],
            require_project_identifier: true,
        })
    }

    #[test]
    fn reportable_item_passes() {
        assert_eq!(filter().explain(&item("Acme", "100", "Library", "Bid Submitted")), None);
    }

    #[test]
    fn archived_excluded_first() {
        let mut it = item("Acme Test Account", "100", "Library", "Invitations");
        it.archived = true;
        assert_eq!(filter().explain(&it), Some(ExclusionReason::Archived));
    }

    #[test]
    fn status_denylist_ignores_case_and_padding() {
        let f = filter();
        assert_eq!(f.explain(&item("Acme", "1", "P", " INVITATIONS ")), Some(ExclusionReason::Status));
        assert_eq!(f.explain(&item("Acme", "1", "P", "To Do")), Some(ExclusionReason::Status));
    }

    #[test]
    fn customer_substring() {
        let it = item("ACME Test Account #2", "1", "P", "Estimating");
        assert_eq!(filter().explain(&it), Some(ExclusionReason::Customer));
    }

    #[test]
    fn blank_denylist_entry_matches_nothing() {
        assert!(!filter().is_excluded(&item("Anyone", "1", "P", "Estimating")));
    }

    #[test]
    fn project_name_equals_or_contains() {
        let f = filter();
        assert_eq!(f.explain(&item("A", "1", "Internal", "Estimating")), Some(ExclusionReason::ProjectName));
        assert_eq!(f.explain(&item("A", "1", "My Sandbox Job", "Estimating")), Some(ExclusionReason::ProjectName));
        assert_eq!(f.explain(&item("A", "1", "Internal Renovation", "Estimating")), None);
    }

    #[test]
    fn project_number_exact_only() {
        let f = filter();
        assert_eq!(f.explain(&item("A", "999-TEST", "P", "Estimating")), Some(ExclusionReason::ProjectNumber));
        assert_eq!(f.explain(&item("A", "999-test-2", "P", "Estimating")), None);
    }

    #[test]
    fn missing_identifier() {
        let f = filter();
        assert_eq!(f.explain(&item("A", "", "", "Estimating")), Some(ExclusionReason::MissingIdentifier));

        let lenient = ExclusionFilter::new(&ExclusionConfig {
            require_project_identifier: false,
            ..ExclusionConfig::default()
        });
        assert!(!lenient.is_excluded(&item("A", "", "", "Estimating")));
    }

    #[test]
    fn empty_customer_is_reportable() {
        assert!(!filter().is_excluded(&item("", "100", "Library", "Estimating")));
    }
}
