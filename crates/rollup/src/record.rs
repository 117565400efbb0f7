//! Raw record → [`LineItem`], tolerant of header drift between export versions.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::EngineError;
use crate::model::{LineItem, RawRecord};
use crate::value::{parse_bool, parse_date, parse_money};

/// Logical line-item fields the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Customer,
    ProjectNumber,
    ProjectName,
    Status,
    CostCategory,
    CostItem,
    Sales,
    Cost,
    Hours,
    Estimator,
    DateCreated,
    DateUpdated,
    Archived,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Customer,
        Field::ProjectNumber,
        Field::ProjectName,
        Field::Status,
        Field::CostCategory,
        Field::CostItem,
        Field::Sales,
        Field::Cost,
        Field::Hours,
        Field::Estimator,
        Field::DateCreated,
        Field::DateUpdated,
        Field::Archived,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::ProjectNumber => "projectNumber",
            Self::ProjectName => "projectName",
            Self::Status => "status",
            Self::CostCategory => "costCategory",
            Self::CostItem => "costItem",
            Self::Sales => "sales",
            Self::Cost => "cost",
            Self::Hours => "hours",
            Self::Estimator => "estimator",
            Self::DateCreated => "dateCreated",
            Self::DateUpdated => "dateUpdated",
            Self::Archived => "archived",
        }
    }

    /// Look up a field by canonical name, ignoring case and punctuation.
    pub fn from_name(name: &str) -> Option<Field> {
        let wanted = normalize_header(name);
        Self::ALL
            .into_iter()
            .find(|f| normalize_header(f.canonical_name()) == wanted)
    }

    /// Header spellings seen across export versions, already normalized.
    fn default_synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Customer => &["customer", "customername", "contractor", "gc", "client"],
            Self::ProjectNumber => &[
                "projectnumber",
                "projectno",
                "projectnum",
                "projectid",
                "project",
                "jobnumber",
                "jobno",
                "job",
            ],
            Self::ProjectName => &["projectname", "jobname", "projecttitle"],
            Self::Status => &["status", "projectstatus", "bidstatus", "stage"],
            Self::CostCategory => &["costcategory", "pmcgroup", "category", "costtype", "costgroup"],
            Self::CostItem => &["costitem", "costitemdescription", "description", "item", "lineitem"],
            Self::Sales => &["sales", "salesamount", "totalsales", "price", "sellprice"],
            Self::Cost => &["cost", "totalcost", "costamount"],
            Self::Hours => &["hours", "laborhours", "totalhours", "hrs"],
            Self::Estimator => &["estimator", "estimatedby"],
            Self::DateCreated => &["datecreated", "createdat", "created", "createddate"],
            Self::DateUpdated => &["dateupdated", "updatedat", "lastupdated", "modified"],
            Self::Archived => &["archived", "isarchived"],
        }
    }
}

/// Lowercase alphanumerics only: `"Project #"`, `"project_number"` and
/// `"projectNumber"` compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Header synonyms per logical field, in lookup priority order.
#[derive(Debug, Clone)]
pub struct FieldMap {
    synonyms: BTreeMap<Field, Vec<String>>,
}

impl Default for FieldMap {
    fn default() -> Self {
        let synonyms = Field::ALL
            .into_iter()
            .map(|f| (f, f.default_synonyms().iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { synonyms }
    }
}

impl FieldMap {
    /// Defaults plus the configured extra spellings (appended, lower priority).
    pub fn with_extra(extra: &BTreeMap<String, Vec<String>>) -> Result<Self, EngineError> {
        let mut map = Self::default();
        for (name, spellings) in extra {
            let field = Field::from_name(name).ok_or_else(|| {
                EngineError::ConfigValidation(format!("fields: unknown field '{name}'"))
            })?;
            let list = map.synonyms.entry(field).or_default();
            for spelling in spellings {
                let normalized = normalize_header(spelling);
                if !normalized.is_empty() && !list.contains(&normalized) {
                    list.push(normalized);
                }
            }
        }
        Ok(map)
    }

    /// Convert one raw record. `fallback_id` is used when the record has no id.
    pub fn line_item(&self, record: &RawRecord, fallback_id: &str) -> LineItem {
        let index = RecordIndex::new(record);
        let get = |field: Field| index.find(&self.synonyms[&field]);
        let text = |field: Field| get(field).map(text_value).unwrap_or_default();
        let money = |field: Field| get(field).map(parse_money).unwrap_or(0.0);

        LineItem {
            source_id: record.id.clone().unwrap_or_else(|| fallback_id.to_string()),
            customer: text(Field::Customer),
            project_number: text(Field::ProjectNumber),
            project_name: text(Field::ProjectName),
            status: text(Field::Status),
            cost_category: text(Field::CostCategory),
            cost_item: text(Field::CostItem),
            sales: money(Field::Sales),
            cost: money(Field::Cost),
            hours: money(Field::Hours),
            estimator: text(Field::Estimator),
            date_created: get(Field::DateCreated).and_then(parse_date),
            date_updated: get(Field::DateUpdated).and_then(parse_date),
            archived: get(Field::Archived).map(parse_bool).unwrap_or(false),
        }
    }
}

/// Normalized header → value for one record. First spelling wins.
struct RecordIndex<'a> {
    by_header: HashMap<String, &'a Value>,
}

impl<'a> RecordIndex<'a> {
    fn new(record: &'a RawRecord) -> Self {
        let mut by_header = HashMap::with_capacity(record.fields.len());
        for (key, value) in &record.fields {
            by_header.entry(normalize_header(key)).or_insert(value);
        }
        Self { by_header }
    }

    /// First synonym carrying a non-blank value.
    fn find(&self, synonyms: &[String]) -> Option<&'a Value> {
        synonyms
            .iter()
            .filter_map(|s| self.by_header.get(s).copied())
            .find(|v| !is_blank(v))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            // 2041.0 from a float-typed column is the same project as "2041"
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawRecord {
        RawRecord {
            id: None,
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn canonical_fields() {
        let rec = raw(json!({
            "customer": " Acme Builders ",
            "projectNumber": "100-X",
            "projectName": "Library",
            "status": "Bid Submitted",
            "costCategory": "PM Labor",
            "costItem": "Site visits",
            "sales": "$1,000.00",
            "cost": 400,
            "hours": "12.5",
            "estimator": "RK",
            "dateCreated": "2026-01-01",
            "archived": "no"
        }));
        let item = FieldMap::default().line_item(&rec, "test:1");
        assert_eq!(item.source_id, "test:1");
        assert_eq!(item.customer, "Acme Builders");
        assert_eq!(item.project_identifier(), "100-X");
        assert_eq!(item.sales, 1000.0);
        assert_eq!(item.cost, 400.0);
        assert_eq!(item.hours, 12.5);
        assert!(item.date_created.is_some());
        assert!(item.date_updated.is_none());
        assert!(!item.archived);
    }

    #[test]
    fn header_synonyms_from_older_exports() {
        let rec = raw(json!({
            "Contractor": "Beta GC",
            "Job #": "",
            "Project Number": 2041,
            "Job Name": "Clinic",
            "PMC Group": "Electrical",
            "Sales Amount": "(250)",
            "Labor Hours": "",
            "Is Archived": "Yes"
        }));
        let item = FieldMap::default().line_item(&rec, "x");
        assert_eq!(item.customer, "Beta GC");
        assert_eq!(item.project_number, "2041");
        assert_eq!(item.project_name, "Clinic");
        assert_eq!(item.cost_category, "Electrical");
        assert_eq!(item.sales, -250.0);
        assert_eq!(item.hours, 0.0);
        assert!(item.archived);
    }

    #[test]
    fn hash_headers_carry_project_number() {
        let rec = raw(json!({
            "Customer": "Acme",
            "Project #": "100-X",
            "Job #": "J-7",
            "Project Name": "Library"
        }));
        let item = FieldMap::default().line_item(&rec, "x");
        assert_eq!(item.project_number, "100-X");
        assert_eq!(item.project_identifier(), "100-X");

        let rec = raw(json!({ "Job #": "J-7", "Job Name": "Clinic" }));
        assert_eq!(FieldMap::default().line_item(&rec, "x").project_number, "J-7");
    }

    #[test]
    fn integral_float_numbers_match_integer_text() {
        let rec = raw(json!({ "projectNumber": 2041.0, "costItem": 12.5 }));
        let item = FieldMap::default().line_item(&rec, "x");
        assert_eq!(item.project_number, "2041");
        assert_eq!(item.cost_item, "12.5");

        let rec = raw(json!({ "projectNumber": -7.0 }));
        assert_eq!(FieldMap::default().line_item(&rec, "x").project_number, "-7");
    }

    #[test]
    fn blank_synonym_falls_through_to_next() {
        let rec = raw(json!({ "sales": "", "price": "75" }));
        let item = FieldMap::default().line_item(&rec, "x");
        assert_eq!(item.sales, 75.0);
    }

    #[test]
    fn identifier_falls_back_to_name() {
        let rec = raw(json!({ "projectName": "  Warehouse  " }));
        let item = FieldMap::default().line_item(&rec, "x");
        assert_eq!(item.project_identifier(), "Warehouse");
    }

    #[test]
    fn configured_synonyms_are_appended() {
        let extra = BTreeMap::from([("customer".to_string(), vec!["Sub Contractor".to_string()])]);
        let map = FieldMap::with_extra(&extra).unwrap();
        let rec = raw(json!({ "sub_contractor": "Gamma" }));
        assert_eq!(map.line_item(&rec, "x").customer, "Gamma");
    }

    #[test]
    fn unknown_configured_field_rejected() {
        let extra = BTreeMap::from([("margin".to_string(), vec!["gp".to_string()])]);
        let err = FieldMap::with_extra(&extra).unwrap_err();
        assert!(err.to_string().contains("unknown field 'margin'"));
    }

    #[test]
    fn record_id_wins_over_fallback() {
        let mut rec = raw(json!({ "customer": "A" }));
        rec.id = Some("doc_17".into());
        assert_eq!(FieldMap::default().line_item(&rec, "x").source_id, "doc_17");
    }
}
