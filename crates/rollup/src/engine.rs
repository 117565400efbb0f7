use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::aggregate::aggregate_projects;
use crate::audit::{find_duplicates, DuplicateGroup};
use crate::config::TallyConfig;
use crate::error::EngineError;
use crate::exclude::ExclusionFilter;
use crate::model::{LineItem, RawRecord, RunOutput, RunReport};
use crate::record::FieldMap;
use crate::resolve::IdentityResolver;
use crate::rollup::{build_summary, RollupRules};

/// Reportable line items plus per-reason exclusion counts.
#[derive(Debug, Clone, Default)]
pub struct Filtered {
    pub items: Vec<LineItem>,
    pub exclusions: BTreeMap<String, usize>,
}

impl Filtered {
    pub fn excluded(&self) -> usize {
        self.exclusions.values().sum()
    }
}

/// Validated, compiled configuration. Build once, run as often as needed.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    fields: FieldMap,
    filter: ExclusionFilter,
    resolver: IdentityResolver,
    rules: RollupRules,
}

impl Pipeline {
    pub fn from_config(config: &TallyConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            fields: FieldMap::with_extra(&config.fields)?,
            filter: ExclusionFilter::new(&config.exclusion),
            resolver: IdentityResolver::new(&config.resolver),
            rules: RollupRules::new(&config.rollup)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type every raw record. Records without an id get `record:<index>`.
    pub fn parse(&self, records: &[RawRecord]) -> Vec<LineItem> {
        records
            .iter()
            .enumerate()
            .map(|(i, rec)| self.fields.line_item(rec, &format!("record:{i}")))
            .collect()
    }

    pub fn filter(&self, items: Vec<LineItem>) -> Filtered {
        let mut out = Filtered::default();
        for item in items {
            match self.filter.explain(&item) {
                Some(reason) => {
                    log::debug!("excluded {} ({reason})", item.source_id);
                    *out.exclusions.entry(reason.to_string()).or_insert(0) += 1;
                }
                None => out.items.push(item),
            }
        }
        out
    }

    /// Parse and filter: the line items a run would consider.
    pub fn reportable(&self, records: &[RawRecord]) -> Filtered {
        self.filter(self.parse(records))
    }

    /// Duplicate tuples among reportable line items. Read-only.
    pub fn audit(&self, records: &[RawRecord]) -> Vec<DuplicateGroup> {
        find_duplicates(&self.reportable(records).items)
    }

    /// Full recompute from a snapshot. Pure: the same records and `as_of`
    /// always produce the same output.
    pub fn run(&self, records: &[RawRecord], as_of: DateTime<Utc>) -> RunOutput {
        let filtered = self.reportable(records);
        let excluded = filtered.excluded();

        let resolved = self.resolver.resolve(filtered.items);
        let projects = aggregate_projects(&resolved.items);

        let last_updated = as_of.to_rfc3339_opts(SecondsFormat::Millis, true);
        let summary = build_summary(&projects, &resolved.items, &self.rules, &last_updated);

        log::info!(
            "{}: {} records, {} excluded, {} conflicts, {} projects",
            self.name,
            records.len(),
            excluded,
            resolved.resolutions.len(),
            projects.len(),
        );

        let report = RunReport {
            config_name: self.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            records_read: records.len(),
            excluded,
            exclusions: filtered.exclusions,
            identifiers: resolved.identifiers,
            conflicts: resolved.resolutions.len(),
            dropped_records: resolved.dropped_records,
            resolved_records: resolved.items.len(),
            projects: projects.len(),
            resolutions: resolved.resolutions,
        };

        RunOutput {
            summary,
            projects,
            report,
        }
    }
}

/// Validate `config` and run it over `records`.
pub fn run(
    config: &TallyConfig,
    records: &[RawRecord],
    as_of: DateTime<Utc>,
) -> Result<RunOutput, EngineError> {
    Ok(Pipeline::from_config(config)?.run(records, as_of))
}
