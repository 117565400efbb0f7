//! `tally audit`: report duplicate line items. Never modifies the store.

use std::path::{Path, PathBuf};

use tally_rollup::engine::Pipeline;

use crate::context::{load_config, load_records};
use crate::exit_codes::{engine_exit_code, EXIT_DUPLICATES, EXIT_ERROR};
use crate::CliError;

pub fn cmd_audit(
    config_path: Option<&Path>,
    inputs: &[PathBuf],
    json: bool,
    fail_on_duplicates: bool,
) -> Result<(), CliError> {
    let loaded = load_config(config_path)?;
    let pipeline = Pipeline::from_config(&loaded.config).map_err(|e| CliError {
        code: engine_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;
    let records = load_records(&loaded, inputs)?;
    let groups = pipeline.audit(&records);

    if json {
        let text = serde_json::to_string_pretty(&groups).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{text}");
    } else {
        for g in &groups {
            println!(
                "{} | {} | {} | {} | {}\t{} copies\tsales {:.2}\t{}",
                g.customer,
                g.project_number,
                g.project_name,
                g.cost_category,
                g.cost_item,
                g.record_ids.len(),
                g.total_sales,
                g.record_ids.join(","),
            );
        }
    }

    let extra: usize = groups.iter().map(|g| g.record_ids.len() - 1).sum();
    eprintln!(
        "{} duplicate group(s), {} redundant record(s) in {} records",
        groups.len(),
        extra,
        records.len()
    );

    if fail_on_duplicates && !groups.is_empty() {
        return Err(CliError {
            code: EXIT_DUPLICATES,
            message: format!("{} duplicate group(s) found", groups.len()),
            hint: Some(
                "exact copies are summed twice in project totals; customer spellings that differ \
                 only in case compete as separate claims and one loses"
                    .into(),
            ),
        });
    }
    Ok(())
}
