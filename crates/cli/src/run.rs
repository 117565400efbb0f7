//! `tally run`, `tally validate`, `tally conflicts`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tally_rollup::engine::Pipeline;
use tally_rollup::{Publisher, RetryPolicy, RunOutput};

use crate::context::{load_config, load_records, Loaded};
use crate::exit_codes::{engine_exit_code, EXIT_ERROR, EXIT_PUBLISH, EXIT_USAGE};
use crate::CliError;

pub struct RunArgs {
    pub inputs: Vec<PathBuf>,
    pub dry_run: bool,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub report: bool,
    pub as_of: Option<String>,
}

fn parse_as_of(raw: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match raw {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| CliError {
                code: EXIT_USAGE,
                message: format!("invalid --as-of '{s}': {e}"),
                hint: Some("use RFC 3339, e.g. 2026-10-19T06:00:00Z".into()),
            }),
    }
}

fn pipeline(loaded: &Loaded) -> Result<Pipeline, CliError> {
    Pipeline::from_config(&loaded.config).map_err(|e| CliError {
        code: engine_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError { code: EXIT_ERROR, message: format!("JSON serialization error: {e}"), hint: None })
}

fn print_report(out: &RunOutput) {
    let r = &out.report;
    eprintln!("records read:   {}", r.records_read);
    eprintln!("excluded:       {}", r.excluded);
    for (reason, count) in &r.exclusions {
        eprintln!("  {reason:<18} {count}");
    }
    eprintln!("identifiers:    {}", r.identifiers);
    eprintln!("conflicts:      {} ({} records dropped)", r.conflicts, r.dropped_records);
    for res in &r.resolutions {
        eprintln!("  {}: kept {:?} over {:?} ({})", res.identifier, res.winner, res.dropped, res.reason);
    }
    eprintln!("projects:       {}", r.projects);
}

pub fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<(), CliError> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let loaded = load_config(config_path)?;
    let pipeline = pipeline(&loaded)?;
    let records = load_records(&loaded, &args.inputs)?;

    let out = pipeline.run(&records, as_of);

    if let Some(ref path) = args.output {
        let summary_json = to_json(&out.summary)?;
        std::fs::write(path, format!("{summary_json}\n")).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("cannot write {}: {e}", path.display()),
            hint: None,
        })?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{}", to_json(&out)?);
    }

    if args.report {
        print_report(&out);
    }

    let s = &out.summary;
    eprintln!(
        "{}: {} records, {} excluded, {} conflicts, {} projects, sales {:.2}, cost {:.2}, hours {:.2}",
        pipeline.name(),
        out.report.records_read,
        out.report.excluded,
        out.report.conflicts,
        s.project_count,
        s.total_sales,
        s.total_cost,
        s.total_hours,
    );

    if args.dry_run {
        eprintln!("dry run: summary not published");
        return Ok(());
    }

    let publish = &loaded.config.publish;
    let store = tally_store::open_summary_store(publish, &loaded.base_dir).map_err(|e| CliError {
        code: EXIT_PUBLISH,
        message: e.to_string(),
        hint: None,
    })?;
    let receipt = Publisher::new(store, publish.doc_id.as_str(), RetryPolicy::from_config(publish))
        .publish(&out.summary)
        .map_err(|e| CliError {
            code: engine_exit_code(&e),
            message: e.to_string(),
            hint: Some("the previous summary is unchanged".into()),
        })?;

    eprintln!(
        "published {} ({} attempt{})",
        receipt.doc_id,
        receipt.attempts,
        if receipt.attempts == 1 { "" } else { "s" },
    );
    Ok(())
}

pub fn cmd_validate(config_path: Option<&Path>) -> Result<(), CliError> {
    let loaded = load_config(config_path)?;
    // Compiles patterns and field maps too
    pipeline(&loaded)?;

    let c = &loaded.config;
    let source = match c.source.kind {
        tally_rollup::config::StoreKind::File => format!("{} file(s)", c.source.files.len()),
        tally_rollup::config::StoreKind::Http => format!(
            "http collection '{}'",
            c.source.collection.as_deref().unwrap_or_default()
        ),
    };
    eprintln!(
        "valid: '{}' from {} (source: {}, publish: {} '{}', {} priority status(es), tie-break {})",
        c.name,
        loaded.describe(),
        source,
        c.publish.kind,
        c.publish.doc_id,
        c.resolver.priority_statuses.len(),
        c.resolver.tie_break,
    );
    Ok(())
}

pub fn cmd_conflicts(config_path: Option<&Path>, inputs: &[PathBuf], json: bool) -> Result<(), CliError> {
    let loaded = load_config(config_path)?;
    let pipeline = pipeline(&loaded)?;
    let records = load_records(&loaded, inputs)?;
    let out = pipeline.run(&records, Utc::now());
    let resolutions = &out.report.resolutions;

    if json {
        println!("{}", to_json(resolutions)?);
        return Ok(());
    }

    for res in resolutions {
        println!(
            "{}\tkept {}\tdropped {}\t{} record(s)\t{}",
            res.identifier,
            res.winner,
            res.dropped.join(", "),
            res.dropped_records,
            res.reason,
        );
    }
    eprintln!(
        "{} competing claim(s) across {} identifier(s)",
        resolutions.len(),
        out.report.identifiers
    );
    Ok(())
}
