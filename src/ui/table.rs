use crate::migrate::{MigrationPlan, MigrationReport, Verification};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn metrics_table(rows: &[(&str, String)]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let rows: Vec<TableRow> = rows
        .iter()
        .map(|(metric, value)| TableRow {
            metric: metric.to_string(),
            value: value.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn yes_no(flag: bool) -> String {
    let answer = if flag { "yes" } else { "no" };
    answer.to_string()
}

pub fn report_table(report: &MigrationReport) -> String {
    metrics_table(&[
        ("Backfilled versions", report.backfilled.to_string()),
        ("Dependencies", report.dependencies.to_string()),
        ("Re-keyed", report.rekeyed.to_string()),
        ("Already deterministic", report.unchanged.to_string()),
        ("Links rewritten", report.links_rewritten.to_string()),
        ("Duplicate-content groups", report.duplicate_groups.to_string()),
    ])
}

pub fn plan_table(plan: &MigrationPlan) -> String {
    metrics_table(&[
        ("Backfill candidates", plan.backfill_candidates.to_string()),
        ("Dependencies", plan.dependencies.to_string()),
        ("To re-key", plan.to_rekey.to_string()),
        ("Already deterministic", plan.already_deterministic.to_string()),
        ("Duplicate-content groups", plan.duplicate_groups.to_string()),
        ("Foreign key present", yes_no(plan.constraint_present)),
    ])
}

pub fn verification_table(verification: &Verification) -> String {
    metrics_table(&[
        ("Dependencies", verification.dependencies.to_string()),
        ("Non-deterministic ids", verification.mismatched.len().to_string()),
        ("Orphaned links", verification.orphaned_links.to_string()),
        ("Foreign key present", yes_no(verification.constraint_present)),
    ])
}
