//! `merchant-sync status`: read-only view of the sync state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use merchant_sync_engine::{Outcome, SyncRecordState, SyncState};

use super::ConfigArgs;

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Only list records whose last attempt failed.
    #[arg(long)]
    pub failed: bool,
}

impl StatusArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let path = config_args.load()?.state_file();
        let state = SyncState::try_load_at(&path)
            .with_context(|| format!("cannot read sync state at {}", path.display()))?;

        let summary = Summary::of(&state);
        let rows: Vec<RecordJson> = state
            .records()
            .iter()
            .filter(|(_, s)| !self.failed || s.outcome == Outcome::Failure)
            .map(|(id, s)| RecordJson::new(id.to_string(), s))
            .collect();

        if self.json {
            let payload = StatusJson {
                state_file: path.display().to_string(),
                saved_at: state.saved_at(),
                summary,
                records: rows,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&path.display().to_string(), state.saved_at(), &summary, rows);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    total: usize,
    success: usize,
    failure: usize,
    skipped: usize,
}

impl Summary {
    fn of(state: &SyncState) -> Self {
        let count = |o: Outcome| state.records().values().filter(|s| s.outcome == o).count();
        Self {
            total: state.len(),
            success: count(Outcome::Success),
            failure: count(Outcome::Failure),
            skipped: count(Outcome::Skipped),
        }
    }
}

#[derive(Serialize)]
struct StatusJson {
    state_file: String,
    saved_at: Option<DateTime<Utc>>,
    summary: Summary,
    records: Vec<RecordJson>,
}

#[derive(Serialize)]
struct RecordJson {
    offer_id: String,
    outcome: Outcome,
    last_attempt_at: DateTime<Utc>,
    attempts: u32,
    remote_id: Option<String>,
    last_error: Option<String>,
}

impl RecordJson {
    fn new(offer_id: String, s: &SyncRecordState) -> Self {
        Self {
            offer_id,
            outcome: s.outcome,
            last_attempt_at: s.last_attempt_at,
            attempts: s.attempts,
            remote_id: s.remote_id.as_ref().map(|r| r.to_string()),
            last_error: s.last_error.clone(),
        }
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "offer")]
    offer: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "last attempt")]
    last_attempt: String,
    #[tabled(rename = "attempts")]
    attempts: u32,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_table(
    state_file: &str,
    saved_at: Option<DateTime<Utc>>,
    summary: &Summary,
    rows: Vec<RecordJson>,
) {
    println!(
        "merchant-sync v{} | {} records | {} ok | {} failed | saved {}",
        env!("CARGO_PKG_VERSION"),
        summary.total,
        summary.success.to_string().green(),
        if summary.failure > 0 {
            summary.failure.to_string().red().bold()
        } else {
            summary.failure.to_string().normal()
        },
        saved_at.map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
    );
    println!("state: {state_file}");

    if rows.is_empty() {
        println!("No records.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|r| StatusTableRow {
            outcome: outcome_label(r.outcome),
            last_attempt: r.last_attempt_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            attempts: r.attempts,
            detail: r.last_error.or(r.remote_id).unwrap_or_default(),
            offer: r.offer_id,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn outcome_label(outcome: Outcome) -> String {
    match outcome {
        Outcome::Success => "SUCCESS".green().bold().to_string(),
        Outcome::Failure => "FAILURE".red().bold().to_string(),
        Outcome::Skipped => "SKIPPED".bright_black().to_string(),
    }
}
