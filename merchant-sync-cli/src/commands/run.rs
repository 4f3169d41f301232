//! `merchant-sync [--dry-run]`: one sync pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use merchant_sync_engine::{RunMode, RunReport, SyncEngine};

use super::ConfigArgs;
use crate::images::resolver_for;
use crate::merchant::MerchantClient;
use crate::odoo::OdooSource;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Read, transform and validate everything but upload nothing and leave
    /// the state file alone. Accepted before or after `run`.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let config = config_args
            .load()?
            .resolve(self.dry_run)
            .context("invalid configuration")?;

        let images = resolver_for(&config.odoo.images, &config.catalog.base_url);
        let mut source = OdooSource::connect(&config.odoo, images)
            .with_context(|| format!("cannot connect to Odoo at {}", config.odoo.url))?;

        let mut client = match (&config.merchant, config.dry_run) {
            (Some(settings), false) => {
                let mut client = MerchantClient::new(settings);
                client.preflight().with_context(|| {
                    format!("cannot use the Merchant API at {}", settings.endpoint)
                })?;
                Some(client)
            }
            _ => None,
        };
        let mode = match client.as_mut() {
            Some(client) => RunMode::Live(client),
            None => RunMode::DryRun,
        };

        let mut engine = SyncEngine::new(config.catalog.clone(), config.sync.clone());
        let report = engine.run(&mut source, mode).context("sync run aborted")?;
        print_report(&report);
        Ok(())
    }
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "offer")]
    offer: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "attempts")]
    attempts: u32,
    #[tabled(rename = "message")]
    message: String,
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    if let Some(warning) = &report.state_warning {
        println!("{} {warning}", "warning:".yellow().bold());
    }

    if report.dry_run {
        println!(
            "{prefix}{} fetched | {} would upload | {} skipped",
            report.fetched, report.would_upload, report.skipped
        );
    } else {
        println!(
            "{} fetched | {} created | {} updated ({} unchanged) | {} skipped | {}",
            report.fetched,
            report.created.to_string().green(),
            report.updated.to_string().green(),
            report.unchanged,
            report.skipped,
            if report.failed > 0 {
                format!("{} failed", report.failed).red().bold().to_string()
            } else {
                "0 failed".to_string()
            }
        );
    }

    for skip in &report.skipped_details {
        println!("  ·  {} skipped: {} {}", skip.offer_id, skip.field, skip.reason);
    }

    if !report.failures.is_empty() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                offer: f.offer_id.to_string(),
                kind: f.kind.clone(),
                attempts: f.attempts,
                message: f.message.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}
