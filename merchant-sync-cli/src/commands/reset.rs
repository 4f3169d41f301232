//! `merchant-sync reset`: explicit removal of state entries.

use anyhow::{Context, Result};
use clap::Args;

use merchant_sync_core::OfferId;
use merchant_sync_engine::SyncState;

use super::ConfigArgs;

#[derive(Args, Debug, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct ResetArgs {
    /// Forget one offer (repeatable), e.g. `--offer odoo_42`.
    #[arg(long = "offer", value_name = "OFFER_ID")]
    pub offers: Vec<String>,

    /// Forget every record. Works even when the state file is corrupt.
    #[arg(long)]
    pub all: bool,
}

impl ResetArgs {
    pub fn run(self, config_args: &ConfigArgs) -> Result<()> {
        let path = config_args.load()?.state_file();

        if self.all {
            // An unreadable file is replaced rather than reported.
            let (mut state, cleared) = match SyncState::try_load_at(&path) {
                Ok(mut state) => {
                    let n = state.clear();
                    (state, Some(n))
                }
                Err(_) => (SyncState::empty(&path), None),
            };
            state
                .save()
                .with_context(|| format!("failed to write {}", path.display()))?;
            match cleared {
                Some(n) => println!("✓ cleared {n} record(s) from {}", path.display()),
                None => println!("✓ replaced unreadable state at {}", path.display()),
            }
            return Ok(());
        }

        let mut state = SyncState::try_load_at(&path)
            .with_context(|| format!("cannot read sync state at {}", path.display()))?;
        let mut removed = 0;
        for offer in &self.offers {
            if state.remove(&OfferId::from(offer.as_str())).is_some() {
                removed += 1;
            } else {
                println!("  ·  {offer} not in state");
            }
        }
        if removed > 0 {
            state
                .save()
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        println!("✓ removed {removed} record(s) from {}", path.display());
        Ok(())
    }
}
