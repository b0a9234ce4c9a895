//! `stb ledger list`: read the persisted batch ledger without the bot.

use anyhow::{Context, Result};
use stb_reconcile::BatchLedger;
use stb_store::FsBlobStore;

pub fn list(data_dir: &str) -> Result<()> {
    let store =
        FsBlobStore::open(data_dir).with_context(|| format!("open data dir {}", data_dir))?;
    let ledger = BatchLedger::load(&store)?;

    println!("batches={}", ledger.len());
    for batch in ledger.batches() {
        println!(
            "batch_id={} created_at_utc={} teams={}",
            batch.id,
            batch.created_at.to_rfc3339(),
            batch.teams.len()
        );
    }
    print!("{}", ledger.render_list());
    Ok(())
}
