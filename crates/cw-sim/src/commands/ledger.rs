use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use cw_accept::reconstruct_ledger;
use cw_core::WeighingScheme;
use cw_store::WeighingStore;
use serde_json::json;

use super::{print_json, session_for};

#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// YAML session configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Weighing document to scan.
    #[arg(long)]
    pub document: PathBuf,
    /// Scheme entry to scan.
    #[arg(long)]
    pub scheme: String,
}

pub fn run(args: &LedgerArgs) -> Result<(), Box<dyn Error>> {
    let session = session_for(&args.config, &args.document)?;
    let scheme = WeighingScheme::parse(&args.scheme)?;
    let store = WeighingStore::open(&args.document, scheme.scheme_entry())?;
    let ledger = reconstruct_ledger(&store, &session.config.acceptance)?;
    print_json(&json!({
        "scheme_entry": scheme.scheme_entry(),
        "runs": store.run_ids(),
        "ledger": ledger,
    }))
}
