use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use cw_accept::CriteriaTable;
use cw_core::{DriftOrder, WeighingScheme};
use cw_session::analyse_and_record;
use cw_store::WeighingStore;
use serde_json::json;

use super::{print_json, session_for};

#[derive(Args, Debug)]
pub struct AnalyseArgs {
    /// YAML session configuration with the balance criteria.
    #[arg(long)]
    pub config: PathBuf,
    /// Weighing document holding the run.
    #[arg(long)]
    pub document: PathBuf,
    /// Scheme entry, e.g. "1a 1b 1c 1d".
    #[arg(long)]
    pub scheme: String,
    /// Run identifier.
    #[arg(long)]
    pub run: u32,
    /// Force a drift order (none, linear, quadratic, cubic); selected
    /// automatically when omitted.
    #[arg(long)]
    pub drift: Option<DriftOrder>,
}

pub fn run(args: &AnalyseArgs) -> Result<(), Box<dyn Error>> {
    let mut session = session_for(&args.config, &args.document)?;
    session.drift = args.drift;
    let scheme = WeighingScheme::parse(&args.scheme)?;
    let mut store = WeighingStore::open(&args.document, scheme.scheme_entry())?;
    let criteria = CriteriaTable::new(&session.config);
    let (record, verdict) = analyse_and_record(&mut store, &scheme, args.run, &session, &criteria)?;
    print_json(&json!({
        "scheme_entry": scheme.scheme_entry(),
        "backup": store.backup_path().map(|p| p.display().to_string()),
        "analysis": record,
        "verdict": verdict,
    }))
}
