use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use cw_accept::CriteriaTable;
use cw_ambient::SimulatedLogger;
use cw_core::{DriftOrder, MassUnit, SessionConfig, SessionContext, WeighingScheme};
use cw_seq::{
    CancellationToken, SequenceObserver, SimulatedBalance, SteppedClock, WeighingSequencer,
};
use cw_session::{weigh_scheme_entry, SchemeJob};
use cw_store::WeighingStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::info;

use super::print_json;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// YAML session configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Folder receiving the weighing document.
    #[arg(long)]
    pub folder: PathBuf,
    /// Client name used in the document file name.
    #[arg(long, default_value = "client")]
    pub client: String,
    /// Scheme entry to weigh.
    #[arg(long)]
    pub scheme: String,
    /// Nominal mass of each weight group in grams.
    #[arg(long)]
    pub nominal_g: f64,
    /// Balance identity from the configuration.
    #[arg(long)]
    pub balance: String,
    /// Good runs required.
    #[arg(long, default_value_t = 2)]
    pub target: u32,
    /// Force a drift order instead of selecting automatically.
    #[arg(long)]
    pub drift: Option<DriftOrder>,
    /// Spread of the simulated true masses around nominal, in micrograms.
    #[arg(long, default_value_t = 50.0)]
    pub spread_ug: f64,
    /// Balance drift per reading, in micrograms.
    #[arg(long, default_value_t = 0.2)]
    pub drift_ug: f64,
    /// Reading noise half-width, in micrograms.
    #[arg(long, default_value_t = 0.1)]
    pub noise_ug: f64,
    /// Seconds between successive readings.
    #[arg(long, default_value_t = 40)]
    pub step_secs: u64,
    /// Seed for masses, noise and ambient jitter.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

struct ProgressLog;

impl SequenceObserver for ProgressLog {
    fn on_progress(&mut self, cycle: usize, position: usize, num_cycles: usize, num_wtgrps: usize) {
        info!(
            cycle = cycle + 1,
            position = position + 1,
            num_cycles,
            num_wtgrps,
            "loading"
        );
    }

    fn on_reading(&mut self, value: f64, unit: MassUnit) {
        info!(value, unit = unit.symbol(), "stable reading");
    }
}

fn simulated_masses(
    scheme: &WeighingScheme,
    nominal_g: f64,
    unit: MassUnit,
    spread_ug: f64,
    rng: &mut StdRng,
) -> BTreeMap<String, f64> {
    let mut masses = BTreeMap::new();
    for index in 0..scheme.num_wtgrps() {
        let weights = scheme.weights_in(index);
        let share_ug = nominal_g * 1e6 / weights.len() as f64;
        for weight in weights {
            let offset_ug = if spread_ug > 0.0 {
                rng.gen_range(-spread_ug..=spread_ug)
            } else {
                0.0
            };
            masses
                .entry(weight.to_string())
                .or_insert((share_ug + offset_ug) / unit.micrograms_per_unit());
        }
    }
    masses
}

pub fn run(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let config = SessionConfig::load(&args.config)?;
    let spec = config.balance(&args.balance)?.clone();
    let mut session = SessionContext::new(args.client.as_str(), args.folder.as_path(), config);
    session.drift = args.drift;
    let scheme = WeighingScheme::parse(&args.scheme)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let masses = simulated_masses(&scheme, args.nominal_g, spec.unit, args.spread_ug, &mut rng);
    let per_ug = spec.unit.micrograms_per_unit();
    let balance =
        SimulatedBalance::new(spec.id.as_str(), spec.mode, spec.unit, masses.clone(), args.seed)
            .with_drift(args.drift_ug / per_ug)
            .with_noise(args.noise_ug / per_ug);
    let logger = SimulatedLogger::new(20.0, 50.0, 0.05, args.seed);
    let clock = SteppedClock::new(Duration::from_secs(args.step_secs));

    let file_stem = format!("{}g", args.nominal_g);
    let url = session.document_path(&file_stem);
    let mut store = WeighingStore::open(&url, scheme.scheme_entry())?;
    let criteria = CriteriaTable::new(&session.config);
    let mut sequencer = WeighingSequencer::new(&session, balance, logger, clock);
    let job = SchemeJob {
        scheme: scheme.clone(),
        nominal_mass_g: args.nominal_g,
        target_good_runs: args.target,
        allocated_positions: spec
            .mode
            .requires_position_allocation()
            .then(|| (1..=scheme.num_wtgrps()).collect()),
    };
    let report = weigh_scheme_entry(
        &session,
        &mut store,
        &mut sequencer,
        &job,
        &criteria,
        &CancellationToken::new(),
        &mut ProgressLog,
    )?;

    print_json(&json!({
        "document": url.display().to_string(),
        "scheme_entry": scheme.scheme_entry(),
        "true_masses": masses,
        "unit": spec.unit.symbol(),
        "report": report,
    }))
}
