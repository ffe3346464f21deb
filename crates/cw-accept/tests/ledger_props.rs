use std::collections::BTreeMap;

use chrono::Utc;
use cw_accept::{counts_as_good, reconstruct_ledger, RunLedger};
use cw_core::{
    AcceptancePolicy, AnalysisMetadata, AnalysisRecord, BalanceMode, DriftOrder, MassUnit,
    MeasurementRun, RunMetadata, RunStatus, Trend, WeighingScheme,
};
use cw_store::WeighingStore;
use proptest::prelude::*;
use tempfile::tempdir;

const SCHEME: &str = "A B";

#[derive(Debug, Clone, Copy)]
struct StoredRun {
    status: RunStatus,
    mode: BalanceMode,
    analysis: Option<(Option<bool>, bool)>,
}

fn measurement(run_id: u32, status: RunStatus, mode: BalanceMode) -> MeasurementRun {
    let scheme = WeighingScheme::parse(SCHEME).expect("scheme");
    MeasurementRun::new(
        &scheme,
        RunMetadata {
            run_id,
            balance: "sim".into(),
            balance_mode: mode,
            unit: MassUnit::Gram,
            nominal_mass_g: 1.0,
            positions: BTreeMap::new(),
            created_at: Utc::now(),
            ambient_pre: None,
            ambient_post: None,
            status,
        },
    )
}

fn analysis(run_id: u32, accepted: Option<bool>, exclude: bool) -> AnalysisRecord {
    AnalysisRecord {
        data: Vec::new(),
        metadata: AnalysisMetadata {
            run_id,
            trend: Trend::Minute,
            unit: MassUnit::Gram,
            stdev: BTreeMap::new(),
            selected_drift: DriftOrder::Linear,
            drift_coefficients: BTreeMap::new(),
            stdev_ug: 1.0,
            max_stdev_ug: Some(1.0),
            balance_stdev_ug: None,
            ambient_ok: Some(true),
            loop_closure: 0.0,
            accepted,
            exclude,
            analysed_at: Utc::now(),
        },
    }
}

fn stored_run() -> impl Strategy<Value = Option<StoredRun>> {
    let status = prop_oneof![
        Just(RunStatus::Complete),
        Just(RunStatus::Incomplete),
        Just(RunStatus::InProgress),
    ];
    let mode = prop_oneof![
        Just(BalanceMode::ManualEntry),
        Just(BalanceMode::ComputerInterface),
        Just(BalanceMode::AutoLoading),
    ];
    let verdict = prop::option::of((prop::option::of(any::<bool>()), any::<bool>()));
    prop::option::weighted(
        0.85,
        (status, mode, verdict).prop_map(|(status, mode, analysis)| StoredRun {
            status,
            mode,
            analysis,
        }),
    )
}

#[test]
fn empty_document_starts_at_run_one() {
    let dir = tempdir().expect("tmp dir");
    let store = WeighingStore::open(dir.path().join("doc.json"), SCHEME).expect("open");
    let ledger = reconstruct_ledger(&store, &AcceptancePolicy::default()).expect("ledger");
    assert_eq!(ledger, RunLedger::default());
}

#[test]
fn each_run_is_judged_by_its_recorded_mode() {
    let dir = tempdir().expect("tmp dir");
    let mut store = WeighingStore::open(dir.path().join("doc.json"), SCHEME).expect("open");
    let recorded = [BalanceMode::AutoLoading, BalanceMode::ManualEntry];
    for (idx, mode) in recorded.into_iter().enumerate() {
        let run_id = idx as u32 + 1;
        store
            .put_measurement_run(run_id, &measurement(run_id, RunStatus::Complete, mode))
            .expect("put run");
        store
            .put_analysis_record(run_id, &analysis(run_id, Some(false), false))
            .expect("put analysis");
    }
    let ledger = reconstruct_ledger(&store, &AcceptancePolicy::default()).expect("ledger");
    assert_eq!(ledger.good_runs, 1);
    assert_eq!(ledger.next_run_id, 3);
}

proptest! {
    #[test]
    fn ledger_matches_scan_until_gap(
        runs in prop::collection::vec(stored_run(), 0..10),
        count_excluded in any::<bool>(),
    ) {
        let dir = tempdir().expect("tmp dir");
        let mut store = WeighingStore::open(dir.path().join("doc.json"), SCHEME).expect("open");
        for (idx, run) in runs.iter().enumerate() {
            let run_id = idx as u32 + 1;
            if let Some(run) = run {
                store.put_measurement_run(run_id, &measurement(run_id, run.status, run.mode)).expect("put run");
                if let Some((accepted, exclude)) = run.analysis {
                    store
                        .put_analysis_record(run_id, &analysis(run_id, accepted, exclude))
                        .expect("put analysis");
                }
            }
        }
        let policy = AcceptancePolicy { count_excluded_runs: count_excluded, ..AcceptancePolicy::default() };

        let mut expected = RunLedger::default();
        for run in runs.iter() {
            let Some(run) = run else { break };
            if run.status == RunStatus::Complete {
                if let Some((accepted, exclude)) = run.analysis {
                    if counts_as_good(accepted, exclude, run.mode, &policy) {
                        expected.good_runs += 1;
                    }
                }
            }
            expected.next_run_id += 1;
        }

        let ledger = reconstruct_ledger(&store, &policy).expect("ledger");
        prop_assert_eq!(ledger, expected);
    }
}
