use chrono::Utc;
use cw_accept::{evaluate, CriteriaProvider, Evidence, Verdict};
use cw_core::{
    AnalysisMetadata, AnalysisRecord, CwError, ErrorInfo, RunStatus, SessionContext,
    WeighingScheme,
};
use cw_drift::analyse_run;
use cw_store::WeighingStore;
use tracing::info;

/// Analyses stored run `run_id` and replaces its analysis record.
///
/// The run must be complete. The drift order is forced when the session
/// carries one and selected automatically otherwise. The document is
/// persisted (with fallback) before returning.
pub fn analyse_and_record(
    store: &mut WeighingStore,
    scheme: &WeighingScheme,
    run_id: u32,
    session: &SessionContext,
    criteria: &dyn CriteriaProvider,
) -> Result<(AnalysisRecord, Verdict), CwError> {
    let run = store.measurement_run(run_id)?.ok_or_else(|| {
        CwError::Precondition(
            ErrorInfo::new("run-missing", "no measurement run with this id")
                .with_context("scheme_entry", scheme.scheme_entry())
                .with_context("run_id", run_id.to_string()),
        )
    })?;
    if run.metadata.status != RunStatus::Complete {
        return Err(CwError::Precondition(
            ErrorInfo::new("run-not-complete", "only complete runs can be analysed")
                .with_context("scheme_entry", scheme.scheme_entry())
                .with_context("run_id", run_id.to_string()),
        ));
    }

    let analysis = analyse_run(scheme, &run, session.drift)?;
    let unit = run.metadata.unit;
    let stdev_ug = unit.to_micrograms(analysis.selected_stdev());
    let limits = criteria.lookup(&run.metadata.balance, run.metadata.nominal_mass_g)?;
    let ambient_ok = run
        .metadata
        .ambient_post
        .as_ref()
        .and_then(|post| post.ambient_ok);
    let verdict = evaluate(
        &Evidence {
            stdev_ug,
            ambient_ok,
            differences: &analysis.differences,
        },
        &limits,
        run.metadata.balance_mode,
        &session.config.acceptance,
    );

    let record = AnalysisRecord {
        metadata: AnalysisMetadata {
            run_id,
            trend: analysis.trend,
            unit,
            stdev: analysis.stdevs(),
            selected_drift: analysis.selected,
            drift_coefficients: analysis.drift_coefficients.clone(),
            stdev_ug,
            max_stdev_ug: Some(limits.max_stdev_ug),
            balance_stdev_ug: Some(limits.balance_stdev_ug),
            ambient_ok,
            loop_closure: verdict.loop_closure,
            accepted: Some(verdict.accepted),
            exclude: verdict.exclude,
            analysed_at: Utc::now(),
        },
        data: analysis.differences,
    };
    store.put_analysis_record(run_id, &record)?;
    store.save_with_fallback(&session.config.persistence.fallback_dir)?;
    info!(
        scheme_entry = scheme.scheme_entry(),
        run_id,
        drift = analysis.selected.label(),
        stdev_ug,
        accepted = verdict.accepted,
        exclude = verdict.exclude,
        "analysis recorded"
    );
    Ok((record, verdict))
}
