use cw_core::{DriftOrder, WeighingScheme};
use cw_drift::analyse;

fn flat_readings(scheme: &WeighingScheme) -> Vec<f64> {
    let masses = [10.0, 12.5, 9.25];
    (0..scheme.num_readings())
        .map(|k| masses[k % scheme.num_wtgrps()])
        .collect()
}

#[test]
fn forced_no_drift_survives_singular_higher_orders() {
    let scheme = WeighingScheme::parse("A B C").expect("scheme");
    let readings = flat_readings(&scheme);
    let times = vec![5.0; scheme.num_readings()];

    let analysis = analyse(&scheme, &readings, Some(&times), Some(DriftOrder::NoDrift))
        .expect("no-drift model ignores the time basis");

    assert_eq!(analysis.selected, DriftOrder::NoDrift);
    assert_eq!(analysis.fits.len(), 1);
    assert!(analysis.stdevs().contains_key(&DriftOrder::NoDrift));
    assert!(!analysis.stdevs().contains_key(&DriftOrder::Linear));
    assert!((analysis.differences[0].difference() + 2.5).abs() < 1e-9);
}

#[test]
fn automatic_selection_drops_singular_orders() {
    let scheme = WeighingScheme::parse("A B C").expect("scheme");
    let readings = flat_readings(&scheme);
    let times = vec![5.0; scheme.num_readings()];

    let analysis = analyse(&scheme, &readings, Some(&times), None).expect("analysis");

    assert_eq!(analysis.selected, DriftOrder::NoDrift);
    assert_eq!(analysis.fits.keys().copied().collect::<Vec<_>>(), vec![DriftOrder::NoDrift]);
}

#[test]
fn forced_singular_order_is_still_an_error() {
    let scheme = WeighingScheme::parse("A B C").expect("scheme");
    let readings = flat_readings(&scheme);
    let times = vec![5.0; scheme.num_readings()];

    let err = analyse(&scheme, &readings, Some(&times), Some(DriftOrder::Quadratic))
        .expect_err("quadratic needs distinct times");
    assert_eq!(err.info().code, "drift-singular");
}
