use cw_core::{DriftOrder, WeighingScheme};
use cw_drift::analyse;
use proptest::prelude::*;

const SCHEMES: [&str; 4] = ["A B", "A B C", "A B C D", "A B C D E"];

proptest! {
    #[test]
    fn differences_close_the_loop(
        scheme_idx in 0usize..4,
        seed_readings in proptest::collection::vec(-500.0f64..500.0, 15),
        degree in 0usize..4,
    ) {
        let scheme = WeighingScheme::parse(SCHEMES[scheme_idx]).unwrap();
        let readings = &seed_readings[..scheme.num_readings()];
        let order = DriftOrder::from_degree(degree).unwrap();
        let analysis = analyse(&scheme, readings, None, Some(order)).unwrap();

        let scale: f64 = analysis
            .differences
            .iter()
            .map(|d| d.difference().abs())
            .sum::<f64>()
            .max(1.0);
        prop_assert!(analysis.loop_closure().abs() <= 1e-9 * scale);
        prop_assert!(analysis.differences.iter().all(|d| d.residual() >= 0.0));
        prop_assert_eq!(analysis.selected, order);
    }

    #[test]
    fn residual_stdev_matches_residual_vector(
        seed_readings in proptest::collection::vec(-50.0f64..50.0, 12),
    ) {
        let scheme = WeighingScheme::parse("1a 1b 1c 1d").unwrap();
        let analysis = analyse(&scheme, &seed_readings, None, None).unwrap();
        for (order, fit) in &analysis.fits {
            let dof = scheme.num_readings() - scheme.num_wtgrps() - order.degree();
            prop_assert_eq!(fit.dof, dof);
            let expected = (fit.residuals.iter().map(|e| e * e).sum::<f64>() / dof as f64).sqrt();
            prop_assert!((fit.stdev - expected).abs() <= 1e-9 * expected.max(1.0));
            prop_assert!(analysis.selected_stdev() <= fit.stdev + 1e-6);
        }
    }
}
