use bilot::{fit, nuclear_norm, numerical_rank, uniform_marginal, FitConfig};
use ndarray::{array, Array2};

fn weak_second_feature() -> Array2<f64> {
    array![[1.0, 0.0], [0.0, 0.3], [1.0, 0.3], [0.0, 0.0]]
}

fn base() -> FitConfig {
    FitConfig::new().with_sigma(0.5).with_step(0.1).with_steps(50)
}

#[test]
fn huge_penalty_keeps_parameter_at_zero() {
    let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
    let mu = uniform_marginal(4).unwrap();
    let cfg = base().with_low_rank(true).with_reg_weight(1e6);

    let result = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &cfg).unwrap();
    assert!(result.a.iter().all(|v| v.abs() < 1e-15), "{}", result.a);
    for &d in &result.history.discrepancy {
        assert!((d - 1.5).abs() < 1e-12);
    }
}

#[test]
fn penalty_is_ignored_without_low_rank_flag() {
    let x = weak_second_feature();
    let mu = uniform_marginal(4).unwrap();
    let plain = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &base()).unwrap();
    let flagged_off = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &base().with_reg_weight(5.0)).unwrap();
    assert_eq!(plain.a, flagged_off.a);
}

#[test]
fn shrinkage_drops_weak_direction() {
    let x = weak_second_feature();
    let mu = uniform_marginal(4).unwrap();

    let plain = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &base()).unwrap();
    let low = fit(
        &Array2::zeros((2, 2)),
        &x,
        &mu,
        &x,
        &mu,
        &base().with_low_rank(true).with_reg_weight(0.1),
    )
    .unwrap();

    assert_eq!(numerical_rank(&plain.a, 1e-6).unwrap(), 2);
    assert_eq!(numerical_rank(&low.a, 1e-6).unwrap(), 1);
    assert!(nuclear_norm(&low.a).unwrap() < nuclear_norm(&plain.a).unwrap());
}

#[test]
fn stronger_penalty_gives_smaller_nuclear_norm() {
    let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
    let mu = uniform_marginal(4).unwrap();
    let norms: Vec<f64> = [0.0, 0.05, 0.1, 0.2]
        .iter()
        .map(|&lam| {
            let cfg = base().with_low_rank(true).with_reg_weight(lam);
            let r = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &cfg).unwrap();
            nuclear_norm(&r.a).unwrap()
        })
        .collect();
    for w in norms.windows(2) {
        assert!(w[1] < w[0], "{:?}", norms);
    }
}
