use bilot::{fit, random_parameter, uniform_marginal, Error, FitConfig};
use ndarray::Array2;

fn data() -> (Array2<f64>, Array2<f64>) {
    let x = random_parameter(5, 3, 1.0, 1);
    let y = random_parameter(7, 4, 1.0, 2);
    (x, y)
}

#[test]
fn rectangular_problem_keeps_parameter_shape() {
    let (x, y) = data();
    let mu1 = uniform_marginal(5).unwrap();
    let mu2 = uniform_marginal(7).unwrap();
    let cfg = FitConfig::new().with_sigma(1.0).with_steps(10);

    let result = fit(&Array2::zeros((3, 4)), &x, &mu1, &y, &mu2, &cfg).unwrap();
    assert_eq!(result.a.dim(), (3, 4));
    assert_eq!(result.history.len(), 10);
    assert!(result.a.iter().all(|v| v.is_finite()));
}

#[test]
fn rectangular_problem_with_low_rank() {
    let (x, y) = data();
    let mu1 = uniform_marginal(5).unwrap();
    let mu2 = uniform_marginal(7).unwrap();
    let cfg = FitConfig::new().with_sigma(1.0).with_steps(10).with_low_rank(true);

    let result = fit(&Array2::zeros((3, 4)), &x, &mu1, &y, &mu2, &cfg).unwrap();
    assert_eq!(result.a.dim(), (3, 4));
}

#[test]
fn wrong_parameter_shape_is_rejected() {
    let (x, y) = data();
    let mu1 = uniform_marginal(5).unwrap();
    let mu2 = uniform_marginal(7).unwrap();

    let err = fit(&Array2::zeros((3, 5)), &x, &mu1, &y, &mu2, &FitConfig::default()).unwrap_err();
    assert!(
        matches!(err, Error::DimensionMismatch { expected: 4, got: 5, .. }),
        "unexpected error: {}",
        err
    );

    let err = fit(&Array2::zeros((2, 4)), &x, &mu1, &y, &mu2, &FitConfig::default()).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 2, .. }));
}

#[test]
fn empty_population_is_rejected() {
    let x = Array2::<f64>::zeros((0, 3));
    let (_, y) = data();
    let mu1 = ndarray::Array1::<f64>::zeros(0);
    let mu2 = uniform_marginal(7).unwrap();
    let err = fit(&Array2::zeros((3, 4)), &x, &mu1, &y, &mu2, &FitConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration { .. }));
}
