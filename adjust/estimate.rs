//! # Adjustment Entry Points
//!
//! Orchestrates the bias-correction pipeline:
//!
//! 1. Dichotomize the phenotype score at the cutpoint (unknown-means path only).
//! 2. Regress the score on the predictors.
//! 3. Estimate the trim counts and the trimmed class means (unknown-means path
//!    only), or take the class means as given.
//! 4. Divide the coefficients by the class-mean difference, apply the link
//!    scaling and drop the intercept.
//!
//! [`bias_adjust_unknown`] and [`bias_adjust_known`] are the string-configured
//! surface with the default least-squares fitter. [`adjust_unknown_means`] and
//! [`adjust_known_means`] accept any [`LinearModelFitter`] and an
//! [`AdjustmentConfig`], and return the full [`AdjustmentReport`].

use crate::correct::apply_correction;
use crate::dichotomize::{class_counts, dichotomize};
use crate::fit::{FitError, LeastSquaresFitter, LinearModelFitter};
use crate::means::{ClassMeans, estimate_class_means};
use crate::misclassification::{MisclassificationError, TrimCounts, estimate_trim_counts};
use crate::model::{AdjustmentConfig, ConfigError, LinkFunction, ValidationMode};
use crate::types::{Coefficients, CorrectedAssociation};
use ndarray::ArrayView1;
use thiserror::Error;

pub use crate::means::ClassMeans as KnownMeans;

/// The broad category of an [`AdjustError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something the crate does not support.
    Configuration,
    /// A computation is undefined for the supplied parameters.
    Numerical,
    /// Input vectors disagree in length or are empty.
    Dimension,
    /// The regression fit failed.
    Fit,
    /// Strict validation rejected an input.
    Validation,
}

#[derive(Error, Debug)]
pub enum AdjustError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Misclassification(#[from] MisclassificationError),

    #[error("Input '{name}' has {found} observations, but the phenotype score has {expected}.")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("The phenotype score is empty; at least one observation is required.")]
    EmptyInput,

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("Parameter '{name}' = {value} is rejected: {reason}.")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Input '{name}' has a non-finite value at index {index}.")]
    NonFiniteInput { name: String, index: usize },

    #[error(
        "Trim counts (control {control_trim:.3}, case {case_trim:.3}) fall outside the dichotomized groups ({controls} controls, {cases} cases)."
    )]
    TrimOutOfRange {
        control_trim: f64,
        case_trim: f64,
        controls: usize,
        cases: usize,
    },

    #[error("Every observed {group} was trimmed, so its mean phenotype score is undefined.")]
    EmptyTrimmedGroup { group: &'static str },
}

impl AdjustError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdjustError::Config(_) => ErrorKind::Configuration,
            AdjustError::Misclassification(_) => ErrorKind::Numerical,
            AdjustError::LengthMismatch { .. } | AdjustError::EmptyInput => ErrorKind::Dimension,
            AdjustError::Fit(_) => ErrorKind::Fit,
            AdjustError::InvalidParameter { .. }
            | AdjustError::NonFiniteInput { .. }
            | AdjustError::TrimOutOfRange { .. }
            | AdjustError::EmptyTrimmedGroup { .. } => ErrorKind::Validation,
        }
    }
}

/// The phenotype score and the index-aligned predictors it is regressed on.
#[derive(Debug, Clone)]
pub struct AdjustmentInputs<'a> {
    pub phenotype: ArrayView1<'a, f64>,
    pub predictors: Vec<(String, ArrayView1<'a, f64>)>,
}

impl<'a> AdjustmentInputs<'a> {
    pub fn new(phenotype: ArrayView1<'a, f64>) -> Self {
        Self {
            phenotype,
            predictors: Vec::new(),
        }
    }

    pub fn with_predictor(mut self, name: impl Into<String>, values: ArrayView1<'a, f64>) -> Self {
        self.predictors.push((name.into(), values));
        self
    }

    pub fn len(&self) -> usize {
        self.phenotype.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phenotype.is_empty()
    }

    pub fn predictor_views(&self) -> Vec<ArrayView1<'a, f64>> {
        self.predictors.iter().map(|(_, values)| *values).collect()
    }

    /// Checks that there is at least one observation and that every predictor
    /// is aligned with the phenotype score.
    pub fn check_dimensions(&self) -> Result<(), AdjustError> {
        if self.is_empty() {
            return Err(AdjustError::EmptyInput);
        }
        for (name, values) in &self.predictors {
            if values.len() != self.len() {
                return Err(AdjustError::LengthMismatch {
                    name: name.clone(),
                    expected: self.len(),
                    found: values.len(),
                });
            }
        }
        Ok(())
    }

    fn check_finite(&self) -> Result<(), AdjustError> {
        let named = std::iter::once(("p", &self.phenotype))
            .chain(self.predictors.iter().map(|(name, values)| (name.as_str(), values)));
        for (name, values) in named {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(AdjustError::NonFiniteInput {
                    name: name.to_string(),
                    index,
                });
            }
        }
        Ok(())
    }
}

/// Classifier accuracy and cutpoint for the unknown-means path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnknownMeansParams {
    pub sensitivity: f64,
    pub specificity: f64,
    pub cutpoint: f64,
}

/// Observed counts after dichotomization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSplit {
    pub controls: usize,
    pub cases: usize,
}

/// Every intermediate quantity of one adjustment run.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentReport {
    pub link: LinkFunction,
    pub n: usize,
    /// Coefficients of the regression of the score on the predictors.
    pub coefficients: Coefficients,
    /// Present on the unknown-means path only.
    pub split: Option<ClassSplit>,
    /// Present on the unknown-means path only.
    pub trim: Option<TrimCounts>,
    /// Class means whose difference scales the coefficients.
    pub means: ClassMeans,
    pub denominator: f64,
    pub prevalence: f64,
    pub corrected: CorrectedAssociation,
}

/// Corrects the association when the class-conditional mean scores must be
/// estimated from the data. `link` is one of `"identity"`, `"log"`, `"logit"`.
pub fn bias_adjust_unknown<'a>(
    p: ArrayView1<'a, f64>,
    x: ArrayView1<'a, f64>,
    w: ArrayView1<'a, f64>,
    sensitivity: f64,
    specificity: f64,
    cutpoint: f64,
    link: &str,
) -> Result<CorrectedAssociation, AdjustError> {
    let config = AdjustmentConfig::new(link.parse()?);
    let inputs = AdjustmentInputs::new(p)
        .with_predictor("X", x)
        .with_predictor("W", w);
    let params = UnknownMeansParams {
        sensitivity,
        specificity,
        cutpoint,
    };
    let report = adjust_unknown_means(&LeastSquaresFitter::default(), &inputs, &params, &config)?;
    Ok(report.corrected)
}

/// Corrects the association when the mean score of true controls (`mu0`) and
/// of true cases (`mu1`) are known. `link` is one of `"identity"`, `"log"`,
/// `"logit"`.
pub fn bias_adjust_known<'a>(
    p: ArrayView1<'a, f64>,
    x: ArrayView1<'a, f64>,
    w: ArrayView1<'a, f64>,
    mu0: f64,
    mu1: f64,
    link: &str,
) -> Result<CorrectedAssociation, AdjustError> {
    let config = AdjustmentConfig::new(link.parse()?);
    let inputs = AdjustmentInputs::new(p)
        .with_predictor("X", x)
        .with_predictor("W", w);
    let report = adjust_known_means(
        &LeastSquaresFitter::default(),
        &inputs,
        &ClassMeans::new(mu0, mu1),
        &config,
    )?;
    Ok(report.corrected)
}

/// The unknown-means pipeline with an injectable fitter.
pub fn adjust_unknown_means<F: LinearModelFitter + ?Sized>(
    fitter: &F,
    inputs: &AdjustmentInputs<'_>,
    params: &UnknownMeansParams,
    config: &AdjustmentConfig,
) -> Result<AdjustmentReport, AdjustError> {
    inputs.check_dimensions()?;
    let n = inputs.len();
    log::info!(
        "Adjusting with estimated class means: {} observations, S = {}, C = {}, cutpoint = {}, link = {}.",
        n,
        params.sensitivity,
        params.specificity,
        params.cutpoint,
        config.link
    );

    let strict = config.validation == ValidationMode::Strict;
    if strict {
        inputs.check_finite()?;
        check_open_unit_interval("sensitivity", params.sensitivity)?;
        check_open_unit_interval("specificity", params.specificity)?;
        check_open_unit_interval("cutpoint", params.cutpoint)?;
    }

    let hat_y = dichotomize(inputs.phenotype, params.cutpoint);
    let (controls, cases) = class_counts(hat_y.view());
    log::debug!("Dichotomized at {}: {} controls, {} cases.", params.cutpoint, controls, cases);

    let coefficients = fitter.fit(inputs.phenotype, &inputs.predictor_views())?;

    let trim = estimate_trim_counts(controls, n, params.sensitivity, params.specificity)?;
    log::debug!(
        "Estimated true controls = {:.3}; control trim = {:.3}, case trim = {:.3}.",
        trim.true_controls,
        trim.control_trim,
        trim.case_trim
    );
    if !trim.within_groups(controls, cases) {
        if strict {
            return Err(AdjustError::TrimOutOfRange {
                control_trim: trim.control_trim,
                case_trim: trim.case_trim,
                controls,
                cases,
            });
        }
        log::warn!(
            "Trim counts (control {:.3}, case {:.3}) fall outside the groups they trim ({} controls, {} cases); using them as computed.",
            trim.control_trim,
            trim.case_trim,
            controls,
            cases
        );
    }

    let means = estimate_class_means(inputs.phenotype, hat_y.view(), &trim);
    log::debug!("Trimmed class means: control = {:.6}, case = {:.6}.", means.control, means.case);
    if strict {
        if means.control.is_nan() {
            return Err(AdjustError::EmptyTrimmedGroup { group: "control" });
        }
        if means.case.is_nan() {
            return Err(AdjustError::EmptyTrimmedGroup { group: "case" });
        }
    }

    Ok(finish(
        coefficients,
        means,
        inputs,
        config.link,
        Some(ClassSplit { controls, cases }),
        Some(trim),
    ))
}

/// The known-means pipeline with an injectable fitter.
pub fn adjust_known_means<F: LinearModelFitter + ?Sized>(
    fitter: &F,
    inputs: &AdjustmentInputs<'_>,
    means: &KnownMeans,
    config: &AdjustmentConfig,
) -> Result<AdjustmentReport, AdjustError> {
    inputs.check_dimensions()?;
    log::info!(
        "Adjusting with known class means: {} observations, mu0 = {}, mu1 = {}, link = {}.",
        inputs.len(),
        means.control,
        means.case,
        config.link
    );

    if config.validation == ValidationMode::Strict {
        inputs.check_finite()?;
        check_finite_parameter("mu0", means.control)?;
        check_finite_parameter("mu1", means.case)?;
        if means.difference() == 0.0 {
            return Err(AdjustError::InvalidParameter {
                name: "mu1",
                value: means.case,
                reason: "it equals mu0, so the class-mean difference is zero",
            });
        }
    }

    let coefficients = fitter.fit(inputs.phenotype, &inputs.predictor_views())?;
    Ok(finish(coefficients, *means, inputs, config.link, None, None))
}

fn finish(
    coefficients: Coefficients,
    means: ClassMeans,
    inputs: &AdjustmentInputs<'_>,
    link: LinkFunction,
    split: Option<ClassSplit>,
    trim: Option<TrimCounts>,
) -> AdjustmentReport {
    let denominator = means.difference();
    let correction = apply_correction(&coefficients, denominator, link, inputs.phenotype);
    AdjustmentReport {
        link,
        n: inputs.len(),
        coefficients,
        split,
        trim,
        means,
        denominator,
        prevalence: correction.prevalence,
        corrected: correction.corrected,
    }
}

fn check_open_unit_interval(name: &'static str, value: f64) -> Result<(), AdjustError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(AdjustError::InvalidParameter {
            name,
            value,
            reason: "it must lie strictly between 0 and 1",
        })
    }
}

fn check_finite_parameter(name: &'static str, value: f64) -> Result<(), AdjustError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AdjustError::InvalidParameter {
            name,
            value,
            reason: "it must be finite",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use std::cell::Cell;

    /// Returns fixed coefficients and records how often it was asked to fit.
    struct StubFitter {
        coefficients: Array1<f64>,
        calls: Cell<usize>,
    }

    impl StubFitter {
        fn new(coefficients: Array1<f64>) -> Self {
            Self {
                coefficients,
                calls: Cell::new(0),
            }
        }
    }

    impl LinearModelFitter for StubFitter {
        fn fit(
            &self,
            response: ArrayView1<f64>,
            predictors: &[ArrayView1<f64>],
        ) -> Result<Coefficients, FitError> {
            assert_eq!(predictors.len(), 2);
            assert!(predictors.iter().all(|p| p.len() == response.len()));
            self.calls.set(self.calls.get() + 1);
            Ok(Coefficients::new(self.coefficients.clone()))
        }
    }

    struct FailingFitter;

    impl LinearModelFitter for FailingFitter {
        fn fit(
            &self,
            response: ArrayView1<f64>,
            predictors: &[ArrayView1<f64>],
        ) -> Result<Coefficients, FitError> {
            Err(FitError::InsufficientObservations {
                observations: response.len(),
                columns: predictors.len() + 1,
            })
        }
    }

    fn example() -> (Array1<f64>, Array1<f64>, Array1<f64>) {
        (
            array![0.1, 0.2, 0.8, 0.9],
            array![0.0, 1.0, 2.0, 3.0],
            array![1.0, 0.0, 0.0, 1.0],
        )
    }

    fn inputs<'a>(
        p: &'a Array1<f64>,
        x: &'a Array1<f64>,
        w: &'a Array1<f64>,
    ) -> AdjustmentInputs<'a> {
        AdjustmentInputs::new(p.view())
            .with_predictor("X", x.view())
            .with_predictor("W", w.view())
    }

    fn perfect_classifier() -> UnknownMeansParams {
        UnknownMeansParams {
            sensitivity: 1.0,
            specificity: 1.0,
            cutpoint: 0.5,
        }
    }

    #[test]
    fn test_unknown_path_with_perfect_classifier_uses_plain_group_means() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.1, 0.28, -0.14]);
        let report = adjust_unknown_means(
            &fitter,
            &inputs(&p, &x, &w),
            &perfect_classifier(),
            &AdjustmentConfig::default(),
        )
        .unwrap();

        assert_eq!(fitter.calls.get(), 1);
        assert_eq!(report.split, Some(ClassSplit { controls: 2, cases: 2 }));
        let trim = report.trim.unwrap();
        assert_relative_eq!(trim.true_controls, 2.0);
        assert_eq!(trim.control_trim, 0.0);
        assert_eq!(trim.case_trim, 0.0);
        assert_relative_eq!(report.means.control, 0.15, max_relative = 1e-12);
        assert_relative_eq!(report.means.case, 0.85, max_relative = 1e-12);
        assert_relative_eq!(report.corrected[0], 0.28 / 0.7, max_relative = 1e-12);
        assert_relative_eq!(report.corrected[1], -0.14 / 0.7, max_relative = 1e-12);
    }

    #[test]
    fn test_known_path_divides_slopes_by_mean_difference() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.3, 0.12, 0.06]);
        let report = adjust_known_means(
            &fitter,
            &inputs(&p, &x, &w),
            &KnownMeans::new(0.2, 0.8),
            &AdjustmentConfig::default(),
        )
        .unwrap();

        assert!(report.split.is_none());
        assert!(report.trim.is_none());
        assert_eq!(report.corrected.len(), 2);
        assert_eq!(report.corrected[0], 0.12 / (0.8 - 0.2));
        assert_eq!(report.corrected[1], 0.06 / (0.8 - 0.2));
    }

    #[test]
    fn test_unsupported_link_is_a_configuration_error_on_both_paths() {
        let (p, x, w) = example();
        let err = bias_adjust_unknown(p.view(), x.view(), w.view(), 0.9, 0.9, 0.5, "sigmoid")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("unsupported link function"));

        let err = bias_adjust_known(p.view(), x.view(), w.view(), 0.1, 0.9, "sigmoid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_complementary_accuracy_is_a_numerical_error() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);
        let params = UnknownMeansParams {
            sensitivity: 0.6,
            specificity: 0.4,
            cutpoint: 0.5,
        };
        let err = adjust_unknown_means(
            &fitter,
            &inputs(&p, &x, &w),
            &params,
            &AdjustmentConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Numerical);
        assert!(matches!(
            err,
            AdjustError::Misclassification(MisclassificationError::DegenerateClassifier { .. })
        ));
    }

    #[test]
    fn test_mismatched_lengths_are_a_dimension_error() {
        let (p, x, _) = example();
        let short = array![1.0, 0.0, 1.0];
        let err = bias_adjust_known(p.view(), x.view(), short.view(), 0.1, 0.9, "identity")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dimension);
        match err {
            AdjustError::LengthMismatch {
                name,
                expected,
                found,
            } => {
                assert_eq!(name, "W");
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_a_dimension_error() {
        let empty = Array1::<f64>::zeros(0);
        let err = bias_adjust_known(empty.view(), empty.view(), empty.view(), 0.1, 0.9, "identity")
            .unwrap_err();
        assert!(matches!(err, AdjustError::EmptyInput));
    }

    #[test]
    fn test_fitter_errors_propagate_unchanged() {
        let (p, x, w) = example();
        let err = adjust_known_means(
            &FailingFitter,
            &inputs(&p, &x, &w),
            &KnownMeans::new(0.1, 0.9),
            &AdjustmentConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fit);
        assert_eq!(
            err.to_string(),
            FitError::InsufficientObservations {
                observations: 4,
                columns: 3
            }
            .to_string()
        );
    }

    #[test]
    fn test_permissive_mode_passes_identical_means_through() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);
        let report = adjust_known_means(
            &fitter,
            &inputs(&p, &x, &w),
            &KnownMeans::new(0.5, 0.5),
            &AdjustmentConfig::default(),
        )
        .unwrap();
        assert_eq!(report.denominator, 0.0);
        assert!(report.corrected.iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_strict_mode_rejects_identical_means() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);
        let err = adjust_known_means(
            &fitter,
            &inputs(&p, &x, &w),
            &KnownMeans::new(0.5, 0.5),
            &AdjustmentConfig::default().strict(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fitter.calls.get(), 0);
    }

    #[test]
    fn test_strict_mode_rejects_out_of_range_probabilities() {
        let (p, x, w) = example();
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);
        let err = adjust_unknown_means(
            &fitter,
            &inputs(&p, &x, &w),
            &perfect_classifier(),
            &AdjustmentConfig::default().strict(),
        )
        .unwrap_err();
        match err {
            AdjustError::InvalidParameter { name, value, .. } => {
                assert_eq!(name, "sensitivity");
                assert_eq!(value, 1.0);
            }
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_mode_rejects_non_finite_scores() {
        let (mut p, x, w) = example();
        p[2] = f64::NAN;
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);
        let err = adjust_known_means(
            &fitter,
            &inputs(&p, &x, &w),
            &KnownMeans::new(0.1, 0.9),
            &AdjustmentConfig::default().strict(),
        )
        .unwrap_err();
        match err {
            AdjustError::NonFiniteInput { name, index } => {
                assert_eq!(name, "p");
                assert_eq!(index, 2);
            }
            other => panic!("Expected NonFiniteInput, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_trim_counts_pass_through_unless_strict() {
        // Every score above the cutpoint, S = 0.8, C = 0.9: the true-control
        // estimate is (0 - 3.6) / (1 - 0.8 - 0.9), which makes the control
        // trim negative while the control group is empty.
        let p = array![0.6, 0.7, 0.8, 0.9];
        let (_, x, w) = example();
        let params = UnknownMeansParams {
            sensitivity: 0.8,
            specificity: 0.9,
            cutpoint: 0.5,
        };
        let fitter = StubFitter::new(array![0.1, 0.2, 0.3]);

        let report = adjust_unknown_means(
            &fitter,
            &inputs(&p, &x, &w),
            &params,
            &AdjustmentConfig::default(),
        )
        .unwrap();
        assert!(!report.trim.unwrap().within_groups(0, 4));
        assert!(report.means.control.is_nan());
        assert!(report.corrected.iter().all(|v| v.is_nan()));

        let err = adjust_unknown_means(
            &fitter,
            &inputs(&p, &x, &w),
            &params,
            &AdjustmentConfig::default().strict(),
        )
        .unwrap_err();
        assert!(matches!(err, AdjustError::TrimOutOfRange { controls: 0, cases: 4, .. }));
    }
}
