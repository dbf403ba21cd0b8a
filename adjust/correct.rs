use crate::model::LinkFunction;
use crate::types::{Coefficients, CorrectedAssociation};
use ndarray::{Array1, ArrayView1};

/// The outcome of rescaling fitted coefficients onto the true-status scale.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasCorrection {
    /// `mean(p)`, the estimated prevalence used by the log and logit scales.
    pub prevalence: f64,
    /// What the mean-scaled coefficients are divided by for the chosen link.
    pub link_divisor: f64,
    /// Every coefficient, intercept included, after both rescalings.
    pub scaled: Array1<f64>,
    /// `scaled` without the intercept.
    pub corrected: CorrectedAssociation,
}

/// Mean phenotype score. NaN for an empty vector or when any score is NaN.
pub fn prevalence(p: ArrayView1<f64>) -> f64 {
    p.mean().unwrap_or(f64::NAN)
}

/// The per-link divisor applied after the mean-difference scaling:
/// 1 for identity, `p0` for log, `p0 * (1 - p0)` for logit.
pub fn link_divisor(link: LinkFunction, prevalence: f64) -> f64 {
    match link {
        LinkFunction::Identity => 1.0,
        LinkFunction::Log => prevalence,
        LinkFunction::Logit => prevalence * (1.0 - prevalence),
    }
}

/// Divides `beta` by the class-mean difference `denominator`, then by the link
/// divisor, and drops the intercept.
///
/// No guard is placed on either division. A zero denominator or a prevalence of
/// exactly 0 or 1 under the log or logit scale produces non-finite values,
/// which are returned to the caller as data.
pub fn apply_correction(
    beta: &Coefficients,
    denominator: f64,
    link: LinkFunction,
    p: ArrayView1<f64>,
) -> BiasCorrection {
    let prevalence = prevalence(p);
    let divisor = link_divisor(link, prevalence);

    if !denominator.is_finite() || denominator == 0.0 {
        log::warn!(
            "Class-mean difference is {}; the corrected association is not finite.",
            denominator
        );
    }
    if link != LinkFunction::Identity && !(divisor.is_finite() && divisor != 0.0) {
        log::warn!(
            "Prevalence {} leaves the {} scale undefined; the corrected association is not finite.",
            prevalence,
            link
        );
    }

    let scaled = Coefficients::new(beta.mapv(|b| b / denominator / divisor));
    let corrected = CorrectedAssociation::new(scaled.slopes().to_owned());
    log::debug!(
        "Bias correction on the {} scale: denominator = {:.6}, prevalence = {:.6}, corrected = {:?}",
        link,
        denominator,
        prevalence,
        corrected.0
    );

    BiasCorrection {
        prevalence,
        link_divisor: divisor,
        scaled: scaled.into_inner(),
        corrected,
    }
}
