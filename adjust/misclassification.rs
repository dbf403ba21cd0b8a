use thiserror::Error;

/// Differences `1 - S - C` at or below this magnitude are treated as `S + C = 1`.
/// The slack only absorbs the rounding of the subtraction itself.
pub const DEGENERACY_TOLERANCE: f64 = 4.0 * f64::EPSILON;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MisclassificationError {
    #[error(
        "Sensitivity ({sensitivity}) and specificity ({specificity}) sum to 1, so the dichotomized labels carry no information about true status and the number of true controls is undefined."
    )]
    DegenerateClassifier { sensitivity: f64, specificity: f64 },
}

/// How many observations to trim from each dichotomized group before averaging.
///
/// None of the fields are clamped. Sensitivities and specificities that are
/// inconsistent with the observed split can yield negative counts, or counts
/// larger than the group they trim; both are passed through as computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimCounts {
    /// Estimated number of true controls in the whole sample.
    pub true_controls: f64,
    /// Rank threshold for the observed controls: only controls ranked above it
    /// enter the control mean.
    pub control_trim: f64,
    /// Rank threshold for the observed cases: the `case_trim` highest-ranked
    /// cases are left out of the case mean.
    pub case_trim: f64,
}

impl TrimCounts {
    /// True when each trim count lies within `[0, size]` of the group it trims.
    pub fn within_groups(&self, controls: usize, cases: usize) -> bool {
        (0.0..=controls as f64).contains(&self.control_trim)
            && (0.0..=cases as f64).contains(&self.case_trim)
    }
}

/// Estimates the true-control count and the two trim counts from the observed
/// number of dichotomized controls.
///
/// ```text
/// true_controls = (observed_controls - C*N) / (1 - S - C)
/// control_trim  = (1 - C) * (N - true_controls)
/// case_trim     = (1 - S) * true_controls
/// ```
pub fn estimate_trim_counts(
    observed_controls: usize,
    n: usize,
    sensitivity: f64,
    specificity: f64,
) -> Result<TrimCounts, MisclassificationError> {
    let denominator = 1.0 - sensitivity - specificity;
    if denominator.abs() <= DEGENERACY_TOLERANCE {
        return Err(MisclassificationError::DegenerateClassifier {
            sensitivity,
            specificity,
        });
    }

    let n = n as f64;
    let true_controls = (observed_controls as f64 - specificity * n) / denominator;
    Ok(TrimCounts {
        true_controls,
        control_trim: (1.0 - specificity) * (n - true_controls),
        case_trim: (1.0 - sensitivity) * true_controls,
    })
}
