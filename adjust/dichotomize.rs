use ndarray::{Array1, ArrayView1};

/// Thresholds phenotype scores into a binary classification.
///
/// `hat_y[i]` is 1 exactly when `p[i] > cutpoint`. A score equal to the cutpoint
/// is a control, and so is a NaN score since the comparison fails.
pub fn dichotomize(p: ArrayView1<f64>, cutpoint: f64) -> Array1<u8> {
    p.mapv(|score| u8::from(score > cutpoint))
}

/// Number of observations classified as controls and as cases.
pub fn class_counts(hat_y: ArrayView1<u8>) -> (usize, usize) {
    let cases = hat_y.iter().filter(|&&label| label == 1).count();
    (hat_y.len() - cases, cases)
}
