//! Trimmed class-conditional means of the phenotype score.
//!
//! Each dichotomized group is ranked on its own, ties sharing the average of
//! the positions they occupy, and the rank thresholds from
//! [`TrimCounts`](crate::misclassification::TrimCounts) decide which members
//! enter the group mean. Ranks are compared against fractional thresholds, so
//! the tie convention changes which members survive on tied data.

use crate::misclassification::TrimCounts;
use itertools::Itertools;
use ndarray::{Array1, ArrayView1};

/// Estimated mean phenotype score among true controls and true cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMeans {
    pub control: f64,
    pub case: f64,
}

impl ClassMeans {
    pub fn new(control: f64, case: f64) -> Self {
        Self { control, case }
    }

    /// `case - control`, the denominator of the bias correction.
    pub fn difference(&self) -> f64 {
        self.case - self.control
    }
}

/// 1-based ascending ranks with ties sharing the mean of their positions.
/// NaN entries are left out of the ordering and get a NaN rank.
pub fn average_ranks(values: ArrayView1<f64>) -> Array1<f64> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| !values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = Array1::from_elem(values.len(), f64::NAN);
    let mut position = 0usize;
    for (_, tied) in &order.into_iter().chunk_by(|&i| values[i]) {
        let tied: Vec<usize> = tied.collect();
        // Positions position+1 ..= position+len share their mean.
        let rank = position as f64 + (tied.len() as f64 + 1.0) / 2.0;
        for i in &tied {
            ranks[*i] = rank;
        }
        position += tied.len();
    }
    ranks
}

/// Splits `p` into the observed controls and observed cases, preserving order.
pub fn split_by_class(p: ArrayView1<f64>, hat_y: ArrayView1<u8>) -> (Array1<f64>, Array1<f64>) {
    let (cases, controls): (Vec<f64>, Vec<f64>) = p
        .iter()
        .zip(hat_y.iter())
        .partition_map(|(&score, &label)| {
            if label == 1 {
                itertools::Either::Left(score)
            } else {
                itertools::Either::Right(score)
            }
        });
    (Array1::from(controls), Array1::from(cases))
}

/// Mean of the observed controls ranked strictly above `control_trim`.
pub fn trimmed_control_mean(controls: ArrayView1<f64>, control_trim: f64) -> f64 {
    let ranks = average_ranks(controls);
    mean_ignoring_nan(
        controls
            .iter()
            .zip(ranks.iter())
            .filter(|&(_, &rank)| rank > control_trim)
            .map(|(&score, _)| score),
    )
}

/// Mean of the observed cases after leaving out the `case_trim` highest-ranked,
/// i.e. the cases whose rank is at most `|cases| - case_trim`.
pub fn trimmed_case_mean(cases: ArrayView1<f64>, case_trim: f64) -> f64 {
    let ranks = average_ranks(cases);
    let threshold = cases.len() as f64 - case_trim;
    mean_ignoring_nan(
        cases
            .iter()
            .zip(ranks.iter())
            .filter(|&(_, &rank)| rank <= threshold)
            .map(|(&score, _)| score),
    )
}

/// Estimates both class-conditional means from the dichotomized scores.
pub fn estimate_class_means(
    p: ArrayView1<f64>,
    hat_y: ArrayView1<u8>,
    trim: &TrimCounts,
) -> ClassMeans {
    let (controls, cases) = split_by_class(p, hat_y);
    let means = ClassMeans::new(
        trimmed_control_mean(controls.view(), trim.control_trim),
        trimmed_case_mean(cases.view(), trim.case_trim),
    );
    if means.control.is_nan() || means.case.is_nan() {
        log::warn!(
            "A trimmed class mean is undefined (control = {}, case = {}); the trimmed group is empty.",
            means.control,
            means.case
        );
    }
    means
}

/// Arithmetic mean of the non-NaN values; NaN when none remain.
fn mean_ignoring_nan(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}
