// Value types shared across the pipeline; behavior lives in the owning modules.
use ndarray::{Array1, ArrayView1, s};
use std::ops::Deref;

/// Fitted regression coefficients. Index 0 is the intercept, followed by one
/// entry per predictor in the order the predictors were supplied.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficients(pub Array1<f64>);

impl Coefficients {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.0.get(0).copied()
    }

    /// The coefficients with the intercept entry removed.
    pub fn slopes(&self) -> ArrayView1<'_, f64> {
        if self.0.is_empty() {
            self.0.view()
        } else {
            self.0.slice(s![1..])
        }
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for Coefficients {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for Coefficients {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

impl From<Coefficients> for Array1<f64> {
    fn from(values: Coefficients) -> Self {
        values.0
    }
}

/// The bias-corrected association of each predictor with the true case status,
/// on the requested link scale. One entry per predictor; no intercept.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectedAssociation(pub Array1<f64>);

impl CorrectedAssociation {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for CorrectedAssociation {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for CorrectedAssociation {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

impl From<CorrectedAssociation> for Array1<f64> {
    fn from(values: CorrectedAssociation) -> Self {
        values.0
    }
}
