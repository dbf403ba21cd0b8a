#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Bias correction for regression coefficients estimated against a continuous
//! probabilistic phenotype score instead of an observed binary case label.
//!
//! Two entry points cover the two operating conditions:
//!
//! - [`bias_adjust_unknown`]: the class-conditional mean scores of true cases and
//!   true controls are estimated from the data, using a dichotomization cutpoint
//!   and the known sensitivity and specificity of that dichotomization.
//! - [`bias_adjust_known`]: the class-conditional means are supplied directly.
//!
//! Both rescale the fitted coefficients by the difference between the case and
//! control means, then map the result onto the identity, log, or logit scale.

pub mod correct;
pub mod dichotomize;
pub mod estimate;
pub mod fit;
pub mod means;
pub mod misclassification;
pub mod model;
pub mod types;

pub use estimate::{
    AdjustError, AdjustmentInputs, AdjustmentReport, ErrorKind, KnownMeans, UnknownMeansParams,
    adjust_known_means, adjust_unknown_means, bias_adjust_known, bias_adjust_unknown,
};
pub use fit::{FitError, LeastSquaresFitter, LinearModelFitter};
pub use model::{AdjustmentConfig, LinkFunction, ValidationMode};
pub use types::{Coefficients, CorrectedAssociation};
