//! Calibration Module
//!
//! Assessment of the calibration of model predictions.
//!
//! # Submodules
//!
//! * `isotonic`: Generalised PAV isotonic regression for mean, median, expectiles and quantiles.
//! * `bias`: Generalised bias, i.e. identification function values, aggregated per group.
//! * `reliability`: Reliability curves with bootstrap uncertainty bands.

pub mod bias;
pub mod isotonic;
pub mod reliability;
