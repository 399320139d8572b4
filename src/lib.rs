// Modules
pub mod binning;
pub mod calibration;
pub mod data;
pub mod errors;
pub mod functional;
pub mod sampler;
pub mod utils;

// Individual classes, and functions
pub use binning::{bin_feature, BinMethod};
pub use calibration::bias::{compute_bias, compute_bias_by_fit, BiasConfig, BiasTable};
pub use calibration::isotonic::{IsotonicModel, IsotonicRegression};
pub use calibration::reliability::{reliability_curves, DiagramType, ReliabilityConfig, ReliabilityCurve};
pub use data::{Feature, Matrix, Predictions};
pub use functional::{identification_function, Functional, FunctionalKind};
