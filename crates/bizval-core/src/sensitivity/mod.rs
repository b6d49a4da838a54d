//! One-variable sweeps over any valuation method, and tornado ranking of
//! the swept variables by value impact.

pub mod sweep;
pub mod tornado;

pub use sweep::{
    perform_analysis, perform_method_analysis, SensitivityOutput, SensitivityParams,
    SensitivityPoint,
};
pub use tornado::{rank_by_impact, run_tornado, TornadoEntry, TornadoOutput};
