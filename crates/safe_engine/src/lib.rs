//! Safe valuation and validation for a CDP front-end
//! No I/O, no ambient state: every function takes its full input snapshot

pub mod fixed;
pub mod math;
pub mod state;
pub mod valuation;
pub mod validation;
pub mod assessment;
pub mod actions;
pub mod incentives;

// Re-export commonly used types
pub use fixed::{Amount, FixedPointError, Precision};
pub use state::*;
pub use valuation::{value_safe, CollateralRatio, LiquidationPrice, Valuation};
pub use validation::{validate, Rule, ValidationInput, Violation};
pub use assessment::{assess, Assessment, Snapshot};
