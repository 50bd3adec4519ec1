//! Ensemble methods module
//!
//! Stacking (meta-learning over out-of-fold predictions).

mod stacking;

pub use stacking::{StackingConfig, StackingRegressor};
