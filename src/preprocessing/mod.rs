//! Feature preprocessing
//!
//! Only standardization is needed: the cluster router measures distances in
//! z-score space so that height (cm) does not dominate gender (0/1).

mod scaler;

pub use scaler::StandardScaler;
