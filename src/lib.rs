pub mod ansatz;
pub mod circuit;
pub mod config;
pub mod density;
pub mod gates;
pub mod gibbs;
pub mod loss;
pub mod observable;
pub mod optimizer;
pub mod qstate;
pub mod report;
pub mod trainer;

mod test_util;

use num_complex::Complex;

pub type Qbit = Complex<f64>;

pub use circuit::Circuit;
pub use qstate::QState;
