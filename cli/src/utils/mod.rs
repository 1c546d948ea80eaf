pub mod date;
pub mod divergence;
pub mod logger;
pub mod matrix_utils;
pub mod risk_matrix;
pub mod sentiment;
pub mod stats;

pub use date::*;
pub use divergence::*;
pub use logger::*;
pub use matrix_utils::*;
pub use risk_matrix::*;
pub use sentiment::*;
