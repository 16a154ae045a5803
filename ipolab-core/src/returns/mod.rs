//! Return matrix construction and per-horizon summaries.

mod matrix;
mod stats;

pub use matrix::{build_return_matrix, ReturnMatrix};
pub use stats::{horizon_stats, HorizonStats};
