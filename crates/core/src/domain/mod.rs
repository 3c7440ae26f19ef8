pub mod contract;
pub mod model;

pub use model::*;
