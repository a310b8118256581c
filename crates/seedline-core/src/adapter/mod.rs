//! The two interchangeable applied-state adapters.

mod keyed;
mod model;

pub use keyed::KeyedStateStore;
pub use model::ModelStateStore;
