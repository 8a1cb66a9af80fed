pub mod admission;

pub use admission::{Rejection, SignalPolicy};
