pub mod lifecycle;
pub mod notifier;
pub mod pipeline;

pub use lifecycle::{Engine, EngineHandle};
pub use notifier::Notifier;
pub use pipeline::{Pipeline, TickReport};
