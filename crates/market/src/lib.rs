pub mod fallback;
pub mod live;
pub mod synthetic;

pub use fallback::FallbackSource;
pub use live::LiveFeedClient;
pub use synthetic::SyntheticSource;
