pub mod double_extreme;
pub mod engulfing;
pub mod level_break;
pub mod pin_bar;
pub mod structure;

pub use double_extreme::{DoubleExtremeDetector, Extreme};
pub use engulfing::EngulfingDetector;
pub use level_break::LevelBreakDetector;
pub use pin_bar::PinBarDetector;
pub use structure::StructureDetector;

/// Ceiling applied to every heuristic confidence score.
pub const MAX_CONFIDENCE: f64 = 95.0;
