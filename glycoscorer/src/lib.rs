mod driver;
mod progress;
mod write;

pub use driver::{DecoyMode, GlycoScorer, GlycoScorerError};
pub use write::{ScanReport, COLUMNS};
