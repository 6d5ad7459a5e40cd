//! Ingestion, decoy generation, and scoring of glycopeptide tandem mass spectra that
//! have been annotated with the structure they are believed to come from.
pub mod binding;
pub mod context;
pub mod mass_shift;
pub mod peaks;
pub mod scan;
pub mod scorer;
pub mod structure;

pub mod data_source;

pub use crate::binding::BoundScorer;
pub use crate::context::SessionContext;
pub use crate::data_source::{read, read_stream, IngestionError, ScanIngestor, ScanRecord};
pub use crate::mass_shift::{MassShift, MassShiftRegistry};
pub use crate::peaks::{PeakRanker, PeakSet, RankedPeak};
pub use crate::scan::{AnnotatedScan, AnnotationError};
pub use crate::scorer::{LogIntensityScorer, ScoreType, SpectrumMatch, SpectrumMatcher};
pub use crate::structure::Glycopeptide;
