//! The annotated scan: a processed tandem mass spectrum paired with the structure it
//! is claimed to be produced by.
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use chemical_elements::{neutral_mass, PROTON};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::binding::{BoundScorer, MASS_SHIFT_ARGUMENT};
use crate::context::SessionContext;
use crate::mass_shift::{MassShift, UNMODIFIED};
use crate::peaks::{PackedPeakSet, PeakRanker, PeakSet};
use crate::scorer::{Kwargs, LogIntensityScorer, ScoringError, SolutionMap, SpectrumMatch, SpectrumMatcher};
use crate::structure::{Glycopeptide, StructureParseError};

pub const STRUCTURE_ANNOTATION: &str = "structure";
pub const MASS_SHIFT_ANNOTATION: &str = "mass_shift";
pub const RANKED_PEAKS_ANNOTATION: &str = "ranked_peaks";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Scan {0} does not have a structure annotation")]
    MissingStructure(String),
    #[error(transparent)]
    Structure(#[from] StructureParseError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// A value stored in a scan's annotation table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnotationValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Peaks(#[serde(with = "crate::peaks::shared_peak_set")] Arc<PeakSet>),
}

impl AnnotationValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_peaks(&self) -> Option<&Arc<PeakSet>> {
        match self {
            Self::Peaks(p) => Some(p),
            _ => None,
        }
    }

    /// Render scalar values as text, the way they would appear in a peak list header
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(x) => Some(x.to_string()),
            Self::Flag(b) => Some(b.to_string()),
            Self::Peaks(_) => None,
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AnnotationValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    Unknown,
    Positive,
    Negative,
}

impl From<mzdata::spectrum::ScanPolarity> for Polarity {
    fn from(value: mzdata::spectrum::ScanPolarity) -> Self {
        match value {
            mzdata::spectrum::ScanPolarity::Unknown => Self::Unknown,
            mzdata::spectrum::ScanPolarity::Positive => Self::Positive,
            mzdata::spectrum::ScanPolarity::Negative => Self::Negative,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecursorInformation {
    pub mz: f64,
    pub intensity: f32,
    pub charge: Option<i32>,
    pub precursor_scan_id: Option<String>,
}

impl PrecursorInformation {
    /// The neutral mass of the precursor, assuming charge 1 when it is not known
    pub fn neutral_mass(&self) -> f64 {
        neutral_mass(self.mz, self.charge.unwrap_or(1), PROTON)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationInformation {
    pub method: String,
    pub energy: Option<f32>,
}

impl Display for ActivationInformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.energy {
            Some(energy) => write!(f, "{} {energy}", self.method),
            None => f.write_str(&self.method),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionInformation {
    pub injection_time: Option<f32>,
    pub scan_windows: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IsolationWindow {
    pub target: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// A processed tandem mass spectrum with a claimed structure and free-form annotations.
///
/// The structure is parsed from the `structure` annotation on first use and cached.
/// Neither the parsed structure nor the most recent match result is serialized. A
/// deserialized scan attaches to the process-wide [`SessionContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedScan {
    pub id: String,
    pub title: String,
    pub precursor_information: Option<PrecursorInformation>,
    pub ms_level: u8,
    pub scan_time: f64,
    pub index: isize,
    pub peak_set: Option<PackedPeakSet>,
    #[serde(with = "crate::peaks::shared_peak_set")]
    pub deconvoluted_peak_set: Arc<PeakSet>,
    pub polarity: Polarity,
    pub activation: Option<ActivationInformation>,
    pub acquisition_information: Option<AcquisitionInformation>,
    pub isolation_window: Option<IsolationWindow>,
    pub instrument_configuration: Option<String>,
    pub product_scans: Vec<String>,
    pub annotations: HashMap<String, AnnotationValue>,
    #[serde(skip)]
    structure: OnceLock<Arc<Glycopeptide>>,
    #[serde(skip)]
    decoy: bool,
    #[serde(skip)]
    matcher: Option<Arc<dyn SpectrumMatch>>,
    #[serde(skip, default = "SessionContext::global")]
    context: Arc<SessionContext>,
}

impl AnnotatedScan {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        index: isize,
        deconvoluted_peak_set: PeakSet,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            precursor_information: None,
            ms_level: 2,
            scan_time: 0.0,
            index,
            peak_set: None,
            deconvoluted_peak_set: Arc::new(deconvoluted_peak_set),
            polarity: Polarity::default(),
            activation: None,
            acquisition_information: None,
            isolation_window: None,
            instrument_configuration: None,
            product_scans: Vec::new(),
            annotations: HashMap::new(),
            structure: OnceLock::new(),
            decoy: false,
            matcher: None,
            context: SessionContext::global(),
        }
    }

    pub fn with_context(mut self, context: Arc<SessionContext>) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn structure_annotation(&self) -> Option<&str> {
        self.annotations
            .get(STRUCTURE_ANNOTATION)
            .and_then(|v| v.as_text())
    }

    /// Replace the structure annotation, discarding any structure parsed from the old one
    pub fn set_structure_annotation(&mut self, structure: impl Into<String>) {
        self.annotations
            .insert(STRUCTURE_ANNOTATION.to_string(), AnnotationValue::Text(structure.into()));
        self.structure = OnceLock::new();
        self.decoy = false;
        self.matcher = None;
    }

    /// The structure this scan is annotated with, parsed on first access
    pub fn structure(&self) -> Result<Arc<Glycopeptide>, AnnotationError> {
        if let Some(structure) = self.structure.get() {
            return Ok(structure.clone());
        }
        let text = self
            .structure_annotation()
            .ok_or_else(|| AnnotationError::MissingStructure(self.title.clone()))?;
        let parsed = self.context.structures.parse(text)?;
        Ok(self.structure.get_or_init(|| parsed).clone())
    }

    /// An alias of [`AnnotatedScan::structure`]
    pub fn target(&self) -> Result<Arc<Glycopeptide>, AnnotationError> {
        self.structure()
    }

    /// Whether this scan's structure was derived by [`AnnotatedScan::decoy`]
    pub fn is_decoy(&self) -> bool {
        self.decoy
    }

    /// Create a copy of this scan carrying a decoy of its structure.
    ///
    /// With `peptide`, the backbone is reversed with its glycosylation sites held in
    /// place. With `glycan`, the (possibly reversed) structure becomes a glycan decoy.
    pub fn decoy(&self, peptide: bool, glycan: bool) -> Result<Self, AnnotationError> {
        if !(peptide || glycan) {
            return Err(AnnotationError::InvalidArgument(
                "must specify which dimension to decoy".to_string(),
            ));
        }
        let mut structure = Glycopeptide::clone(&*self.structure()?);
        if peptide {
            structure = structure.reverse_preserving_sequon();
        }
        if glycan {
            structure = structure.glycan_decoy();
        }
        debug!("Built decoy {structure} for {}", self.title);
        let mut dup = self.clone();
        dup.structure = OnceLock::from(Arc::new(structure));
        dup.decoy = true;
        dup.matcher = None;
        Ok(dup)
    }

    /// Resolve the `mass_shift` annotation through the session's registry. A missing
    /// annotation means [`UNMODIFIED`].
    pub fn mass_shift(&self) -> Arc<MassShift> {
        let name = self
            .annotations
            .get(MASS_SHIFT_ANNOTATION)
            .and_then(|v| v.to_text());
        self.context
            .mass_shifts
            .resolve(name.as_deref().unwrap_or(UNMODIFIED))
    }

    /// Match and score this scan's structure with the default [`LogIntensityScorer`]
    pub fn match_structure(&mut self, kwargs: Kwargs) -> Result<Arc<dyn SpectrumMatch>, AnnotationError> {
        self.match_with(&BoundScorer::<LogIntensityScorer>::default(), &[], kwargs)
    }

    /// Match and score this scan's structure with `scorer` and keep the result.
    ///
    /// The mass shift always comes from the scan's own annotation. A `mass_shift`
    /// entry in `kwargs` naming a different shift is an error.
    pub fn match_with<M: SpectrumMatcher>(
        &mut self,
        scorer: &BoundScorer<M>,
        args: &[Value],
        kwargs: Kwargs,
    ) -> Result<Arc<dyn SpectrumMatch>, AnnotationError> {
        let target = self.structure()?;
        let mass_shift = self.mass_shift();
        match kwargs.get(MASS_SHIFT_ARGUMENT) {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) if name == mass_shift.name() => {}
            Some(requested) => {
                return Err(ScoringError::InvalidArgument(format!(
                    "{} is annotated with mass shift {}, but {requested} was requested",
                    self.title,
                    mass_shift.name()
                ))
                .into())
            }
        }
        let inst: Arc<dyn SpectrumMatch> =
            Arc::new(scorer.evaluate(self, target, Some(mass_shift), args, kwargs)?);
        self.matcher = Some(inst.clone());
        Ok(inst)
    }

    /// The most recent match result, if any
    pub fn matcher(&self) -> Option<&Arc<dyn SpectrumMatch>> {
        self.matcher.as_ref()
    }

    pub fn solution_map(&self) -> Option<&SolutionMap> {
        self.matcher.as_deref().map(|m| m.solution_map())
    }

    /// Rank the deconvoluted peaks with the default [`PeakRanker`].
    ///
    /// See [`AnnotatedScan::rank_with`].
    pub fn rank(&mut self, cache: bool) -> Arc<PeakSet> {
        self.rank_with(&PeakRanker::default(), cache)
    }

    /// Rank the deconvoluted peaks and return the ranked subset.
    ///
    /// The ranks are written to this scan's deconvoluted peak set. When `cache` is
    /// true, a previously cached result is returned if present, and a new result is
    /// stored under the `ranked_peaks` annotation. When `cache` is false the ranks are
    /// always recomputed and nothing is stored.
    pub fn rank_with(&mut self, ranker: &PeakRanker, cache: bool) -> Arc<PeakSet> {
        if cache {
            if let Some(peaks) = self
                .annotations
                .get(RANKED_PEAKS_ANNOTATION)
                .and_then(|v| v.as_peaks())
            {
                return peaks.clone();
            }
        }
        let mut peaks = PeakSet::clone(&self.deconvoluted_peak_set);
        let ranked = Arc::new(ranker.rank(&mut peaks));
        self.deconvoluted_peak_set = Arc::new(peaks);
        if cache {
            self.annotations.insert(
                RANKED_PEAKS_ANNOTATION.to_string(),
                AnnotationValue::Peaks(ranked.clone()),
            );
        }
        ranked
    }
}
