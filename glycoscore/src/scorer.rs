//! Spectrum-to-structure matching and scoring.
//!
//! A scoring algorithm implements [`SpectrumMatcher`]: it is constructed from a scan, a
//! candidate structure, and a mass shift, then asked to match fragments and compute a
//! score. The results are exposed through the object-safe [`SpectrumMatch`] trait.
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use mzpeaks::prelude::*;
use mzpeaks::Tolerance;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::mass_shift::MassShift;
use crate::peaks::PeakSet;
use crate::scan::AnnotatedScan;
use crate::structure::{FragmentSeries, Glycopeptide, StructureParseError};

pub type ScoreType = f64;

/// Named arguments passed to a scoring algorithm
pub type Kwargs = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Argument {name} must be {expected}, got {value}")]
    ArgumentType {
        name: String,
        expected: &'static str,
        value: Value,
    },
    #[error("Failed to resolve the structure: {0}")]
    Structure(#[from] StructureParseError),
    #[error("Scorer type {found} cannot be rebuilt as {expected}")]
    TypeMismatch { expected: String, found: String },
}

/// A single assignment of an observed peak to a theoretical fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakFragmentPair {
    /// The index of the matched peak in the scored peak set
    pub peak_index: u32,
    pub fragment: String,
    pub fragment_mass: f64,
    pub mass_error_ppm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionMap {
    pub pairs: Vec<PeakFragmentPair>,
}

impl SolutionMap {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeakFragmentPair> {
        self.pairs.iter()
    }

    /// The number of distinct peaks matched by at least one fragment
    pub fn matched_peak_count(&self) -> usize {
        self.pairs
            .iter()
            .map(|p| p.peak_index)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// The outcome of a match between a scan and a structure, without the type of the
/// algorithm that produced it.
pub trait SpectrumMatch: Debug + Send + Sync {
    fn score(&self) -> ScoreType;
    fn solution_map(&self) -> &SolutionMap;
    fn target(&self) -> &Arc<Glycopeptide>;
    fn mass_shift(&self) -> &Arc<MassShift>;
}

/// A scoring algorithm that can be constructed, matched, and scored in separate steps.
pub trait SpectrumMatcher: SpectrumMatch + Sized + 'static {
    /// A stable name identifying this algorithm in serialized configurations
    const NAME: &'static str;

    fn construct(
        scan: &AnnotatedScan,
        target: Arc<Glycopeptide>,
        mass_shift: Arc<MassShift>,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Self, ScoringError>;

    fn perform_match(&mut self, args: &[Value], kwargs: &Kwargs) -> Result<(), ScoringError>;

    fn calculate_score(&mut self, args: &[Value], kwargs: &Kwargs)
        -> Result<ScoreType, ScoringError>;

    /// Construct, match, and score in one step
    fn evaluate(
        scan: &AnnotatedScan,
        target: Arc<Glycopeptide>,
        mass_shift: Arc<MassShift>,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Self, ScoringError> {
        let mut inst = Self::construct(scan, target, mass_shift, args, kwargs)?;
        inst.perform_match(args, kwargs)?;
        inst.calculate_score(args, kwargs)?;
        Ok(inst)
    }
}

pub(crate) fn float_argument(
    kwargs: &Kwargs,
    name: &str,
) -> Result<Option<f64>, ScoringError> {
    match kwargs.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ScoringError::ArgumentType {
                name: name.to_string(),
                expected: "a number",
                value: value.clone(),
            }),
    }
}

pub const DEFAULT_ERROR_TOLERANCE: f64 = 20.0;

/// Matches b, y, stub glycopeptide, and intact precursor fragments against the
/// deconvoluted peaks of a scan and scores the match as the sum of log10 intensities
/// of every matched peak.
///
/// Accepts the `error_tolerance` argument, a mass tolerance in PPM, either as the first
/// positional argument or by name. A named value given when matching takes precedence
/// over the one given at construction.
#[derive(Debug, Clone)]
pub struct LogIntensityScorer {
    peaks: Arc<PeakSet>,
    target: Arc<Glycopeptide>,
    mass_shift: Arc<MassShift>,
    pub error_tolerance: f64,
    solution_map: SolutionMap,
    score: ScoreType,
}

impl LogIntensityScorer {
    pub fn peaks(&self) -> &PeakSet {
        &self.peaks
    }

    fn fragment_masses(&self) -> Vec<(String, f64)> {
        let shift = self.mass_shift.mass();
        self.target
            .fragments()
            .into_iter()
            .map(|frag| {
                let mass = match frag.series {
                    FragmentSeries::StubGlycopeptide | FragmentSeries::Precursor => frag.mass + shift,
                    FragmentSeries::B | FragmentSeries::Y => frag.mass,
                };
                (frag.name(), mass)
            })
            .collect()
    }
}

impl SpectrumMatch for LogIntensityScorer {
    fn score(&self) -> ScoreType {
        self.score
    }

    fn solution_map(&self) -> &SolutionMap {
        &self.solution_map
    }

    fn target(&self) -> &Arc<Glycopeptide> {
        &self.target
    }

    fn mass_shift(&self) -> &Arc<MassShift> {
        &self.mass_shift
    }
}

impl SpectrumMatcher for LogIntensityScorer {
    const NAME: &'static str = "LogIntensityScorer";

    fn construct(
        scan: &AnnotatedScan,
        target: Arc<Glycopeptide>,
        mass_shift: Arc<MassShift>,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Self, ScoringError> {
        let error_tolerance = match float_argument(kwargs, "error_tolerance")? {
            Some(tol) => tol,
            None => match args.first() {
                Some(value) => value.as_f64().ok_or_else(|| ScoringError::ArgumentType {
                    name: "error_tolerance".to_string(),
                    expected: "a number",
                    value: value.clone(),
                })?,
                None => DEFAULT_ERROR_TOLERANCE,
            },
        };
        if error_tolerance.is_nan() || error_tolerance <= 0.0 {
            return Err(ScoringError::InvalidArgument(format!(
                "error_tolerance must be positive, got {error_tolerance}"
            )));
        }
        Ok(Self {
            peaks: scan.deconvoluted_peak_set.clone(),
            target,
            mass_shift,
            error_tolerance,
            solution_map: SolutionMap::default(),
            score: 0.0,
        })
    }

    fn perform_match(&mut self, _args: &[Value], kwargs: &Kwargs) -> Result<(), ScoringError> {
        if let Some(tol) = float_argument(kwargs, "error_tolerance")? {
            self.error_tolerance = tol;
        }
        let tol = Tolerance::PPM(self.error_tolerance);
        let mut pairs = Vec::new();
        for (name, mass) in self.fragment_masses() {
            for peak in self.peaks.all_peaks_for(mass, tol) {
                pairs.push(PeakFragmentPair {
                    peak_index: peak.index,
                    fragment: name.clone(),
                    fragment_mass: mass,
                    mass_error_ppm: (peak.neutral_mass - mass) / mass * 1e6,
                });
            }
        }
        trace!(
            "Matched {} fragment-peak pairs for {}",
            pairs.len(),
            self.target
        );
        self.solution_map = SolutionMap { pairs };
        Ok(())
    }

    fn calculate_score(
        &mut self,
        _args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<ScoreType, ScoringError> {
        let mut seen = HashSet::new();
        let mut score = 0.0;
        for pair in self.solution_map.iter() {
            if !seen.insert(pair.peak_index) {
                continue;
            }
            let intensity = self.peaks[pair.peak_index as usize].intensity as f64;
            if intensity > 1.0 {
                score += intensity.log10();
            }
        }
        self.score = score;
        Ok(score)
    }
}

/// A placeholder scoring type that cannot be constructed
#[derive(Debug)]
pub enum UnscoreableScorer {}

impl SpectrumMatch for UnscoreableScorer {
    fn score(&self) -> ScoreType {
        match *self {}
    }

    fn solution_map(&self) -> &SolutionMap {
        match *self {}
    }

    fn target(&self) -> &Arc<Glycopeptide> {
        match *self {}
    }

    fn mass_shift(&self) -> &Arc<MassShift> {
        match *self {}
    }
}

impl SpectrumMatcher for UnscoreableScorer {
    const NAME: &'static str = "UnscoreableScorer";

    fn construct(
        _scan: &AnnotatedScan,
        _target: Arc<Glycopeptide>,
        _mass_shift: Arc<MassShift>,
        _args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Self, ScoringError> {
        Err(ScoringError::InvalidArgument(
            "UnscoreableScorer should not be instantiated".to_string(),
        ))
    }

    fn perform_match(&mut self, _args: &[Value], _kwargs: &Kwargs) -> Result<(), ScoringError> {
        match *self {}
    }

    fn calculate_score(
        &mut self,
        _args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<ScoreType, ScoringError> {
        match *self {}
    }
}
