//! Bind a scoring algorithm to a fixed set of construction arguments.
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::mass_shift::MassShift;
use crate::scan::AnnotatedScan;
use crate::scorer::{Kwargs, ScoringError, SpectrumMatcher};
use crate::structure::Glycopeptide;

/// The argument name that selects the mass shift of an invocation. It is never
/// forwarded to the scoring algorithm itself.
pub const MASS_SHIFT_ARGUMENT: &str = "mass_shift";

/// A scoring algorithm `M` curried with positional and named arguments.
///
/// A `BoundScorer` is an immutable configuration value. It is cheap to clone and
/// can be serialized, so the same configuration may be shipped to many workers and
/// invoked on many scans.
pub struct BoundScorer<M> {
    args: Vec<Value>,
    kwargs: Kwargs,
    _matcher: PhantomData<fn() -> M>,
}

impl<M> Clone for BoundScorer<M> {
    fn clone(&self) -> Self {
        Self {
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            _matcher: PhantomData,
        }
    }
}

impl<M> PartialEq for BoundScorer<M> {
    fn eq(&self, other: &Self) -> bool {
        self.args == other.args && self.kwargs == other.kwargs
    }
}

impl<M: SpectrumMatcher> Debug for BoundScorer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundScorer")
            .field("tp", &M::NAME)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .finish()
    }
}

impl<M: SpectrumMatcher> Display for BoundScorer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoundScorer({})", M::NAME)
    }
}

impl<M: SpectrumMatcher> Default for BoundScorer<M> {
    fn default() -> Self {
        Self::new(Vec::new(), Kwargs::new())
    }
}

impl<M: SpectrumMatcher> BoundScorer<M> {
    pub fn new(args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            args,
            kwargs,
            _matcher: PhantomData,
        }
    }

    /// Create a new scorer with `args` appended to the bound positional arguments and
    /// `kwargs` overriding the bound named arguments.
    pub fn with_extra(&self, args: Vec<Value>, kwargs: Kwargs) -> Self {
        let mut dup = self.clone();
        dup.args.extend(args);
        dup.kwargs.extend(kwargs);
        dup
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// The name of the bound scoring algorithm
    pub fn tp(&self) -> &'static str {
        M::NAME
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    fn resolve_mass_shift(
        &self,
        scan: &AnnotatedScan,
        explicit: Option<Arc<MassShift>>,
        call_kwargs: &mut Kwargs,
    ) -> Result<Arc<MassShift>, ScoringError> {
        let from_call = call_kwargs.remove(MASS_SHIFT_ARGUMENT);
        if let Some(mass_shift) = explicit {
            return Ok(mass_shift);
        }
        let registry = &scan.context().mass_shifts;
        match from_call.as_ref().or_else(|| self.kwargs.get(MASS_SHIFT_ARGUMENT)) {
            None | Some(Value::Null) => Ok(registry.unmodified()),
            Some(Value::String(name)) => Ok(registry.resolve(name)),
            Some(value) => Err(ScoringError::ArgumentType {
                name: MASS_SHIFT_ARGUMENT.to_string(),
                expected: "a mass shift name",
                value: value.clone(),
            }),
        }
    }

    fn bound_kwargs(&self) -> Kwargs {
        let mut kwargs = self.kwargs.clone();
        kwargs.remove(MASS_SHIFT_ARGUMENT);
        kwargs
    }

    /// Construct an instance of the scoring algorithm without matching or scoring it.
    ///
    /// The bound named arguments override `kwargs`, and the bound positional arguments
    /// come before `args`. An explicit `mass_shift` takes precedence over a
    /// `mass_shift` named argument given here, which takes precedence over a bound one.
    pub fn invoke(
        &self,
        scan: &AnnotatedScan,
        target: Arc<Glycopeptide>,
        mass_shift: Option<Arc<MassShift>>,
        args: &[Value],
        mut kwargs: Kwargs,
    ) -> Result<M, ScoringError> {
        let mass_shift = self.resolve_mass_shift(scan, mass_shift, &mut kwargs)?;
        kwargs.extend(self.bound_kwargs());
        let merged_args: Vec<Value> = self.args.iter().chain(args.iter()).cloned().collect();
        M::construct(scan, target, mass_shift, &merged_args, &kwargs)
    }

    /// Construct an instance of the scoring algorithm from the bound arguments alone,
    /// then match and score it with `args` and `kwargs`.
    pub fn evaluate(
        &self,
        scan: &AnnotatedScan,
        target: Arc<Glycopeptide>,
        mass_shift: Option<Arc<MassShift>>,
        args: &[Value],
        mut kwargs: Kwargs,
    ) -> Result<M, ScoringError> {
        let mass_shift = self.resolve_mass_shift(scan, mass_shift, &mut kwargs)?;
        let mut inst = M::construct(scan, target, mass_shift, &self.args, &self.bound_kwargs())?;
        inst.perform_match(args, &kwargs)?;
        inst.calculate_score(args, &kwargs)?;
        Ok(inst)
    }

    /// The first of the `model_fits` argument, or the `model_fit` argument
    pub fn model_fit(&self) -> Option<&Value> {
        match self.kwargs.get("model_fits") {
            Some(fits) => fits.as_array().and_then(|fits| fits.first()),
            None => self.kwargs.get("model_fit"),
        }
    }

    pub fn model_fits(&self) -> Option<&Value> {
        self.kwargs.get("model_fits")
    }

    pub fn partition_label(&self) -> Option<&Value> {
        self.kwargs.get("partition")
    }

    /// Order two scorers by their partition label.
    ///
    /// Returns `None` when either scorer lacks a label or the labels are not comparable.
    pub fn partition_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.partition_label()?, other.partition_label()?) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn label_kind(label: Option<&Value>) -> u8 {
    match label {
        Some(Value::Number(_)) => 0,
        Some(Value::String(_)) => 1,
        Some(Value::Bool(_)) => 2,
        Some(_) => 3,
        None => 4,
    }
}

/// Sort scorers by partition label. Numeric labels come first, then text labels,
/// then everything else, with unlabeled scorers last. The sort is stable.
pub fn sort_by_partition<M: SpectrumMatcher>(scorers: &mut [BoundScorer<M>]) {
    scorers.sort_by(|a, b| {
        let (la, lb) = (a.partition_label(), b.partition_label());
        label_kind(la).cmp(&label_kind(lb)).then_with(|| match (la, lb) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
            (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
            (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
            _ => Ordering::Equal,
        })
    });
}

/// The serialized form of a [`BoundScorer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundScorerRepr {
    pub tp: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Kwargs,
}

impl<M: SpectrumMatcher> From<&BoundScorer<M>> for BoundScorerRepr {
    fn from(value: &BoundScorer<M>) -> Self {
        Self {
            tp: M::NAME.to_string(),
            args: value.args.clone(),
            kwargs: value.kwargs.clone(),
        }
    }
}

impl<M: SpectrumMatcher> TryFrom<BoundScorerRepr> for BoundScorer<M> {
    type Error = ScoringError;

    fn try_from(value: BoundScorerRepr) -> Result<Self, Self::Error> {
        if value.tp != M::NAME {
            return Err(ScoringError::TypeMismatch {
                expected: M::NAME.to_string(),
                found: value.tp,
            });
        }
        Ok(Self::new(value.args, value.kwargs))
    }
}

impl<M: SpectrumMatcher> Serialize for BoundScorer<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoundScorerRepr::from(self).serialize(serializer)
    }
}

impl<'de, M: SpectrumMatcher> Deserialize<'de> for BoundScorer<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = BoundScorerRepr::deserialize(deserializer)?;
        Self::try_from(repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::build_deconvoluted_peak_set_from_arrays;
    use crate::scorer::{LogIntensityScorer, SpectrumMatch, UnscoreableScorer};
    use rayon::prelude::*;
    use serde_json::json;

    fn make_scan(i: usize) -> AnnotatedScan {
        let peaks = build_deconvoluted_peak_set_from_arrays(
            &[227.1026, 263.0874, 324.1554, 376.1714],
            &[1200.0, 800.0, 5000.0, 300.0],
            &[1, 1, 1, 1],
        );
        let mut scan = AnnotatedScan::new(
            format!("scan{i}"),
            format!("test.mgf.scan{i}"),
            i as isize,
            peaks,
        );
        scan.set_structure_annotation("PEPTIDE");
        scan
    }

    #[test]
    fn test_equality_and_merging() {
        let a = BoundScorer::<LogIntensityScorer>::new(vec![json!(1)], Kwargs::new())
            .kwarg("partition", 2);
        let b = BoundScorer::<LogIntensityScorer>::default()
            .arg(1)
            .kwarg("partition", 2);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().kwarg("partition", 3));

        let mut extra = Kwargs::new();
        extra.insert("partition".into(), json!(5));
        let c = a.with_extra(vec![json!("x")], extra);
        assert_eq!(c.args(), &[json!(1), json!("x")]);
        assert_eq!(c.partition_label(), Some(&json!(5)));
        assert_eq!(a.partition_label(), Some(&json!(2)));
        assert_eq!(a.tp(), "LogIntensityScorer");
    }

    #[test]
    fn test_invoke_merges_arguments() {
        let scan = make_scan(0);
        let target = scan.structure().unwrap();
        let scorer = BoundScorer::<LogIntensityScorer>::default().kwarg("error_tolerance", 5.0);

        let mut call = Kwargs::new();
        call.insert("error_tolerance".into(), json!(50.0));
        let inst = scorer.invoke(&scan, target.clone(), None, &[], call.clone()).unwrap();
        assert_eq!(inst.error_tolerance, 5.0);
        assert!(inst.solution_map().is_empty());

        // the bound default is used for construction, the call value for matching
        let inst = scorer.evaluate(&scan, target.clone(), None, &[], call).unwrap();
        assert_eq!(inst.error_tolerance, 50.0);

        let positional = BoundScorer::<LogIntensityScorer>::default().arg(7.0);
        let inst = positional
            .invoke(&scan, target, None, &[json!(100.0)], Kwargs::new())
            .unwrap();
        assert_eq!(inst.error_tolerance, 7.0);
    }

    #[test]
    fn test_mass_shift_resolution() {
        let scan = make_scan(0);
        let target = scan.structure().unwrap();
        let registry = &scan.context().mass_shifts;

        let plain = BoundScorer::<LogIntensityScorer>::default();
        let inst = plain.evaluate(&scan, target.clone(), None, &[], Kwargs::new()).unwrap();
        assert!(Arc::ptr_eq(inst.mass_shift(), &registry.unmodified()));

        let bound = plain.clone().kwarg(MASS_SHIFT_ARGUMENT, "Sodium");
        let inst = bound.evaluate(&scan, target.clone(), None, &[], Kwargs::new()).unwrap();
        assert_eq!(inst.mass_shift().name(), "Sodium");

        let mut call = Kwargs::new();
        call.insert(MASS_SHIFT_ARGUMENT.into(), json!("Ammonium"));
        let inst = bound.evaluate(&scan, target.clone(), None, &[], call.clone()).unwrap();
        assert_eq!(inst.mass_shift().name(), "Ammonium");

        let inst = bound
            .invoke(&scan, target.clone(), Some(registry.resolve("Potassium")), &[], call)
            .unwrap();
        assert_eq!(inst.mass_shift().name(), "Potassium");

        let broken = plain.kwarg(MASS_SHIFT_ARGUMENT, 3);
        let err = broken.evaluate(&scan, target, None, &[], Kwargs::new()).unwrap_err();
        assert!(matches!(err, ScoringError::ArgumentType { .. }));
    }

    #[test]
    fn test_model_fit_and_partition() {
        let scorer = BoundScorer::<LogIntensityScorer>::default();
        assert!(scorer.model_fit().is_none());
        assert!(scorer.model_fits().is_none());
        assert!(scorer.partition_label().is_none());

        let single = scorer.clone().kwarg("model_fit", "fit-a");
        assert_eq!(single.model_fit(), Some(&json!("fit-a")));

        let many = single.clone().kwarg("model_fits", json!(["fit-b", "fit-c"]));
        assert_eq!(many.model_fit(), Some(&json!("fit-b")));
        assert_eq!(many.model_fits(), Some(&json!(["fit-b", "fit-c"])));

        let p1 = scorer.clone().kwarg("partition", 1);
        let p2 = scorer.clone().kwarg("partition", 2);
        assert_eq!(p1.partition_cmp(&p2), Some(Ordering::Less));
        assert_eq!(p1.partition_cmp(&scorer), None);
        assert_eq!(p1.partition_cmp(&scorer.clone().kwarg("partition", "a")), None);

        let mut scorers = vec![scorer.clone(), p2.clone(), p1.clone()];
        sort_by_partition(&mut scorers);
        assert_eq!(scorers, vec![p1, p2, scorer]);
    }

    #[test]
    fn test_serialization() {
        let scorer = BoundScorer::<LogIntensityScorer>::default()
            .arg(1.5)
            .kwarg("partition", json!({"charge": 2}));
        let text = serde_json::to_string(&scorer).unwrap();
        assert!(text.contains("\"tp\":\"LogIntensityScorer\""));
        let dup: BoundScorer<LogIntensityScorer> = serde_json::from_str(&text).unwrap();
        assert_eq!(dup, scorer);

        assert!(serde_json::from_str::<BoundScorer<UnscoreableScorer>>(&text).is_err());
    }

    #[test]
    fn test_unscoreable_cannot_be_invoked() {
        let scan = make_scan(0);
        let scorer = BoundScorer::<UnscoreableScorer>::default();
        let err = scorer
            .invoke(&scan, scan.structure().unwrap(), None, &[], Kwargs::new())
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidArgument(_)));
    }

    #[test]
    fn test_distribute_across_threads() {
        let scorer = BoundScorer::<LogIntensityScorer>::default().kwarg("error_tolerance", 10.0);
        let text = serde_json::to_string(&scorer).unwrap();
        let scans: Vec<AnnotatedScan> = (0..16).map(make_scan).collect();
        let scores: Vec<f64> = scans
            .par_iter()
            .map(|scan| {
                let scorer: BoundScorer<LogIntensityScorer> = serde_json::from_str(&text).unwrap();
                scorer
                    .evaluate(scan, scan.structure().unwrap(), None, &[], Kwargs::new())
                    .unwrap()
                    .score()
            })
            .collect();
        assert_eq!(scores.len(), 16);
        assert!(scores.iter().all(|s| *s > 0.0 && *s == scores[0]));
    }
}
