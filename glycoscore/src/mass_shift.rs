//! Chemical mass adjustments applied to a candidate structure before comparison
//! with an observed precursor, and a registry that hands out shared instances of them.
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use chemical_elements::{ChemicalComposition, ElementSpecification};
use tracing::{debug, warn};

/// The name of the mass shift that leaves a structure's mass untouched
pub const UNMODIFIED: &str = "Unmodified";

/// Elemental compositions of every mass shift known by name.
const MASS_SHIFT_COMPOSITIONS: &[(&str, &[(&str, i32)])] = &[
    (UNMODIFIED, &[]),
    ("Ammonium", &[("N", 1), ("H", 3)]),
    ("Sodium", &[("Na", 1), ("H", -1)]),
    ("Potassium", &[("K", 1), ("H", -1)]),
    ("Formate", &[("C", 1), ("H", 2), ("O", 2)]),
];

/// The mass shifts a new [`MassShiftRegistry`] starts out with
const DEFAULT_MASS_SHIFTS: &[&str] = &[UNMODIFIED, "Ammonium", "Sodium", "Potassium"];

fn build_composition(elements: &[(&str, i32)]) -> ChemicalComposition<'static> {
    let mut composition = ChemicalComposition::new();
    for (symbol, count) in elements.iter() {
        match ElementSpecification::parse(symbol) {
            Ok(element) => {
                composition.set(element, *count);
            }
            Err(e) => {
                warn!("Failed to resolve element {symbol} in mass shift composition: {e:?}");
            }
        }
    }
    composition
}

/// Look up the elemental composition of a mass shift by name in the global
/// composition table.
pub fn composition_for(name: &str) -> Option<ChemicalComposition<'static>> {
    MASS_SHIFT_COMPOSITIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, elements)| build_composition(elements))
}

/// A named, fixed change in elemental composition, such as an adduct ion.
///
/// Two mass shifts are equal when their names are equal.
#[derive(Debug, Clone)]
pub struct MassShift {
    name: String,
    composition: ChemicalComposition<'static>,
    mass: f64,
}

impl MassShift {
    pub fn new(name: impl Into<String>, composition: ChemicalComposition<'static>) -> Self {
        let mass = composition.mass();
        Self {
            name: name.into(),
            composition,
            mass,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn composition(&self) -> &ChemicalComposition<'static> {
        &self.composition
    }

    /// The monoisotopic mass delta this shift adds
    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn is_unmodified(&self) -> bool {
        self.name == UNMODIFIED
    }
}

impl PartialEq for MassShift {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MassShift {}

impl Display for MassShift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A collection of [`MassShift`] instances keyed by name that resolves labels to
/// shared instances, creating new entries on demand.
///
/// Names missing from the global composition table are not an error. They are
/// logged and given the composition of [`UNMODIFIED`], so a mislabeled scan does not
/// abort a batch.
#[derive(Debug)]
pub struct MassShiftRegistry {
    mass_shifts: Mutex<Vec<Arc<MassShift>>>,
}

impl Default for MassShiftRegistry {
    fn default() -> Self {
        let mass_shifts = DEFAULT_MASS_SHIFTS
            .iter()
            .flat_map(|name| composition_for(name).map(|c| Arc::new(MassShift::new(*name, c))))
            .collect();
        Self {
            mass_shifts: Mutex::new(mass_shifts),
        }
    }
}

impl MassShiftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry without any pre-registered mass shifts
    pub fn empty() -> Self {
        Self {
            mass_shifts: Mutex::new(Vec::new()),
        }
    }

    /// Find an already registered mass shift without creating one
    pub fn get(&self, name: &str) -> Option<Arc<MassShift>> {
        let mass_shifts = self.mass_shifts.lock().unwrap_or_else(PoisonError::into_inner);
        mass_shifts.iter().find(|m| m.name() == name).cloned()
    }

    /// Resolve `name` to a shared [`MassShift`].
    ///
    /// Repeated calls with the same name return the same allocation.
    pub fn resolve(&self, name: &str) -> Arc<MassShift> {
        // The lookup and the append happen under one lock so that two threads
        // racing on a new name cannot register it twice.
        let mut mass_shifts = self.mass_shifts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = mass_shifts.iter().find(|m| m.name() == name) {
            return hit.clone();
        }
        let composition = match composition_for(name) {
            Some(composition) => composition,
            None => {
                warn!("Unknown mass shift {name:?}, treating it as {UNMODIFIED}");
                build_composition(&[])
            }
        };
        let mass_shift = Arc::new(MassShift::new(name, composition));
        debug!("Registering mass shift {name} ({:0.4})", mass_shift.mass());
        mass_shifts.push(mass_shift.clone());
        mass_shift
    }

    /// Resolve an optional label, treating a missing label as [`UNMODIFIED`]
    pub fn resolve_or_default(&self, name: Option<&str>) -> Arc<MassShift> {
        self.resolve(name.unwrap_or(UNMODIFIED))
    }

    pub fn unmodified(&self) -> Arc<MassShift> {
        self.resolve(UNMODIFIED)
    }

    pub fn len(&self) -> usize {
        self.mass_shifts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.mass_shifts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = MassShiftRegistry::default();
        assert_eq!(registry.len(), 4);
        let unmod = registry.unmodified();
        assert!(unmod.is_unmodified());
        assert_eq!(unmod.mass(), 0.0);
        assert!(Arc::ptr_eq(&unmod, &registry.resolve(UNMODIFIED)));
        assert!(Arc::ptr_eq(&unmod, &registry.resolve_or_default(None)));
    }

    #[test]
    fn test_known_compositions() {
        let registry = MassShiftRegistry::default();
        let ammonium = registry.resolve("Ammonium");
        assert!((ammonium.mass() - 17.026549).abs() < 1e-3);

        let formate = registry.resolve("Formate");
        assert!((formate.mass() - 46.005479).abs() < 1e-3);
        assert_eq!(registry.len(), 5);
        assert!(Arc::ptr_eq(&formate, &registry.resolve("Formate")));
    }

    #[test_log::test]
    fn test_unknown_falls_back_once() {
        let registry = MassShiftRegistry::default();
        let first = registry.resolve("Deuterated Kryptonite");
        assert_eq!(first.name(), "Deuterated Kryptonite");
        assert_eq!(first.mass(), 0.0);
        assert_eq!(registry.len(), 5);

        let second = registry.resolve("Deuterated Kryptonite");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 5);
        assert_ne!(*first, *registry.unmodified());
    }

    #[test]
    fn test_empty_registry_creates_on_demand() {
        let registry = MassShiftRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.get("Sodium").is_none());
        let sodium = registry.resolve("Sodium");
        assert!((sodium.mass() - 21.981943).abs() < 1e-3);
        assert_eq!(registry.names(), vec!["Sodium".to_string()]);
    }
}
