//! Shared state that outlives any single scan.
use std::sync::{Arc, LazyLock};

use crate::mass_shift::MassShiftRegistry;
use crate::structure::{StructureCache, DEFAULT_STRUCTURE_CACHE_SIZE};

static GLOBAL_CONTEXT: LazyLock<Arc<SessionContext>> =
    LazyLock::new(|| Arc::new(SessionContext::default()));

/// Holds the [`MassShiftRegistry`] and the structure parse cache shared by every
/// scan read in one session.
///
/// Scans created without an explicit context, including deserialized ones,
/// attach to [`SessionContext::global`].
#[derive(Debug, Default)]
pub struct SessionContext {
    pub mass_shifts: MassShiftRegistry,
    pub structures: StructureCache,
}

impl SessionContext {
    pub fn new(mass_shifts: MassShiftRegistry, structure_cache_size: usize) -> Self {
        Self {
            mass_shifts,
            structures: StructureCache::new(structure_cache_size),
        }
    }

    /// A fresh context with the default registry and cache size
    pub fn isolated() -> Arc<Self> {
        Arc::new(Self::new(MassShiftRegistry::default(), DEFAULT_STRUCTURE_CACHE_SIZE))
    }

    /// The process-wide context
    pub fn global() -> Arc<Self> {
        GLOBAL_CONTEXT.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        let a = SessionContext::global();
        let b = SessionContext::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &SessionContext::isolated()));
        assert_eq!(a.structures.capacity(), DEFAULT_STRUCTURE_CACHE_SIZE);
    }

    #[test_log::test]
    fn test_concurrent_registration_and_parsing() {
        use rayon::prelude::*;

        const GP: &str = "YPVLN(N-Glycosylation)VTMPNNGK{Hex:5; HexNAc:4; NeuAc:2}";

        let context = SessionContext::isolated();
        let n_known = context.mass_shifts.len();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        let results: Vec<_> = pool.install(|| {
            (0..256)
                .into_par_iter()
                .map(|_| {
                    (
                        context.mass_shifts.resolve("Frobnicated"),
                        context.structures.parse(GP).unwrap(),
                    )
                })
                .collect()
        });

        assert_eq!(context.mass_shifts.len(), n_known + 1);
        assert_eq!(context.structures.len(), 1);
        let (shift, structure) = &results[0];
        assert_eq!(shift.name(), "Frobnicated");
        for (s, g) in results.iter() {
            assert!(Arc::ptr_eq(s, shift));
            assert!(Arc::ptr_eq(g, structure));
        }
    }
}
