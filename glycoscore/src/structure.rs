//! A compact glycopeptide model: a peptide backbone with optional per-residue
//! modifications and an attached glycan composition.
//!
//! Structures are written as `PEPN(N-Glycosylation)TIDEK{Hex:5; HexNAc:2}`.
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// The mass of H2O
pub const WATER: f64 = 18.0105646863;

/// The number of distinct structure strings a [`StructureCache`] remembers by default
pub const DEFAULT_STRUCTURE_CACHE_SIZE: usize = 4000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureParseError {
    #[error("Cannot parse a structure from an empty string")]
    Empty,
    #[error("Unknown amino acid {0:?} at position {1}")]
    UnknownResidue(char, usize),
    #[error("Unknown modification {0:?}")]
    UnknownModification(String),
    #[error("Unknown monosaccharide {0:?}")]
    UnknownMonosaccharide(String),
    #[error("Malformed structure {0:?}: {1}")]
    Malformed(String, String),
}

pub fn residue_mass(code: char) -> Option<f64> {
    let mass = match code {
        'G' => 57.02146372,
        'A' => 71.03711379,
        'S' => 87.03202841,
        'P' => 97.05276385,
        'V' => 99.06841391,
        'T' => 101.04767847,
        'C' => 103.00918478,
        'L' | 'I' => 113.08406398,
        'N' => 114.04292744,
        'D' => 115.02694303,
        'Q' => 128.05857751,
        'K' => 128.09496302,
        'E' => 129.04259309,
        'M' => 131.04048491,
        'H' => 137.05891186,
        'F' => 147.06841391,
        'R' => 156.10111103,
        'Y' => 163.06332853,
        'W' => 186.07931295,
        _ => return None,
    };
    Some(mass)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Monosaccharide {
    Hex,
    HexNAc,
    Fuc,
    NeuAc,
    NeuGc,
    Xyl,
}

impl Monosaccharide {
    pub fn mass(&self) -> f64 {
        match self {
            Monosaccharide::Hex => 162.0528234315,
            Monosaccharide::HexNAc => 203.0793725305,
            Monosaccharide::Fuc => 146.0579088094,
            Monosaccharide::NeuAc => 291.0954165286,
            Monosaccharide::NeuGc => 307.0903311485,
            Monosaccharide::Xyl => 132.0422587452,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Monosaccharide::Hex => "Hex",
            Monosaccharide::HexNAc => "HexNAc",
            Monosaccharide::Fuc => "Fuc",
            Monosaccharide::NeuAc => "NeuAc",
            Monosaccharide::NeuGc => "NeuGc",
            Monosaccharide::Xyl => "Xyl",
        }
    }
}

impl FromStr for Monosaccharide {
    type Err = StructureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hex" => Ok(Self::Hex),
            "HexNAc" => Ok(Self::HexNAc),
            "Fuc" | "dHex" => Ok(Self::Fuc),
            "NeuAc" | "Neu5Ac" => Ok(Self::NeuAc),
            "NeuGc" | "Neu5Gc" => Ok(Self::NeuGc),
            "Xyl" | "Pent" => Ok(Self::Xyl),
            _ => Err(StructureParseError::UnknownMonosaccharide(s.to_string())),
        }
    }
}

impl Display for Monosaccharide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A monosaccharide composition
pub type GlycanComposition = BTreeMap<Monosaccharide, u32>;

pub fn glycan_mass(composition: &GlycanComposition) -> f64 {
    composition
        .iter()
        .map(|(mono, count)| mono.mass() * *count as f64)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub name: String,
    pub mass: f64,
}

impl Modification {
    pub fn new(name: impl Into<String>, mass: f64) -> Self {
        Self {
            name: name.into(),
            mass,
        }
    }

    /// Whether this modification marks a glycan attachment site rather than a mass change
    pub fn is_glycosylation(&self) -> bool {
        self.name.ends_with("Glycosylation")
    }
}

impl FromStr for Modification {
    type Err = StructureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mass = match s {
            "Carbamidomethyl" => 57.021464,
            "Oxidation" => 15.994915,
            "Deamidated" | "Deamidation" => 0.984016,
            "Phospho" => 79.966331,
            "Acetyl" => 42.010565,
            "N-Glycosylation" | "O-Glycosylation" => 0.0,
            _ => match s.parse::<f64>() {
                Ok(mass) if mass.is_finite() => mass,
                _ => return Err(StructureParseError::UnknownModification(s.to_string())),
            },
        };
        Ok(Self::new(s, mass))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residue {
    pub code: char,
    pub modification: Option<Modification>,
}

impl Residue {
    pub fn mass(&self) -> f64 {
        residue_mass(self.code).unwrap_or_default()
            + self.modification.as_ref().map(|m| m.mass).unwrap_or_default()
    }

    pub fn is_glycosylated(&self) -> bool {
        self.modification
            .as_ref()
            .is_some_and(|m| m.is_glycosylation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentSeries {
    B,
    Y,
    /// Peptide backbone plus a partial glycan core
    StubGlycopeptide,
    /// The intact glycopeptide
    Precursor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub series: FragmentSeries,
    pub ordinal: usize,
    pub mass: f64,
    /// Whether this fragment carries some or all of the glycan
    pub has_glycan: bool,
}

impl Fragment {
    pub fn name(&self) -> String {
        match self.series {
            FragmentSeries::B => format!("b{}", self.ordinal),
            FragmentSeries::Y => format!("y{}", self.ordinal),
            FragmentSeries::StubGlycopeptide => format!("peptide+{}HexNAc", self.ordinal),
            FragmentSeries::Precursor => "M".to_string(),
        }
    }
}

/// A peptide backbone with an optional glycan composition.
///
/// A glycan decoy has the same composition as its target, but fragments containing
/// the glycan are offset by a fixed, composition-derived mass so they no longer match
/// real glycan fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glycopeptide {
    residues: Vec<Residue>,
    glycan: GlycanComposition,
    glycan_decoy: bool,
}

fn is_sequon(residues: &[Residue], i: usize) -> bool {
    matches!(
        (residues.get(i), residues.get(i + 1), residues.get(i + 2)),
        (Some(n), Some(x), Some(st)) if n.code == 'N' && x.code != 'P' && (st.code == 'S' || st.code == 'T')
    )
}

impl Glycopeptide {
    pub fn new(residues: Vec<Residue>, glycan: GlycanComposition) -> Self {
        Self {
            residues,
            glycan,
            glycan_decoy: false,
        }
    }

    pub fn parse(text: &str) -> Result<Self, StructureParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StructureParseError::Empty);
        }
        let malformed = |reason: &str| StructureParseError::Malformed(text.to_string(), reason.to_string());

        let (peptide, glycan) = match text.find('{') {
            Some(i) => {
                if !text.ends_with('}') {
                    return Err(malformed("unterminated glycan composition"));
                }
                (&text[..i], Some(&text[i + 1..text.len() - 1]))
            }
            None => (text, None),
        };

        let mut residues: Vec<Residue> = Vec::with_capacity(peptide.len());
        let mut chars = peptide.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '(' {
                let mut depth = 1;
                let mut label = String::new();
                for (_, c) in chars.by_ref() {
                    match c {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    label.push(c);
                }
                if depth != 0 {
                    return Err(malformed("unterminated modification"));
                }
                let modification: Modification = label.parse()?;
                match residues.last_mut() {
                    Some(residue) if residue.modification.is_none() => {
                        residue.modification = Some(modification)
                    }
                    Some(_) => return Err(malformed("more than one modification on a residue")),
                    None => return Err(malformed("modification before the first residue")),
                }
            } else if residue_mass(c).is_some() {
                residues.push(Residue {
                    code: c,
                    modification: None,
                });
            } else {
                return Err(StructureParseError::UnknownResidue(c, i));
            }
        }
        if residues.is_empty() {
            return Err(StructureParseError::Empty);
        }

        let mut composition = GlycanComposition::new();
        if let Some(glycan) = glycan {
            for token in glycan.split(';').map(|t| t.trim()).filter(|t| !t.is_empty()) {
                let (name, count) = token
                    .split_once(':')
                    .ok_or_else(|| malformed("glycan component without a count"))?;
                let mono: Monosaccharide = name.trim().parse()?;
                let count: u32 = count
                    .trim()
                    .parse()
                    .map_err(|_| malformed("glycan component count is not an integer"))?;
                if count > 0 {
                    let total = composition.entry(mono).or_default();
                    *total = total
                        .checked_add(count)
                        .ok_or_else(|| malformed("glycan component count overflows"))?;
                }
            }
        }
        Ok(Self::new(residues, composition))
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn glycan(&self) -> &GlycanComposition {
        &self.glycan
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn is_glycan_decoy(&self) -> bool {
        self.glycan_decoy
    }

    /// The unmodified one-letter amino acid sequence
    pub fn sequence(&self) -> String {
        self.residues.iter().map(|r| r.code).collect()
    }

    pub fn peptide_mass(&self) -> f64 {
        self.residues.iter().map(|r| r.mass()).sum::<f64>() + WATER
    }

    pub fn glycan_mass(&self) -> f64 {
        glycan_mass(&self.glycan)
    }

    pub fn total_mass(&self) -> f64 {
        self.peptide_mass() + self.glycan_mass()
    }

    /// The positions of residues a glycan may be attached to.
    ///
    /// Explicitly marked glycosylation sites take priority; otherwise, if the
    /// structure carries a glycan, every N-X-S/T sequon is a candidate.
    pub fn glycosylation_sites(&self) -> Vec<usize> {
        let marked: Vec<usize> = self
            .residues
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_glycosylated())
            .map(|(i, _)| i)
            .collect();
        if !marked.is_empty() || self.glycan.is_empty() {
            return marked;
        }
        (0..self.residues.len())
            .filter(|i| is_sequon(&self.residues, *i))
            .collect()
    }

    /// Reverse the peptide backbone, keeping glycosylation sites, the rest of their
    /// sequons, and the C-terminal residue where they are.
    pub fn reverse_preserving_sequon(&self) -> Self {
        let n = self.residues.len();
        let mut fixed = vec![false; n];
        if n > 0 {
            fixed[n - 1] = true;
        }
        for site in self.glycosylation_sites() {
            fixed[site] = true;
            if is_sequon(&self.residues, site) {
                fixed[site + 1] = true;
                fixed[site + 2] = true;
            }
        }
        let free: Vec<usize> = (0..n).filter(|i| !fixed[*i]).collect();
        let mut residues = self.residues.clone();
        for (dest, src) in free.iter().zip(free.iter().rev()) {
            residues[*dest] = self.residues[*src].clone();
        }
        Self {
            residues,
            glycan: self.glycan.clone(),
            glycan_decoy: self.glycan_decoy,
        }
    }

    /// Create the glycan decoy counterpart of this structure
    pub fn glycan_decoy(&self) -> Self {
        let mut dup = self.clone();
        dup.glycan_decoy = true;
        dup
    }

    /// The mass offset applied to glycan-bearing fragments of a glycan decoy, between 1 and 30 Da
    pub fn decoy_offset(&self) -> f64 {
        if !self.glycan_decoy {
            return 0.0;
        }
        let key = (self.glycan_mass() * 1000.0).round() as u64;
        1.0 + (key % 2900) as f64 / 100.0
    }

    /// Generate the theoretical fragments of this structure as neutral masses
    pub fn fragments(&self) -> Vec<Fragment> {
        let n = self.residues.len();
        let mut fragments = Vec::with_capacity(n * 2 + 4);
        let mut prefix = 0.0;
        for (i, residue) in self.residues.iter().enumerate().take(n.saturating_sub(1)) {
            prefix += residue.mass();
            fragments.push(Fragment {
                series: FragmentSeries::B,
                ordinal: i + 1,
                mass: prefix,
                has_glycan: false,
            });
        }
        let mut suffix = WATER;
        for (i, residue) in self.residues.iter().rev().enumerate().take(n.saturating_sub(1)) {
            suffix += residue.mass();
            fragments.push(Fragment {
                series: FragmentSeries::Y,
                ordinal: i + 1,
                mass: suffix,
                has_glycan: false,
            });
        }

        if !self.glycan.is_empty() {
            let peptide = self.peptide_mass();
            let offset = self.decoy_offset();
            let hexnac = self.glycan.get(&Monosaccharide::HexNAc).copied().unwrap_or_default();
            for k in 0..=hexnac.min(2) {
                let has_glycan = k > 0;
                fragments.push(Fragment {
                    series: FragmentSeries::StubGlycopeptide,
                    ordinal: k as usize,
                    mass: peptide
                        + Monosaccharide::HexNAc.mass() * k as f64
                        + if has_glycan { offset } else { 0.0 },
                    has_glycan,
                });
            }
            fragments.push(Fragment {
                series: FragmentSeries::Precursor,
                ordinal: 0,
                mass: self.total_mass() + offset,
                has_glycan: true,
            });
        }
        fragments
    }
}

impl FromStr for Glycopeptide {
    type Err = StructureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Glycopeptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for residue in self.residues.iter() {
            write!(f, "{}", residue.code)?;
            if let Some(modification) = residue.modification.as_ref() {
                write!(f, "({})", modification.name)?;
            }
        }
        if !self.glycan.is_empty() {
            let parts: Vec<String> = self
                .glycan
                .iter()
                .map(|(mono, count)| format!("{mono}:{count}"))
                .collect();
            write!(f, "{{{}}}", parts.join("; "))?;
        }
        Ok(())
    }
}

/// Each entry remembers the generation it was last used in, and `recency` orders
/// keys by that generation so the oldest is always first.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, (Arc<Glycopeptide>, u64)>,
    recency: BTreeMap<u64, String>,
    generation: u64,
}

impl CacheState {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn get(&mut self, key: &str) -> Option<Arc<Glycopeptide>> {
        let generation = self.next_generation();
        let (hit, last_used) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(last_used, generation);
        let hit = hit.clone();
        if let Some(k) = self.recency.remove(&previous) {
            self.recency.insert(generation, k);
        }
        Some(hit)
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            match self.recency.pop_first() {
                Some((_, oldest)) => {
                    trace!("Evicting {oldest} from the structure cache");
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

/// A least-recently-used memo of parsed structures keyed by their exact text.
///
/// The same structure string appears on many scans, so each one is parsed once and
/// then shared.
#[derive(Debug)]
pub struct StructureCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for StructureCache {
    fn default() -> Self {
        Self::new(DEFAULT_STRUCTURE_CACHE_SIZE)
    }
}

impl StructureCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, text: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(text)
    }

    /// Parse `text`, or return the shared result of an earlier parse of the same text
    pub fn parse(&self, text: &str) -> Result<Arc<Glycopeptide>, StructureParseError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = state.get(text) {
                return Ok(hit);
            }
        }

        let parsed = Arc::new(Glycopeptide::parse(text)?);
        if self.capacity == 0 {
            return Ok(parsed);
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *state;
        let generation = state.next_generation();
        match state.entries.entry(text.to_string()) {
            // Another thread finished parsing the same text first
            Entry::Occupied(hit) => Ok(hit.get().0.clone()),
            Entry::Vacant(slot) => {
                slot.insert((parsed.clone(), generation));
                state.recency.insert(generation, text.to_string());
                state.evict_to(self.capacity);
                Ok(parsed)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const GP: &str = "YPVLN(N-Glycosylation)VTMPNNGK{Hex:5; HexNAc:4; NeuAc:2}";

    #[test]
    fn test_parse_and_display() {
        let gp = Glycopeptide::parse(GP).unwrap();
        assert_eq!(gp.len(), 13);
        assert_eq!(gp.sequence(), "YPVLNVTMPNNGK");
        assert_eq!(gp.glycosylation_sites(), vec![4]);
        assert_eq!(gp.glycan().get(&Monosaccharide::HexNAc), Some(&4));
        assert_eq!(gp.to_string(), GP);
        assert_eq!(Glycopeptide::parse(&gp.to_string()).unwrap(), gp);
    }

    #[test]
    fn test_masses() {
        let gp = Glycopeptide::parse("PEPTIDE").unwrap();
        assert!((gp.total_mass() - 799.359964).abs() < 1e-4);
        assert_eq!(gp.glycan_mass(), 0.0);

        let gp = Glycopeptide::parse("PEPTIDE{HexNAc:2; Hex:3}").unwrap();
        let expected = 799.359964 + 2.0 * 203.0793725 + 3.0 * 162.0528234;
        assert!((gp.total_mass() - expected).abs() < 1e-4);

        let gp = Glycopeptide::parse("PEPC(Carbamidomethyl)TIDE").unwrap();
        assert!(gp.residues()[3].modification.is_some());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Glycopeptide::parse("  "), Err(StructureParseError::Empty));
        assert!(matches!(
            Glycopeptide::parse("PEPZIDE"),
            Err(StructureParseError::UnknownResidue('Z', 3))
        ));
        assert!(matches!(
            Glycopeptide::parse("PEPT(Frobnication)IDE"),
            Err(StructureParseError::UnknownModification(_))
        ));
        assert!(matches!(
            Glycopeptide::parse("PEPTIDE{Hex:5; Kdn:1}"),
            Err(StructureParseError::UnknownMonosaccharide(_))
        ));
        assert!(matches!(
            Glycopeptide::parse("(Oxidation)PEPTIDE"),
            Err(StructureParseError::Malformed(_, _))
        ));
        assert!(matches!(
            Glycopeptide::parse("PEPTIDE{Hex:5"),
            Err(StructureParseError::Malformed(_, _))
        ));
    }

    #[test]
    fn test_non_finite_mass_modifications() {
        for label in ["NaN", "inf", "-inf", "infinity"] {
            let text = format!("PEPT({label})IDE");
            assert_eq!(
                Glycopeptide::parse(&text),
                Err(StructureParseError::UnknownModification(label.to_string()))
            );
        }
        let gp = Glycopeptide::parse("PEPT(-18.0106)IDE").unwrap();
        assert!((gp.residues()[3].mass() - (101.04767847 - 18.0106)).abs() < 1e-6);
    }

    #[test]
    fn test_glycan_count_overflow() {
        assert_eq!(
            Glycopeptide::parse("PEPTIDE{Hex:4294967295; Hex:1}"),
            Err(StructureParseError::Malformed(
                "PEPTIDE{Hex:4294967295; Hex:1}".to_string(),
                "glycan component count overflows".to_string()
            ))
        );
        let gp = Glycopeptide::parse("PEPTIDE{Hex:4294967294; Hex:1}").unwrap();
        assert_eq!(gp.glycan().get(&Monosaccharide::Hex), Some(&u32::MAX));
        assert_eq!(gp.to_string(), "PEPTIDE{Hex:4294967295}");
    }

    #[test]
    fn test_reverse_preserving_sequon() {
        let gp = Glycopeptide::parse(GP).unwrap();
        let rev = gp.reverse_preserving_sequon();
        assert_eq!(rev.len(), gp.len());
        // N, V, T of the sequon and the C-terminal K stay put
        assert_eq!(rev.sequence(), "GNNPNVTMLVPYK");
        assert_eq!(rev.glycosylation_sites(), vec![4]);
        assert_eq!(rev.glycan(), gp.glycan());
        assert!((rev.total_mass() - gp.total_mass()).abs() < 1e-6);
        assert!(!rev.is_glycan_decoy());
    }

    #[test]
    fn test_glycan_decoy_fragments() {
        let gp = Glycopeptide::parse(GP).unwrap();
        let decoy = gp.glycan_decoy();
        assert!(decoy.is_glycan_decoy());
        assert_eq!(gp.decoy_offset(), 0.0);
        let offset = decoy.decoy_offset();
        assert!((1.0..=30.0).contains(&offset));

        let target_frags = gp.fragments();
        let decoy_frags = decoy.fragments();
        assert_eq!(target_frags.len(), decoy_frags.len());
        for (t, d) in target_frags.iter().zip(decoy_frags.iter()) {
            if t.has_glycan {
                assert!((d.mass - t.mass - offset).abs() < 1e-9);
            } else {
                assert_eq!(t.mass, d.mass);
            }
        }
    }

    #[test]
    fn test_fragments() {
        let gp = Glycopeptide::parse("PEPTIDE").unwrap();
        let frags = gp.fragments();
        assert_eq!(frags.len(), 12);
        let b2 = frags.iter().find(|f| f.name() == "b2").unwrap();
        assert!((b2.mass - (97.05276385 + 129.04259309)).abs() < 1e-6);
        let y1 = frags.iter().find(|f| f.name() == "y1").unwrap();
        assert!((y1.mass - (129.04259309 + WATER)).abs() < 1e-6);
    }

    #[test]
    fn test_structure_cache() {
        let cache = StructureCache::new(2);
        let a = cache.parse("PEPTIDE").unwrap();
        let b = cache.parse("PEPTIDE").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        cache.parse("PEPTIDEK").unwrap();
        // refresh PEPTIDE so PEPTIDEK is the oldest
        cache.parse("PEPTIDE").unwrap();
        cache.parse("PEPTIDER").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("PEPTIDE"));
        assert!(!cache.contains("PEPTIDEK"));
        assert!(cache.contains("PEPTIDER"));

        assert!(cache.parse("PEPTIDEX").is_err());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_structure_cache_recency_after_many_hits() {
        let cache = StructureCache::new(3);
        for text in ["PEPTIDE", "PEPTIDEK", "PEPTIDER"] {
            cache.parse(text).unwrap();
        }
        for _ in 0..100 {
            cache.parse("PEPTIDE").unwrap();
            cache.parse("PEPTIDER").unwrap();
        }
        cache.parse("PEPTIDEG").unwrap();
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("PEPTIDEK"));
        cache.parse("PEPTIDEA").unwrap();
        assert!(!cache.contains("PEPTIDE"));
        assert!(cache.contains("PEPTIDER"));
        assert!(cache.contains("PEPTIDEG"));
    }
}
