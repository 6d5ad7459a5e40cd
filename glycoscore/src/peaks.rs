//! Deconvoluted peaks carrying an intensity rank, and the ranking procedure itself.
use std::sync::Arc;

use chemical_elements::{neutral_mass, PROTON};
use itertools::multizip;
use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, CoordinateLike, IndexType, MZPeakSetType, MassPeakSetType, MZ};
use serde::{Deserialize, Serialize};

/// A deconvoluted peak with an intensity rank.
///
/// A `rank` of `-1` means the peak has not been ranked yet, `0` means it fell below
/// the ranking threshold, and positive values are assigned ranks where larger values
/// are more intense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPeak {
    pub neutral_mass: f64,
    pub intensity: f32,
    pub charge: i32,
    pub signal_to_noise: f32,
    pub index: IndexType,
    pub rank: i32,
}

pub const UNRANKED: i32 = -1;

impl Default for RankedPeak {
    fn default() -> Self {
        Self {
            neutral_mass: 0.0,
            intensity: 0.0,
            charge: 1,
            signal_to_noise: 0.0,
            index: 0,
            rank: UNRANKED,
        }
    }
}

impl RankedPeak {
    pub fn new(
        neutral_mass: f64,
        intensity: f32,
        charge: i32,
        signal_to_noise: f32,
        index: IndexType,
        rank: i32,
    ) -> Self {
        Self {
            neutral_mass,
            intensity,
            charge,
            signal_to_noise,
            index,
            rank,
        }
    }

    pub fn mz(&self) -> f64 {
        let charge = self.charge as f64;
        (self.neutral_mass + PROTON * charge) / charge
    }

    pub fn is_ranked(&self) -> bool {
        self.rank > 0
    }
}

mzpeaks::implement_deconvoluted_centroidlike!(RankedPeak, true);

impl CoordinateLike<MZ> for RankedPeak {
    fn coordinate(&self) -> f64 {
        self.mz()
    }
}

/// A collection of [`RankedPeak`] ordered by neutral mass whose indices are always
/// `0..len`.
pub type PeakSet = MassPeakSetType<RankedPeak>;

/// Build a deconvoluted peak set from parallel m/z, intensity, and charge arrays.
///
/// The signal-to-noise ratio of each peak is not known, so it is set to its intensity.
pub fn build_deconvoluted_peak_set_from_arrays(
    mz_array: &[f64],
    intensity_array: &[f32],
    charge_array: &[i32],
) -> PeakSet {
    let peaks: Vec<RankedPeak> = multizip((mz_array.iter(), intensity_array.iter(), charge_array.iter()))
        .enumerate()
        .map(|(i, (mz, intensity, charge))| {
            RankedPeak::new(
                neutral_mass(*mz, *charge, PROTON),
                *intensity,
                *charge,
                *intensity,
                i as IndexType,
                UNRANKED,
            )
        })
        .collect();
    PeakSet::new(peaks)
}

/// Assigns ranks to peaks in descending order of intensity.
///
/// Peaks are handed out in buckets of `bucket_size`, starting at `top_rank` and
/// stepping down by one per bucket. The last bucket, rank 1, is repeated for
/// `tailing_buckets` extra buckets. Peaks less intense than `minimum_intensity`, or
/// left over once the ranks are used up, receive rank 0. Ties in intensity are broken
/// by position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRanker {
    pub minimum_intensity: f32,
    pub bucket_size: usize,
    pub top_rank: i32,
    pub tailing_buckets: usize,
}

impl Default for PeakRanker {
    fn default() -> Self {
        Self {
            minimum_intensity: 100.0,
            bucket_size: 10,
            top_rank: 10,
            tailing_buckets: 6,
        }
    }
}

impl PeakRanker {
    pub fn new(minimum_intensity: f32) -> Self {
        Self {
            minimum_intensity,
            ..Default::default()
        }
    }

    /// Assign a rank to every peak in `peaks` in place
    pub fn assign_ranks(&self, peaks: &mut [RankedPeak]) {
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by(|a, b| peaks[*b].intensity.total_cmp(&peaks[*a].intensity));

        let mut rank = self.top_rank;
        let mut in_bucket = 0;
        let mut tailing = self.tailing_buckets;
        for i in order {
            let peak = &mut peaks[i];
            if rank <= 0 || peak.intensity < self.minimum_intensity {
                peak.rank = 0;
                continue;
            }
            peak.rank = rank;
            in_bucket += 1;
            if in_bucket >= self.bucket_size {
                in_bucket = 0;
                if rank == 1 && tailing > 0 {
                    tailing -= 1;
                } else {
                    rank -= 1;
                }
            }
        }
    }

    /// Rank `peaks` in place, returning a new peak set containing only the peaks
    /// that received a positive rank, re-indexed from zero.
    pub fn rank(&self, peaks: &mut PeakSet) -> PeakSet {
        let mut buffer: Vec<RankedPeak> = peaks.iter().cloned().collect();
        self.assign_ranks(&mut buffer);
        let retained: Vec<RankedPeak> = buffer.iter().filter(|p| p.rank > 0).cloned().collect();
        *peaks = PeakSet::new(buffer);
        PeakSet::new(retained)
    }
}

/// A compact struct-of-arrays form of a centroided, not yet deconvoluted peak list.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedPeakSet {
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

impl PackedPeakSet {
    pub fn pack(peaks: &MZPeakSetType<CentroidPeak>) -> Self {
        let (mz, intensity) = peaks.iter().map(|p| (p.mz, p.intensity)).unzip();
        Self { mz, intensity }
    }

    pub fn unpack(&self) -> MZPeakSetType<CentroidPeak> {
        MZPeakSetType::new(
            self.mz
                .iter()
                .zip(self.intensity.iter())
                .enumerate()
                .map(|(i, (mz, intensity))| CentroidPeak::new(*mz, *intensity, i as IndexType))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }
}

/// Serialize a shared [`PeakSet`] as a plain sequence of peaks.
pub(crate) mod shared_peak_set {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(peaks: &Arc<PeakSet>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(peaks.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<PeakSet>, D::Error> {
        let peaks: Vec<RankedPeak> = Vec::deserialize(deserializer)?;
        Ok(Arc::new(PeakSet::new(peaks)))
    }
}
