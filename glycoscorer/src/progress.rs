use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub scans_read: usize,
    pub scans_scored: usize,
    pub scans_failed: usize,
    pub decoys_scored: usize,
    pub matched_peaks: usize,
}

impl ProgressRecord {
    pub fn failed() -> Self {
        Self {
            scans_read: 1,
            scans_failed: 1,
            ..Default::default()
        }
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.scans_read += rhs.scans_read;
        self.scans_scored += rhs.scans_scored;
        self.scans_failed += rhs.scans_failed;
        self.decoys_scored += rhs.decoys_scored;
        self.matched_peaks += rhs.matched_peaks;
    }
}
