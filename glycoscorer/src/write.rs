use std::io::{self, prelude::*};

use crossbeam_channel::Receiver;
use itertools::Itertools;
use mzdata::spectrum::utils::Collator;
use tracing::{debug, info};

use glycoscore::{AnnotatedScan, ScoreType, SpectrumMatch};

pub const COLUMNS: &[&str] = &[
    "index",
    "title",
    "structure",
    "mass_shift",
    "score",
    "matched_peaks",
    "decoy_score",
    "decoy_matched_peaks",
];

/// One row of the output table
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub index: isize,
    pub title: String,
    pub structure: String,
    pub mass_shift: String,
    pub score: ScoreType,
    pub matched_peaks: usize,
    pub decoy_score: Option<ScoreType>,
    pub decoy_matched_peaks: Option<usize>,
}

impl ScanReport {
    pub fn new(scan: &AnnotatedScan, target: &dyn SpectrumMatch) -> Self {
        let structure = scan
            .structure_annotation()
            .map(|s| s.to_string())
            .unwrap_or_else(|| target.target().to_string());
        Self {
            index: scan.index,
            title: scan.title.clone(),
            structure,
            mass_shift: target.mass_shift().name().to_string(),
            score: target.score(),
            matched_peaks: target.solution_map().matched_peak_count(),
            decoy_score: None,
            decoy_matched_peaks: None,
        }
    }

    pub fn with_decoy(mut self, decoy: &dyn SpectrumMatch) -> Self {
        self.decoy_score = Some(decoy.score());
        self.decoy_matched_peaks = Some(decoy.solution_map().matched_peak_count());
        self
    }

    pub fn write_row<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let decoy_score = self
            .decoy_score
            .map(|s| format!("{s:0.4}"))
            .unwrap_or_default();
        let decoy_matched = self
            .decoy_matched_peaks
            .map(|n| n.to_string())
            .unwrap_or_default();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{:0.4}\t{}\t{decoy_score}\t{decoy_matched}",
            self.index, self.title, self.structure, self.mass_shift, self.score, self.matched_peaks
        )
    }
}

/// Write reports to `writer` in the order they were read, regardless of the order
/// they arrive in. Scans that could not be scored arrive as `None` and are skipped.
pub fn write_reports<W: Write>(
    writer: W,
    receiver: Receiver<(usize, Option<ScanReport>)>,
) -> io::Result<usize> {
    let mut writer = io::BufWriter::new(writer);
    writeln!(writer, "{}", COLUMNS.join("\t"))?;

    let mut collator: Collator<Option<ScanReport>> = Collator::default();
    let mut rows_written = 0usize;
    let mut checkpoint = 0usize;
    while let Ok((ordinal, report)) = receiver.recv() {
        collator.receive(ordinal, report);
        while let Some((ordinal, report)) = collator.try_next() {
            if let Some(report) = report {
                report.write_row(&mut writer)?;
                rows_written += 1;
            }
            if ordinal - checkpoint >= 1000 {
                info!(
                    "Completed Scan {} | {} items in the write queue",
                    ordinal + 1,
                    receiver.len()
                );
                checkpoint = ordinal;
            }
        }
    }

    let n = collator.waiting.len();
    if n > 0 {
        debug!("Draining output queue, {n} items");
        let waiting = std::mem::take(&mut collator.waiting)
            .into_iter()
            .sorted_by(|(i, _), (j, _)| i.cmp(j));
        for (_, report) in waiting {
            if let Some(report) = report {
                report.write_row(&mut writer)?;
                rows_written += 1;
            }
        }
    }
    writer.flush()?;
    Ok(rows_written)
}

#[cfg(test)]
mod test {
    use super::*;
    use crossbeam_channel::bounded;

    fn report(i: usize) -> ScanReport {
        ScanReport {
            index: i as isize,
            title: format!("run.mgf.scan{i}"),
            structure: "PEPTIDE".into(),
            mass_shift: "Unmodified".into(),
            score: 10.0 + i as f64,
            matched_peaks: 3,
            decoy_score: (i % 2 == 0).then_some(1.5),
            decoy_matched_peaks: (i % 2 == 0).then_some(1),
        }
    }

    #[test]
    fn test_rows_are_written_in_order() {
        let (sender, receiver) = bounded(16);
        for i in [2usize, 0, 3, 1, 4] {
            let item = if i == 3 { None } else { Some(report(i)) };
            sender.send((i, item)).unwrap();
        }
        drop(sender);

        let mut buffer = Vec::new();
        let n = write_reports(&mut buffer, receiver).unwrap();
        assert_eq!(n, 4);
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], COLUMNS.join("\t"));
        assert_eq!(
            lines[1],
            "0\trun.mgf.scan0\tPEPTIDE\tUnmodified\t10.0000\t3\t1.5000\t1"
        );
        assert_eq!(lines[2], "1\trun.mgf.scan1\tPEPTIDE\tUnmodified\t11.0000\t3\t\t");
        assert!(lines[3].starts_with("2\t"));
        assert!(lines[4].starts_with("4\t"));
    }
}
