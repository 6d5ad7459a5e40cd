use std::fs;
use std::io::{self, prelude::*};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::parser::ValueSource;
use clap::{ArgMatches, Parser, ValueEnum};
use crossbeam_channel::{bounded, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use figment::value::{Dict, Value};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use glycoscore::data_source::MGFFileSource;
use glycoscore::scorer::Kwargs;
use glycoscore::{
    read, read_stream, AnnotatedScan, AnnotationError, BoundScorer, IngestionError,
    LogIntensityScorer, ScanIngestor,
};

use crate::progress::ProgressRecord;
use crate::write::{write_reports, ScanReport};

pub const BUFFER_SIZE: usize = 2000;

#[derive(Debug, Error)]
pub enum GlycoScorerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read {0}: {1}")]
    InputError(String, #[source] IngestionError),
    #[error("Failed to load configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("No input file was given on the command line or in the configuration")]
    MissingInput,
    #[error("Failed to build the thread pool: {0}")]
    ThreadPool(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

/// Which dimensions of each scan's structure to build a decoy along
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoyMode {
    #[default]
    None,
    Peptide,
    Glycan,
    Both,
}

impl DecoyMode {
    /// The `(peptide, glycan)` flags to decoy with, if any
    pub fn dimensions(&self) -> Option<(bool, bool)> {
        match self {
            DecoyMode::None => None,
            DecoyMode::Peptide => Some((true, false)),
            DecoyMode::Glycan => Some((false, true)),
            DecoyMode::Both => Some((true, true)),
        }
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_threads() -> i32 {
    -1
}

fn default_error_tolerance() -> f64 {
    glycoscore::scorer::DEFAULT_ERROR_TOLERANCE
}

fn default_write_buffer_size() -> usize {
    BUFFER_SIZE
}

/// Score annotated glycopeptide tandem mass spectra.
///
/// Read an annotated MGF file or stream, match each scan against the structure it
/// was assigned, optionally against a decoy of that structure too, and write a
/// tab-separated table of scores.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct GlycoScorer {
    /// The path to read the input spectra from, or if '-' is passed, read from STDIN
    #[arg()]
    #[serde(default)]
    pub input_file: Option<String>,

    /// The path to write the score table to, or if '-' is passed, write to STDOUT.
    ///
    /// A path ending in `.gz` is gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `glycoscorer.toml` in the working directory.
    /// Environment variables prefixed with `GLYCOSCORER_` will be read too.
    #[arg(long = "config-file")]
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// Which dimensions of the assigned structure to decoy and score alongside it
    #[arg(short = 'd', long = "decoys", value_enum, default_value_t = DecoyMode::None)]
    #[serde(default)]
    pub decoys: DecoyMode,

    /// The mass error tolerance for matching fragments, in PPM
    #[arg(short = 'e', long = "error-tolerance", default_value_t = 20.0)]
    #[serde(default = "default_error_tolerance")]
    pub error_tolerance: f64,

    /// The size of the buffer for queueing writing of results to the output stream
    #[arg(short = 'w', long="write-buffer-size", default_value_t=BUFFER_SIZE)]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
}

impl GlycoScorer {
    /// The values in `self` that were given explicitly on the command line `matches`
    /// was parsed from, to be layered over every other configuration source.
    pub fn explicit_arguments(&self, matches: &ArgMatches) -> Result<Dict, figment::Error> {
        let mut values = Value::serialize(self)?.into_dict().unwrap_or_default();
        values.retain(|key, _| matches!(matches.value_source(key), Some(ValueSource::CommandLine)));
        Ok(values)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, GlycoScorerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    fn scorer(&self) -> BoundScorer<LogIntensityScorer> {
        BoundScorer::default().kwarg("error_tolerance", self.error_tolerance)
    }

    pub fn main(&self) -> Result<(), GlycoScorerError> {
        info!(
            "glycoscorer v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        let input_file = self
            .input_file
            .as_deref()
            .ok_or(GlycoScorerError::MissingInput)?;
        info!("Input: {input_file}");
        info!("Output: {}", self.output_file.display());
        self.create_threadpool()?
            .install(|| self.reader_then(input_file))
    }

    fn reader_then(&self, input_file: &str) -> Result<(), GlycoScorerError> {
        let ingestor: ScanIngestor<MGFFileSource> = if input_file == "-" {
            debug!("Reading from STDIN");
            let stream: Box<dyn Read + Send> = Box::new(io::BufReader::new(io::stdin()));
            read_stream(stream, "stdin")
        } else {
            read(input_file)
                .map_err(|e| GlycoScorerError::InputError(input_file.to_string(), e))?
        };
        self.writer_then(ingestor)
    }

    fn writer_then(&self, ingestor: ScanIngestor<MGFFileSource>) -> Result<(), GlycoScorerError> {
        let writer: Box<dyn Write + Send> = if self.output_file == PathBuf::from("-") {
            Box::new(io::stdout())
        } else {
            let handle = io::BufWriter::new(fs::File::create(&self.output_file)?);
            let compressed = self
                .output_file
                .extension()
                .is_some_and(|ext| ext == "gz");
            if compressed {
                Box::new(GzEncoder::new(handle, Compression::best()))
            } else {
                Box::new(handle)
            }
        };
        self.run_workflow(ingestor, writer)
    }

    fn score_scan(
        &self,
        scorer: &BoundScorer<LogIntensityScorer>,
        scan: &mut AnnotatedScan,
    ) -> Result<(ScanReport, ProgressRecord), AnnotationError> {
        let target = scan.match_with(scorer, &[], Kwargs::new())?;
        let mut report = ScanReport::new(scan, target.as_ref());
        let mut prog = ProgressRecord {
            scans_read: 1,
            scans_scored: 1,
            matched_peaks: report.matched_peaks,
            ..Default::default()
        };
        if let Some((peptide, glycan)) = self.decoys.dimensions() {
            let mut decoy = scan.decoy(peptide, glycan)?;
            let decoy_match = decoy.match_with(scorer, &[], Kwargs::new())?;
            report = report.with_decoy(decoy_match.as_ref());
            prog.decoys_scored += 1;
        }
        Ok((report, prog))
    }

    fn process_scans(
        &self,
        ingestor: ScanIngestor<MGFFileSource>,
        sender: Sender<(usize, Option<ScanReport>)>,
    ) -> ProgressRecord {
        let scorer = self.scorer();
        ingestor
            .enumerate()
            .par_bridge()
            .map_with(sender, |sender, (i, scan)| {
                let (report, prog) = match scan {
                    Ok(mut scan) => match self.score_scan(&scorer, &mut scan) {
                        Ok((report, prog)) => (Some(report), prog),
                        Err(e) => {
                            warn!("Failed to score {}: {e}", scan.title);
                            (None, ProgressRecord::failed())
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read scan {i}: {e}");
                        (None, ProgressRecord::failed())
                    }
                };
                if let Err(e) = sender.send((i, report)) {
                    warn!("Failed to send report for scan {i}: {e}");
                }
                prog
            })
            .reduce(ProgressRecord::default, |a, b| a + b)
    }

    fn run_workflow(
        &self,
        ingestor: ScanIngestor<MGFFileSource>,
        writer: Box<dyn Write + Send>,
    ) -> Result<(), GlycoScorerError> {
        let (sender, receiver) = bounded(self.write_buffer_size.max(1));

        let start = Instant::now();
        let write_task = thread::spawn(move || write_reports(writer, receiver));

        let prog = self.process_scans(ingestor, sender);
        info!("Scans Read: {}", prog.scans_read);
        info!(
            "Scans Scored: {} | Failed: {}",
            prog.scans_scored, prog.scans_failed
        );
        if self.decoys.dimensions().is_some() {
            info!("Decoys Scored: {}", prog.decoys_scored);
        }
        info!("Matched Peaks: {}", prog.matched_peaks);
        let processing_elapsed = start.elapsed();

        match write_task.join() {
            Ok(o) => {
                let rows = o?;
                debug!("Wrote {rows} rows");
            }
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
            }
        }

        let elapsed = start.elapsed();
        info!("Elapsed Time: {:0.3?}", processing_elapsed);
        if (elapsed.as_secs_f64() - processing_elapsed.as_secs_f64()) > 2.0 {
            info!("Total Elapsed Time: {:0.3?}", elapsed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decoy_dimensions() {
        assert_eq!(DecoyMode::None.dimensions(), None);
        assert_eq!(DecoyMode::Peptide.dimensions(), Some((true, false)));
        assert_eq!(DecoyMode::Glycan.dimensions(), Some((false, true)));
        assert_eq!(DecoyMode::Both.dimensions(), Some((true, true)));
    }

    #[test]
    fn test_parse_args() {
        let args =
            GlycoScorer::try_parse_from(["glycoscorer", "in.mgf", "-d", "both", "-e", "10"])
                .unwrap();
        assert_eq!(args.input_file.as_deref(), Some("in.mgf"));
        assert_eq!(args.output_file, PathBuf::from("-"));
        assert_eq!(args.decoys, DecoyMode::Both);
        assert_eq!(args.error_tolerance, 10.0);
        assert_eq!(args.threads, -1);
        assert_eq!(args.scorer().kwargs()["error_tolerance"], 10.0);
    }

    #[test]
    fn test_explicit_arguments() {
        use clap::{CommandFactory, FromArgMatches};

        let matches = GlycoScorer::command()
            .try_get_matches_from(["glycoscorer", "-d", "both", "-t", "4"])
            .unwrap();
        let args = GlycoScorer::from_arg_matches(&matches).unwrap();
        assert!(args.input_file.is_none());
        let explicit = args.explicit_arguments(&matches).unwrap();
        let mut keys: Vec<_> = explicit.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["decoys", "threads"]);
        assert_eq!(explicit["decoys"].as_str(), Some("both"));

        let err = args.main().unwrap_err();
        assert!(matches!(err, GlycoScorerError::MissingInput));
    }
}
