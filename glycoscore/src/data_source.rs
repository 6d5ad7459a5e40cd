//! Read annotated MGF files into [`AnnotatedScan`] instances.
//!
//! Each MGF entry carries the structure it was assigned to in its header, along with
//! optional `MASS_SHIFT`, `ACTIVATION_METHOD`, and `ACTIVATION_ENERGY` entries. The
//! peak list holds deconvoluted peaks as `m/z intensity charge` triples.
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use mzdata::io::{infer_format, mgf::MGFReaderType, MassSpectrometryFormat, RestartableGzDecoder};
use mzdata::prelude::*;
use mzdata::spectrum::bindata::ArrayRetrievalError;
use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, DeconvolutedPeak, MZPeakSetType};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::SessionContext;
use crate::peaks::{build_deconvoluted_peak_set_from_arrays, PackedPeakSet, PeakSet};
use crate::scan::{ActivationInformation, AnnotatedScan, AnnotationValue, Polarity, PrecursorInformation};

/// The activation method assumed when a record does not name one
pub const DEFAULT_ACTIVATION_METHOD: &str = "hcd";

/// Annotations that are consumed while reading and not kept on the scan
const DROPPED_ANNOTATIONS: &[&str] = &["is_hcd", "is_exd"];

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read the {0} of {1}: {2}")]
    ArrayRetrievalError(&'static str, String, #[source] ArrayRetrievalError),
    #[error("The arrays of {title} differ in length (m/z: {mz}, intensity: {intensity}, charge: {charge})")]
    ArrayLengthMismatch {
        title: String,
        mz: usize,
        intensity: usize,
        charge: usize,
    },
}

/// The raw content of a single peak list entry, before it becomes an [`AnnotatedScan`]
#[derive(Debug, Clone, Default)]
pub struct ScanRecord {
    /// The native title of the entry
    pub title: String,
    pub mz_array: Vec<f64>,
    pub intensity_array: Vec<f32>,
    pub charge_array: Option<Vec<i32>>,
    pub precursor: Option<PrecursorInformation>,
    pub ms_level: u8,
    pub scan_time: f64,
    pub polarity: Polarity,
    /// Header entries not otherwise interpreted, keyed by lower-case name
    pub annotations: HashMap<String, String>,
    /// The centroided, not yet deconvoluted peak list, if the source has one
    pub peaks: Option<MZPeakSetType<CentroidPeak>>,
}

impl ScanRecord {
    pub fn new(
        title: impl Into<String>,
        mz_array: Vec<f64>,
        intensity_array: Vec<f32>,
        charge_array: Option<Vec<i32>>,
    ) -> Self {
        Self {
            title: title.into(),
            mz_array,
            intensity_array,
            charge_array,
            ms_level: 2,
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

type MGFSpectrum = MultiLayerSpectrum<CentroidPeak, DeconvolutedPeak>;

fn record_from_spectrum(spectrum: MGFSpectrum) -> Result<ScanRecord, IngestionError> {
    let title = spectrum.id().to_string();
    let array_err = |what: &'static str, e: ArrayRetrievalError| {
        IngestionError::ArrayRetrievalError(what, title.clone(), e)
    };

    let (mz_array, intensity_array, charge_array) = if let Some(arrays) = spectrum.raw_arrays() {
        let mzs = arrays.mzs().map_err(|e| array_err("m/z array", e))?.to_vec();
        let intensities = arrays
            .intensities()
            .map_err(|e| array_err("intensity array", e))?
            .to_vec();
        let charges = arrays.charges().ok().map(|z| z.to_vec());
        (mzs, intensities, charges)
    } else if let Some(peaks) = spectrum.deconvoluted_peaks.as_ref() {
        let mut mzs = Vec::with_capacity(peaks.len());
        let mut intensities = Vec::with_capacity(peaks.len());
        let mut charges = Vec::with_capacity(peaks.len());
        for p in peaks.iter() {
            mzs.push(p.mz());
            intensities.push(p.intensity);
            charges.push(p.charge);
        }
        (mzs, intensities, Some(charges))
    } else if let Some(peaks) = spectrum.peaks.as_ref() {
        let (mzs, intensities) = peaks.iter().map(|p| (p.mz, p.intensity)).unzip();
        (mzs, intensities, None)
    } else {
        (Vec::new(), Vec::new(), None)
    };

    let precursor = spectrum.precursor().and_then(|prec| {
        let ion = prec.ion()?;
        Some(PrecursorInformation {
            mz: ion.mz,
            intensity: ion.intensity,
            charge: ion.charge,
            precursor_scan_id: prec.precursor_id.clone(),
        })
    });

    let annotations = spectrum
        .description()
        .params
        .iter()
        .map(|p| (p.name.to_lowercase(), p.value.to_string()))
        .collect();

    Ok(ScanRecord {
        mz_array,
        intensity_array,
        charge_array,
        precursor,
        ms_level: spectrum.ms_level(),
        scan_time: spectrum.start_time(),
        polarity: spectrum.polarity().into(),
        annotations,
        peaks: spectrum.peaks.clone(),
        title,
    })
}

/// Adapts an MGF reader into a sequence of [`ScanRecord`]
pub struct MGFRecords<R: Read> {
    reader: MGFReaderType<R, CentroidPeak, DeconvolutedPeak>,
}

impl<R: Read> MGFRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: MGFReaderType::new(reader),
        }
    }
}

impl<R: Read> Iterator for MGFRecords<R> {
    type Item = Result<ScanRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next().map(record_from_spectrum)
    }
}

/// Converts raw peak list records into [`AnnotatedScan`] instances.
///
/// Scan titles are qualified with the base name of the source they were read from,
/// and resolved to a position in the source through a title index. When no index was
/// provided up front, it is built as records are read.
pub struct ScanIngestor<I> {
    records: I,
    source_name: String,
    title_to_index: HashMap<String, usize>,
    index_incrementally: bool,
    records_read: usize,
    context: Arc<SessionContext>,
}

impl<I: Iterator<Item = Result<ScanRecord, IngestionError>>> ScanIngestor<I> {
    pub fn new(records: I, source_name: impl AsRef<str>) -> Self {
        let source_name = Path::new(source_name.as_ref())
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| source_name.as_ref().to_string());
        Self {
            records,
            source_name,
            title_to_index: HashMap::new(),
            index_incrementally: true,
            records_read: 0,
            context: SessionContext::global(),
        }
    }

    /// Use a pre-built title index instead of building one while reading
    pub fn with_title_index(mut self, title_to_index: HashMap<String, usize>) -> Self {
        self.title_to_index = title_to_index;
        self.index_incrementally = false;
        self
    }

    pub fn with_context(mut self, context: Arc<SessionContext>) -> Self {
        self.context = context;
        self
    }

    /// The base name of the source
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn title_to_index(&self) -> &HashMap<String, usize> {
        &self.title_to_index
    }

    /// Qualify a native title with the source's base name
    pub fn scan_title(&self, native_title: &str) -> String {
        format!("{}.{}", self.source_name, native_title)
    }

    /// The position of the entry titled `native_title` in the source, or -1
    pub fn scan_index(&self, native_title: &str) -> isize {
        let key = self.scan_title(native_title);
        if let Some(i) = self.title_to_index.get(&key) {
            return *i as isize;
        }
        match self.title_to_index.get(&format!("{key}.")) {
            Some(i) => *i as isize,
            None => {
                debug!("{key} was not found in the title index");
                -1
            }
        }
    }

    pub fn activation(&self, annotations: &HashMap<String, String>) -> ActivationInformation {
        let method = match annotations.get("activation_method") {
            Some(method) if !method.starts_with("unknown") => method.clone(),
            _ => DEFAULT_ACTIVATION_METHOD.to_string(),
        };
        let energy = annotations
            .get("activation_energy")
            .and_then(|e| match e.trim().parse::<f32>() {
                Ok(energy) => Some(energy),
                Err(_) => {
                    warn!("Could not interpret activation energy {e:?}");
                    None
                }
            });
        ActivationInformation { method, energy }
    }

    pub fn build_peaks(&self, record: &ScanRecord) -> Result<PeakSet, IngestionError> {
        let n = record.mz_array.len();
        let defaulted_charges;
        let charges = match record.charge_array.as_ref() {
            Some(charges) => charges.as_slice(),
            None => {
                debug!("{} has no charge array, assuming charge 1", record.title);
                defaulted_charges = vec![1; n];
                defaulted_charges.as_slice()
            }
        };
        if record.intensity_array.len() != n || charges.len() != n {
            return Err(IngestionError::ArrayLengthMismatch {
                title: record.title.clone(),
                mz: n,
                intensity: record.intensity_array.len(),
                charge: charges.len(),
            });
        }
        Ok(build_deconvoluted_peak_set_from_arrays(
            &record.mz_array,
            &record.intensity_array,
            charges,
        ))
    }

    pub fn make_scan(&self, mut record: ScanRecord) -> Result<AnnotatedScan, IngestionError> {
        let peaks = self.build_peaks(&record)?;
        for key in DROPPED_ANNOTATIONS {
            record.annotations.remove(*key);
        }
        let activation = self.activation(&record.annotations);
        let index = self.scan_index(&record.title);

        let mut scan = AnnotatedScan::new(
            record.title.clone(),
            self.scan_title(&record.title),
            index,
            peaks,
        )
        .with_context(self.context.clone());
        scan.precursor_information = record.precursor;
        scan.ms_level = record.ms_level;
        scan.scan_time = record.scan_time;
        scan.polarity = record.polarity;
        scan.activation = Some(activation);
        scan.peak_set = record.peaks.as_ref().map(PackedPeakSet::pack);
        scan.annotations = record
            .annotations
            .into_iter()
            .map(|(k, v)| (k, AnnotationValue::Text(v)))
            .collect();
        Ok(scan)
    }
}

impl<I: Iterator<Item = Result<ScanRecord, IngestionError>>> Iterator for ScanIngestor<I> {
    type Item = Result<AnnotatedScan, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                self.records_read += 1;
                return Some(Err(e));
            }
        };
        if self.index_incrementally {
            let key = self.scan_title(&record.title);
            self.title_to_index.entry(key).or_insert(self.records_read);
        }
        self.records_read += 1;
        Some(self.make_scan(record))
    }
}

/// The reader type produced by [`read`]
pub type MGFFileSource = MGFRecords<Box<dyn Read + Send>>;

fn open_stream(path: &Path) -> Result<Box<dyn Read + Send>, IngestionError> {
    let (format, compressed) = infer_format(path)?;
    if !matches!(format, MassSpectrometryFormat::MGF) {
        warn!(
            "{} was detected as {format:?}, reading it as MGF anyway",
            path.display()
        );
    }
    let handle = BufReader::new(fs::File::open(path)?);
    if compressed {
        Ok(Box::new(RestartableGzDecoder::new(handle)))
    } else {
        Ok(Box::new(handle))
    }
}

/// Map the qualified title of each `BEGIN IONS` block to its position in `reader`.
///
/// Only the block headers are looked at, so peak lists are never parsed. A block
/// without a `TITLE` still takes up a position. Reading stops at the first IO error
/// and whatever was indexed up to that point is kept.
pub fn index_titles<R: BufRead>(mut reader: R, source_name: &str) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    let mut buffer = Vec::new();
    let mut awaiting_title: Option<usize> = None;
    let mut blocks = 0usize;
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Stopped indexing {source_name} after {blocks} entries: {e}");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim();
        if line.starts_with("BEGIN IONS") {
            awaiting_title = Some(blocks);
            blocks += 1;
        } else if line.starts_with("END IONS") {
            awaiting_title = None;
        } else if let Some(position) = awaiting_title {
            if let Some(title) = line.strip_prefix("TITLE=") {
                index
                    .entry(format!("{source_name}.{}", title.trim()))
                    .or_insert(position);
                awaiting_title = None;
            }
        }
    }
    index
}

/// Open an annotated MGF file, which may be gzip-compressed.
///
/// The entry headers are scanned once up front to build the title index, so every
/// scan's `index` is its position in the file.
pub fn read(path: impl AsRef<Path>) -> Result<ScanIngestor<MGFFileSource>, IngestionError> {
    let path = path.as_ref();
    let ingestor = ScanIngestor::new(MGFRecords::new(open_stream(path)?), path.to_string_lossy());
    let index = index_titles(BufReader::new(open_stream(path)?), ingestor.source_name());
    debug!("Indexed {} scans from {}", index.len(), path.display());
    Ok(ingestor.with_title_index(index))
}

/// Read annotated MGF content from an arbitrary stream named `source_name`.
///
/// The title index is built as scans are read.
pub fn read_stream<R: Read>(reader: R, source_name: impl AsRef<str>) -> ScanIngestor<MGFRecords<R>> {
    ScanIngestor::new(MGFRecords::new(reader), source_name)
}
