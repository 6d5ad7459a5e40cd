use std::fs;
use std::io;

use mzpeaks::prelude::*;

use glycoscore::data_source::DEFAULT_ACTIVATION_METHOD;
use glycoscore::scorer::Kwargs;
use glycoscore::{read, read_stream, AnnotatedScan, IngestionError};

const PATH: &str = "./tests/data/annotated.mgf";

fn load() -> Result<Vec<AnnotatedScan>, IngestionError> {
    read(PATH)?.collect()
}

#[test_log::test]
fn test_read_file() -> Result<(), IngestionError> {
    let scans = load()?;
    assert_eq!(scans.len(), 4);

    let titles: Vec<_> = scans.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "annotated.mgf.scan001",
            "annotated.mgf.scan002",
            "annotated.mgf.scan003",
            "annotated.mgf.scan004"
        ]
    );
    for (i, scan) in scans.iter().enumerate() {
        assert_eq!(scan.index, i as isize);
        assert!(scan.structure_annotation().is_some());
        assert!(scan.structure().is_ok());
        assert!(!scan.deconvoluted_peak_set.is_empty());
    }

    let scan = &scans[0];
    assert_eq!(scan.id, "scan001");
    assert_eq!(scan.deconvoluted_peak_set.len(), 15);
    assert!(scan.mass_shift().is_unmodified());
    let prec = scan.precursor_information.as_ref().unwrap();
    assert_eq!(prec.charge, Some(2));
    assert!((prec.neutral_mass() - 799.35997).abs() < 1e-3);
    assert_eq!(
        scan.activation.as_ref().unwrap().method,
        DEFAULT_ACTIVATION_METHOD
    );

    let scan = &scans[1];
    assert_eq!(scan.mass_shift().name(), "Ammonium");
    let activation = scan.activation.as_ref().unwrap();
    assert_eq!(activation.method, "ethcd");
    assert_eq!(activation.energy, Some(30.0));
    assert!(scan.deconvoluted_peak_set.iter().any(|p| p.charge == 3));

    let scan = &scans[2];
    assert!(!scan.annotations.contains_key("is_hcd"));
    assert!(!scan.annotations.contains_key("is_exd"));

    let scan = &scans[3];
    assert_eq!(scan.mass_shift().name(), "Sodium");
    assert_eq!(scan.activation.as_ref().unwrap().method, "hcd");
    Ok(())
}

#[test_log::test]
fn test_read_stream_indexes_incrementally() -> Result<(), IngestionError> {
    let handle = io::BufReader::new(fs::File::open(PATH)?);
    let ingestor = read_stream(handle, "batch.mgf");
    assert_eq!(ingestor.source_name(), "batch.mgf");
    let scans: Vec<_> = ingestor.collect::<Result<_, _>>()?;
    assert_eq!(scans.len(), 4);
    assert_eq!(scans[2].title, "batch.mgf.scan003");
    assert_eq!(scans[2].index, 2);
    Ok(())
}

#[test_log::test]
fn test_score_targets_and_decoys() -> Result<(), Box<dyn std::error::Error>> {
    let mut scans = load()?;

    let scan = &mut scans[0];
    let target = scan.match_structure(Kwargs::new())?;
    assert_eq!(target.solution_map().matched_peak_count(), 12);

    let mut decoy = scan.decoy(true, false)?;
    assert!(decoy.is_decoy());
    let decoy_match = decoy.match_structure(Kwargs::new())?;
    assert!(decoy_match.score() < target.score());
    assert_eq!(scan.structure()?.sequence(), "PEPTIDE");

    let scan = &mut scans[1];
    let target = scan.match_structure(Kwargs::new())?;
    assert!(target.mass_shift().name() == "Ammonium");
    // the three stub glycopeptide peaks and the intact precursor
    let stubs = target
        .solution_map()
        .iter()
        .filter(|p| p.fragment.starts_with("peptide+") || p.fragment == "M")
        .count();
    assert_eq!(stubs, 4);

    let mut glycan_decoy = scan.decoy(false, true)?;
    let decoy_match = glycan_decoy.match_structure(Kwargs::new())?;
    assert!(decoy_match.score() < target.score());
    Ok(())
}

#[test]
fn test_missing_file() {
    let err = read("./tests/data/not_real.mgf").err().unwrap();
    assert!(matches!(err, IngestionError::IOError(_)));
}
