use std::fs;
use std::io::{self, Read};

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use flate2::read::GzDecoder;

use glycoscorer::{DecoyMode, GlycoScorer, COLUMNS};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_configured() -> Result<(), Box<dyn std::error::Error>> {
    let output_path = std::env::temp_dir().join("glycoscorer_test_configured.tsv.gz");
    let config = Figment::new()
        .merge(Toml::file_exact("./tests/data/config.toml"))
        .merge(Serialized::default("output_file", &output_path));
    let driver: GlycoScorer = config.extract()?;
    assert_eq!(driver.decoys, DecoyMode::Both);
    assert_eq!(driver.threads, 2);
    assert_eq!(driver.error_tolerance, 15.0);
    driver.main()?;

    let mut text = String::new();
    GzDecoder::new(io::BufReader::new(fs::File::open(&output_path)?))
        .read_to_string(&mut text)?;
    fs::remove_file(&output_path)?;

    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], COLUMNS.join("\t"));
    assert_eq!(lines.len(), 5);
    assert!(lines[1..]
        .iter()
        .all(|line| line.split('\t').last().is_some_and(|s| !s.is_empty())));
    Ok(())
}
