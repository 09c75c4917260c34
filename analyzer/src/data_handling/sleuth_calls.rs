//! Lists of transcripts reported by sleuth for each timepoint contrast.
//!
//! Only the transcript identities are used; the call itself is recomputed
//! from the expression matrix.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use super::annotation::TranscriptAnnotation;

/// `tp.3` → `sleuthResultsRNA.31.csv`.
pub fn sleuth_file_name(timepoint: &str) -> Result<String> {
    match timepoint.chars().last() {
        Some(last) if last.is_ascii_digit() => Ok(format!("sleuthResultsRNA.{last}1.csv")),
        _ => bail!("timepoint `{timepoint}` does not end in a digit"),
    }
}

pub fn sleuth_file_path(dir: &Path, timepoint: &str) -> Result<PathBuf> {
    Ok(dir.join(sleuth_file_name(timepoint)?))
}

/// Gene names (locus tags) listed in a sleuth result file, in file order.
pub fn read_sleuth_genes<R: std::io::Read>(
    reader: R,
    annotation: &TranscriptAnnotation,
) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut genes = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let nc_name = record
            .get(1)
            .with_context(|| format!("row {}: missing transcript column", i + 2))?
            .replace('"', "");
        genes.push(annotation.locus_for(&nc_name)?.to_string());
    }
    Ok(genes)
}

pub fn load_sleuth_genes(
    dir: &Path,
    timepoint: &str,
    annotation: &TranscriptAnnotation,
) -> Result<Vec<String>> {
    let path = sleuth_file_path(dir, timepoint)?;
    info!("Reading differential expression list from {}", path.display());
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    read_sleuth_genes(file, annotation).with_context(|| format!("parsing {}", path.display()))
}
