//! FASTA transcriptome: NC → locus-tag synonyms and transcript lengths.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct TranscriptAnnotation {
    /// NC transcript name → locus tag without underscores.
    pub synonyms: HashMap<String, String>,
    /// Locus tag → total sequence length.
    pub lengths: HashMap<String, usize>,
}

impl TranscriptAnnotation {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Reading transcriptome annotation from {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let locus_re = Regex::new(r"locus_tag=([^\s]+)")?;
        let mut annotation = Self::default();
        let mut current: Option<(String, usize)> = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');

            if let Some(header) = line.strip_prefix('>') {
                if let Some((locus, length)) = current.take() {
                    annotation.lengths.insert(locus, length);
                }

                let nc_name = header.split(' ').next().unwrap_or_default().to_string();
                let locus = match locus_re.captures(header) {
                    Some(caps) => caps[1].replace([']', '_'], ""),
                    None => bail!("line {}: header without locus_tag: {line}", line_no + 1),
                };
                annotation.synonyms.insert(nc_name, locus.clone());
                current = Some((locus, 0));
            } else {
                match current.as_mut() {
                    Some((_, length)) => *length += line.chars().count(),
                    None if line.is_empty() => {}
                    None => bail!("line {}: sequence before first header", line_no + 1),
                }
            }
        }
        if let Some((locus, length)) = current {
            annotation.lengths.insert(locus, length);
        }

        info!(
            "{} transcripts annotated, {} lengths",
            annotation.synonyms.len(),
            annotation.lengths.len()
        );
        Ok(annotation)
    }

    pub fn locus_for(&self, nc_name: &str) -> Result<&str> {
        self.synonyms
            .get(nc_name)
            .map(String::as_str)
            .with_context(|| format!("no synonym for transcript `{nc_name}`"))
    }

    pub fn length_of(&self, gene: &str) -> Result<usize> {
        self.lengths
            .get(gene)
            .copied()
            .with_context(|| format!("no transcript length for `{gene}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &str = ">lcl|NC_002607.1_cds_1 [gene=dnaN] [locus_tag=VNG_0001H] [protein=x]\n\
ATGCATGCAT\n\
ATG\n\
>lcl|NC_002607.1_cds_2 [locus_tag=VNG_0002G]\n\
AAAA\n";

    #[test]
    fn extracts_synonyms_and_lengths() {
        let ann = TranscriptAnnotation::from_reader(FASTA.as_bytes()).unwrap();
        assert_eq!(ann.locus_for("lcl|NC_002607.1_cds_1").unwrap(), "VNG0001H");
        assert_eq!(ann.locus_for("lcl|NC_002607.1_cds_2").unwrap(), "VNG0002G");
        assert_eq!(ann.length_of("VNG0001H").unwrap(), 13);
        assert_eq!(ann.length_of("VNG0002G").unwrap(), 4);
    }

    #[test]
    fn header_without_locus_tag_is_fatal() {
        let text = ">lcl|x [gene=abc]\nACGT\n";
        assert!(TranscriptAnnotation::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn unknown_transcript_is_an_error() {
        let ann = TranscriptAnnotation::from_reader(FASTA.as_bytes()).unwrap();
        assert!(ann.locus_for("missing").is_err());
        assert!(ann.length_of("missing").is_err());
    }
}
