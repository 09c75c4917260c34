//! Proteomics log2 fold-change tables, one CSV per condition and replicate.
//!
//! File names follow `<condition>.<replicate>.<anything>.csv`. Columns 3, 7
//! and 11 hold the log2 fold-changes of timepoints 2, 3 and 4 against
//! timepoint 1.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// Comparison label and zero-based column index.
pub const COMPARISONS: [(&str, usize); 3] = [("tp2vs1", 2), ("tp3vs1", 6), ("tp4vs1", 10)];

/// Display label of each timepoint; index 0 is the baseline.
pub const TIMEPOINT_LABELS: [&str; 4] = ["TP1", "TP2", "TP3", "TP4"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SampleKey {
    condition: String,
    replicate: String,
    comparison: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProteomicsData {
    /// Sorted.
    pub conditions: Vec<String>,
    /// Sorted.
    pub replicates: Vec<String>,
    /// Sorted.
    pub genes: Vec<String>,
    values: HashMap<SampleKey, HashMap<String, f64>>,
}

/// Gene name and the three comparison values of one CSV row.
pub fn read_fold_changes<R: std::io::Read>(reader: R) -> Result<Vec<(String, [f64; 3])>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row_no = i + 2;
        let gene = record
            .get(0)
            .with_context(|| format!("row {row_no}: missing gene column"))?
            .to_string();

        let mut values = [0.0; 3];
        for (slot, &(label, col)) in values.iter_mut().zip(COMPARISONS.iter()) {
            let raw = match record.get(col) {
                Some(raw) => raw,
                None => bail!("row {row_no}: no column {} for {label}", col + 1),
            };
            *slot = raw
                .trim()
                .parse()
                .with_context(|| format!("row {row_no}: bad {label} value `{raw}`"))?;
        }
        rows.push((gene, values));
    }
    Ok(rows)
}

/// `(condition, replicate)` from a file name, or `None` if it is not a data file.
pub fn sample_from_file_name(file_name: &str) -> Option<(String, String)> {
    if !file_name.contains(".csv") || file_name.contains("._") {
        return None;
    }
    let mut parts = file_name.split('.');
    let condition = parts.next()?;
    let replicate = parts.next()?;
    Some((condition.to_string(), replicate.to_string()))
}

impl ProteomicsData {
    pub fn load_dir(dir: &Path) -> Result<Self> {
        info!("Reading proteomics tables from {}", dir.display());
        let mut entries: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        let mut data = Self::default();
        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some((condition, replicate)) = sample_from_file_name(&file_name) else {
                debug!("Skipping {file_name}");
                continue;
            };
            let path = entry.path();
            let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            let rows =
                read_fold_changes(file).with_context(|| format!("parsing {}", path.display()))?;
            info!("{file_name}: {} proteins", rows.len());
            data.insert_rows(&condition, &replicate, rows);
        }
        if data.conditions.is_empty() {
            bail!("no proteomics CSV files found in {}", dir.display());
        }
        Ok(data)
    }

    /// Register one replicate table, keeping the name lists sorted and unique.
    pub fn insert_rows(&mut self, condition: &str, replicate: &str, rows: Vec<(String, [f64; 3])>) {
        let mut conditions: BTreeSet<String> = self.conditions.drain(..).collect();
        let mut replicates: BTreeSet<String> = self.replicates.drain(..).collect();
        let mut genes: BTreeSet<String> = self.genes.drain(..).collect();
        conditions.insert(condition.to_string());
        replicates.insert(replicate.to_string());

        for (gene, values) in rows {
            for (&(comparison, _), value) in COMPARISONS.iter().zip(values) {
                self.values
                    .entry(SampleKey {
                        condition: condition.to_string(),
                        replicate: replicate.to_string(),
                        comparison: comparison.to_string(),
                    })
                    .or_default()
                    .insert(gene.clone(), value);
            }
            genes.insert(gene);
        }

        self.conditions = conditions.into_iter().collect();
        self.replicates = replicates.into_iter().collect();
        self.genes = genes.into_iter().collect();
    }

    pub fn log2_fold_change(
        &self,
        condition: &str,
        replicate: &str,
        comparison: &str,
        gene: &str,
    ) -> Option<f64> {
        let key = SampleKey {
            condition: condition.to_string(),
            replicate: replicate.to_string(),
            comparison: comparison.to_string(),
        };
        self.values.get(&key)?.get(gene).copied()
    }

    /// Every available replicate value for a protein, in replicate order.
    pub fn replicate_values(&self, condition: &str, comparison: &str, gene: &str) -> Vec<f64> {
        self.replicates
            .iter()
            .filter_map(|rep| self.log2_fold_change(condition, rep, comparison, gene))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "gene,a,tp2,b,c,d,e,tp3,f,g,h,tp4\n\
VNG1105G,x,0.5,x,x,x,x,-0.25,x,x,x,1.0\n\
VNG1106G,x,0,x,x,x,x,0,x,x,x,0\n";

    #[test]
    fn reads_fixed_columns() {
        let rows = read_fold_changes(TABLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "VNG1105G");
        assert_eq!(rows[0].1, [0.5, -0.25, 1.0]);
    }

    #[test]
    fn short_rows_are_fatal() {
        let text = "gene,a,tp2\nVNG1105G,x,0.5\n";
        assert!(read_fold_changes(text.as_bytes()).is_err());
    }

    #[test]
    fn file_names_encode_condition_and_replicate() {
        assert_eq!(
            sample_from_file_name("rbf.rep2.fc.csv"),
            Some(("rbf".to_string(), "rep2".to_string()))
        );
        assert_eq!(sample_from_file_name("._rbf.rep2.csv"), None);
        assert_eq!(sample_from_file_name("notes.txt"), None);
    }

    #[test]
    fn missing_replicates_are_skipped() {
        let mut data = ProteomicsData::default();
        data.insert_rows("rbf", "rep1", read_fold_changes(TABLE.as_bytes()).unwrap());
        data.insert_rows("rbf", "rep2", vec![("VNG1105G".to_string(), [0.7, 0.0, 0.0])]);
        data.insert_rows("lysate", "rep1", vec![]);

        assert_eq!(data.conditions, vec!["lysate", "rbf"]);
        assert_eq!(data.replicates, vec!["rep1", "rep2"]);
        assert_eq!(data.replicate_values("rbf", "tp2vs1", "VNG1105G"), vec![0.5, 0.7]);
        assert_eq!(data.replicate_values("rbf", "tp2vs1", "VNG1106G"), vec![0.0]);
        assert!(data.replicate_values("lysate", "tp2vs1", "VNG1105G").is_empty());
    }

    #[test]
    fn loads_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rbf.rep1.csv"), TABLE).unwrap();
        fs::write(dir.path().join("rbf.rep2.csv"), TABLE).unwrap();
        fs::write(dir.path().join("._rbf.rep3.csv"), "garbage").unwrap();

        let data = ProteomicsData::load_dir(dir.path()).unwrap();
        assert_eq!(data.conditions, vec!["rbf"]);
        assert_eq!(data.replicates, vec!["rep1", "rep2"]);
        assert_eq!(data.genes, vec!["VNG1105G", "VNG1106G"]);
        assert_eq!(
            data.log2_fold_change("rbf", "rep2", "tp4vs1", "VNG1105G"),
            Some(1.0)
        );
    }
}
