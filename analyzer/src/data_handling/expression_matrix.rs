//! Tab-delimited TPM matrix with one column per fraction/replicate/timepoint.
//!
//! Header labels are dot separated, e.g. `trna.br.1.tp.3`:
//! field 0 is the fraction, field 2 the replicate, field 4 the timepoint.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::models::Fraction;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub fraction: Fraction,
    pub replicate: String,
    pub timepoint: String,
}

impl ColumnKey {
    pub fn parse(label: &str) -> Result<Self> {
        let crumbles: Vec<&str> = label.split('.').collect();
        if crumbles.len() < 5 {
            bail!("column label `{label}` needs at least five dot-separated fields");
        }
        let fraction = Fraction::from_label(crumbles[0])
            .with_context(|| format!("unknown fraction `{}` in column `{label}`", crumbles[0]))?;
        Ok(Self {
            fraction,
            replicate: format!("br{}", crumbles[2]),
            timepoint: format!("tp.{}", crumbles[4]),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// First-appearance order.
    pub genes: Vec<String>,
    pub replicates: Vec<String>,
    pub timepoints: Vec<String>,
    columns: HashMap<ColumnKey, usize>,
    gene_rows: HashMap<String, Vec<f64>>,
}

/// Split a line on tabs, dropping a trailing empty field left by a final tab.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.split('\t').collect();
    if fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl ExpressionMatrix {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Reading expression matrix from {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line?,
            None => bail!("expression matrix is empty"),
        };
        let header = header.trim_end_matches(['\r', '\n']);

        let mut columns = HashMap::new();
        let mut keys = Vec::new();
        let mut replicates = Vec::new();
        let mut timepoints = Vec::new();
        for (i, label) in split_fields(header).into_iter().skip(1).enumerate() {
            let key = ColumnKey::parse(label)?;
            push_unique(&mut replicates, &key.replicate);
            push_unique(&mut timepoints, &key.timepoint);
            if columns.insert(key.clone(), i).is_some() {
                bail!("duplicate column label `{label}`");
            }
            keys.push(key);
        }
        if keys.is_empty() {
            bail!("expression matrix header has no sample columns");
        }

        let mut genes = Vec::new();
        let mut gene_rows = HashMap::new();
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            let fields = split_fields(line);
            if fields.len() != keys.len() + 1 {
                bail!(
                    "line {}: expected {} values, found {}",
                    line_no + 2,
                    keys.len(),
                    fields.len().saturating_sub(1)
                );
            }
            let gene = fields[0].replace('_', "");
            let values = fields[1..]
                .iter()
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .with_context(|| format!("line {}: bad value `{v}`", line_no + 2))
                })
                .collect::<Result<Vec<f64>>>()?;
            push_unique(&mut genes, &gene);
            gene_rows.insert(gene, values);
        }

        Ok(Self {
            genes,
            replicates,
            timepoints,
            columns,
            gene_rows,
        })
    }

    pub fn baseline(&self) -> &str {
        &self.timepoints[0]
    }

    pub fn value(
        &self,
        fraction: Fraction,
        replicate: &str,
        timepoint: &str,
        gene: &str,
    ) -> Result<f64> {
        let key = ColumnKey {
            fraction,
            replicate: replicate.to_string(),
            timepoint: timepoint.to_string(),
        };
        let col = *self
            .columns
            .get(&key)
            .with_context(|| format!("no {fraction:?} column for {replicate} at {timepoint}"))?;
        let row = self
            .gene_rows
            .get(gene)
            .with_context(|| format!("gene `{gene}` not in expression matrix"))?;
        Ok(row[col])
    }

    /// One value per replicate, in replicate order.
    pub fn replicate_values(
        &self,
        fraction: Fraction,
        timepoint: &str,
        gene: &str,
    ) -> Result<Vec<f64>> {
        self.replicates
            .iter()
            .map(|rep| self.value(fraction, rep, timepoint, gene))
            .collect()
    }
}
