use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

/// Transcript half-lives in minutes, keyed by gene without underscores.
#[derive(Debug, Clone, Default)]
pub struct HalfLives(HashMap<String, f64>);

impl HalfLives {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Reading half-lives from {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// Whitespace-separated `gene minutes`, first line is a header.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = HashMap::new();
        for (line_no, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 2 {
                bail!("line {}: expected gene and half-life", line_no + 1);
            }
            let value: f64 = fields[1]
                .parse()
                .with_context(|| format!("line {}: bad half-life `{}`", line_no + 1, fields[1]))?;
            map.insert(fields[0].replace('_', ""), value);
        }
        Ok(Self(map))
    }

    pub fn get(&self, gene: &str) -> Option<f64> {
        self.0.get(gene).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
