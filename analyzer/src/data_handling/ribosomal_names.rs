use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

/// Ribosomal proteins in file order with their display aliases.
#[derive(Debug, Clone, Default)]
pub struct RibosomalProteins {
    pub names: Vec<String>,
    pub aliases: HashMap<String, String>,
}

impl RibosomalProteins {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Reading ribosomal protein names from {}", path.display());
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// Tab separated; column 2 is the canonical name, column 4 the alias.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut proteins = Self::default();
        for (line_no, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                bail!(
                    "line {}: expected at least 4 columns, found {}",
                    line_no + 1,
                    fields.len()
                );
            }
            let name = fields[1].to_string();
            proteins.aliases.insert(name.clone(), fields[3].to_string());
            proteins.names.push(name);
        }
        Ok(proteins)
    }

    /// Display alias, falling back to the canonical name.
    pub fn alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}
