//! Ribosomal-protein stoichiometry over the time course, one condition at a time.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::analysis::figures::{assign_colours, draw_stoichiometry, ColourAssignment};
use crate::analysis::stoichiometry::{
    analyse_condition, ConditionStoichiometry, MIN_REPLICATES, OUTLIER_SIGMA, Z_95,
};
use crate::analysis::summary::RSEM_CUTOFF;
use crate::data_handling::proteomics::{ProteomicsData, COMPARISONS};
use crate::data_handling::ribosomal_names::RibosomalProteins;
use crate::helper_functions::write_run_config;

pub const PROTEOMICS_DIR: &str = "data/proteomics/all";
pub const RIBOSOMAL_NAMES: &str = "data/ribosomalGeneNames.txt";
pub const OUTPUT_DIR: &str = "results/ribo_stoichiometry";

#[derive(Debug, Clone, Serialize)]
pub struct StoichiometryPaths {
    pub proteomics_dir: PathBuf,
    pub ribosomal_names: PathBuf,
    pub output_dir: PathBuf,
}

impl StoichiometryPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            proteomics_dir: root.join(PROTEOMICS_DIR),
            ribosomal_names: root.join(RIBOSOMAL_NAMES),
            output_dir: root.join(OUTPUT_DIR),
        }
    }

    pub fn load(&self) -> Result<StoichiometryInputs> {
        let data = ProteomicsData::load_dir(&self.proteomics_dir)?;
        info!(
            "{} conditions, {} replicates, {} proteins",
            data.conditions.len(),
            data.replicates.len(),
            data.genes.len()
        );
        let proteins = RibosomalProteins::load(&self.ribosomal_names)?;
        info!("{} ribosomal proteins named", proteins.names.len());
        Ok(StoichiometryInputs { data, proteins })
    }
}

pub struct StoichiometryInputs {
    pub data: ProteomicsData,
    pub proteins: RibosomalProteins,
}

#[derive(Debug, Clone)]
pub struct StoichiometryReport {
    pub conditions: Vec<ConditionStoichiometry>,
    /// Trajectory colours, shared by all conditions.
    pub colours: ColourAssignment,
}

pub fn analyse(inputs: &StoichiometryInputs) -> StoichiometryReport {
    let mut colours = ColourAssignment::new();
    let mut conditions = Vec::new();
    for condition in &inputs.data.conditions {
        let report = analyse_condition(&inputs.data, condition, &inputs.proteins);
        let trajectories = report.trajectories();
        for t in &trajectories {
            info!(
                "{condition}: {} significant at {} timepoints",
                inputs.proteins.alias(&t.protein),
                report.significant_positions()[&t.protein].len()
            );
        }
        colours = assign_colours(colours, trajectories.iter().map(|t| t.protein.as_str()));
        conditions.push(report);
    }
    StoichiometryReport { conditions, colours }
}

/// Timepoint label lines, each followed by `protein\tlog2 stoichiometry` lines.
pub fn stoichiometry_table(report: &ConditionStoichiometry) -> String {
    report
        .timepoints
        .iter()
        .flat_map(|tp| {
            std::iter::once(format!("{}\n", tp.label)).chain(
                tp.values
                    .iter()
                    .map(|v| format!("{}\t{}\n", v.protein, v.log2_stoichiometry)),
            )
        })
        .collect()
}

pub fn table_file_name(condition: &str) -> String {
    format!("stoichiometry.{condition}.txt")
}

#[derive(Serialize)]
struct StoichiometryRunConfig<'a> {
    paths: &'a StoichiometryPaths,
    comparisons: Vec<&'static str>,
    min_replicates: usize,
    rsem_cutoff: f64,
    outlier_sigma: f64,
    z_95: f64,
}

pub fn write_tables(report: &StoichiometryReport, paths: &StoichiometryPaths) -> Result<()> {
    let out = &paths.output_dir;
    write_run_config(
        out,
        &StoichiometryRunConfig {
            paths,
            comparisons: COMPARISONS.iter().map(|&(c, _)| c).collect(),
            min_replicates: MIN_REPLICATES,
            rsem_cutoff: RSEM_CUTOFF,
            outlier_sigma: OUTLIER_SIGMA,
            z_95: Z_95,
        },
    )?;

    for condition in &report.conditions {
        let path = out.join(table_file_name(&condition.condition));
        fs::write(&path, stoichiometry_table(condition))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Stoichiometry values written to {}", path.display());
    }
    Ok(())
}

pub fn draw_figures(
    report: &StoichiometryReport,
    proteins: &RibosomalProteins,
    output_dir: &Path,
) -> Result<()> {
    for condition in &report.conditions {
        draw_stoichiometry(
            &output_dir.join(format!("figure.{}.png", condition.condition)),
            condition,
            proteins,
            &report.colours,
        )?;
    }
    Ok(())
}

pub fn run(paths: &StoichiometryPaths) -> Result<StoichiometryReport> {
    let inputs = paths.load()?;
    let report = analyse(&inputs);
    write_tables(&report, paths)?;
    draw_figures(&report, &inputs.proteins, &paths.output_dir)?;
    info!("Stoichiometry analysis complete");
    Ok(report)
}
