//! Coupling of mRNA and footprint abundance across the time course.
//!
//! For every timepoint the accepted transcripts with footprints are fitted
//! with a line of log2 TE on log10 mRNA and classified against its
//! prediction band. Deviations from the line are then compared between DET
//! groups, and transcript length and half-life are checked as confounders.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::style::{BLACK, RED};
use polars::df;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::controls::{
    first_quartile_block, fit_control, ControlSets, HALF_LIFE_WINDOW,
};
use crate::analysis::differential::{differential_calls, DetCalls, DET_MIN_ABS_LOG2FC, DET_MIN_TPM};
use crate::analysis::figures::{
    draw_model_curves, draw_regulation_bins, draw_scatter_fits, draw_te_trend, ScatterLayer, TAN,
};
use crate::analysis::regression::{
    fit_model, model_curve, predicted_footprint, LinearFit, RegressionModel, ALPHA,
    GRID_POINTS, MODEL_CURVE_MAX_TPM, PREDICTION_TPM,
};
use crate::analysis::regulation::{
    bin_deviations, compare_bins, BinComparison, DeviationBin, MIN_GROUP_SIZE,
};
use crate::analysis::summary::{
    summarize_gene, GeneSummary, MIN_SEM_REPLICATES, NOISE_FLOOR_TPM, RSEM_CUTOFF,
};
use crate::data_handling::annotation::TranscriptAnnotation;
use crate::data_handling::expression_matrix::ExpressionMatrix;
use crate::data_handling::half_life::HalfLives;
use crate::data_handling::sleuth_calls::load_sleuth_genes;
use crate::helper_functions::{dataframe_to_tsv, write_run_config};
use crate::models::{BandClass, BySupport, Fraction, GeneRecord, PairedSeries, Support};

pub const EXPRESSION_MATRIX: &str = "data/expression1e3/expressionMatrix.kallisto.txt";
pub const ANNOTATION: &str =
    "data/transcriptome/NC_002607.1.cs.NC_001869.1.cs.NC_002608.1.fasta";
pub const SLEUTH_DIR: &str = "data/sleuth1e3";
pub const HALF_LIVES: &str = "data/halfLife/formattedHalfLifes.strains.txt";
pub const OUTPUT_DIR: &str = "results/te_coupling";

pub const DEVIATIONS_FILE: &str = "diagonal.deviated.names.txt";
pub const REGRESSION_SUMMARY_FILE: &str = "regression_summary.tsv";

#[derive(Debug, Clone, Serialize)]
pub struct CouplingPaths {
    pub expression_matrix: PathBuf,
    pub annotation: PathBuf,
    pub sleuth_dir: PathBuf,
    pub half_lives: PathBuf,
    pub output_dir: PathBuf,
}

impl CouplingPaths {
    /// Default layout below `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            expression_matrix: root.join(EXPRESSION_MATRIX),
            annotation: root.join(ANNOTATION),
            sleuth_dir: root.join(SLEUTH_DIR),
            half_lives: root.join(HALF_LIVES),
            output_dir: root.join(OUTPUT_DIR),
        }
    }

    pub fn load(&self) -> Result<CouplingInputs> {
        let matrix = ExpressionMatrix::load(&self.expression_matrix)?;
        let annotation = TranscriptAnnotation::load(&self.annotation)?;

        let mut det_calls = HashMap::new();
        for timepoint in matrix.timepoints.iter().skip(1) {
            let genes = load_sleuth_genes(&self.sleuth_dir, timepoint, &annotation)?;
            let calls = differential_calls(&matrix, timepoint, genes.iter().map(String::as_str))?;
            det_calls.insert(timepoint.clone(), calls);
        }

        let half_lives = HalfLives::load(&self.half_lives)?;
        info!("{} half-lives read", half_lives.len());

        let records = matrix
            .genes
            .iter()
            .map(|gene| {
                Ok(GeneRecord {
                    name: gene.clone(),
                    transcript_length: annotation.length_of(gene)?,
                    half_life: half_lives.get(gene),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CouplingInputs {
            matrix,
            records,
            det_calls,
        })
    }
}

pub struct CouplingInputs {
    pub matrix: ExpressionMatrix,
    /// One per matrix gene, same order.
    pub records: Vec<GeneRecord>,
    /// Keyed by timepoint; the baseline has no entry.
    pub det_calls: HashMap<String, DetCalls>,
}

#[derive(Debug, Clone)]
pub struct TimepointCoupling {
    pub timepoint: String,
    /// Summaries passing the noise filter, both support categories, gene order.
    pub accepted: Vec<GeneSummary>,
    pub rejected: usize,
    pub model: RegressionModel,
    /// Band class of every accepted transcript with footprints.
    pub deviations: Vec<(String, BandClass)>,
    pub predicted_footprint: f64,
    pub model_curve: Vec<(f64, f64)>,
    /// Deviations from the fit by ceil(log10 mRNA) bin and DET group. Empty at the baseline.
    pub bins: BTreeMap<i64, DeviationBin>,
    /// Empty at the baseline.
    pub regulation: Vec<BinComparison>,
}

impl TimepointCoupling {
    pub fn series(&self, support: Support) -> PairedSeries {
        let mut series = PairedSeries::default();
        for s in self.accepted.iter().filter(|s| s.support == support) {
            series.push(s.log10_mrna, s.log2_te);
        }
        series
    }
}

#[derive(Debug, Clone)]
pub struct CouplingReport {
    pub timepoints: Vec<TimepointCoupling>,
    pub controls: ControlSets,
    /// Every fit in the order it was computed, for the summary table.
    pub fits: Vec<(String, LinearFit)>,
}

impl CouplingReport {
    pub fn fit(&self, label: &str) -> Option<&LinearFit> {
        self.fits.iter().find(|(l, _)| l == label).map(|(_, f)| f)
    }
}

fn analyse_timepoint(inputs: &CouplingInputs, timepoint: &str) -> Result<TimepointCoupling> {
    let matrix = &inputs.matrix;
    let mut accepted = Vec::new();
    let mut rejected = 0;

    for gene in &matrix.genes {
        let mrna = matrix.replicate_values(Fraction::Mrna, timepoint, gene)?;
        let footprint = matrix.replicate_values(Fraction::Footprint, timepoint, gene)?;
        match summarize_gene(gene, &mrna, &footprint) {
            Some(summary) if summary.passes_noise() => accepted.push(summary),
            Some(summary) => {
                debug!(
                    "{timepoint} {gene}: noisy, rsem mRNA {:.3} footprint {:.3}",
                    summary.rsem_mrna, summary.rsem_footprint
                );
                rejected += 1;
            }
            None => {
                debug!("{timepoint} {gene}: too few replicates");
                rejected += 1;
            }
        }
    }

    let with_footprint = accepted
        .iter()
        .filter(|s| s.support == Support::WithFootprint)
        .count();
    info!(
        "{timepoint}: {} accepted ({with_footprint} with footprints), {rejected} rejected",
        accepted.len()
    );

    let mut cloud = PairedSeries::default();
    for s in accepted.iter().filter(|s| s.support == Support::WithFootprint) {
        cloud.push(s.log10_mrna, s.log2_te);
    }
    let model = fit_model(&cloud.x, &cloud.y)
        .with_context(|| format!("regression at {timepoint}"))?;
    let fit = model.fit;
    info!(
        "{timepoint}: slope {:.6} intercept {:.6} r {:.6} p {:.3e} std_err {:.6}",
        fit.slope, fit.intercept, fit.r_value, fit.p_value, fit.std_err
    );

    let predicted = predicted_footprint(&fit, PREDICTION_TPM);
    info!("{timepoint}: predicted footprint at {PREDICTION_TPM} TPM mRNA is {predicted:.4}");

    let curve = model_curve(&fit);
    if let Some(&(s, f)) = curve.last() {
        info!("{timepoint}: model predicts {f:.2} footprint TPM at {s} TPM mRNA");
    }

    let deviations: Vec<(String, BandClass)> = accepted
        .iter()
        .filter(|s| s.support == Support::WithFootprint)
        .map(|s| (s.gene.clone(), model.classify(s.log10_mrna, s.log2_te)))
        .collect();
    for class in BandClass::ALL {
        let count = deviations.iter().filter(|(_, c)| *c == class).count();
        info!("{timepoint}: {count} transcripts {class}");
    }

    let bins = match inputs.det_calls.get(timepoint) {
        Some(calls) => {
            let points = accepted
                .iter()
                .map(|s| (s.log10_mrna, s.log2_te, calls.get(&s.gene).copied()));
            bin_deviations(points, &fit)
        }
        None => BTreeMap::new(),
    };
    let regulation = compare_bins(&bins);

    Ok(TimepointCoupling {
        timepoint: timepoint.to_string(),
        accepted,
        rejected,
        model,
        deviations,
        predicted_footprint: predicted,
        model_curve: curve,
        bins,
        regulation,
    })
}

fn push_fit(fits: &mut Vec<(String, LinearFit)>, label: String, series: &PairedSeries) {
    if let Some(fit) = fit_control(&label, series) {
        fits.push((label, fit));
    }
}

/// Run every statistic on loaded inputs. Nothing is written.
pub fn analyse(inputs: &CouplingInputs) -> Result<CouplingReport> {
    let timepoints = inputs
        .matrix
        .timepoints
        .iter()
        .map(|tp| analyse_timepoint(inputs, tp))
        .collect::<Result<Vec<_>>>()?;

    let mut fits: Vec<(String, LinearFit)> = timepoints
        .iter()
        .map(|tp| (format!("TE.{}", tp.timepoint), tp.model.fit))
        .collect();

    // ── all timepoints pooled ────────────────────────────────────────────────
    let mut pooled = PairedSeries::default();
    for tp in &timepoints {
        for (x, y) in tp.series(Support::WithFootprint).points() {
            pooled.push(x, y);
        }
    }
    push_fit(&mut fits, "TE.all".to_string(), &pooled);
    push_fit(&mut fits, "TE.all.Q1".to_string(), &first_quartile_block(&pooled)?);

    // ── confounders ──────────────────────────────────────────────────────────
    let records: HashMap<&str, &GeneRecord> = inputs
        .records
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    let controls = ControlSets::collect(
        timepoints
            .iter()
            .flat_map(|tp| tp.accepted.iter())
            .filter_map(|s| records.get(s.gene.as_str()).map(|r| (*r, s))),
    );

    for (name, sets) in [
        ("length", &controls.length),
        ("half-life", &controls.half_life),
        ("expression.half-life", &controls.expression_half_life),
    ] {
        for support in [Support::WithFootprint, Support::WithoutFootprint] {
            let series = sets.get(support);
            let label = format!("{name}.{support}");
            push_fit(&mut fits, label.clone(), series);
            if support == Support::WithFootprint && !series.is_empty() {
                push_fit(&mut fits, format!("{label}.Q1"), &first_quartile_block(series)?);
            }
        }
    }

    Ok(CouplingReport {
        timepoints,
        controls,
        fits,
    })
}

/// `timepoint  up|neutral|down  gene` rows, grouped by timepoint then class.
pub fn deviations_frame(report: &CouplingReport) -> Result<DataFrame> {
    let mut timepoints = Vec::new();
    let mut labels = Vec::new();
    let mut genes = Vec::new();
    for tp in &report.timepoints {
        for class in BandClass::ALL {
            for (gene, _) in tp.deviations.iter().filter(|(_, c)| *c == class) {
                timepoints.push(tp.timepoint.as_str());
                labels.push(class.as_str());
                genes.push(gene.as_str());
            }
        }
    }
    Ok(df![
        "timepoint" => timepoints,
        "label" => labels,
        "gene" => genes,
    ]?)
}

pub fn regression_summary_frame(report: &CouplingReport) -> Result<DataFrame> {
    let fits = &report.fits;
    Ok(df![
        "label" => fits.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>(),
        "n" => fits.iter().map(|(_, f)| f.n as u64).collect::<Vec<_>>(),
        "slope" => fits.iter().map(|(_, f)| f.slope).collect::<Vec<_>>(),
        "intercept" => fits.iter().map(|(_, f)| f.intercept).collect::<Vec<_>>(),
        "r_value" => fits.iter().map(|(_, f)| f.r_value).collect::<Vec<_>>(),
        "p_value" => fits.iter().map(|(_, f)| f.p_value).collect::<Vec<_>>(),
        "std_err" => fits.iter().map(|(_, f)| f.std_err).collect::<Vec<_>>(),
    ]?)
}

#[derive(Serialize)]
struct CouplingRunConfig<'a> {
    paths: &'a CouplingPaths,
    rsem_cutoff: f64,
    noise_floor_tpm: f64,
    min_sem_replicates: usize,
    det_min_abs_log2fc: f64,
    det_min_tpm: f64,
    grid_points: usize,
    alpha: f64,
    prediction_tpm: f64,
    model_curve_max_tpm: usize,
    half_life_window: (f64, f64),
    min_group_size: usize,
}

impl<'a> CouplingRunConfig<'a> {
    fn new(paths: &'a CouplingPaths) -> Self {
        Self {
            paths,
            rsem_cutoff: RSEM_CUTOFF,
            noise_floor_tpm: NOISE_FLOOR_TPM,
            min_sem_replicates: MIN_SEM_REPLICATES,
            det_min_abs_log2fc: DET_MIN_ABS_LOG2FC,
            det_min_tpm: DET_MIN_TPM,
            grid_points: GRID_POINTS,
            alpha: ALPHA,
            prediction_tpm: PREDICTION_TPM,
            model_curve_max_tpm: MODEL_CURVE_MAX_TPM,
            half_life_window: HALF_LIFE_WINDOW,
            min_group_size: MIN_GROUP_SIZE,
        }
    }
}

/// Run configuration, deviation list and regression summary.
pub fn write_tables(report: &CouplingReport, paths: &CouplingPaths) -> Result<()> {
    let out = &paths.output_dir;
    write_run_config(out, &CouplingRunConfig::new(paths))?;

    let deviations_path = out.join(DEVIATIONS_FILE);
    dataframe_to_tsv(&mut deviations_frame(report)?, &deviations_path, false)?;
    info!("Deviation list written to {}", deviations_path.display());

    let summary_path = out.join(REGRESSION_SUMMARY_FILE);
    dataframe_to_tsv(&mut regression_summary_frame(report)?, &summary_path, true)?;
    info!("Regression summary written to {}", summary_path.display());
    Ok(())
}

/// First quartile block of the with-footprint series, empty when there is nothing to split.
fn control_block(series: &BySupport<PairedSeries>) -> Result<PairedSeries> {
    if series.with_footprint.is_empty() {
        return Ok(PairedSeries::default());
    }
    first_quartile_block(&series.with_footprint)
}

/// Both support categories plus the first quartile block, each with its fit.
fn control_layers<'a>(
    series: &'a BySupport<PairedSeries>,
    block: &'a PairedSeries,
    name: &str,
    report: &CouplingReport,
) -> Vec<ScatterLayer<'a>> {
    let mut layers: Vec<ScatterLayer<'a>> = [
        (Support::WithFootprint, BLACK),
        (Support::WithoutFootprint, TAN),
    ]
    .into_iter()
    .map(|(support, colour)| ScatterLayer {
        label: support.to_string(),
        series: series.get(support),
        colour,
        fit: report.fit(&format!("{name}.{support}")).copied(),
    })
    .collect();
    if !block.is_empty() {
        layers.push(ScatterLayer {
            label: "Q1".to_string(),
            series: block,
            colour: RED,
            fit: report
                .fit(&format!("{name}.{}.Q1", Support::WithFootprint))
                .copied(),
        });
    }
    layers
}

pub fn draw_figures(report: &CouplingReport, output_dir: &Path) -> Result<()> {
    for tp in &report.timepoints {
        let classified: Vec<(f64, f64, BandClass)> = tp
            .series(Support::WithFootprint)
            .points()
            .zip(&tp.deviations)
            .map(|((x, y), (_, class))| (x, y, *class))
            .collect();
        let hollow: Vec<(f64, f64)> = tp.series(Support::WithoutFootprint).points().collect();
        draw_te_trend(
            &output_dir.join(format!("TE.trend.{}.png", tp.timepoint)),
            &tp.timepoint,
            &classified,
            &hollow,
            &tp.model,
        )?;
        if !tp.bins.is_empty() {
            draw_regulation_bins(
                &output_dir.join(format!("TE.transcriptional.regulation.{}.png", tp.timepoint)),
                &tp.timepoint,
                &tp.bins,
            )?;
        }
    }

    let mut pooled = PairedSeries::default();
    let mut hollow = PairedSeries::default();
    for tp in &report.timepoints {
        for (x, y) in tp.series(Support::WithFootprint).points() {
            pooled.push(x, y);
        }
        for (x, y) in tp.series(Support::WithoutFootprint).points() {
            hollow.push(x, y);
        }
    }
    let q1_block = first_quartile_block(&pooled)?;
    draw_scatter_fits(
        &output_dir.join("TE.trend.all.png"),
        "Translational efficiency, all timepoints",
        "mRNA [log10 TPM+1]",
        "footprint/mRNA [log2 ratio]",
        &[
            ScatterLayer {
                label: "withoutFootprint".to_string(),
                series: &hollow,
                colour: TAN,
                fit: None,
            },
            ScatterLayer {
                label: "all".to_string(),
                series: &pooled,
                colour: BLACK,
                fit: report.fit("TE.all").copied(),
            },
            ScatterLayer {
                label: "Q1".to_string(),
                series: &q1_block,
                colour: RED,
                fit: report.fit("TE.all.Q1").copied(),
            },
        ],
    )?;

    let curves: Vec<(String, Vec<(f64, f64)>)> = report
        .timepoints
        .iter()
        .map(|tp| (tp.timepoint.clone(), tp.model_curve.clone()))
        .collect();
    draw_model_curves(&output_dir.join("TE.model.png"), &curves)?;

    let controls = &report.controls;
    for (file, caption, x_desc, y_desc, sets, name) in [
        (
            "TE.control.transcript.length.png",
            "Transcript length control",
            "transcript length [nt]",
            "footprint/mRNA [log2 ratio]",
            &controls.length,
            "length",
        ),
        (
            "TE.control.half-life.png",
            "Half-life control",
            "mRNA half-life [min]",
            "footprint/mRNA [log2 ratio]",
            &controls.half_life,
            "half-life",
        ),
        (
            "expression.half-life.png",
            "Expression against half-life",
            "mRNA [log10 TPM+1]",
            "mRNA half-life [min]",
            &controls.expression_half_life,
            "expression.half-life",
        ),
    ] {
        let block = control_block(sets)?;
        draw_scatter_fits(
            &output_dir.join(file),
            caption,
            x_desc,
            y_desc,
            &control_layers(sets, &block, name, report),
        )?;
    }
    Ok(())
}

/// Load, analyse and write everything below `paths.output_dir`.
pub fn run(paths: &CouplingPaths) -> Result<CouplingReport> {
    let inputs = paths.load()?;
    let report = analyse(&inputs)?;
    write_tables(&report, paths)?;
    draw_figures(&report, &paths.output_dir)?;
    info!("TE coupling analysis complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Regulation;
    use std::fs;

    const MATRIX: &str = "\
gene\ttrna.br.1.tp.1\ttrna.br.2.tp.1\trbf.br.1.tp.1\trbf.br.2.tp.1\ttrna.br.1.tp.2\ttrna.br.2.tp.2\trbf.br.1.tp.2\trbf.br.2.tp.2\n\
VNG_0001H\t10\t10\t5\t5\t40\t40\t20\t20\n\
VNG_0002H\t100\t100\t80\t80\t100\t100\t60\t60\n\
VNG_0003H\t1000\t1000\t300\t300\t1000\t1000\t400\t400\n\
VNG_0004H\t50\t50\t40\t40\t50\t50\t10\t10\n\
VNG_0005H\t5\t5\t0\t0\t5\t5\t0\t0\n\
VNG_0006H\t0\t1000\t100\t100\t0\t1000\t100\t100\n";

    const FASTA: &str = "\
>NC1 [locus_tag=VNG_0001H]\nACGTACGTAC\n\
>NC2 [locus_tag=VNG_0002H]\nACGTACGTACGTACGTACGT\n\
>NC3 [locus_tag=VNG_0003H]\nACGTACGTAC\nACGTACGTAC\nACGTACGTAC\n\
>NC4 [locus_tag=VNG_0004H]\nACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT\n\
>NC5 [locus_tag=VNG_0005H]\nACGTA\n\
>NC6 [locus_tag=VNG_0006H]\nACGTACGTACGTACGTACGTACGTA\n";

    const SLEUTH: &str = "\"\",\"target_id\",\"pval\"\n\"1\",\"NC1\",0.001\n\"2\",\"NC2\",0.01\n";

    const HALF_LIFE: &str = "gene\thalfLife\nVNG_0001H\t5.0\nVNG_0002H\t30.0\nVNG_0003H\t12.0\n";

    fn fixture(root: &Path) -> CouplingPaths {
        let paths = CouplingPaths::under(root);
        for (path, text) in [
            (&paths.expression_matrix, MATRIX),
            (&paths.annotation, FASTA),
            (&paths.half_lives, HALF_LIFE),
        ] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        fs::create_dir_all(&paths.sleuth_dir).unwrap();
        fs::write(paths.sleuth_dir.join("sleuthResultsRNA.21.csv"), SLEUTH).unwrap();
        paths
    }

    #[test]
    fn loads_records_and_det_calls() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = fixture(dir.path()).load().unwrap();

        assert_eq!(inputs.records.len(), 6);
        assert_eq!(inputs.records[2].transcript_length, 30);
        assert_eq!(inputs.records[1].half_life, Some(30.0));
        assert_eq!(inputs.records[3].half_life, None);

        assert!(!inputs.det_calls.contains_key("tp.1"));
        let calls = &inputs.det_calls["tp.2"];
        assert_eq!(calls.get("VNG0001H"), Some(&Regulation::Up));
        assert_eq!(calls.get("VNG0002H"), None);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn analysis_splits_support_and_classifies_every_cloud_point() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = fixture(dir.path()).load().unwrap();
        let report = analyse(&inputs).unwrap();

        assert_eq!(report.timepoints.len(), 2);
        for tp in &report.timepoints {
            assert_eq!(tp.accepted.len(), 5);
            // VNG0006H has footprints but its mRNA replicates disagree
            assert_eq!(tp.rejected, 1);
            assert_eq!(tp.series(Support::WithFootprint).len(), 4);
            assert_eq!(tp.series(Support::WithoutFootprint).len(), 1);
            assert_eq!(tp.deviations.len(), 4);
            assert_eq!(tp.model.fit.n, 4);
        }
        assert!(report.timepoints[0].regulation.is_empty());
        assert!(report.timepoints[0].bins.is_empty());
        let bins = &report.timepoints[1].bins;
        assert_eq!(bins.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(bins.values().map(|b| b.all.len()).sum::<usize>(), 5);
        assert_eq!(bins[&2].up.len(), 1);
        // ceil(log10(TPM + 1)) of 6, 41, 51, 101 and 1001 TPM + 1: bins 1 to 4
        assert_eq!(report.timepoints[1].regulation.len(), 4);
        assert!(report.timepoints[1]
            .regulation
            .iter()
            .all(|c| matches!(c, BinComparison::Bypassed { .. })));

        assert!(report.fit("TE.tp.1").is_some());
        assert_eq!(report.fit("TE.all").unwrap().n, 8);
        // a single repeated transcript length cannot be fitted
        assert!(report.fit("length.withoutFootprint").is_none());
        assert_eq!(report.fit("length.withFootprint").unwrap().n, 8);
        // VNG0002H sits outside the trusted half-life window
        assert_eq!(report.controls.half_life.with_footprint.len(), 4);
        assert_eq!(report.fit("half-life.withFootprint").unwrap().n, 4);
    }

    #[test]
    fn noisy_transcript_with_footprints_is_left_out_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let report = analyse(&paths.load().unwrap()).unwrap();

        for tp in &report.timepoints {
            assert_eq!(tp.rejected, 1);
            assert!(tp.accepted.iter().all(|s| s.gene != "VNG0006H"));
            assert!(tp.deviations.iter().all(|(gene, _)| gene != "VNG0006H"));
            assert_eq!(tp.model.fit.n, 4);
        }
        assert_eq!(report.fit("TE.all").unwrap().n, 8);

        write_tables(&report, &paths).unwrap();
        let deviations = fs::read_to_string(paths.output_dir.join(DEVIATIONS_FILE)).unwrap();
        assert!(!deviations.contains("VNG0006H"));
    }

    #[test]
    fn control_figures_carry_the_first_quartile_block() {
        let dir = tempfile::tempdir().unwrap();
        let report = analyse(&fixture(dir.path()).load().unwrap()).unwrap();

        let sets = &report.controls.half_life;
        let block = control_block(sets).unwrap();
        // half-lives 5 and 12 at both timepoints, Q1 at 5
        assert!(block.is_empty());

        let sets = &report.controls.expression_half_life;
        let block = control_block(sets).unwrap();
        assert!(!block.is_empty());
        let layers = control_layers(sets, &block, "expression.half-life", &report);
        let labels: Vec<&str> = layers.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["withFootprint", "withoutFootprint", "Q1"]);
        assert_eq!(layers[2].series.len(), block.len());
        assert_eq!(
            layers[2].fit,
            report.fit("expression.half-life.withFootprint.Q1").copied()
        );

        let empty = BySupport::<PairedSeries>::default();
        let block = control_block(&empty).unwrap();
        assert_eq!(control_layers(&empty, &block, "length", &report).len(), 2);
    }

    #[test]
    fn tables_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let report = analyse(&paths.load().unwrap()).unwrap();
        write_tables(&report, &paths).unwrap();

        let deviations = fs::read_to_string(paths.output_dir.join(DEVIATIONS_FILE)).unwrap();
        let lines: Vec<&str> = deviations.lines().collect();
        assert_eq!(lines.len(), 8);
        for line in &lines {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 3);
            assert!(fields[0] == "tp.1" || fields[0] == "tp.2");
            assert!(["up", "neutral", "down"].contains(&fields[1]));
        }
        assert!(lines[..4].iter().all(|l| l.starts_with("tp.1\t")));

        let summary = fs::read_to_string(paths.output_dir.join(REGRESSION_SUMMARY_FILE)).unwrap();
        let mut rows = summary.lines();
        assert_eq!(
            rows.next().unwrap(),
            "label\tn\tslope\tintercept\tr_value\tp_value\tstd_err"
        );
        assert!(rows.next().unwrap().starts_with("TE.tp.1\t4\t"));

        let config = fs::read_to_string(paths.output_dir.join("run_config.json")).unwrap();
        let config: serde_json::Value = serde_json::from_str(&config).unwrap();
        assert_eq!(config["rsem_cutoff"], 0.3);
        assert_eq!(config["grid_points"], 100);
    }

    #[test]
    fn missing_transcript_length_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        fs::write(&paths.annotation, ">NC1 [locus_tag=VNG_0001H]\nACGT\n").unwrap();
        fs::write(
            paths.sleuth_dir.join("sleuthResultsRNA.21.csv"),
            "\"\",\"target_id\"\n\"1\",\"NC1\"\n",
        )
        .unwrap();
        let err = paths.load().err().unwrap();
        assert!(format!("{err:#}").contains("no transcript length"));
    }
}
