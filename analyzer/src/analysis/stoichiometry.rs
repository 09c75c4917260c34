//! Ribosomal-protein stoichiometry per timepoint and its outliers.
//!
//! At each timepoint the accepted fold-changes are rescaled so that they
//! average to one, then log2 transformed. Proteins further than
//! [`OUTLIER_SIGMA`] standard deviations from the mean of that distribution
//! are significant.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use super::stats::{mean, median, relative_sem, std_dev};
use super::summary::RSEM_CUTOFF;
use crate::data_handling::proteomics::{ProteomicsData, COMPARISONS, TIMEPOINT_LABELS};
use crate::data_handling::ribosomal_names::RibosomalProteins;

/// Replicate values required before a protein is considered.
pub const MIN_REPLICATES: usize = 3;

/// Half-width of the significance band, in standard deviations.
pub const OUTLIER_SIGMA: f64 = 1.0;

/// Two-sided 95 % normal quantile. Recorded in the run configuration only;
/// the significance band is [`OUTLIER_SIGMA`] wide.
pub const Z_95: f64 = 1.959963984540;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplicateOutcome {
    /// Linear fold-change from the median log2 value.
    Accepted { fold_change: f64, rsem: f64 },
    Noisy { rsem: f64 },
    Insufficient { available: usize },
}

/// Decide whether a protein's replicate log2 fold-changes are usable.
pub fn assess_replicates(log2_values: &[f64]) -> ReplicateOutcome {
    if log2_values.len() < MIN_REPLICATES {
        return ReplicateOutcome::Insufficient {
            available: log2_values.len(),
        };
    }
    let rsem = relative_sem(log2_values);
    if rsem < RSEM_CUTOFF {
        ReplicateOutcome::Accepted {
            fold_change: 2f64.powf(median(log2_values)),
            rsem,
        }
    } else {
        ReplicateOutcome::Noisy { rsem }
    }
}

/// log2 of each fold-change divided by their sum and multiplied by their count.
pub fn normalize(fold_changes: &[f64]) -> Vec<f64> {
    let total: f64 = fold_changes.iter().sum();
    let count = fold_changes.len() as f64;
    fold_changes
        .iter()
        .map(|fc| (fc / total * count).log2())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBand {
    pub mean: f64,
    pub std_dev: f64,
    pub low: f64,
    pub high: f64,
}

impl OutlierBand {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mu = mean(values);
        let sd = std_dev(values);
        Some(Self {
            mean: mu,
            std_dev: sd,
            low: mu - OUTLIER_SIGMA * sd,
            high: mu + OUTLIER_SIGMA * sd,
        })
    }

    /// Strictly outside the band.
    pub fn is_outlier(&self, value: f64) -> bool {
        value > self.high || value < self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoichiometryValue {
    pub protein: String,
    pub log2_stoichiometry: f64,
    pub significant: bool,
}

/// Normalize accepted `(protein, fold_change)` pairs and flag outliers.
pub fn stoichiometry_values(
    accepted: &[(String, f64)],
) -> (Vec<StoichiometryValue>, Option<OutlierBand>) {
    let fold_changes: Vec<f64> = accepted.iter().map(|(_, fc)| *fc).collect();
    let log2_stoich = normalize(&fold_changes);
    let band = OutlierBand::from_values(&log2_stoich);

    let values = accepted
        .iter()
        .zip(log2_stoich)
        .map(|((protein, _), v)| StoichiometryValue {
            protein: protein.clone(),
            log2_stoichiometry: v,
            significant: band.is_some_and(|b| b.is_outlier(v)),
        })
        .collect();
    (values, band)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimepointStoichiometry {
    /// `TP2`, `TP3`, ...
    pub label: String,
    /// `tp2vs1`, ...
    pub comparison: String,
    /// Accepted proteins in name-table order.
    pub values: Vec<StoichiometryValue>,
    /// Proteins dropped for imprecision, with their relative SEM.
    pub noisy: BTreeMap<String, f64>,
    /// Proteins dropped for having fewer than [`MIN_REPLICATES`] values.
    pub insufficient: Vec<String>,
    pub band: Option<OutlierBand>,
}

impl TimepointStoichiometry {
    pub fn value_of(&self, protein: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.protein == protein)
            .map(|v| v.log2_stoichiometry)
    }
}

/// Stoichiometry of every named protein for one condition and comparison.
pub fn analyse_timepoint(
    data: &ProteomicsData,
    condition: &str,
    comparison: &str,
    label: &str,
    proteins: &RibosomalProteins,
) -> TimepointStoichiometry {
    let mut accepted = Vec::new();
    let mut noisy = BTreeMap::new();
    let mut insufficient = Vec::new();

    for protein in &proteins.names {
        let values = data.replicate_values(condition, comparison, protein);
        match assess_replicates(&values) {
            ReplicateOutcome::Accepted { fold_change, .. } => {
                accepted.push((protein.clone(), fold_change));
            }
            ReplicateOutcome::Noisy { rsem } => {
                warn!("Dropping {protein} for low precision: {values:?} rsem {rsem:.3}");
                noisy.insert(protein.clone(), rsem);
            }
            ReplicateOutcome::Insufficient { available } => {
                warn!("Dropping {protein}: {available} replicate values {values:?}");
                insufficient.push(protein.clone());
            }
        }
    }

    info!("{label} {condition} n = {}", accepted.len());
    let (values, band) = stoichiometry_values(&accepted);
    for v in values.iter().filter(|v| v.significant) {
        info!(
            "log2FC={:.4}\tFC={:.4}\tprotein={}\ttimepoint={label}",
            v.log2_stoichiometry,
            2f64.powf(v.log2_stoichiometry),
            proteins.alias(&v.protein)
        );
    }

    TimepointStoichiometry {
        label: label.to_string(),
        comparison: comparison.to_string(),
        values,
        noisy,
        insufficient,
        band,
    }
}

/// A protein's stoichiometry across the time course, starting at the
/// baseline (index 0, value 0).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub protein: String,
    pub points: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionStoichiometry {
    pub condition: String,
    pub timepoints: Vec<TimepointStoichiometry>,
}

impl ConditionStoichiometry {
    /// Timepoint indices (baseline = 0) and values where each protein is significant.
    pub fn significant_positions(&self) -> BTreeMap<String, Vec<(usize, f64)>> {
        let mut positions: BTreeMap<String, Vec<(usize, f64)>> = BTreeMap::new();
        for (i, tp) in self.timepoints.iter().enumerate() {
            for v in tp.values.iter().filter(|v| v.significant) {
                positions
                    .entry(v.protein.clone())
                    .or_default()
                    .push((i + 1, v.log2_stoichiometry));
            }
        }
        positions
    }

    /// Proteins significant at two or more timepoints.
    ///
    /// Where the protein was dropped as noisy its relative SEM stands in for
    /// the missing value; timepoints with too few replicates are skipped.
    pub fn trajectories(&self) -> Vec<Trajectory> {
        self.significant_positions()
            .into_iter()
            .filter(|(_, hits)| hits.len() >= 2)
            .map(|(protein, _)| {
                let mut points = vec![(0, 0.0)];
                for (i, tp) in self.timepoints.iter().enumerate() {
                    let value = tp
                        .value_of(&protein)
                        .or_else(|| tp.noisy.get(&protein).copied());
                    if let Some(value) = value {
                        points.push((i + 1, value));
                    }
                }
                Trajectory { protein, points }
            })
            .collect()
    }
}

/// Stoichiometry of one condition across all comparisons.
pub fn analyse_condition(
    data: &ProteomicsData,
    condition: &str,
    proteins: &RibosomalProteins,
) -> ConditionStoichiometry {
    info!("Analysis of condition {condition}");
    let timepoints = COMPARISONS
        .iter()
        .enumerate()
        .map(|(i, &(comparison, _))| {
            analyse_timepoint(data, condition, comparison, TIMEPOINT_LABELS[i + 1], proteins)
        })
        .collect();
    ConditionStoichiometry {
        condition: condition.to_string(),
        timepoints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::EnvFilter;

    fn names(list: &[&str]) -> RibosomalProteins {
        RibosomalProteins {
            names: list.iter().map(|s| s.to_string()).collect(),
            aliases: Default::default(),
        }
    }

    #[test]
    fn needs_three_replicates() {
        assert_eq!(
            assess_replicates(&[1.0, 1.0]),
            ReplicateOutcome::Insufficient { available: 2 }
        );
        assert!(matches!(
            assess_replicates(&[1.0, 1.0, 1.0]),
            ReplicateOutcome::Accepted { fold_change, .. } if (fold_change - 2.0).abs() < 1e-12
        ));
    }

    #[test]
    fn imprecise_replicates_are_noisy() {
        match assess_replicates(&[0.1, 2.0, -0.5]) {
            ReplicateOutcome::Noisy { rsem } => assert!(rsem >= RSEM_CUTOFF),
            other => panic!("expected noisy, got {other:?}"),
        }
    }

    #[test]
    fn negative_mean_gives_negative_rsem_and_is_accepted() {
        // relative SEM is taken on log2 values, so a negative mean flips its sign
        match assess_replicates(&[-0.2, -3.0, 2.5]) {
            ReplicateOutcome::Accepted { fold_change, rsem } => {
                assert!(rsem < 0.0);
                assert!((rsem + 5.557).abs() < 1e-3);
                assert!((fold_change - 2f64.powf(-0.2)).abs() < 1e-12);
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn normalized_values_average_one_on_linear_scale() {
        let fcs = [0.7, 1.3, 2.2, 0.4, 1.1, 0.9];
        let stoich = normalize(&fcs);
        let linear_mean = stoich.iter().map(|v| 2f64.powf(*v)).sum::<f64>() / stoich.len() as f64;
        assert!((linear_mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn one_heavy_protein_is_an_outlier() {
        let accepted: Vec<(String, f64)> = [1.0, 1.0, 1.0, 1.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, fc)| (format!("p{i}"), *fc))
            .collect();
        let (values, band) = stoichiometry_values(&accepted);
        let band = band.unwrap();

        let linear_sum: f64 = values.iter().map(|v| 2f64.powf(v.log2_stoichiometry)).sum();
        assert!((linear_sum - 5.0).abs() < 1e-12);

        assert!((values[4].log2_stoichiometry - 2.5f64.log2()).abs() < 1e-12);
        assert!(values[4].log2_stoichiometry > band.high);
        assert!(values[4].significant);
        assert!(values[..4].iter().all(|v| !v.significant));
        assert!((band.std_dev - 0.8).abs() < 1e-12);
    }

    #[test]
    fn band_edge_is_not_significant() {
        let band = OutlierBand::from_values(&[-1.0, 1.0]).unwrap();
        assert_eq!(band.high, 1.0);
        assert_eq!(band.low, -1.0);
        assert!(!band.is_outlier(1.0));
        assert!(!band.is_outlier(-1.0));
        assert!(band.is_outlier(1.0 + 1e-9));
    }

    #[test]
    fn empty_timepoint_has_no_band() {
        let (values, band) = stoichiometry_values(&[]);
        assert!(values.is_empty());
        assert!(band.is_none());
    }

    fn dataset() -> ProteomicsData {
        let mut data = ProteomicsData::default();
        // p4 is 4x the others at TP2 and TP4, p5 is noisy at TP3, p6 only
        // has two replicates
        for rep in ["rep1", "rep2", "rep3"] {
            let mut rows = vec![
                ("p1".to_string(), [1.0, 1.0, 1.0]),
                ("p2".to_string(), [1.0, 1.0, 1.0]),
                ("p3".to_string(), [1.0, 1.0, 1.0]),
                ("p4".to_string(), [3.0, 1.0, 3.0]),
            ];
            let p5_tp3 = match rep {
                "rep1" => 3.0,
                "rep2" => -2.0,
                _ => 0.5,
            };
            rows.push(("p5".to_string(), [1.0, p5_tp3, 1.0]));
            if rep != "rep3" {
                rows.push(("p6".to_string(), [1.0, 1.0, 1.0]));
            }
            data.insert_rows("rbf", rep, rows);
        }
        data
    }

    #[test]
    fn condition_analysis_tracks_recurring_outliers() {
        let data = dataset();
        let proteins = names(&["p1", "p2", "p3", "p4", "p5", "p6"]);
        let report = analyse_condition(&data, "rbf", &proteins);

        assert_eq!(report.timepoints.len(), 3);
        let tp2 = &report.timepoints[0];
        assert_eq!(tp2.label, "TP2");
        assert_eq!(tp2.insufficient, vec!["p6"]);
        assert_eq!(tp2.values.len(), 5);

        let tp3 = &report.timepoints[1];
        assert!(tp3.noisy.contains_key("p5"));
        assert_eq!(tp3.values.len(), 4);

        let positions = report.significant_positions();
        assert_eq!(positions["p4"].iter().map(|p| p.0).collect::<Vec<_>>(), vec![1, 3]);

        let trajectories = report.trajectories();
        assert_eq!(trajectories.len(), 1);
        let p4 = &trajectories[0];
        assert_eq!(p4.protein, "p4");
        assert_eq!(p4.points.len(), 4);
        assert_eq!(p4.points[0], (0, 0.0));
        assert!((p4.points[2].1).abs() < 1e-12);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn dropped_proteins_are_reported_at_the_default_level() {
        let data = dataset();
        let proteins = names(&["p1", "p2", "p3", "p4", "p5", "p6"]);
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let tp3 = tracing::subscriber::with_default(subscriber, || {
            analyse_timepoint(&data, "rbf", "tp3vs1", "TP3", &proteins)
        });
        assert!(tp3.noisy.contains_key("p5"));

        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("Dropping p5 for low precision"));
        assert!(text.contains("Dropping p6: 2 replicate values"));
    }
}
