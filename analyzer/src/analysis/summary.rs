//! Replicate aggregation for one gene at one timepoint.

use serde::Serialize;

use super::stats::{max, median, relative_sem};
use crate::models::Support;

/// Relative SEM at or above which a measurement is too noisy to use.
pub const RSEM_CUTOFF: f64 = 0.3;

/// Below this TPM (on the log2(x + 1) scale) replicate noise is ignored.
pub const NOISE_FLOOR_TPM: f64 = 10.0;

/// A relative SEM needs at least two replicates to mean anything.
pub const MIN_SEM_REPLICATES: usize = 2;

/// Summary statistics of one gene at one timepoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneSummary {
    pub gene: String,
    /// Median of log10(mRNA TPM + 1).
    pub log10_mrna: f64,
    /// Median log2(footprint + 1) minus median log2(mRNA + 1).
    pub log2_te: f64,
    pub support: Support,
    pub rsem_mrna: f64,
    pub rsem_footprint: f64,
}

impl GeneSummary {
    /// Transcripts with footprints must be precise in both fractions, the
    /// others only in mRNA.
    pub fn passes_noise(&self) -> bool {
        match self.support {
            Support::WithFootprint => {
                self.rsem_mrna < RSEM_CUTOFF && self.rsem_footprint < RSEM_CUTOFF
            }
            Support::WithoutFootprint => self.rsem_mrna < RSEM_CUTOFF,
        }
    }
}

/// Relative SEM of log2 expression, or zero when no replicate exceeds the
/// noise floor.
pub fn noise_rsem(log2_values: &[f64]) -> f64 {
    if max(log2_values) > (NOISE_FLOOR_TPM + 1.0).log2() {
        relative_sem(log2_values)
    } else {
        0.0
    }
}

pub fn classify_support(mrna_tpms: &[f64], footprint_tpms: &[f64]) -> Support {
    if median(footprint_tpms) == 0.0 || median(mrna_tpms) < 1.0 {
        Support::WithoutFootprint
    } else {
        Support::WithFootprint
    }
}

/// Aggregate replicate TPMs of both fractions.
///
/// Returns `None` when either fraction has fewer than
/// [`MIN_SEM_REPLICATES`] values or the two fractions disagree in length.
pub fn summarize_gene(
    gene: &str,
    mrna_tpms: &[f64],
    footprint_tpms: &[f64],
) -> Option<GeneSummary> {
    if mrna_tpms.len() < MIN_SEM_REPLICATES || mrna_tpms.len() != footprint_tpms.len() {
        return None;
    }

    let log2_m: Vec<f64> = mrna_tpms.iter().map(|v| (v + 1.0).log2()).collect();
    let log10_m: Vec<f64> = mrna_tpms.iter().map(|v| (v + 1.0).log10()).collect();
    let log2_f: Vec<f64> = footprint_tpms.iter().map(|v| (v + 1.0).log2()).collect();

    Some(GeneSummary {
        gene: gene.to_string(),
        log10_mrna: median(&log10_m),
        log2_te: median(&log2_f) - median(&log2_m),
        support: classify_support(mrna_tpms, footprint_tpms),
        rsem_mrna: noise_rsem(&log2_m),
        rsem_footprint: noise_rsem(&log2_f),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_expression_is_never_noisy() {
        // max log2(x + 1) = log2(11) is not above the floor
        assert_eq!(noise_rsem(&[0.0, 11f64.log2()]), 0.0);
        assert!(noise_rsem(&[1.0, 12f64.log2()]) > 0.0);
    }

    #[test]
    fn consistent_replicates_are_accepted() {
        let s = summarize_gene("g", &[100.0, 110.0, 105.0], &[50.0, 52.0, 49.0]).unwrap();
        assert_eq!(s.support, Support::WithFootprint);
        assert!(s.passes_noise());
        assert!((s.log10_mrna - 106f64.log10()).abs() < 1e-12);
        assert!((s.log2_te - (51f64.log2() - 106f64.log2())).abs() < 1e-12);
    }

    #[test]
    fn noisy_mrna_is_rejected() {
        // log2 values spread widely relative to their mean
        let s = summarize_gene("g", &[0.0, 0.0, 1000.0], &[50.0, 52.0, 49.0]).unwrap();
        assert!(s.rsem_mrna >= RSEM_CUTOFF);
        assert!(!s.passes_noise());
    }

    #[test]
    fn noisy_footprint_only_matters_with_footprint_support() {
        let with = summarize_gene("g", &[100.0, 100.0, 100.0], &[1.0, 1.0, 2000.0]).unwrap();
        assert_eq!(with.support, Support::WithFootprint);
        assert!(with.rsem_footprint >= RSEM_CUTOFF);
        assert!(!with.passes_noise());

        let without = summarize_gene("g", &[100.0, 100.0, 100.0], &[0.0, 0.0, 2000.0]).unwrap();
        assert_eq!(without.support, Support::WithoutFootprint);
        assert!(without.passes_noise());
    }

    #[test]
    fn low_mrna_has_no_footprint_support() {
        assert_eq!(
            classify_support(&[0.5, 0.5], &[10.0, 10.0]),
            Support::WithoutFootprint
        );
        assert_eq!(classify_support(&[1.0, 1.0], &[0.1, 0.1]), Support::WithFootprint);
    }

    #[test]
    fn single_replicate_is_dropped() {
        assert!(summarize_gene("g", &[10.0], &[10.0]).is_none());
        assert!(summarize_gene("g", &[10.0, 11.0], &[10.0]).is_none());
    }
}
