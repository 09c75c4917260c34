//! Differentially expressed transcript (DET) calls against the baseline.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};

use super::stats::mean;
use crate::data_handling::expression_matrix::ExpressionMatrix;
use crate::models::{Fraction, Regulation};

/// |log2 fold-change| must exceed this.
pub const DET_MIN_ABS_LOG2FC: f64 = 1.0;

/// The higher of the two mean TPMs must exceed this.
pub const DET_MIN_TPM: f64 = 10.0;

/// DET calls of one timepoint, keyed by gene. Absent genes are not DETs.
pub type DetCalls = HashMap<String, Regulation>;

/// Call a transcript from its baseline and current mean mRNA TPM.
pub fn call_regulation(baseline_tpm: f64, current_tpm: f64) -> Option<Regulation> {
    let log2fc = (current_tpm / baseline_tpm).log2();
    if log2fc.abs() > DET_MIN_ABS_LOG2FC && baseline_tpm.max(current_tpm) > DET_MIN_TPM {
        if log2fc > 0.0 {
            Some(Regulation::Up)
        } else {
            Some(Regulation::Down)
        }
    } else {
        None
    }
}

/// DET calls at `timepoint` for the candidate genes, using replicate-mean
/// mRNA TPM against the first timepoint of the matrix.
pub fn differential_calls<'a, I>(
    matrix: &ExpressionMatrix,
    timepoint: &str,
    candidates: I,
) -> Result<DetCalls>
where
    I: IntoIterator<Item = &'a str>,
{
    let baseline = matrix.baseline();
    let mut calls = DetCalls::new();
    for gene in candidates {
        let rna0 = mean(&matrix.replicate_values(Fraction::Mrna, baseline, gene)?);
        let rna1 = mean(&matrix.replicate_values(Fraction::Mrna, timepoint, gene)?);
        if let Some(regulation) = call_regulation(rna0, rna1) {
            debug!("{timepoint} {gene}: {rna0:.2} -> {rna1:.2} TPM, DET {:+}", regulation.sign());
            calls.insert(gene.to_string(), regulation);
        }
    }

    let up = calls.values().filter(|r| **r == Regulation::Up).count();
    info!(
        "{timepoint}: {} DETs ({} up, {} down)",
        calls.len(),
        up,
        calls.len() - up
    );
    Ok(calls)
}
