//! Controls for confounders of translational efficiency: transcript length
//! and mRNA half-life, plus expression against half-life.

use anyhow::Result;
use tracing::info;

use super::regression::{linregress, LinearFit};
use super::summary::GeneSummary;
use crate::helper_functions::quantile;
use crate::models::{BySupport, GeneRecord, PairedSeries};

/// Half-lives outside this open interval (minutes) are not trusted.
pub const HALF_LIFE_WINDOW: (f64, f64) = (1.0, 25.0);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlSets {
    /// Transcript length vs log2 TE.
    pub length: BySupport<PairedSeries>,
    /// Half-life vs log2 TE.
    pub half_life: BySupport<PairedSeries>,
    /// log10 mRNA vs half-life.
    pub expression_half_life: BySupport<PairedSeries>,
}

fn trusted_half_life(record: &GeneRecord) -> Option<f64> {
    record
        .half_life
        .filter(|&hl| hl > HALF_LIFE_WINDOW.0 && hl < HALF_LIFE_WINDOW.1)
}

impl ControlSets {
    /// Collect control series from accepted summaries across all timepoints.
    pub fn collect<'a, I>(accepted: I) -> Self
    where
        I: IntoIterator<Item = (&'a GeneRecord, &'a GeneSummary)>,
    {
        let mut sets = Self::default();
        for (record, summary) in accepted {
            let support = summary.support;
            sets.length
                .get_mut(support)
                .push(record.transcript_length as f64, summary.log2_te);

            if let Some(hl) = trusted_half_life(record) {
                sets.half_life.get_mut(support).push(hl, summary.log2_te);
                if summary.log10_mrna > 0.0 {
                    sets.expression_half_life
                        .get_mut(support)
                        .push(summary.log10_mrna, hl);
                }
            }
        }
        sets
    }
}

/// Points whose x lies below the first quartile of x.
pub fn first_quartile_block(series: &PairedSeries) -> Result<PairedSeries> {
    let q1 = quantile(&series.x, 0.25)?;
    let mut block = PairedSeries::default();
    for (x, y) in series.points().filter(|(x, _)| *x < q1) {
        block.push(x, y);
    }
    info!("first quartile block: x < {q1:.4}, {} points", block.len());
    Ok(block)
}

/// Fit and log a control series; `None` when it has too few distinct points.
pub fn fit_control(label: &str, series: &PairedSeries) -> Option<LinearFit> {
    match linregress(&series.x, &series.y) {
        Ok(fit) => {
            info!(
                "{label}: slope {:.6} intercept {:.6} r {:.6} p {:.3e} std_err {:.6} (n = {})",
                fit.slope, fit.intercept, fit.r_value, fit.p_value, fit.std_err, fit.n
            );
            Some(fit)
        }
        Err(e) => {
            info!("{label}: no fit ({e})");
            None
        }
    }
}
