//! Ordinary least squares of log2 TE on log10 mRNA, with confidence and
//! prediction bands and the band classification of each observation.

use anyhow::{anyhow, bail, ensure, Result};
use ndarray::{Array1, Array2};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::stats::mean;
use crate::models::BandClass;

/// Evenly spaced x positions the bands are evaluated on.
pub const GRID_POINTS: usize = 100;

/// Two-sided significance of both bands.
pub const ALPHA: f64 = 0.05;

/// mRNA level the per-timepoint footprint prediction is reported at.
pub const PREDICTION_TPM: f64 = 100.0;

/// Upper end (exclusive) of the TPM range the model curve is drawn over.
pub const MODEL_CURVE_MAX_TPM: usize = 10_000;

/// Slope/intercept fit with the usual correlation summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    /// Two-sided, for a zero slope.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

fn students_t(dof: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, dof).map_err(|e| anyhow!("t distribution with {dof} dof: {e:?}"))
}

/// Least-squares line with Pearson r, p-value and slope standard error.
pub fn linregress(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    ensure!(x.len() == y.len(), "x has {} values, y has {}", x.len(), y.len());
    let n = x.len();
    ensure!(n >= 2, "regression needs at least two points, got {n}");

    let xm = mean(x);
    let ym = mean(y);
    let nf = n as f64;
    let ssxm = x.iter().map(|v| (v - xm).powi(2)).sum::<f64>() / nf;
    let ssym = y.iter().map(|v| (v - ym).powi(2)).sum::<f64>() / nf;
    let ssxym = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - xm) * (b - ym))
        .sum::<f64>()
        / nf;

    if ssxm == 0.0 {
        bail!("cannot fit a line when all x values are identical");
    }

    let r_den = (ssxm * ssym).sqrt();
    let r_value = if r_den == 0.0 {
        0.0
    } else {
        (ssxym / r_den).clamp(-1.0, 1.0)
    };
    let slope = ssxym / ssxm;
    let intercept = ym - slope * xm;

    let (p_value, std_err) = if n == 2 {
        (if y[0] == y[1] { 1.0 } else { 0.0 }, 0.0)
    } else {
        const TINY: f64 = 1.0e-20;
        let df = (n - 2) as f64;
        let t = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
        let p = 2.0 * students_t(df)?.cdf(-t.abs());
        let se = ((1.0 - r_value * r_value) * ssym / ssxm / df).sqrt();
        (p, se)
    };

    Ok(LinearFit {
        n,
        slope,
        intercept,
        r_value,
        p_value,
        std_err,
    })
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Band {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct RegressionModel {
    pub fit: LinearFit,
    pub grid: Vec<f64>,
    /// Fitted line on the grid.
    pub fitted: Vec<f64>,
    /// Band for the mean response.
    pub confidence: Band,
    /// Band for a new observation.
    pub prediction: Band,
}

fn invert_2x2(m: &Array2<f64>) -> Result<Array2<f64>> {
    let (a, b, c, d) = (m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
    let det = a * d - b * c;
    if det == 0.0 || !det.is_finite() {
        bail!("normal equations are singular");
    }
    Ok(Array2::from_shape_vec((2, 2), vec![d / det, -b / det, -c / det, a / det])?)
}

/// Fit the line and evaluate both 95 % bands on [`GRID_POINTS`] x values
/// spanning the observed range.
pub fn fit_model(x: &[f64], y: &[f64]) -> Result<RegressionModel> {
    let fit = linregress(x, y)?;
    let n = x.len();
    // one slope plus the constant
    let dof = n as i64 - 1 - 1;
    ensure!(dof > 0, "interval estimates need at least three points, got {n}");

    // ── normal equations on the design matrix [1, x] ────────────────────────
    let design = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { 1.0 } else { x[i] });
    let response = Array1::from(y.to_vec());
    let xtx = design.t().dot(&design);
    let xty = design.t().dot(&response);
    let xtx_inv = invert_2x2(&xtx)?;
    let beta = xtx_inv.dot(&xty);

    let residuals = &response - &design.dot(&beta);
    let sse = residuals.mapv(|r| r * r).sum();
    let mse = sse / dof as f64;
    let cov = &xtx_inv * mse;

    let t = students_t(dof as f64)?.inverse_cdf(1.0 - ALPHA / 2.0);

    // ── bands on the interpolation grid ──────────────────────────────────────
    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let grid = Array1::linspace(x_min, x_max, GRID_POINTS).to_vec();

    let mean_x = mean(x);
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();

    let mut fitted = Vec::with_capacity(GRID_POINTS);
    let mut confidence = Band::default();
    let mut prediction = Band::default();
    for &x0 in &grid {
        let y_hat = beta[0] + beta[1] * x0;
        let conf = t * (mse * (1.0 / n as f64 + (x0 - mean_x).powi(2) / sxx)).sqrt();
        let var_fit = cov[[0, 0]] + 2.0 * x0 * cov[[0, 1]] + x0 * x0 * cov[[1, 1]];
        let pred = t * (var_fit.max(0.0) + mse).sqrt();

        fitted.push(y_hat);
        confidence.upper.push(y_hat + conf.abs());
        confidence.lower.push(y_hat - conf.abs());
        prediction.upper.push(y_hat + pred);
        prediction.lower.push(y_hat - pred);
    }

    Ok(RegressionModel {
        fit,
        grid,
        fitted,
        confidence,
        prediction,
    })
}

impl RegressionModel {
    /// Grid position closest to `x`; the first one wins on ties.
    pub fn nearest_grid_index(&self, x: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, g) in self.grid.iter().enumerate() {
            let dist = (g - x).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }

    /// Place an observation against the prediction band at its nearest grid x.
    pub fn classify(&self, x: f64, y: f64) -> BandClass {
        let idx = self.nearest_grid_index(x);
        if y > self.prediction.upper[idx] {
            BandClass::Up
        } else if y < self.prediction.lower[idx] {
            BandClass::Down
        } else {
            BandClass::Neutral
        }
    }
}

/// Footprint TPM the fit predicts for a transcript at `mrna_tpm`.
pub fn predicted_footprint(fit: &LinearFit, mrna_tpm: f64) -> f64 {
    let ratio = fit.predict(mrna_tpm.log10());
    2f64.powf(ratio) * mrna_tpm
}

/// Predicted footprint TPM for every integer mRNA TPM in `0..MODEL_CURVE_MAX_TPM`.
pub fn model_curve(fit: &LinearFit) -> Vec<(f64, f64)> {
    (0..MODEL_CURVE_MAX_TPM)
        .map(|s| {
            let s = s as f64;
            let factor = fit.slope * (s + 1.0).log10() + fit.intercept + (s + 1.0).log2();
            (s, 2f64.powf(factor) - 1.0)
        })
        .collect()
}
