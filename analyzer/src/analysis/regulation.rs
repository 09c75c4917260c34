//! Translational efficiency against transcriptional regulation.
//!
//! Each transcript's distance from the regression line is binned by
//! expression level (ceiling of log10 mRNA) and split by its DET call.

use std::collections::BTreeMap;

use tracing::info;

use super::regression::LinearFit;
use super::stats::{mann_whitney_u, MannWhitney};
use crate::models::Regulation;

/// Both DET groups of a bin need this many members before testing.
pub const MIN_GROUP_SIZE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviationBin {
    pub all: Vec<f64>,
    /// DET+.
    pub up: Vec<f64>,
    /// Not a DET.
    pub flat: Vec<f64>,
    /// DET-.
    pub down: Vec<f64>,
}

impl DeviationBin {
    /// Labelled groups in plotting order.
    pub fn groups(&self) -> [(&'static str, &[f64]); 4] {
        [
            ("all", &self.all),
            ("DET+", &self.up),
            ("noDET", &self.flat),
            ("DET-", &self.down),
        ]
    }

    fn push(&mut self, deviation: f64, det: Option<Regulation>) {
        self.all.push(deviation);
        match det {
            Some(Regulation::Up) => self.up.push(deviation),
            Some(Regulation::Down) => self.down.push(deviation),
            None => self.flat.push(deviation),
        }
    }
}

/// Group `(log10 mRNA, log2 TE, DET call)` observations by `ceil(log10 mRNA)`.
pub fn bin_deviations<I>(points: I, fit: &LinearFit) -> BTreeMap<i64, DeviationBin>
where
    I: IntoIterator<Item = (f64, f64, Option<Regulation>)>,
{
    let mut bins: BTreeMap<i64, DeviationBin> = BTreeMap::new();
    for (x, y, det) in points {
        let deviation = y - fit.predict(x);
        bins.entry(x.ceil() as i64).or_default().push(deviation, det);
    }
    bins
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinComparison {
    Tested {
        bin: i64,
        up_vs_down: Option<MannWhitney>,
        up_vs_flat: Option<MannWhitney>,
        flat_vs_down: Option<MannWhitney>,
    },
    Bypassed {
        bin: i64,
        up: usize,
        down: usize,
    },
}

/// Mann-Whitney comparisons of the DET groups in every bin large enough.
pub fn compare_bins(bins: &BTreeMap<i64, DeviationBin>) -> Vec<BinComparison> {
    bins.iter()
        .map(|(&bin, sets)| {
            if sets.up.len().min(sets.down.len()) >= MIN_GROUP_SIZE {
                let comparison = BinComparison::Tested {
                    bin,
                    up_vs_down: mann_whitney_u(&sets.up, &sets.down),
                    up_vs_flat: mann_whitney_u(&sets.up, &sets.flat),
                    flat_vs_down: mann_whitney_u(&sets.flat, &sets.down),
                };
                info!(
                    "bin {bin}: DET+ {} noDET {} DET- {} → {comparison:?}",
                    sets.up.len(),
                    sets.flat.len(),
                    sets.down.len()
                );
                comparison
            } else {
                info!(
                    "bin {bin}: bypassing tests with DET+ {} and DET- {}",
                    sets.up.len(),
                    sets.down.len()
                );
                BinComparison::Bypassed {
                    bin,
                    up: sets.up.len(),
                    down: sets.down.len(),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_fit() -> LinearFit {
        LinearFit {
            n: 10,
            slope: -1.0,
            intercept: 1.0,
            r_value: -0.5,
            p_value: 0.01,
            std_err: 0.1,
        }
    }

    #[test]
    fn deviations_are_binned_by_expression_ceiling() {
        let points = vec![
            (0.0, 1.0, None),
            (1.2, 0.0, Some(Regulation::Up)),
            (1.9, -2.0, Some(Regulation::Down)),
            (2.0, 0.0, None),
        ];
        let bins = bin_deviations(points, &flat_fit());
        assert_eq!(bins.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(bins[&0].all, vec![0.0]);

        let two = &bins[&2];
        assert_eq!(two.all.len(), 3);
        assert!((two.up[0] - 0.2).abs() < 1e-12);
        assert!((two.down[0] - (-1.1)).abs() < 1e-12);
        assert_eq!(two.flat, vec![1.0]);
    }

    #[test]
    fn groups_follow_plot_order() {
        let mut bin = DeviationBin::default();
        bin.push(1.0, Some(Regulation::Up));
        bin.push(2.0, None);
        bin.push(-1.0, Some(Regulation::Down));
        let groups = bin.groups();
        let labels: Vec<&str> = groups.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["all", "DET+", "noDET", "DET-"]);
        assert_eq!(groups[0].1, &[1.0, 2.0, -1.0]);
        assert_eq!(groups[3].1, &[-1.0]);
    }

    #[test]
    fn small_groups_are_bypassed() {
        let mut bins = BTreeMap::new();
        let mut bin = DeviationBin::default();
        for i in 0..12 {
            bin.push(i as f64, Some(Regulation::Up));
            bin.push(-(i as f64), None);
        }
        for i in 0..9 {
            bin.push(-(i as f64) - 20.0, Some(Regulation::Down));
        }
        bins.insert(2, bin);
        assert_eq!(
            compare_bins(&bins),
            vec![BinComparison::Bypassed { bin: 2, up: 12, down: 9 }]
        );
    }

    #[test]
    fn separated_groups_are_tested() {
        let mut bin = DeviationBin::default();
        for i in 0..10 {
            bin.push(10.0 + i as f64, Some(Regulation::Up));
            bin.push(-10.0 - i as f64, Some(Regulation::Down));
        }
        let bins = BTreeMap::from([(3, bin)]);
        match &compare_bins(&bins)[0] {
            BinComparison::Tested {
                up_vs_down,
                up_vs_flat,
                ..
            } => {
                assert!(up_vs_down.unwrap().p_value < 0.001);
                assert!(up_vs_flat.is_none());
            }
            other => panic!("expected a test, got {other:?}"),
        }
    }
}
