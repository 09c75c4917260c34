//! PNG figures for both analyses.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::Range;
use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::prelude::*;
use plotters::style::RGBColor;
use tracing::info;

use super::regression::{LinearFit, RegressionModel};
use super::regulation::DeviationBin;
use super::stoichiometry::ConditionStoichiometry;
use crate::data_handling::proteomics::TIMEPOINT_LABELS;
use crate::data_handling::ribosomal_names::RibosomalProteins;
use crate::helper_functions::quantile;
use crate::models::{BandClass, PairedSeries};

const FIGURE_SIZE: (u32, u32) = (900, 650);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 26);
const AXIS_FONT: (&str, u32) = ("sans-serif", 20);
const LABEL_FONT: (&str, u32) = ("sans-serif", 16);

pub const TAN: RGBColor = RGBColor(210, 180, 140);

/// Colours of the four timepoints, in order.
pub const TIMEPOINT_COLOURS: [RGBColor; 4] = [
    RGBColor(255, 0, 0),
    RGBColor(255, 165, 0),
    RGBColor(0, 128, 0),
    RGBColor(0, 0, 255),
];

/// Ten-colour categorical palette for highlighted proteins.
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Protein → palette slot, kept across conditions so a protein keeps its colour.
pub type ColourAssignment = BTreeMap<String, usize>;

fn plot_err<E: Debug>(e: E) -> anyhow::Error {
    anyhow!("plotting failed: {e:?}")
}

/// Give every new name the next palette slot.
pub fn assign_colours<'a, I>(mut assignment: ColourAssignment, names: I) -> ColourAssignment
where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        if !assignment.contains_key(name) {
            let slot = assignment.len();
            assignment.insert(name.to_string(), slot);
        }
    }
    assignment
}

fn palette_colour(slot: usize) -> RGBColor {
    PALETTE[slot % PALETTE.len()]
}

fn band_colour(class: BandClass) -> RGBColor {
    match class {
        BandClass::Up => RED,
        BandClass::Neutral => BLACK,
        BandClass::Down => BLUE,
    }
}

/// Range covering all finite values with a 5 % margin.
pub fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return 0.0..1.0;
    }
    if lo == hi {
        return (lo - 0.5)..(hi + 0.5);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

/// One timepoint: points coloured by band class, fitted line and prediction band.
pub fn draw_te_trend(
    output_path: &Path,
    timepoint: &str,
    classified: &[(f64, f64, BandClass)],
    hollow: &[(f64, f64)],
    model: &RegressionModel,
) -> Result<()> {
    let x_range = padded_range(
        classified
            .iter()
            .map(|p| p.0)
            .chain(hollow.iter().map(|p| p.0)),
    );
    let y_range = padded_range(
        classified
            .iter()
            .map(|p| p.1)
            .chain(hollow.iter().map(|p| p.1))
            .chain(model.prediction.upper.iter().copied())
            .chain(model.prediction.lower.iter().copied()),
    );

    let root = BitMapBackend::new(output_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Translational efficiency, {timepoint}"), CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("mRNA [log10 TPM+1]")
        .y_desc("footprint/mRNA [log2 ratio]")
        .axis_desc_style(AXIS_FONT)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(plot_err)?;

    // prediction band as one closed polygon
    let band: Vec<(f64, f64)> = model
        .grid
        .iter()
        .copied()
        .zip(model.prediction.upper.iter().copied())
        .chain(
            model
                .grid
                .iter()
                .copied()
                .zip(model.prediction.lower.iter().copied())
                .rev(),
        )
        .collect();
    chart
        .draw_series(std::iter::once(Polygon::new(band, BLACK.mix(0.1).filled())))
        .map_err(plot_err)?;

    chart
        .draw_series(
            hollow
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 2, TAN.mix(0.4).filled())),
        )
        .map_err(plot_err)?;
    chart
        .draw_series(
            classified
                .iter()
                .map(|&(x, y, class)| Circle::new((x, y), 2, band_colour(class).mix(0.6).filled())),
        )
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            model.grid.iter().copied().zip(model.fitted.iter().copied()),
            BLACK.stroke_width(2),
        ))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("Figure written to {}", output_path.display());
    Ok(())
}

/// A scatter series with an optional fitted line over its x range.
pub struct ScatterLayer<'a> {
    pub label: String,
    pub series: &'a PairedSeries,
    pub colour: RGBColor,
    pub fit: Option<LinearFit>,
}

/// Overlay several scatter series and their fits.
pub fn draw_scatter_fits(
    output_path: &Path,
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    layers: &[ScatterLayer<'_>],
) -> Result<()> {
    let x_range = padded_range(layers.iter().flat_map(|l| l.series.x.iter().copied()));
    let y_range = padded_range(layers.iter().flat_map(|l| l.series.y.iter().copied()));

    let root = BitMapBackend::new(output_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(AXIS_FONT)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(plot_err)?;

    for layer in layers {
        let colour = layer.colour;
        chart
            .draw_series(
                layer
                    .series
                    .points()
                    .map(move |(x, y)| Circle::new((x, y), 2, colour.mix(0.2).filled())),
            )
            .map_err(plot_err)?;

        if let Some(fit) = layer.fit {
            let lo = layer.series.x.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = layer.series.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            chart
                .draw_series(LineSeries::new(
                    vec![(lo, fit.predict(lo)), (hi, fit.predict(hi))],
                    colour.stroke_width(2),
                ))
                .map_err(plot_err)?
                .label(format!("{} (r = {:.3})", layer.label, fit.r_value))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 25, y)], colour.stroke_width(3))
                });
        }
    }

    if layers.iter().any(|l| l.fit.is_some()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(LABEL_FONT)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Figure written to {}", output_path.display());
    Ok(())
}

/// Predicted footprint TPM against mRNA TPM, one curve per timepoint.
pub fn draw_model_curves(output_path: &Path, curves: &[(String, Vec<(f64, f64)>)]) -> Result<()> {
    let x_range = padded_range(curves.iter().flat_map(|(_, c)| c.iter().map(|p| p.0)));
    let y_range = padded_range(curves.iter().flat_map(|(_, c)| c.iter().map(|p| p.1)));

    let root = BitMapBackend::new(output_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Footprints predicted by the per-timepoint models", CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("mRNA [TPM]")
        .y_desc("predicted footprint [TPM]")
        .axis_desc_style(AXIS_FONT)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(plot_err)?;

    for (i, (label, curve)) in curves.iter().enumerate() {
        let colour = TIMEPOINT_COLOURS[i % TIMEPOINT_COLOURS.len()];
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), colour.stroke_width(2)))
            .map_err(plot_err)?
            .label(label.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], colour.stroke_width(3))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("Figure written to {}", output_path.display());
    Ok(())
}

/// Small deterministic horizontal offset so strip points do not stack.
fn jitter(i: usize) -> f64 {
    ((i % 9) as f64 - 4.0) * 0.03
}

/// Stoichiometry strip plot of one condition with ±σ guides, significant
/// points and the trajectories of recurrent outliers.
pub fn draw_stoichiometry(
    output_path: &Path,
    report: &ConditionStoichiometry,
    proteins: &RibosomalProteins,
    colours: &ColourAssignment,
) -> Result<()> {
    let y_range = padded_range(
        std::iter::once(0.0).chain(
            report
                .timepoints
                .iter()
                .flat_map(|tp| tp.values.iter().map(|v| v.log2_stoichiometry)),
        ),
    );
    let x_range = -0.5..(TIMEPOINT_LABELS.len() as f64 - 0.5);

    let root = BitMapBackend::new(output_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&report.condition, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    let tick_label = |x: &f64| {
        let idx = x.round();
        if (x - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < TIMEPOINT_LABELS.len() {
            TIMEPOINT_LABELS[idx as usize].to_string()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .x_labels(TIMEPOINT_LABELS.len() * 2 + 1)
        .x_label_formatter(&tick_label)
        .x_desc("Time point")
        .y_desc("log2 ribosomal protein stoichiometry")
        .axis_desc_style(AXIS_FONT)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(plot_err)?;

    for (i, tp) in report.timepoints.iter().enumerate() {
        let x = (i + 1) as f64;
        if let Some(band) = tp.band {
            for level in [band.low, band.high] {
                chart
                    .draw_series(LineSeries::new(
                        vec![(x - 0.2, level), (x + 0.2, level)],
                        BLACK.mix(0.5).stroke_width(1),
                    ))
                    .map_err(plot_err)?;
            }
        }
        chart
            .draw_series(
                tp.values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.significant)
                    .map(|(j, v)| {
                        let point = (x + jitter(j), v.log2_stoichiometry);
                        Circle::new(point, 3, BLACK.mix(0.35).filled())
                    }),
            )
            .map_err(plot_err)?;
    }

    chart
        .draw_series(std::iter::once(Circle::new((0.0, 0.0), 4, BLACK.filled())))
        .map_err(plot_err)?;

    let trajectories = report.trajectories();
    for trajectory in &trajectories {
        let colour = colours
            .get(&trajectory.protein)
            .map(|&slot| palette_colour(slot))
            .unwrap_or(BLACK);
        chart
            .draw_series(LineSeries::new(
                trajectory.points.iter().map(|&(i, v)| (i as f64, v)),
                colour.mix(0.7).stroke_width(3),
            ))
            .map_err(plot_err)?
            .label(proteins.alias(&trajectory.protein).to_string())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], colour.stroke_width(3))
            });
    }

    for (protein, hits) in report.significant_positions() {
        let (colour, size) = match colours.get(&protein) {
            Some(&slot) => (palette_colour(slot), 7),
            None => (BLACK, 3),
        };
        chart
            .draw_series(
                hits.iter()
                    .map(move |&(i, v)| Circle::new((i as f64, v), size, colour.filled())),
            )
            .map_err(plot_err)?;
    }

    if !trajectories.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE)
            .border_style(BLACK)
            .label_font(LABEL_FONT)
            .position(SeriesLabelPosition::LowerLeft)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Figure written to {}", output_path.display());
    Ok(())
}

/// Box extent of one group: quartiles plus whiskers at the furthest values
/// within 1.5 IQR of the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSummary {
    pub low_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub high_whisker: f64,
}

pub fn box_summary(values: &[f64]) -> Result<Option<BoxSummary>> {
    if values.is_empty() {
        return Ok(None);
    }
    let q1 = quantile(values, 0.25)?;
    let median = quantile(values, 0.5)?;
    let q3 = quantile(values, 0.75)?;
    let reach = 1.5 * (q3 - q1);
    let low_whisker = values
        .iter()
        .copied()
        .filter(|&v| v >= q1 - reach)
        .fold(f64::INFINITY, f64::min);
    let high_whisker = values
        .iter()
        .copied()
        .filter(|&v| v <= q3 + reach)
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(Some(BoxSummary {
        low_whisker,
        q1,
        median,
        q3,
        high_whisker,
    }))
}

/// Slots per mRNA bin: the four groups and a gap.
const BIN_STRIDE: usize = 5;

fn group_colour(group: &str) -> RGBColor {
    match group {
        "DET+" => RED,
        "DET-" => BLUE,
        "noDET" => PALETTE[7],
        _ => BLACK,
    }
}

/// X position, tick label and values of every group, bins in ascending order.
pub fn regulation_slots(bins: &BTreeMap<i64, DeviationBin>) -> Vec<(f64, String, &[f64])> {
    bins.values()
        .enumerate()
        .flat_map(|(i, bin)| {
            bin.groups()
                .into_iter()
                .enumerate()
                .map(move |(g, (group, values))| {
                    let x = (i * BIN_STRIDE + g) as f64;
                    (x, format!("{group} n={}", values.len()), values)
                })
        })
        .collect()
}

/// Deviations from the timepoint fit per ceil(log10 mRNA) bin, as boxes with
/// the individual transcripts on top, split by DET group.
pub fn draw_regulation_bins(
    output_path: &Path,
    timepoint: &str,
    bins: &BTreeMap<i64, DeviationBin>,
) -> Result<()> {
    let slots = regulation_slots(bins);
    let y_range = padded_range(
        std::iter::once(0.0).chain(slots.iter().flat_map(|(_, _, v)| v.iter().copied())),
    );
    let x_range = -1.0..(bins.len() * BIN_STRIDE) as f64 - 1.0;
    let label_top = y_range.end;

    let root = BitMapBackend::new(output_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Transcriptional regulation, {timepoint}"), CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    let tick_label = |x: &f64| {
        slots
            .iter()
            .find(|(pos, _, _)| (pos - x).abs() < 1e-6)
            .map(|(_, label, _)| label.clone())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bins.len() * BIN_STRIDE + 1)
        .x_label_formatter(&tick_label)
        .x_desc("DET group per mRNA bin")
        .y_desc("deviation from fit [log2 TE]")
        .axis_desc_style(AXIS_FONT)
        .label_style(("sans-serif", 11))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(-1.0, 0.0), ((bins.len() * BIN_STRIDE) as f64 - 1.0, 0.0)],
            BLACK.mix(0.4).stroke_width(1),
        ))
        .map_err(plot_err)?;

    for (i, bin) in bins.keys().enumerate() {
        let x = (i * BIN_STRIDE) as f64 + 1.5;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("10^{bin}"),
                (x - 0.4, label_top),
                LABEL_FONT,
            )))
            .map_err(plot_err)?;
    }

    for (x, label, values) in &slots {
        let x = *x;
        let colour = group_colour(label.split(' ').next().unwrap_or_default());
        if let Some(b) = box_summary(values)? {
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.35, b.q1), (x + 0.35, b.q3)],
                    colour.mix(0.2).filled(),
                )))
                .map_err(plot_err)?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.35, b.q1), (x + 0.35, b.q3)],
                    colour.stroke_width(1),
                )))
                .map_err(plot_err)?;
            for segment in [
                vec![(x - 0.35, b.median), (x + 0.35, b.median)],
                vec![(x, b.q3), (x, b.high_whisker)],
                vec![(x, b.q1), (x, b.low_whisker)],
            ] {
                chart
                    .draw_series(LineSeries::new(segment, colour.stroke_width(2)))
                    .map_err(plot_err)?;
            }
        }
        chart
            .draw_series(
                values
                    .iter()
                    .enumerate()
                    .map(|(j, &v)| Circle::new((x + jitter(j), v), 2, colour.mix(0.5).filled())),
            )
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Figure written to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colours_are_stable_across_calls() {
        let assignment = assign_colours(ColourAssignment::new(), ["b", "a"]);
        assert_eq!(assignment["b"], 0);
        assert_eq!(assignment["a"], 1);

        let assignment = assign_colours(assignment, ["a", "c"]);
        assert_eq!(assignment["a"], 1);
        assert_eq!(assignment["c"], 2);
        assert_eq!(palette_colour(12), PALETTE[2]);
    }

    #[test]
    fn boxes_clip_whiskers_at_one_and_a_half_iqr() {
        assert_eq!(box_summary(&[]).unwrap(), None);

        let b = box_summary(&[1.0, 2.0, 3.0, 4.0, 5.0, 40.0]).unwrap().unwrap();
        assert!((b.q1 - 2.25).abs() < 1e-12);
        assert!((b.median - 3.5).abs() < 1e-12);
        assert!((b.q3 - 4.75).abs() < 1e-12);
        assert_eq!(b.low_whisker, 1.0);
        // 40 lies beyond 4.75 + 1.5 * 2.5
        assert_eq!(b.high_whisker, 5.0);
    }

    #[test]
    fn regulation_slots_carry_group_counts() {
        let mut bins = BTreeMap::new();
        bins.insert(
            3,
            DeviationBin {
                all: vec![0.5, -0.5, 0.1],
                up: vec![0.5],
                flat: vec![0.1],
                down: vec![-0.5],
            },
        );
        bins.insert(
            1,
            DeviationBin {
                all: vec![0.2],
                flat: vec![0.2],
                ..Default::default()
            },
        );
        let slots = regulation_slots(&bins);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0].0, 0.0);
        assert_eq!(slots[0].1, "all n=1");
        assert_eq!(slots[1].1, "DET+ n=0");
        assert_eq!(slots[4].0, 5.0);
        assert_eq!(slots[4].1, "all n=3");
        assert_eq!(slots[7].1, "DET- n=1");
        assert_eq!(slots[7].2, &[-0.5]);
    }

    #[test]
    fn padded_range_handles_degenerate_input() {
        assert_eq!(padded_range(Vec::<f64>::new()), 0.0..1.0);
        assert_eq!(padded_range(vec![2.0, 2.0]), 1.5..2.5);
        let r = padded_range(vec![0.0, f64::NAN, 10.0, f64::NEG_INFINITY]);
        assert!((r.start + 0.5).abs() < 1e-12);
        assert!((r.end - 10.5).abs() < 1e-12);
    }
}
