use std::fmt;

use serde::Serialize;

/// Sequenced fraction an expression column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Fraction {
    /// Total mRNA (`trna` columns).
    Mrna,
    /// Ribosome footprints (`rbf` columns).
    Footprint,
}

impl Fraction {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "trna" => Some(Fraction::Mrna),
            "rbf" => Some(Fraction::Footprint),
            _ => None,
        }
    }
}

/// Direction of a differential-expression call against the baseline timepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Regulation {
    Up,
    Down,
}

impl Regulation {
    pub fn sign(self) -> i8 {
        match self {
            Regulation::Up => 1,
            Regulation::Down => -1,
        }
    }
}

/// Whether a transcript carries enough footprints to enter the regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Support {
    /// Median footprint TPM > 0 and median mRNA TPM >= 1.
    WithFootprint,
    WithoutFootprint,
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Support::WithFootprint => "withFootprint",
            Support::WithoutFootprint => "withoutFootprint",
        };
        write!(f, "{s}")
    }
}

/// Position of an observation relative to the regression prediction band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BandClass {
    Up,
    Neutral,
    Down,
}

impl BandClass {
    pub const ALL: [BandClass; 3] = [BandClass::Up, BandClass::Neutral, BandClass::Down];

    pub fn as_str(self) -> &'static str {
        match self {
            BandClass::Up => "up",
            BandClass::Neutral => "neutral",
            BandClass::Down => "down",
        }
    }
}

impl fmt::Display for BandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-transcript annotation joined from the FASTA and half-life tables.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneRecord {
    pub name: String,
    pub transcript_length: usize,
    /// Minutes; `None` when the gene is missing from the half-life table.
    pub half_life: Option<f64>,
}

/// Paired (x, y) observations collected for one fit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl PairedSeries {
    pub fn push(&mut self, x: f64, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// A value kept separately for transcripts with and without footprints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BySupport<T> {
    pub with_footprint: T,
    pub without_footprint: T,
}

impl<T> BySupport<T> {
    pub fn get(&self, support: Support) -> &T {
        match support {
            Support::WithFootprint => &self.with_footprint,
            Support::WithoutFootprint => &self.without_footprint,
        }
    }

    pub fn get_mut(&mut self, support: Support) -> &mut T {
        match support {
            Support::WithFootprint => &mut self.with_footprint,
            Support::WithoutFootprint => &mut self.without_footprint,
        }
    }
}
