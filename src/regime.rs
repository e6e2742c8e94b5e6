//! Regime diagnosis
//!
//! Maps the UP percentage of a window onto an ordered table of bands. A table
//! is only accepted if it partitions `[0, 100]` with no gaps or overlaps, each
//! shared edge belongs to exactly one side, and the table mirrors itself
//! around 50%.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EquilibriumError, Result};

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Directional bias label, ordered from most bearish to most bullish
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    StrongDownwardBias,
    ModerateDownwardBias,
    Equilibrium,
    ModerateUpwardBias,
    StrongUpwardBias,
}

impl Diagnosis {
    /// Label of the band mirrored around 50%
    pub fn mirror(self) -> Self {
        match self {
            Diagnosis::StrongDownwardBias => Diagnosis::StrongUpwardBias,
            Diagnosis::ModerateDownwardBias => Diagnosis::ModerateUpwardBias,
            Diagnosis::Equilibrium => Diagnosis::Equilibrium,
            Diagnosis::ModerateUpwardBias => Diagnosis::ModerateDownwardBias,
            Diagnosis::StrongUpwardBias => Diagnosis::StrongDownwardBias,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Diagnosis::StrongDownwardBias => "Strong downward bias",
            Diagnosis::ModerateDownwardBias => "Moderate downward bias",
            Diagnosis::Equilibrium => "Equilibrium",
            Diagnosis::ModerateUpwardBias => "Moderate upward bias",
            Diagnosis::StrongUpwardBias => "Strong upward bias",
        }
    }

    #[inline]
    pub fn is_equilibrium(self) -> bool {
        matches!(self, Diagnosis::Equilibrium)
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of diagnosing a window
///
/// `InsufficientData` is a state, not a failure: the window simply does not
/// hold enough bars yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Regime {
    InsufficientData { have: usize, need: usize },
    Diagnosed { diagnosis: Diagnosis },
}

impl Regime {
    pub fn diagnosis(&self) -> Option<Diagnosis> {
        match *self {
            Regime::Diagnosed { diagnosis } => Some(diagnosis),
            Regime::InsufficientData { .. } => None,
        }
    }

    #[inline]
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Regime::InsufficientData { .. })
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::InsufficientData { have, need } => {
                write!(f, "Insufficient data ({have} of {need} bars)")
            }
            Regime::Diagnosed { diagnosis } => write!(f, "{diagnosis}"),
        }
    }
}

// ============================================================
// BANDS
// ============================================================

/// One side of a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub value: f64,
    pub inclusive: bool,
}

impl Edge {
    pub const fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub const fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// Percentage interval mapped to a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: Edge,
    pub upper: Edge,
    pub diagnosis: Diagnosis,
}

impl Band {
    pub const fn new(lower: Edge, upper: Edge, diagnosis: Diagnosis) -> Self {
        Self {
            lower,
            upper,
            diagnosis,
        }
    }

    #[inline]
    pub fn contains(&self, pct: f64) -> bool {
        let above = if self.lower.inclusive {
            pct >= self.lower.value
        } else {
            pct > self.lower.value
        };
        let below = if self.upper.inclusive {
            pct <= self.upper.value
        } else {
            pct < self.upper.value
        };
        above && below
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lower.inclusive { '[' } else { '(' };
        let close = if self.upper.inclusive { ']' } else { ')' };
        write!(
            f,
            "{open}{}, {}{close} -> {}",
            self.lower.value, self.upper.value, self.diagnosis
        )
    }
}

/// Validated, ordered band table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegimeBands {
    bands: Vec<Band>,
}

impl Default for RegimeBands {
    /// `<45` strong down, `[45,48)` moderate down, `[48,52]` equilibrium,
    /// `(52,55]` moderate up, `>55` strong up
    fn default() -> Self {
        Self {
            bands: symmetric_table(2.0, 5.0),
        }
    }
}

fn symmetric_table(equilibrium: f64, moderate: f64) -> Vec<Band> {
    let lo_mod = 50.0 - moderate;
    let lo_eq = 50.0 - equilibrium;
    let hi_eq = 50.0 + equilibrium;
    let hi_mod = 50.0 + moderate;
    vec![
        Band::new(Edge::inclusive(0.0), Edge::exclusive(lo_mod), Diagnosis::StrongDownwardBias),
        Band::new(Edge::inclusive(lo_mod), Edge::exclusive(lo_eq), Diagnosis::ModerateDownwardBias),
        Band::new(Edge::inclusive(lo_eq), Edge::inclusive(hi_eq), Diagnosis::Equilibrium),
        Band::new(Edge::exclusive(hi_eq), Edge::inclusive(hi_mod), Diagnosis::ModerateUpwardBias),
        Band::new(Edge::exclusive(hi_mod), Edge::inclusive(100.0), Diagnosis::StrongUpwardBias),
    ]
}

impl RegimeBands {
    /// Validate an explicit band table
    pub fn new(bands: Vec<Band>) -> Result<Self> {
        validate(&bands)?;
        Ok(Self { bands })
    }

    /// Five-band table with an equilibrium half-width and a moderate half-width,
    /// both in percentage points around 50.
    pub fn symmetric(equilibrium: f64, moderate: f64) -> Result<Self> {
        if !(equilibrium.is_finite() && moderate.is_finite()) {
            return Err(EquilibriumError::InvalidValue("band widths must be finite"));
        }
        if !(0.0 < equilibrium && equilibrium < moderate && moderate < 50.0) {
            return Err(EquilibriumError::InvalidBands(format!(
                "need 0 < equilibrium ({equilibrium}) < moderate ({moderate}) < 50"
            )));
        }
        Self::new(symmetric_table(equilibrium, moderate))
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Diagnosis for an UP percentage. Values outside `[0, 100]` are clamped.
    pub fn diagnose(&self, up_pct: f64) -> Diagnosis {
        let pct = up_pct.clamp(0.0, 100.0);
        self.bands
            .iter()
            .find(|band| band.contains(pct))
            .map_or(Diagnosis::Equilibrium, |band| band.diagnosis)
    }

    /// Diagnosis gated on window validity
    pub fn assess(&self, up_pct: f64, have: usize, need: usize) -> Regime {
        if have < need.max(1) {
            return Regime::InsufficientData {
                have,
                need: need.max(1),
            };
        }
        Regime::Diagnosed {
            diagnosis: self.diagnose(up_pct),
        }
    }
}

impl<'de> Deserialize<'de> for RegimeBands {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let bands = Vec::<Band>::deserialize(d)?;
        RegimeBands::new(bands).map_err(serde::de::Error::custom)
    }
}

fn validate(bands: &[Band]) -> Result<()> {
    let fail = |msg: String| Err(EquilibriumError::InvalidBands(msg));

    let (Some(first), Some(last)) = (bands.first(), bands.last()) else {
        return fail("band table is empty".into());
    };
    if first.lower != Edge::inclusive(0.0) {
        return fail(format!("first band must start at 0 inclusive, got {first}"));
    }
    if last.upper != Edge::inclusive(100.0) {
        return fail(format!("last band must end at 100 inclusive, got {last}"));
    }

    for band in bands {
        if !(band.lower.value.is_finite() && band.upper.value.is_finite()) {
            return fail(format!("non-finite edge in {band}"));
        }
        let degenerate = band.lower.value > band.upper.value
            || (band.lower.value == band.upper.value
                && !(band.lower.inclusive && band.upper.inclusive));
        if degenerate {
            return fail(format!("empty band {band}"));
        }
    }

    for pair in bands.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        if left.upper.value != right.lower.value {
            return fail(format!("gap or overlap between {left} and {right}"));
        }
        if left.upper.inclusive == right.lower.inclusive {
            return fail(format!(
                "edge {} must be inclusive on exactly one side",
                left.upper.value
            ));
        }
        if left.diagnosis > right.diagnosis {
            return fail(format!("{left} and {right} are out of order"));
        }
    }

    for (band, mirror) in bands.iter().zip(bands.iter().rev()) {
        let symmetric = (band.lower.value - (100.0 - mirror.upper.value)).abs() < SYMMETRY_TOLERANCE
            && band.lower.inclusive == mirror.upper.inclusive
            && band.diagnosis == mirror.diagnosis.mirror();
        if !symmetric {
            return fail(format!("{band} is not mirrored by {mirror} around 50%"));
        }
    }

    Ok(())
}

// ============================================================
// TESTS
// ============================================================
