//! Change classification between two samples
//!
//! Numeric samples compare against [`ChangeTolerance`]; everything else
//! treats any difference as big. NaN equals NaN here so a value stuck at NaN
//! does not register a change on every tick.

use crate::config::ChangeTolerance;
use crate::traits::SampleValue;

/// How much a value moved between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Identical samples
    None,
    /// Different, but within tolerance
    Small,
    /// Beyond tolerance (or non-numeric difference)
    Big,
}

impl Change {
    /// Any difference at all
    pub fn is_change(self) -> bool {
        self != Change::None
    }

    /// A big difference
    pub fn is_big(self) -> bool {
        self == Change::Big
    }
}

/// Classify the move from `previous` to `current`
pub fn classify(previous: &SampleValue, current: &SampleValue, tolerance: &ChangeTolerance) -> Change {
    match (previous, current) {
        (SampleValue::Int(a), SampleValue::Int(b)) => {
            if a == b {
                Change::None
            } else {
                scalar(*a as f64, *b as f64, tolerance)
            }
        }
        (SampleValue::Float(a), SampleValue::Float(b)) => {
            if same_float(*a, *b) {
                Change::None
            } else {
                scalar(*a, *b, tolerance)
            }
        }
        (SampleValue::IntArray(a), SampleValue::IntArray(b)) => {
            if a == b {
                Change::None
            } else {
                elementwise(
                    a.iter().map(|v| *v as f64),
                    b.iter().map(|v| *v as f64),
                    a.len() == b.len(),
                    tolerance,
                )
            }
        }
        (SampleValue::FloatArray(a), SampleValue::FloatArray(b)) => {
            if a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_float(*x, *y)) {
                Change::None
            } else {
                elementwise(a.iter().copied(), b.iter().copied(), a.len() == b.len(), tolerance)
            }
        }
        (SampleValue::Bytes(a), SampleValue::Bytes(b)) => {
            if a == b {
                Change::None
            } else {
                Change::Big
            }
        }
        (SampleValue::Unavailable, SampleValue::Unavailable) => Change::None,
        // Type changed (or became unavailable).
        _ => Change::Big,
    }
}

fn same_float(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn scalar(previous: f64, current: f64, tolerance: &ChangeTolerance) -> Change {
    let delta = (current - previous).abs();
    if !delta.is_finite() {
        return Change::Big;
    }

    let threshold = tolerance.absolute.max(tolerance.relative * previous.abs());
    if delta > threshold {
        Change::Big
    } else {
        Change::Small
    }
}

fn elementwise(
    previous: impl Iterator<Item = f64>,
    current: impl Iterator<Item = f64>,
    same_len: bool,
    tolerance: &ChangeTolerance,
) -> Change {
    if !same_len {
        return Change::Big;
    }

    let big = previous
        .zip(current)
        .filter(|(a, b)| !same_float(*a, *b))
        .any(|(a, b)| scalar(a, b, tolerance).is_big());

    if big { Change::Big } else { Change::Small }
}
