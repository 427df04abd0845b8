// THEORY:
// The resolvers never fail merely because pixel quantisation perturbs a
// requested value. Instead they hand back the nearest satisfiable value
// together with a record of what changed. `Resolved<T>` is that pairing, and
// `Adjustment` is one (field, requested, actual, reason) entry.
//
// Each adjustment is also emitted as a `tracing` warning at the point where
// it is made, so a subscriber sees the same information a caller would read
// from `Resolved::adjustments`.

use crate::error::{Result, StimulusError};
use serde::Serialize;
use std::fmt;

/// Why a requested value was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// A pixel count was truncated from a non-integral `visual_angle * ppd`.
    Truncation,
    /// The pixel grid cannot express the requested grating value exactly.
    PoorResolution,
    /// The period policy forced a different number of phases.
    PeriodPolicy,
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AdjustmentReason::Truncation => "truncation to whole pixels",
            AdjustmentReason::PoorResolution => "poor resolution",
            AdjustmentReason::PeriodPolicy => "period policy",
        };
        f.write_str(text)
    }
}

/// A single value the resolver changed on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    /// Name of the adjusted quantity (`"length"`, `"frequency"`, ...).
    pub field: &'static str,
    pub requested: f64,
    pub actual: f64,
    pub reason: AdjustmentReason,
}

impl Adjustment {
    /// Records the adjustment and mirrors it as a `tracing` warning.
    pub(crate) fn record(
        field: &'static str,
        requested: f64,
        actual: f64,
        reason: AdjustmentReason,
    ) -> Self {
        tracing::warn!(field, requested, actual, %reason, "requested value adjusted");
        Self {
            field,
            requested,
            actual,
            reason,
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changed from {} to {} ({})",
            self.field, self.requested, self.actual, self.reason
        )
    }
}

/// A resolved value plus every adjustment made while resolving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub adjustments: Vec<Adjustment>,
}

impl<T> Resolved<T> {
    pub fn exact(value: T) -> Self {
        Self {
            value,
            adjustments: Vec::new(),
        }
    }

    pub fn with_adjustments(value: T, adjustments: Vec<Adjustment>) -> Self {
        Self { value, adjustments }
    }

    /// True when nothing the caller asked for had to change.
    pub fn is_exact(&self) -> bool {
        self.adjustments.is_empty()
    }

    /// Treats any adjustment as a hard failure.
    pub fn strict(self) -> Result<T> {
        match self.adjustments.first() {
            None => Ok(self.value),
            Some(first) => Err(StimulusError::invalid(first.field, first.to_string())),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            adjustments: self.adjustments,
        }
    }

    /// Moves this value's adjustments into `sink` and returns the bare value.
    pub fn collect_into(self, sink: &mut Vec<Adjustment>) -> T {
        sink.extend(self.adjustments);
        self.value
    }
}
