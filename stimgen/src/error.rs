// THEORY:
// Every fallible operation in the crate returns `StimulusError`. The variants
// follow the three families of failure a stimulus specification can have:
// too little information (`TooManyUnknowns`), contradictory information
// (`Resolution`, `InconsistentPhaseRate`, `InconsistentPhases`) and requests
// that cannot be realised on a pixel grid (`Nyquist`, `NoAdmissiblePhases`,
// `Geometry`). Value-level validation failures are `InvalidValue`.
//
// Changes that the resolvers make on the caller's behalf are not errors; they
// are reported as `Adjustment`s next to the resolved value (see `core_modules::adjustment`).

use crate::core_modules::grating::Period;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StimulusError {
    /// More than one quantity of a resolvable triple was left unspecified.
    #[error("too many unknowns: at most one of ({quantities}) may be unspecified")]
    TooManyUnknowns { quantities: String },

    /// A fully specified resolution does not satisfy `length == visual_angle * ppd`.
    #[error(
        "resolution error: {visual_angle} deg * {ppd} ppd gives {computed} px, but {length} px were specified"
    )]
    Resolution {
        length: usize,
        visual_angle: f64,
        ppd: f64,
        computed: usize,
    },

    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("phase_width {phase_width} and frequency {frequency} do not match (phase_width must equal 1 / (2 * frequency))")]
    InconsistentPhaseRate { phase_width: f64, frequency: f64 },

    #[error(
        "n_phases {n_phases} does not fit {visual_angle} deg at {phases_per_degree} phases per degree"
    )]
    InconsistentPhases {
        n_phases: f64,
        visual_angle: f64,
        phases_per_degree: f64,
    },

    #[error("grating frequency {frequency} cpd exceeds the Nyquist limit of {limit} cpd (ppd / 2)")]
    Nyquist { frequency: f64, limit: f64 },

    #[error("no phase count satisfying period policy {period:?} divides {length} px")]
    NoAdmissiblePhases { length: usize, period: Period },

    #[error("{0}")]
    Geometry(String),
}

impl StimulusError {
    /// True for the over-specification inconsistency raised by the resolution checks.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, StimulusError::Resolution { .. })
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StimulusError::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StimulusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_message_names_quantities() {
        let err = StimulusError::Resolution {
            length: 1024,
            visual_angle: 32.0,
            ppd: 16.0,
            computed: 512,
        };
        let message = err.to_string();
        assert!(message.contains("1024 px"));
        assert!(message.contains("512 px"));
        assert!(err.is_resolution_error());
    }

    #[test]
    fn other_variants_are_not_resolution_errors() {
        let err = StimulusError::TooManyUnknowns {
            quantities: "length, visual_angle, ppd".to_string(),
        };
        assert!(!err.is_resolution_error());
        assert!(err.to_string().contains("length, visual_angle, ppd"));
    }
}
