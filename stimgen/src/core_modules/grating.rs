// THEORY:
// A grating partitions one spatial axis into alternating phases (bars, rings,
// frames, segments). The partition can be asked for in several redundant
// ways: spatial frequency (cycles per degree), phase width (degrees per
// phase), or number of phases over a known extent. One cycle is two phases,
// so `phases_per_degree = 1 / phase_width = 2 * frequency`.
//
// The resolver treats `(n_phases, visual_angle, phases_per_degree)` as a
// second instance of the one-axis resolution problem, analogous to
// `(pixels, visual_angle, ppd)`, but continuous: phase counts are not rounded
// at that step. The primary `(length, visual_angle, ppd)` triple is then
// resolved with the pixel resolver, using the minimal visual angle implied by
// the phases when the extent was not given.
//
// Afterwards the partition is fitted to the pixel grid. A period policy other
// than `Ignore` forces an integral number of phases that divides the length
// exactly; `round_phase_width` forces every phase to cover a whole number of
// pixels. Values that change are reported as adjustments. Frequencies above
// the Nyquist limit (`ppd / 2`) are always a hard error.

use crate::core_modules::adjustment::{Adjustment, AdjustmentReason, Resolved};
use crate::core_modules::resolution::resolve_1d;
use crate::core_modules::utils::{approx_eq, round8};
use crate::error::{Result, StimulusError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Constraint on the number of phases of a grating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Keep whatever (possibly fractional) number of phases results.
    #[default]
    Ignore,
    /// An even number of phases: whole cycles only.
    Even,
    /// An odd number of phases: the partition starts and ends on the same phase.
    Odd,
    /// Any integral number of phases.
    Either,
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Period::Ignore),
            "even" => Ok(Period::Even),
            "odd" => Ok(Period::Odd),
            "either" => Ok(Period::Either),
            other => Err(format!(
                "invalid period '{other}', expected ignore|even|odd|either"
            )),
        }
    }
}

impl Period {
    fn admits(self, n_phases: usize) -> bool {
        match self {
            Period::Even => n_phases % 2 == 0,
            Period::Odd => n_phases % 2 == 1,
            Period::Either | Period::Ignore => true,
        }
    }
}

/// Any sufficient subset of the grating quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GratingRequest {
    /// Extent of the partitioned axis in pixels.
    pub length: Option<usize>,
    /// Extent of the partitioned axis in degrees.
    pub visual_angle: Option<f64>,
    pub ppd: Option<f64>,
    /// Cycles per degree.
    pub frequency: Option<f64>,
    pub n_phases: Option<f64>,
    /// Degrees per phase.
    pub phase_width: Option<f64>,
    pub period: Period,
    /// Snap the phase width to a whole number of pixels.
    pub round_phase_width: bool,
}

impl Default for GratingRequest {
    fn default() -> Self {
        Self {
            length: None,
            visual_angle: None,
            ppd: None,
            frequency: None,
            n_phases: None,
            phase_width: None,
            period: Period::Ignore,
            round_phase_width: true,
        }
    }
}

/// A fully resolved, mutually consistent grating partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GratingParams {
    pub length: usize,
    pub visual_angle: f64,
    pub ppd: f64,
    pub frequency: f64,
    pub phase_width: f64,
    pub n_phases: f64,
    /// Outer boundary of each phase in degrees, `ceil(n_phases)` entries.
    pub edges: Vec<f64>,
    pub period: Period,
}

fn positive(name: &'static str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(StimulusError::invalid(
            name,
            format!("{v} is not a positive finite number"),
        )),
        other => Ok(other),
    }
}

/// Continuous counterpart of `resolve_1d` for `(n_phases, visual_angle, phases_per_degree)`.
fn resolve_phases(
    n_phases: Option<f64>,
    visual_angle: Option<f64>,
    phases_per_degree: Option<f64>,
) -> Result<(f64, f64, f64)> {
    match (n_phases, visual_angle, phases_per_degree) {
        (Some(n), Some(angle), Some(rate)) => {
            if approx_eq(n, angle * rate) {
                Ok((n, angle, rate))
            } else {
                Err(StimulusError::InconsistentPhases {
                    n_phases: n,
                    visual_angle: angle,
                    phases_per_degree: rate,
                })
            }
        }
        (None, Some(angle), Some(rate)) => Ok((round8(angle * rate), angle, rate)),
        (Some(n), None, Some(rate)) => Ok((n, round8(n / rate), rate)),
        (Some(n), Some(angle), None) => Ok((n, angle, n / angle)),
        _ => Err(StimulusError::TooManyUnknowns {
            quantities: "n_phases, visual_angle, frequency/phase_width".to_string(),
        }),
    }
}

/// All divisors of `n` in ascending order, by trial division up to `sqrt(n)`.
fn divisors(n: usize) -> Vec<usize> {
    let mut small = Vec::new();
    let mut large = Vec::new();
    let mut candidate = 1;
    while candidate * candidate <= n {
        if n % candidate == 0 {
            small.push(candidate);
            if candidate != n / candidate {
                large.push(n / candidate);
            }
        }
        candidate += 1;
    }
    small.extend(large.into_iter().rev());
    small
}

/// The admissible phase count closest to `n_phases`.
///
/// Admissible counts divide `length` exactly and satisfy `period`. Ties go to
/// the smaller count. The result can be far from the request when `length`
/// has no nearby divisor.
pub fn round_n_phases(n_phases: f64, length: usize, period: Period) -> Result<usize> {
    divisors(length)
        .into_iter()
        .filter(|&count| period.admits(count))
        .fold(None, |best: Option<(usize, f64)>, count| {
            let distance = (count as f64 - n_phases).abs();
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((count, distance)),
            }
        })
        .map(|(count, _)| count)
        .ok_or(StimulusError::NoAdmissiblePhases { length, period })
}

/// Exact limit for a frequency the caller asked for.
fn check_requested_nyquist(frequency: f64, ppd: f64) -> Result<()> {
    let limit = ppd / 2.0;
    if frequency > limit {
        Err(StimulusError::Nyquist { frequency, limit })
    } else {
        Ok(())
    }
}

/// Limit up to [`round8`] for frequencies derived from other quantities.
fn check_nyquist(frequency: f64, ppd: f64) -> Result<()> {
    let limit = ppd / 2.0;
    if round8(frequency) > round8(limit) {
        Err(StimulusError::Nyquist { frequency, limit })
    } else {
        Ok(())
    }
}

/// Resolves a grating partition from any sufficient subset of its quantities.
pub fn resolve_grating_params(request: &GratingRequest) -> Result<Resolved<GratingParams>> {
    let frequency_requested = positive("frequency", request.frequency)?;
    let phase_width_requested = positive("phase_width", request.phase_width)?;
    let n_phases_requested = positive("n_phases", request.n_phases)?;

    // Phase rate from whichever of phase_width / frequency was given.
    let phases_per_degree = match (phase_width_requested, frequency_requested) {
        (Some(phase_width), Some(frequency)) => {
            let rate = 1.0 / phase_width;
            if !approx_eq(rate, 2.0 * frequency) {
                return Err(StimulusError::InconsistentPhaseRate {
                    phase_width,
                    frequency,
                });
            }
            Some(rate)
        }
        (Some(phase_width), None) => Some(1.0 / phase_width),
        (None, Some(frequency)) => Some(2.0 * frequency),
        (None, None) => None,
    };

    let primary = match resolve_1d(request.length, request.visual_angle, request.ppd) {
        Ok(primary) => Some(primary),
        Err(StimulusError::TooManyUnknowns { .. }) => None,
        Err(err) => return Err(err),
    };
    let known_angle = primary
        .as_ref()
        .map(|resolved| resolved.value.1)
        .or(request.visual_angle);

    let (n_phases, min_angle, phases_per_degree) =
        resolve_phases(n_phases_requested, known_angle, phases_per_degree)?;

    let primary = match primary {
        Some(primary) => primary,
        None => resolve_1d(request.length, Some(min_angle), request.ppd)?,
    };
    let mut adjustments = Vec::new();
    let (length, visual_angle, ppd) = primary.collect_into(&mut adjustments);

    match frequency_requested {
        Some(frequency) => check_requested_nyquist(frequency, ppd)?,
        None => check_nyquist(phases_per_degree / 2.0, ppd)?,
    }

    let mut n_phases = n_phases;
    let mut phase_width = 1.0 / phases_per_degree;

    if request.period != Period::Ignore {
        let count = round_n_phases(n_phases, length, request.period)?;
        n_phases = count as f64;
        phase_width = (length as f64 / n_phases) / ppd;
    }

    if request.round_phase_width {
        let pixels_per_phase = round8(phase_width * ppd).round();
        if pixels_per_phase < 1.0 {
            return Err(StimulusError::Nyquist {
                frequency: 1.0 / (2.0 * phase_width),
                limit: ppd / 2.0,
            });
        }
        phase_width = pixels_per_phase / ppd;
        n_phases = round8(length as f64 / pixels_per_phase);
    }

    let frequency = round8(1.0 / (2.0 * phase_width));
    check_nyquist(frequency, ppd)?;

    let n_edges = round8(n_phases).ceil() as usize;
    let edges = (1..=n_edges)
        .map(|index| round8(index as f64 * phase_width))
        .collect();
    let phase_width = round8(phase_width);

    let reason = if request.period == Period::Ignore {
        AdjustmentReason::PoorResolution
    } else {
        AdjustmentReason::PeriodPolicy
    };
    for (field, requested, actual) in [
        ("frequency", frequency_requested, frequency),
        ("n_phases", n_phases_requested, n_phases),
        ("phase_width", phase_width_requested, phase_width),
    ] {
        if let Some(requested) = requested {
            if !approx_eq(requested, actual) {
                adjustments.push(Adjustment::record(field, requested, actual, reason));
            }
        }
    }

    let params = GratingParams {
        length,
        visual_angle,
        ppd,
        frequency,
        phase_width,
        n_phases,
        edges,
        period: request.period,
    };
    tracing::debug!(
        length,
        visual_angle,
        ppd,
        frequency,
        phase_width,
        n_phases,
        "grating parameters resolved"
    );

    Ok(Resolved::with_adjustments(params, adjustments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GratingRequest {
        GratingRequest::default()
    }

    #[test]
    fn divisors_are_sorted() {
        assert_eq!(divisors(100), vec![1, 2, 4, 5, 10, 20, 25, 50, 100]);
        assert_eq!(divisors(1), vec![1]);
        assert_eq!(divisors(49), vec![1, 7, 49]);
    }

    #[test]
    fn rounds_to_nearest_even_divisor() {
        assert_eq!(round_n_phases(5.0, 100, Period::Even).unwrap(), 4);
    }

    #[test]
    fn ties_go_to_the_smaller_count() {
        // Divisors of 12: 1, 2, 3, 4, 6, 12. 5 is equally far from 4 and 6.
        assert_eq!(round_n_phases(5.0, 12, Period::Either).unwrap(), 4);
    }

    #[test]
    fn odd_policy_on_power_of_two_falls_back_to_one() {
        assert_eq!(round_n_phases(8.0, 64, Period::Odd).unwrap(), 1);
    }

    #[test]
    fn no_even_divisor_is_an_error() {
        let err = round_n_phases(3.0, 15, Period::Even).unwrap_err();
        assert!(matches!(
            err,
            StimulusError::NoAdmissiblePhases { length: 15, .. }
        ));
    }

    #[test]
    fn period_parses_from_text() {
        assert_eq!("Even".parse::<Period>().unwrap(), Period::Even);
        assert!("sometimes".parse::<Period>().is_err());
    }

    #[test]
    fn consistent_request_resolves_exactly() {
        let resolved = resolve_grating_params(&GratingRequest {
            length: Some(1024),
            visual_angle: Some(32.0),
            n_phases: Some(16.0),
            phase_width: Some(2.0),
            ..request()
        })
        .unwrap();
        assert!(resolved.is_exact(), "{:?}", resolved.adjustments);
        let params = resolved.value;
        assert_eq!(params.ppd, 32.0);
        assert_eq!(params.frequency, 0.25);
        assert_eq!(params.edges.len(), 16);
        assert_eq!(params.edges[0], 2.0);
        assert_eq!(params.edges[15], 32.0);
    }

    #[test]
    fn contradicting_phase_counts_fail() {
        let err = resolve_grating_params(&GratingRequest {
            length: Some(1024),
            visual_angle: Some(32.0),
            n_phases: Some(8.0),
            phase_width: Some(2.0),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, StimulusError::InconsistentPhases { .. }));
    }

    #[test]
    fn contradicting_phase_rates_fail() {
        let err = resolve_grating_params(&GratingRequest {
            length: Some(100),
            ppd: Some(10.0),
            frequency: Some(1.0),
            phase_width: Some(1.0),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, StimulusError::InconsistentPhaseRate { .. }));
    }

    #[test]
    fn minimal_visual_angle_comes_from_phases() {
        let params = resolve_grating_params(&GratingRequest {
            ppd: Some(32.0),
            n_phases: Some(8.0),
            phase_width: Some(2.0),
            ..request()
        })
        .unwrap()
        .value;
        assert_eq!(params.visual_angle, 16.0);
        assert_eq!(params.length, 512);
    }

    #[test]
    fn underdetermined_phases_fail() {
        let err = resolve_grating_params(&GratingRequest {
            length: Some(100),
            ppd: Some(10.0),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, StimulusError::TooManyUnknowns { .. }));
    }

    #[test]
    fn period_policy_adjusts_frequency_below_nyquist() {
        let resolved = resolve_grating_params(&GratingRequest {
            visual_angle: Some(1.0),
            ppd: Some(36.0),
            frequency: Some(2.8),
            period: Period::Either,
            ..request()
        })
        .unwrap();
        let params = &resolved.value;
        assert_eq!(params.length, 36);
        assert_eq!(params.n_phases, 6.0);
        assert_eq!(params.frequency, 3.0);
        assert!(params.frequency <= params.ppd / 2.0);
        assert_eq!(resolved.adjustments.len(), 1);
        assert_eq!(resolved.adjustments[0].field, "frequency");
        assert_eq!(resolved.adjustments[0].reason, AdjustmentReason::PeriodPolicy);
    }

    #[test]
    fn frequency_above_nyquist_fails() {
        let err = resolve_grating_params(&GratingRequest {
            visual_angle: Some(1.0),
            ppd: Some(36.0),
            frequency: Some(18.5),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, StimulusError::Nyquist { .. }));
    }

    #[test]
    fn frequency_at_nyquist_is_allowed() {
        let params = resolve_grating_params(&GratingRequest {
            visual_angle: Some(1.0),
            ppd: Some(36.0),
            frequency: Some(18.0),
            ..request()
        })
        .unwrap()
        .value;
        assert_eq!(params.n_phases, 36.0);
    }

    #[test]
    fn frequency_just_above_nyquist_fails() {
        let err = resolve_grating_params(&GratingRequest {
            visual_angle: Some(1.0),
            ppd: Some(36.0),
            frequency: Some(18.000000001),
            round_phase_width: false,
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, StimulusError::Nyquist { .. }));

        let params = resolve_grating_params(&GratingRequest {
            visual_angle: Some(1.0),
            ppd: Some(36.0),
            frequency: Some(18.0),
            round_phase_width: false,
            ..request()
        })
        .unwrap()
        .value;
        assert_eq!(params.frequency, 18.0);
    }

    #[test]
    fn pixel_rounding_reports_poor_resolution() {
        // 3 cpd at 20 ppd asks for 3.33 px per phase; 3 px is the closest.
        let resolved = resolve_grating_params(&GratingRequest {
            length: Some(60),
            ppd: Some(20.0),
            frequency: Some(3.0),
            ..request()
        })
        .unwrap();
        let params = &resolved.value;
        assert_eq!(params.phase_width, 0.15);
        assert_eq!(params.n_phases, 20.0);
        assert!(resolved
            .adjustments
            .iter()
            .all(|a| a.reason == AdjustmentReason::PoorResolution));
        assert!(resolved.adjustments.iter().any(|a| a.field == "frequency"));
    }

    #[test]
    fn edges_step_by_phase_width() {
        let params = resolve_grating_params(&GratingRequest {
            length: Some(100),
            ppd: Some(10.0),
            phase_width: Some(0.7),
            ..request()
        })
        .unwrap()
        .value;
        assert_eq!(params.edges.len(), params.n_phases.ceil() as usize);
        for pair in params.edges.windows(2) {
            assert!((pair[1] - pair[0] - params.phase_width).abs() < 1e-8);
        }
    }

    #[test]
    fn unrounded_phase_width_keeps_fractional_phases() {
        let params = resolve_grating_params(&GratingRequest {
            length: Some(100),
            ppd: Some(10.0),
            phase_width: Some(0.75),
            round_phase_width: false,
            ..request()
        })
        .unwrap()
        .value;
        assert_eq!(params.phase_width, 0.75);
        assert!((params.n_phases - 13.333_333_33).abs() < 1e-6);
        assert_eq!(params.edges.len(), 14);
    }
}
