// THEORY:
// The resolution layer reconciles three redundant descriptions of spatial
// extent along each image axis:
//
//   shape        pixels
//   visual_size  degrees of visual angle
//   ppd          pixels per degree
//
// Any two determine the third (`pixels = visual_angle * ppd`). The resolver
// accepts each quantity as a scalar, a pair, a partially known pair or
// nothing at all, normalises it once at the boundary (`Pair`), and then solves
// each axis independently with `resolve_1d`. A final `valid_resolution` pass
// checks that the resolved triple is geometrically consistent.
//
// Pixel counts derived from degrees are truncated, never rounded to nearest.
// The product is first rounded to 8 decimals so that floating-point drift
// (`0.1 * 30 = 2.9999999999999996`) does not cost a pixel. Whenever the
// truncation actually drops a fraction of a pixel, a `Truncation` adjustment
// is reported, because the effective visual size is then smaller than asked.

use crate::core_modules::adjustment::{Adjustment, AdjustmentReason, Resolved};
use crate::core_modules::utils::round8;
use crate::error::{Result, StimulusError};
use serde::{Deserialize, Serialize};

/// A per-axis input that may be a single value for both axes, a pair of
/// (possibly unknown) values, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pair<T> {
    Unspecified,
    Both(T),
    Each(Option<T>, Option<T>),
}

impl<T> Default for Pair<T> {
    fn default() -> Self {
        Pair::Unspecified
    }
}

impl<T: Copy> Pair<T> {
    /// Builds a pair from a sequence: empty is unspecified, one value is
    /// broadcast to both axes, two values are taken as-is.
    pub fn from_slice(values: &[T]) -> Result<Self> {
        match values {
            [] => Ok(Pair::Unspecified),
            [value] => Ok(Pair::Both(*value)),
            [first, second] => Ok(Pair::Each(Some(*first), Some(*second))),
            _ => Err(StimulusError::invalid(
                "pair",
                format!("expected at most 2 values, got {}", values.len()),
            )),
        }
    }

    /// The canonical (first axis, second axis) form.
    pub fn normalize(self) -> (Option<T>, Option<T>) {
        match self {
            Pair::Unspecified => (None, None),
            Pair::Both(value) => (Some(value), Some(value)),
            Pair::Each(first, second) => (first, second),
        }
    }
}

impl<T> From<T> for Pair<T> {
    fn from(value: T) -> Self {
        Pair::Both(value)
    }
}

impl<T> From<Option<T>> for Pair<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Pair::Both(value),
            None => Pair::Unspecified,
        }
    }
}

impl<T> From<(T, T)> for Pair<T> {
    fn from((first, second): (T, T)) -> Self {
        Pair::Each(Some(first), Some(second))
    }
}

impl<T> From<[T; 2]> for Pair<T> {
    fn from([first, second]: [T; 2]) -> Self {
        Pair::Each(Some(first), Some(second))
    }
}

impl<T> From<(Option<T>, Option<T>)> for Pair<T> {
    fn from((first, second): (Option<T>, Option<T>)) -> Self {
        Pair::Each(first, second)
    }
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shape {
    pub height: Option<usize>,
    pub width: Option<usize>,
}

/// Image size in degrees of visual angle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSize {
    pub height: Option<f64>,
    pub width: Option<f64>,
}

/// Pixels per degree along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ppd {
    pub vertical: Option<f64>,
    pub horizontal: Option<f64>,
}

impl From<Shape> for Pair<usize> {
    fn from(shape: Shape) -> Self {
        Pair::Each(shape.height, shape.width)
    }
}

impl From<VisualSize> for Pair<f64> {
    fn from(visual_size: VisualSize) -> Self {
        Pair::Each(visual_size.height, visual_size.width)
    }
}

impl From<Ppd> for Pair<f64> {
    fn from(ppd: Ppd) -> Self {
        Pair::Each(ppd.vertical, ppd.horizontal)
    }
}

/// A fully resolved, mutually consistent (shape, visual size, ppd) triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// (height, width) in pixels.
    pub shape: (usize, usize),
    /// (height, width) in degrees.
    pub visual_size: (f64, f64),
    /// (vertical, horizontal) pixels per degree.
    pub ppd: (f64, f64),
}

impl Resolution {
    pub fn height(&self) -> usize {
        self.shape.0
    }

    pub fn width(&self) -> usize {
        self.shape.1
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(StimulusError::invalid(
            name,
            format!("{value} is not a positive finite number"),
        ))
    }
}

fn check_positive_length(name: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        Err(StimulusError::invalid(name, "must be at least one pixel"))
    } else {
        Ok(value)
    }
}

pub fn validate_shape(shape: impl Into<Pair<usize>>) -> Result<Shape> {
    let (height, width) = shape.into().normalize();
    Ok(Shape {
        height: height.map(|v| check_positive_length("shape", v)).transpose()?,
        width: width.map(|v| check_positive_length("shape", v)).transpose()?,
    })
}

pub fn validate_visual_size(visual_size: impl Into<Pair<f64>>) -> Result<VisualSize> {
    let (height, width) = visual_size.into().normalize();
    Ok(VisualSize {
        height: height.map(|v| check_positive("visual_size", v)).transpose()?,
        width: width.map(|v| check_positive("visual_size", v)).transpose()?,
    })
}

pub fn validate_ppd(ppd: impl Into<Pair<f64>>) -> Result<Ppd> {
    let (vertical, horizontal) = ppd.into().normalize();
    Ok(Ppd {
        vertical: vertical.map(|v| check_positive("ppd", v)).transpose()?,
        horizontal: horizontal.map(|v| check_positive("ppd", v)).transpose()?,
    })
}

/// Pixel count covered by `visual_angle` degrees, without reporting.
fn truncated_pixels(visual_angle: f64, ppd: f64) -> f64 {
    round8(visual_angle * ppd).trunc()
}

/// Number of whole pixels spanning `visual_angle` degrees at `ppd`.
///
/// Truncates; a `Truncation` adjustment is attached when the product was not
/// already integral.
pub fn length_from_visual_angle_ppd_1d(visual_angle: f64, ppd: f64) -> Result<Resolved<usize>> {
    let product = round8(visual_angle * ppd);
    let length = product.trunc();
    if length < 1.0 {
        return Err(StimulusError::invalid(
            "length",
            format!("{visual_angle} deg at {ppd} ppd covers less than one pixel"),
        ));
    }
    if product == length {
        Ok(Resolved::exact(length as usize))
    } else {
        Ok(Resolved::with_adjustments(
            length as usize,
            vec![Adjustment::record(
                "length",
                product,
                length,
                AdjustmentReason::Truncation,
            )],
        ))
    }
}

pub fn visual_angle_from_length_ppd_1d(length: usize, ppd: f64) -> f64 {
    length as f64 / ppd
}

pub fn ppd_from_length_visual_angle_1d(length: usize, visual_angle: f64) -> f64 {
    length as f64 / visual_angle
}

/// Solves one axis: exactly one of the three quantities may be unknown.
///
/// With all three known the triple is only checked with [`valid_1d`].
pub fn resolve_1d(
    length: Option<usize>,
    visual_angle: Option<f64>,
    ppd: Option<f64>,
) -> Result<Resolved<(usize, f64, f64)>> {
    let length = length.map(|v| check_positive_length("length", v)).transpose()?;
    let visual_angle = visual_angle
        .map(|v| check_positive("visual_angle", v))
        .transpose()?;
    let ppd = ppd.map(|v| check_positive("ppd", v)).transpose()?;

    match (length, visual_angle, ppd) {
        (Some(length), Some(visual_angle), Some(ppd)) => {
            valid_1d(length, visual_angle, ppd)?;
            Ok(Resolved::exact((length, visual_angle, ppd)))
        }
        (None, Some(visual_angle), Some(ppd)) => Ok(length_from_visual_angle_ppd_1d(
            visual_angle,
            ppd,
        )?
        .map(|length| (length, visual_angle, ppd))),
        (Some(length), None, Some(ppd)) => Ok(Resolved::exact((
            length,
            visual_angle_from_length_ppd_1d(length, ppd),
            ppd,
        ))),
        (Some(length), Some(visual_angle), None) => Ok(Resolved::exact((
            length,
            visual_angle,
            ppd_from_length_visual_angle_1d(length, visual_angle),
        ))),
        _ => Err(StimulusError::TooManyUnknowns {
            quantities: "length, visual_angle, ppd".to_string(),
        }),
    }
}

/// Checks `length == trunc(visual_angle * ppd)` for one axis.
pub fn valid_1d(length: usize, visual_angle: f64, ppd: f64) -> Result<()> {
    let computed = truncated_pixels(visual_angle, ppd);
    if computed == length as f64 {
        Ok(())
    } else {
        Err(StimulusError::Resolution {
            length,
            visual_angle,
            ppd,
            computed: computed.max(0.0) as usize,
        })
    }
}

/// Checks both axes of a fully specified resolution.
pub fn valid_resolution(
    shape: (usize, usize),
    visual_size: (f64, f64),
    ppd: (f64, f64),
) -> Result<()> {
    valid_1d(shape.0, visual_size.0, ppd.0)?;
    valid_1d(shape.1, visual_size.1, ppd.1)
}

fn name_axis(axis: &str, err: StimulusError) -> StimulusError {
    match err {
        StimulusError::TooManyUnknowns { .. } => {
            let quantities = match axis {
                "vertical" => "shape.height, visual_size.height, ppd.vertical",
                _ => "shape.width, visual_size.width, ppd.horizontal",
            };
            StimulusError::TooManyUnknowns {
                quantities: quantities.to_string(),
            }
        }
        other => other,
    }
}

/// Resolves the full (shape, visual_size, ppd) triple.
///
/// Each axis is solved on its own. When one axis lacks only its ppd while the
/// other axis resolved, the other axis's ppd is reused (square pixels).
pub fn resolve(
    shape: impl Into<Pair<usize>>,
    visual_size: impl Into<Pair<f64>>,
    ppd: impl Into<Pair<f64>>,
) -> Result<Resolved<Resolution>> {
    let shape = validate_shape(shape)?;
    let visual_size = validate_visual_size(visual_size)?;
    let ppd = validate_ppd(ppd)?;

    let vertical = resolve_1d(shape.height, visual_size.height, ppd.vertical);
    let horizontal = resolve_1d(shape.width, visual_size.width, ppd.horizontal);

    let (vertical, horizontal) = match (vertical, horizontal) {
        (Ok(vertical), Ok(horizontal)) => (vertical, horizontal),
        (Err(StimulusError::TooManyUnknowns { .. }), Ok(horizontal)) if ppd.vertical.is_none() => {
            let borrowed = Some(horizontal.value.2);
            let vertical = resolve_1d(shape.height, visual_size.height, borrowed)
                .map_err(|err| name_axis("vertical", err))?;
            (vertical, horizontal)
        }
        (Ok(vertical), Err(StimulusError::TooManyUnknowns { .. })) if ppd.horizontal.is_none() => {
            let borrowed = Some(vertical.value.2);
            let horizontal = resolve_1d(shape.width, visual_size.width, borrowed)
                .map_err(|err| name_axis("horizontal", err))?;
            (vertical, horizontal)
        }
        (Err(err), _) => return Err(name_axis("vertical", err)),
        (_, Err(err)) => return Err(name_axis("horizontal", err)),
    };

    let mut adjustments = Vec::new();
    let (height, visual_height, ppd_vertical) = vertical.collect_into(&mut adjustments);
    let (width, visual_width, ppd_horizontal) = horizontal.collect_into(&mut adjustments);

    let resolution = Resolution {
        shape: (height, width),
        visual_size: (visual_height, visual_width),
        ppd: (ppd_vertical, ppd_horizontal),
    };
    valid_resolution(resolution.shape, resolution.visual_size, resolution.ppd)?;
    tracing::debug!(?resolution, "resolution resolved");

    Ok(Resolved::with_adjustments(resolution, adjustments))
}
