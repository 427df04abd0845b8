// THEORY:
// The image base is the set of per-pixel distance arrays that every region
// mask is cut from. Each array measures, in degrees of visual angle, how far
// a pixel lies from the chosen origin under a different metric. Region masks
// are obtained by thresholding one of these arrays against a list of edges
// (see `regions`), so a linear grating, a bullseye, a set of square frames and
// a pinwheel differ only in which array they threshold.
//
// Coordinates: columns grow to the right, rows grow downward. For an axis with
// `n` pixels at `ppd` pixels per degree, pixel `j` sits at
//
//   Corner  j / ppd                    top-left pixel is the origin
//   Mean    (j - (n - 1) / 2) / ppd    geometric centre, may fall between pixels
//   Center  (j - floor(n / 2)) / ppd   nearest real pixel to the centre
//
// All arrays are rounded to 8 decimals so that thresholds on exact edge
// values behave the same regardless of floating-point drift.

use crate::core_modules::adjustment::Resolved;
use crate::core_modules::resolution::{Pair, Resolution, resolve};
use crate::core_modules::utils::round8;
use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::str::FromStr;

/// Reference point of the coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Corner,
    #[default]
    Mean,
    Center,
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "corner" => Ok(Origin::Corner),
            "mean" => Ok(Origin::Mean),
            "center" | "centre" => Ok(Origin::Center),
            other => Err(format!(
                "invalid origin '{other}', expected corner|mean|center"
            )),
        }
    }
}

impl Origin {
    /// Position of pixel `index` on an axis of `count` pixels, in pixels.
    fn offset(self, index: usize, count: usize) -> f64 {
        match self {
            Origin::Corner => index as f64,
            Origin::Mean => index as f64 - (count as f64 - 1.0) / 2.0,
            Origin::Center => index as f64 - (count / 2) as f64,
        }
    }
}

/// Which distance array of an [`ImageBase`] to threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Horizontal,
    Vertical,
    Radial,
    Angular,
    Cityblock,
    Rotated,
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" => Ok(DistanceMetric::Horizontal),
            "vertical" => Ok(DistanceMetric::Vertical),
            "radial" => Ok(DistanceMetric::Radial),
            "angular" => Ok(DistanceMetric::Angular),
            "cityblock" => Ok(DistanceMetric::Cityblock),
            "rotated" => Ok(DistanceMetric::Rotated),
            other => Err(format!(
                "invalid distance metric '{other}', expected horizontal|vertical|radial|angular|cityblock|rotated"
            )),
        }
    }
}

impl DistanceMetric {
    /// Metrics whose distances run along a straight line across the image.
    pub fn is_linear(self) -> bool {
        matches!(
            self,
            DistanceMetric::Horizontal | DistanceMetric::Vertical | DistanceMetric::Rotated
        )
    }
}

/// Per-pixel distance arrays for one resolution, origin and rotation.
#[derive(Debug, Clone)]
pub struct ImageBase {
    pub resolution: Resolution,
    pub origin: Origin,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Signed distance along the columns, degrees.
    pub horizontal: Array2<f64>,
    /// Signed distance along the rows (downward), degrees.
    pub vertical: Array2<f64>,
    /// Euclidean distance, degrees.
    pub radial: Array2<f64>,
    /// Angle in `[0, 2π)`, 0 at 3 o'clock, counter-clockwise, offset by `rotation`.
    pub angular: Array2<f64>,
    /// L∞ distance `max(|x|, |y|)`; its contours are squares.
    pub cityblock: Array2<f64>,
    /// Projection onto the direction `rotation` degrees counter-clockwise of horizontal.
    pub rotated: Array2<f64>,
}

impl ImageBase {
    pub fn from_resolution(resolution: &Resolution, rotation: f64, origin: Origin) -> Self {
        let (height, width) = resolution.shape;
        let (ppd_vertical, ppd_horizontal) = resolution.ppd;
        let theta = rotation.to_radians();
        let (sin, cos) = theta.sin_cos();

        let xs: Vec<f64> = (0..width)
            .map(|j| origin.offset(j, width) / ppd_horizontal)
            .collect();
        let ys: Vec<f64> = (0..height)
            .map(|i| origin.offset(i, height) / ppd_vertical)
            .collect();

        let horizontal = Array2::from_shape_fn((height, width), |(_, j)| round8(xs[j]));
        let vertical = Array2::from_shape_fn((height, width), |(i, _)| round8(ys[i]));
        let radial = Array2::from_shape_fn((height, width), |(i, j)| round8(xs[j].hypot(ys[i])));
        let angular = Array2::from_shape_fn((height, width), |(i, j)| {
            let angle = round8(((-ys[i]).atan2(xs[j]) - theta).rem_euclid(TAU));
            if angle >= round8(TAU) { 0.0 } else { angle }
        });
        let cityblock =
            Array2::from_shape_fn((height, width), |(i, j)| round8(xs[j].abs().max(ys[i].abs())));
        let rotated =
            Array2::from_shape_fn((height, width), |(i, j)| round8(xs[j] * cos - ys[i] * sin));

        Self {
            resolution: *resolution,
            origin,
            rotation,
            horizontal,
            vertical,
            radial,
            angular,
            cityblock,
            rotated,
        }
    }

    pub fn distances(&self, metric: DistanceMetric) -> &Array2<f64> {
        match metric {
            DistanceMetric::Horizontal => &self.horizontal,
            DistanceMetric::Vertical => &self.vertical,
            DistanceMetric::Radial => &self.radial,
            DistanceMetric::Angular => &self.angular,
            DistanceMetric::Cityblock => &self.cityblock,
            DistanceMetric::Rotated => &self.rotated,
        }
    }
}

/// Resolves the resolution and builds the distance arrays for it.
pub fn image_base(
    shape: impl Into<Pair<usize>>,
    visual_size: impl Into<Pair<f64>>,
    ppd: impl Into<Pair<f64>>,
    rotation: f64,
    origin: Origin,
) -> Result<Resolved<ImageBase>> {
    let resolved = resolve(shape, visual_size, ppd)?;
    Ok(resolved.map(|resolution| ImageBase::from_resolution(&resolution, rotation, origin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn base(shape: (usize, usize), ppd: f64, rotation: f64, origin: Origin) -> ImageBase {
        image_base(shape, Pair::Unspecified, ppd, rotation, origin)
            .unwrap()
            .value
    }

    #[test]
    fn corner_origin_starts_at_zero() {
        let base = base((4, 6), 2.0, 0.0, Origin::Corner);
        assert_eq!(base.horizontal[[0, 0]], 0.0);
        assert_eq!(base.horizontal[[3, 5]], 2.5);
        assert_eq!(base.vertical[[3, 0]], 1.5);
        assert_eq!(base.radial[[0, 0]], 0.0);
    }

    #[test]
    fn mean_origin_is_symmetric() {
        let base = base((4, 4), 1.0, 0.0, Origin::Mean);
        assert_eq!(base.horizontal[[0, 0]], -1.5);
        assert_eq!(base.horizontal[[0, 3]], 1.5);
        assert_eq!(base.vertical[[0, 0]], -1.5);
        assert!(base.radial.iter().all(|&r| r > 0.0));
    }

    #[test]
    fn center_origin_snaps_to_a_pixel() {
        let base = base((4, 4), 1.0, 0.0, Origin::Center);
        assert_eq!(base.horizontal[[2, 2]], 0.0);
        assert_eq!(base.radial[[2, 2]], 0.0);
        assert_eq!(base.horizontal[[0, 0]], -2.0);
        assert_eq!(base.horizontal[[0, 3]], 1.0);
    }

    #[test]
    fn angular_starts_at_three_oclock_and_turns_counter_clockwise() {
        let base = base((5, 5), 1.0, 0.0, Origin::Center);
        // right of centre
        assert_eq!(base.angular[[2, 4]], 0.0);
        // above centre (row index decreases upward)
        assert_eq!(base.angular[[0, 2]], round8(FRAC_PI_2));
        // left of centre
        assert_eq!(base.angular[[2, 0]], round8(PI));
        assert!(base.angular.iter().all(|&a| (0.0..TAU).contains(&a)));
    }

    #[test]
    fn rotation_offsets_the_angle() {
        let base = base((5, 5), 1.0, 90.0, Origin::Center);
        assert_eq!(base.angular[[0, 2]], 0.0);
        assert_eq!(base.angular[[2, 4]], round8(3.0 * FRAC_PI_2));
    }

    #[test]
    fn cityblock_has_square_contours() {
        let base = base((5, 5), 1.0, 0.0, Origin::Center);
        assert_eq!(base.cityblock[[0, 0]], 2.0);
        assert_eq!(base.cityblock[[0, 2]], 2.0);
        assert_eq!(base.cityblock[[1, 3]], 1.0);
    }

    #[test]
    fn rotated_matches_horizontal_without_rotation() {
        let base = base((3, 7), 3.0, 0.0, Origin::Mean);
        assert_eq!(base.rotated, base.horizontal);

        let turned = super::ImageBase::from_resolution(&base.resolution, 90.0, Origin::Mean);
        let upward = turned.vertical.mapv(|v| round8(-v));
        assert_eq!(turned.rotated, upward);
    }

    #[test]
    fn distances_selects_metric() {
        let base = base((2, 2), 1.0, 0.0, Origin::Corner);
        assert_eq!(base.distances(DistanceMetric::Radial), &base.radial);
        assert!(DistanceMetric::Rotated.is_linear());
        assert!(!DistanceMetric::Angular.is_linear());
        assert_eq!("cityblock".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cityblock);
    }
}
