// THEORY:
// The `pipeline` module is the top-level API of the stimulus engine. It runs
// the full stack for a region-based stimulus in one call:
//
//   resolve -> (grating parameters along the partitioned axis) -> image base
//           -> region mask -> painted image
//
// Every stage reports its quantisation adjustments, and the pipeline gathers
// them onto the returned `Stimulus` so callers can inspect or reject them.
//
// A grating partition is solved along the axis the metric runs on. Linear
// metrics measure the projected extent of the image, and their distances are
// shifted so the first phase begins at the leading image edge. Each pixel is
// measured at its trailing edge there, so a phase of `p` pixels holds exactly
// `p` pixels. Radial and cityblock metrics use the shorter image side, halved
// when the origin sits inside the image.

use crate::core_modules::adjustment::Resolved;
use crate::core_modules::grating::{GratingParams, GratingRequest, resolve_grating_params};
use crate::core_modules::image_base::{DistanceMetric, ImageBase, Origin};
use crate::core_modules::regions::{draw_regions, mask_regions};
use crate::core_modules::resolution::{Ppd, Resolution, Shape, VisualSize, resolve};
use crate::core_modules::stimulus::Stimulus;
use crate::core_modules::utils::round8;
use crate::error::{Result, StimulusError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

// Re-export key data structures for the public API.
pub use crate::core_modules::adjustment::{Adjustment, AdjustmentReason};
pub use crate::core_modules::utils::padding::Padding;

fn default_intensity_background() -> f64 {
    0.5
}

/// How the distance array is cut into regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Explicit edges in the metric's unit (degrees, or radians for `Angular`).
    Edges(Vec<f64>),
    /// Equal-width phases solved from a grating request.
    Grating(GratingRequest),
    /// `n` equal angular segments; `Angular` only.
    Segments(usize),
}

/// Configuration for the StimulusPipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub visual_size: VisualSize,
    #[serde(default)]
    pub ppd: Ppd,
    pub metric: DistanceMetric,
    #[serde(default)]
    pub origin: Origin,
    /// Degrees, counter-clockwise.
    #[serde(default)]
    pub rotation: f64,
    pub partition: Partition,
    pub intensities: Vec<f64>,
    #[serde(default = "default_intensity_background")]
    pub intensity_background: f64,
}

/// Parameters carried by a rendered region stimulus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionParams {
    pub metric: DistanceMetric,
    pub origin: Origin,
    pub rotation: f64,
    /// Edges actually applied to the (possibly shifted) distances.
    pub edges: Vec<f64>,
    /// Present when the partition was a grating.
    pub grating: Option<GratingParams>,
    pub intensities: Vec<f64>,
    pub intensity_background: f64,
}

/// The partitioned axis of a grating: its pixel length and ppd.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GratingAxis {
    pub length: usize,
    pub ppd: f64,
    /// Subtracted from the metric's distances before masking.
    pub shift: f64,
}

pub struct StimulusPipeline {
    config: PipelineConfig,
}

impl StimulusPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self) -> Result<Resolved<Resolution>> {
        resolve(self.config.shape, self.config.visual_size, self.config.ppd)
    }

    /// Axis along which a grating partition is solved for `base`.
    pub fn grating_axis(&self, base: &ImageBase) -> Result<GratingAxis> {
        let resolution = &base.resolution;
        let (ppd_vertical, ppd_horizontal) = resolution.ppd;
        let metric = self.config.metric;

        if metric.is_linear() {
            let distances = base.distances(metric);
            let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
            let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let (length, ppd) = match metric {
                DistanceMetric::Horizontal => (resolution.width(), ppd_horizontal),
                DistanceMetric::Vertical => (resolution.height(), ppd_vertical),
                _ => {
                    // Projected extent in pixel steps; ppd follows from the extent in degrees.
                    let (sin, cos) = base.rotation.to_radians().sin_cos();
                    let steps = cos.abs() * (resolution.width() - 1) as f64
                        + sin.abs() * (resolution.height() - 1) as f64;
                    let steps = steps.round();
                    let extent = round8(max - min);
                    let ppd = if steps > 0.0 && extent > 0.0 {
                        round8(steps / extent)
                    } else {
                        ppd_horizontal
                    };
                    (steps as usize + 1, ppd)
                }
            };
            return Ok(GratingAxis {
                length,
                ppd,
                shift: min - 1.0 / ppd,
            });
        }

        match metric {
            DistanceMetric::Angular => Err(StimulusError::invalid(
                "partition",
                "the angular metric takes edges or segments, not a grating",
            )),
            _ => {
                let (side, ppd) = if resolution.height() <= resolution.width() {
                    (resolution.height(), ppd_vertical)
                } else {
                    (resolution.width(), ppd_horizontal)
                };
                let length = if self.config.origin == Origin::Corner {
                    side
                } else {
                    side / 2
                };
                if length == 0 {
                    return Err(StimulusError::Geometry(format!(
                        "a {}x{} image leaves no room for a grating from its centre",
                        resolution.height(),
                        resolution.width()
                    )));
                }
                Ok(GratingAxis {
                    length,
                    ppd,
                    shift: 0.0,
                })
            }
        }
    }

    /// Edges and the distances they apply to, plus grating parameters when solved.
    fn partition(
        &self,
        base: &ImageBase,
        adjustments: &mut Vec<Adjustment>,
    ) -> Result<(Vec<f64>, Array2<f64>, Option<GratingParams>)> {
        let metric = self.config.metric;
        let distances = base.distances(metric);
        match &self.config.partition {
            Partition::Edges(edges) => Ok((edges.clone(), distances.clone(), None)),
            Partition::Segments(n) => {
                if metric != DistanceMetric::Angular {
                    return Err(StimulusError::invalid(
                        "partition",
                        format!("segments need the angular metric, not {metric:?}"),
                    ));
                }
                if *n == 0 {
                    return Err(StimulusError::invalid("partition", "need at least one segment"));
                }
                let edges = (1..=*n)
                    .map(|k| round8(k as f64 * TAU / *n as f64))
                    .collect();
                Ok((edges, distances.clone(), None))
            }
            Partition::Grating(request) => {
                let axis = self.grating_axis(base)?;
                let request = GratingRequest {
                    length: request.length.or(Some(axis.length)),
                    ppd: request.ppd.or(Some(axis.ppd)),
                    ..request.clone()
                };
                let params = resolve_grating_params(&request)?.collect_into(adjustments);
                let shifted = distances.mapv(|d| round8(d - axis.shift));
                Ok((params.edges.clone(), shifted, Some(params)))
            }
        }
    }

    /// Runs the full pipeline.
    pub fn render(&self) -> Result<Stimulus<RegionParams>> {
        let config = &self.config;
        if !config.rotation.is_finite() {
            return Err(StimulusError::invalid(
                "rotation",
                format!("{} is not a finite angle", config.rotation),
            ));
        }

        let mut adjustments = Vec::new();
        let resolution = self.resolve()?.collect_into(&mut adjustments);
        let base = ImageBase::from_resolution(&resolution, config.rotation, config.origin);

        let (edges, distances, grating) = self.partition(&base, &mut adjustments)?;
        let mask = mask_regions(&distances, &edges)?;
        let img = draw_regions(&mask, &config.intensities, config.intensity_background)?;
        tracing::debug!(
            metric = ?config.metric,
            regions = edges.len(),
            adjustments = adjustments.len(),
            "stimulus rendered"
        );

        let params = RegionParams {
            metric: config.metric,
            origin: config.origin,
            rotation: config.rotation,
            edges,
            grating,
            intensities: config.intensities.clone(),
            intensity_background: config.intensity_background,
        };
        Ok(Stimulus::new(img, mask, resolution, params)?.with_adjustments(adjustments))
    }
}
