// THEORY:
// This file is the main entry point for the `stimgen` library crate. It
// exports the `StimulusPipeline` and its configuration as the high-level
// interface, and the individual solvers in `core_modules` for callers that
// need only one stage: the resolution resolver, the grating parameter
// resolver, the coordinate base, the region painter and the checkerboard
// factory.
//
// Every fallible call returns `error::Result`; every quantisation change is
// returned alongside the value as a list of `Adjustment`s.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use core_modules::adjustment::{Adjustment, AdjustmentReason, Resolved};
pub use core_modules::checkerboard::{CheckerboardFactory, CheckerboardParams};
pub use core_modules::grating::{GratingParams, GratingRequest, Period, resolve_grating_params, round_n_phases};
pub use core_modules::image_base::{DistanceMetric, ImageBase, Origin, image_base};
pub use core_modules::regions::{Image, Mask, draw_regions, mask_elements, mask_regions};
pub use core_modules::resolution::{Pair, Ppd, Resolution, Shape, VisualSize, resolve, valid_resolution};
pub use core_modules::stimulus::Stimulus;
pub use error::{Result, StimulusError};
pub use pipeline::{Partition, PipelineConfig, RegionParams, StimulusPipeline};
