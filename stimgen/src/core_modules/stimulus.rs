// THEORY:
// `Stimulus<P>` is the record every generator returns: the painted image,
// its region mask, the resolution both were built at, the family-specific
// parameters `P`, and every adjustment made while resolving them. The record
// is owned outright by the caller; composition (padding) consumes it and
// returns a new, still-consistent record.

use crate::core_modules::adjustment::Adjustment;
use crate::core_modules::regions::{Image, Mask};
use crate::core_modules::resolution::{Resolution, valid_resolution, visual_angle_from_length_ppd_1d};
use crate::core_modules::utils::padding::{self, Padding};
use crate::error::{Result, StimulusError};

#[derive(Debug, Clone)]
pub struct Stimulus<P> {
    pub img: Image,
    /// Region ids; 0 is background.
    pub mask: Mask,
    pub resolution: Resolution,
    pub params: P,
    pub adjustments: Vec<Adjustment>,
}

impl<P> Stimulus<P> {
    pub fn new(img: Image, mask: Mask, resolution: Resolution, params: P) -> Result<Self> {
        if img.dim() != mask.dim() || img.dim() != resolution.shape {
            return Err(StimulusError::Geometry(format!(
                "image {:?}, mask {:?} and resolution {:?} disagree on shape",
                img.dim(),
                mask.dim(),
                resolution.shape
            )));
        }
        Ok(Self {
            img,
            mask,
            resolution,
            params,
            adjustments: Vec::new(),
        })
    }

    pub fn with_adjustments(mut self, adjustments: Vec<Adjustment>) -> Self {
        self.adjustments.extend(adjustments);
        self
    }

    /// Swaps in padded arrays and recomputes the visual size at the same ppd.
    fn repadded(self, img: Image, mask: Mask) -> Result<Self> {
        let shape = img.dim();
        let ppd = self.resolution.ppd;
        let resolution = Resolution {
            shape,
            visual_size: (
                visual_angle_from_length_ppd_1d(shape.0, ppd.0),
                visual_angle_from_length_ppd_1d(shape.1, ppd.1),
            ),
            ppd,
        };
        valid_resolution(resolution.shape, resolution.visual_size, resolution.ppd)?;
        Ok(Self {
            img,
            mask,
            resolution,
            params: self.params,
            adjustments: self.adjustments,
        })
    }

    /// Pads the image with `intensity` and the mask with background.
    pub fn pad_by_visual_size(self, padding: Padding, intensity: f64) -> Result<Self> {
        let mut adjustments = Vec::new();
        let pixels =
            padding::padding_pixels(padding, self.resolution.ppd)?.collect_into(&mut adjustments);
        let img = padding::pad_pixels(&self.img, pixels, intensity);
        let mask = padding::pad_pixels(&self.mask, pixels, 0);
        let mut padded = self.repadded(img, mask)?;
        padded.adjustments.extend(adjustments);
        Ok(padded)
    }

    pub fn pad_to_shape(self, shape: (usize, usize), intensity: f64) -> Result<Self> {
        let img = padding::pad_to_shape(&self.img, shape, intensity)?;
        let mask = padding::pad_to_shape(&self.mask, shape, 0)?;
        self.repadded(img, mask)
    }
}
