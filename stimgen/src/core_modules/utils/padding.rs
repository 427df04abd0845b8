//! Padding and stacking of stimulus arrays.
//!
//! Padding sizes given in degrees go through the same truncating
//! degrees-to-pixels conversion as the resolution layer.

use crate::core_modules::adjustment::{Adjustment, AdjustmentReason, Resolved};
use crate::core_modules::utils::round8;
use crate::error::{Result, StimulusError};
use ndarray::{Array2, ArrayView2, Axis, concatenate, s};
use serde::{Deserialize, Serialize};

/// Padding per side, in degrees of visual angle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Padding {
    pub fn uniform(degrees: f64) -> Self {
        Self::symmetric(degrees, degrees)
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            bottom: vertical,
            left: horizontal,
            right: horizontal,
        }
    }
}

/// Pixel padding per side: (top, bottom, left, right).
pub type PixelPadding = (usize, usize, usize, usize);

pub fn pad_pixels<T: Clone>(array: &Array2<T>, padding: PixelPadding, value: T) -> Array2<T> {
    let (top, bottom, left, right) = padding;
    let (height, width) = array.dim();
    let mut padded = Array2::from_elem((height + top + bottom, width + left + right), value);
    padded
        .slice_mut(s![top..top + height, left..left + width])
        .assign(array);
    padded
}

/// Centres `array` in a `(height, width)` canvas; odd leftovers go to the bottom/right.
pub fn pad_to_shape<T: Clone>(array: &Array2<T>, shape: (usize, usize), value: T) -> Result<Array2<T>> {
    let (height, width) = array.dim();
    if shape.0 < height || shape.1 < width {
        return Err(StimulusError::Geometry(format!(
            "cannot pad a {height}x{width} array to the smaller shape {}x{}",
            shape.0, shape.1
        )));
    }
    let top = (shape.0 - height) / 2;
    let left = (shape.1 - width) / 2;
    Ok(pad_pixels(
        array,
        (top, shape.0 - height - top, left, shape.1 - width - left),
        value,
    ))
}

fn side_pixels(
    side: &'static str,
    degrees: f64,
    ppd: f64,
    adjustments: &mut Vec<Adjustment>,
) -> Result<usize> {
    if !(degrees.is_finite() && degrees >= 0.0) {
        return Err(StimulusError::invalid(
            side,
            format!("padding of {degrees} deg is not a non-negative number"),
        ));
    }
    let product = round8(degrees * ppd);
    let pixels = product.trunc();
    if product != pixels {
        adjustments.push(Adjustment::record(
            side,
            product,
            pixels,
            AdjustmentReason::Truncation,
        ));
    }
    Ok(pixels as usize)
}

/// Converts padding in degrees to whole pixels; `ppd` is (vertical, horizontal).
pub fn padding_pixels(padding: Padding, ppd: (f64, f64)) -> Result<Resolved<PixelPadding>> {
    let mut adjustments = Vec::new();
    let pixels = (
        side_pixels("padding.top", padding.top, ppd.0, &mut adjustments)?,
        side_pixels("padding.bottom", padding.bottom, ppd.0, &mut adjustments)?,
        side_pixels("padding.left", padding.left, ppd.1, &mut adjustments)?,
        side_pixels("padding.right", padding.right, ppd.1, &mut adjustments)?,
    );
    Ok(Resolved::with_adjustments(pixels, adjustments))
}

/// Pads by a size in degrees; `ppd` is (vertical, horizontal).
pub fn pad_by_visual_size<T: Clone>(
    array: &Array2<T>,
    padding: Padding,
    ppd: (f64, f64),
    value: T,
) -> Result<Resolved<Array2<T>>> {
    Ok(padding_pixels(padding, ppd)?.map(|pixels| pad_pixels(array, pixels, value)))
}

fn stack<T: Clone>(arrays: &[Array2<T>], axis: Axis) -> Result<Array2<T>> {
    let views: Vec<ArrayView2<T>> = arrays.iter().map(|array| array.view()).collect();
    concatenate(axis, &views).map_err(|err| {
        StimulusError::Geometry(format!("cannot stack arrays along axis {}: {err}", axis.index()))
    })
}

/// Places arrays side by side; all must share the same height.
pub fn stack_horizontal<T: Clone>(arrays: &[Array2<T>]) -> Result<Array2<T>> {
    stack(arrays, Axis(1))
}

/// Places arrays on top of each other; all must share the same width.
pub fn stack_vertical<T: Clone>(arrays: &[Array2<T>]) -> Result<Array2<T>> {
    stack(arrays, Axis(0))
}
