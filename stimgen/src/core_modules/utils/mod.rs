pub mod image_helper;
pub mod padding;

/// Decimals kept when comparing or storing derived floating-point quantities.
pub const DECIMALS: i32 = 8;

/// Rounds to [`DECIMALS`] places to absorb floating-point accumulation drift.
pub fn round8(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMALS);
    (value * scale).round() / scale
}

/// Equality up to the precision kept by [`round8`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    round8(a) == round8(b)
}
