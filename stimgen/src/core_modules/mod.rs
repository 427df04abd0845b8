pub mod adjustment;
pub mod checkerboard;
pub mod grating;
pub mod image_base;
pub mod regions;
pub mod resolution;
pub mod stimulus;
pub mod utils;
