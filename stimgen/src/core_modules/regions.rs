// THEORY:
// Regions are cut from a distance array by a non-decreasing list of edges.
// A pixel belongs to region `k` (1-based) when its distance is at most
// `edges[k-1]` and greater than every earlier edge; pixels beyond the last
// edge stay 0, the background. Because the edges are sorted, the region index
// is a partition point search per pixel.
//
// `draw_regions` is the single painter every region-based image goes
// through. It walks the sorted unique non-zero region ids and hands out the
// intensities round-robin, so two intensities over five rings give an
// alternating bullseye.

use crate::core_modules::image_base::{DistanceMetric, ImageBase};
use crate::error::{Result, StimulusError};
use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};

/// Region ids per pixel; 0 is background.
pub type Mask = Array2<u32>;
/// Intensity per pixel.
pub type Image = Array2<f64>;

fn validate_edges(edges: &[f64]) -> Result<()> {
    if let Some(edge) = edges.iter().find(|edge| !edge.is_finite()) {
        return Err(StimulusError::invalid("edges", format!("{edge} is not a finite number")));
    }
    if let Some(pair) = edges.windows(2).find(|pair| pair[1] < pair[0]) {
        return Err(StimulusError::invalid(
            "edges",
            format!("must be non-decreasing, found {} after {}", pair[1], pair[0]),
        ));
    }
    Ok(())
}

/// Labels every pixel with the 1-based index of the first edge it falls within.
pub fn mask_regions(distances: &Array2<f64>, edges: &[f64]) -> Result<Mask> {
    validate_edges(edges)?;
    Ok(distances.mapv(|distance| {
        let index = edges.partition_point(|&edge| edge < distance);
        if index < edges.len() {
            index as u32 + 1
        } else {
            0
        }
    }))
}

/// [`mask_regions`] on one of the base's distance arrays.
pub fn mask_elements(base: &ImageBase, metric: DistanceMetric, edges: &[f64]) -> Result<Mask> {
    mask_regions(base.distances(metric), edges)
}

/// Paints an image from a mask, cycling `intensities` over the sorted
/// non-zero region ids; background pixels get `intensity_background`.
pub fn draw_regions(mask: &Mask, intensities: &[f64], intensity_background: f64) -> Result<Image> {
    let regions: BTreeSet<u32> = mask.iter().copied().filter(|&id| id != 0).collect();
    if !regions.is_empty() && intensities.is_empty() {
        return Err(StimulusError::invalid(
            "intensities",
            format!("{} regions to paint but no intensities given", regions.len()),
        ));
    }

    let lookup: HashMap<u32, f64> = regions
        .into_iter()
        .zip(intensities.iter().copied().cycle())
        .collect();

    Ok(mask.mapv(|id| {
        if id == 0 {
            intensity_background
        } else {
            lookup.get(&id).copied().unwrap_or(intensity_background)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::image_base::{Origin, image_base};
    use crate::core_modules::resolution::Pair;
    use ndarray::array;

    #[test]
    fn first_matching_edge_wins() {
        let distances = array![[0.0, 1.0, 1.5], [2.0, 2.5, 3.5]];
        let mask = mask_regions(&distances, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(mask, array![[1, 1, 2], [2, 3, 0]]);
    }

    #[test]
    fn repeated_edges_leave_empty_regions() {
        let distances = array![[0.5, 1.0, 1.2]];
        let mask = mask_regions(&distances, &[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(mask, array![[1, 1, 3]]);
    }

    #[test]
    fn decreasing_edges_are_rejected() {
        let distances = array![[0.0]];
        assert!(mask_regions(&distances, &[2.0, 1.0]).is_err());
        assert!(mask_regions(&distances, &[f64::NAN]).is_err());
        assert!(mask_regions(&distances, &[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn no_edges_is_all_background() {
        let distances = array![[0.0, 4.0]];
        let mask = mask_regions(&distances, &[]).unwrap();
        assert!(mask.iter().all(|&id| id == 0));
    }

    #[test]
    fn radial_mask_forms_rings() {
        let base = image_base((9usize, 9usize), Pair::Unspecified, 1.0, 0.0, Origin::Center)
            .unwrap()
            .value;
        let mask = mask_elements(&base, DistanceMetric::Radial, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(mask[[4, 4]], 1);
        assert_eq!(mask[[4, 5]], 1);
        assert_eq!(mask[[4, 6]], 2);
        assert_eq!(mask[[4, 7]], 3);
        assert_eq!(mask[[0, 0]], 0);
    }

    #[test]
    fn intensities_cycle_over_regions() {
        let mask = array![[0, 1, 2], [3, 3, 0]];
        let img = draw_regions(&mask, &[0.2, 0.8], 0.5).unwrap();
        assert_eq!(img, array![[0.5, 0.2, 0.8], [0.2, 0.2, 0.5]]);
    }

    #[test]
    fn region_ids_need_not_be_contiguous() {
        let mask = array![[7, 2, 0]];
        let img = draw_regions(&mask, &[1.0, 0.0], -1.0).unwrap();
        assert_eq!(img, array![[0.0, 1.0, -1.0]]);
    }

    #[test]
    fn regions_without_intensities_fail() {
        let mask = array![[1, 0]];
        assert!(draw_regions(&mask, &[], 0.5).is_err());
        let background_only = array![[0u32, 0]];
        let img = draw_regions(&background_only, &[], 0.5).unwrap();
        assert!(img.iter().all(|&v| v == 0.5));
    }
}
