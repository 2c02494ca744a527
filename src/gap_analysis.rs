// src/gap_analysis.rs - Gap components and per-image cover statistics

use std::path::PathBuf;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;

use crate::binarise::{CANOPY_VALUE, GAP_VALUE};

/// Gaps covering at most this fraction of the image are counted as crown
pub const LARGE_GAP_FRACTION: f64 = 0.013;

/// Statistics extracted from one photograph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageStatistics {
    pub path: PathBuf,
    pub gap_fraction: f64,
    pub crown_cover: f64,
    pub crown_porosity: f64,
}

/// Pixel count of every gap component in `mask` (8-connected), indexed by
/// label minus one. Canopy pixels form the background and are not counted.
pub fn gap_component_sizes(mask: &GrayImage) -> Vec<usize> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([CANOPY_VALUE]));
    let mut sizes: Vec<usize> = Vec::new();
    for label in labels.pixels().map(|p| p[0] as usize) {
        if label == 0 {
            continue;
        }
        if sizes.len() < label {
            sizes.resize(label, 0);
        }
        sizes[label - 1] += 1;
    }
    sizes
}

/// Compute gap fraction, crown cover and crown porosity for a binary mask.
///
/// Returns `(gap_fraction, crown_cover, crown_porosity)`. Values are not
/// clamped: an empty crown cover gives a non-finite porosity.
pub fn cover_statistics(mask: &GrayImage) -> (f64, f64, f64) {
    let img_size = mask.width() as f64 * mask.height() as f64;
    let gap_pixels = mask.pixels().filter(|p| p[0] == GAP_VALUE).count() as f64;

    let large_gap_pixels: usize = gap_component_sizes(mask)
        .into_iter()
        .filter(|&size| size as f64 / img_size > LARGE_GAP_FRACTION)
        .sum();

    let gap_fraction = gap_pixels / img_size;
    let crown_cover = 1.0 - large_gap_pixels as f64 / img_size;
    let crown_porosity = 1.0 - (1.0 - gap_fraction) / crown_cover;

    (gap_fraction, crown_cover, crown_porosity)
}
