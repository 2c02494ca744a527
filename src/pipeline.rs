// src/pipeline.rs - Per-image processing and the batch entry points

use std::path::Path;

use tracing::{debug, info};

use crate::aggregate::{aggregate, CoverResults};
use crate::binarise::binarise;
use crate::errors::Result;
use crate::gap_analysis::{cover_statistics, ImageStatistics};
use crate::image_io::{bin_image_path, list_images, load_image, save_mask};
use crate::image_utils::downsample;
use crate::uncertain::UFloat;
use crate::validation::{validate_inputs, ProcessOptions};

/// Process a single photograph into its gap statistics.
///
/// Decodes, downsamples, binarises, optionally writes the mask next to the
/// source as `<name>_bin.png`, then measures the gap components.
pub fn process_image(path: &Path, options: &ProcessOptions) -> Result<ImageStatistics> {
    let decoded = load_image(path, options.pre_process_raw)?;
    let image = downsample(&decoded, options.down_factor);
    let (width, height) = image.dimensions();
    debug!(
        "{}: {}x{} after downsampling by {}",
        path.display(),
        width,
        height,
        options.down_factor
    );

    let mask = binarise(&image, options.direction);

    if options.save_bin_img {
        let bin_path = bin_image_path(path);
        save_mask(&mask, &bin_path)?;
        debug!("Saved binary image to {}", bin_path.display());
    }

    let (gap_fraction, crown_cover, crown_porosity) = cover_statistics(&mask);
    debug!(
        "{}: gap fraction {:.4}, crown cover {:.4}, crown porosity {:.4}",
        path.display(),
        gap_fraction,
        crown_cover,
        crown_porosity
    );

    Ok(ImageStatistics {
        path: path.to_path_buf(),
        gap_fraction,
        crown_cover,
        crown_porosity,
    })
}

/// Process every image in `img_dir` and return the per-image statistics in
/// processing order. The first failure aborts the run.
pub fn collect_statistics(img_dir: &Path, options: &ProcessOptions) -> Result<Vec<ImageStatistics>> {
    let images = list_images(img_dir)?;
    info!(
        "Processing {} image(s) from {} (direction={}, down_factor={}, pre_process_raw={})",
        images.len(),
        img_dir.display(),
        options.direction,
        options.down_factor,
        options.pre_process_raw
    );

    images
        .iter()
        .map(|path| process_image(path, options))
        .collect()
}

/// Estimate canopy indices for a directory with already validated options
pub fn process_with_options(img_dir: &Path, options: &ProcessOptions) -> Result<CoverResults> {
    let stats = collect_statistics(img_dir, options)?;
    aggregate(&stats, &options.k)
}

/// Estimate PAIe, PAI, clumping, FCOVER, crown cover and crown porosity from
/// the photographs in `img_dir`.
///
/// Arguments are validated before the directory is read; see
/// [`validate_inputs`] for the accepted values.
pub fn process(
    img_dir: &str,
    k: &UFloat,
    direction: &str,
    down_factor: i64,
    pre_process_raw: bool,
    save_bin_img: bool,
) -> Result<CoverResults> {
    let options = validate_inputs(img_dir, k, direction, down_factor, pre_process_raw, save_bin_img)?;
    process_with_options(Path::new(img_dir), &options)
}
