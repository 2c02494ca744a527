use image::{Rgb, Rgb32FImage};

use crate::image_io::DecodedImage;

/// Band index of the blue channel
pub const BLUE_BAND: usize = 2;

/// Reduce resolution by averaging non-overlapping `factor` x `factor` blocks,
/// each band independently.
///
/// Blocks that run past the right or bottom edge are padded with zeros before
/// averaging, so the output is `ceil(width / factor)` by
/// `ceil(height / factor)`. A factor of 1 (or 0) returns the image unchanged.
pub fn downsample(image: &DecodedImage, factor: u32) -> DecodedImage {
    if factor <= 1 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let out_width = width.div_ceil(factor);
    let out_height = height.div_ceil(factor);
    let block_area = (factor as f64) * (factor as f64);

    let pixels = Rgb32FImage::from_fn(out_width, out_height, |bx, by| {
        let mut sums = [0.0f64; 3];
        let x_end = ((bx + 1) * factor).min(width);
        let y_end = ((by + 1) * factor).min(height);
        for y in by * factor..y_end {
            for x in bx * factor..x_end {
                let p = image.pixels.get_pixel(x, y);
                for (sum, &v) in sums.iter_mut().zip(p.0.iter()) {
                    *sum += v as f64;
                }
            }
        }
        Rgb(sums.map(|s| (s / block_area) as f32))
    });

    DecodedImage {
        pixels,
        integer_samples: false,
    }
}

/// Copy one band out as a row-major vector
pub fn extract_band(image: &Rgb32FImage, band: usize) -> Vec<f32> {
    image.pixels().map(|p| p[band]).collect()
}
