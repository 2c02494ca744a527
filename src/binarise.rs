// src/binarise.rs - Canopy/gap classification of a decoded photograph

use image::{GrayImage, Luma};
use tracing::debug;

use crate::image_io::DecodedImage;
use crate::image_utils::{extract_band, BLUE_BAND};
use crate::validation::Direction;

/// Mask value for gap pixels
pub const GAP_VALUE: u8 = 255;
/// Mask value for canopy pixels
pub const CANOPY_VALUE: u8 = 0;

/// Number of histogram bins for rasters with fractional samples
const FLOAT_HISTOGRAM_BINS: usize = 256;

/// Classify every pixel as gap (255) or canopy (0).
///
/// Upward photographs threshold the blue band with the isodata method;
/// downward photographs compare excess green against excess red.
pub fn binarise(image: &DecodedImage, direction: Direction) -> GrayImage {
    let (width, height) = image.dimensions();

    match direction {
        Direction::Up => {
            let blue = extract_band(&image.pixels, BLUE_BAND);
            let threshold = isodata_threshold(&blue, image.integer_samples);
            debug!("Isodata threshold on blue band: {}", threshold);
            GrayImage::from_fn(width, height, |x, y| {
                let gap = image.pixels.get_pixel(x, y)[BLUE_BAND] as f64 > threshold;
                Luma([if gap { GAP_VALUE } else { CANOPY_VALUE }])
            })
        }
        Direction::Down => GrayImage::from_fn(width, height, |x, y| {
            let p = image.pixels.get_pixel(x, y);
            let gap = !is_vegetation(p[0] as f64, p[1] as f64, p[2] as f64);
            Luma([if gap { GAP_VALUE } else { CANOPY_VALUE }])
        }),
    }
}

/// Excess green minus excess red is non-negative for vegetation
#[inline]
pub fn is_vegetation(r: f64, g: f64, b: f64) -> bool {
    let excess_green = 2.0 * g - r - b;
    let excess_red = 1.4 * r - g;
    excess_green - excess_red >= 0.0
}

/// Histogram of `values` as (counts, bin centres, bin width).
///
/// Integer rasters get one bin per integer between the minimum and maximum;
/// fractional rasters get `FLOAT_HISTOGRAM_BINS` equal bins over the range.
fn histogram(values: &[f32], integer_samples: bool, min: f64, max: f64) -> (Vec<f64>, Vec<f64>, f64) {
    if integer_samples {
        let n_bins = (max - min) as usize + 1;
        let mut counts = vec![0.0; n_bins];
        for &v in values {
            counts[(v as f64 - min) as usize] += 1.0;
        }
        let centres = (0..n_bins).map(|i| min + i as f64).collect();
        (counts, centres, 1.0)
    } else {
        let width = (max - min) / FLOAT_HISTOGRAM_BINS as f64;
        let mut counts = vec![0.0; FLOAT_HISTOGRAM_BINS];
        for &v in values {
            let bin = (((v as f64 - min) / width) as usize).min(FLOAT_HISTOGRAM_BINS - 1);
            counts[bin] += 1.0;
        }
        let centres = (0..FLOAT_HISTOGRAM_BINS)
            .map(|i| min + width * (i as f64 + 0.5))
            .collect();
        (counts, centres, width)
    }
}

/// Isodata (iterative intermeans) threshold.
///
/// Returns the first bin centre `c` for which the midpoint of the means
/// below and above `c` lies in `[c, c + bin_width)`. Pixels strictly
/// greater than the threshold are the bright class. A constant input
/// thresholds at its own value.
pub fn isodata_threshold(values: &[f32], integer_samples: bool) -> f64 {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });

    if !min.is_finite() {
        return f64::NAN;
    }
    if min == max {
        return min;
    }

    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (counts, centres, bin_width) = histogram(&finite, integer_samples, min, max);

    let total_count: f64 = counts.iter().sum();
    let total_intensity: f64 = counts.iter().zip(&centres).map(|(c, x)| c * x).sum();

    let mut count_low = 0.0;
    let mut intensity_low = 0.0;
    for i in 0..centres.len() - 1 {
        count_low += counts[i];
        intensity_low += counts[i] * centres[i];
        let count_high = total_count - count_low;
        if count_low == 0.0 || count_high == 0.0 {
            continue;
        }
        let mean_low = intensity_low / count_low;
        let mean_high = (total_intensity - intensity_low) / count_high;
        let distance = (mean_low + mean_high) / 2.0 - centres[i];
        if distance >= 0.0 && distance < bin_width {
            return centres[i];
        }
    }

    // No bin satisfied the criterion; split at the midpoint of the class means
    // of the full range instead.
    (min + max) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::{Rgb, Rgb32FImage};

    fn uniform(width: u32, height: u32, rgb: [f32; 3]) -> DecodedImage {
        DecodedImage {
            pixels: Rgb32FImage::from_pixel(width, height, Rgb(rgb)),
            integer_samples: true,
        }
    }

    #[test]
    fn isodata_splits_two_clusters() {
        let mut values = vec![20.0f32; 50];
        values.extend(vec![200.0f32; 50]);
        let t = isodata_threshold(&values, true);
        assert!(t >= 20.0 && t < 200.0, "threshold {}", t);
        // midpoint of the class means is 110; the first satisfying centre is 110
        assert_eq!(t, 110.0);
    }

    #[test]
    fn isodata_on_fractional_values() {
        let mut values = vec![0.1f32; 30];
        values.extend(vec![0.9f32; 70]);
        let t = isodata_threshold(&values, false);

        // The class means are the centres of bins 0 and 255, whose midpoint
        // is min + 128 widths, so bin 127 is the first centre within one width.
        let (min, max) = (0.1f32 as f64, 0.9f32 as f64);
        let width = (max - min) / 256.0;
        assert_approx_eq!(t, min + width * 127.5, 1e-12);
    }

    #[test]
    fn constant_band_thresholds_at_its_value() {
        assert_eq!(isodata_threshold(&[7.0; 10], true), 7.0);
        let mask = binarise(&uniform(3, 3, [0.0, 0.0, 90.0]), Direction::Up);
        assert!(mask.pixels().all(|p| p[0] == CANOPY_VALUE));
    }

    #[test]
    fn up_direction_marks_bright_sky_as_gap() {
        let mut pixels = Rgb32FImage::from_pixel(4, 4, Rgb([30.0, 60.0, 20.0]));
        pixels.put_pixel(0, 0, Rgb([200.0, 220.0, 250.0]));
        pixels.put_pixel(1, 0, Rgb([200.0, 220.0, 250.0]));
        let mask = binarise(&DecodedImage { pixels, integer_samples: true }, Direction::Up);
        assert_eq!(mask.get_pixel(0, 0)[0], GAP_VALUE);
        assert_eq!(mask.get_pixel(1, 0)[0], GAP_VALUE);
        assert_eq!(mask.get_pixel(2, 2)[0], CANOPY_VALUE);
    }

    #[test]
    fn down_direction_uses_excess_green_minus_red() {
        assert!(is_vegetation(50.0, 150.0, 40.0));
        assert!(!is_vegetation(150.0, 100.0, 80.0));
        // grey soil: EG = 0, ER = 0.4 * v
        assert!(!is_vegetation(100.0, 100.0, 100.0));
        // black: EG - ER = 0 counts as vegetation
        assert!(is_vegetation(0.0, 0.0, 0.0));

        let mask = binarise(&uniform(2, 2, [150.0, 100.0, 80.0]), Direction::Down);
        assert!(mask.pixels().all(|p| p[0] == GAP_VALUE));
    }

    fn rethreshold(mask: &GrayImage, direction: Direction) -> GrayImage {
        let (w, h) = mask.dimensions();
        let pixels = Rgb32FImage::from_fn(w, h, |x, y| {
            let v = mask.get_pixel(x, y)[0] as f32;
            Rgb([v, v, v])
        });
        binarise(&DecodedImage { pixels, integer_samples: true }, direction)
    }

    #[test]
    fn binarisation_is_idempotent() {
        let mut pixels = Rgb32FImage::from_pixel(6, 6, Rgb([40.0, 120.0, 30.0]));
        for x in 0..6 {
            pixels.put_pixel(x, 0, Rgb([180.0, 190.0, 240.0]));
            pixels.put_pixel(x, 5, Rgb([160.0, 120.0, 110.0]));
        }
        let image = DecodedImage { pixels, integer_samples: true };

        for direction in [Direction::Up, Direction::Down] {
            let mask = binarise(&image, direction);
            assert_eq!(rethreshold(&mask, direction), mask);
        }
    }
}
