//! Camera RAW decoding.
//!
//! Sensor data is read with `rawloader` and demosaiced with the `bayer`
//! crate. Two development modes are supported:
//!
//! - standard: black level, white balance, camera-to-sRGB colour matrix,
//!   auto-brightness and a BT.709 gamma curve, producing 8-bit samples
//! - linear: black level, white balance and colour matrix only, producing
//!   16-bit samples
//!
//! The orientation stored in the file is never applied, so band and block
//! indexing are the same whatever the camera orientation was.

use std::io::Cursor;
use std::path::Path;

use bayer::{BayerDepth, Demosaic, RasterDepth, RasterMut, CFA};
use image::{Rgb, Rgb32FImage};
use rawloader::RawImageData;
use tracing::debug;

use crate::errors::{CoverError, Result};
use crate::image_io::DecodedImage;

/// Fraction of the brightest samples allowed to saturate in standard mode
const AUTO_BRIGHT_THRESHOLD: f32 = 0.01;

/// BT.709 transfer curve: power 1/2.222 with a linear toe of slope 4.5
const GAMMA_POWER: f32 = 1.0 / 2.222;
const GAMMA_TOE_SLOPE: f32 = 4.5;

/// XYZ to linear sRGB, D65 white point
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

const IDENTITY: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Decode a RAW file and develop it to a three-band raster
pub fn decode_raw(path: &Path, pre_process: bool) -> Result<DecodedImage> {
    let raw = rawloader::decode_file(path).map_err(|e| CoverError::decode(path, e))?;
    let (width, height) = (raw.width, raw.height);
    debug!(
        "Decoded RAW {}: {}x{}, {} component(s) per pixel",
        path.display(),
        width,
        height,
        raw.cpp
    );

    let cam_to_xyz = raw.cam_to_xyz_normalized();
    let mut samples: Vec<u16> = match raw.data {
        RawImageData::Integer(values) => values,
        // Float data is normalised to 0.0-1.0
        RawImageData::Float(values) => values
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32) as u16)
            .collect(),
    };

    let rgb = match raw.cpp {
        1 => {
            let pattern = bayer_pattern([
                raw.cfa.color_at(0, 0),
                raw.cfa.color_at(0, 1),
                raw.cfa.color_at(1, 0),
                raw.cfa.color_at(1, 1),
            ])
            .ok_or_else(|| {
                CoverError::decode(path, format!("unsupported colour filter array {}", raw.cfa.name))
            })?;
            subtract_black_levels(&mut samples, width, |row, col| {
                black_level(raw.blacklevels, raw.cfa.color_at(row, col))
            });
            demosaic(&samples, width, height, pattern).map_err(|e| CoverError::decode(path, e))?
        }
        3 => {
            subtract_black_levels(&mut samples, width * 3, |_, col| {
                black_level(raw.blacklevels, col % 3)
            });
            samples
        }
        n => {
            return Err(CoverError::decode(
                path,
                format!("unsupported number of components per pixel: {}", n),
            ))
        }
    };

    let ranges = [0usize, 1, 2].map(|c| {
        raw.whitelevels[c].saturating_sub(raw.blacklevels[c]) as f32
    });
    let mut linear = normalise(&rgb, ranges, white_balance(raw.wb_coeffs));
    apply_colour_matrix(&mut linear, &camera_to_srgb(cam_to_xyz));

    develop(&linear, width as u32, height as u32, pre_process)
        .ok_or_else(|| CoverError::decode(path, "decoded sample count does not match dimensions"))
}

/// Map the colours of the top-left 2x2 cell (rawloader indices: 0 red,
/// 1 green, 2 blue, 3 second green) to a Bayer pattern.
pub fn bayer_pattern(cell: [usize; 4]) -> Option<CFA> {
    let cell = cell.map(|c| if c == 3 { 1 } else { c });
    match cell {
        [0, 1, 1, 2] => Some(CFA::RGGB),
        [2, 1, 1, 0] => Some(CFA::BGGR),
        [1, 0, 2, 1] => Some(CFA::GRBG),
        [1, 2, 0, 1] => Some(CFA::GBRG),
        _ => None,
    }
}

/// Linear-interpolation demosaic of 16-bit mosaic data into interleaved RGB
fn demosaic(samples: &[u16], width: usize, height: usize, pattern: CFA) -> std::result::Result<Vec<u16>, String> {
    let bayer_bytes: Vec<u8> = samples.iter().flat_map(|&v| v.to_le_bytes()).collect();
    let mut output_buf = vec![0u8; width * height * 3 * 2];
    let mut cursor = Cursor::new(&bayer_bytes[..]);

    {
        let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
        bayer::run_demosaic(
            &mut cursor,
            BayerDepth::Depth16LE,
            pattern,
            Demosaic::Linear,
            &mut output_raster,
        )
        .map_err(|e| format!("demosaic failed: {:?}", e))?;
    }

    Ok(output_buf
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Black level of one colour index, 0 for indices outside RGBE
fn black_level(levels: [u16; 4], colour: usize) -> u16 {
    levels.get(colour).copied().unwrap_or(0)
}

/// Subtract each sample's own black level in place. `row_len` is the
/// number of samples per row; `black_at(row, col)` gives the level.
fn subtract_black_levels(samples: &mut [u16], row_len: usize, black_at: impl Fn(usize, usize) -> u16) {
    if row_len == 0 {
        return;
    }
    for (row, line) in samples.chunks_mut(row_len).enumerate() {
        for (col, v) in line.iter_mut().enumerate() {
            *v = v.saturating_sub(black_at(row, col));
        }
    }
}

/// Camera RGB to linear sRGB through XYZ. Rows are scaled to sum to one so
/// that a white-balanced neutral stays neutral; a matrix with non-finite
/// entries (no colour data for the camera) falls back to identity.
fn camera_to_srgb(cam_to_xyz: [[f32; 4]; 3]) -> [[f32; 3]; 3] {
    let mut m = [[0.0f32; 3]; 3];
    for (r, row) in m.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| XYZ_TO_SRGB[r][k] * cam_to_xyz[k][c]).sum();
        }
        let sum: f32 = row.iter().sum();
        if !sum.is_finite() || sum.abs() < f32::EPSILON {
            return IDENTITY;
        }
        row.iter_mut().for_each(|v| *v /= sum);
    }
    m
}

/// Multiply every interleaved RGB triple by `m`
fn apply_colour_matrix(linear: &mut [f32], m: &[[f32; 3]; 3]) {
    for px in linear.chunks_exact_mut(3) {
        let (r, g, b) = (px[0], px[1], px[2]);
        for (out, row) in px.iter_mut().zip(m) {
            *out = row[0] * r + row[1] * g + row[2] * b;
        }
    }
}

/// Per-channel multipliers relative to green; missing coefficients mean 1.0
fn white_balance(coeffs: [f32; 4]) -> [f32; 3] {
    let green = coeffs[1];
    let mut wb = [1.0f32; 3];
    if green.is_finite() && green > 0.0 {
        for (c, w) in wb.iter_mut().enumerate() {
            let ratio = coeffs[c] / green;
            if ratio.is_finite() && ratio > 0.0 {
                *w = ratio;
            }
        }
    }
    wb
}

/// Scale black-subtracted samples to 0.0-1.0 by their channel's white
/// range and apply white balance
fn normalise(rgb: &[u16], ranges: [f32; 3], wb: [f32; 3]) -> Vec<f32> {
    let ranges = ranges.map(|r| r.max(1.0));
    rgb.iter()
        .enumerate()
        .map(|(i, &v)| (v as f32 / ranges[i % 3]) * wb[i % 3])
        .collect()
}

fn bt709_gamma(x: f32) -> f32 {
    if x < 0.018 {
        x * GAMMA_TOE_SLOPE
    } else {
        1.099 * x.powf(GAMMA_POWER) - 0.099
    }
}

/// Value above which the brightest `AUTO_BRIGHT_THRESHOLD` of one channel lies
fn bright_point(mut channel: Vec<f32>) -> f32 {
    if channel.is_empty() {
        return 0.0;
    }
    let skip = (channel.len() as f32 * AUTO_BRIGHT_THRESHOLD) as usize;
    let index = channel.len() - 1 - skip.min(channel.len() - 1);
    let (_, value, _) = channel.select_nth_unstable_by(index, |a, b| a.total_cmp(b));
    *value
}

/// Turn interleaved linear RGB (0.0-1.0, possibly above 1.0 after white
/// balance) into a raster. Returns `None` if the sample count is wrong.
pub fn develop(linear: &[f32], width: u32, height: u32, pre_process: bool) -> Option<DecodedImage> {
    if linear.len() != width as usize * height as usize * 3 {
        return None;
    }

    let values: Vec<f32> = if pre_process {
        let white = (0..3)
            .map(|c| bright_point(linear.iter().skip(c).step_by(3).copied().collect()))
            .fold(0.0f32, f32::max);
        let scale = if white > 0.0 { 1.0 / white } else { 1.0 };
        linear
            .iter()
            .map(|&v| (bt709_gamma((v * scale).clamp(0.0, 1.0)) * 255.0).round())
            .collect()
    } else {
        linear
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32).round())
            .collect()
    };

    let pixels = Rgb32FImage::from_fn(width, height, |x, y| {
        let i = (y as usize * width as usize + x as usize) * 3;
        Rgb([values[i], values[i + 1], values[i + 2]])
    });

    Some(DecodedImage {
        pixels,
        integer_samples: true,
    })
}
