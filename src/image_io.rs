use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Rgb, Rgb32FImage};
use tracing::debug;

use crate::errors::{CoverError, Result};
use crate::raw_decode::decode_raw;

/// Extensions of camera RAW files
pub const RAW_EXTENSIONS: [&str; 5] = ["NEF", "CR2", "CR3", "PEF", "RAW"];

/// Extensions handled by the generic image codecs
pub const GENERIC_EXTENSIONS: [&str; 7] = ["JPG", "JPEG", "PNG", "GIF", "BMP", "TIF", "TIFF"];

/// How a file is decoded, resolved once from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Raw,
    Generic,
}

impl ImageSource {
    /// Classify a path by its (case-sensitive) extension
    pub fn from_path(path: &Path) -> Option<ImageSource> {
        let ext = path.extension()?.to_str()?;
        if RAW_EXTENSIONS.contains(&ext) {
            Some(ImageSource::Raw)
        } else if GENERIC_EXTENSIONS.contains(&ext) {
            Some(ImageSource::Generic)
        } else {
            None
        }
    }
}

/// A decoded three-band raster.
///
/// Samples keep the scale of the source (0-255 for 8-bit data, 0-65535 for
/// 16-bit data). `integer_samples` is true until a reduction produces
/// fractional values.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: Rgb32FImage,
    pub integer_samples: bool,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// List candidate images directly inside `dir_path`, sorted by file name.
///
/// A missing path, or one that is not a directory, is treated the same as
/// an empty directory.
pub fn list_images<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.is_dir() {
        return Err(CoverError::NoImagesFound(dir_path.to_path_buf()));
    }
    let entries = fs::read_dir(dir_path)?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && ImageSource::from_path(&path).is_some() {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(CoverError::NoImagesFound(dir_path.to_path_buf()));
    }

    images.sort();
    debug!("Found {} images in {}", images.len(), dir_path.display());
    Ok(images)
}

/// Decode an image file into a three-band raster
pub fn load_image<P: AsRef<Path>>(path: P, pre_process_raw: bool) -> Result<DecodedImage> {
    let path = path.as_ref();

    match ImageSource::from_path(path) {
        Some(ImageSource::Raw) => decode_raw(path, pre_process_raw),
        Some(ImageSource::Generic) => {
            let img = image::open(path).map_err(|e| CoverError::decode(path, e))?;
            Ok(from_dynamic(img))
        }
        None => Err(CoverError::decode(path, "unsupported file extension")),
    }
}

/// Convert a decoded image to a float raster on its native sample scale.
/// Alpha is dropped and single-band images are expanded to three bands.
pub fn from_dynamic(img: DynamicImage) -> DecodedImage {
    match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => DecodedImage {
            pixels: img.to_rgb32f(),
            integer_samples: false,
        },
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => {
            let rgb = img.to_rgb16();
            let (width, height) = rgb.dimensions();
            let pixels = Rgb32FImage::from_fn(width, height, |x, y| {
                let p = rgb.get_pixel(x, y);
                Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
            });
            DecodedImage { pixels, integer_samples: true }
        }
        _ => {
            let rgb = img.to_rgb8();
            let (width, height) = rgb.dimensions();
            let pixels = Rgb32FImage::from_fn(width, height, |x, y| {
                let p = rgb.get_pixel(x, y);
                Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
            });
            DecodedImage { pixels, integer_samples: true }
        }
    }
}

/// Path of the binary debug image written next to `source`
pub fn bin_image_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}_bin.png", stem))
}

/// Save an 8-bit mask as PNG
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<()> {
    mask.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn classifies_extensions_case_sensitively() {
        assert_eq!(ImageSource::from_path(Path::new("a/b.NEF")), Some(ImageSource::Raw));
        assert_eq!(ImageSource::from_path(Path::new("b.CR3")), Some(ImageSource::Raw));
        assert_eq!(ImageSource::from_path(Path::new("b.JPG")), Some(ImageSource::Generic));
        assert_eq!(ImageSource::from_path(Path::new("b.TIFF")), Some(ImageSource::Generic));
        assert_eq!(ImageSource::from_path(Path::new("b.jpg")), None);
        assert_eq!(ImageSource::from_path(Path::new("b.txt")), None);
        assert_eq!(ImageSource::from_path(Path::new("PNG")), None);
    }

    #[test]
    fn lists_only_matching_files_without_recursing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.JPG"), b"x").unwrap();
        fs::write(dir.path().join("a.PNG"), b"x").unwrap();
        fs::write(dir.path().join("c.png"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("d.PNG"), b"x").unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.JPG"]);
    }

    #[test]
    fn empty_or_missing_directory_has_no_images() {
        let dir = tempdir().unwrap();
        assert!(matches!(list_images(dir.path()), Err(CoverError::NoImagesFound(_))));
        assert!(matches!(
            list_images(dir.path().join("missing")),
            Err(CoverError::NoImagesFound(_))
        ));

        let file = dir.path().join("notadir.txt");
        fs::write(&file, "plain file").unwrap();
        assert!(matches!(list_images(&file), Err(CoverError::NoImagesFound(_))));
    }

    #[test]
    fn drops_alpha_and_keeps_sample_scale() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        rgba.put_pixel(1, 0, Rgba([200, 100, 50, 255]));
        let decoded = from_dynamic(DynamicImage::ImageRgba8(rgba));
        assert!(decoded.integer_samples);
        assert_eq!(decoded.pixels.get_pixel(0, 0).0, [10.0, 20.0, 30.0]);
        assert_eq!(decoded.pixels.get_pixel(1, 0).0, [200.0, 100.0, 50.0]);
    }

    #[test]
    fn undecodable_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.PNG");
        fs::write(&path, b"not a png").unwrap();
        let err = load_image(&path, true).unwrap_err();
        assert!(matches!(err, CoverError::Decode { path: ref p, .. } if p == &path));
    }

    #[test]
    fn bin_image_sits_next_to_source() {
        let path = bin_image_path(Path::new("/data/site.1/IMG_0001.JPG"));
        assert_eq!(path, PathBuf::from("/data/site.1/IMG_0001_bin.png"));
    }

    #[test]
    fn saved_mask_reloads_as_gray() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut mask = GrayImage::new(2, 2);
        mask.put_pixel(1, 1, Luma([255]));
        save_mask(&mask, &path).unwrap();
        let reloaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(reloaded.get_pixel(1, 1).0, [255]);
        assert_eq!(reloaded.get_pixel(0, 0).0, [0]);
    }
}
