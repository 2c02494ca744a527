// src/lib.rs - Library interface for canopy cover estimation from digital cover photography

pub mod aggregate;
pub mod binarise;
pub mod config;
pub mod errors;
pub mod gap_analysis;
pub mod image_io;
pub mod image_utils;
pub mod logger;
pub mod output;
pub mod pipeline;
pub mod raw_decode;
pub mod uncertain;
pub mod validation;

// Re-export commonly used types and functions
pub use aggregate::{aggregate, CoverResults, RESULT_KEYS};
pub use config::Config;
pub use errors::{CoverError, Result};
pub use gap_analysis::ImageStatistics;
pub use image_io::{list_images, load_image, DecodedImage, ImageSource};
pub use pipeline::{collect_statistics, process, process_image, process_with_options};
pub use uncertain::UFloat;
pub use validation::{validate_inputs, Direction, ProcessOptions};
