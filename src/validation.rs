// src/validation.rs - Argument checks performed before any filesystem access

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CoverError, Result};
use crate::uncertain::UFloat;

/// Default extinction coefficient (spherical leaf angle distribution)
pub const DEFAULT_K_NOMINAL: f64 = 0.5;
/// Default standard uncertainty of the extinction coefficient
pub const DEFAULT_K_STD_DEV: f64 = 0.2;
pub const DEFAULT_DOWN_FACTOR: i64 = 3;

/// Direction the photographs were acquired in
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Upward-looking (sky is the background)
    Up,
    /// Downward-looking (soil is the background)
    Down,
}

impl FromStr for Direction {
    type Err = CoverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(CoverError::InvalidArgument(format!(
                "direction must be either 'up' or 'down', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Validated processing options for one run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub k: UFloat,
    pub direction: Direction,
    pub down_factor: u32,
    pub pre_process_raw: bool,
    pub save_bin_img: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            k: UFloat::new(DEFAULT_K_NOMINAL, DEFAULT_K_STD_DEV),
            direction: Direction::Up,
            down_factor: DEFAULT_DOWN_FACTOR as u32,
            pre_process_raw: true,
            save_bin_img: false,
        }
    }
}

/// Check raw invocation arguments and turn them into [`ProcessOptions`].
///
/// Type-level constraints (single string, single values, booleans, integer
/// down factor) are carried by the signature; the remaining checks are on
/// values. Nothing touches the filesystem here.
pub fn validate_inputs(
    img_dir: &str,
    k: &UFloat,
    direction: &str,
    down_factor: i64,
    pre_process_raw: bool,
    save_bin_img: bool,
) -> Result<ProcessOptions> {
    if img_dir.is_empty() {
        return Err(CoverError::InvalidArgument(
            "img_dir must be a non-empty string".to_string(),
        ));
    }

    if !k.is_finite() || k.nominal() == 0.0 {
        return Err(CoverError::InvalidArgument(format!(
            "k must be a finite, non-zero value with a finite uncertainty, got {}",
            k
        )));
    }

    let direction = Direction::from_str(direction)?;

    if down_factor < 1 || down_factor > u32::MAX as i64 {
        return Err(CoverError::InvalidArgument(format!(
            "down_factor must be a positive integer, got {}",
            down_factor
        )));
    }

    Ok(ProcessOptions {
        k: k.clone(),
        direction,
        down_factor: down_factor as u32,
        pre_process_raw,
        save_bin_img,
    })
}
