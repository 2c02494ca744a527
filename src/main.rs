use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use canopy_cover_rust_lib::aggregate::aggregate;
use canopy_cover_rust_lib::config::Config;
use canopy_cover_rust_lib::logger;
use canopy_cover_rust_lib::output::{format_results, write_image_stats_csv, write_results_json};
use canopy_cover_rust_lib::pipeline::collect_statistics;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "Canopy structure from digital cover photography")]
struct Args {
    /// Directory containing the photographs
    #[clap(short, long)]
    input: Option<String>,

    /// Path to configuration file
    #[clap(short, long)]
    config: Option<String>,

    /// Extinction coefficient (overwrites config)
    #[clap(short, long)]
    k: Option<f64>,

    /// Standard uncertainty of the extinction coefficient (overwrites config)
    #[clap(long)]
    k_std_dev: Option<f64>,

    /// Direction the photographs were taken in (overwrites config)
    #[clap(short, long)]
    direction: Option<DirectionArg>,

    /// Block size for downsampling (overwrites config)
    #[clap(long, allow_negative_numbers = true)]
    down_factor: Option<i64>,

    /// Develop RAW files linearly instead of with the standard pipeline
    #[clap(long)]
    no_pre_process_raw: bool,

    /// Save each binary image next to its source as <name>_bin.png
    #[clap(long)]
    save_bin_img: bool,

    /// Write the indices as JSON to this file
    #[clap(long)]
    json: Option<String>,

    /// Write per-image statistics as CSV to this file
    #[clap(long)]
    csv: Option<String>,

    /// Write the effective configuration to this file and exit
    #[clap(long)]
    write_default_config: Option<String>,

    /// Enable debug logging
    #[clap(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

/// Main function
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(if args.debug { "debug" } else { "info" });

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }
    if let Some(k) = args.k {
        config.k_nominal = k;
    }
    if let Some(k_std_dev) = args.k_std_dev {
        config.k_std_dev = k_std_dev;
    }
    if let Some(direction) = args.direction {
        config.direction = match direction {
            DirectionArg::Up => "up".to_string(),
            DirectionArg::Down => "down".to_string(),
        };
    }
    if let Some(down_factor) = args.down_factor {
        config.down_factor = down_factor;
    }
    if args.no_pre_process_raw {
        config.pre_process_raw = false;
    }
    if args.save_bin_img {
        config.save_bin_img = true;
    }
    if args.json.is_some() {
        config.output_json = args.json.clone();
    }
    if args.csv.is_some() {
        config.output_csv = args.csv.clone();
    }

    if let Some(path) = &args.write_default_config {
        config.save_to_file(path)?;
        info!("Configuration written to {}", path);
        return Ok(());
    }

    let options = config.to_options()?;

    let start_time = Instant::now();

    let stats = collect_statistics(Path::new(&config.input_path), &options)
        .with_context(|| format!("processing images in '{}'", config.input_path))?;

    if let Some(csv_path) = &config.output_csv {
        write_image_stats_csv(&stats, csv_path)?;
        info!("Per-image statistics written to {}", csv_path);
    }

    let results = aggregate(&stats, &options.k).context("deriving canopy indices")?;

    println!("{}", format_results(&results));

    if let Some(json_path) = &config.output_json {
        write_results_json(&results, json_path)?;
        info!("Results written to {}", json_path);
    }

    info!(
        "Processed {} image(s) in {:.2} seconds",
        stats.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
