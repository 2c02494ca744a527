use std::fs;
use std::path::Path;
use csv::Writer;

use crate::aggregate::CoverResults;
use crate::errors::Result;
use crate::gap_analysis::ImageStatistics;

/// Write per-image statistics to CSV, one row per image in processing order
pub fn write_image_stats_csv<P: AsRef<Path>>(stats: &[ImageStatistics], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = Writer::from_path(output_path)?;

    writer.write_record(["Image", "Gap_Fraction", "Crown_Cover", "Crown_Porosity"])?;

    for stat in stats {
        writer.write_record(&[
            stat.path.display().to_string(),
            format!("{:.6}", stat.gap_fraction),
            format!("{:.6}", stat.crown_cover),
            format!("{:.6}", stat.crown_porosity),
        ])?;
    }

    writer.flush()?;

    Ok(())
}

/// Write the six indices as a JSON object of `{nominal, std_dev}` pairs
pub fn write_results_json<P: AsRef<Path>>(results: &CoverResults, output_path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(results)?;
    fs::write(output_path, content)?;
    Ok(())
}

/// Human-readable summary, one index per line
pub fn format_results(results: &CoverResults) -> String {
    results
        .entries()
        .into_iter()
        .map(|(name, value)| format!("{:<9} {:.4}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}
