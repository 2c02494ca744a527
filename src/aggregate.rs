// src/aggregate.rs - Combine per-image statistics into canopy indices

use serde::Serialize;
use tracing::warn;

use crate::errors::{CoverError, Result};
use crate::gap_analysis::ImageStatistics;
use crate::uncertain::UFloat;

/// Names of the reported indices, in report order
pub const RESULT_KEYS: [&str; 6] = ["paie", "pai", "clumping", "fcover", "cc", "cp"];

/// Canopy indices with their standard uncertainties
#[derive(Debug, Clone, Serialize)]
pub struct CoverResults {
    /// Effective plant area index
    pub paie: UFloat,
    /// Plant area index
    pub pai: UFloat,
    /// Clumping index (PAIe / PAI)
    pub clumping: UFloat,
    /// Fraction of vegetation cover
    pub fcover: UFloat,
    /// Crown cover
    pub cc: UFloat,
    /// Crown porosity
    pub cp: UFloat,
}

impl CoverResults {
    /// Look up an index by name
    pub fn get(&self, key: &str) -> Option<&UFloat> {
        match key {
            "paie" => Some(&self.paie),
            "pai" => Some(&self.pai),
            "clumping" => Some(&self.clumping),
            "fcover" => Some(&self.fcover),
            "cc" => Some(&self.cc),
            "cp" => Some(&self.cp),
            _ => None,
        }
    }

    /// All six indices as `(name, value)` pairs
    pub fn entries(&self) -> Vec<(&'static str, &UFloat)> {
        vec![
            ("paie", &self.paie),
            ("pai", &self.pai),
            ("clumping", &self.clumping),
            ("fcover", &self.fcover),
            ("cc", &self.cc),
            ("cp", &self.cp),
        ]
    }
}

/// Mean and standard error of the finite entries of `values`.
///
/// The standard error is the population standard deviation divided by the
/// square root of the number of finite entries. Fails with a domain error
/// when no entry is finite.
pub fn mean_with_standard_error(values: &[f64], name: &str) -> Result<UFloat> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < values.len() {
        warn!(
            "Ignoring {} non-finite {} value(s) out of {}",
            values.len() - finite.len(),
            name,
            values.len()
        );
    }
    if finite.is_empty() {
        return Err(CoverError::Domain(format!("no finite {} values to average", name)));
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Ok(UFloat::new(mean, variance.sqrt() / n.sqrt()))
}

/// Derive the six canopy indices from per-image statistics and the
/// extinction coefficient `k`.
///
/// - `paie = −ln(gap fraction) / k`
/// - `pai = −cc · ln(cp) / k`
/// - `clumping = paie / pai`
/// - `fcover = 1 − gap fraction`
pub fn aggregate(stats: &[ImageStatistics], k: &UFloat) -> Result<CoverResults> {
    let gap_fractions: Vec<f64> = stats.iter().map(|s| s.gap_fraction).collect();
    let crown_covers: Vec<f64> = stats.iter().map(|s| s.crown_cover).collect();
    let crown_porosities: Vec<f64> = stats.iter().map(|s| s.crown_porosity).collect();

    let mean_gf = mean_with_standard_error(&gap_fractions, "gap fraction")?;
    let paie = mean_gf.ln()?.negate().divide(k)?;

    let cc = mean_with_standard_error(&crown_covers, "crown cover")?;
    let cp = mean_with_standard_error(&crown_porosities, "crown porosity")?;
    let pai = cc.negate().multiply(&cp.ln()?).divide(k)?;

    let clumping = paie.divide(&pai)?;
    let fcover = mean_gf.one_minus();

    Ok(CoverResults {
        paie,
        pai,
        clumping,
        fcover,
        cc,
        cp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::path::PathBuf;

    fn stat(gap_fraction: f64, crown_cover: f64) -> ImageStatistics {
        ImageStatistics {
            path: PathBuf::from("img.JPG"),
            gap_fraction,
            crown_cover,
            crown_porosity: 1.0 - (1.0 - gap_fraction) / crown_cover,
        }
    }

    #[test]
    fn standard_error_uses_population_deviation() {
        let u = mean_with_standard_error(&[1.0, 3.0], "x").unwrap();
        assert_approx_eq!(u.nominal(), 2.0);
        assert_approx_eq!(u.std_dev(), 1.0 / 2f64.sqrt());
    }

    #[test]
    fn non_finite_entries_are_ignored() {
        let u = mean_with_standard_error(&[2.0, f64::NAN, 4.0, f64::INFINITY], "x").unwrap();
        assert_approx_eq!(u.nominal(), 3.0);
        assert_approx_eq!(u.std_dev(), 1.0 / 2f64.sqrt());
    }

    #[test]
    fn all_non_finite_is_a_domain_error() {
        let err = mean_with_standard_error(&[f64::NAN], "crown porosity").unwrap_err();
        assert!(matches!(err, CoverError::Domain(_)));
    }

    #[test]
    fn single_image_indices() {
        let stats = vec![stat(0.2, 0.9)];
        let k = UFloat::exact(0.5);
        let r = aggregate(&stats, &k).unwrap();

        let cp: f64 = 1.0 - 0.8 / 0.9;
        let paie = -(0.2f64.ln()) / 0.5;
        let pai = -0.9 * cp.ln() / 0.5;
        assert_approx_eq!(r.paie.nominal(), paie);
        assert_approx_eq!(r.pai.nominal(), pai);
        assert_approx_eq!(r.clumping.nominal(), paie / pai);
        assert_approx_eq!(r.fcover.nominal(), 0.8);
        assert_approx_eq!(r.cc.nominal(), 0.9);
        assert_approx_eq!(r.cp.nominal(), cp);
        for (_, value) in r.entries() {
            assert_eq!(value.std_dev(), 0.0);
        }
    }

    #[test]
    fn k_uncertainty_reaches_paie_but_cancels_in_clumping() {
        let stats = vec![stat(0.2, 0.9), stat(0.3, 0.85)];
        let k = UFloat::new(0.5, 0.2);
        let r = aggregate(&stats, &k).unwrap();

        // relative error of paie is at least the relative error of k
        assert!(r.paie.std_dev() / r.paie.nominal() >= 0.4 - 1e-12);

        let k_exact = UFloat::exact(0.5);
        let r_exact = aggregate(&stats, &k_exact).unwrap();
        assert_approx_eq!(r.clumping.nominal(), r_exact.clumping.nominal());
        assert_approx_eq!(r.clumping.std_dev(), r_exact.clumping.std_dev());
    }

    #[test]
    fn fcover_carries_gap_fraction_uncertainty() {
        let stats = vec![stat(0.2, 0.9), stat(0.4, 0.8)];
        let r = aggregate(&stats, &UFloat::new(0.5, 0.2)).unwrap();
        assert_approx_eq!(r.fcover.nominal(), 0.7);
        assert_approx_eq!(r.fcover.std_dev(), 0.1 / 2f64.sqrt());
    }

    #[test]
    fn zero_gap_fraction_is_a_domain_error() {
        let stats = vec![stat(0.0, 1.0)];
        let err = aggregate(&stats, &UFloat::new(0.5, 0.2)).unwrap_err();
        assert!(matches!(err, CoverError::Domain(_)));
    }

    #[test]
    fn results_expose_exactly_six_keys() {
        let r = aggregate(&[stat(0.2, 0.9)], &UFloat::new(0.5, 0.2)).unwrap();
        let keys: Vec<_> = r.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, RESULT_KEYS.to_vec());
        for key in RESULT_KEYS {
            let value = r.get(key).unwrap();
            assert!(value.nominal().is_finite());
            assert!(value.std_dev() >= 0.0);
        }
        assert!(r.get("lai").is_none());

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
