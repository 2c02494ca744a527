// src/uncertain.rs - Values with standard uncertainties and first-order propagation

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::errors::{CoverError, Result};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(0);

/// A nominal value with a standard uncertainty.
///
/// Every value created with [`UFloat::new`] is an independent source of
/// uncertainty. Derived values keep one linear term per source they depend
/// on (partial derivative times the source's standard deviation), so two
/// derived values that share a source stay correlated:
///
/// ```
/// use canopy_cover_rust_lib::UFloat;
///
/// let k = UFloat::new(0.5, 0.2);
/// let ratio = k.divide(&k).unwrap();
/// assert_eq!(ratio.std_dev(), 0.0);
/// ```
///
/// There are no operator overloads; each operation is a named method whose
/// propagation rule is documented on the method.
#[derive(Debug, Clone, PartialEq)]
pub struct UFloat {
    nominal: f64,
    terms: BTreeMap<u64, f64>,
}

impl UFloat {
    /// Create an independent uncertain value
    pub fn new(nominal: f64, std_dev: f64) -> Self {
        let mut terms = BTreeMap::new();
        if std_dev != 0.0 {
            let id = NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed);
            terms.insert(id, std_dev.abs());
        }
        Self { nominal, terms }
    }

    /// A value with no uncertainty
    pub fn exact(value: f64) -> Self {
        Self {
            nominal: value,
            terms: BTreeMap::new(),
        }
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    /// Standard deviation: root sum of squares of the per-source terms
    pub fn std_dev(&self) -> f64 {
        self.terms.values().map(|t| t * t).sum::<f64>().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.nominal.is_finite() && self.std_dev().is_finite()
    }

    /// Build `f(a, b)` from its value and the partial derivatives `da`, `db`.
    fn propagate(nominal: f64, a: &UFloat, da: f64, b: Option<(&UFloat, f64)>) -> UFloat {
        let mut terms: BTreeMap<u64, f64> = a.terms.iter().map(|(&id, &t)| (id, da * t)).collect();
        if let Some((b, db)) = b {
            for (&id, &t) in &b.terms {
                *terms.entry(id).or_insert(0.0) += db * t;
            }
        }
        UFloat { nominal, terms }
    }

    /// `a + b`; σ² = σa² + σb² for independent operands
    #[allow(clippy::should_implement_trait)]
    pub fn add(&self, other: &UFloat) -> UFloat {
        Self::propagate(self.nominal + other.nominal, self, 1.0, Some((other, 1.0)))
    }

    /// `a − b`; σ² = σa² + σb² for independent operands
    pub fn subtract(&self, other: &UFloat) -> UFloat {
        Self::propagate(self.nominal - other.nominal, self, 1.0, Some((other, -1.0)))
    }

    /// `a · b`; σ² = (b·σa)² + (a·σb)² for independent operands
    pub fn multiply(&self, other: &UFloat) -> UFloat {
        Self::propagate(
            self.nominal * other.nominal,
            self,
            other.nominal,
            Some((other, self.nominal)),
        )
    }

    /// `a / b`; σ² = (σa/b)² + (a·σb/b²)² for independent operands.
    ///
    /// Fails with a domain error when `b` is zero or the quotient is not finite.
    pub fn divide(&self, other: &UFloat) -> Result<UFloat> {
        let b = other.nominal;
        if b == 0.0 {
            return Err(CoverError::Domain(format!(
                "division of {} by zero",
                self.nominal
            )));
        }
        let value = self.nominal / b;
        if !value.is_finite() {
            return Err(CoverError::Domain(format!(
                "{} / {} is not finite",
                self.nominal, b
            )));
        }
        Ok(Self::propagate(value, self, 1.0 / b, Some((other, -self.nominal / (b * b)))))
    }

    /// Natural logarithm; σ = σa / |a|.
    ///
    /// Fails with a domain error for non-positive or non-finite values.
    pub fn ln(&self) -> Result<UFloat> {
        if !(self.nominal.is_finite() && self.nominal > 0.0) {
            return Err(CoverError::Domain(format!(
                "logarithm of non-positive value {}",
                self.nominal
            )));
        }
        Ok(Self::propagate(self.nominal.ln(), self, 1.0 / self.nominal, None))
    }

    /// `−a`; σ unchanged
    pub fn negate(&self) -> UFloat {
        Self::propagate(-self.nominal, self, -1.0, None)
    }

    /// `c · a` for an exact constant `c`; σ = |c|·σa
    pub fn scale(&self, factor: f64) -> UFloat {
        Self::propagate(self.nominal * factor, self, factor, None)
    }

    /// `1 − a`; σ unchanged
    pub fn one_minus(&self) -> UFloat {
        UFloat::exact(1.0).subtract(self)
    }
}

impl fmt::Display for UFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*} ± {:.*}", p, self.nominal, p, self.std_dev()),
            None => write!(f, "{} ± {}", self.nominal, self.std_dev()),
        }
    }
}

impl Serialize for UFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UFloat", 2)?;
        state.serialize_field("nominal", &self.nominal)?;
        state.serialize_field("std_dev", &self.std_dev())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn independent_sum_adds_variances() {
        let a = UFloat::new(1.0, 0.3);
        let b = UFloat::new(2.0, 0.4);
        let s = a.add(&b);
        assert_approx_eq!(s.nominal(), 3.0);
        assert_approx_eq!(s.std_dev(), 0.5);
    }

    #[test]
    fn subtracting_a_value_from_itself_is_exact() {
        let a = UFloat::new(4.0, 1.5);
        let d = a.subtract(&a);
        assert_eq!(d.nominal(), 0.0);
        assert_eq!(d.std_dev(), 0.0);
    }

    #[test]
    fn product_and_quotient_follow_relative_errors() {
        let a = UFloat::new(2.0, 0.2);
        let b = UFloat::new(4.0, 0.8);
        let p = a.multiply(&b);
        assert_approx_eq!(p.nominal(), 8.0);
        // (4 * 0.2)^2 + (2 * 0.8)^2 = 0.64 + 2.56
        assert_approx_eq!(p.std_dev(), 3.2f64.sqrt());

        let q = a.divide(&b).unwrap();
        assert_approx_eq!(q.nominal(), 0.5);
        // (0.2 / 4)^2 + (2 * 0.8 / 16)^2
        assert_approx_eq!(q.std_dev(), (0.0025f64 + 0.01).sqrt());
    }

    #[test]
    fn logarithm_scales_by_reciprocal() {
        let a = UFloat::new(0.5, 0.05);
        let l = a.ln().unwrap();
        assert_approx_eq!(l.nominal(), 0.5f64.ln());
        assert_approx_eq!(l.std_dev(), 0.1);
    }

    #[test]
    fn logarithm_of_zero_is_a_domain_error() {
        let err = UFloat::new(0.0, 0.1).ln().unwrap_err();
        assert!(matches!(err, CoverError::Domain(_)));
        assert!(UFloat::exact(-1.0).ln().is_err());
        assert!(UFloat::exact(f64::NAN).ln().is_err());
    }

    #[test]
    fn division_by_zero_is_a_domain_error() {
        let err = UFloat::exact(1.0).divide(&UFloat::new(0.0, 0.1)).unwrap_err();
        assert!(matches!(err, CoverError::Domain(_)));
    }

    #[test]
    fn shared_source_cancels_in_ratio() {
        let k = UFloat::new(0.5, 0.2);
        let x = UFloat::new(2.0, 0.0);
        let a = x.divide(&k).unwrap();
        let b = x.scale(3.0).divide(&k).unwrap();
        let r = a.divide(&b).unwrap();
        assert_approx_eq!(r.nominal(), 1.0 / 3.0);
        assert_approx_eq!(r.std_dev(), 0.0);
    }

    #[test]
    fn one_minus_keeps_uncertainty() {
        let a = UFloat::new(0.25, 0.05);
        let f = a.one_minus();
        assert_approx_eq!(f.nominal(), 0.75);
        assert_approx_eq!(f.std_dev(), 0.05);
        assert_approx_eq!(a.negate().std_dev(), 0.05);
    }

    #[test]
    fn serializes_nominal_and_std_dev() {
        let json = serde_json::to_value(UFloat::new(1.5, 0.25)).unwrap();
        assert_eq!(json["nominal"], 1.5);
        assert_eq!(json["std_dev"], 0.25);
    }

    #[test]
    fn display_honours_precision() {
        assert_eq!(format!("{:.2}", UFloat::new(1.0, 0.1234)), "1.00 ± 0.12");
    }
}
