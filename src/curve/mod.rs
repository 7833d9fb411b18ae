//! Hyperelliptic curves `y^2 = f(x)` and their isomorphism invariants

mod factor;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::field::{EvaluationBackend, FieldTable, ReductionTable};

/// Errors raised while building or interrogating a curve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurveError {
    /// All coefficients are the zero sentinel.
    #[error("the right-hand side polynomial is identically zero")]
    ZeroPolynomial,

    /// The right-hand side is a nonzero constant; there is no curve.
    #[error("the right-hand side polynomial is constant")]
    ConstantPolynomial,

    /// A coefficient exponent does not fit the field.
    #[error("coefficient exponent {exponent} out of range for a field of order {order}")]
    ExponentOutOfRange {
        /// Offending exponent.
        exponent: usize,
        /// Field order q.
        order: usize,
    },

    /// A prime-subfield coefficient value does not fit the field.
    #[error("coefficient value {value} out of range for characteristic {prime}")]
    ValueOutOfRange {
        /// Offending value.
        value: u64,
        /// Field characteristic.
        prime: u64,
    },

    /// The reduction table belongs to a different field or tower.
    #[error("reduction table for GF({prime}^{level}) does not extend the curve's field")]
    IncompatibleTable {
        /// Table characteristic.
        prime: u64,
        /// Table level.
        level: usize,
    },

    /// An invariant was requested for a level that was never counted.
    #[error("no point count memoized for level {level}")]
    MissingLevel {
        /// Missing tower level.
        level: usize,
    },

    /// Point counts contradict each other; a bug, not a data condition.
    #[error("ramification sieve found inconsistent counts at level {level}")]
    InconsistentCounts {
        /// Level at which the contradiction surfaced.
        level: usize,
    },
}

/// One curve of the census: a coefficient-exponent vector over its
/// defining field, with point counts memoized per tower level.
///
/// Trailing zero coefficients are trimmed on construction, so
/// [`Curve::degree`] is the true degree of the right-hand side.
#[derive(Debug, Clone)]
pub struct Curve {
    field: Arc<FieldTable>,
    coeff_exponents: Vec<usize>,
    counts: BTreeMap<usize, (u64, u64)>,
}

impl Curve {
    /// Builds a curve from coefficient exponents (low-to-high).
    pub fn new(field: Arc<FieldTable>, coeff_exponents: Vec<usize>) -> Result<Self, CurveError> {
        let order = field.order();
        for &e in &coeff_exponents {
            if e >= order {
                return Err(CurveError::ExponentOutOfRange {
                    exponent: e,
                    order,
                });
            }
        }
        let trimmed = factor::trim(coeff_exponents, field.zero_index());
        match trimmed.len() {
            0 => Err(CurveError::ZeroPolynomial),
            1 => Err(CurveError::ConstantPolynomial),
            _ => Ok(Self {
                field,
                coeff_exponents: trimmed,
                counts: BTreeMap::new(),
            }),
        }
    }

    /// Builds a curve from prime-subfield coefficient values.
    pub fn from_subfield_values(
        field: Arc<FieldTable>,
        values: &[u64],
    ) -> Result<Self, CurveError> {
        let exponents = values
            .iter()
            .map(|&v| {
                field
                    .subfield_exponent(v)
                    .ok_or(CurveError::ValueOutOfRange {
                        value: v,
                        prime: field.prime(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(field, exponents)
    }

    /// The field the coefficients live in.
    pub fn field(&self) -> &Arc<FieldTable> {
        &self.field
    }

    /// Trimmed coefficient exponents, low-to-high.
    pub fn coeff_exponents(&self) -> &[usize] {
        &self.coeff_exponents
    }

    /// True degree of the right-hand side.
    pub fn degree(&self) -> usize {
        self.coeff_exponents.len() - 1
    }

    /// Genus of the smooth model.
    pub fn genus(&self) -> usize {
        if self.degree() % 2 == 0 {
            (self.degree() - 2) / 2
        } else {
            (self.degree() - 1) / 2
        }
    }

    /// Memoized point counts per counted tower level.
    pub fn point_counts(&self) -> &BTreeMap<usize, (u64, u64)> {
        &self.counts
    }

    fn check_table(&self, table: &ReductionTable) -> Result<(), CurveError> {
        let native = self.field.prime_exponent();
        if table.prime() != self.field.prime() || table.native_level() != native {
            return Err(CurveError::IncompatibleTable {
                prime: table.prime(),
                level: table.level(),
            });
        }
        Ok(())
    }

    fn promoted_coefficients(&self, table: &ReductionTable) -> Vec<usize> {
        self.coeff_exponents
            .iter()
            .map(|&e| table.promote(e))
            .collect()
    }

    /// Counts `(unramified, ramified)` points over the table's level,
    /// memoized. The affine interior comes from the evaluation backend;
    /// x = 0 and x = infinity are settled by the coefficient parities.
    pub fn count(
        &mut self,
        table: &ReductionTable,
        backend: &dyn EvaluationBackend,
    ) -> Result<(u64, u64), CurveError> {
        self.check_table(table)?;
        if let Some(&cached) = self.counts.get(&table.level()) {
            return Ok(cached);
        }

        let promoted = self.promoted_coefficients(table);
        let zero = table.zero_index();
        let (mut unramified, mut ramified) = backend.evaluate(table, &promoted);

        // x = 0
        if promoted[0] == zero {
            ramified += 1;
        } else if promoted[0] & 1 == 0 {
            unramified += 2;
        }

        // x = infinity
        if self.degree() < 2 * self.genus() + 2 {
            ramified += 1;
        } else if promoted[self.degree()] & 1 == 0 {
            unramified += 2;
        }

        self.counts.insert(table.level(), (unramified, ramified));
        Ok((unramified, ramified))
    }

    /// Counts over every level of a tower, in table order.
    pub fn count_tower(
        &mut self,
        tables: &[ReductionTable],
        backend: &dyn EvaluationBackend,
    ) -> Result<Vec<(u64, u64)>, CurveError> {
        tables.iter().map(|t| self.count(t, backend)).collect()
    }

    /// Traces of Frobenius `q^k + 1 - #points` for tower levels up to
    /// `max_level` (in absolute prime-exponent units).
    pub fn hasse_weil_offsets(&self, max_level: usize) -> Result<Vec<i64>, CurveError> {
        let native = self.field.prime_exponent();
        let mut offsets = Vec::with_capacity(max_level / native);
        for k in 1..=max_level / native {
            let level = k * native;
            let &(unramified, ramified) = self
                .counts
                .get(&level)
                .ok_or(CurveError::MissingLevel { level })?;
            let order = (self.field.prime() as i64).pow(level as u32);
            offsets.push(order + 1 - (unramified + ramified) as i64);
        }
        Ok(offsets)
    }

    /// Whether the right-hand side has no repeated roots.
    ///
    /// Non-squarefree right-hand sides give singular affine models and
    /// are excluded from the census.
    pub fn is_squarefree(&self, native_table: &ReductionTable) -> Result<bool, CurveError> {
        self.check_native(native_table)?;
        Ok(factor::is_squarefree(native_table, &self.coeff_exponents))
    }

    fn check_native(&self, table: &ReductionTable) -> Result<(), CurveError> {
        if table.prime() != self.field.prime() || table.level() != self.field.prime_exponent() {
            return Err(CurveError::IncompatibleTable {
                prime: table.prime(),
                level: table.level(),
            });
        }
        Ok(())
    }

    /// Multiset of residue degrees of the branch points, ascending.
    ///
    /// Ramified x visible over GF(q^k) but over no proper subextension
    /// come in groups of k, one group per irreducible factor of degree
    /// k, so the memoized counts usually pin the type down: once the
    /// unexplained degree budget drops below twice the next untested
    /// level, only a single factor can remain. When the counts computed
    /// so far cannot disambiguate, the degrees are read off an exact
    /// factorization instead. Assumes a squarefree right-hand side.
    pub fn ramification_type(
        &self,
        native_table: &ReductionTable,
    ) -> Result<Vec<u64>, CurveError> {
        self.check_native(native_table)?;
        let native = self.field.prime_exponent();
        let degree = self.degree() as u64;
        let infinity = u64::from(self.degree() < 2 * self.genus() + 2);

        let mut multiplicities: BTreeMap<u64, u64> = BTreeMap::new();
        let mut explained = 0u64;
        let mut k = 0u64;
        loop {
            k += 1;
            let remaining = degree - explained;
            if remaining == 0 {
                break;
            }
            if remaining < 2 * k {
                // every unexplained factor has degree >= k, so two of
                // them would need at least 2k; exactly one remains
                *multiplicities.entry(remaining).or_insert(0) += 1;
                break;
            }
            let level = k as usize * native;
            let Some(&(_, ramified)) = self.counts.get(&level) else {
                let mut degrees = factor::factor_degrees(native_table, &self.coeff_exponents);
                if infinity == 1 {
                    degrees.push(1);
                }
                degrees.sort_unstable();
                return Ok(degrees);
            };
            let visible: u64 = multiplicities
                .iter()
                .filter(|(d, _)| k % **d == 0)
                .map(|(d, m)| d * m)
                .sum();
            let expected = infinity + visible;
            if ramified < expected || (ramified - expected) % k != 0 {
                return Err(CurveError::InconsistentCounts { level });
            }
            let newly = (ramified - expected) / k;
            if newly > 0 {
                multiplicities.insert(k, newly);
                explained += k * newly;
            }
        }

        let mut degrees: Vec<u64> = multiplicities
            .into_iter()
            .flat_map(|(d, m)| std::iter::repeat(d).take(m as usize))
            .collect();
        if infinity == 1 {
            degrees.push(1);
        }
        degrees.sort_unstable();
        Ok(degrees)
    }

    /// The quadratic twist: the right-hand side scaled by the generator
    /// (a nonsquare). Counts are not carried over.
    pub fn twist(&self) -> Curve {
        let zero = self.field.zero_index();
        let coeff_exponents = self
            .coeff_exponents
            .iter()
            .map(|&e| if e == zero { zero } else { (e + 1) % zero })
            .collect();
        Curve {
            field: Arc::clone(&self.field),
            coeff_exponents,
            counts: BTreeMap::new(),
        }
    }

    /// First two coefficients of the Weil polynomial for genus-2 curves:
    /// `T^4 + c3*T^3 + c2*T^2 + ...` with `c3 = -a1`, `c2 = (a1^2-a2)/2`.
    pub fn weil_coefficients(&self) -> Result<(i64, i64), CurveError> {
        let native = self.field.prime_exponent();
        let offsets = self.hasse_weil_offsets(2 * native)?;
        let (a1, a2) = (offsets[0], offsets[1]);
        Ok((-a1, (a1 * a1 - a2) / 2))
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zero = self.field.zero_index();
        write!(f, "Y^2 =")?;
        let mut first = true;
        for i in (0..=self.degree()).rev() {
            let e = self.coeff_exponents[i];
            if e == zero {
                continue;
            }
            let sep = if first { " " } else { " + " };
            first = false;
            match self.field.at_subfield(e) {
                Some(v) => write!(f, "{sep}{v}*X^{i}")?,
                None => write!(f, "{sep}a^{e}*X^{i}")?,
            }
        }
        write!(f, "  /  F_{}", self.field.order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::CpuEvaluator;

    fn gf5() -> Arc<FieldTable> {
        Arc::new(FieldTable::new(5, 1).unwrap())
    }

    #[test]
    fn trims_trailing_zero_coefficients() {
        let field = gf5();
        let zero = field.zero_index();
        let curve = Curve::new(Arc::clone(&field), vec![0, 1, 2, zero, zero]).unwrap();
        assert_eq!(curve.degree(), 2);
        assert_eq!(curve.genus(), 0);
    }

    #[test]
    fn rejects_degenerate_polynomials() {
        let field = gf5();
        let zero = field.zero_index();
        assert_eq!(
            Curve::new(Arc::clone(&field), vec![zero, zero]).unwrap_err(),
            CurveError::ZeroPolynomial
        );
        assert_eq!(
            Curve::new(Arc::clone(&field), vec![2, zero]).unwrap_err(),
            CurveError::ConstantPolynomial
        );
        assert!(matches!(
            Curve::new(field, vec![0, 9]).unwrap_err(),
            CurveError::ExponentOutOfRange { .. }
        ));
    }

    #[test]
    fn genus_by_degree() {
        let field = gf5();
        for (coeffs, genus) in [
            (vec![0u64, 1, 1, 1], 1usize),    // degree 3
            (vec![1, 0, 0, 0, 1], 1),         // degree 4
            (vec![1, 1, 0, 0, 0, 1], 2),      // degree 5
            (vec![1, 1, 0, 0, 0, 0, 1], 2),   // degree 6
        ] {
            let curve = Curve::from_subfield_values(Arc::clone(&field), &coeffs).unwrap();
            assert_eq!(curve.genus(), genus, "coeffs {coeffs:?}");
        }
    }

    #[test]
    fn twist_shifts_square_class() {
        let field = gf5();
        let zero = field.zero_index();
        let curve = Curve::new(Arc::clone(&field), vec![0, zero, 3]).unwrap();
        assert_eq!(curve.twist().coeff_exponents(), &[1, zero, 0]);
    }

    #[test]
    fn count_is_memoized() {
        let field = gf5();
        let table = ReductionTable::new(&field, 1).unwrap();
        let mut curve =
            Curve::from_subfield_values(Arc::clone(&field), &[1, 2, 3, 1, 1, 0, 4]).unwrap();
        let first = curve.count(&table, &CpuEvaluator).unwrap();
        let second = curve.count(&table, &CpuEvaluator).unwrap();
        assert_eq!(first, second);
        assert_eq!(curve.point_counts().len(), 1);
    }

    #[test]
    fn offsets_require_counted_levels() {
        let field = gf5();
        let curve = Curve::from_subfield_values(field, &[1, 2, 3, 1, 1, 0, 4]).unwrap();
        assert_eq!(
            curve.hasse_weil_offsets(1).unwrap_err(),
            CurveError::MissingLevel { level: 1 }
        );
    }

    #[test]
    fn display_renders_subfield_coefficients() {
        let field = gf5();
        let curve = Curve::from_subfield_values(field, &[1, 0, 3]).unwrap();
        assert_eq!(curve.to_string(), "Y^2 = 3*X^2 + 1*X^0  /  F_5");
    }
}
