//! Discrete-log tables for the field the curves are defined over

use crate::util::gcd;

use super::poly::{FieldCtx, PrimePoly};
use super::FieldError;

/// Immutable discrete-log representation of GF(p^r).
///
/// Built once per configuration and shared read-only by every worker.
/// Elements are identified by their base-p digit encoding; nonzero
/// elements additionally carry the exponent of the canonical generator,
/// with the reserved exponent `q - 1` standing in for zero.
#[derive(Debug, Clone)]
pub struct FieldTable {
    prime: u64,
    prime_exponent: usize,
    order: usize,
    element_of_exponent: Vec<usize>,
    exponent_of_element: Vec<usize>,
    subfield_exponents: Vec<usize>,
    minimal_polynomial: PrimePoly,
}

impl FieldTable {
    /// Builds the tables for GF(p^r) from the canonical generator.
    pub fn new(prime: u64, prime_exponent: usize) -> Result<Self, FieldError> {
        let ctx = FieldCtx::canonical(prime, prime_exponent)?;
        let q = ctx.order;
        let (powers, dlog) = ctx.generator_walk();

        let mut element_of_exponent = powers;
        element_of_exponent.push(0); // zero sentinel slot

        let mut subfield_exponents = vec![0usize; prime as usize];
        for (value, slot) in subfield_exponents.iter_mut().enumerate() {
            *slot = dlog[value];
        }

        Ok(Self {
            prime,
            prime_exponent,
            order: q,
            element_of_exponent,
            exponent_of_element: dlog,
            subfield_exponents,
            minimal_polynomial: ctx.modulus,
        })
    }

    /// Field characteristic p.
    pub fn prime(&self) -> u64 {
        self.prime
    }

    /// Prime exponent r, with q = p^r.
    pub fn prime_exponent(&self) -> usize {
        self.prime_exponent
    }

    /// Field size q.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The reserved exponent representing the additive identity.
    pub fn zero_index(&self) -> usize {
        self.order - 1
    }

    /// Base-p digit encoding of generator^e (0 for the zero sentinel).
    pub fn element_of_exponent(&self, exponent: usize) -> usize {
        self.element_of_exponent[exponent]
    }

    /// Discrete log of an element given by its digit encoding.
    pub fn exponent_of_element(&self, encoding: usize) -> usize {
        self.exponent_of_element[encoding]
    }

    /// Exponent of a prime-subfield value, `None` if out of range.
    pub fn subfield_exponent(&self, value: u64) -> Option<usize> {
        self.subfield_exponents.get(value as usize).copied()
    }

    /// Prime-subfield value of generator^e, when the element lies in the
    /// prime subfield.
    pub fn at_subfield(&self, exponent: usize) -> Option<u64> {
        let encoding = self.element_of_exponent(exponent);
        (encoding < self.prime as usize || exponent == self.zero_index())
            .then_some(encoding as u64)
    }

    /// One exponent per coset of the n-th powers: `0..gcd(n, q-1)`.
    ///
    /// Scaling a coefficient by an n-th power of the generator moves
    /// between isomorphic curves, so enumeration only needs these.
    pub fn power_coset_representatives(&self, n: u64) -> Vec<usize> {
        let count = gcd(n, self.order as u64 - 1) as usize;
        (0..count).collect()
    }

    /// Exponent range of the nonzero elements, `[0, q-1)`.
    pub fn block_non_zero(&self) -> (usize, usize) {
        (0, self.order - 1)
    }

    /// Exponent range of the whole field including the sentinel, `[0, q)`.
    pub fn block_complete(&self) -> (usize, usize) {
        (0, self.order)
    }

    pub(crate) fn minimal_polynomial(&self) -> &PrimePoly {
        &self.minimal_polynomial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gf5_discrete_logs() {
        // canonical generator of GF(5) is 2: powers 1, 2, 4, 3
        let table = FieldTable::new(5, 1).unwrap();
        assert_eq!(table.zero_index(), 4);
        assert_eq!(table.subfield_exponent(1), Some(0));
        assert_eq!(table.subfield_exponent(2), Some(1));
        assert_eq!(table.subfield_exponent(4), Some(2));
        assert_eq!(table.subfield_exponent(3), Some(3));
        assert_eq!(table.subfield_exponent(0), Some(4));
        assert_eq!(table.subfield_exponent(5), None);
    }

    #[test]
    fn exponent_maps_invert_each_other() {
        let table = FieldTable::new(3, 2).unwrap();
        for e in 0..table.order() - 1 {
            let enc = table.element_of_exponent(e);
            assert_eq!(table.exponent_of_element(enc), e);
        }
        assert_eq!(table.element_of_exponent(table.zero_index()), 0);
        assert_eq!(table.exponent_of_element(0), table.zero_index());
    }

    #[test]
    fn subfield_lookup_round_trips() {
        let table = FieldTable::new(7, 2).unwrap();
        for value in 0..7u64 {
            let e = table.subfield_exponent(value).unwrap();
            assert_eq!(table.at_subfield(e), Some(value));
        }
        // generator of GF(49) itself is not in the prime subfield
        assert_eq!(table.at_subfield(1), None);
    }

    #[test]
    fn square_coset_representatives() {
        let table = FieldTable::new(5, 1).unwrap();
        // odd q: exactly two square classes
        assert_eq!(table.power_coset_representatives(2), vec![0, 1]);
        assert_eq!(table.power_coset_representatives(4), vec![0, 1, 2, 3]);
        assert_eq!(table.power_coset_representatives(3), vec![0]);
    }

    #[test]
    fn rejects_bad_characteristic() {
        assert_eq!(FieldTable::new(6, 1).unwrap_err(), FieldError::NotPrime(6));
        assert_eq!(
            FieldTable::new(2, 3).unwrap_err(),
            FieldError::EvenCharacteristic
        );
        assert_eq!(FieldTable::new(5, 0).unwrap_err(), FieldError::ZeroExponent);
    }
}
