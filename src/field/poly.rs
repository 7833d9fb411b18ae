//! Dense polynomial arithmetic over GF(p), used only while tables are
//! being built. The hot counting path never touches this module.

use crate::util::{distinct_prime_factors, is_prime, mod_pow};

use super::FieldError;

/// Polynomial over GF(p), coefficients low-to-high, trailing zeros
/// trimmed. The zero polynomial is the empty vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrimePoly {
    coeffs: Vec<u64>,
}

impl PrimePoly {
    pub(crate) fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    pub(crate) fn one() -> Self {
        Self { coeffs: vec![1] }
    }

    pub(crate) fn constant(c: u64, p: u64) -> Self {
        Self::from_coeffs(vec![c % p])
    }

    pub(crate) fn x() -> Self {
        Self {
            coeffs: vec![0, 1],
        }
    }

    fn from_coeffs(mut coeffs: Vec<u64>) -> Self {
        while coeffs.last() == Some(&0) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub(crate) fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub(crate) fn coeff(&self, i: usize) -> u64 {
        self.coeffs.get(i).copied().unwrap_or(0)
    }

    /// Monic degree-r polynomial whose lower coefficients are the base-p
    /// digits of `encoding` (constant term = lowest digit).
    pub(crate) fn monic_from_encoding(p: u64, r: usize, encoding: usize) -> Self {
        let mut coeffs = Vec::with_capacity(r + 1);
        let mut n = encoding;
        for _ in 0..r {
            coeffs.push((n % p as usize) as u64);
            n /= p as usize;
        }
        coeffs.push(1);
        Self { coeffs }
    }

    /// Base-p digit encoding of a reduced element, `sum c_i * p^i`.
    pub(crate) fn encoding(&self, p: u64) -> usize {
        let mut n = 0usize;
        for &c in self.coeffs.iter().rev() {
            n = n * p as usize + c as usize;
        }
        n
    }

    pub(crate) fn add(&self, other: &Self, p: u64) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..len)
            .map(|i| (self.coeff(i) + other.coeff(i)) % p)
            .collect();
        Self::from_coeffs(coeffs)
    }

    pub(crate) fn mul(&self, other: &Self, p: u64) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut coeffs = vec![0u64; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            if a == 0 {
                continue;
            }
            for (j, &b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] = (coeffs[i + j] + a * b) % p;
            }
        }
        Self::from_coeffs(coeffs)
    }

    /// Remainder modulo a monic polynomial.
    pub(crate) fn rem(&self, modulus: &Self, p: u64) -> Self {
        let mut coeffs = self.coeffs.clone();
        let d = modulus.degree();
        while coeffs.len() > d {
            let lead = match coeffs.pop() {
                Some(c) => c,
                None => break,
            };
            if lead == 0 {
                continue;
            }
            let shift = coeffs.len() - d;
            for i in 0..d {
                let sub = lead * modulus.coeff(i) % p;
                let slot = &mut coeffs[shift + i];
                *slot = (*slot + p - sub) % p;
            }
        }
        Self::from_coeffs(coeffs)
    }

    pub(crate) fn powmod(&self, mut exp: u64, modulus: &Self, p: u64) -> Self {
        let mut acc = Self::one();
        let mut base = self.rem(modulus, p);
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(&base, p).rem(modulus, p);
            }
            base = base.mul(&base, p).rem(modulus, p);
            exp >>= 1;
        }
        acc
    }
}

/// Construction context for GF(p^r): the canonical modulus, its root as
/// the canonical generator, and multiplication in the quotient ring.
#[derive(Debug, Clone)]
pub(crate) struct FieldCtx {
    pub(crate) prime: u64,
    pub(crate) exponent: usize,
    pub(crate) order: usize,
    pub(crate) modulus: PrimePoly,
    pub(crate) generator: PrimePoly,
}

impl FieldCtx {
    /// Builds the canonical context for GF(p^r).
    ///
    /// The generator is the root of the lexicographically smallest monic
    /// primitive polynomial of degree r (for r = 1, the smallest
    /// primitive root mod p). The choice is deterministic, which is what
    /// makes independently built tables agree across processes.
    pub(crate) fn canonical(prime: u64, exponent: usize) -> Result<Self, FieldError> {
        if !is_prime(prime) {
            return Err(FieldError::NotPrime(prime));
        }
        if prime == 2 {
            return Err(FieldError::EvenCharacteristic);
        }
        if exponent == 0 {
            return Err(FieldError::ZeroExponent);
        }
        let order = checked_order(prime, exponent)?;

        if exponent == 1 {
            let g = smallest_primitive_root(prime);
            return Ok(Self {
                prime,
                exponent,
                order,
                // x - g, so the quotient identifies x with g
                modulus: PrimePoly::from_coeffs(vec![prime - g, 1]),
                generator: PrimePoly::constant(g, prime),
            });
        }

        let order_factors = distinct_prime_factors(order as u64 - 1);
        for encoding in 0..order {
            if encoding % prime as usize == 0 {
                // zero constant term: x is not a unit in the quotient
                continue;
            }
            let candidate = PrimePoly::monic_from_encoding(prime, exponent, encoding);
            if x_is_primitive(&candidate, prime, order, &order_factors) {
                return Ok(Self {
                    prime,
                    exponent,
                    order,
                    modulus: candidate,
                    generator: PrimePoly::x(),
                });
            }
        }
        Err(FieldError::GeneratorSearchFailed { prime, exponent })
    }

    pub(crate) fn mul(&self, a: &PrimePoly, b: &PrimePoly) -> PrimePoly {
        a.mul(b, self.prime).rem(&self.modulus, self.prime)
    }

    /// generator^e in the quotient ring.
    pub(crate) fn generator_power(&self, e: u64) -> PrimePoly {
        self.generator.powmod(e, &self.modulus, self.prime)
    }

    /// Walks all q-1 powers of the generator.
    ///
    /// Returns `(powers, dlog)` where `powers[e]` is the encoding of
    /// generator^e and `dlog` inverts it, with `dlog[0] = q - 1` for the
    /// additive identity.
    pub(crate) fn generator_walk(&self) -> (Vec<usize>, Vec<usize>) {
        let q = self.order;
        let mut powers = Vec::with_capacity(q - 1);
        let mut dlog = vec![0usize; q];
        dlog[0] = q - 1;

        let mut a = PrimePoly::one();
        for e in 0..q - 1 {
            let enc = a.encoding(self.prime);
            powers.push(enc);
            dlog[enc] = e;
            a = self.mul(&a, &self.generator);
        }
        debug_assert_eq!(a, PrimePoly::one(), "generator order is not q - 1");
        (powers, dlog)
    }

    /// Evaluates a GF(p)-polynomial at an element of this field.
    pub(crate) fn eval(&self, f: &PrimePoly, at: &PrimePoly) -> PrimePoly {
        let mut acc = PrimePoly::zero();
        for i in (0..=f.degree()).rev() {
            acc = self.mul(&acc, at);
            acc = acc.add(&PrimePoly::constant(f.coeff(i), self.prime), self.prime);
        }
        acc
    }
}

fn checked_order(prime: u64, exponent: usize) -> Result<usize, FieldError> {
    let mut order = 1usize;
    for _ in 0..exponent {
        order = order
            .checked_mul(prime as usize)
            .filter(|&q| q <= super::MAX_FIELD_ORDER)
            .ok_or(FieldError::FieldTooLarge { prime, exponent })?;
    }
    Ok(order)
}

fn smallest_primitive_root(p: u64) -> u64 {
    let factors = distinct_prime_factors(p - 1);
    (2..p)
        .find(|&g| factors.iter().all(|&f| mod_pow(g, (p - 1) / f, p) != 1))
        .unwrap_or(1)
}

/// Does x generate the full unit group modulo `candidate`?
///
/// A reducible modulus cannot pass: its unit group has order strictly
/// below q - 1, so no separate irreducibility test is needed.
fn x_is_primitive(candidate: &PrimePoly, p: u64, order: usize, order_factors: &[u64]) -> bool {
    let x = PrimePoly::x();
    let q_pred = order as u64 - 1;
    if x.powmod(q_pred, candidate, p) != PrimePoly::one() {
        return false;
    }
    order_factors
        .iter()
        .all(|&f| x.powmod(q_pred / f, candidate, p) != PrimePoly::one())
}
