//! Reduction and incrementation tables for one tower level
//!
//! These two tables are what make counting tractable: with elements in
//! exponent form, multiplication is exponent addition followed by one
//! reduction lookup, and addition is one incrementation lookup plus one
//! reduction lookup. The incrementation table maps i to the discrete
//! log of 1 + generator^i, with the zero sentinel where 1 + generator^i
//! vanishes.

use crate::util::{gcd, mod_inverse};

use super::poly::FieldCtx;
use super::{FieldError, FieldTable};

/// Lookup tables for GF(p^level), where `level` is a multiple of the
/// prime exponent of the field the curves live over. Immutable after
/// construction and shared read-only across workers.
#[derive(Debug, Clone)]
pub struct ReductionTable {
    prime: u64,
    level: usize,
    native_level: usize,
    prime_power: usize,
    native_zero: usize,
    promotion_stride: usize,
    exponent_reduction_table: Vec<usize>,
    incrementation_table: Vec<usize>,
}

impl ReductionTable {
    /// Builds the tables for the given tower level.
    ///
    /// The level generator is chosen *compatible* with the native one:
    /// generator^((q_level-1)/(q-1)) is exactly the embedded native
    /// generator. Coefficient promotion between levels is then the plain
    /// exponent scaling applied by [`Self::promote`]. Compatibility is
    /// arranged by locating the embedded native generator on the
    /// canonical walk (any root of the native minimal polynomial gives
    /// point counts; the smallest discrete log is taken so that every
    /// process picks the same one) and relabelling exponents by a unit.
    pub fn new(field: &FieldTable, level: usize) -> Result<Self, FieldError> {
        let native = field.prime_exponent();
        if level == 0 || level % native != 0 {
            return Err(FieldError::IncompatibleLevel { level, native });
        }

        let prime = field.prime();
        let ctx = FieldCtx::canonical(prime, level)?;
        let q = ctx.order;
        let native_q = field.order();
        let stride = (q - 1) / (native_q - 1);

        let (_, mut dlog) = ctx.generator_walk();
        if level != native {
            relabel_for_native_generator(&ctx, field, &mut dlog, stride)?;
        }

        let mut incrementation_table = vec![0usize; q];
        incrementation_table[q - 1] = 0; // 1 + 0 = generator^0
        let p = prime as usize;
        // Adding one only moves the constant digit, so the p consecutive
        // encodings of a chunk share their high digits and cycle.
        for pix in (0..q - 1).step_by(p) {
            for ix in pix..pix + p - 1 {
                incrementation_table[dlog[ix]] = dlog[ix + 1];
            }
            incrementation_table[dlog[pix + p - 1]] = dlog[pix];
        }

        let mut exponent_reduction_table = Vec::with_capacity(2 * (q - 1));
        for _ in 0..2 {
            exponent_reduction_table.extend(0..q - 1);
        }

        Ok(Self {
            prime,
            level,
            native_level: native,
            prime_power: q,
            native_zero: native_q - 1,
            promotion_stride: stride,
            exponent_reduction_table,
            incrementation_table,
        })
    }

    /// Field characteristic p.
    pub fn prime(&self) -> u64 {
        self.prime
    }

    /// The tower level (prime exponent of this table's field).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Prime exponent of the native field the table was built against.
    pub fn native_level(&self) -> usize {
        self.native_level
    }

    /// Size of this level's field.
    pub fn prime_power(&self) -> usize {
        self.prime_power
    }

    /// The reserved exponent representing the additive identity.
    pub fn zero_index(&self) -> usize {
        self.prime_power - 1
    }

    /// Lifts a native-level coefficient exponent into this level.
    pub fn promote(&self, exponent: usize) -> usize {
        if exponent == self.native_zero {
            self.zero_index()
        } else {
            exponent * self.promotion_stride
        }
    }

    /// Reduces a sum of two exponents back into `[0, q-1)`.
    #[inline]
    pub fn reduce(&self, exponent_sum: usize) -> usize {
        self.exponent_reduction_table[exponent_sum]
    }

    /// Field addition in exponent form.
    #[inline]
    pub fn add_exponents(&self, a: usize, b: usize) -> usize {
        let zero = self.zero_index();
        if a == zero {
            return b;
        }
        if b == zero {
            return a;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let delta = self.incrementation_table[hi - lo];
        if delta == zero {
            zero
        } else {
            self.reduce(lo + delta)
        }
    }

    /// Field multiplication in exponent form.
    #[inline]
    pub fn mul_exponents(&self, a: usize, b: usize) -> usize {
        let zero = self.zero_index();
        if a == zero || b == zero {
            zero
        } else {
            self.reduce(a + b)
        }
    }

    /// Additive inverse in exponent form; q is odd, so -1 = g^((q-1)/2).
    #[inline]
    pub fn negate_exponent(&self, a: usize) -> usize {
        let zero = self.zero_index();
        if a == zero {
            zero
        } else {
            self.reduce(a + zero / 2)
        }
    }

    /// Multiplicative inverse of a nonzero exponent.
    #[inline]
    pub fn invert_exponent(&self, a: usize) -> usize {
        let zero = self.zero_index();
        debug_assert_ne!(a, zero, "inverting the additive identity");
        if a == 0 {
            0
        } else {
            zero - a
        }
    }

    /// Evaluates `y^2 = f(x)` over every nonzero x of this level and
    /// totals the unramified and ramified points found.
    ///
    /// `coeff_exponents` must already be promoted to this level. The
    /// boundary cases x = 0 and x = infinity are the caller's concern.
    pub fn evaluate_units(&self, coeff_exponents: &[usize]) -> (u64, u64) {
        let n = self.prime_power - 1;
        let reduce = &self.exponent_reduction_table[..];
        let incr = &self.incrementation_table[..];

        let mut unramified = 0u64;
        let mut ramified = 0u64;
        for x in 0..n {
            let mut f = coeff_exponents[0];
            let mut xpw = x;
            for &c in &coeff_exponents[1..] {
                xpw = reduce[xpw];
                if c != n {
                    let term = reduce[c + xpw];
                    if f == n {
                        f = term;
                    } else {
                        let (lo, hi) = if term <= f { (term, f) } else { (f, term) };
                        let delta = incr[hi - lo];
                        f = if delta == n { n } else { reduce[lo + delta] };
                    }
                }
                xpw += x;
            }
            if f == n {
                ramified += 1;
            } else if f & 1 == 0 {
                // squares are exactly the even generator powers
                unramified += 2;
            }
        }
        (unramified, ramified)
    }
}

/// Relabels the walk's discrete logs so that the level generator is
/// compatible with the native one.
fn relabel_for_native_generator(
    ctx: &FieldCtx,
    field: &FieldTable,
    dlog: &mut [usize],
    stride: usize,
) -> Result<(), FieldError> {
    let q = ctx.order;
    let native_q_pred = field.order() as u64 - 1;
    let minimal = field.minimal_polynomial();

    // The embedded native generator is a root of the native minimal
    // polynomial with discrete log t * stride, gcd(t, q-1) = 1.
    let t = (1..native_q_pred)
        .filter(|&t| gcd(t, native_q_pred) == 1)
        .find(|&t| {
            let candidate = ctx.generator_power(t * stride as u64);
            ctx.eval(minimal, &candidate).is_zero()
        })
        .ok_or(FieldError::EmbeddingFailed {
            prime: ctx.prime,
            level: ctx.exponent,
        })?;

    // Smallest unit s of q-1 congruent to t modulo the native q-1; the
    // relabelled generator is the s-th power of the canonical one.
    let q_pred = q as u64 - 1;
    let s = (0..q_pred)
        .map(|j| t + j * native_q_pred)
        .find(|&s| gcd(s, q_pred) == 1)
        .ok_or(FieldError::EmbeddingFailed {
            prime: ctx.prime,
            level: ctx.exponent,
        })?;
    if s == 1 {
        return Ok(());
    }
    let s_inv = mod_inverse(s, q_pred).ok_or(FieldError::EmbeddingFailed {
        prime: ctx.prime,
        level: ctx.exponent,
    })?;

    for (encoding, slot) in dlog.iter_mut().enumerate() {
        if encoding != 0 {
            *slot = (*slot as u64 * s_inv % q_pred) as usize;
        }
    }
    Ok(())
}

/// Pluggable evaluation of the per-x inner loop.
///
/// An accelerated implementation must produce totals bit-identical to
/// [`CpuEvaluator`]; when no accelerator is present the CPU path is not
/// a degraded mode but the reference one.
pub trait EvaluationBackend: Send + Sync {
    /// Totals `(unramified, ramified)` over the nonzero x of the level.
    fn evaluate(&self, table: &ReductionTable, coeff_exponents: &[usize]) -> (u64, u64);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Table-driven evaluation on the host CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEvaluator;

impl EvaluationBackend for CpuEvaluator {
    fn evaluate(&self, table: &ReductionTable, coeff_exponents: &[usize]) -> (u64, u64) {
        table.evaluate_units(coeff_exponents)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}
