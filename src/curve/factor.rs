//! Polynomial arithmetic over GF(q) in exponent form
//!
//! Supports the squarefree test and the distinct-degree factorization
//! fallback. Polynomials are coefficient-exponent vectors (low-to-high,
//! trailing sentinels trimmed, the zero polynomial is empty); all field
//! operations go through a [`ReductionTable`].

use crate::field::ReductionTable;

pub(crate) fn trim(mut f: Vec<usize>, zero: usize) -> Vec<usize> {
    while f.last() == Some(&zero) {
        f.pop();
    }
    f
}

fn mul(table: &ReductionTable, a: &[usize], b: &[usize]) -> Vec<usize> {
    let zero = table.zero_index();
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![zero; a.len() + b.len() - 1];
    for (i, &ca) in a.iter().enumerate() {
        if ca == zero {
            continue;
        }
        for (j, &cb) in b.iter().enumerate() {
            let term = table.mul_exponents(ca, cb);
            out[i + j] = table.add_exponents(out[i + j], term);
        }
    }
    trim(out, zero)
}

fn sub(table: &ReductionTable, a: &[usize], b: &[usize]) -> Vec<usize> {
    let zero = table.zero_index();
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let ca = a.get(i).copied().unwrap_or(zero);
        let cb = b.get(i).copied().unwrap_or(zero);
        out.push(table.add_exponents(ca, table.negate_exponent(cb)));
    }
    trim(out, zero)
}

/// Long division; `b` must be nonzero.
fn divmod(table: &ReductionTable, a: &[usize], b: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let zero = table.zero_index();
    let db = b.len() - 1;
    let mut r = trim(a.to_vec(), zero);
    if r.len() <= db {
        return (Vec::new(), r);
    }
    let lead_inv = table.invert_exponent(b[db]);
    let mut quotient = vec![zero; r.len() - db];
    while r.len() > db {
        let shift = r.len() - 1 - db;
        let ratio = table.mul_exponents(r[r.len() - 1], lead_inv);
        quotient[shift] = ratio;
        for (i, &cb) in b.iter().enumerate() {
            let term = table.mul_exponents(ratio, cb);
            r[shift + i] = table.add_exponents(r[shift + i], table.negate_exponent(term));
        }
        r = trim(r, zero);
    }
    (trim(quotient, zero), r)
}

fn monic(table: &ReductionTable, f: Vec<usize>) -> Vec<usize> {
    let zero = table.zero_index();
    match f.last().copied() {
        None | Some(0) => f,
        Some(lead) => {
            let inv = table.invert_exponent(lead);
            f.into_iter()
                .map(|c| if c == zero { zero } else { table.mul_exponents(c, inv) })
                .collect()
        }
    }
}

fn poly_gcd(table: &ReductionTable, a: &[usize], b: &[usize]) -> Vec<usize> {
    let zero = table.zero_index();
    let mut a = trim(a.to_vec(), zero);
    let mut b = trim(b.to_vec(), zero);
    while !b.is_empty() {
        let r = divmod(table, &a, &b).1;
        a = b;
        b = r;
    }
    monic(table, a)
}

fn powmod(table: &ReductionTable, base: &[usize], mut exp: u64, modulus: &[usize]) -> Vec<usize> {
    let mut acc = vec![0usize]; // the constant 1
    let mut base = divmod(table, base, modulus).1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = divmod(table, &mul(table, &acc, &base), modulus).1;
        }
        base = divmod(table, &mul(table, &base, &base), modulus).1;
        exp >>= 1;
    }
    acc
}

/// Discrete logs of the prime-subfield integers 0..p, derived by
/// repeated incrementation from 1 = generator^0.
fn small_integer_exponents(table: &ReductionTable) -> Vec<usize> {
    let p = table.prime() as usize;
    let mut exps = vec![table.zero_index(); p];
    if p > 1 {
        exps[1] = 0;
        for k in 2..p {
            exps[k] = table.add_exponents(exps[k - 1], 0);
        }
    }
    exps
}

fn derivative(table: &ReductionTable, f: &[usize]) -> Vec<usize> {
    let zero = table.zero_index();
    let p = table.prime() as usize;
    let small = small_integer_exponents(table);
    let mut out = Vec::with_capacity(f.len().saturating_sub(1));
    for (i, &c) in f.iter().enumerate().skip(1) {
        out.push(table.mul_exponents(c, small[i % p]));
    }
    trim(out, zero)
}

/// Whether the polynomial has no repeated roots over the closure.
pub(crate) fn is_squarefree(table: &ReductionTable, f: &[usize]) -> bool {
    let f = trim(f.to_vec(), table.zero_index());
    if f.len() <= 1 {
        return false;
    }
    let d = derivative(table, &f);
    if d.is_empty() {
        // vanishing derivative means f is a p-th power
        return false;
    }
    poly_gcd(table, &f, &d).len() == 1
}

/// Degrees of the irreducible factors of a squarefree polynomial,
/// ascending, by distinct-degree splitting with the Frobenius map.
pub(crate) fn factor_degrees(table: &ReductionTable, f: &[usize]) -> Vec<u64> {
    let zero = table.zero_index();
    let q = table.prime_power() as u64;
    let x = vec![zero, 0usize];

    let mut f = monic(table, trim(f.to_vec(), zero));
    let mut degrees = Vec::new();
    let mut h = divmod(table, &x, &f).1;
    let mut d = 0u64;
    while f.len() > 1 {
        d += 1;
        if 2 * d > (f.len() - 1) as u64 {
            degrees.push((f.len() - 1) as u64);
            break;
        }
        h = powmod(table, &h, q, &f);
        let g = poly_gcd(table, &sub(table, &h, &x), &f);
        if g.len() > 1 {
            for _ in 0..(g.len() - 1) as u64 / d {
                degrees.push(d);
            }
            let (quotient, remainder) = divmod(table, &f, &g);
            debug_assert!(remainder.is_empty());
            f = quotient;
            h = divmod(table, &h, &f).1;
        }
    }
    degrees.sort_unstable();
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldTable;

    fn table(p: u64) -> (FieldTable, ReductionTable) {
        let field = FieldTable::new(p, 1).unwrap();
        let reduction = ReductionTable::new(&field, 1).unwrap();
        (field, reduction)
    }

    fn poly(field: &FieldTable, values: &[u64]) -> Vec<usize> {
        values
            .iter()
            .map(|&v| field.subfield_exponent(v).unwrap())
            .collect()
    }

    #[test]
    fn splits_product_of_linear_factors() {
        let (field, reduction) = table(5);
        // x^2 - 1 = (x - 1)(x + 1)
        let f = poly(&field, &[4, 0, 1]);
        assert_eq!(factor_degrees(&reduction, &f), vec![1, 1]);
        // x^3 - x = x (x - 1)(x + 1)
        let f = poly(&field, &[0, 4, 0, 1]);
        assert_eq!(factor_degrees(&reduction, &f), vec![1, 1, 1]);
    }

    #[test]
    fn keeps_irreducible_quadratic_whole() {
        let (field, reduction) = table(7);
        // -1 is not a square mod 7, so x^2 + 1 is irreducible
        let f = poly(&field, &[1, 0, 1]);
        assert_eq!(factor_degrees(&reduction, &f), vec![2]);
    }

    #[test]
    fn mixed_degree_factorization() {
        let (field, reduction) = table(5);
        // (x^2 + 2)(x + 1): 2 is a nonsquare mod 5
        let quad = poly(&field, &[2, 0, 1]);
        let lin = poly(&field, &[1, 1]);
        let f = mul(&reduction, &quad, &lin);
        assert_eq!(factor_degrees(&reduction, &f), vec![1, 2]);
    }

    #[test]
    fn squarefree_detection() {
        let (field, reduction) = table(5);
        // (x + 1)^2 = x^2 + 2x + 1
        let f = poly(&field, &[1, 2, 1]);
        assert!(!is_squarefree(&reduction, &f));
        let f = poly(&field, &[4, 0, 1]);
        assert!(is_squarefree(&reduction, &f));
        // x^5 - x has derivative -1 + 5x^4 = -1, squarefree
        let f = poly(&field, &[0, 4, 0, 0, 0, 1]);
        assert!(is_squarefree(&reduction, &f));
    }

    #[test]
    fn division_round_trips() {
        let (field, reduction) = table(7);
        let a = poly(&field, &[3, 1, 4, 2]);
        let b = poly(&field, &[2, 5, 1]);
        let (q, r) = divmod(&reduction, &a, &b);
        let qb = mul(&reduction, &q, &b);
        assert_eq!(sub(&reduction, &a, &qb), r);
        assert!(r.len() < b.len());
    }
}
