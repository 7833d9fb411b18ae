//! Deduplicated equivalence classes keyed by curve invariants
//!
//! Two curves land in the same class when they share ramification type
//! and Hasse-Weil offsets. The store's merge is commutative and
//! associative, so partial stores built over disjoint block partitions
//! fold into the same aggregate no matter who computed what where.

pub mod files;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use crate::curve::{Curve, CurveError};
use crate::field::ReductionTable;

/// Errors raised while registering, parsing, or persisting classes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Extracting an invariant failed.
    #[error(transparent)]
    Curve(#[from] CurveError),

    /// A persisted line does not follow the `ram;offsets:payload`
    /// contract. Corrupt result files are never silently tolerated.
    #[error("{path}: malformed line {line}: {reason}")]
    MalformedLine {
        /// File the line came from.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// Reading or writing a result file failed.
    #[error("i/o failure on {path}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// The isomorphism invariant a class is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurveInvariant {
    /// Residue degrees of the branch points, ascending.
    pub ramification: Vec<u64>,
    /// Traces of Frobenius for tower levels 1..=genus.
    pub hasse_weil: Vec<i64>,
}

impl CurveInvariant {
    /// Invariant of the quadratic twist: offsets at odd levels flip
    /// sign, ramification is untouched.
    pub fn twisted(&self) -> Self {
        let hasse_weil = self
            .hasse_weil
            .iter()
            .enumerate()
            .map(|(i, &a)| if i % 2 == 0 { -a } else { a })
            .collect();
        Self {
            ramification: self.ramification.clone(),
            hasse_weil,
        }
    }
}

/// What a class accumulates. Selected at configuration time; the two
/// implementations below cover counting and representative collection.
pub trait Aggregate: Clone + Send + 'static {
    /// The contribution of a single curve.
    fn unit(curve: &Curve) -> Self;

    /// Folds another aggregate of the same class into this one. Must be
    /// commutative and associative together with [`Aggregate::unit`].
    fn absorb(&mut self, other: Self);

    /// Number of curves aggregated.
    fn count(&self) -> u64;

    /// Payload text for the line format.
    fn render(&self) -> String;

    /// Parses a payload previously produced by [`Aggregate::render`].
    fn parse(text: &str) -> Result<Self, String>;
}

/// Pure class counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCount(pub u64);

impl Aggregate for ClassCount {
    fn unit(_curve: &Curve) -> Self {
        ClassCount(1)
    }

    fn absorb(&mut self, other: Self) {
        self.0 += other.0;
    }

    fn count(&self) -> u64 {
        self.0
    }

    fn render(&self) -> String {
        self.0.to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        text.trim()
            .parse()
            .map(ClassCount)
            .map_err(|_| format!("invalid count {text:?}"))
    }
}

/// Class counting plus the coefficient vectors observed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassRepresentatives {
    count: u64,
    representatives: BTreeSet<Vec<usize>>,
}

impl ClassRepresentatives {
    /// Number of distinct representatives collected.
    pub fn representative_count(&self) -> usize {
        self.representatives.len()
    }

    /// The canonical representative: the lexicographically minimal
    /// coefficient vector, which is independent of enumeration order
    /// and thread scheduling.
    pub fn canonical(&self) -> Option<&Vec<usize>> {
        self.representatives.iter().next()
    }

    /// All representatives in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.representatives.iter()
    }
}

impl Aggregate for ClassRepresentatives {
    fn unit(curve: &Curve) -> Self {
        let mut representatives = BTreeSet::new();
        representatives.insert(curve.coeff_exponents().to_vec());
        Self {
            count: 1,
            representatives,
        }
    }

    fn absorb(&mut self, other: Self) {
        self.count += other.count;
        self.representatives.extend(other.representatives);
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn render(&self) -> String {
        self.representatives
            .iter()
            .map(|rep| {
                rep.iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn parse(text: &str) -> Result<Self, String> {
        let mut representatives = BTreeSet::new();
        for rep in text.split(',') {
            let exponents = rep
                .split_whitespace()
                .map(|e| e.parse().map_err(|_| format!("invalid exponent {e:?}")))
                .collect::<Result<Vec<usize>, _>>()?;
            if exponents.is_empty() {
                return Err("empty representative".to_string());
            }
            representatives.insert(exponents);
        }
        Ok(Self {
            count: representatives.len() as u64,
            representatives,
        })
    }
}

/// The deduplicating class store.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceStore<A: Aggregate> {
    classes: BTreeMap<CurveInvariant, A>,
    twist_closure: bool,
}

impl<A: Aggregate> EquivalenceStore<A> {
    /// Fresh empty store. With `twist_closure` every registration also
    /// registers the quadratic twist, so enumerating one square class
    /// of leading coefficients covers both.
    pub fn new(twist_closure: bool) -> Self {
        Self {
            classes: BTreeMap::new(),
            twist_closure,
        }
    }

    /// Registers one counted curve.
    ///
    /// The curve must already hold point counts for the tower levels
    /// 1..=genus (in native units); the native reduction table is only
    /// consulted when the ramification type needs the factorization
    /// fallback.
    pub fn register(
        &mut self,
        curve: &Curve,
        native_table: &ReductionTable,
    ) -> Result<(), StoreError> {
        let ramification = curve.ramification_type(native_table)?;
        let max_level = curve.genus() * curve.field().prime_exponent();
        let hasse_weil = curve.hasse_weil_offsets(max_level)?;
        let key = CurveInvariant {
            ramification,
            hasse_weil,
        };

        if self.twist_closure {
            let twisted_key = key.twisted();
            if twisted_key != key {
                self.absorb_class(twisted_key, A::unit(&curve.twist()));
            }
        }
        self.absorb_class(key, A::unit(curve));
        Ok(())
    }

    /// Folds one class contribution into the store.
    pub fn absorb_class(&mut self, key: CurveInvariant, aggregate: A) {
        match self.classes.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                entry.get_mut().absorb(aggregate);
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(aggregate);
            }
        }
    }

    /// Folds a whole store in; the merge law the distributed run relies
    /// on.
    pub fn merge(&mut self, other: Self) {
        for (key, aggregate) in other.classes {
            self.absorb_class(key, aggregate);
        }
    }

    /// Number of distinct classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class has been registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of curves across all classes.
    pub fn total_count(&self) -> u64 {
        self.classes.values().map(Aggregate::count).sum()
    }

    /// Classes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CurveInvariant, &A)> {
        self.classes.iter()
    }
}
