//! Finite field support in discrete-log representation
//!
//! A nonzero element of GF(q) is stored as the exponent of a fixed
//! generator; the additive identity is the reserved exponent `q - 1`
//! (the *zero sentinel*). All counting arithmetic reduces to lookups in
//! the tables built here:
//! - [`FieldTable`]: exponent <-> element maps for the field the curves
//!   are defined over, plus the symmetry helpers used by enumeration
//! - [`ReductionTable`]: per tower level, the exponent-reduction and
//!   incrementation tables that turn field addition into two lookups

mod poly;
pub mod reduction;
pub mod table;

pub use reduction::{CpuEvaluator, EvaluationBackend, ReductionTable};
pub use table::FieldTable;

use thiserror::Error;

/// Largest supported field size; tables are O(q) and counting is O(q)
/// per curve, so anything beyond this is not a realistic configuration.
pub const MAX_FIELD_ORDER: usize = 1 << 26;

/// Errors raised while constructing field tables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The configured characteristic is not a prime number.
    #[error("{0} is not prime")]
    NotPrime(u64),

    /// Characteristic 2 has no `Y^2 = f(X)` model and no even/odd square
    /// criterion; it is rejected up front.
    #[error("characteristic 2 is not supported by the Y^2 = f(X) model")]
    EvenCharacteristic,

    /// The prime exponent must be at least 1.
    #[error("prime exponent must be positive")]
    ZeroExponent,

    /// The field (or a requested tower level) exceeds the table budget.
    #[error("field of order {prime}^{exponent} exceeds the supported maximum {MAX_FIELD_ORDER}")]
    FieldTooLarge {
        /// Field characteristic.
        prime: u64,
        /// Requested prime exponent.
        exponent: usize,
    },

    /// No primitive polynomial was found; indicates a bug, not bad input.
    #[error("generator search failed for GF({prime}^{exponent})")]
    GeneratorSearchFailed {
        /// Field characteristic.
        prime: u64,
        /// Requested prime exponent.
        exponent: usize,
    },

    /// A tower level must be a positive multiple of the native exponent.
    #[error("level {level} is not a multiple of the native prime exponent {native}")]
    IncompatibleLevel {
        /// Requested tower level.
        level: usize,
        /// Prime exponent of the field the curve lives over.
        native: usize,
    },

    /// The native generator could not be located inside the bigger field.
    /// This is a consistency failure in table construction.
    #[error("embedding of the native generator into GF({prime}^{level}) failed")]
    EmbeddingFailed {
        /// Field characteristic.
        prime: u64,
        /// Tower level being constructed.
        level: usize,
    },
}
