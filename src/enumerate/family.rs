//! Symmetry-pruned enumeration of a genus-g family
//!
//! For each model degree (2g+1 and 2g+2) the family yields one
//! top-level iterator over coefficient exponents. Scaling the curve by
//! a square is an isomorphism, so the leading coefficient only runs
//! over one representative per square class; substituting x + c for x
//! is one as well, which pins the next-to-leading coefficient to zero.
//! Everything below that runs over the whole field.

use std::sync::Arc;

use crate::field::FieldTable;

use super::{BlockIterator, Coordinate, EnumerationError};

/// The family of hyperelliptic curves of one genus over one field.
#[derive(Debug, Clone)]
pub struct CurveFamily {
    field: Arc<FieldTable>,
    genus: usize,
    single_square_class: bool,
}

impl CurveFamily {
    /// Builds the family descriptor.
    pub fn new(field: Arc<FieldTable>, genus: usize) -> Result<Self, EnumerationError> {
        if genus == 0 {
            return Err(EnumerationError::ZeroGenus);
        }
        Ok(Self {
            field,
            genus,
            single_square_class: false,
        })
    }

    /// Restricts the leading coefficient to the square class of 1.
    ///
    /// Combine with a twist-closing store: the store then derives the
    /// nonsquare classes from the enumerated half.
    pub fn single_square_class(mut self, enabled: bool) -> Self {
        self.single_square_class = enabled;
        self
    }

    /// The genus every member shares.
    pub fn genus(&self) -> usize {
        self.genus
    }

    /// The two model degrees, odd first.
    pub fn degrees(&self) -> [usize; 2] {
        [2 * self.genus + 1, 2 * self.genus + 2]
    }

    /// Top-level iterator over the degree-d coefficient vectors modulo
    /// the declared symmetries.
    pub fn iterator_for_degree(
        &self,
        degree: usize,
        package_size: usize,
    ) -> Result<BlockIterator, EnumerationError> {
        let (lower, upper) = self.field.block_complete();
        let leading = if self.single_square_class {
            vec![0]
        } else {
            self.field.power_coset_representatives(2)
        };
        let coordinates = (0..=degree)
            .map(|i| {
                if i == degree {
                    Coordinate::Set {
                        values: leading.clone(),
                    }
                } else if i == degree - 1 {
                    Coordinate::Set {
                        values: vec![self.field.zero_index()],
                    }
                } else {
                    Coordinate::Block { lower, upper }
                }
            })
            .collect();
        BlockIterator::new(coordinates, package_size)
    }

    /// One iterator per model degree.
    pub fn block_iterators(
        &self,
        package_size: usize,
    ) -> Result<Vec<BlockIterator>, EnumerationError> {
        self.degrees()
            .into_iter()
            .map(|degree| self.iterator_for_degree(degree, package_size))
            .collect()
    }
}
