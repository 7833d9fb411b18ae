//! Enumeration of coefficient-exponent vectors without materializing
//! the search space
//!
//! A [`BlockIterator`] is a multi-radix odometer over three coordinate
//! kinds: contiguous strided ranges ("blocks"), explicit finite sets,
//! and sets selected by the current value of another coordinate
//! ("dependent sets"). Block coordinates carry a package-size stride so
//! that one odometer step corresponds to one contiguous unit of work
//! for a worker.

pub mod family;

pub use family::CurveFamily;

use std::sync::Arc;

use thiserror::Error;

/// Errors raised while building an iterator; all of them are
/// configuration bugs and fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    /// A block coordinate with `lower >= upper`.
    #[error("coordinate {index}: empty range [{lower}, {upper})")]
    EmptyRange {
        /// Coordinate index.
        index: usize,
        /// Lower bound (inclusive).
        lower: usize,
        /// Upper bound (exclusive).
        upper: usize,
    },

    /// A set coordinate with no values.
    #[error("coordinate {index}: empty set")]
    EmptySet {
        /// Coordinate index.
        index: usize,
    },

    /// A dependent-set row that could be selected is empty.
    #[error("coordinate {index}: empty dependent row {row}")]
    EmptyDependentRow {
        /// Coordinate index.
        index: usize,
        /// Offending row.
        row: usize,
    },

    /// A dependent set coupled to itself, to another dependent set, or
    /// to a coordinate that does not exist.
    #[error("coordinate {index}: invalid coupling to {coupled}")]
    BadCoupling {
        /// Coordinate index.
        index: usize,
        /// Coupled coordinate index.
        coupled: usize,
    },

    /// The coupled coordinate can take values beyond the table rows.
    #[error("coordinate {index}: coupled values exceed the dependent table")]
    CouplingOutOfRange {
        /// Coordinate index.
        index: usize,
    },

    /// Work packages must contain at least one position.
    #[error("package size must be positive")]
    ZeroPackageSize,

    /// An iterator over nothing is meaningless.
    #[error("no coordinates given")]
    NoCoordinates,

    /// A census needs at least genus 1.
    #[error("genus must be positive")]
    ZeroGenus,
}

/// One coordinate of the enumeration.
#[derive(Debug, Clone)]
pub enum Coordinate {
    /// Contiguous range `[lower, upper)`, stepped with the package
    /// stride assigned at construction.
    Block {
        /// Inclusive lower bound.
        lower: usize,
        /// Exclusive upper bound.
        upper: usize,
    },
    /// Explicit ordered set of values, unit stride.
    Set {
        /// The values, iterated in order.
        values: Vec<usize>,
    },
    /// Row of `table` selected by the current value of the `coupled`
    /// coordinate, iterated by local index.
    DependentSet {
        /// Index of the coordinate whose value selects the row.
        coupled: usize,
        /// Candidate rows, indexed by the coupled coordinate's value.
        table: Arc<Vec<Vec<usize>>>,
    },
}

impl Coordinate {
    fn range_size(&self) -> usize {
        match self {
            Coordinate::Block { lower, upper } => upper - lower,
            Coordinate::Set { values } => values.len(),
            Coordinate::DependentSet { .. } => 1,
        }
    }
}

/// Odometer over a coordinate vector.
///
/// The update order is fixed at construction: dependent sets first,
/// then sets, then blocks by descending range size; the package budget
/// is granted greedily to the largest blocks. `step()` advances the
/// first coordinate in that order and ripples carries; once the last
/// coordinate overflows the iterator is permanently finished.
#[derive(Debug, Clone)]
pub struct BlockIterator {
    coordinates: Vec<Coordinate>,
    order: Vec<usize>,
    strides: Vec<usize>,
    state: Vec<usize>,
    finished: bool,
}

impl BlockIterator {
    /// Builds an iterator; the initial state is the first position.
    pub fn new(
        coordinates: Vec<Coordinate>,
        package_size: usize,
    ) -> Result<Self, EnumerationError> {
        if package_size == 0 {
            return Err(EnumerationError::ZeroPackageSize);
        }
        if coordinates.is_empty() {
            return Err(EnumerationError::NoCoordinates);
        }
        validate(&coordinates)?;

        let mut dependent_order = Vec::new();
        let mut set_order = Vec::new();
        let mut block_order = Vec::new();
        for (index, coordinate) in coordinates.iter().enumerate() {
            match coordinate {
                Coordinate::Block { .. } => block_order.push(index),
                Coordinate::Set { .. } => set_order.push(index),
                Coordinate::DependentSet { .. } => dependent_order.push(index),
            }
        }
        block_order.sort_by(|&a, &b| {
            coordinates[b]
                .range_size()
                .cmp(&coordinates[a].range_size())
                .then(a.cmp(&b))
        });

        let mut strides = vec![1usize; coordinates.len()];
        let mut remaining = package_size;
        for &index in &block_order {
            let size = coordinates[index].range_size();
            let stride = remaining.min(size);
            strides[index] = stride;
            remaining /= stride;
        }

        let mut order = dependent_order;
        order.extend(set_order);
        order.extend(block_order);

        let state = coordinates
            .iter()
            .map(|c| match c {
                Coordinate::Block { lower, .. } => *lower,
                _ => 0,
            })
            .collect();

        Ok(Self {
            coordinates,
            order,
            strides,
            state,
            finished: false,
        })
    }

    /// Iterator over plain bound vectors, every coordinate a block.
    /// This is how a worker re-expands the compact block description it
    /// was handed.
    pub fn from_bounds(
        bounds: &[(usize, usize)],
        package_size: usize,
    ) -> Result<Self, EnumerationError> {
        let coordinates = bounds
            .iter()
            .map(|&(lower, upper)| Coordinate::Block { lower, upper })
            .collect();
        Self::new(coordinates, package_size)
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether the iterator has no coordinates (never true once built).
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Permanently true once the outermost coordinate has overflowed.
    pub fn is_end(&self) -> bool {
        self.finished
    }

    fn coupled_value(&self, index: usize) -> usize {
        match &self.coordinates[index] {
            Coordinate::Block { .. } => self.state[index],
            Coordinate::Set { values } => values[self.state[index]],
            // excluded by validation
            Coordinate::DependentSet { .. } => self.state[index],
        }
    }

    /// Advances to the next state, rippling carries along the update
    /// order. A no-op once finished.
    pub fn step(&mut self) {
        if self.finished {
            return;
        }
        for position in 0..self.order.len() {
            let index = self.order[position];
            match &self.coordinates[index] {
                Coordinate::Block { lower, upper } => {
                    let next = self.state[index] + self.strides[index];
                    if next >= *upper {
                        self.state[index] = *lower;
                    } else {
                        self.state[index] = next;
                        return;
                    }
                }
                Coordinate::Set { values } => {
                    let next = self.state[index] + 1;
                    if next >= values.len() {
                        self.state[index] = 0;
                    } else {
                        self.state[index] = next;
                        return;
                    }
                }
                Coordinate::DependentSet { coupled, table } => {
                    let bound = table[self.coupled_value(*coupled)].len();
                    let next = self.state[index] + 1;
                    if next >= bound {
                        self.state[index] = 0;
                    } else {
                        self.state[index] = next;
                        return;
                    }
                }
            }
        }
        self.finished = true;
    }

    /// Materializes the current coordinate values.
    pub fn as_position(&self) -> Vec<usize> {
        (0..self.coordinates.len())
            .map(|index| match &self.coordinates[index] {
                Coordinate::Block { .. } => self.state[index],
                Coordinate::Set { values } => values[self.state[index]],
                Coordinate::DependentSet { coupled, table } => {
                    table[self.coupled_value(*coupled)][self.state[index]]
                }
            })
            .collect()
    }

    /// Widens the current state into the bounds of the current work
    /// package: blocks become their `[start, start+stride)` sub-range,
    /// everything else a singleton.
    pub fn as_block(&self) -> Vec<(usize, usize)> {
        (0..self.coordinates.len())
            .map(|index| match &self.coordinates[index] {
                Coordinate::Block { upper, .. } => {
                    let start = self.state[index];
                    (start, (start + self.strides[index]).min(*upper))
                }
                _ => {
                    let value = self.position_value(index);
                    (value, value + 1)
                }
            })
            .collect()
    }

    fn position_value(&self, index: usize) -> usize {
        match &self.coordinates[index] {
            Coordinate::Block { .. } => self.state[index],
            Coordinate::Set { values } => values[self.state[index]],
            Coordinate::DependentSet { coupled, table } => {
                table[self.coupled_value(*coupled)][self.state[index]]
            }
        }
    }

    /// Fresh unit-stride iterator over exactly the positions of the
    /// current package.
    pub fn as_block_enumerator(&self) -> Result<BlockIterator, EnumerationError> {
        Self::from_bounds(&self.as_block(), 1)
    }

    /// Number of positions inside the current package.
    pub fn package_volume(&self) -> usize {
        self.as_block()
            .iter()
            .map(|(lower, upper)| upper - lower)
            .product()
    }
}

fn validate(coordinates: &[Coordinate]) -> Result<(), EnumerationError> {
    for (index, coordinate) in coordinates.iter().enumerate() {
        match coordinate {
            Coordinate::Block { lower, upper } => {
                if lower >= upper {
                    return Err(EnumerationError::EmptyRange {
                        index,
                        lower: *lower,
                        upper: *upper,
                    });
                }
            }
            Coordinate::Set { values } => {
                if values.is_empty() {
                    return Err(EnumerationError::EmptySet { index });
                }
            }
            Coordinate::DependentSet { coupled, table } => {
                let coupled = *coupled;
                if coupled >= coordinates.len() || coupled == index {
                    return Err(EnumerationError::BadCoupling { index, coupled });
                }
                let selectable: Vec<usize> = match &coordinates[coupled] {
                    Coordinate::Block { lower, upper } => (*lower..*upper).collect(),
                    Coordinate::Set { values } => values.clone(),
                    Coordinate::DependentSet { .. } => {
                        return Err(EnumerationError::BadCoupling { index, coupled });
                    }
                };
                for row in selectable {
                    match table.get(row) {
                        None => return Err(EnumerationError::CouplingOutOfRange { index }),
                        Some(values) if values.is_empty() => {
                            return Err(EnumerationError::EmptyDependentRow { index, row });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }
    Ok(())
}
