//! # Hasse
//!
//! A census engine for hyperelliptic curves over finite fields: it
//! enumerates the coefficient space of `y^2 = f(x)` up to the known
//! symmetries, counts rational points over a tower of extension fields
//! with table-driven discrete-log arithmetic, and aggregates curves
//! into isomorphism classes keyed by ramification type and Hasse-Weil
//! offsets.
//!
//! ## Pipeline
//!
//! 1. **Field tables**: one [`FieldTable`] per configuration and one
//!    [`ReductionTable`] per tower level, built once and shared
//!    read-only across workers
//! 2. **Enumeration**: a [`CurveFamily`] yields [`BlockIterator`]s that
//!    walk the coefficient space in work packages without ever
//!    materializing it
//! 3. **Distribution**: a [`WorkerPool`] hands packages to worker
//!    threads; each re-expands its block, counts points per curve, and
//!    registers the results into a local [`EquivalenceStore`]
//! 4. **Aggregation**: per-block stores land in idempotent result
//!    files; the commutative, associative merge folds any partition of
//!    the blocks into the same final artifact
//!
//! ## Usage Example
//!
//! ```ignore
//! use hasse::{Census, CensusConfig};
//!
//! let config = CensusConfig::load("census.yaml".as_ref())?;
//! let report = Census::new(config)?.run()?;
//! println!("{} classes from {} curves", report.classes, report.curves);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod curve;
pub mod enumerate;
pub mod field;
pub mod pool;
pub mod store;
pub mod util;

// Re-exports for convenience
pub use config::{CensusConfig, ConfigError, StoreMode};
pub use curve::{Curve, CurveError};
pub use enumerate::{BlockIterator, Coordinate, CurveFamily, EnumerationError};
pub use field::{CpuEvaluator, EvaluationBackend, FieldError, FieldTable, ReductionTable};
pub use pool::{BackendFactory, PoolError, WorkerPool};
pub use store::{
    Aggregate, ClassCount, ClassRepresentatives, CurveInvariant, EquivalenceStore, StoreError,
};

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

/// Any fatal condition a census run can end with.
#[derive(Debug, Error)]
pub enum CensusError {
    /// Invalid run configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Field table construction failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The enumeration setup is inconsistent.
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// Distribution or counting failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Persisting or merging stores failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct CensusReport {
    /// Distinct equivalence classes in the master store.
    pub classes: usize,
    /// Curves registered across all classes.
    pub curves: u64,
    /// Blocks dispatched to workers.
    pub assigned_blocks: u64,
    /// Blocks skipped because their result file already existed.
    pub skipped_blocks: u64,
    /// Location of the flushed master store.
    pub master_file: PathBuf,
}

/// Top-level orchestrator: wires configuration, tables, enumeration and
/// the worker pool together.
#[derive(Debug)]
pub struct Census {
    config: CensusConfig,
}

impl Census {
    /// Validates the configuration and wraps it.
    pub fn new(config: CensusConfig) -> Result<Self, CensusError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs the full census with the configured store aggregate.
    pub fn run(&self) -> Result<CensusReport, CensusError> {
        match self.config.store {
            StoreMode::Counts => self.run_with::<ClassCount>(),
            StoreMode::Representatives => self.run_with::<ClassRepresentatives>(),
        }
    }

    /// Runs the full census with an explicit aggregate type.
    pub fn run_with<A: Aggregate>(&self) -> Result<CensusReport, CensusError> {
        let config = &self.config;
        let field = Arc::new(FieldTable::new(config.prime, config.prime_exponent)?);
        let native = field.prime_exponent();
        let tables = (1..=config.genus)
            .map(|k| ReductionTable::new(&field, k * native))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            prime = config.prime,
            exponent = native,
            genus = config.genus,
            levels = tables.len(),
            "field tables built"
        );

        let mut pool = WorkerPool::<A>::new(
            Arc::clone(&field),
            Arc::new(tables),
            config.result_dir.clone(),
            config.workers,
            config.accelerated_workers,
            config.twist_closure,
            config.flush_interval(),
            None,
        )?;

        let family = CurveFamily::new(Arc::clone(&field), config.genus)?
            .single_square_class(config.twist_closure);
        for mut iterator in family.block_iterators(config.package_size)? {
            while !iterator.is_end() {
                pool.assign(iterator.as_block())?;
                iterator.step();
            }
        }

        let assigned_blocks = pool.assigned_blocks();
        let skipped_blocks = pool.skipped_blocks();
        let master = pool.close()?;
        info!(
            classes = master.len(),
            curves = master.total_count(),
            assigned_blocks,
            skipped_blocks,
            "census finished"
        );
        Ok(CensusReport {
            classes: master.len(),
            curves: master.total_count(),
            assigned_blocks,
            skipped_blocks,
            master_file: config.result_dir.join(store::files::MASTER_FILE),
        })
    }
}
