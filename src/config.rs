//! Run configuration
//!
//! A census run is described by a small YAML file; every invalid value
//! is rejected here, before any table is built or worker spawned.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::util::is_prime;

/// Errors raised while loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration {path}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("cannot parse configuration {path}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The configured characteristic is not prime.
    #[error("prime {0} is not a prime number")]
    NotPrime(u64),

    /// Characteristic 2 has no `Y^2 = f(X)` census.
    #[error("characteristic 2 is not supported")]
    EvenCharacteristic,

    /// A numeric field that must be positive is zero.
    #[error("{field} must be positive")]
    ZeroField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// More accelerated workers requested than workers exist.
    #[error("accelerated_workers {accelerated} exceeds workers {workers}")]
    TooManyAccelerated {
        /// Requested accelerated workers.
        accelerated: usize,
        /// Total workers.
        workers: usize,
    },

    /// The result directory does not exist and cannot be created.
    #[error("result directory {path} is not usable")]
    ResultDir {
        /// Directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Which aggregate the stores carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// Count curves per class.
    #[default]
    Counts,
    /// Count curves and keep their coefficient vectors.
    Representatives,
}

/// Parameters of one census run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CensusConfig {
    /// Field characteristic p.
    pub prime: u64,
    /// Prime exponent r of the field the curves are defined over.
    #[serde(default = "default_prime_exponent")]
    pub prime_exponent: usize,
    /// Genus of the family.
    pub genus: usize,
    /// Positions grouped into one dispatch unit.
    pub package_size: usize,
    /// Directory for per-block and master result files.
    pub result_dir: PathBuf,
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How many of the workers prefer accelerator-eligible blocks.
    #[serde(default)]
    pub accelerated_workers: usize,
    /// Aggregate carried per class.
    #[serde(default)]
    pub store: StoreMode,
    /// Register the quadratic twist alongside every curve.
    #[serde(default)]
    pub twist_closure: bool,
    /// Seconds between master flushes.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
}

fn default_prime_exponent() -> usize {
    1
}

fn default_workers() -> usize {
    1
}

fn default_flush_interval() -> u64 {
    300
}

impl CensusConfig {
    /// Loads and validates a YAML run file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every bound and makes sure the result directory exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prime == 2 {
            return Err(ConfigError::EvenCharacteristic);
        }
        if !is_prime(self.prime) {
            return Err(ConfigError::NotPrime(self.prime));
        }
        for (value, field) in [
            (self.prime_exponent as u64, "prime_exponent"),
            (self.genus as u64, "genus"),
            (self.package_size as u64, "package_size"),
            (self.workers as u64, "workers"),
            (self.flush_interval_secs, "flush_interval_secs"),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroField { field });
            }
        }
        if self.accelerated_workers > self.workers {
            return Err(ConfigError::TooManyAccelerated {
                accelerated: self.accelerated_workers,
                workers: self.workers,
            });
        }
        fs::create_dir_all(&self.result_dir).map_err(|source| ConfigError::ResultDir {
            path: self.result_dir.clone(),
            source,
        })?;
        Ok(())
    }

    /// Master flush cadence.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
