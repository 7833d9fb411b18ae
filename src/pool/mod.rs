//! Fixed worker pool distributing enumeration blocks
//!
//! The coordinator owns the pool and drives the top-level enumeration;
//! workers receive compact block descriptions over per-worker channels,
//! re-expand them locally, and send their per-block store back on a
//! shared completion channel. Assignment applies back-pressure: when no
//! worker is idle the coordinator blocks on the completion channel
//! instead of buffering. The only restart mechanism is the per-block
//! result file: a block whose file already exists is skipped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::curve::{Curve, CurveError};
use crate::enumerate::{BlockIterator, EnumerationError};
use crate::field::{CpuEvaluator, EvaluationBackend, FieldTable, ReductionTable};
use crate::store::files;
use crate::store::{Aggregate, EquivalenceStore, StoreError};

/// Blocks with at least this many positions are worth an accelerator's
/// fixed dispatch overhead.
pub const ACCELERATOR_ELIGIBLE_POSITIONS: usize = 64;

/// Produces one evaluation backend per accelerated worker.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn EvaluationBackend> + Send + Sync>;

/// Errors raised by the pool. Everything here is fatal; the census does
/// not retry in-flight, it restarts and skips finished blocks.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A block description could not be re-expanded.
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// Counting failed on an enumerated position.
    #[error(transparent)]
    Curve(#[from] CurveError),

    /// Registering or persisting a store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// None of the precomputed tables matches the curves' native level.
    #[error("no reduction table for the native level was provided")]
    MissingNativeTable,

    /// A completion arrived for a block the pool never assigned.
    #[error("completion for unassigned block {description}")]
    UnknownBlock {
        /// Debug rendering of the offending bounds.
        description: String,
    },

    /// A completion arrived from the wrong worker.
    #[error("block completed by worker {actual}, assigned to {expected}")]
    WorkerMismatch {
        /// Worker the block was assigned to.
        expected: usize,
        /// Worker that reported completion.
        actual: usize,
    },

    /// A channel closed while work was outstanding.
    #[error("worker channel closed unexpectedly")]
    Disconnected,

    /// A worker thread panicked.
    #[error("worker {worker} panicked")]
    WorkerPanicked {
        /// Worker index.
        worker: usize,
    },
}

/// Read-only context shared by every worker.
#[derive(Clone)]
struct WorkerContext {
    field: Arc<FieldTable>,
    tables: Arc<Vec<ReductionTable>>,
    result_dir: PathBuf,
    twist_closure: bool,
}

enum Assignment {
    Block(Vec<(usize, usize)>),
    Shutdown,
}

struct Completion<A: Aggregate> {
    worker: usize,
    bounds: Vec<(usize, usize)>,
    outcome: Result<EquivalenceStore<A>, PoolError>,
}

/// The coordinator's handle on the worker fleet.
#[derive(Debug)]
pub struct WorkerPool<A: Aggregate> {
    senders: Vec<Sender<Assignment>>,
    completions: Receiver<Completion<A>>,
    handles: Vec<JoinHandle<()>>,
    idle: Vec<usize>,
    accelerated: Vec<bool>,
    outstanding: HashMap<Vec<(usize, usize)>, usize>,
    master: EquivalenceStore<A>,
    result_dir: PathBuf,
    flush_interval: Duration,
    last_flush: Instant,
    assigned_blocks: u64,
    skipped_blocks: u64,
}

impl<A: Aggregate> WorkerPool<A> {
    /// Spawns the worker threads.
    ///
    /// `tables` must contain the native level; workers count every
    /// level in it. The first `accelerated_workers` workers draw their
    /// backend from `backend_factory`; without a factory they fall back
    /// to the CPU path, which is an expected condition, not an error.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        field: Arc<FieldTable>,
        tables: Arc<Vec<ReductionTable>>,
        result_dir: PathBuf,
        workers: usize,
        accelerated_workers: usize,
        twist_closure: bool,
        flush_interval: Duration,
        backend_factory: Option<BackendFactory>,
    ) -> Result<Self, PoolError> {
        let native = field.prime_exponent();
        if !tables.iter().any(|t| t.level() == native) {
            return Err(PoolError::MissingNativeTable);
        }

        let context = WorkerContext {
            field,
            tables,
            result_dir: result_dir.clone(),
            twist_closure,
        };

        let (completion_tx, completions) = mpsc::channel();
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        let mut accelerated = Vec::with_capacity(workers);
        for worker in 0..workers {
            let wants_accelerator = worker < accelerated_workers;
            let backend: Box<dyn EvaluationBackend> = match (&backend_factory, wants_accelerator)
            {
                (Some(factory), true) => factory(),
                (None, true) => {
                    info!(worker, "no accelerated backend available, using cpu");
                    Box::new(CpuEvaluator)
                }
                _ => Box::new(CpuEvaluator),
            };
            accelerated.push(wants_accelerator);

            let (assignment_tx, assignment_rx) = mpsc::channel();
            senders.push(assignment_tx);
            let context = context.clone();
            let completion_tx = completion_tx.clone();
            handles.push(thread::spawn(move || {
                worker_loop::<A>(worker, context, backend, assignment_rx, completion_tx);
            }));
        }

        Ok(Self {
            senders,
            completions,
            handles,
            idle: (0..workers).collect(),
            accelerated,
            outstanding: HashMap::new(),
            master: EquivalenceStore::new(false),
            result_dir,
            flush_interval,
            last_flush: Instant::now(),
            assigned_blocks: 0,
            skipped_blocks: 0,
        })
    }

    /// Hands a block to an idle worker, blocking on completions until
    /// one is idle. Blocks with an existing result file are skipped.
    pub fn assign(&mut self, bounds: Vec<(usize, usize)>) -> Result<(), PoolError> {
        let path = files::block_file_path(&self.result_dir, &bounds);
        if path.exists() {
            debug!(path = %path.display(), "result file exists, skipping block");
            // fold the finished block in so the master flush still
            // covers the whole assignment after a restart
            self.master.merge(files::read_store(&path)?);
            self.skipped_blocks += 1;
            return Ok(());
        }

        let volume: usize = bounds.iter().map(|(l, u)| u - l).product();
        let eligible = volume >= ACCELERATOR_ELIGIBLE_POSITIONS;
        while self.idle.is_empty() {
            self.wait_for_completion()?;
        }
        let worker = self.pick_idle(eligible);
        self.outstanding.insert(bounds.clone(), worker);
        self.assigned_blocks += 1;
        self.senders[worker]
            .send(Assignment::Block(bounds))
            .map_err(|_| PoolError::Disconnected)
    }

    fn pick_idle(&mut self, accelerator_eligible: bool) -> usize {
        let preferred = if accelerator_eligible {
            self.idle.iter().position(|&w| self.accelerated[w])
        } else {
            self.idle.iter().position(|&w| !self.accelerated[w])
        };
        self.idle.remove(preferred.unwrap_or(0))
    }

    fn wait_for_completion(&mut self) -> Result<(), PoolError> {
        let completion = self
            .completions
            .recv()
            .map_err(|_| PoolError::Disconnected)?;
        let expected = self.outstanding.remove(&completion.bounds).ok_or_else(|| {
            PoolError::UnknownBlock {
                description: format!("{:?}", completion.bounds),
            }
        })?;
        if expected != completion.worker {
            return Err(PoolError::WorkerMismatch {
                expected,
                actual: completion.worker,
            });
        }
        self.idle.push(completion.worker);
        let store = completion.outcome?;
        self.master.merge(store);
        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PoolError> {
        let path = self.result_dir.join(files::MASTER_FILE);
        files::write_store(&path, &self.master)?;
        info!(classes = self.master.len(), path = %path.display(), "flushed master store");
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Blocks assigned so far.
    pub fn assigned_blocks(&self) -> u64 {
        self.assigned_blocks
    }

    /// Blocks skipped because their result file already existed.
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks
    }

    /// Drains outstanding blocks, shuts the workers down, flushes the
    /// master store one last time and returns it.
    pub fn close(mut self) -> Result<EquivalenceStore<A>, PoolError> {
        while !self.outstanding.is_empty() {
            self.wait_for_completion()?;
        }
        for sender in &self.senders {
            // a worker that already exited has dropped its receiver
            let _ = sender.send(Assignment::Shutdown);
        }
        for (worker, handle) in self.handles.drain(..).enumerate() {
            handle
                .join()
                .map_err(|_| PoolError::WorkerPanicked { worker })?;
        }
        self.flush()?;
        Ok(self.master)
    }
}

fn worker_loop<A: Aggregate>(
    worker: usize,
    context: WorkerContext,
    backend: Box<dyn EvaluationBackend>,
    assignments: Receiver<Assignment>,
    completions: Sender<Completion<A>>,
) {
    debug!(worker, backend = backend.name(), "worker online");
    while let Ok(assignment) = assignments.recv() {
        match assignment {
            Assignment::Shutdown => break,
            Assignment::Block(bounds) => {
                let outcome = process_block::<A>(&context, backend.as_ref(), &bounds);
                if completions
                    .send(Completion {
                        worker,
                        bounds,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
    debug!(worker, "worker offline");
}

/// Runs one block end to end: re-enumerate, count, register, persist.
fn process_block<A: Aggregate>(
    context: &WorkerContext,
    backend: &dyn EvaluationBackend,
    bounds: &[(usize, usize)],
) -> Result<EquivalenceStore<A>, PoolError> {
    let native = context.field.prime_exponent();
    let native_table = context
        .tables
        .iter()
        .find(|t| t.level() == native)
        .ok_or(PoolError::MissingNativeTable)?;

    let mut iterator = BlockIterator::from_bounds(bounds, 1)?;
    let mut store = EquivalenceStore::new(context.twist_closure);
    let mut registered = 0u64;
    let mut skipped = 0u64;
    while !iterator.is_end() {
        let position = iterator.as_position();
        iterator.step();
        let mut curve = match Curve::new(Arc::clone(&context.field), position) {
            Ok(curve) => curve,
            // a hand-written block may brush the zero polynomial corner
            Err(CurveError::ZeroPolynomial | CurveError::ConstantPolynomial) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !curve.is_squarefree(native_table)? {
            // singular affine model, not a member of the family
            skipped += 1;
            continue;
        }
        curve.count_tower(&context.tables, backend)?;
        store.register(&curve, native_table)?;
        registered += 1;
    }

    files::write_store(&files::block_file_path(&context.result_dir, bounds), &store)?;
    debug!(registered, skipped, "block finished");
    Ok(store)
}
