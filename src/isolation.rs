/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Decoding of untrusted transaction payloads under a size ceiling and a wall-clock timeout.
//!
//! Decoding runs on a dedicated worker thread that shares nothing with block execution except the bytes
//! it is given and the value it sends back. If the worker does not answer within the timeout, the
//! caller stops waiting for it and the worker is detached: whatever it eventually produces is dropped
//! with its channel.
//!
//! Detached workers still hold a slot until they finish. At most `max_workers` workers exist at any time,
//! counting detached ones, and a decode that finds every slot taken fails with
//! [`IsolationError::WorkersExhausted`] instead of spawning another thread.

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};

use borsh::BorshDeserialize;

/// Number of decoding workers that may exist at once, unless configured otherwise.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Clones share their worker slots.
#[derive(Clone, Debug)]
pub struct IsolatedDecoder {
    timeout: Duration,
    max_bytes: usize,
    max_workers: usize,
    live_workers: Arc<AtomicUsize>,
}

impl IsolatedDecoder {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        Self {
            timeout,
            max_bytes,
            max_workers: DEFAULT_MAX_WORKERS,
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the number of workers, detached ones included, that may exist at once.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Number of workers that have not yet finished.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Borsh-decode a `T` out of `bytes`.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, IsolationError>
    where
        T: BorshDeserialize + Send + 'static,
    {
        self.run(bytes.to_vec(), |input| {
            T::try_from_slice(&input).map_err(|source| IsolationError::Malformed { source })
        })
    }

    /// Run `work` over `input` on a worker thread, enforcing this decoder's limits.
    pub fn run<T, F>(&self, input: Vec<u8>, work: F) -> Result<T, IsolationError>
    where
        T: Send + 'static,
        F: FnOnce(Vec<u8>) -> Result<T, IsolationError> + Send + 'static,
    {
        if input.len() > self.max_bytes {
            return Err(IsolationError::MemoryLimitExceeded {
                size: input.len(),
                limit: self.max_bytes,
            });
        }

        let slot = self.acquire_slot()?;
        let (result_sender, result_receiver) = mpsc::channel();
        thread::Builder::new()
            .name("isolated-decoder".to_string())
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone if the caller timed out.
                let _ = result_sender.send(work(input));
            })
            .map_err(|source| IsolationError::SpawnFailed { source })?;

        match result_receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Decoding a transaction took longer than {:?}; detaching its worker.",
                    self.timeout
                );
                Err(IsolationError::Timeout {
                    limit: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(IsolationError::WorkerLost),
        }
    }

    fn acquire_slot(&self) -> Result<WorkerSlot, IsolationError> {
        self.live_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max_workers).then(|| live + 1)
            })
            .map_err(|_| {
                log::warn!(
                    "All {} decoding workers are busy; rejecting the transaction.",
                    self.max_workers
                );
                IsolationError::WorkersExhausted {
                    limit: self.max_workers,
                }
            })?;
        Ok(WorkerSlot {
            live_workers: Arc::clone(&self.live_workers),
        })
    }
}

// Released when the worker finishes, or when the worker could not be spawned.
struct WorkerSlot {
    live_workers: Arc<AtomicUsize>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Error when decoding in isolation. None of these affect block execution state.
#[derive(Debug)]
pub enum IsolationError {
    MemoryLimitExceeded { size: usize, limit: usize },
    Timeout { limit: Duration },
    /// The worker exited without a result, e.g., because it panicked.
    WorkerLost,
    SpawnFailed { source: io::Error },
    /// Every worker slot is held, possibly by detached workers that are still running.
    WorkersExhausted { limit: usize },
    Malformed { source: io::Error },
}

impl IsolationError {
    /// Response code reported for a transaction that failed this way.
    pub fn code(&self) -> u32 {
        match self {
            IsolationError::MemoryLimitExceeded { .. } => 1,
            IsolationError::Timeout { .. } => 2,
            IsolationError::WorkerLost
            | IsolationError::SpawnFailed { .. }
            | IsolationError::WorkersExhausted { .. } => 3,
            IsolationError::Malformed { .. } => 4,
        }
    }
}

impl fmt::Display for IsolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationError::MemoryLimitExceeded { size, limit } => write!(
                f,
                "payload of {} bytes exceeds the limit of {} bytes",
                size, limit
            ),
            IsolationError::Timeout { limit } => write!(f, "decoding timed out after {:?}", limit),
            IsolationError::WorkerLost => write!(f, "decoding worker exited without a result"),
            IsolationError::SpawnFailed { source } => {
                write!(f, "cannot spawn decoding worker: {}", source)
            }
            IsolationError::WorkersExhausted { limit } => {
                write!(f, "all {} decoding workers are busy", limit)
            }
            IsolationError::Malformed { source } => write!(f, "malformed payload: {}", source),
        }
    }
}

impl std::error::Error for IsolationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IsolationError::SpawnFailed { source } | IsolationError::Malformed { source } => {
                Some(source)
            }
            _ => None,
        }
    }
}
