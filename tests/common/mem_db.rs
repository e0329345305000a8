//! A simple, volatile, in-memory implementation of [`KVStore`], with injectable write failures and a
//! count of full scans.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use drive_rs::store::pluggables::{KVGet, KVStore, WriteBatch};

/// An in-memory implementation of [`KVStore`]. Clones share the same map.
#[derive(Clone)]
pub(crate) struct MemDB {
    map: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
    // Writes that may still succeed. `usize::MAX` means no limit.
    writes_left: Arc<AtomicUsize>,
    scans: Arc<AtomicUsize>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB {
            map: Arc::new(Mutex::new(BTreeMap::new())),
            writes_left: Arc::new(AtomicUsize::new(usize::MAX)),
            scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every following `write` fail (or succeed again) without touching the map.
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.writes_left
            .store(if fail { 0 } else { usize::MAX }, Ordering::SeqCst)
    }

    /// Let the next `writes` writes succeed, then fail every following one.
    pub(crate) fn fail_writes_after(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst)
    }

    /// Number of times `entries` was called.
    pub(crate) fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;

    fn write(&mut self, wb: Self::WriteBatch) -> io::Result<()> {
        let allowed = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                left => Some(left - 1),
            })
            .is_ok();
        if !allowed {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let mut map = self.map.lock().unwrap();
        for (key, value) in wb.insertions {
            map.insert(key, value);
        }
        for key in wb.deletions {
            map.remove(&key);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.map.lock().unwrap().clear();
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.map
            .lock()
            .unwrap()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: BTreeMap<Vec<u8>, Vec<u8>>,
    deletions: BTreeSet<Vec<u8>>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: BTreeMap::new(),
            deletions: BTreeSet::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }
}
