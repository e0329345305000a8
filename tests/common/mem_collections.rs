//! In-memory [`DocumentCollections`], with injectable collection creation failures.

use std::{
    collections::BTreeMap,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use drive_rs::{store::pluggables::DocumentCollections, types::data_types::Identifier};

type Collection = BTreeMap<Identifier, Vec<u8>>;

/// Clones share the same collections.
#[derive(Clone)]
pub(crate) struct MemCollections {
    collections: Arc<Mutex<BTreeMap<Identifier, Collection>>>,
    fail_creates: Arc<AtomicBool>,
}

impl MemCollections {
    pub(crate) fn new() -> MemCollections {
        MemCollections {
            collections: Arc::new(Mutex::new(BTreeMap::new())),
            fail_creates: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst)
    }

    pub(crate) fn collection_count(&self) -> usize {
        self.collections.lock().unwrap().len()
    }
}

fn not_found(contract: &Identifier) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("collection {} does not exist", contract),
    )
}

impl DocumentCollections for MemCollections {
    fn create(&mut self, contract: &Identifier) -> io::Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected create failure"));
        }
        self.collections
            .lock()
            .unwrap()
            .entry(*contract)
            .or_default();
        Ok(())
    }

    fn drop_collection(&mut self, contract: &Identifier) -> io::Result<()> {
        self.collections.lock().unwrap().remove(contract);
        Ok(())
    }

    fn exists(&self, contract: &Identifier) -> bool {
        self.collections.lock().unwrap().contains_key(contract)
    }

    fn put(&mut self, contract: &Identifier, document: &Identifier, bytes: &[u8]) -> io::Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.get_mut(contract).ok_or_else(|| not_found(contract))?;
        collection.insert(*document, bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, contract: &Identifier, document: &Identifier) -> io::Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.get_mut(contract).ok_or_else(|| not_found(contract))?;
        collection.remove(document);
        Ok(())
    }

    fn get(&self, contract: &Identifier, document: &Identifier) -> Option<Vec<u8>> {
        self.collections
            .lock()
            .unwrap()
            .get(contract)
            .and_then(|collection| collection.get(document).cloned())
    }
}
