//! The bus: the single serialization point connecting every cache to every
//! other cache and to main memory.
//!
//! Broadcast is synchronous and atomic with respect to other bus operations.
//! One processor operation runs to completion before the next begins:
//! snoops handled, responses aggregated, write-backs performed. There is no
//! threading or message passing here. Caches call straight through to the
//! bus and back.
//!
//! The Bus owns every attached cache directly, behind a `RefCell` for the
//! interior mutability a snoop needs. A `Cache` never stores a `Bus`
//! reference of its own; one is threaded through each call instead.

use std::cell::RefCell;

use crate::cache::{Cache, CacheBlock, Intent, SnoopMessage, SnoopResponse};
use crate::error::Result;
use crate::main_memory::{Address, BlockBase, MainMemory};
use crate::value::Value;

/// The bus. Owns main memory and every attached cache.
pub struct Bus<V: Value> {
    pub(crate) caches: Vec<RefCell<Cache<V>>>,
    memory: RefCell<MainMemory<V>>,
}

impl<V: Value> Bus<V> {
    /// Create a bus over the given main memory, with no caches attached
    /// yet.
    pub fn new(memory: MainMemory<V>) -> Self {
        Bus {
            caches: Vec::new(),
            memory: RefCell::new(memory),
        }
    }

    /// Register a cache. Order of attachment determines snoop broadcast
    /// order but must not affect observable results. Returns the id used to
    /// address this cache in `read`/`write`/`cache`.
    pub fn attach(&mut self, cache: Cache<V>) -> usize {
        self.caches.push(RefCell::new(cache));
        self.caches.len() - 1
    }

    /// Number of attached caches.
    pub fn n_caches(&self) -> usize {
        self.caches.len()
    }

    /// A handle through which `sender`'s processor-facing `read`/`write`
    /// can be invoked without the caller threading the bus reference and
    /// cache id through by hand.
    pub fn cache(&self, id: usize) -> CacheHandle<'_, V> {
        CacheHandle { bus: self, id }
    }

    /// Invoke `handle_snoop` on every attached cache other than `sender`,
    /// and aggregate their responses: `Shared` if any respondent returned
    /// `Shared`, `Ok` otherwise.
    pub fn broadcast(
        &self,
        message: SnoopMessage,
        block_base: BlockBase,
        sender: usize,
    ) -> Result<SnoopResponse> {
        let mut saw_shared = false;

        for (id, cache) in self.caches.iter().enumerate() {
            if id == sender {
                continue;
            }
            log::trace!("broadcasting {message:?} for block {block_base} to cache {id}");
            let response = cache.borrow_mut().handle_snoop(self, message, block_base)?;
            if response == SnoopResponse::Shared {
                saw_shared = true;
            }
        }

        Ok(if saw_shared {
            SnoopResponse::Shared
        } else {
            SnoopResponse::Ok
        })
    }

    /// Forward a write-back to main memory.
    pub fn write_back(&self, address: Address, data: &[Option<V>]) -> Result<()> {
        self.memory.borrow_mut().write(address, data)
    }

    /// Forward a fetch to main memory.
    pub fn read_from_main(&self, address: Address) -> Result<Vec<Option<V>>> {
        self.memory.borrow().read(address)
    }

    /// Reset main memory to empty.
    pub fn clear_memory(&self) {
        self.memory.borrow_mut().clear();
    }

    /// The block size main memory (and every attached cache) is
    /// partitioned into.
    pub fn block_size(&self) -> usize {
        self.memory.borrow().block_size()
    }

    /// The total number of addressable cells in main memory.
    pub fn memory_size(&self) -> usize {
        self.memory.borrow().len()
    }
}

/// A thin, ergonomic view of one attached cache, exposing a plain
/// `read(address)`/`write(address, value)` surface backed by the bus and
/// cache-id plumbing `Cache::read`/`write` actually require.
pub struct CacheHandle<'a, V: Value> {
    bus: &'a Bus<V>,
    id: usize,
}

impl<'a, V: Value> CacheHandle<'a, V> {
    /// Read the block containing `address`, resolving any coherence
    /// traffic a miss requires.
    pub fn read(&self, address: Address) -> Result<CacheBlock<V>> {
        let mut cache = self.bus.caches[self.id].borrow_mut();
        let block = cache.read(self.bus, self.id, address, Intent::Read, false)?;
        Ok(block.expect("a non-local read always installs or finds a block"))
    }

    /// Write `value` to `address`, resolving any coherence traffic the
    /// write requires.
    pub fn write(&self, address: Address, value: V) -> Result<()> {
        let mut cache = self.bus.caches[self.id].borrow_mut();
        cache.write(self.bus, self.id, address, value)
    }

    /// The id this handle addresses.
    pub fn id(&self) -> usize {
        self.id
    }
}
