//! Cache implementation: the MESI coherence state machine.
//!
//! A fully-associative store of cache blocks with FIFO replacement. Exposes
//! processor-facing `read`/`write` and bus-facing `handle_snoop`.
//! See <https://en.wikipedia.org/wiki/MESI_protocol>.

use std::collections::{HashMap, VecDeque};

use crate::bus::Bus;
use crate::error::Result;
use crate::main_memory::{block_base, Address, BlockBase};
use crate::value::Value;

/// The current MESI state of a cache block.
///
/// <pre>
///   M E S I
/// M ✗ ✗ ✗ ✓
/// E ✗ ✗ ✗ ✓
/// S ✗ ✗ ✓ ✓
/// I ✓ ✓ ✓ ✓
/// </pre>
/// A `✓` means two caches may simultaneously hold a block in that pair of
/// states. A `✗` means they may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MesiState {
    /// Present only in this cache, and dirty: main memory is stale. Must be
    /// written back before any other cache or main memory observes a fresh
    /// value.
    Modified,
    /// Present only in this cache, and clean: matches main memory.
    Exclusive,
    /// Possibly present in other caches too; clean.
    Shared,
    /// Semantically absent. Reads treat this as a miss.
    Invalid,
}

/// Whether a processor operation intends only to read, or to read-then-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A plain load.
    Read,
    /// A load that is about to be followed by a local mutation.
    Write,
}

/// Bus messages a cache can broadcast, or receive as a snoop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoopMessage {
    /// A plain read.
    Read,
    /// A read with intent to modify (demands exclusive ownership).
    ReadWithIntentToModify,
    /// Demands that all other copies be invalidated.
    Invalidate,
}

/// The outcome of a broadcast, aggregated across every snooping cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoopResponse {
    /// No other cache held the block in a state requiring a reply.
    Ok,
    /// At least one other cache holds (or now holds) the block `Shared`.
    Shared,
    /// A snoop handler was asked about a message it does not understand.
    /// `handle_snoop` never returns this today, since `SnoopMessage` is a
    /// closed set, but the response type carries it for completeness.
    Invalid,
}

/// A single resident cache block: its MESI tag and its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBlock<V: Value> {
    /// The block's current coherence state.
    pub tag: MesiState,
    /// The block's contents, one optional value per cell.
    pub data: Vec<Option<V>>,
}

/// A fully-associative, FIFO-replacement cache of `n_max` blocks of
/// `block_size` cells each.
pub struct Cache<V: Value> {
    n_max: usize,
    block_size: usize,
    data: HashMap<BlockBase, CacheBlock<V>>,
    queue: VecDeque<BlockBase>,
}

impl<V: Value> Cache<V> {
    /// Create an empty cache holding up to `n_max` blocks of `block_size`
    /// cells.
    pub fn new(n_max: usize, block_size: usize) -> Self {
        Cache {
            n_max,
            block_size,
            data: HashMap::with_capacity(n_max),
            queue: VecDeque::with_capacity(n_max),
        }
    }

    /// Number of blocks currently resident. Equal to `self.queue.len()` by
    /// construction; checked in tests.
    pub fn resident_count(&self) -> usize {
        self.data.len()
    }

    /// The max number of blocks this cache can hold.
    pub fn capacity(&self) -> usize {
        self.n_max
    }

    /// Non-coherent, in-cache-only lookup. Returns `Some` if `bi` is
    /// resident with a non-`Invalid` tag, `None` otherwise (absent or
    /// logically invalid). Never touches the bus. Used by both `read`'s hit
    /// check and `handle_snoop`'s own in-cache check.
    pub(crate) fn lookup(&self, bi: BlockBase) -> Option<&CacheBlock<V>> {
        self.data.get(&bi).filter(|block| block.tag != MesiState::Invalid)
    }

    /// Full-coherence read.
    ///
    /// `intent` selects `Read` vs `ReadWithIntentToModify` traffic on a
    /// miss. `local` marks snoop-originated lookups: those never broadcast
    /// and return `None` on miss instead of recursing into the bus.
    pub fn read(
        &mut self,
        bus: &Bus<V>,
        id: usize,
        address: Address,
        intent: Intent,
        local: bool,
    ) -> Result<Option<CacheBlock<V>>> {
        let bi = block_base(address, self.block_size);

        if let Some(block) = self.lookup(bi) {
            log_hit(intent);
            return Ok(Some(block.clone()));
        }

        if local {
            return Ok(None);
        }

        log_miss(intent);

        let message = match intent {
            Intent::Read => SnoopMessage::Read,
            Intent::Write => SnoopMessage::ReadWithIntentToModify,
        };
        let response = bus.broadcast(message, bi, id)?;

        // The requester's memory fetch happens after every snoop response,
        // including any write-backs they perform. `broadcast` above already
        // ran to completion, so the fetch below sees their effects.
        let fetched = bus.read_from_main(address)?;

        let tag = if response == SnoopResponse::Shared {
            MesiState::Shared
        } else {
            MesiState::Exclusive
        };

        let block = CacheBlock { tag, data: fetched };
        self.install(bus, bi, block.clone())?;
        Ok(Some(block))
    }

    /// Processor-facing write.
    pub fn write(&mut self, bus: &Bus<V>, id: usize, address: Address, value: V) -> Result<()> {
        let bi = block_base(address, self.block_size);

        let block = self
            .read(bus, id, address, Intent::Write, false)?
            .expect("a non-local read always installs or finds a block");

        if block.tag == MesiState::Shared {
            bus.broadcast(SnoopMessage::Invalidate, bi, id)?;
        }

        let index = address % self.block_size;
        let entry = self
            .data
            .get_mut(&bi)
            .expect("block installed by the read above");
        entry.data[index] = Some(value);
        entry.tag = MesiState::Modified;

        Ok(())
    }

    /// Install a freshly fetched block at `bi`, evicting the FIFO head with
    /// write-back if at capacity.
    fn install(&mut self, bus: &Bus<V>, bi: BlockBase, block: CacheBlock<V>) -> Result<()> {
        if self.data.contains_key(&bi) {
            // Already present (invalid or otherwise stale): replace in
            // place, the FIFO queue is untouched.
            self.data.insert(bi, block);
            return Ok(());
        }

        if self.queue.len() == self.n_max {
            let evicted_base = self.queue.pop_front().expect("n_max > 0 to get here");
            if let Some(evicted) = self.data.remove(&evicted_base) {
                // Writes back unconditionally, even for Shared/Exclusive
                // blocks whose contents already match memory.
                log::debug!("evicting block {evicted_base}, writing back");
                bus.write_back(evicted_base, &evicted.data)?;
            }
        }

        self.queue.push_back(bi);
        self.data.insert(bi, block);
        Ok(())
    }

    /// Bus-facing snoop handler: the MESI state machine.
    pub fn handle_snoop(
        &mut self,
        bus: &Bus<V>,
        message: SnoopMessage,
        bi: BlockBase,
    ) -> Result<SnoopResponse> {
        let tag = self.lookup(bi).map(|b| b.tag).unwrap_or(MesiState::Invalid);

        match (message, tag) {
            (SnoopMessage::Read, MesiState::Invalid) => Ok(SnoopResponse::Ok),
            (SnoopMessage::Read, MesiState::Modified) => {
                let data = self.data[&bi].data.clone();
                bus.write_back(bi, &data)?;
                self.data.get_mut(&bi).unwrap().tag = MesiState::Shared;
                Ok(SnoopResponse::Shared)
            }
            (SnoopMessage::Read, MesiState::Exclusive) => {
                self.data.get_mut(&bi).unwrap().tag = MesiState::Shared;
                Ok(SnoopResponse::Shared)
            }
            (SnoopMessage::Read, MesiState::Shared) => Ok(SnoopResponse::Shared),

            (SnoopMessage::ReadWithIntentToModify, MesiState::Invalid) => Ok(SnoopResponse::Ok),
            (SnoopMessage::ReadWithIntentToModify, MesiState::Modified) => {
                let data = self.data[&bi].data.clone();
                bus.write_back(bi, &data)?;
                self.data.get_mut(&bi).unwrap().tag = MesiState::Invalid;
                Ok(SnoopResponse::Ok)
            }
            (SnoopMessage::ReadWithIntentToModify, _) => {
                self.data.get_mut(&bi).unwrap().tag = MesiState::Invalid;
                Ok(SnoopResponse::Ok)
            }

            (SnoopMessage::Invalidate, MesiState::Invalid) => Ok(SnoopResponse::Ok),
            (SnoopMessage::Invalidate, _) => {
                self.data.get_mut(&bi).unwrap().tag = MesiState::Invalid;
                Ok(SnoopResponse::Ok)
            }
        }
    }
}

fn log_hit(intent: Intent) {
    match intent {
        Intent::Read => log::debug!("Read Hit"),
        Intent::Write => log::debug!("Write Hit"),
    }
}

fn log_miss(intent: Intent) {
    match intent {
        Intent::Read => log::debug!("Read Miss"),
        Intent::Write => log::debug!("Write Miss"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_memory::MainMemory;
    use crate::value::BloodType;

    const B: usize = 2;
    const L: usize = 2;

    fn memory_with(values: &[BloodType]) -> MainMemory<BloodType> {
        let mut mem = MainMemory::new(values.len(), B);
        let block: Vec<Option<BloodType>> = values.iter().map(|v| Some(*v)).collect();
        mem.write(0, &block).unwrap();
        mem
    }

    fn new_bus(values: &[BloodType], n_caches: usize) -> Bus<BloodType> {
        let mem = memory_with(values);
        let mut bus = Bus::new(mem);
        for _ in 0..n_caches {
            bus.attach(Cache::new(L, B));
        }
        bus
    }

    #[test]
    fn exclusive_then_shared() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 2);

        let block = bus.cache(0).read(0).unwrap();
        assert_eq!(block.tag, MesiState::Exclusive);
        assert_eq!(block.data, vec![Some(BloodType::APos), Some(BloodType::ANeg)]);

        let block1 = bus.cache(1).read(0).unwrap();
        assert_eq!(block1.tag, MesiState::Shared);
        assert_eq!(block1.data, vec![Some(BloodType::APos), Some(BloodType::ANeg)]);

        // C1's own copy also transitioned to Shared.
        let c0_block = bus.caches[0].borrow().lookup(0).cloned().unwrap();
        assert_eq!(c0_block.tag, MesiState::Shared);
    }

    #[test]
    fn write_to_exclusive_becomes_modified_without_invalidate() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 2);
        bus.cache(0).read(0).unwrap();
        bus.cache(0).write(0, BloodType::BPos).unwrap();

        let block = bus.caches[0].borrow().lookup(0).cloned().unwrap();
        assert_eq!(block.tag, MesiState::Modified);
        assert_eq!(block.data, vec![Some(BloodType::BPos), Some(BloodType::ANeg)]);

        // Memory is stale until write-back.
        assert_eq!(
            bus.read_from_main(0).unwrap(),
            vec![Some(BloodType::APos), Some(BloodType::ANeg)]
        );
    }

    #[test]
    fn snoop_read_on_modified_writes_back_and_shares() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 2);
        bus.cache(0).read(0).unwrap();
        bus.cache(0).write(0, BloodType::BPos).unwrap();

        let block1 = bus.cache(1).read(0).unwrap();
        assert_eq!(block1.tag, MesiState::Shared);
        assert_eq!(block1.data, vec![Some(BloodType::BPos), Some(BloodType::ANeg)]);

        let c0_block = bus.caches[0].borrow().lookup(0).cloned().unwrap();
        assert_eq!(c0_block.tag, MesiState::Shared);

        assert_eq!(
            bus.read_from_main(0).unwrap(),
            vec![Some(BloodType::BPos), Some(BloodType::ANeg)]
        );
    }

    #[test]
    fn write_to_shared_triggers_invalidate() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 2);
        bus.cache(0).read(0).unwrap();
        bus.cache(1).read(0).unwrap();

        bus.cache(0).write(0, BloodType::OPos).unwrap();

        let c0_block = bus.caches[0].borrow().lookup(0).cloned().unwrap();
        assert_eq!(c0_block.tag, MesiState::Modified);
        assert_eq!(c0_block.data, vec![Some(BloodType::OPos), Some(BloodType::ANeg)]);

        let c1_block = bus.caches[1].borrow().lookup(0);
        assert!(c1_block.is_none(), "C2's copy must be invalidated");
    }

    #[test]
    fn fifo_eviction_with_write_back_concrete_scenario() {
        let mem = MainMemory::new(6, B);
        let mut bus = Bus::new(mem);
        bus.attach(Cache::new(L, B));

        bus.cache(0).read(0).unwrap();
        bus.cache(0).write(0, BloodType::OPos).unwrap();
        bus.cache(0).read(2).unwrap();
        bus.cache(0).write(3, BloodType::APos).unwrap();

        assert_eq!(bus.caches[0].borrow().resident_count(), 2);

        // base 0 is the FIFO head; reading a third, uncached block must
        // evict it and write its modified data back to memory.
        bus.cache(0).read(4).unwrap();

        assert!(bus.caches[0].borrow().lookup(0).is_none());
        assert_eq!(
            bus.read_from_main(0).unwrap(),
            vec![Some(BloodType::OPos), None]
        );
    }

    #[test]
    fn rwitm_invalidates_modified_elsewhere() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 2);
        bus.cache(0).read(0).unwrap();
        bus.cache(0).write(0, BloodType::OPos).unwrap();

        bus.cache(1).write(0, BloodType::BNeg).unwrap();

        assert!(bus.caches[0].borrow().lookup(0).is_none());

        let c1_block = bus.caches[1].borrow().lookup(0).cloned().unwrap();
        assert_eq!(c1_block.tag, MesiState::Modified);
        assert_eq!(c1_block.data, vec![Some(BloodType::BNeg), Some(BloodType::ANeg)]);
    }

    #[test]
    fn repeated_read_is_idempotent() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 1);
        let first = bus.cache(0).read(0).unwrap();
        let second = bus.cache(0).read(0).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.tag, MesiState::Exclusive);
    }

    #[test]
    fn at_most_one_cache_holds_modified_or_exclusive() {
        let bus = new_bus(&[BloodType::APos, BloodType::ANeg], 3);
        bus.cache(0).read(0).unwrap();

        for id in 1..3 {
            let block = bus.cache(id).read(0).unwrap();
            assert_eq!(block.tag, MesiState::Shared);
        }

        let exclusive_or_modified = (0..3)
            .filter(|&id| {
                matches!(
                    bus.caches[id].borrow().lookup(0).map(|b| b.tag),
                    Some(MesiState::Exclusive) | Some(MesiState::Modified)
                )
            })
            .count();
        assert!(exclusive_or_modified <= 1);
    }
}
