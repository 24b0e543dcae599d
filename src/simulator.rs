//! The simulator: wires together one main memory, one bus, and `n_caches`
//! caches.

use rand::distributions::{Distribution, Standard};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::bus::{Bus, CacheHandle};
use crate::cache::Cache;
use crate::config::SimulatorConfig;
use crate::error::Result;
use crate::main_memory::{Address, MainMemory};
use crate::value::Value;

/// Constructs a `MainMemory` of the configured size, a `Bus` over it, and
/// `n_caches` caches of `cache_size` lines each, then attaches them.
///
/// Memory and cache population are explicit steps the owner of the
/// `Simulator` invokes (`populate_memory`, `populate_caches`). There are no
/// construction-time side effects.
pub struct Simulator<V: Value> {
    /// The bus, through which every cache and main memory access flows.
    pub bus: Bus<V>,
    config: SimulatorConfig,
}

impl<V: Value> Simulator<V> {
    /// Build a simulator from the given configuration. Fails with
    /// `ConfigInvalid` if the configuration does not validate.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;

        let memory = MainMemory::new(config.main_memory_size, config.block_size);
        let mut bus = Bus::new(memory);
        for _ in 0..config.n_caches {
            bus.attach(Cache::new(config.cache_size, config.block_size));
        }

        Ok(Simulator { bus, config })
    }

    /// The configuration this simulator was built from.
    pub fn config(&self) -> SimulatorConfig {
        self.config
    }

    /// A handle to cache `id`'s processor-facing `read`/`write`.
    pub fn cache(&self, id: usize) -> CacheHandle<'_, V> {
        self.bus.cache(id)
    }

    /// Read `address` through cache `id`.
    pub fn read(&self, id: usize, address: Address) -> Result<crate::cache::CacheBlock<V>> {
        self.bus.cache(id).read(address)
    }

    /// Write `value` to `address` through cache `id`.
    pub fn write(&self, id: usize, address: Address, value: V) -> Result<()> {
        self.bus.cache(id).write(address, value)
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl<V: Value> Simulator<V>
where
    Standard: Distribution<V>,
{
    /// Fill main memory with a pseudorandom sequence over the value domain,
    /// block by block. `seed` fixes the sequence for determinism; `None`
    /// draws from entropy.
    ///
    /// This is an explicit, caller-invoked step. It never runs on its own.
    pub fn populate_memory(&self, seed: Option<u64>) -> Result<()> {
        let mut rng = make_rng(seed);
        let block_size = self.config.block_size;

        let mut start = 0;
        while start < self.config.main_memory_size {
            let block: Vec<Option<V>> = (0..block_size).map(|_| Some(rng.gen())).collect();
            self.bus.write_back(start, &block)?;
            start += block_size;
        }

        Ok(())
    }

    /// Issue reads at random addresses into each cache until it is full.
    pub fn populate_caches(&self, seed: Option<u64>) -> Result<()> {
        let mut rng = make_rng(seed);

        for id in 0..self.config.n_caches {
            while self.bus.caches[id].borrow().resident_count() < self.config.cache_size {
                let address = rng.gen_range(0..self.config.main_memory_size);
                self.bus.cache(id).read(address)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BloodType;

    #[test]
    fn default_config_constructs() {
        let sim: Simulator<BloodType> = Simulator::new(SimulatorConfig::default()).unwrap();
        assert_eq!(sim.bus.n_caches(), 4);
        assert_eq!(sim.bus.memory_size(), 200);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulatorConfig {
            main_memory_size: 7,
            block_size: 5,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::<BloodType>::new(config).is_err());
    }

    #[test]
    fn populate_memory_is_deterministic_for_a_fixed_seed() {
        let config = SimulatorConfig {
            n_caches: 1,
            ..SimulatorConfig::default()
        };
        let sim_a: Simulator<BloodType> = Simulator::new(config).unwrap();
        let sim_b: Simulator<BloodType> = Simulator::new(config).unwrap();

        sim_a.populate_memory(Some(42)).unwrap();
        sim_b.populate_memory(Some(42)).unwrap();

        for addr in (0..config.main_memory_size).step_by(config.block_size) {
            assert_eq!(
                sim_a.bus.read_from_main(addr).unwrap(),
                sim_b.bus.read_from_main(addr).unwrap()
            );
        }
    }

    #[test]
    fn populate_caches_fills_every_cache() {
        let config = SimulatorConfig {
            main_memory_size: 50,
            cache_size: 4,
            n_caches: 2,
            block_size: 5,
        };
        let sim: Simulator<BloodType> = Simulator::new(config).unwrap();
        sim.populate_memory(Some(1)).unwrap();
        sim.populate_caches(Some(2)).unwrap();

        for id in 0..config.n_caches {
            assert_eq!(
                sim.bus.caches[id].borrow().resident_count(),
                config.cache_size
            );
        }
    }
}
