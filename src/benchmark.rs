//! An in-process exerciser that drives a `Simulator` through a handful of
//! access patterns and logs how long each phase took: sequential read/write,
//! random read/write, a chunk unique to one cache, and a chunk shared by
//! every cache. Each cache's phases run to completion one at a time; there
//! is no OS thread to synchronize.

use std::time::Instant;

use rand::Rng;

use crate::simulator::Simulator;
use crate::value::BloodType;

fn time_phase<F: FnOnce()>(name: &str, cache_id: usize, f: F) {
    let start = Instant::now();
    f();
    log::info!("cache {cache_id}: {name}: {:?}", start.elapsed());
}

/// Run the benchmark phases against every cache in `sim`, one cache at a
/// time.
pub fn run(sim: &Simulator<BloodType>) {
    let n = sim.config().main_memory_size;
    let n_caches = sim.config().n_caches;
    let cache_size = sim.config().cache_size;
    let block_size = sim.config().block_size;
    let chunk_size = (cache_size * block_size).max(1).min(n.max(1));

    for id in 0..n_caches {
        let mut rng = rand::thread_rng();

        time_phase("Sequential Read", id, || {
            for addr in 0..n {
                let _ = sim.read(id, addr);
            }
        });

        time_phase("Sequential Write", id, || {
            for addr in 0..n {
                let _ = sim.write(id, addr, BloodType::APos);
            }
        });

        time_phase("Random Read", id, || {
            for _ in 0..n {
                let addr = rng.gen_range(0..n.max(1));
                let _ = sim.read(id, addr);
            }
        });

        time_phase("Random Write", id, || {
            for _ in 0..n {
                let addr = rng.gen_range(0..n.max(1));
                let _ = sim.write(id, addr, BloodType::BPos);
            }
        });

        // A chunk unique to this cache: no other cache ever touches it, so
        // this phase should settle into Modified/Exclusive with no
        // coherence traffic once warm.
        let unique_offset = (id * chunk_size) % n.max(1);

        time_phase("Thread-Unique Chunk Read", id, || {
            for i in 0..n {
                let addr = (unique_offset + (i % chunk_size)) % n.max(1);
                let _ = sim.read(id, addr);
            }
        });

        time_phase("Thread-Unique Chunk Write", id, || {
            for i in 0..n {
                let addr = (unique_offset + (i % chunk_size)) % n.max(1);
                let _ = sim.write(id, addr, BloodType::OPos);
            }
        });

        // The same chunk of bytes, read and written by every cache in
        // turn: heavy Shared/Invalidate traffic.
        time_phase("Shared Chunk Read", id, || {
            for i in 0..n {
                let addr = i % chunk_size;
                let _ = sim.read(id, addr);
            }
        });

        time_phase("Shared Chunk Write", id, || {
            for i in 0..n {
                let addr = i % chunk_size;
                let _ = sim.write(id, addr, BloodType::ONeg);
            }
        });
    }
}
