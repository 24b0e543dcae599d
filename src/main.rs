//! Build a simulator with the default configuration, populate it, and run
//! the benchmark exerciser against it.

use mesi_emu::{BloodType, Simulator, SimulatorConfig};

fn main() {
    env_logger::init();

    let sim: Simulator<BloodType> =
        Simulator::new(SimulatorConfig::default()).expect("default configuration is valid");

    sim.populate_memory(None).expect("memory is in range");

    mesi_emu::benchmark::run(&sim);
}
