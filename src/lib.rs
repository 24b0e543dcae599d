//! An educational simulator of the MESI cache-coherence protocol applied to
//! a shared-memory multiprocessor.
//!
//! A small number of processors each own a private write-back cache; all
//! caches share one bus and one main memory. The caches snoop traffic on
//! the bus and transition blocks between four coherence states (Modified,
//! Exclusive, Shared, Invalid) to preserve the single-writer-multiple-reader
//! invariant.
//!
//! The coherence engine is single-threaded and cooperative. One operation,
//! whether a processor read, a processor write, or a bus-driven snoop, runs
//! to completion before the next begins. There is no genuine parallel
//! execution, no multi-level cache hierarchy, and no timing model. See
//! `DESIGN.md` for the full list of non-goals.

#![deny(missing_docs)]

pub mod benchmark;
pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod main_memory;
pub mod simulator;
pub mod value;

pub use bus::{Bus, CacheHandle};
pub use cache::{Cache, CacheBlock, MesiState};
pub use config::SimulatorConfig;
pub use error::{MesiError, Result};
pub use main_memory::MainMemory;
pub use simulator::Simulator;
pub use value::BloodType;
