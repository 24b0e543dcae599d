//! Error kinds raised by the core.

use thiserror::Error;

/// Errors raised while constructing or operating a simulator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MesiError {
    /// A `SimulatorConfig` failed validation, e.g. `main_memory_size` not a
    /// multiple of `block_size`, or a non-positive dimension.
    #[error("invalid simulator configuration: {0}")]
    ConfigInvalid(&'static str),

    /// An address at or past the end of main memory was read or written.
    #[error("address {address} is out of range for memory of size {size}")]
    OutOfRange {
        /// The address that was requested.
        address: usize,
        /// The size of the memory it was requested against.
        size: usize,
    },
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, MesiError>;
