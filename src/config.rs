//! Simulator configuration.

use crate::error::{MesiError, Result};

/// Construction options for a `Simulator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Total number of addressable cells in main memory.
    pub main_memory_size: usize,
    /// Max number of blocks each cache can hold.
    pub cache_size: usize,
    /// Number of caches (processors) to simulate.
    pub n_caches: usize,
    /// Number of cells per block.
    pub block_size: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            main_memory_size: 200,
            cache_size: 10,
            n_caches: 4,
            block_size: 5,
        }
    }
}

impl SimulatorConfig {
    /// Validate this configuration. `main_memory_size` must be a positive
    /// multiple of `block_size`. `cache_size`, `n_caches`, and `block_size`
    /// must all be positive.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(MesiError::ConfigInvalid("block_size must be positive"));
        }
        if self.main_memory_size == 0 {
            return Err(MesiError::ConfigInvalid(
                "main_memory_size must be positive",
            ));
        }
        if self.main_memory_size % self.block_size != 0 {
            return Err(MesiError::ConfigInvalid(
                "main_memory_size must be a multiple of block_size",
            ));
        }
        if self.cache_size == 0 {
            return Err(MesiError::ConfigInvalid("cache_size must be positive"));
        }
        if self.n_caches == 0 {
            return Err(MesiError::ConfigInvalid("n_caches must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimulatorConfig::default().validate().unwrap();
    }

    #[test]
    fn memory_size_not_a_multiple_of_block_size_is_invalid() {
        let config = SimulatorConfig {
            main_memory_size: 201,
            ..SimulatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MesiError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        for config in [
            SimulatorConfig { block_size: 0, ..SimulatorConfig::default() },
            SimulatorConfig { main_memory_size: 0, ..SimulatorConfig::default() },
            SimulatorConfig { cache_size: 0, ..SimulatorConfig::default() },
            SimulatorConfig { n_caches: 0, ..SimulatorConfig::default() },
        ] {
            assert!(config.validate().is_err());
        }
    }
}
