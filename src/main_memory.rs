//! Main memory implementation.
//!
//! A flat, line-addressable array of optional values, partitioned into
//! fixed-size blocks. Provides block-granular read and write. No
//! concurrency control beyond what the `Bus` provides.

use crate::error::{MesiError, Result};
use crate::value::Value;

/// The address of a single cell in memory.
pub type Address = usize;

/// The base address of a block: `floor(a / block_size) * block_size`.
pub type BlockBase = usize;

/// Compute the block base for an address, given a block size.
pub fn block_base(address: Address, block_size: usize) -> BlockBase {
    address - (address % block_size)
}

/// The main memory.
///
/// Invariant: reads and writes of a block touch exactly the `block_size`
/// contiguous cells starting at a block base; writes at any address are
/// normalized to that base before storing.
pub struct MainMemory<V: Value> {
    block_size: usize,
    data: Vec<Option<V>>,
}

impl<V: Value> MainMemory<V> {
    /// Create a main memory of `n_lines` cells with the given block size.
    pub fn new(n_lines: usize, block_size: usize) -> Self {
        MainMemory {
            block_size,
            data: vec![None; n_lines],
        }
    }

    /// The total number of addressable cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if this memory has no cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The block size this memory is partitioned into.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn check_bounds(&self, address: Address) -> Result<()> {
        if address >= self.data.len() {
            return Err(MesiError::OutOfRange {
                address,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    /// Return a snapshot of the `block_size` cells starting at the block
    /// base of `address`. Fails with `OutOfRange` if `address >= len()`.
    pub fn read(&self, address: Address) -> Result<Vec<Option<V>>> {
        self.check_bounds(address)?;
        let base = block_base(address, self.block_size);
        Ok(self.data[base..base + self.block_size].to_vec())
    }

    /// Write `block_size` cells starting at the block base of `address`
    /// from `block`. Fails with `OutOfRange` if `address >= len()`. Extra
    /// cells past `len()` are silently dropped.
    pub fn write(&mut self, address: Address, block: &[Option<V>]) -> Result<()> {
        self.check_bounds(address)?;
        let base = block_base(address, self.block_size);
        for (i, cell) in block.iter().take(self.block_size).enumerate() {
            if base + i >= self.data.len() {
                break;
            }
            self.data[base + i] = cell.clone();
        }
        Ok(())
    }

    /// Reset all cells to empty.
    pub fn clear(&mut self) {
        for cell in &mut self.data {
            *cell = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BloodType;

    #[test]
    fn block_base_rounds_down() {
        assert_eq!(block_base(0, 5), 0);
        assert_eq!(block_base(4, 5), 0);
        assert_eq!(block_base(5, 5), 5);
        assert_eq!(block_base(9, 5), 5);
    }

    #[test]
    fn read_write_round_trip() {
        let mut mem: MainMemory<BloodType> = MainMemory::new(10, 5);
        let block = vec![Some(BloodType::APos); 5];
        mem.write(0, &block).unwrap();
        assert_eq!(mem.read(3).unwrap(), block);
        // untouched block still empty
        assert_eq!(mem.read(5).unwrap(), vec![None; 5]);
    }

    #[test]
    fn out_of_range_on_read_and_write() {
        let mem: MainMemory<BloodType> = MainMemory::new(10, 5);
        assert!(matches!(
            mem.read(10),
            Err(MesiError::OutOfRange { address: 10, size: 10 })
        ));

        let mut mem: MainMemory<BloodType> = MainMemory::new(10, 5);
        assert!(matches!(
            mem.write(10, &[None, None, None, None, None]),
            Err(MesiError::OutOfRange { address: 10, size: 10 })
        ));
    }

    #[test]
    fn clear_resets_all_cells() {
        let mut mem: MainMemory<BloodType> = MainMemory::new(10, 5);
        mem.write(0, &vec![Some(BloodType::OPos); 5]).unwrap();
        mem.clear();
        assert_eq!(mem.read(0).unwrap(), vec![None; 5]);
    }

    #[test]
    fn writes_normalize_to_block_base() {
        let mut mem: MainMemory<BloodType> = MainMemory::new(10, 5);
        mem.write(7, &vec![Some(BloodType::BPos); 5]).unwrap();
        assert_eq!(mem.read(5).unwrap(), vec![Some(BloodType::BPos); 5]);
    }
}
