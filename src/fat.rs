//! The allocation table: one 16-bit entry per block, persisted in FAT_BLOCK.
//! An entry is either free, the end of a chain, or the index of the next block
//! of the same file or directory.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::config::*;
use crate::{BlockDevice, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    EndOfChain,
    Next(u16),
}

impl FatEntry {
    fn from_raw(raw: u16) -> Self {
        match raw {
            FAT_FREE => FatEntry::Free,
            FAT_EOF => FatEntry::EndOfChain,
            next => FatEntry::Next(next),
        }
    }

    fn to_raw(self) -> u16 {
        match self {
            FatEntry::Free => FAT_FREE,
            FatEntry::EndOfChain => FAT_EOF,
            FatEntry::Next(next) => next,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllocationTable {
    entries: Vec<FatEntry>,
}

impl AllocationTable {
    /// A freshly formatted table: root and table blocks in use, everything else free.
    pub fn formatted(num_blocks: usize) -> Self {
        let mut entries = vec![FatEntry::Free; num_blocks];
        entries[ROOT_BLOCK as usize] = FatEntry::EndOfChain;
        entries[FAT_BLOCK as usize] = FatEntry::EndOfChain;
        Self { entries }
    }

    pub fn load(device: &impl BlockDevice) -> Result<Self> {
        let num_blocks = device.num_blocks();
        if !(MIN_BLOCKS..=MAX_BLOCKS).contains(&num_blocks) {
            return Err(Error::InvalidArgument);
        }
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        device.read_block(FAT_BLOCK, &mut buf[..])?;
        let entries = buf
            .chunks_exact(FAT_ENTRY_SIZE)
            .take(num_blocks)
            .map(|raw| FatEntry::from_raw(u16::from_le_bytes([raw[0], raw[1]])))
            .collect();
        Ok(Self { entries })
    }

    pub fn persist(&self, device: &impl BlockDevice) -> Result<()> {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for (raw, entry) in buf.chunks_exact_mut(FAT_ENTRY_SIZE).zip(self.entries.iter()) {
            raw.copy_from_slice(&entry.to_raw().to_le_bytes());
        }
        device.write_block(FAT_BLOCK, &buf[..])
    }

    pub fn num_blocks(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, block_id: u16) -> Result<FatEntry> {
        self.entries
            .get(block_id as usize)
            .copied()
            .ok_or(Error::Corrupted)
    }

    pub fn free_count(&self) -> usize {
        self.entries[FIRST_DATA_BLOCK as usize..]
            .iter()
            .filter(|e| **e == FatEntry::Free)
            .count()
    }

    /// Takes the lowest-indexed free block and marks it as the end of a chain,
    /// so the next call hands out a different block. Only the in-memory table changes.
    pub fn allocate(&mut self) -> Result<u16> {
        let found = self.entries[FIRST_DATA_BLOCK as usize..]
            .iter()
            .position(|e| *e == FatEntry::Free);
        match found {
            Some(offset) => {
                let block_id = (offset + FIRST_DATA_BLOCK as usize) as u16;
                self.entries[block_id as usize] = FatEntry::EndOfChain;
                trace!("allocated block {}", block_id);
                Ok(block_id)
            }
            None => {
                debug!("allocation table exhausted");
                Err(Error::NoSpace)
            }
        }
    }

    /// Allocates `count` blocks in ascending order, or nothing at all.
    pub fn allocate_many(&mut self, count: usize) -> Result<Vec<u16>> {
        if self.free_count() < count {
            debug!("need {} blocks, only {} free", count, self.free_count());
            return Err(Error::NoSpace);
        }
        (0..count).map(|_| self.allocate()).collect()
    }

    pub fn free(&mut self, block_id: u16) -> Result<()> {
        if block_id < FIRST_DATA_BLOCK || block_id as usize >= self.entries.len() {
            return Err(Error::InvalidArgument);
        }
        self.entries[block_id as usize] = FatEntry::Free;
        Ok(())
    }

    /// Links the blocks in order; the last one becomes the end of the chain.
    pub fn link_chain(&mut self, blocks: &[u16]) {
        for pair in blocks.windows(2) {
            self.entries[pair[0] as usize] = FatEntry::Next(pair[1]);
        }
        if let Some(&last) = blocks.last() {
            self.entries[last as usize] = FatEntry::EndOfChain;
        }
    }

    /// Points the end of an existing chain at `next`.
    pub fn relink(&mut self, tail: u16, next: u16) -> Result<()> {
        match self.entry(tail)? {
            FatEntry::EndOfChain => {
                self.entries[tail as usize] = FatEntry::Next(next);
                Ok(())
            }
            _ => Err(Error::Corrupted),
        }
    }

    /// Frees every block of the chain starting at `start`.
    /// No-op for the empty-content sentinel.
    pub fn free_chain(&mut self, start: u16) -> Result<()> {
        if start == EMPTY_BLOCK {
            return Ok(());
        }
        let blocks = self.chain(start).collect::<Result<Vec<_>>>()?;
        for block_id in blocks {
            self.free(block_id)?;
        }
        Ok(())
    }

    pub fn chain(&self, start: u16) -> Chain<'_> {
        Chain {
            fat: self,
            next: if start == EMPTY_BLOCK { None } else { Some(start) },
            steps: 0,
        }
    }

    pub fn last_block(&self, start: u16) -> Result<Option<u16>> {
        let mut last = None;
        for block_id in self.chain(start) {
            last = Some(block_id?);
        }
        Ok(last)
    }
}

/// Lazily walks a chain. Yields `Corrupted` once (then stops) for a link that
/// leaves the volume, hits a free entry, or loops.
pub struct Chain<'a> {
    fat: &'a AllocationTable,
    next: Option<u16>,
    steps: usize,
}

impl Iterator for Chain<'_> {
    type Item = Result<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.steps += 1;
        if current < FIRST_DATA_BLOCK || self.steps > self.fat.num_blocks() {
            warn!("chain reached invalid block {} after {} steps", current, self.steps);
            return Some(Err(Error::Corrupted));
        }
        match self.fat.entry(current) {
            Ok(FatEntry::Next(next)) => self.next = Some(next),
            Ok(FatEntry::EndOfChain) => {}
            Ok(FatEntry::Free) | Err(_) => {
                warn!("chain runs through unallocated block {}", current);
                return Some(Err(Error::Corrupted));
            }
        }
        Some(Ok(current))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RamDisk;

    #[test]
    fn test_allocate_lowest_first() {
        let mut fat = AllocationTable::formatted(8);
        assert_eq!(fat.free_count(), 6);
        assert_eq!(fat.allocate().unwrap(), 2);
        assert_eq!(fat.allocate().unwrap(), 3);
        fat.free(2).unwrap();
        assert_eq!(fat.allocate().unwrap(), 2);
        assert_eq!(fat.allocate_many(5), Err(Error::NoSpace));
        assert_eq!(fat.free_count(), 4);
        assert_eq!(fat.allocate_many(4).unwrap(), vec![4, 5, 6, 7]);
        assert_eq!(fat.allocate(), Err(Error::NoSpace));
    }

    #[test]
    fn test_chain_link_and_free() {
        let mut fat = AllocationTable::formatted(16);
        let blocks = fat.allocate_many(3).unwrap();
        fat.link_chain(&blocks);
        let walked = fat.chain(blocks[0]).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(walked, blocks);
        assert_eq!(fat.last_block(blocks[0]).unwrap(), Some(4));
        assert_eq!(fat.last_block(EMPTY_BLOCK).unwrap(), None);

        fat.free_chain(blocks[0]).unwrap();
        for b in blocks {
            assert_eq!(fat.entry(b).unwrap(), FatEntry::Free);
        }
        fat.free_chain(EMPTY_BLOCK).unwrap();
    }

    #[test]
    fn test_cycle_is_corruption() {
        let mut fat = AllocationTable::formatted(8);
        fat.link_chain(&[2, 3]);
        fat.relink(3, 2).unwrap();
        let result = fat.chain(2).collect::<Result<Vec<_>>>();
        assert_eq!(result, Err(Error::Corrupted));
    }

    #[test]
    fn test_persist_round_trip() {
        let rd = RamDisk::new(8);
        let mut fat = AllocationTable::formatted(8);
        fat.link_chain(&[2, 5, 3]);
        fat.persist(&rd).unwrap();

        let mut raw = vec![0u8; BLOCK_SIZE];
        rd.read_block(FAT_BLOCK, &mut raw).unwrap();
        assert_eq!(&raw[..2], &[0xFF, 0xFF]);
        assert_eq!(&raw[4..6], &[5, 0]);

        let loaded = AllocationTable::load(&rd).unwrap();
        assert_eq!(loaded.entry(2).unwrap(), FatEntry::Next(5));
        assert_eq!(loaded.entry(3).unwrap(), FatEntry::EndOfChain);
        assert_eq!(loaded.entry(4).unwrap(), FatEntry::Free);
    }
}
