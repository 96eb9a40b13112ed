//! Reading and writing file content through block chains.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, warn};

use crate::config::*;
use crate::fat::{AllocationTable, Chain};
use crate::{BlockDevice, DirEntry, Error, Result};

/// Walks a file's chain, yielding each block index with the part of the
/// block that belongs to the file. The final block is cut to the file size.
pub struct ContentBlocks<'a, D: BlockDevice> {
    device: &'a D,
    chain: Chain<'a>,
    remaining: usize,
}

impl<'a, D: BlockDevice> ContentBlocks<'a, D> {
    pub fn new(device: &'a D, fat: &'a AllocationTable, entry: &DirEntry) -> Self {
        Self {
            device,
            chain: fat.chain(entry.first_block),
            remaining: entry.size as usize,
        }
    }
}

impl<D: BlockDevice> Iterator for ContentBlocks<'_, D> {
    type Item = Result<(u16, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block_id = match self.chain.next() {
            Some(Ok(block_id)) => block_id,
            Some(Err(e)) => return Some(Err(e)),
            None => {
                warn!("chain ended with {} bytes still expected", self.remaining);
                self.remaining = 0;
                return Some(Err(Error::Corrupted));
            }
        };
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        if let Err(e) = self.device.read_block(block_id, &mut buf[..]) {
            return Some(Err(e));
        }
        let len = self.remaining.min(BLOCK_SIZE);
        self.remaining -= len;
        Some(Ok((block_id, buf[..len].to_vec())))
    }
}

/// Reads the whole content of a file record.
pub fn read_content(
    device: &impl BlockDevice,
    fat: &AllocationTable,
    entry: &DirEntry,
) -> Result<Vec<u8>> {
    let mut content = Vec::with_capacity(entry.size as usize);
    for part in ContentBlocks::new(device, fat, entry) {
        let (_, bytes) = part?;
        content.extend_from_slice(&bytes);
    }
    Ok(content)
}

pub fn blocks_needed(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}

/// Writes `data` into freshly allocated blocks and links them into one chain.
/// Returns the first block, or EMPTY_BLOCK for empty data.
/// Only the in-memory table is touched; the caller persists it.
pub fn write_content(
    device: &impl BlockDevice,
    fat: &mut AllocationTable,
    data: &[u8],
) -> Result<u16> {
    if data.is_empty() {
        return Ok(EMPTY_BLOCK);
    }
    let blocks = fat.allocate_many(blocks_needed(data.len()))?;
    debug!("writing {} bytes into blocks {:?}", data.len(), blocks);
    write_blocks(device, &blocks, data)?;
    fat.link_chain(&blocks);
    Ok(blocks[0])
}

fn write_blocks(device: &impl BlockDevice, blocks: &[u16], data: &[u8]) -> Result<()> {
    for (block_id, chunk) in blocks.iter().zip(data.chunks(BLOCK_SIZE)) {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        buf[..chunk.len()].copy_from_slice(chunk);
        device.write_block(*block_id, &buf[..])?;
    }
    Ok(())
}

/// Appends `data` to the file described by `entry`, filling the unused tail of
/// its last block before allocating new blocks. Updates `entry.size` and, for an
/// empty file, `entry.first_block`.
pub fn append_content(
    device: &impl BlockDevice,
    fat: &mut AllocationTable,
    entry: &mut DirEntry,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_size = entry.size as usize + data.len();
    if new_size > u32::MAX as usize {
        return Err(Error::NoSpace);
    }

    let used = entry.size as usize % BLOCK_SIZE;
    let tail = fat.last_block(entry.first_block)?;
    let fill = match tail {
        Some(_) if used != 0 => data.len().min(BLOCK_SIZE - used),
        _ => 0,
    };
    let (head, rest) = data.split_at(fill);

    // Reserve everything before touching the device.
    let new_blocks = fat.allocate_many(blocks_needed(rest.len()))?;

    if let Some(last) = tail.filter(|_| !head.is_empty()) {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        device.read_block(last, &mut buf[..])?;
        buf[used..used + head.len()].copy_from_slice(head);
        device.write_block(last, &buf[..])?;
    }

    if !new_blocks.is_empty() {
        write_blocks(device, &new_blocks, rest)?;
        fat.link_chain(&new_blocks);
        match tail {
            Some(last) => fat.relink(last, new_blocks[0])?,
            None => entry.first_block = new_blocks[0],
        }
    }

    debug!(
        "appended {} bytes ({} in place, {} new blocks)",
        data.len(),
        head.len(),
        new_blocks.len()
    );
    entry.size = new_size as u32;
    Ok(())
}
