//! Ready-made block devices: a RAM disk for scratch volumes and tests,
//! and a disk image backed by a host file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use alloc::vec;
use alloc::vec::Vec;

use log::error;

use crate::{BlockDevice, Error, Result, BLOCK_SIZE};

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }

    fn range(&self, block_id: u16, len: usize) -> Result<core::ops::Range<usize>> {
        if block_id as usize >= self.num_blocks || len != BLOCK_SIZE {
            return Err(Error::IoError);
        }
        let start = block_id as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u16, buf: &mut [u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        let data = self.inner.lock().map_err(|_| Error::IoError)?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_block(&self, block_id: u16, buf: &[u8]) -> Result<()> {
        let range = self.range(block_id, buf.len())?;
        let mut data = self.inner.lock().map_err(|_| Error::IoError)?;
        data[range].copy_from_slice(buf);
        Ok(())
    }
}

/// A disk image stored in a host file of `num_blocks * BLOCK_SIZE` bytes.
pub struct FileDisk {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl FileDisk {
    /// Opens (or creates) the image at `path`, growing it to hold `num_blocks` blocks.
    /// Existing content is preserved so a formatted image can be mounted again.
    pub fn open(path: impl AsRef<Path>, num_blocks: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                error!("failed to open disk image {}: {}", path.display(), e);
                Error::IoError
            })?;
        let wanted = (num_blocks * BLOCK_SIZE) as u64;
        let len = file.metadata().map_err(|_| Error::IoError)?.len();
        if len < wanted {
            file.set_len(wanted).map_err(|e| {
                error!("failed to size disk image {}: {}", path.display(), e);
                Error::IoError
            })?;
        }
        Ok(FileDisk {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    fn seek_to(&self, file: &mut File, block_id: u16, len: usize) -> Result<()> {
        if block_id as usize >= self.num_blocks || len != BLOCK_SIZE {
            return Err(Error::IoError);
        }
        let start = block_id as u64 * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Start(start)).map_err(|e| {
            error!("seek to block {} failed: {}", block_id, e);
            Error::IoError
        })?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u16, buf: &mut [u8]) -> Result<()> {
        let mut file = self.inner.lock().map_err(|_| Error::IoError)?;
        self.seek_to(&mut file, block_id, buf.len())?;
        file.read_exact(buf).map_err(|e| {
            error!("read of block {} failed: {}", block_id, e);
            Error::IoError
        })
    }

    fn write_block(&self, block_id: u16, buf: &[u8]) -> Result<()> {
        let mut file = self.inner.lock().map_err(|_| Error::IoError)?;
        self.seek_to(&mut file, block_id, buf.len())?;
        file.write_all(buf).map_err(|e| {
            error!("write of block {} failed: {}", block_id, e);
            Error::IoError
        })
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.inner.lock().map_err(|_| Error::IoError)?;
        file.flush().map_err(|e| {
            error!("flush of disk image failed: {}", e);
            Error::IoError
        })
    }
}
