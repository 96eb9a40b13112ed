//! A single-volume file system over a fixed-size block device, organised
//! around a file allocation table.
//!
//! Volume layout:
//! - Block 0: root directory
//! - Block 1: allocation table (one 16-bit entry per block)
//! - Blocks 2..: directory and file content, allocated on demand
//!
//! Layers (from bottom to top):
//! 1. Block Device: whole-block reads and writes by index.      | User implemented, or RamDisk / FileDisk
//! 2. Allocation Table: free / end-of-chain / next-block links. | Fs implemented
//! 3. Directory: one block of fixed 64-byte records.            | Fs implemented
//! 4. Path: resolution of absolute and relative paths.          | Fs implemented
//! 5. File: content stored along block chains.                  | Fs implemented
//! 6. FileSystem: the commands, one session per working dir.    | Fs implemented

extern crate alloc;

mod config;
mod block_dev;
mod disk;
mod structs;
mod fat;
mod directory;
mod path;
mod file;
mod fs;
mod error;

pub use block_dev::BlockDevice;
pub use config::*;
pub use disk::{FileDisk, RamDisk};
pub use structs::*;
pub use fat::{AllocationTable, Chain, FatEntry};
pub use directory::{DirBlock, DirHeader};
pub use path::{resolve, split};
pub use file::{ContentBlocks, read_content, write_content, append_content};
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
