//! Common utilities for tests

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use fatfs_lite::{BlockDevice, Error, RamDisk};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// Routes the crate's `log` output to the test harness. Run with RUST_LOG=debug to see it.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A RAM disk whose writes can be switched off to simulate a failing device,
/// either entirely or for a single block.
pub struct FlakyDisk {
    inner: RamDisk,
    fail_writes: AtomicBool,
    fail_block: AtomicI32,
}

impl FlakyDisk {
    pub fn new(num_blocks: usize) -> Self {
        FlakyDisk {
            inner: RamDisk::new(num_blocks),
            fail_writes: AtomicBool::new(false),
            fail_block: AtomicI32::new(-1),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes writes to `block_id` fail; None lets them through again.
    pub fn fail_block(&self, block_id: Option<u16>) {
        let raw = block_id.map_or(-1, i32::from);
        self.fail_block.store(raw, Ordering::SeqCst);
    }
}

impl BlockDevice for FlakyDisk {
    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }

    fn read_block(&self, block_id: u16, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u16, buf: &[u8]) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst)
            || self.fail_block.load(Ordering::SeqCst) == i32::from(block_id)
        {
            return Err(Error::IoError);
        }
        self.inner.write_block(block_id, buf)
    }
}
