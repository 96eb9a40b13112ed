//! Directory blocks.
//!
//! A directory occupies exactly one block of NUM_ENTRY_PER_BLOCK records. Slot 0
//! holds a ".." record whose first_block is the parent directory and whose rights
//! are the directory's own rights; it is kept apart from the children in memory
//! as a [`DirHeader`] and folded back into slot 0 when the block is written.

use alloc::boxed::Box;

use log::trace;

use crate::config::*;
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

fn name_cmp(n1: &[u8], n2: &[u8]) -> bool {
    trim_zero(n1) == trim_zero(n2)
}

impl DirEntry {
    pub fn name_eq(&self, name: &[u8]) -> bool {
        name_cmp(&self.name, name)
    }

    pub fn name_bytes(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_lossy(&self) -> alloc::string::String {
        alloc::string::String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirHeader {
    pub parent: u16,
    pub rights: AccessRights,
}

impl DirHeader {
    fn to_entry(self) -> DirEntry {
        let mut name = [0; NAME_FIELD_LEN];
        name[..DOTDOT_NAME.len()].copy_from_slice(DOTDOT_NAME);
        DirEntry {
            name,
            size: 0,
            first_block: self.parent,
            ftype: FileType::Directory,
            rights: self.rights,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirBlock {
    pub header: DirHeader,
    entries: [Option<DirEntry>; NUM_CHILD_SLOTS],
}

impl DirBlock {
    pub fn new(parent: u16) -> Self {
        Self {
            header: DirHeader {
                parent,
                rights: AccessRights::RWX,
            },
            entries: [None; NUM_CHILD_SLOTS],
        }
    }

    pub fn load(device: &impl BlockDevice, block_id: u16) -> Result<Self> {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        device.read_block(block_id, &mut buf[..])?;
        Self::decode(&buf[..])
    }

    pub fn store(&self, device: &impl BlockDevice, block_id: u16) -> Result<()> {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        self.encode(&mut buf[..]);
        device.write_block(block_id, &buf[..])
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut records = buf.chunks_exact(DIR_ENTRY_SIZE);
        let header = match records.next().map(DirEntry::decode).transpose()?.flatten() {
            Some(dotdot) if dotdot.name_eq(DOTDOT_NAME) && dotdot.is_dir() => DirHeader {
                parent: dotdot.first_block,
                rights: dotdot.rights,
            },
            _ => return Err(Error::NotADirectory),
        };
        let mut entries = [None; NUM_CHILD_SLOTS];
        for (slot, raw) in entries.iter_mut().zip(records) {
            *slot = DirEntry::decode(raw)?;
        }
        Ok(Self { header, entries })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let mut records = buf.chunks_exact_mut(DIR_ENTRY_SIZE);
        if let Some(raw) = records.next() {
            self.header.to_entry().encode(raw);
        }
        for (slot, raw) in self.entries.iter().zip(records) {
            match slot {
                Some(entry) => entry.encode(raw),
                None => raw.fill(0),
            }
        }
    }

    /// Index of the child named `name`.
    pub fn lookup(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|slot| {
            slot.as_ref().is_some_and(|entry| {
                trace!("checking entry {}", entry.name_lossy());
                entry.name_eq(name)
            })
        })
    }

    /// Index of the child whose content starts at `block_id`.
    pub fn lookup_block(&self, block_id: u16) -> Option<usize> {
        self.entries.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|entry| entry.is_dir() && entry.first_block == block_id)
        })
    }

    pub fn entry(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut DirEntry> {
        self.entries.get_mut(index).and_then(|slot| slot.as_mut())
    }

    pub fn has_free_slot(&self) -> bool {
        self.entries.iter().any(|slot| slot.is_none())
    }

    /// Puts `entry` in the first free slot.
    pub fn insert(&mut self, entry: DirEntry) -> Result<usize> {
        if self.lookup(entry.name_bytes()).is_some() {
            return Err(Error::AlreadyExists);
        }
        let index = self
            .entries
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::NoSpace)?;
        self.entries[index] = Some(entry);
        Ok(index)
    }

    /// Clears a slot, returning what was there.
    pub fn remove(&mut self, index: usize) -> Option<DirEntry> {
        self.entries.get_mut(index).and_then(|slot| slot.take())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|slot| slot.is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().flatten()
    }
}
