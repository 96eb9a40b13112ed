use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, warn};

use crate::config::*;
use crate::directory::DirBlock;
use crate::fat::AllocationTable;
use crate::file::{append_content, read_content, write_content};
use crate::path::{resolve, split};
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

/// A mounted volume together with the working directory of one session.
///
/// Operations reload the allocation table from the device each time, so
/// several sessions over the same `Arc<D>` see each other's changes as long
/// as they take turns. Callers needing more than that should wrap a lock
/// around the session.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    cwd: u16,
}

/// A child record found through its parent directory.
struct Located {
    parent: u16,
    dir: DirBlock,
    index: usize,
}

impl Located {
    fn entry(&self) -> Result<DirEntry> {
        self.dir.entry(self.index).copied().ok_or(Error::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub ftype: FileType,
    pub rights: AccessRights,
    /// None for directories.
    pub size: Option<u32>,
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<width$}{:<6}{:<8}",
            self.name,
            self.ftype,
            self.rights.to_string(),
            width = NAME_FIELD_LEN
        )?;
        match self.size {
            Some(size) => write!(f, "{}", size),
            None => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing(pub Vec<ListEntry>);

impl Listing {
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ListEntry> {
        self.0.iter().find(|e| e.name == name)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<width$}{:<6}{:<8}size", "name", "type", "rights", width = NAME_FIELD_LEN)?;
        for entry in &self.0 {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

fn require_writable(block_id: u16, dir: &DirBlock) -> Result<()> {
    if block_id != ROOT_BLOCK && !dir.header.rights.contains(AccessRights::WRITE) {
        debug!("directory at block {} is not writable", block_id);
        return Err(Error::PermissionDenied);
    }
    Ok(())
}

impl<D: BlockDevice> FileSystem<D> {
    /// Writes an empty volume onto `device` and mounts it.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let num_blocks = check_geometry(&*device)?;
        debug!("formatting volume of {} blocks", num_blocks);

        let zero = Box::new([0u8; BLOCK_SIZE]);
        for block_id in FIRST_DATA_BLOCK as usize..num_blocks {
            device.write_block(block_id as u16, &zero[..])?;
        }
        DirBlock::new(ROOT_BLOCK).store(&*device, ROOT_BLOCK)?;
        AllocationTable::formatted(num_blocks).persist(&*device)?;
        device.flush()?;

        Ok(Self {
            device,
            cwd: ROOT_BLOCK,
        })
    }

    /// Mounts an already formatted volume. The working directory starts at the root.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        check_geometry(&*device)?;
        let root = DirBlock::load(&*device, ROOT_BLOCK).map_err(|e| match e {
            Error::IoError => Error::IoError,
            _ => Error::Corrupted,
        })?;
        if root.header.parent != ROOT_BLOCK {
            warn!("root directory points to parent {}", root.header.parent);
            return Err(Error::Corrupted);
        }
        AllocationTable::load(&*device)?;
        Ok(Self {
            device,
            cwd: ROOT_BLOCK,
        })
    }

    /// Opens another session on the same volume, starting at the root.
    pub fn session(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            cwd: ROOT_BLOCK,
        }
    }

    fn load_fat(&self) -> Result<AllocationTable> {
        AllocationTable::load(&*self.device)
    }

    fn resolve(&self, path: &str, require_dir: bool) -> Result<u16> {
        resolve(&*self.device, self.cwd, path, require_dir)
    }

    fn parent_dir(&self, parent_path: &str) -> Result<(u16, DirBlock)> {
        let block_id = self.resolve(parent_path, true)?;
        Ok((block_id, DirBlock::load(&*self.device, block_id)?))
    }

    /// Finds the record named by the last segment of `path`.
    fn locate(&self, path: &str) -> Result<Located> {
        let (parent_path, leaf) = split(path);
        if leaf.is_empty() || leaf.as_bytes() == DOT_NAME || leaf.as_bytes() == DOTDOT_NAME {
            return Err(Error::InvalidArgument);
        }
        let (parent, dir) = self.parent_dir(parent_path)?;
        let index = dir.lookup(leaf.as_bytes()).ok_or(Error::NotFound)?;
        Ok(Located { parent, dir, index })
    }

    /// Where a copy or move of `src_name` to `dst` lands: inside `dst` when it
    /// names an existing directory, otherwise at `dst`'s parent under its leaf name.
    fn destination(&self, dst: &str, src_name: &[u8]) -> Result<(u16, DirBlock, Vec<u8>)> {
        match self.resolve(dst, true) {
            Ok(block_id) => {
                let dir = DirBlock::load(&*self.device, block_id)?;
                Ok((block_id, dir, src_name.to_vec()))
            }
            Err(Error::NotFound) | Err(Error::NotADirectory) => {
                let (parent_path, leaf) = split(dst);
                validate_name(leaf.as_bytes())?;
                let (block_id, dir) = self.parent_dir(parent_path)?;
                Ok((block_id, dir, leaf.as_bytes().to_vec()))
            }
            Err(e) => Err(e),
        }
    }

    /// True when `block_id` is `ancestor` or lies somewhere below it.
    fn is_within(&self, block_id: u16, ancestor: u16) -> Result<bool> {
        let mut current = block_id;
        for _ in 0..self.device.num_blocks() {
            if current == ancestor {
                return Ok(true);
            }
            if current == ROOT_BLOCK {
                return Ok(false);
            }
            current = DirBlock::load(&*self.device, current)?.header.parent;
        }
        Err(Error::Corrupted)
    }

    /// create <path>: stores `content` as a new file.
    pub fn create(&mut self, path: &str, content: &[u8]) -> Result<()> {
        debug!("create {} ({} bytes)", path, content.len());
        let (parent_path, leaf) = split(path);
        validate_name(leaf.as_bytes())?;
        let (parent, mut dir) = self.parent_dir(parent_path)?;
        require_writable(parent, &dir)?;
        if dir.lookup(leaf.as_bytes()).is_some() {
            return Err(Error::AlreadyExists);
        }
        if !dir.has_free_slot() {
            return Err(Error::NoSpace);
        }
        let size = u32::try_from(content.len()).map_err(|_| Error::NoSpace)?;

        let mut fat = self.load_fat()?;
        let mut entry = DirEntry::new(leaf.as_bytes(), FileType::Regular, AccessRights::RW)?;
        entry.size = size;
        entry.first_block = write_content(&*self.device, &mut fat, content)?;
        dir.insert(entry)?;

        fat.persist(&*self.device)?;
        dir.store(&*self.device, parent)?;
        self.device.flush()
    }

    /// cat <path>: the full content of a readable file.
    pub fn cat(&self, path: &str) -> Result<Vec<u8>> {
        debug!("cat {}", path);
        let target = self.locate(path)?;
        let entry = target.entry()?;
        if entry.is_dir() {
            return Err(Error::NotAFile);
        }
        if !entry.rights.contains(AccessRights::READ) {
            return Err(Error::PermissionDenied);
        }
        let fat = self.load_fat()?;
        read_content(&*self.device, &fat, &entry)
    }

    /// ls: the records of the working directory, ".." excluded.
    pub fn ls(&self) -> Result<Listing> {
        let dir = DirBlock::load(&*self.device, self.cwd)?;
        let entries = dir
            .iter()
            .map(|entry| ListEntry {
                name: entry.name_lossy(),
                ftype: entry.ftype,
                rights: entry.rights,
                size: if entry.is_dir() { None } else { Some(entry.size) },
            })
            .collect();
        Ok(Listing(entries))
    }

    /// cp <src> <dst>: copies a file into a fresh chain. The copy keeps the source's rights.
    pub fn cp(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("cp {} {}", src, dst);
        let source = self.locate(src)?.entry()?;
        if source.is_dir() {
            return Err(Error::NotAFile);
        }
        if !source.rights.contains(AccessRights::READ) {
            return Err(Error::PermissionDenied);
        }

        let (target, mut dir, name) = self.destination(dst, source.name_bytes())?;
        require_writable(target, &dir)?;
        if dir.lookup(&name).is_some() {
            return Err(Error::AlreadyExists);
        }
        if !dir.has_free_slot() {
            return Err(Error::NoSpace);
        }

        let mut fat = self.load_fat()?;
        let content = read_content(&*self.device, &fat, &source)?;
        let mut copy = DirEntry::new(&name, FileType::Regular, source.rights)?;
        copy.size = source.size;
        copy.first_block = write_content(&*self.device, &mut fat, &content)?;
        dir.insert(copy)?;

        fat.persist(&*self.device)?;
        dir.store(&*self.device, target)?;
        self.device.flush()
    }

    /// mv <src> <dst>: relocates or renames a record without touching its content.
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("mv {} {}", src, dst);
        if src == dst {
            return Ok(());
        }
        let mut source = self.locate(src)?;
        require_writable(source.parent, &source.dir)?;
        let entry = source.entry()?;

        let (target, mut dir, name) = self.destination(dst, entry.name_bytes())?;
        if entry.is_dir() && target == entry.first_block {
            // `dst` is another spelling of the directory being moved.
            return Ok(());
        }
        require_writable(target, &dir)?;
        if entry.is_dir() && self.is_within(target, entry.first_block)? {
            return Err(Error::InvalidArgument);
        }
        let mut moved = entry;
        moved.set_name(&name)?;

        if target == source.parent {
            match source.dir.lookup(&name) {
                Some(index) if index == source.index => return Ok(()),
                Some(_) => return Err(Error::AlreadyExists),
                None => {}
            }
            if let Some(slot) = source.dir.entry_mut(source.index) {
                *slot = moved;
            }
            source.dir.store(&*self.device, source.parent)?;
            return self.device.flush();
        }

        dir.insert(moved)?;
        source.dir.remove(source.index);
        if entry.is_dir() {
            let mut child = DirBlock::load(&*self.device, entry.first_block)?;
            child.header.parent = target;
            child.store(&*self.device, entry.first_block)?;
        }
        dir.store(&*self.device, target)?;
        source.dir.store(&*self.device, source.parent)?;
        self.device.flush()
    }

    /// rm <path>: removes a file or an empty directory and frees its chain.
    pub fn rm(&mut self, path: &str) -> Result<()> {
        debug!("rm {}", path);
        let mut target = self.locate(path)?;
        require_writable(target.parent, &target.dir)?;
        let entry = target.entry()?;
        if entry.is_dir() {
            if entry.first_block == self.cwd {
                return Err(Error::InvalidArgument);
            }
            if !DirBlock::load(&*self.device, entry.first_block)?.is_empty() {
                return Err(Error::DirectoryNotEmpty);
            }
        }

        let mut fat = self.load_fat()?;
        fat.free_chain(entry.first_block)?;
        target.dir.remove(target.index);

        // Drop the record before releasing its blocks.
        target.dir.store(&*self.device, target.parent)?;
        if entry.is_dir() {
            // Sessions still standing in it must fail to decode the block.
            let zero = Box::new([0u8; BLOCK_SIZE]);
            self.device.write_block(entry.first_block, &zero[..])?;
        }
        fat.persist(&*self.device)?;
        self.device.flush()
    }

    /// append <src> <dst>: adds the content of `src` to the end of `dst`.
    pub fn append(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("append {} {}", src, dst);
        let source = self.locate(src)?.entry()?;
        if source.is_dir() {
            return Err(Error::NotAFile);
        }
        if !source.rights.contains(AccessRights::READ) {
            return Err(Error::PermissionDenied);
        }
        let mut dest = self.locate(dst)?;
        let mut entry = dest.entry()?;
        if entry.is_dir() {
            return Err(Error::NotAFile);
        }
        if !entry.rights.contains(AccessRights::WRITE) {
            return Err(Error::PermissionDenied);
        }

        let mut fat = self.load_fat()?;
        let content = read_content(&*self.device, &fat, &source)?;
        if content.is_empty() {
            return Ok(());
        }
        append_content(&*self.device, &mut fat, &mut entry, &content)?;
        if let Some(slot) = dest.dir.entry_mut(dest.index) {
            *slot = entry;
        }

        fat.persist(&*self.device)?;
        dest.dir.store(&*self.device, dest.parent)?;
        self.device.flush()
    }

    /// mkdir <path>
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        debug!("mkdir {}", path);
        let (parent_path, leaf) = split(path);
        validate_name(leaf.as_bytes())?;
        let (parent, mut dir) = self.parent_dir(parent_path)?;
        require_writable(parent, &dir)?;
        if dir.lookup(leaf.as_bytes()).is_some() {
            return Err(Error::AlreadyExists);
        }
        if !dir.has_free_slot() {
            return Err(Error::NoSpace);
        }

        let mut fat = self.load_fat()?;
        let block_id = fat.allocate()?;
        DirBlock::new(parent).store(&*self.device, block_id)?;
        let mut entry = DirEntry::new(leaf.as_bytes(), FileType::Directory, AccessRights::RWX)?;
        entry.first_block = block_id;
        dir.insert(entry)?;

        fat.persist(&*self.device)?;
        dir.store(&*self.device, parent)?;
        self.device.flush()
    }

    /// cd <path>. The working directory is left alone on failure.
    pub fn cd(&mut self, path: &str) -> Result<()> {
        debug!("cd {}", path);
        self.cwd = self.resolve(path, true)?;
        Ok(())
    }

    /// pwd: absolute path of the working directory.
    pub fn pwd(&self) -> Result<String> {
        let mut names = Vec::new();
        let mut current = self.cwd;
        while current != ROOT_BLOCK {
            if names.len() > self.device.num_blocks() {
                return Err(Error::Corrupted);
            }
            let parent = DirBlock::load(&*self.device, current)?.header.parent;
            let parent_dir = DirBlock::load(&*self.device, parent)?;
            let index = parent_dir.lookup_block(current).ok_or(Error::Corrupted)?;
            let name = parent_dir.entry(index).ok_or(Error::Corrupted)?.name_lossy();
            names.push(name);
            current = parent;
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push(PATH_SEPARATOR);
            path.push_str(name);
        }
        if path.is_empty() {
            path.push(PATH_SEPARATOR);
        }
        Ok(path)
    }

    /// chmod <rights> <path>. `rights` is a digit 0-7 of READ(4)|WRITE(2)|EXECUTE(1).
    pub fn chmod(&mut self, rights: &str, path: &str) -> Result<()> {
        debug!("chmod {} {}", rights, path);
        let rights: AccessRights = rights.parse()?;
        let mut target = self.locate(path)?;
        require_writable(target.parent, &target.dir)?;
        let mut entry = target.entry()?;
        entry.rights = rights;

        if let Some(slot) = target.dir.entry_mut(target.index) {
            *slot = entry;
        }
        target.dir.store(&*self.device, target.parent)?;

        if entry.is_dir() {
            // Keep the directory's own header in step with its record.
            let mut child = DirBlock::load(&*self.device, entry.first_block)?;
            child.header.rights = rights;
            child.store(&*self.device, entry.first_block)?;
        }
        self.device.flush()
    }

    /// Number of blocks still available for content.
    pub fn free_blocks(&self) -> Result<usize> {
        Ok(self.load_fat()?.free_count())
    }

    /// Blocks holding the content of the record at `path`, in chain order.
    pub fn chain_of(&self, path: &str) -> Result<Vec<u16>> {
        let entry = self.locate(path)?.entry()?;
        let fat = self.load_fat()?;
        fat.chain(entry.first_block).collect()
    }

    pub fn working_dir(&self) -> u16 {
        self.cwd
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}

fn check_geometry(device: &impl BlockDevice) -> Result<usize> {
    let num_blocks = device.num_blocks();
    if device.block_size() != BLOCK_SIZE || !(MIN_BLOCKS..=MAX_BLOCKS).contains(&num_blocks) {
        warn!(
            "unsupported geometry: {} blocks of {} bytes",
            num_blocks,
            device.block_size()
        );
        return Err(Error::InvalidArgument);
    }
    Ok(num_blocks)
}
