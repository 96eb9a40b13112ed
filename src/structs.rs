use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;

use crate::config::*;
use crate::Error;
use crate::Result;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 0,
    Directory = 1,
}

impl FileType {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FileType::Regular),
            1 => Ok(FileType::Directory),
            _ => Err(Error::Corrupted),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Regular => f.pad("file"),
            FileType::Directory => f.pad("dir"),
        }
    }
}

bitflags! {
    /// Read/write/execute triplet carried by every record.
    pub struct AccessRights: u8 {
        const READ = 0x04;
        const WRITE = 0x02;
        const EXECUTE = 0x01;
        const RW = Self::READ.bits | Self::WRITE.bits;
        const RWX = Self::READ.bits | Self::WRITE.bits | Self::EXECUTE.bits;
    }
}

impl FromStr for AccessRights {
    type Err = Error;

    /// Parses the single octal digit form used by chmod, e.g. "5" for read + execute.
    fn from_str(s: &str) -> Result<Self> {
        let digit = match s.trim().as_bytes() {
            [d @ b'0'..=b'7'] => d - b'0',
            _ => return Err(Error::InvalidArgument),
        };
        AccessRights::from_bits(digit).ok_or(Error::InvalidArgument)
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: AccessRights, c: char| if self.contains(bit) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(AccessRights::READ, 'r'),
            flag(AccessRights::WRITE, 'w'),
            flag(AccessRights::EXECUTE, 'x')
        )
    }
}

/// On-disk directory record.
///
/// Layout (64 bytes, little endian):
/// - name: [u8; 56], NUL padded
/// - size: u32
/// - first_block: u16
/// - ftype: u8
/// - rights: u8
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_FIELD_LEN],
    pub size: u32,
    pub first_block: u16,
    pub ftype: FileType,
    pub rights: AccessRights,
}

impl DirEntry {
    pub fn new(name: &[u8], ftype: FileType, rights: AccessRights) -> Result<Self> {
        validate_name(name)?;
        let mut arr = [0; NAME_FIELD_LEN];
        arr[..name.len()].copy_from_slice(name);
        Ok(Self {
            name: arr,
            size: 0,
            first_block: EMPTY_BLOCK,
            ftype,
            rights,
        })
    }

    /// Decodes one record. Returns None for a free (all-zero name) slot.
    pub fn decode(raw: &[u8]) -> Result<Option<Self>> {
        debug_assert_eq!(raw.len(), DIR_ENTRY_SIZE);
        if raw[0] == 0 {
            return Ok(None);
        }
        let mut name = [0; NAME_FIELD_LEN];
        name.copy_from_slice(&raw[..NAME_FIELD_LEN]);
        // The last byte is the terminator.
        name[NAME_FIELD_LEN - 1] = 0;
        let size = u32::from_le_bytes([raw[56], raw[57], raw[58], raw[59]]);
        let first_block = u16::from_le_bytes([raw[60], raw[61]]);
        let ftype = FileType::from_u8(raw[62])?;
        let rights = AccessRights::from_bits_truncate(raw[63]);
        Ok(Some(Self {
            name,
            size,
            first_block,
            ftype,
            rights,
        }))
    }

    pub fn encode(&self, raw: &mut [u8]) {
        debug_assert_eq!(raw.len(), DIR_ENTRY_SIZE);
        raw[..NAME_FIELD_LEN].copy_from_slice(&self.name);
        raw[56..60].copy_from_slice(&self.size.to_le_bytes());
        raw[60..62].copy_from_slice(&self.first_block.to_le_bytes());
        raw[62] = self.ftype as u8;
        raw[63] = self.rights.bits();
    }

    pub fn set_name(&mut self, name: &[u8]) -> Result<()> {
        validate_name(name)?;
        self.name = [0; NAME_FIELD_LEN];
        self.name[..name.len()].copy_from_slice(name);
        Ok(())
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }
}

/// Checks a leaf name against the record format.
pub fn validate_name(name: &[u8]) -> Result<()> {
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    if name.is_empty()
        || name == DOT_NAME
        || name == DOTDOT_NAME
        || name.contains(&0)
        || name.contains(&(PATH_SEPARATOR as u8))
    {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let mut entry = DirEntry::new(b"notes.txt", FileType::Regular, AccessRights::RW).unwrap();
        entry.size = 0x0102_0304;
        entry.first_block = 0x0A0B;
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        entry.encode(&mut raw);
        assert_eq!(&raw[..9], b"notes.txt");
        assert_eq!(raw[9], 0);
        assert_eq!(&raw[56..60], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&raw[60..62], &[0x0B, 0x0A]);
        assert_eq!(raw[62], 0);
        assert_eq!(raw[63], 0x06);
        assert_eq!(DirEntry::decode(&raw).unwrap(), Some(entry));
    }

    #[test]
    fn test_free_slot_and_bad_type() {
        let raw = [0u8; DIR_ENTRY_SIZE];
        assert_eq!(DirEntry::decode(&raw).unwrap(), None);
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[0] = b'x';
        raw[62] = 7;
        assert_eq!(DirEntry::decode(&raw), Err(Error::Corrupted));
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_name(&[b'a'; MAX_FILE_NAME_LEN]), Ok(()));
        assert_eq!(validate_name(&[b'a'; MAX_FILE_NAME_LEN + 1]), Err(Error::NameTooLong));
        assert_eq!(validate_name(b""), Err(Error::InvalidArgument));
        assert_eq!(validate_name(b".."), Err(Error::InvalidArgument));
        assert_eq!(validate_name(b"a/b"), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_rights_parse() {
        let rights: AccessRights = "5".parse().unwrap();
        assert_eq!(rights, AccessRights::READ | AccessRights::EXECUTE);
        assert_eq!(rights.to_string(), "r-x");
        assert_eq!("0".parse::<AccessRights>().unwrap(), AccessRights::empty());
        assert_eq!("7".parse::<AccessRights>().unwrap(), AccessRights::RWX);
        assert_eq!("8".parse::<AccessRights>(), Err(Error::InvalidArgument));
        assert_eq!("rw".parse::<AccessRights>(), Err(Error::InvalidArgument));
        assert_eq!("".parse::<AccessRights>(), Err(Error::InvalidArgument));
    }
}
