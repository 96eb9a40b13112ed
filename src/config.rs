pub const BLOCK_SIZE: usize = 4096;
pub const ROOT_BLOCK: u16 = 0; // Block ID for the root directory
pub const FAT_BLOCK: u16 = 1; // Block ID for the allocation table
pub const FIRST_DATA_BLOCK: u16 = 2; // First block handed out by the allocator

pub const FAT_ENTRY_SIZE: usize = 2; // Each table entry is a little-endian u16
pub const MAX_BLOCKS: usize = BLOCK_SIZE / FAT_ENTRY_SIZE; // The whole table lives in one block
pub const MIN_BLOCKS: usize = FIRST_DATA_BLOCK as usize + 1;
pub const FAT_FREE: u16 = 0x0000;
pub const FAT_EOF: u16 = 0xFFFF; // -1 as i16

pub const EMPTY_BLOCK: u16 = 0xFFFF; // first_block of a record without content

pub const DIR_ENTRY_SIZE: usize = 64; // name + size + first block + type + rights
pub const NAME_FIELD_LEN: usize = 56;
pub const MAX_FILE_NAME_LEN: usize = NAME_FIELD_LEN - 1; // One byte kept for the terminator
pub const NUM_ENTRY_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const NUM_CHILD_SLOTS: usize = NUM_ENTRY_PER_BLOCK - 1; // Slot 0 is the ".." header

pub const PATH_SEPARATOR: char = '/';
pub const DOT_NAME: &[u8; 1] = b".";
pub const DOTDOT_NAME: &[u8; 2] = b"..";
