use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("file name exceeds the maximum length")]
    NameTooLong,
    #[error("an entry with that name already exists")]
    AlreadyExists,
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a regular file")]
    NotAFile,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("permission denied")]
    PermissionDenied,
    #[error("no space left on the volume or in the target directory")]
    NoSpace,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("block device I/O failure")]
    IoError,
    #[error("volume structure is corrupted")]
    Corrupted,
}

impl FsError {
    /// Non-zero status reported to a command surface for this error.
    pub fn status(&self) -> i32 {
        match self {
            FsError::NameTooLong => 1,
            FsError::AlreadyExists => 2,
            FsError::NotFound => 3,
            FsError::NotADirectory => 4,
            FsError::NotAFile => 5,
            FsError::DirectoryNotEmpty => 6,
            FsError::PermissionDenied => 7,
            FsError::NoSpace => 8,
            FsError::InvalidArgument => 9,
            FsError::IoError => 10,
            FsError::Corrupted => 11,
        }
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
