use thiserror::Error;

#[derive(Debug, Error)]
pub enum Fat12Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sector range out of bounds")]
    SectorOutOfRange,

    #[error("cluster index out of range")]
    OutOfRange,

    #[error("not found")]
    NotFound,

    #[error("wrong kind of entry (expected {expected}, found {found})")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("already exists")]
    AlreadyExists,

    #[error("illegal path")]
    IllegalPath,

    #[error("reserved name")]
    ReservedName,

    #[error("root directory is protected")]
    RootProtected,

    #[error("operation would place a directory inside itself")]
    ParentCycle,

    #[error("no free clusters available")]
    NoSpace,

    #[error("root directory is full")]
    RootFull,

    #[error("FAT chain length disagrees with entry size")]
    Inconsistent,

    #[error("invalid boot sector: {0}")]
    InvalidBootSector(String),
}

pub type Result<T> = std::result::Result<T, Fat12Error>;
