use std::fmt;
use std::io::Read;

pub const MAX_OPEN_FILES: usize = 32;

/// Small integer identifying an open file between open and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u8);

impl Handle {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum FileError {
    NotFound,
    TableFull,
    BadHandle,
    Io(std::io::Error),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::TableFull => write!(f, "open file limit reached"),
            Self::BadHandle => write!(f, "handle is not open"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(err)
        }
    }
}

/// Fixed-size table of open backend file objects. A `u32` bitmask marks
/// occupied slots; allocation takes the lowest free slot.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: [Option<T>; MAX_OPEN_FILES],
    occupied: u32,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            occupied: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> Result<Handle, FileError> {
        let free = (!self.occupied).trailing_zeros() as usize;
        if free >= MAX_OPEN_FILES {
            return Err(FileError::TableFull);
        }
        self.occupied |= 1 << free;
        self.slots[free] = Some(value);
        Ok(Handle(free as u8))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, FileError> {
        let index = handle.index();
        if index >= MAX_OPEN_FILES || self.occupied & (1 << index) == 0 {
            return Err(FileError::BadHandle);
        }
        self.slots[index].as_mut().ok_or(FileError::BadHandle)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        if index >= MAX_OPEN_FILES || self.occupied & (1 << index) == 0 {
            return None;
        }
        self.occupied &= !(1 << index);
        self.slots[index].take()
    }

    pub fn open_count(&self) -> usize {
        self.occupied.count_ones() as usize
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle-based file access contract shared by the OS and storage-card
/// backends. Callers see only the qualitative outcomes in `FileError`,
/// never backend error codes.
pub trait FileIo {
    /// Open for reading; returns the handle and the file size in bytes.
    fn open_read(&mut self, path: &str) -> Result<(Handle, u64), FileError>;

    /// Open for writing, creating the file and truncating any contents.
    fn open_write(&mut self, path: &str) -> Result<Handle, FileError>;

    /// Closing a stale handle is a no-op.
    fn close(&mut self, handle: Handle);

    fn seek(&mut self, handle: Handle, offset: u64) -> Result<(), FileError>;

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FileError>;

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize, FileError>;

    fn sync(&mut self, handle: Handle) -> Result<(), FileError>;

    /// Last modification time in seconds since the Unix epoch.
    fn modified_time(&mut self, path: &str) -> Result<u64, FileError>;

    fn make_dir(&mut self, path: &str) -> Result<(), FileError>;

    /// Append at most `max_len` bytes up to and including the next
    /// newline. Returns the number of bytes appended; zero means end of
    /// file.
    fn read_line(
        &mut self,
        handle: Handle,
        buf: &mut String,
        max_len: usize,
    ) -> Result<usize, FileError>;
}

/// Byte-at-a-time line read shared by both backends.
pub(crate) fn read_line_from<R: Read>(
    reader: &mut R,
    buf: &mut String,
    max_len: usize,
) -> std::io::Result<usize> {
    let mut appended = 0;
    let mut byte = [0u8; 1];
    while appended < max_len {
        if reader.read(&mut byte)? == 0 {
            break;
        }
        buf.push(char::from(byte[0]));
        appended += 1;
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(appended)
}
