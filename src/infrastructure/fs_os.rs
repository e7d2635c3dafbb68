use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::UNIX_EPOCH;

use log::warn;

use crate::domain::fio::read_line_from;
use crate::domain::{FileError, FileIo, Handle, HandleTable};

/// File access over the host filesystem, kept behind the same fixed
/// handle table as the storage-card backend so handle semantics match
/// across targets.
#[derive(Debug, Default)]
pub struct OsFileIo {
    table: HandleTable<File>,
}

impl OsFileIo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileIo for OsFileIo {
    fn open_read(&mut self, path: &str) -> Result<(Handle, u64), FileError> {
        let file = File::open(path).map_err(|err| {
            warn!("cannot open {path} for reading: {err}");
            FileError::from(err)
        })?;
        let size = file.metadata()?.len();
        let handle = self.table.insert(file).inspect_err(|_| {
            warn!("open file limit reached, cannot open {path}");
        })?;
        Ok((handle, size))
    }

    fn open_write(&mut self, path: &str) -> Result<Handle, FileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| {
                warn!("cannot open {path} for writing: {err}");
                FileError::from(err)
            })?;
        self.table.insert(file).inspect_err(|_| {
            warn!("open file limit reached, cannot open {path}");
        })
    }

    fn close(&mut self, handle: Handle) {
        if self.table.remove(handle).is_none() {
            warn!("close on stale handle {handle}");
        }
    }

    fn seek(&mut self, handle: Handle, offset: u64) -> Result<(), FileError> {
        let file = self.table.get_mut(handle)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FileError> {
        let file = self.table.get_mut(handle)?;
        Ok(file.read(buf)?)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize, FileError> {
        let file = self.table.get_mut(handle)?;
        Ok(file.write(buf)?)
    }

    fn sync(&mut self, handle: Handle) -> Result<(), FileError> {
        let file = self.table.get_mut(handle)?;
        file.sync_all()?;
        Ok(())
    }

    fn modified_time(&mut self, path: &str) -> Result<u64, FileError> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs())
    }

    fn make_dir(&mut self, path: &str) -> Result<(), FileError> {
        match std::fs::create_dir(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn read_line(
        &mut self,
        handle: Handle,
        buf: &mut String,
        max_len: usize,
    ) -> Result<usize, FileError> {
        let file = self.table.get_mut(handle)?;
        Ok(read_line_from(file, buf, max_len)?)
    }
}
