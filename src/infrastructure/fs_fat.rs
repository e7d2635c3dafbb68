use std::io::{Read, Seek, SeekFrom, Write};

use fatfs::{DateTime, DirEntry, FileSystem};
use log::warn;

use crate::domain::fio::read_line_from;
use crate::domain::{FileError, FileIo, Handle, HandleTable};

/// File access over a mounted FAT volume on the storage card. Mounting
/// the volume is device bring-up and happens before this backend is
/// constructed; a card that fails to mount is fatal to the process.
pub struct FatFileIo<'fs, T: Read + Write + Seek> {
    fs: &'fs FileSystem<T>,
    table: HandleTable<fatfs::File<'fs, T>>,
}

impl<'fs, T: Read + Write + Seek> FatFileIo<'fs, T> {
    pub fn new(fs: &'fs FileSystem<T>) -> Self {
        Self {
            fs,
            table: HandleTable::new(),
        }
    }

    /// FAT has no stat call; look the entry up in its parent directory.
    fn dir_entry(&self, path: &str) -> Result<DirEntry<'fs, T>, FileError> {
        let (parent, name) = match path.rsplit_once('/') {
            Some((parent, name)) if !parent.is_empty() => (Some(parent), name),
            Some((_, name)) => (None, name),
            None => (None, path),
        };
        let dir = match parent {
            Some(parent) => self.fs.root_dir().open_dir(parent)?,
            None => self.fs.root_dir(),
        };
        for entry in dir.iter() {
            let entry = entry?;
            if entry.file_name().eq_ignore_ascii_case(name) {
                return Ok(entry);
            }
        }
        Err(FileError::NotFound)
    }
}

impl<'fs, T: Read + Write + Seek> FileIo for FatFileIo<'fs, T> {
    fn open_read(&mut self, path: &str) -> Result<(Handle, u64), FileError> {
        let entry = self.dir_entry(path).inspect_err(|err| {
            warn!("cannot stat {path}: {err}");
        })?;
        let size = entry.len();
        let file = entry.to_file();
        let handle = self.table.insert(file).inspect_err(|_| {
            warn!("open file limit reached, cannot open {path}");
        })?;
        Ok((handle, size))
    }

    fn open_write(&mut self, path: &str) -> Result<Handle, FileError> {
        let mut file = self.fs.root_dir().create_file(path).map_err(|err| {
            warn!("cannot create {path}: {err}");
            FileError::from(err)
        })?;
        // create_file opens an existing file unchanged; the contract is
        // create-and-truncate.
        file.truncate()?;
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
        file.flush()?;
        Ok(())
    }

    fn modified_time(&mut self, path: &str) -> Result<u64, FileError> {
        let entry = self.dir_entry(path)?;
        Ok(unix_seconds(entry.modified()))
    }

    fn make_dir(&mut self, path: &str) -> Result<(), FileError> {
        match self.fs.root_dir().create_dir(path) {
            Ok(_) => Ok(()),
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

fn unix_seconds(stamp: DateTime) -> u64 {
    let days = days_from_civil(
        i64::from(stamp.date.year),
        i64::from(stamp.date.month),
        i64::from(stamp.date.day),
    );
    let seconds = days * 86_400
        + i64::from(stamp.time.hour) * 3_600
        + i64::from(stamp.time.min) * 60
        + i64::from(stamp.time.sec);
    seconds.max(0) as u64
}

/// Days between 1970-01-01 and the given civil date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
