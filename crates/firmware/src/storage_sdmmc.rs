//! FAT storage backend over `embedded-sdmmc`.
//!
//! Implements the platform [`Storage`] contract for the SD card slot. USB
//! mass storage arrives through the USB host stack's block device and
//! mounts through a second instance of the same wrapper.

use core::fmt::Write as _;

use embedded_sdmmc::{BlockDevice, Mode, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use heapless::String;
use platform::storage::{DirEntry, Storage, StorageError};

/// FAT timestamps are irrelevant for a read-only scan; everything reads as
/// the build epoch.
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 54,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// One mounted FAT volume behind a mount prefix ("SD" or "USB").
pub struct FatStorage<D: BlockDevice> {
    volume_mgr: VolumeManager<D, FixedClock>,
    prefix: &'static str,
}

impl<D: BlockDevice> FatStorage<D> {
    /// Wrap a block device under `prefix`.
    pub fn new(device: D, prefix: &'static str) -> Self {
        Self {
            volume_mgr: VolumeManager::new(device, FixedClock),
            prefix,
        }
    }

    /// Split `"SD:/dir/name"` into (dir, name); `None` when the prefix
    /// does not match this volume.
    fn split_path<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = path.strip_prefix(self.prefix)?.strip_prefix(":/")?;
        rest.split_once('/')
    }
}

impl<D: BlockDevice> Storage for FatStorage<D> {
    fn volume_present(&mut self, volume: &str) -> bool {
        volume == self.prefix && self.volume_mgr.open_volume(VolumeIdx(0)).is_ok()
    }

    fn list_dir(
        &mut self,
        volume: &str,
        dir: &str,
        f: &mut dyn FnMut(&DirEntry),
    ) -> Result<(), StorageError> {
        if volume != self.prefix {
            return Err(StorageError::VolumeNotMounted);
        }

        let mut fat_volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::VolumeNotMounted)?;
        let mut root = fat_volume
            .open_root_dir()
            .map_err(|_| StorageError::Io)?;
        let mut directory = root.open_dir(dir).map_err(|_| StorageError::NotFound)?;

        directory
            .iterate_dir(|fat_entry| {
                let mut entry = DirEntry {
                    name: String::new(),
                    is_dir: fat_entry.attributes.is_directory(),
                    is_hidden: fat_entry.attributes.is_hidden()
                        || fat_entry.attributes.is_system(),
                    size: fat_entry.size,
                };
                let _ = write!(entry.name, "{}", fat_entry.name);
                f(&entry);
            })
            .map_err(|_| StorageError::Io)?;

        Ok(())
    }

    fn file_size(&mut self, path: &str) -> Result<u32, StorageError> {
        let (dir, name) = self.split_path(path).ok_or(StorageError::NotFound)?;

        let mut fat_volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::VolumeNotMounted)?;
        let mut root = fat_volume.open_root_dir().map_err(|_| StorageError::Io)?;
        let mut directory = root.open_dir(dir).map_err(|_| StorageError::NotFound)?;
        let file = directory
            .open_file_in_dir(name, Mode::ReadOnly)
            .map_err(|_| StorageError::NotFound)?;

        Ok(file.length())
    }

    fn read_at(&mut self, path: &str, offset: u32, buf: &mut [u8]) -> Result<usize, StorageError> {
        let (dir, name) = self.split_path(path).ok_or(StorageError::NotFound)?;

        let mut fat_volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::VolumeNotMounted)?;
        let mut root = fat_volume.open_root_dir().map_err(|_| StorageError::Io)?;
        let mut directory = root.open_dir(dir).map_err(|_| StorageError::NotFound)?;
        let mut file = directory
            .open_file_in_dir(name, Mode::ReadOnly)
            .map_err(|_| StorageError::NotFound)?;

        file.seek_from_start(offset).map_err(|_| StorageError::Io)?;
        file.read(buf).map_err(|_| StorageError::Io)
    }
}
