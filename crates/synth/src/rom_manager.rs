//! LA ROM discovery and cataloguing.
//!
//! Walks `roms/` on every mount prefix, loads candidate files into
//! zone-backed buffers (largest valid image is 1 MiB), asks the LA library
//! to validate each, and slots accepted images into one of five category
//! slots. A category holds at most one image; replacing one means freeing
//! the old buffer first, which `Drop` on the slot handles.

use heapless::Vec;
use platform::storage::{join_path, DirEntry, Path, Storage, VOLUMES};
use platform::types::RomSet;
use platform::zone::{ZoneAllocator, ZoneBuffer, ZoneTag};

use crate::backend::{RomInfo, RomKind};

/// The largest valid ROM is the CM-32L PCM image at 1 MiB.
pub const MAX_ROM_FILE_SIZE: u32 = 1024 * 1024;

/// Directory scanned on each volume.
const ROM_DIRECTORY: &str = "roms";

/// A validated image held in zone memory.
pub struct LoadedRom {
    /// Raw image bytes.
    pub data: ZoneBuffer,
    /// Library-reported metadata.
    pub info: RomInfo,
}

/// Category slots for the five image kinds.
#[derive(Default)]
pub struct RomManager {
    old_control: Option<LoadedRom>,
    new_control: Option<LoadedRom>,
    cm32l_control: Option<LoadedRom>,
    mt32_pcm: Option<LoadedRom>,
    cm32l_pcm: Option<LoadedRom>,
}

impl RomManager {
    /// Empty manager.
    pub const fn new() -> Self {
        Self {
            old_control: None,
            new_control: None,
            cm32l_control: None,
            mt32_pcm: None,
            cm32l_pcm: None,
        }
    }

    /// Scan every volume's `roms/` directory.
    ///
    /// `identify` is the LA library's validator. Returns `true` when at
    /// least one usable set is present afterwards.
    pub fn scan(
        &mut self,
        storage: &mut dyn Storage,
        zone: &'static ZoneAllocator,
        identify: &dyn Fn(&[u8]) -> Option<RomInfo>,
    ) -> bool {
        // Already have all ROMs
        if self.have(RomSet::All) {
            return true;
        }

        for volume in VOLUMES {
            if !storage.volume_present(volume) {
                continue;
            }

            // Collect candidate paths first; probing needs the storage
            // handle the listing is borrowing.
            let mut candidates: Vec<Path, 32> = Vec::new();
            let result = storage.list_dir(volume, ROM_DIRECTORY, &mut |entry: &DirEntry| {
                if entry.is_dir || entry.is_hidden || entry.size > MAX_ROM_FILE_SIZE {
                    return;
                }
                if let Some(path) = join_path(volume, ROM_DIRECTORY, entry.name.as_str()) {
                    let _ = candidates.push(path);
                }
            });

            if result.is_err() {
                continue;
            }

            for path in &candidates {
                self.check_rom(storage, zone, identify, path.as_str());
                if self.have(RomSet::All) {
                    return true;
                }
            }
        }

        self.have(RomSet::Any)
    }

    /// Whether the given set (or predicate) is satisfiable.
    pub fn have(&self, set: RomSet) -> bool {
        match set {
            RomSet::Any => {
                ((self.old_control.is_some() || self.new_control.is_some())
                    && self.mt32_pcm.is_some())
                    || (self.cm32l_control.is_some() && self.cm32l_pcm.is_some())
            }
            RomSet::All => {
                self.old_control.is_some()
                    && self.new_control.is_some()
                    && self.cm32l_control.is_some()
                    && self.mt32_pcm.is_some()
                    && self.cm32l_pcm.is_some()
            }
            RomSet::Mt32Old => self.old_control.is_some() && self.mt32_pcm.is_some(),
            RomSet::Mt32New => self.new_control.is_some() && self.mt32_pcm.is_some(),
            RomSet::CmL => self.cm32l_control.is_some() && self.cm32l_pcm.is_some(),
        }
    }

    /// Resolve a request into `(concrete set, control, pcm)`.
    ///
    /// `Any` prefers old MT-32, then new MT-32, then CM-32L.
    pub fn get(&self, set: RomSet) -> Option<(RomSet, &LoadedRom, &LoadedRom)> {
        if !self.have(set) {
            return None;
        }

        match set {
            RomSet::Any => {
                if self.have(RomSet::Mt32Old) {
                    self.get(RomSet::Mt32Old)
                } else if self.have(RomSet::Mt32New) {
                    self.get(RomSet::Mt32New)
                } else {
                    self.get(RomSet::CmL)
                }
            }
            RomSet::Mt32Old => Some((
                RomSet::Mt32Old,
                self.old_control.as_ref()?,
                self.mt32_pcm.as_ref()?,
            )),
            RomSet::Mt32New => Some((
                RomSet::Mt32New,
                self.new_control.as_ref()?,
                self.mt32_pcm.as_ref()?,
            )),
            RomSet::CmL => Some((
                RomSet::CmL,
                self.cm32l_control.as_ref()?,
                self.cm32l_pcm.as_ref()?,
            )),
            RomSet::All => None,
        }
    }

    fn check_rom(
        &mut self,
        storage: &mut dyn Storage,
        zone: &'static ZoneAllocator,
        identify: &dyn Fn(&[u8]) -> Option<RomInfo>,
        path: &str,
    ) {
        let Ok(size) = storage.file_size(path) else {
            error!("Couldn't stat ROM candidate");
            return;
        };

        let Some(mut buffer) = ZoneBuffer::new(zone, size as usize, ZoneTag::Uncategorized) else {
            error!("Out of zone memory loading ROM candidate");
            return;
        };

        match storage.read_at(path, 0, buffer.as_mut_slice()) {
            Ok(read) if read == size as usize => {}
            _ => {
                error!("Couldn't read ROM candidate");
                return;
            }
        }

        let Some(info) = identify(buffer.as_slice()) else {
            // Not a ROM; buffer freed on drop.
            return;
        };

        self.store_rom(LoadedRom { data: buffer, info });
    }

    /// Slot an image into its category; duplicate categories are dropped
    /// (the first image found wins).
    fn store_rom(&mut self, rom: LoadedRom) -> bool {
        let name = rom.info.short_name.as_bytes();

        let slot = match rom.info.kind {
            RomKind::Control => match name.get(10) {
                // 'Old' MT-32 control ROMs: versions 1.xx and the Blue
                // Ridge variants.
                Some(b'1' | b'b') => &mut self.old_control,
                // 'New' MT-32 control ROMs: versions 2.xx.
                Some(b'2') => &mut self.new_control,
                _ => &mut self.cm32l_control,
            },
            RomKind::Pcm => match name.get(4) {
                Some(b'm') => &mut self.mt32_pcm,
                _ => &mut self.cm32l_pcm,
            },
        };

        if slot.is_some() {
            return false;
        }
        *slot = Some(rom);
        true
    }
}
