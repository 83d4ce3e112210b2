//! SoundFont discovery and cataloguing.
//!
//! Walks `soundfonts/` on every mount prefix and accepts files whose
//! opening chunks spell `RIFF…sfbk…LIST…INFO`. The `INAM` sub-chunk, when
//! present, supplies the display name; otherwise the file name stands in.
//! Entries sort by path, case-insensitively, after every rescan — the
//! "current index" is only meaningful against a stable, sorted list.

use heapless::{String, Vec};
use platform::storage::{join_path, DirEntry, Path, Storage, VOLUMES};

use crate::fx::FxProfile;

/// List capacity.
pub const MAX_SOUNDFONTS: usize = 512;

/// Longest display name.
pub const MAX_NAME: usize = 256;

/// Directory scanned on each volume.
const SOUNDFONT_DIRECTORY: &str = "soundfonts";

/// One catalogued font.
pub struct SoundFontEntry {
    /// Display name (INAM or file name).
    pub name: String<MAX_NAME>,
    /// Full path including the volume prefix.
    pub path: Path,
}

/// The sorted catalogue.
pub struct SoundFontManager {
    entries: Vec<SoundFontEntry, MAX_SOUNDFONTS>,
}

impl SoundFontManager {
    /// Empty catalogue.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rescan every volume, replacing the catalogue. Returns `true` when
    /// at least one font was found.
    pub fn scan(&mut self, storage: &mut dyn Storage) -> bool {
        self.entries.clear();

        for volume in VOLUMES {
            if !storage.volume_present(volume) {
                continue;
            }

            // Collect paths first; the RIFF probe needs the storage handle
            // the listing is borrowing.
            let mut candidates: Vec<Path, MAX_SOUNDFONTS> = Vec::new();
            let result = storage.list_dir(volume, SOUNDFONT_DIRECTORY, &mut |entry: &DirEntry| {
                if entry.is_dir || entry.is_hidden {
                    return;
                }
                if let Some(path) = join_path(volume, SOUNDFONT_DIRECTORY, entry.name.as_str()) {
                    let _ = candidates.push(path);
                }
            });

            if result.is_err() {
                continue;
            }

            for path in &candidates {
                if self.entries.is_full() {
                    warn!("SoundFont list full; remaining files ignored");
                    break;
                }
                self.check_soundfont(storage, path);
            }
        }

        // Case-insensitive path order keeps indices stable across rescans
        // of unchanged media.
        self.entries.sort_unstable_by(|a, b| {
            let a = a.path.as_str().as_bytes().iter().map(u8::to_ascii_lowercase);
            let b = b.path.as_str().as_bytes().iter().map(u8::to_ascii_lowercase);
            a.cmp(b)
        });

        if self.entries.is_empty() {
            return false;
        }

        info!("{=usize} SoundFonts found", self.entries.len());
        true
    }

    /// Number of catalogued fonts.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Path of entry `index`.
    pub fn path(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.path.as_str())
    }

    /// Display name of entry `index`; falls back on the path when the font
    /// carried no usable INAM.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| {
            if e.name.is_empty() {
                e.path.as_str()
            } else {
                e.name.as_str()
            }
        })
    }

    /// Path of the first catalogued font.
    pub fn first_valid_path(&self) -> Option<&str> {
        self.path(0)
    }

    /// Load entry `index`'s sidecar `.cfg` effects profile, if present.
    pub fn fx_profile(&self, index: usize, storage: &mut dyn Storage) -> FxProfile {
        let Some(path) = self.path(index) else {
            return FxProfile::default();
        };

        // Replace the extension (or append) to get the sidecar path.
        let mut cfg_path = Path::new();
        let base = match path.rfind('.') {
            Some(dot) => path.get(..dot).unwrap_or(path),
            None => path,
        };
        if cfg_path.push_str(base).is_err() || cfg_path.push_str(".cfg").is_err() {
            return FxProfile::default();
        }

        let mut buf = [0u8; 2048];
        let Ok(read) = storage.read_at(cfg_path.as_str(), 0, &mut buf) else {
            return FxProfile::default();
        };

        match core::str::from_utf8(buf.get(..read).unwrap_or(&[])) {
            Ok(text) => FxProfile::parse(text),
            Err(_) => {
                error!("Effects profile is not valid text");
                FxProfile::default()
            }
        }
    }

    #[allow(clippy::indexing_slicing)] // header length checked before slicing
    fn check_soundfont(&mut self, storage: &mut dyn Storage, path: &Path) {
        // RIFF header: "RIFF" <size> "sfbk", then the INFO list:
        // "LIST" <size> "INFO".
        let mut header = [0u8; 24];
        let Ok(read) = storage.read_at(path.as_str(), 0, &mut header) else {
            return;
        };
        if read < header.len() {
            return;
        }

        if &header[0..4] != b"RIFF"
            || &header[8..12] != b"sfbk"
            || &header[12..16] != b"LIST"
            || &header[20..24] != b"INFO"
        {
            return;
        }

        let info_size = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);

        let name = self.find_inam(storage, path.as_str(), info_size);

        let file_name = path.as_str().rsplit('/').next().unwrap_or(path.as_str());
        let mut entry = SoundFontEntry {
            name: String::new(),
            path: path.clone(),
        };
        match name {
            Some(name) => entry.name = name,
            None => {
                let _ = entry.name.push_str(file_name);
            }
        }
        let _ = self.entries.push(entry);
    }

    /// Walk the INFO sub-chunks looking for INAM.
    #[allow(clippy::indexing_slicing)] // fixed 8-byte chunk header
    fn find_inam(
        &self,
        storage: &mut dyn Storage,
        path: &str,
        info_size: u32,
    ) -> Option<String<MAX_NAME>> {
        // The INFO fourcc already consumed 4 bytes of the list size.
        let mut total_read = 4u32;
        let mut offset = 24u32;

        while total_read < info_size {
            let mut chunk = [0u8; 8];
            if storage.read_at(path, offset, &mut chunk) != Ok(8) {
                return None;
            }
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            total_read = total_read.saturating_add(8).saturating_add(size);

            if &chunk[0..4] == b"INAM" {
                if size as usize > MAX_NAME {
                    return None;
                }
                let mut buf = [0u8; MAX_NAME];
                let take = size as usize;
                let read = storage
                    .read_at(path, offset.saturating_add(8), buf.get_mut(..take)?)
                    .ok()?;

                let mut name: String<MAX_NAME> = String::new();
                for &b in buf.get(..read)? {
                    if b == 0 {
                        break;
                    }
                    let c = if (0x20..0x7F).contains(&b) { b as char } else { ' ' };
                    if name.push(c).is_err() {
                        break;
                    }
                }
                return Some(name);
            }

            offset = offset.saturating_add(8).saturating_add(size);
        }

        None
    }
}

impl Default for SoundFontManager {
    fn default() -> Self {
        Self::new()
    }
}
