//! ROM and SoundFont discovery against in-memory storage.

use platform::mocks::RamStorage;
use platform::types::RomSet;
use platform::zone::ZoneAllocator;
use synth::backend::{RomInfo, RomKind};
use synth::mocks::mock_rom;
use synth::rom_manager::RomManager;
use synth::soundfont_manager::SoundFontManager;

fn leaked_zone() -> &'static ZoneAllocator {
    let alloc: &'static ZoneAllocator = Box::leak(Box::new(ZoneAllocator::new()));
    let heap = Box::leak(vec![0u8; 256 * 1024].into_boxed_slice());
    // SAFETY: allocator and heap are leaked, hence pinned and exclusive.
    unsafe { alloc.init(heap.as_mut_ptr(), heap.len()) };
    alloc
}

fn identify(data: &[u8]) -> Option<RomInfo> {
    use synth::backend::LaEngine;
    use synth::mocks::{LaLog, MockLaEngine};

    let log = Box::leak(Box::new(platform::sync::SpinMutex::new(LaLog::default())));
    MockLaEngine::new(log).identify_rom(data)
}

/// A minimal but structurally valid SoundFont file.
fn make_sf2(inam: Option<&str>) -> Vec<u8> {
    let mut info_body: Vec<u8> = b"INFO".to_vec();
    if let Some(name) = inam {
        info_body.extend_from_slice(b"INAM");
        info_body.extend_from_slice(&(name.len() as u32).to_le_bytes());
        info_body.extend_from_slice(name.as_bytes());
    }

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&0u32.to_le_bytes()); // outer size unused by the probe
    out.extend_from_slice(b"sfbk");
    out.extend_from_slice(b"LIST");
    out.extend_from_slice(&(info_body.len() as u32).to_le_bytes());
    out.extend_from_slice(&info_body);
    out
}

#[test]
fn test_rom_scan_slots_categories_and_prefers_old_mt32() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/roms/mt32_old.rom", &mock_rom("ctrl_mt32_1_07", RomKind::Control));
    storage.add_file("SD:/roms/mt32_pcm.rom", &mock_rom("pcm_mt32", RomKind::Pcm));
    storage.add_file("SD:/roms/cm32l_ctrl.rom", &mock_rom("ctrl_cm32l_1_02", RomKind::Control));
    storage.add_file("SD:/roms/cm32l_pcm.rom", &mock_rom("pcm_cm32l", RomKind::Pcm));

    let zone = leaked_zone();
    let mut roms = RomManager::new();
    assert!(roms.scan(&mut storage, zone, &identify));

    assert!(roms.have(RomSet::Mt32Old));
    assert!(!roms.have(RomSet::Mt32New));
    assert!(roms.have(RomSet::CmL));
    assert!(roms.have(RomSet::Any));
    assert!(!roms.have(RomSet::All));

    let (resolved, control, pcm) = roms.get(RomSet::Any).unwrap();
    assert_eq!(resolved, RomSet::Mt32Old);
    assert_eq!(control.info.short_name.as_str(), "ctrl_mt32_1_07");
    assert_eq!(pcm.info.short_name.as_str(), "pcm_mt32");
}

#[test]
fn test_rom_scan_skips_hidden_and_non_roms() {
    let mut storage = RamStorage::new();
    storage.add_hidden_file("SD:/roms/secret.rom", &mock_rom("ctrl_mt32_1_07", RomKind::Control));
    storage.add_file("SD:/roms/readme.txt", b"not a rom at all");

    let zone = leaked_zone();
    let mut roms = RomManager::new();
    assert!(!roms.scan(&mut storage, zone, &identify));
    assert!(!roms.have(RomSet::Any));
    // Rejected candidates must not leak zone memory.
    assert_eq!(zone.alloc_count(), 0);
}

#[test]
fn test_rom_scan_searches_usb_volume_too() {
    let mut storage = RamStorage::new();
    storage.add_file("USB:/roms/new.rom", &mock_rom("ctrl_mt32_2_04", RomKind::Control));
    storage.add_file("USB:/roms/pcm.rom", &mock_rom("pcm_mt32", RomKind::Pcm));

    let zone = leaked_zone();
    let mut roms = RomManager::new();
    assert!(roms.scan(&mut storage, zone, &identify));
    assert!(roms.have(RomSet::Mt32New));
    let (resolved, _, _) = roms.get(RomSet::Any).unwrap();
    assert_eq!(resolved, RomSet::Mt32New);
}

#[test]
fn test_soundfont_scan_reads_inam_names() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/general.sf2", &make_sf2(Some("General User GS")));

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.count(), 1);
    assert_eq!(fonts.name(0), Some("General User GS"));
    assert_eq!(fonts.path(0), Some("SD:/soundfonts/general.sf2"));
}

#[test]
fn test_soundfont_scan_falls_back_on_filename() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/nameless.sf2", &make_sf2(None));

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.name(0), Some("nameless.sf2"));
}

#[test]
fn test_soundfont_scan_rejects_non_riff() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/fake.sf2", b"MThd not a soundfont");

    let mut fonts = SoundFontManager::new();
    assert!(!fonts.scan(&mut storage));
    assert_eq!(fonts.count(), 0);
}

#[test]
fn test_soundfont_list_sorted_case_insensitively() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/beta.sf2", &make_sf2(Some("B")));
    storage.add_file("SD:/soundfonts/Alpha.sf2", &make_sf2(Some("A")));
    storage.add_file("SD:/soundfonts/gamma.sf2", &make_sf2(Some("G")));

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.path(0), Some("SD:/soundfonts/Alpha.sf2"));
    assert_eq!(fonts.path(1), Some("SD:/soundfonts/beta.sf2"));
    assert_eq!(fonts.path(2), Some("SD:/soundfonts/gamma.sf2"));
}

#[test]
fn test_rescan_replaces_catalogue() {
    let mut storage = RamStorage::new();
    storage.add_file("USB:/soundfonts/stick.sf2", &make_sf2(Some("On the stick")));
    storage.add_file("SD:/soundfonts/card.sf2", &make_sf2(Some("On the card")));

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.count(), 2);

    // Stick removed: only the card font remains after a rescan.
    storage.remove_file("USB:/soundfonts/stick.sf2");
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.count(), 1);
    assert_eq!(fonts.name(0), Some("On the card"));
}

#[test]
fn test_fx_profile_sidecar_is_parsed() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/a.sf2", &make_sf2(Some("A")));
    storage.add_file("SD:/soundfonts/a.cfg", b"gain = 0.4\nreverb = off\nchorus_voices = 5\n");

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));

    let fx = fonts.fx_profile(0, &mut storage);
    assert_eq!(fx.gain, Some(0.4));
    assert_eq!(fx.reverb, Some(false));
    assert_eq!(fx.chorus_voices, Some(5));
    assert_eq!(fx.reverb_level, None);
}

#[test]
fn test_missing_fx_profile_is_all_defaults() {
    let mut storage = RamStorage::new();
    storage.add_file("SD:/soundfonts/a.sf2", &make_sf2(Some("A")));

    let mut fonts = SoundFontManager::new();
    assert!(fonts.scan(&mut storage));
    assert_eq!(fonts.fx_profile(0, &mut storage), synth::fx::FxProfile::default());
}
